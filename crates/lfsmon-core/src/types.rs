//! Typed identifiers, LNet NIDs and resource references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MonitorError, MonitorResult};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates an identifier from a raw u64 value
            pub fn new(id: u64) -> Self {
                $name(id)
            }

            /// Returns the raw u64 value of this identifier
            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifies a managed server host
    HostId
);
id_type!(
    /// Identifies a Lustre filesystem
    FilesystemId
);
id_type!(
    /// Identifies an MGT, MDT or OST
    TargetId
);
id_type!(
    /// Identifies a recorded event
    EventId
);
id_type!(
    /// Identifies an alert instance
    AlertId
);
id_type!(
    /// Identifies an orchestration job
    JobId
);
id_type!(
    /// Identifies an ingested syslog record
    LogId
);

/// A Lustre network identifier in canonical form, e.g. `10.0.0.1@tcp0`.
///
/// Lustre and its users write `tcp` and `tcp0` interchangeably, so the
/// canonical form always carries an instance number. A `_` between the
/// network type and the instance is dropped.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nid(String);

impl Nid {
    /// Parses and normalizes a raw NID string.
    pub fn parse(raw: &str) -> MonitorResult<Self> {
        let raw = raw.trim();
        let (address, network) = raw
            .split_once('@')
            .ok_or_else(|| MonitorError::invalid(raw, "NID must be <address>@<network>"))?;
        if address.is_empty() {
            return Err(MonitorError::invalid(raw, "NID address is empty"));
        }

        let digits_at = network
            .rfind(|c: char| !c.is_ascii_digit())
            .map(|i| i + 1)
            .unwrap_or(0);
        let (lnd, instance) = network.split_at(digits_at);
        let lnd = lnd.strip_suffix('_').unwrap_or(lnd);
        if lnd.is_empty() || !lnd.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MonitorError::invalid(raw, "NID network type is malformed"));
        }
        let instance = if instance.is_empty() { "0" } else { instance };

        Ok(Nid(format!("{}@{}{}", address, lnd, instance)))
    }

    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the address part, before the `@`.
    pub fn address(&self) -> &str {
        self.0.split_once('@').map(|(a, _)| a).unwrap_or(&self.0)
    }
}

impl fmt::Display for Nid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Nid {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Nid::parse(s)
    }
}

impl TryFrom<String> for Nid {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Nid::parse(&value)
    }
}

impl From<Nid> for String {
    fn from(nid: Nid) -> Self {
        nid.0
    }
}

/// The kinds of resource that carry a managed lifecycle state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A server host.
    Host,
    /// A Lustre filesystem.
    Filesystem,
    /// A management, metadata or object storage target.
    Target,
}

impl FromStr for ResourceKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "host" => Ok(ResourceKind::Host),
            "filesystem" => Ok(ResourceKind::Filesystem),
            "target" => Ok(ResourceKind::Target),
            _ => Err(MonitorError::invalid(
                s,
                "resource kinds are host, filesystem, target",
            )),
        }
    }
}

/// A typed pointer at one stateful resource in the graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Which collection `id` indexes.
    pub kind: ResourceKind,
    /// Raw identifier within that collection.
    pub id: u64,
}

impl ResourceRef {
    /// Refers to a host.
    pub fn host(id: HostId) -> Self {
        Self {
            kind: ResourceKind::Host,
            id: id.as_u64(),
        }
    }

    /// Refers to a filesystem.
    pub fn filesystem(id: FilesystemId) -> Self {
        Self {
            kind: ResourceKind::Filesystem,
            id: id.as_u64(),
        }
    }

    /// Refers to a target.
    pub fn target(id: TargetId) -> Self {
        Self {
            kind: ResourceKind::Target,
            id: id.as_u64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nid_appends_default_instance() {
        assert_eq!(Nid::parse("192.168.1.5@tcp").unwrap().as_str(), "192.168.1.5@tcp0");
    }

    #[test]
    fn test_nid_keeps_explicit_instance() {
        assert_eq!(Nid::parse("10.0.0.1@o2ib3").unwrap().as_str(), "10.0.0.1@o2ib3");
    }

    #[test]
    fn test_nid_drops_underscore_before_instance() {
        assert_eq!(Nid::parse("10.0.0.1@tcp_1").unwrap().as_str(), "10.0.0.1@tcp1");
    }

    #[test]
    fn test_nid_spellings_compare_equal() {
        let a = Nid::parse("10.0.0.1@tcp").unwrap();
        let b = Nid::parse("10.0.0.1@tcp0").unwrap();
        let c = Nid::parse("10.0.0.1@tcp_0").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_nid_address() {
        assert_eq!(Nid::parse("10.0.0.1@tcp").unwrap().address(), "10.0.0.1");
    }

    #[test]
    fn test_nid_rejects_missing_network() {
        assert!(Nid::parse("10.0.0.1").is_err());
        assert!(Nid::parse("@tcp").is_err());
        assert!(Nid::parse("10.0.0.1@").is_err());
        assert!(Nid::parse("10.0.0.1@12").is_err());
    }

    #[test]
    fn test_nid_serde_normalizes() {
        let nid: Nid = serde_json::from_str("\"10.0.0.9@tcp\"").unwrap();
        assert_eq!(nid.as_str(), "10.0.0.9@tcp0");
        assert_eq!(serde_json::to_string(&nid).unwrap(), "\"10.0.0.9@tcp0\"");
    }

    #[test]
    fn test_resource_kind_parse() {
        assert_eq!("Target".parse::<ResourceKind>().unwrap(), ResourceKind::Target);
        assert!("volume".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(TargetId::new(42).to_string(), "42");
        assert_eq!(HostId::new(3).as_u64(), 3);
    }
}

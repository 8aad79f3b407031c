//! Entities exposed by the monitoring API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MonitorError, MonitorResult};
use crate::types::{AlertId, EventId, FilesystemId, HostId, JobId, LogId, Nid, ResourceRef, TargetId};

/// Lifecycle states of a managed host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    /// Known but not yet set up.
    Unconfigured,
    /// LNet kernel modules not loaded.
    LnetUnloaded,
    /// LNet loaded but stopped.
    LnetDown,
    /// LNet running; the host can serve targets.
    LnetUp,
    /// Retired.
    Removed,
}

impl HostState {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Unconfigured => "unconfigured",
            HostState::LnetUnloaded => "lnet_unloaded",
            HostState::LnetDown => "lnet_down",
            HostState::LnetUp => "lnet_up",
            HostState::Removed => "removed",
        }
    }
}

/// Lifecycle states of a filesystem.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilesystemState {
    /// Not mounted anywhere.
    Stopped,
    /// Serving clients.
    Available,
    /// Some targets are down.
    Unavailable,
    /// Retired.
    Removed,
}

impl FilesystemState {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilesystemState::Stopped => "stopped",
            FilesystemState::Available => "available",
            FilesystemState::Unavailable => "unavailable",
            FilesystemState::Removed => "removed",
        }
    }
}

/// Lifecycle states shared by MGT, MDT and OST.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// Storage not yet formatted.
    Unformatted,
    /// Formatted but unknown to the MGS.
    Formatted,
    /// Registered with its MGT.
    Registered,
    /// Ready to mount.
    Unmounted,
    /// Mounted on its active host.
    Mounted,
    /// Retired.
    Removed,
}

impl TargetState {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Unformatted => "unformatted",
            TargetState::Formatted => "formatted",
            TargetState::Registered => "registered",
            TargetState::Unmounted => "unmounted",
            TargetState::Mounted => "mounted",
            TargetState::Removed => "removed",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(HostState, FilesystemState, TargetState);

/// The three target variants. Each carries its own query predicate and label rules.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetKind {
    /// Management target.
    #[serde(rename = "MGT")]
    Mgt,
    /// Metadata target.
    #[serde(rename = "MDT")]
    Mdt,
    /// Object storage target.
    #[serde(rename = "OST")]
    Ost,
}

impl TargetKind {
    /// Every kind, in the order listings use when no kinds are requested.
    pub const ALL: [TargetKind; 3] = [TargetKind::Mgt, TargetKind::Mdt, TargetKind::Ost];

    /// Kind tag, e.g. `OST`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Mgt => "MGT",
            TargetKind::Mdt => "MDT",
            TargetKind::Ost => "OST",
        }
    }

    /// MGTs serve every filesystem and never carry a filesystem back-reference.
    pub fn is_filesystem_scoped(&self) -> bool {
        !matches!(self, TargetKind::Mgt)
    }

    /// Parses a list of kind tokens. Empty input selects all kinds; duplicates
    /// are dropped while keeping the requested order.
    pub fn parse_list<S: AsRef<str>>(tokens: &[S]) -> MonitorResult<Vec<TargetKind>> {
        let mut kinds = Vec::with_capacity(3);
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            let kind: TargetKind = token.parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            kinds.extend_from_slice(&TargetKind::ALL);
        }
        Ok(kinds)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MGT" => Ok(TargetKind::Mgt),
            "MDT" => Ok(TargetKind::Mdt),
            "OST" => Ok(TargetKind::Ost),
            _ => Err(MonitorError::invalid(s, "Unknown target kind (kinds are MGT, MDT, OST)")),
        }
    }
}

/// A managed server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Host id.
    pub id: HostId,
    /// Fully qualified name; may be empty.
    pub fqdn: String,
    /// Management address.
    pub address: String,
    /// Shared secret the agent presents on check-in.
    pub agent_token: String,
    /// LNet NIDs, stored canonical.
    #[serde(default)]
    pub nids: Vec<Nid>,
    /// Lifecycle state.
    pub state: HostState,
    /// Most recent opaque scan payload reported by the host agent.
    #[serde(default)]
    pub last_scan: Option<serde_json::Value>,
}

impl Host {
    /// Display name used in listings and log host matching.
    pub fn pretty_name(&self) -> &str {
        if self.fqdn.is_empty() {
            &self.address
        } else {
            &self.fqdn
        }
    }

    /// True when `nid` is one of the host's NIDs.
    pub fn has_nid(&self, nid: &Nid) -> bool {
        self.nids.iter().any(|n| n == nid)
    }
}

/// A Lustre filesystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filesystem {
    /// Filesystem id.
    pub id: FilesystemId,
    /// Unique filesystem name.
    pub name: String,
    /// The MGT serving this filesystem.
    pub mgt_id: TargetId,
    /// Lifecycle state.
    pub state: FilesystemState,
}

/// An MGT, MDT or OST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Target id.
    pub id: TargetId,
    /// MGT, MDT or OST.
    pub kind: TargetKind,
    /// Lustre name, e.g. `fs1-OST0001`.
    pub name: String,
    /// Lifecycle state.
    pub state: TargetState,
    /// Owning filesystem; always empty for an MGT.
    #[serde(default)]
    pub filesystem_id: Option<FilesystemId>,
    /// Host the target is currently mounted on, if any.
    #[serde(default)]
    pub active_host: Option<HostId>,
}

impl Target {
    /// Name shown in listings and log references.
    pub fn label(&self) -> &str {
        &self.name
    }
}

/// Associates a target with a host that can serve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMount {
    /// Target served.
    pub target_id: TargetId,
    /// Host that can mount it.
    pub host_id: HostId,
    /// True for the preferred server.
    pub primary: bool,
}

/// Event and alert severity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational.
    Info,
    /// Degraded but working.
    Warning,
    /// Failed.
    Error,
}

impl Severity {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Severity::Info),
            "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            _ => Err(MonitorError::invalid(s, "severities are INFO, WARNING, ERROR")),
        }
    }
}

/// Discriminates the payload carried by an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// See [`EventPayload::AlertEvent`].
    AlertEvent,
    /// See [`EventPayload::SyslogEvent`].
    SyslogEvent,
    /// See [`EventPayload::LearnEvent`].
    LearnEvent,
    /// See [`EventPayload::ClientConnectEvent`].
    ClientConnectEvent,
}

impl FromStr for EventType {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AlertEvent" => Ok(EventType::AlertEvent),
            "SyslogEvent" => Ok(EventType::SyslogEvent),
            "LearnEvent" => Ok(EventType::LearnEvent),
            "ClientConnectEvent" => Ok(EventType::ClientConnectEvent),
            _ => Err(MonitorError::invalid(
                s,
                "event types are AlertEvent, SyslogEvent, LearnEvent, ClientConnectEvent",
            )),
        }
    }
}

/// Type-specific event data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    /// An alert was raised or cleared.
    AlertEvent {
        /// The alert concerned.
        alert_id: AlertId,
    },
    /// A syslog line was flagged.
    SyslogEvent {
        /// The flagged record.
        log_id: LogId,
    },
    /// A target was discovered on a server.
    LearnEvent {
        /// The discovered target.
        target_id: TargetId,
    },
    /// A Lustre client connected.
    ClientConnectEvent {
        /// Address the client connected from.
        client_address: String,
    },
}

impl EventPayload {
    /// The discriminator of this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::AlertEvent { .. } => EventType::AlertEvent,
            EventPayload::SyslogEvent { .. } => EventType::SyslogEvent,
            EventPayload::LearnEvent { .. } => EventType::LearnEvent,
            EventPayload::ClientConnectEvent { .. } => EventType::ClientConnectEvent,
        }
    }
}

/// An immutable, append-only record of something that happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event id.
    pub id: EventId,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
    /// Severity.
    pub severity: Severity,
    /// Host the event concerns, if any.
    #[serde(default)]
    pub host_id: Option<HostId>,
    /// Type-specific data.
    pub payload: EventPayload,
    /// Human readable text.
    pub message: String,
}

/// An ongoing condition. `end` stays empty until the alert is cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Alert id.
    pub id: AlertId,
    /// Human readable text.
    pub message: String,
    /// Severity.
    pub severity: Severity,
    /// Host the alert concerns, if any.
    #[serde(default)]
    pub host_id: Option<HostId>,
    /// When the condition started.
    pub begin: DateTime<Utc>,
    /// False once cleared.
    pub active: bool,
    /// When the alert was cleared.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl Alert {
    /// Opens an active alert at `now`.
    pub fn raise(id: AlertId, message: String, severity: Severity, host_id: Option<HostId>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            message,
            severity,
            host_id,
            begin: now,
            active: true,
            end: None,
        }
    }

    /// Ends an active alert. Clearing an inactive alert changes nothing.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        if self.active {
            self.active = false;
            self.end = Some(now);
        }
    }
}

/// A syslog line as forwarded by a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log record id.
    pub id: LogId,
    /// Timestamp reported by the sending host.
    pub device_reported_time: DateTime<Utc>,
    /// Sending host name.
    pub from_host: String,
    /// Syslog tag, e.g. `kernel:`.
    pub syslog_tag: String,
    /// Raw message text.
    pub message: String,
}

/// Progress of a job.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Submitted, not started.
    Pending,
    /// Running.
    Tasked,
    /// Finished.
    Complete,
}

/// The state change a job is driving a resource towards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransition {
    /// The resource being changed.
    pub resource: ResourceRef,
    /// Lifecycle state name, checked against the resource kind on load.
    pub to_state: String,
}

/// A unit of work driving resources between states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job id.
    pub id: JobId,
    /// Human readable summary.
    pub description: String,
    /// Progress.
    pub state: JobState,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// State change the job performs, if any.
    #[serde(default)]
    pub transition: Option<PendingTransition>,
}

impl Job {
    /// True once the job has finished.
    pub fn is_complete(&self) -> bool {
        self.state == JobState::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_kinds_empty_means_all() {
        let empty: [&str; 0] = [];
        assert_eq!(TargetKind::parse_list(&empty).unwrap(), TargetKind::ALL.to_vec());
    }

    #[test]
    fn test_parse_kinds_keeps_order_and_dedups() {
        let kinds = TargetKind::parse_list(&["OST", "MGT", "OST"]).unwrap();
        assert_eq!(kinds, vec![TargetKind::Ost, TargetKind::Mgt]);
    }

    #[test]
    fn test_parse_kinds_unknown_token() {
        let err = TargetKind::parse_list(&["MDT", "XYZ"]).unwrap_err();
        match err {
            MonitorError::InvalidArgument { token, .. } => assert_eq!(token, "XYZ"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_target_kind_serde_uses_tags() {
        assert_eq!(serde_json::to_string(&TargetKind::Ost).unwrap(), "\"OST\"");
        let kind: TargetKind = serde_json::from_str("\"MGT\"").unwrap();
        assert_eq!(kind, TargetKind::Mgt);
    }

    #[test]
    fn test_severity_parse_case_insensitive() {
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_event_payload_discriminator() {
        let payload = EventPayload::LearnEvent { target_id: TargetId::new(4) };
        assert_eq!(payload.event_type(), EventType::LearnEvent);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "LearnEvent");
    }

    #[test]
    fn test_alert_clear_sets_end_once() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        let mut alert = Alert::raise(AlertId::new(1), "OST offline".into(), Severity::Error, None, t0);
        assert!(alert.active);
        assert!(alert.end.is_none());

        alert.clear(t1);
        assert!(!alert.active);
        assert_eq!(alert.end, Some(t1));

        alert.clear(t2);
        assert_eq!(alert.end, Some(t1));
    }

    #[test]
    fn test_host_pretty_name_falls_back_to_address() {
        let mut host = Host {
            id: HostId::new(1),
            fqdn: "oss1.example.com".into(),
            address: "10.0.0.5".into(),
            agent_token: "t".into(),
            nids: vec![],
            state: HostState::LnetUp,
            last_scan: None,
        };
        assert_eq!(host.pretty_name(), "oss1.example.com");
        host.fqdn.clear();
        assert_eq!(host.pretty_name(), "10.0.0.5");
    }
}

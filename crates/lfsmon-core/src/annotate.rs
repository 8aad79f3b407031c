//! Rewrites syslog text so NIDs and target names become entity references.
//!
//! Two passes run in a fixed order over each message:
//!
//! 1. NIDs (`a.b.c.d@tcp`, optionally with an instance number). Each distinct
//!    NID that resolves to exactly one host is replaced at every occurrence.
//! 2. Target names (`<fsname>-MDTxxxx` / `<fsname>-OSTxxxx`). Each distinct
//!    name that resolves to exactly one target is replaced at its first
//!    occurrence only.
//!
//! Anything that fails to resolve stays as written.

use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::{MonitorError, MonitorResult};
use crate::model::{Host, Target};
use crate::topology::ResourceGraph;
use crate::types::{Nid, TargetId};

static NID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\d{1,3}\.){3}\d{1,3}@tcp(?:_?\d+)?").expect("NID pattern compiles")
});

static TARGET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\w+-(?:MDT|OST)\d{4}\b").expect("target pattern compiles")
});

/// Lookups the annotator needs from the topology.
pub trait EntityResolver {
    /// Hosts carrying `nid`, compared in canonical form.
    fn hosts_with_nid(&self, nid: &Nid) -> Vec<&Host>;
    /// Targets whose name is exactly `name`.
    fn targets_named(&self, name: &str) -> Vec<&Target>;
}

impl EntityResolver for ResourceGraph {
    fn hosts_with_nid(&self, nid: &Nid) -> Vec<&Host> {
        self.hosts_by_nid(nid)
    }

    fn targets_named(&self, name: &str) -> Vec<&Target> {
        self.targets_by_name(name)
    }
}

/// Inline reference markup embedded in annotated messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<'a> {
    /// `[[nid|<raw nid>|<host address>]]`
    Host {
        /// The NID as it appeared in the message.
        raw_nid: &'a str,
        /// Address of the resolved host.
        address: &'a str,
    },
    /// `[[target|<id>|<label>]]`
    Target {
        /// Resolved target.
        id: TargetId,
        /// Display label of the target.
        label: &'a str,
    },
}

impl fmt::Display for Reference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Host { raw_nid, address } => write!(f, "[[nid|{}|{}]]", raw_nid, address),
            Reference::Target { id, label } => write!(f, "[[target|{}|{}]]", id, label),
        }
    }
}

/// Resolves NIDs and target names in free text against a resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAnnotator;

impl LogAnnotator {
    /// Creates an annotator.
    pub fn new() -> Self {
        LogAnnotator
    }

    /// Rewrites `message`, leaving unresolved names untouched.
    pub fn annotate<R: EntityResolver + ?Sized>(&self, resolver: &R, message: &str) -> String {
        let message = self.annotate_nids(resolver, message);
        self.annotate_targets(resolver, &message)
    }

    fn annotate_nids<R: EntityResolver + ?Sized>(&self, resolver: &R, message: &str) -> String {
        let mut markup: HashMap<&str, Option<String>> = HashMap::new();
        for m in NID_PATTERN.find_iter(message) {
            let raw = m.as_str();
            if markup.contains_key(raw) {
                continue;
            }
            let resolved = match Nid::parse(raw) {
                Ok(nid) => resolve_nid(resolver, raw, &nid),
                Err(e) => {
                    debug!("Skipping unparseable NID {}: {}", raw, e);
                    None
                }
            };
            markup.insert(raw, resolved);
        }
        if markup.values().all(Option::is_none) {
            return message.to_string();
        }

        NID_PATTERN
            .replace_all(message, |caps: &Captures<'_>| {
                let raw = &caps[0];
                match markup.get(raw) {
                    Some(Some(m)) => m.clone(),
                    _ => raw.to_string(),
                }
            })
            .into_owned()
    }

    fn annotate_targets<R: EntityResolver + ?Sized>(&self, resolver: &R, message: &str) -> String {
        let mut seen: HashSet<String> = HashSet::new();
        TARGET_PATTERN
            .replace_all(message, |caps: &Captures<'_>| {
                let name = &caps[0];
                if !seen.insert(name.to_string()) {
                    return name.to_string();
                }
                match unique("target", name, resolver.targets_named(name)) {
                    Ok(target) => Reference::Target {
                        id: target.id,
                        label: target.label(),
                    }
                    .to_string(),
                    Err(e) => {
                        report(&e);
                        name.to_string()
                    }
                }
            })
            .into_owned()
    }
}

fn resolve_nid<R: EntityResolver + ?Sized>(resolver: &R, raw: &str, nid: &Nid) -> Option<String> {
    match unique("NID", nid.as_str(), resolver.hosts_with_nid(nid)) {
        Ok(host) => Some(
            Reference::Host {
                raw_nid: raw,
                address: &host.address,
            }
            .to_string(),
        ),
        Err(e) => {
            report(&e);
            None
        }
    }
}

/// Narrows a lookup result to its single match.
fn unique<'r, T>(what: &'static str, key: &str, matches: Vec<&'r T>) -> MonitorResult<&'r T> {
    match matches.as_slice() {
        [] => Err(MonitorError::not_found(what, key)),
        [only] => Ok(*only),
        many => Err(MonitorError::Ambiguous {
            what: format!("{} {}", what, key),
            count: many.len(),
        }),
    }
}

fn report(err: &MonitorError) {
    match err {
        MonitorError::NotFound { kind: "target", .. } => debug!("Leaving text as is: {}", err),
        _ => warn!("Leaving text as is: {}", err),
    }
}

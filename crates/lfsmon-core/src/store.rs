//! Snapshot-based access to persisted monitoring data.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::{MonitorError, MonitorResult};
use crate::model::{Alert, Event, Filesystem, Host, Job, LogRecord, Target, TargetMount};
use crate::state::validate_state_name;
use crate::topology::ResourceGraph;
use crate::types::HostId;

/// Everything a request may read, captured at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    /// Topology and lifecycle states.
    pub graph: ResourceGraph,
    /// Cluster events.
    pub events: Vec<Event>,
    /// Active and cleared alerts.
    pub alerts: Vec<Alert>,
    /// Forwarded syslog records.
    pub logs: Vec<LogRecord>,
    /// Submitted jobs, complete or not.
    pub jobs: Vec<Job>,
}

/// Flat serialized form of an [`Inventory`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryFile {
    /// Server hosts.
    pub hosts: Vec<Host>,
    /// Filesystems.
    pub filesystems: Vec<Filesystem>,
    /// MGTs, MDTs and OSTs.
    pub targets: Vec<Target>,
    /// Target to host mount associations.
    pub mounts: Vec<TargetMount>,
    /// Cluster events.
    pub events: Vec<Event>,
    /// Alerts.
    pub alerts: Vec<Alert>,
    /// Syslog records.
    pub logs: Vec<LogRecord>,
    /// Jobs.
    pub jobs: Vec<Job>,
}

impl TryFrom<InventoryFile> for Inventory {
    type Error = MonitorError;

    fn try_from(file: InventoryFile) -> Result<Self, Self::Error> {
        for job in &file.jobs {
            if let Some(transition) = &job.transition {
                validate_state_name(transition.resource.kind, &transition.to_state)?;
            }
        }
        Ok(Inventory {
            graph: ResourceGraph::from_parts(file.hosts, file.filesystems, file.targets, file.mounts)?,
            events: file.events,
            alerts: file.alerts,
            logs: file.logs,
            jobs: file.jobs,
        })
    }
}

impl Inventory {
    /// Parses and validates an inventory document.
    pub fn from_json(json: &str) -> MonitorResult<Self> {
        let file: InventoryFile = serde_json::from_str(json)?;
        Inventory::try_from(file)
    }

    /// Reads [`Inventory::from_json`] input from disk.
    pub fn from_file(path: &Path) -> MonitorResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

/// Collection access used by the monitoring service.
pub trait MonitorStore: Send + Sync {
    /// A consistent read view for the duration of one request.
    fn snapshot(&self) -> Arc<Inventory>;

    /// Stores the latest opaque scan payload reported by a host agent.
    fn record_scan(&self, host_id: HostId, scan: serde_json::Value) -> MonitorResult<()>;
}

/// Copy-on-write in-memory store. Readers hold an `Arc` to the snapshot they
/// started with; writers swap in a new one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    current: RwLock<Arc<Inventory>>,
}

impl MemoryStore {
    /// Publishes `inventory` as the first snapshot.
    pub fn new(inventory: Inventory) -> Self {
        Self {
            current: RwLock::new(Arc::new(inventory)),
        }
    }

    /// Applies a mutation to a private copy and publishes it.
    pub fn update<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut Inventory) -> T,
    {
        let mut current = self.current.write();
        f(Arc::make_mut(&mut current))
    }
}

impl MonitorStore for MemoryStore {
    fn snapshot(&self) -> Arc<Inventory> {
        Arc::clone(&self.current.read())
    }

    fn record_scan(&self, host_id: HostId, scan: serde_json::Value) -> MonitorResult<()> {
        self.update(|inv| match inv.graph.host_mut(host_id) {
            Some(host) => {
                host.last_scan = Some(scan);
                Ok(())
            }
            None => Err(MonitorError::not_found("host", host_id)),
        })
    }
}

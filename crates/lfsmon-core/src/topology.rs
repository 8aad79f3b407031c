//! Hosts, filesystems, targets and the mounts that tie them together.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{MonitorError, MonitorResult};
use crate::model::{Filesystem, Host, Target, TargetKind, TargetMount, TargetState};
use crate::types::{FilesystemId, HostId, Nid, TargetId};

/// Per-target summary returned by kind-filtered listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    /// Target id.
    pub id: TargetId,
    /// Display name of the primary server, or empty.
    pub primary_server_name: String,
    /// MGT, MDT or OST.
    pub kind: TargetKind,
    /// See [`ResourceGraph::status_string`].
    pub status: String,
    /// Display label.
    pub label: String,
    /// Owning filesystem; empty for an MGT.
    pub filesystem_id: Option<FilesystemId>,
}

/// Minimal per-target record used by the unscoped target listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetBrief {
    /// Target id.
    pub id: TargetId,
    /// Display name of the primary server, or empty.
    pub primary_server_name: String,
    /// MGT, MDT or OST.
    pub kind: TargetKind,
    /// Display label.
    pub label: String,
}

/// Read view of the cluster topology.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    hosts: BTreeMap<HostId, Host>,
    filesystems: BTreeMap<FilesystemId, Filesystem>,
    targets: BTreeMap<TargetId, Target>,
    mounts: Vec<TargetMount>,
}

impl ResourceGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from flat entity lists and checks its invariants.
    pub fn from_parts(
        hosts: Vec<Host>,
        filesystems: Vec<Filesystem>,
        targets: Vec<Target>,
        mounts: Vec<TargetMount>,
    ) -> MonitorResult<Self> {
        let mut graph = Self::new();
        for host in hosts {
            graph.upsert_host(host);
        }
        for fs in filesystems {
            graph.upsert_filesystem(fs);
        }
        for target in targets {
            graph.upsert_target(target);
        }
        for mount in mounts {
            graph.add_mount(mount)?;
        }
        graph.validate()?;
        Ok(graph)
    }

    /// Inserts or replaces a host.
    pub fn upsert_host(&mut self, host: Host) {
        self.hosts.insert(host.id, host);
    }

    /// Inserts or replaces a filesystem.
    pub fn upsert_filesystem(&mut self, fs: Filesystem) {
        self.filesystems.insert(fs.id, fs);
    }

    /// Inserts or replaces a target.
    pub fn upsert_target(&mut self, target: Target) {
        self.targets.insert(target.id, target);
    }

    /// Adds a mount association. A target may have at most one primary mount.
    pub fn add_mount(&mut self, mount: TargetMount) -> MonitorResult<()> {
        if mount.primary
            && self
                .mounts
                .iter()
                .any(|m| m.target_id == mount.target_id && m.primary)
        {
            return Err(MonitorError::Integrity(format!(
                "target {} already has a primary mount",
                mount.target_id
            )));
        }
        self.mounts
            .retain(|m| !(m.target_id == mount.target_id && m.host_id == mount.host_id));
        self.mounts.push(mount);
        Ok(())
    }

    /// Checks the structural invariants of the graph.
    pub fn validate(&self) -> MonitorResult<()> {
        let mut fs_names = HashSet::new();
        for fs in self.filesystems.values() {
            if !fs_names.insert(fs.name.as_str()) {
                return Err(MonitorError::Integrity(format!(
                    "filesystem name {} is not unique",
                    fs.name
                )));
            }
            match self.targets.get(&fs.mgt_id) {
                Some(t) if t.kind == TargetKind::Mgt => {}
                _ => {
                    return Err(MonitorError::Integrity(format!(
                        "filesystem {} does not reference an MGT",
                        fs.name
                    )))
                }
            }
        }

        for target in self.targets.values() {
            match (target.kind.is_filesystem_scoped(), target.filesystem_id) {
                (true, Some(fs_id)) if self.filesystems.contains_key(&fs_id) => {}
                (true, _) => {
                    return Err(MonitorError::Integrity(format!(
                        "{} {} has no valid filesystem",
                        target.kind, target.name
                    )))
                }
                (false, None) => {}
                (false, Some(_)) => {
                    return Err(MonitorError::Integrity(format!(
                        "MGT {} must not reference a filesystem",
                        target.name
                    )))
                }
            }
        }

        let mut primaries = HashSet::new();
        for mount in &self.mounts {
            if !self.targets.contains_key(&mount.target_id) {
                return Err(MonitorError::Integrity(format!(
                    "mount references unknown target {}",
                    mount.target_id
                )));
            }
            if !self.hosts.contains_key(&mount.host_id) {
                return Err(MonitorError::Integrity(format!(
                    "mount references unknown host {}",
                    mount.host_id
                )));
            }
            if mount.primary && !primaries.insert(mount.target_id) {
                return Err(MonitorError::Integrity(format!(
                    "target {} has more than one primary mount",
                    mount.target_id
                )));
            }
        }
        Ok(())
    }

    /// Looks up a host.
    pub fn host(&self, id: HostId) -> Option<&Host> {
        self.hosts.get(&id)
    }

    /// Mutable host lookup.
    pub fn host_mut(&mut self, id: HostId) -> Option<&mut Host> {
        self.hosts.get_mut(&id)
    }

    /// Like [`ResourceGraph::host`], but a missing host is `NotFound`.
    pub fn require_host(&self, id: HostId) -> MonitorResult<&Host> {
        self.host(id).ok_or_else(|| MonitorError::not_found("host", id))
    }

    /// Finds the host with this exact fqdn.
    pub fn host_by_fqdn(&self, fqdn: &str) -> Option<&Host> {
        self.hosts.values().find(|h| h.fqdn == fqdn)
    }

    /// Looks up a filesystem.
    pub fn filesystem(&self, id: FilesystemId) -> Option<&Filesystem> {
        self.filesystems.get(&id)
    }

    /// Like [`ResourceGraph::filesystem`], but a missing one is `NotFound`.
    pub fn require_filesystem(&self, id: FilesystemId) -> MonitorResult<&Filesystem> {
        self.filesystem(id)
            .ok_or_else(|| MonitorError::not_found("filesystem", id))
    }

    /// Looks up a target.
    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(&id)
    }

    /// All hosts in id order.
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    /// All filesystems in id order.
    pub fn filesystems(&self) -> impl Iterator<Item = &Filesystem> {
        self.filesystems.values()
    }

    /// All targets in id order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// Every mount association.
    pub fn mounts(&self) -> &[TargetMount] {
        &self.mounts
    }

    /// Targets of one kind in id order.
    pub fn targets_of_kind(&self, kind: TargetKind) -> impl Iterator<Item = &Target> {
        self.targets.values().filter(move |t| t.kind == kind)
    }

    /// The MGT serving the filesystem followed by its MDTs and OSTs.
    pub fn filesystem_targets(&self, fs_id: FilesystemId) -> MonitorResult<Vec<&Target>> {
        let fs = self.require_filesystem(fs_id)?;
        let mut targets: Vec<&Target> = self.target(fs.mgt_id).into_iter().collect();
        for kind in [TargetKind::Mdt, TargetKind::Ost] {
            targets.extend(
                self.targets_of_kind(kind)
                    .filter(|t| t.filesystem_id == Some(fs_id)),
            );
        }
        Ok(targets)
    }

    /// Filesystems served by an MGT.
    pub fn filesystems_for_mgt(&self, mgt_id: TargetId) -> Vec<&Filesystem> {
        self.filesystems
            .values()
            .filter(|fs| fs.mgt_id == mgt_id)
            .collect()
    }

    /// Mount associations of one target.
    pub fn mounts_for(&self, target_id: TargetId) -> impl Iterator<Item = &TargetMount> {
        self.mounts.iter().filter(move |m| m.target_id == target_id)
    }

    /// True when `host_id` can serve the target.
    pub fn is_mountable_on(&self, target_id: TargetId, host_id: HostId) -> bool {
        self.mounts_for(target_id).any(|m| m.host_id == host_id)
    }

    /// The host holding the primary mount.
    pub fn primary_server(&self, target_id: TargetId) -> Option<&Host> {
        self.mounts_for(target_id)
            .find(|m| m.primary)
            .and_then(|m| self.host(m.host_id))
    }

    fn primary_server_name(&self, target_id: TargetId) -> String {
        self.primary_server(target_id)
            .map(|h| h.pretty_name().to_string())
            .unwrap_or_default()
    }

    /// Targets currently mounted and running on the given host.
    pub fn active_targets_on(&self, host_id: HostId) -> impl Iterator<Item = &Target> {
        self.targets
            .values()
            .filter(move |t| t.state == TargetState::Mounted && t.active_host == Some(host_id))
    }

    /// Human-readable run status of a target.
    pub fn status_string(&self, target: &Target) -> String {
        match target.state {
            TargetState::Unformatted
            | TargetState::Formatted
            | TargetState::Registered
            | TargetState::Removed => target.state.as_str().to_uppercase(),
            TargetState::Mounted => {
                let on_primary = target
                    .active_host
                    .zip(self.primary_server(target.id).map(|h| h.id))
                    .map(|(active, primary)| active == primary)
                    .unwrap_or(false);
                if on_primary {
                    "STARTED".to_string()
                } else {
                    "FAILOVER".to_string()
                }
            }
            TargetState::Unmounted => "STOPPED".to_string(),
        }
    }

    /// Resolves the targets matching a filesystem/host/kind scope.
    ///
    /// MGTs are never narrowed by filesystem, only by host. Results are grouped
    /// by kind in the requested order, ascending id within a kind.
    pub fn targets_for(
        &self,
        filesystem_id: Option<FilesystemId>,
        host_id: Option<HostId>,
        kinds: &[TargetKind],
    ) -> MonitorResult<Vec<&Target>> {
        if let Some(fs_id) = filesystem_id {
            self.require_filesystem(fs_id)?;
        }
        if let Some(host_id) = host_id {
            self.require_host(host_id)?;
        }
        let kinds = if kinds.is_empty() {
            &TargetKind::ALL[..]
        } else {
            kinds
        };

        let mut result = Vec::new();
        let mut seen = HashSet::new();
        for &kind in kinds {
            if !seen.insert(kind) {
                continue;
            }
            result.extend(self.targets_of_kind(kind).filter(|t| {
                let fs_match = match (kind.is_filesystem_scoped(), filesystem_id) {
                    (true, Some(fs_id)) => t.filesystem_id == Some(fs_id),
                    _ => true,
                };
                let host_match = host_id.map_or(true, |h| self.is_mountable_on(t.id, h));
                fs_match && host_match
            }));
        }
        Ok(result)
    }

    /// Summary record of a target.
    pub fn summarize(&self, target: &Target) -> TargetSummary {
        TargetSummary {
            id: target.id,
            primary_server_name: self.primary_server_name(target.id),
            kind: target.kind,
            status: self.status_string(target),
            label: target.label().to_string(),
            filesystem_id: if target.kind.is_filesystem_scoped() {
                target.filesystem_id
            } else {
                None
            },
        }
    }

    /// Brief record of a target.
    pub fn brief(&self, target: &Target) -> TargetBrief {
        TargetBrief {
            id: target.id,
            primary_server_name: self.primary_server_name(target.id),
            kind: target.kind,
            label: target.label().to_string(),
        }
    }

    /// Hosts carrying `nid`.
    pub fn hosts_by_nid(&self, nid: &Nid) -> Vec<&Host> {
        self.hosts.values().filter(|h| h.has_nid(nid)).collect()
    }

    /// Targets named exactly `name`.
    pub fn targets_by_name(&self, name: &str) -> Vec<&Target> {
        self.targets.values().filter(|t| t.name == name).collect()
    }
}

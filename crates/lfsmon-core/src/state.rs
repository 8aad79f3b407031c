//! Transition availability for hosts, filesystems and targets.
//!
//! Every lifecycle has a static successor table. The [`StateManager`] narrows
//! that table using the resource's neighbourhood in the [`ResourceGraph`] and
//! any jobs still in flight. It only borrows a read snapshot and is rebuilt
//! for every request.

use std::collections::BTreeSet;

use crate::error::{MonitorError, MonitorResult};
use crate::model::{Filesystem, FilesystemState, Host, HostState, Job, Target, TargetKind, TargetState};
use crate::topology::ResourceGraph;
use crate::types::{FilesystemId, HostId, ResourceKind, ResourceRef, TargetId};

/// A lifecycle: its full state set plus the legal successors of each state.
pub trait Lifecycle: Copy + Ord + Sized + 'static {
    /// Every state of the lifecycle.
    const ALL: &'static [Self];

    /// States reachable in one step, before graph constraints.
    fn successors(self) -> &'static [Self];

    /// Name used on the wire.
    fn name(self) -> &'static str;

    /// True when no transition leaves this state.
    fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }
}

impl Lifecycle for TargetState {
    const ALL: &'static [Self] = &[
        TargetState::Unformatted,
        TargetState::Formatted,
        TargetState::Registered,
        TargetState::Unmounted,
        TargetState::Mounted,
        TargetState::Removed,
    ];

    fn successors(self) -> &'static [Self] {
        use TargetState::*;
        match self {
            Unformatted => &[Formatted, Removed],
            Formatted => &[Registered, Removed],
            Registered => &[Unmounted, Removed],
            Unmounted => &[Mounted, Removed],
            Mounted => &[Unmounted],
            Removed => &[],
        }
    }

    fn name(self) -> &'static str {
        self.as_str()
    }
}

impl Lifecycle for HostState {
    const ALL: &'static [Self] = &[
        HostState::Unconfigured,
        HostState::LnetUnloaded,
        HostState::LnetDown,
        HostState::LnetUp,
        HostState::Removed,
    ];

    fn successors(self) -> &'static [Self] {
        use HostState::*;
        match self {
            Unconfigured => &[LnetUnloaded, Removed],
            LnetUnloaded => &[LnetDown, Removed],
            LnetDown => &[LnetUnloaded, LnetUp, Removed],
            LnetUp => &[LnetDown, Removed],
            Removed => &[],
        }
    }

    fn name(self) -> &'static str {
        self.as_str()
    }
}

impl Lifecycle for FilesystemState {
    const ALL: &'static [Self] = &[
        FilesystemState::Stopped,
        FilesystemState::Available,
        FilesystemState::Unavailable,
        FilesystemState::Removed,
    ];

    fn successors(self) -> &'static [Self] {
        use FilesystemState::*;
        match self {
            Stopped => &[Available, Removed],
            Available => &[Stopped, Removed],
            Unavailable => &[Stopped, Available, Removed],
            Removed => &[],
        }
    }

    fn name(self) -> &'static str {
        self.as_str()
    }
}

const REMOVED: &str = "removed";

/// Computes available transitions against a read snapshot of the cluster.
#[derive(Debug, Clone, Copy)]
pub struct StateManager<'a> {
    graph: &'a ResourceGraph,
    jobs: &'a [Job],
}

impl<'a> StateManager<'a> {
    /// Borrows a snapshot of the graph and the job list.
    pub fn new(graph: &'a ResourceGraph, jobs: &'a [Job]) -> Self {
        Self { graph, jobs }
    }

    fn pending_transitions(&self, resource: ResourceRef) -> impl Iterator<Item = &'a str> + 'a {
        let jobs: &'a [Job] = self.jobs;
        jobs
            .iter()
            .filter(|j| !j.is_complete())
            .filter_map(|j| j.transition.as_ref())
            .filter(move |t| t.resource == resource)
            .map(|t| t.to_state.as_str())
    }

    fn is_busy(&self, resource: ResourceRef) -> bool {
        self.pending_transitions(resource).next().is_some()
    }

    fn is_being_removed(&self, resource: ResourceRef) -> bool {
        self.pending_transitions(resource).any(|to| to == REMOVED)
    }

    fn filesystem_gone(&self, fs_id: FilesystemId) -> bool {
        match self.graph.filesystem(fs_id) {
            Some(fs) => {
                fs.state == FilesystemState::Removed
                    || self.is_being_removed(ResourceRef::filesystem(fs_id))
            }
            None => true,
        }
    }

    fn host_can_serve(&self, host_id: HostId) -> bool {
        match self.graph.host(host_id) {
            Some(host) => {
                host.state == HostState::LnetUp && !self.is_being_removed(ResourceRef::host(host_id))
            }
            None => false,
        }
    }

    fn mgt_running(&self, fs_id: FilesystemId) -> bool {
        self.graph
            .filesystem(fs_id)
            .and_then(|fs| self.graph.target(fs.mgt_id))
            .map(|mgt| mgt.state == TargetState::Mounted)
            .unwrap_or(false)
    }

    /// States `target` may move to next.
    pub fn target_transitions(&self, target: &Target) -> BTreeSet<TargetState> {
        if self.is_busy(ResourceRef::target(target.id)) {
            return BTreeSet::new();
        }
        if let Some(fs_id) = target.filesystem_id {
            if self.filesystem_gone(fs_id) {
                return BTreeSet::new();
            }
        }

        target
            .state
            .successors()
            .iter()
            .copied()
            .filter(|next| match next {
                TargetState::Mounted => self
                    .graph
                    .primary_server(target.id)
                    .map(|h| self.host_can_serve(h.id))
                    .unwrap_or(false),
                TargetState::Registered => match target.filesystem_id {
                    Some(fs_id) => self.mgt_running(fs_id),
                    None => true,
                },
                TargetState::Removed if target.kind == TargetKind::Mgt => self
                    .graph
                    .filesystems_for_mgt(target.id)
                    .iter()
                    .all(|fs| fs.state == FilesystemState::Removed),
                _ => true,
            })
            .collect()
    }

    /// States `host` may move to next.
    pub fn host_transitions(&self, host: &Host) -> BTreeSet<HostState> {
        if self.is_busy(ResourceRef::host(host.id)) {
            return BTreeSet::new();
        }
        let serving = self.graph.active_targets_on(host.id).next().is_some();

        host.state
            .successors()
            .iter()
            .copied()
            .filter(|next| match next {
                HostState::LnetDown | HostState::Removed => !serving,
                _ => true,
            })
            .collect()
    }

    /// States `fs` may move to next.
    pub fn filesystem_transitions(&self, fs: &Filesystem) -> BTreeSet<FilesystemState> {
        if self.is_busy(ResourceRef::filesystem(fs.id)) {
            return BTreeSet::new();
        }

        fs.state
            .successors()
            .iter()
            .copied()
            .filter(|next| match next {
                FilesystemState::Available => self.filesystem_complete(fs),
                _ => true,
            })
            .collect()
    }

    fn filesystem_complete(&self, fs: &Filesystem) -> bool {
        let alive = |t: &&Target| t.state != TargetState::Removed;
        let mgt_ok = self.graph.target(fs.mgt_id).filter(alive).is_some();
        let has = |kind: TargetKind| {
            self.graph
                .targets_of_kind(kind)
                .filter(|t| t.filesystem_id == Some(fs.id))
                .any(|t| t.state != TargetState::Removed)
        };
        mgt_ok && has(TargetKind::Mdt) && has(TargetKind::Ost)
    }

    /// Resolves a reference and returns its available transitions in lifecycle order.
    pub fn transitions_for(&self, resource: ResourceRef) -> MonitorResult<Vec<&'static str>> {
        let available = match resource.kind {
            ResourceKind::Host => {
                let host = self.graph.require_host(HostId::new(resource.id))?;
                names(self.host_transitions(host))
            }
            ResourceKind::Filesystem => {
                let fs = self.graph.require_filesystem(FilesystemId::new(resource.id))?;
                names(self.filesystem_transitions(fs))
            }
            ResourceKind::Target => {
                let target = self
                    .graph
                    .target(TargetId::new(resource.id))
                    .ok_or_else(|| MonitorError::not_found("target", resource.id))?;
                names(self.target_transitions(target))
            }
        };
        Ok(available)
    }
}

/// Checks that `state` names a state of the lifecycle `kind` belongs to.
pub fn validate_state_name(kind: ResourceKind, state: &str) -> MonitorResult<()> {
    fn known<S: Lifecycle>(state: &str) -> bool {
        S::ALL.iter().any(|s| s.name() == state)
    }
    let (ok, what) = match kind {
        ResourceKind::Host => (known::<HostState>(state), "host"),
        ResourceKind::Filesystem => (known::<FilesystemState>(state), "filesystem"),
        ResourceKind::Target => (known::<TargetState>(state), "target"),
    };
    if ok {
        Ok(())
    } else {
        Err(MonitorError::invalid(state, format!("not a {} state", what)))
    }
}

/// Wire names of a transition set.
pub fn names<S: Lifecycle>(states: BTreeSet<S>) -> Vec<&'static str> {
    states.into_iter().map(Lifecycle::name).collect()
}

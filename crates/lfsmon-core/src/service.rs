//! The monitoring operations exposed to the request-handling layer.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, error};

use crate::annotate::LogAnnotator;
use crate::error::{MonitorError, MonitorResult};
use crate::model::{Alert, Event, EventType, Job, LogRecord, Severity, Target, TargetKind};
use crate::plugin::PluginTransport;
use crate::query::{paginate, select, Page, PageRequest, Predicate};
use crate::state::{names, StateManager};
use crate::store::{Inventory, MonitorStore};
use crate::topology::{ResourceGraph, TargetBrief, TargetSummary};
use crate::types::{FilesystemId, HostId, ResourceRef, TargetId};

/// Display format for event and log timestamps.
pub const ROW_DATE_FORMAT: &str = "%b %d %H:%M:%S";

/// Format of the start/end bounds accepted by the log listing.
pub const LOG_RANGE_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Tunables for [`MonitorService`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// How long completed jobs remain visible.
    pub job_retention: Duration,
    /// Page size applied when a listing request omits one.
    pub default_page_size: Option<usize>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            job_retention: Duration::minutes(60),
            default_page_size: None,
        }
    }
}

/// Full description of a target with its available transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDetails {
    /// Target id.
    pub id: TargetId,
    /// Lustre name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// MGT, MDT or OST.
    pub kind: TargetKind,
    /// Lifecycle state name.
    pub state: String,
    /// Operational status string.
    pub status: String,
    /// Primary server display name, or empty.
    pub primary_server_name: String,
    /// Where the target is mounted now.
    pub active_host_name: Option<String>,
    /// Owning filesystem.
    pub filesystem_id: Option<FilesystemId>,
    /// Name of the owning filesystem.
    pub filesystem_name: Option<String>,
    /// States the target may move to next.
    pub available_transitions: Vec<String>,
}

/// An MGT together with the filesystems it serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MgtDetails {
    /// The MGT itself.
    #[serde(flatten)]
    pub target: TargetDetails,
    /// Names of the filesystems it serves.
    pub fs_names: Vec<String>,
}

/// Filters for the event listing. Severity and type are raw tokens.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Only events about this host.
    pub host_id: Option<HostId>,
    /// Severity token, e.g. `ERROR`.
    pub severity: Option<String>,
    /// Event type token, e.g. `SyslogEvent`.
    pub event_type: Option<String>,
    /// Page window.
    pub page: PageRequest,
}

/// One row of the event listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    /// Creation time, `Mon DD HH:MM:SS`.
    pub date: String,
    /// Host display name, or empty.
    pub event_host: String,
    /// Severity name.
    pub event_severity: String,
    /// Event text.
    pub event_message: String,
}

/// One row of the latest-events feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestEventRow {
    /// Creation time.
    pub event_created_at: DateTime<Utc>,
    /// Host display name, or empty.
    pub event_host: String,
    /// Severity name.
    pub event_severity: String,
    /// Event text.
    pub event_message: String,
}

/// Filters for the log listing.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Only lines from this host.
    pub host_id: Option<HostId>,
    /// Lower bound, `%m/%d/%Y %H:%M`.
    pub start_time: Option<String>,
    /// Upper bound, same format.
    pub end_time: Option<String>,
    /// Only Lustre kernel messages.
    pub lustre_only: bool,
    /// Case-insensitive substring.
    pub search: Option<String>,
    /// Page window.
    pub page: PageRequest,
}

/// One annotated syslog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    /// Message with entity references.
    pub message: String,
    /// Syslog tag without the trailing colon.
    pub service: String,
    /// Reported time, `Mon DD HH:MM:SS`.
    pub date: String,
    /// Sending host.
    pub host: String,
    /// `log_error`, `log_warning` or `log_info`.
    #[serde(rename = "DT_RowClass")]
    pub row_class: String,
}

/// A host agent's periodic check-in.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanUpdate {
    /// Host the agent runs on.
    pub fqdn: String,
    /// Agent secret.
    pub token: String,
    /// Opaque scan snapshot to store.
    #[serde(default)]
    pub update_scan: Option<Value>,
    /// plugin name → request id → response payload
    #[serde(default)]
    pub plugins: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Requests handed back to a checking-in agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReply {
    /// plugin name → requests queued for the agent
    pub plugins: BTreeMap<String, Vec<Value>>,
}

/// Stateless facade over the store, state manager, query engine and annotator.
pub struct MonitorService {
    store: Arc<dyn MonitorStore>,
    transport: Arc<dyn PluginTransport>,
    annotator: LogAnnotator,
    settings: ServiceSettings,
}

impl MonitorService {
    /// Wires a service over a store and plugin transport.
    pub fn new(
        store: Arc<dyn MonitorStore>,
        transport: Arc<dyn PluginTransport>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            transport,
            annotator: LogAnnotator::new(),
            settings,
        }
    }

    /// Active tunables.
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn details(&self, inv: &Inventory, sm: &StateManager<'_>, target: &Target) -> TargetDetails {
        let graph = &inv.graph;
        let filesystem = target.filesystem_id.and_then(|id| graph.filesystem(id));
        TargetDetails {
            id: target.id,
            name: target.name.clone(),
            label: target.label().to_string(),
            kind: target.kind,
            state: target.state.to_string(),
            status: graph.status_string(target),
            primary_server_name: graph
                .primary_server(target.id)
                .map(|h| h.pretty_name().to_string())
                .unwrap_or_default(),
            active_host_name: target
                .active_host
                .and_then(|id| graph.host(id))
                .map(|h| h.pretty_name().to_string()),
            filesystem_id: filesystem.map(|fs| fs.id),
            filesystem_name: filesystem.map(|fs| fs.name.clone()),
            available_transitions: names(sm.target_transitions(target))
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Every MGT with the filesystems it serves and its available transitions.
    pub fn list_mgts(&self) -> MonitorResult<Vec<MgtDetails>> {
        let inv = self.store.snapshot();
        let sm = StateManager::new(&inv.graph, &inv.jobs);
        Ok(inv
            .graph
            .targets_of_kind(TargetKind::Mgt)
            .map(|mgt| MgtDetails {
                target: self.details(&inv, &sm, mgt),
                fs_names: inv
                    .graph
                    .filesystems_for_mgt(mgt.id)
                    .into_iter()
                    .map(|fs| fs.name.clone())
                    .collect(),
            })
            .collect())
    }

    /// Targets of one filesystem (its MGT included), or all targets.
    pub fn list_targets(&self, filesystem_id: Option<FilesystemId>) -> MonitorResult<Vec<TargetDetails>> {
        let inv = self.store.snapshot();
        let sm = StateManager::new(&inv.graph, &inv.jobs);
        let targets: Vec<&Target> = match filesystem_id {
            Some(fs_id) => inv.graph.filesystem_targets(fs_id)?,
            None => inv.graph.targets().collect(),
        };
        Ok(targets
            .into_iter()
            .map(|t| self.details(&inv, &sm, t))
            .collect())
    }

    /// Summary records scoped by filesystem, host and kind.
    pub fn list_targets_by_kind(
        &self,
        filesystem_id: Option<FilesystemId>,
        host_id: Option<HostId>,
        kinds: &[TargetKind],
    ) -> MonitorResult<Vec<TargetSummary>> {
        let inv = self.store.snapshot();
        let targets = inv.graph.targets_for(filesystem_id, host_id, kinds)?;
        Ok(targets.into_iter().map(|t| inv.graph.summarize(t)).collect())
    }

    /// Unscoped id/server/kind/label listing.
    pub fn list_targets_brief(&self, kinds: &[TargetKind]) -> MonitorResult<Vec<TargetBrief>> {
        let inv = self.store.snapshot();
        let targets = inv.graph.targets_for(None, None, kinds)?;
        Ok(targets.into_iter().map(|t| inv.graph.brief(t)).collect())
    }

    /// Available transitions of any resource, in lifecycle order.
    pub fn transitions(&self, resource: ResourceRef) -> MonitorResult<Vec<String>> {
        let inv = self.store.snapshot();
        let sm = StateManager::new(&inv.graph, &inv.jobs);
        Ok(sm
            .transitions_for(resource)?
            .into_iter()
            .map(String::from)
            .collect())
    }

    /// Events newest first, narrowed by host, severity and payload type.
    pub fn list_events(&self, query: &EventQuery) -> MonitorResult<Page<EventRow>> {
        let inv = self.store.snapshot();
        if let Some(host_id) = query.host_id {
            inv.graph.require_host(host_id)?;
        }
        let severity = query
            .severity
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<Severity>)
            .transpose()?;
        let event_type = query
            .event_type
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<EventType>)
            .transpose()?;

        let predicate = Predicate::new()
            .and_some(query.host_id, |e: &Event, h| e.host_id == Some(*h))
            .and_some(severity, |e: &Event, s| e.severity == *s)
            .and_some(event_type, |e: &Event, t| e.payload.event_type() == *t);
        let events = select(&inv.events, &predicate, |a, b| b.created_at.cmp(&a.created_at));

        let request = query.page.with_default_size(self.settings.default_page_size);
        paginate(request, events, |e| EventRow {
            date: e.created_at.format(ROW_DATE_FORMAT).to_string(),
            event_host: host_name(&inv.graph, e.host_id),
            event_severity: e.severity.to_string(),
            event_message: e.message.clone(),
        })
    }

    /// Every event, newest first, without paging.
    pub fn list_latest_events(&self) -> MonitorResult<Vec<LatestEventRow>> {
        let inv = self.store.snapshot();
        let events = select(&inv.events, &Predicate::new(), |a, b| b.created_at.cmp(&a.created_at));
        Ok(events
            .into_iter()
            .map(|e| LatestEventRow {
                event_created_at: e.created_at,
                event_host: host_name(&inv.graph, e.host_id),
                event_severity: e.severity.to_string(),
                event_message: e.message.clone(),
            })
            .collect())
    }

    /// Active alerts when `active` is set, otherwise the cleared history.
    /// Ordered by end time; active alerts have none and sort last.
    pub fn list_alerts(&self, active: bool, page: PageRequest) -> MonitorResult<Page<Alert>> {
        let inv = self.store.snapshot();
        let predicate = Predicate::new().and(move |a: &Alert| a.active == active);
        let alerts = select(&inv.alerts, &predicate, |a, b| {
            (a.end.is_none(), a.end).cmp(&(b.end.is_none(), b.end))
        });
        let request = page.with_default_size(self.settings.default_page_size);
        paginate(request, alerts, Alert::clone)
    }

    /// Syslog records newest first with NIDs and target names annotated.
    pub fn list_logs(&self, query: &LogQuery) -> MonitorResult<Page<LogRow>> {
        let inv = self.store.snapshot();
        let start = parse_range_bound(query.start_time.as_deref())?;
        let end = parse_range_bound(query.end_time.as_deref())?;
        let host_prefix = match query.host_id {
            Some(id) => Some(inv.graph.require_host(id)?.pretty_name().to_string()),
            None => None,
        };
        let search = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let predicate = Predicate::new()
            .and_some(start, |r: &LogRecord, s| r.device_reported_time >= *s)
            .and_some(end, |r: &LogRecord, e| r.device_reported_time <= *e)
            .and_some(host_prefix, |r: &LogRecord, p: &String| r.from_host.starts_with(p.as_str()))
            .and_some(query.lustre_only.then_some(()), |r: &LogRecord, _| {
                r.message.starts_with(" Lustre")
            })
            .and_some(search, |r: &LogRecord, needle: &String| {
                r.message.to_lowercase().contains(needle.as_str())
            });
        let records = select(&inv.logs, &predicate, |a, b| {
            b.device_reported_time.cmp(&a.device_reported_time)
        });

        let request = query.page.with_default_size(self.settings.default_page_size);
        paginate(request, records, |r| LogRow {
            message: self.annotator.annotate(&inv.graph, &r.message),
            service: r.syslog_tag.trim_end_matches(':').to_string(),
            date: r.device_reported_time.format(ROW_DATE_FORMAT).to_string(),
            host: r.from_host.clone(),
            row_class: log_class(&r.message).to_string(),
        })
    }

    /// Jobs not yet complete, plus any created within the retention window.
    pub fn list_jobs(&self) -> MonitorResult<Vec<Job>> {
        self.list_jobs_at(Utc::now())
    }

    /// [`MonitorService::list_jobs`] evaluated at `now`.
    pub fn list_jobs_at(&self, now: DateTime<Utc>) -> MonitorResult<Vec<Job>> {
        let inv = self.store.snapshot();
        let cutoff = now
            .checked_sub_signed(self.settings.job_retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(inv
            .jobs
            .iter()
            .filter(|j| !j.is_complete() || j.created_at >= cutoff)
            .cloned()
            .collect())
    }

    /// Authenticates an agent check-in, stores its scan and relays plugin traffic.
    pub fn update_scan(&self, update: ScanUpdate) -> MonitorResult<ScanReply> {
        debug!("UpdateScan {}", update.fqdn);
        let inv = self.store.snapshot();
        let host = inv
            .graph
            .host_by_fqdn(&update.fqdn)
            .ok_or_else(|| MonitorError::not_found("host", &update.fqdn))?;

        let token_ok: bool = update
            .token
            .as_bytes()
            .ct_eq(host.agent_token.as_bytes())
            .into();
        if !token_ok {
            error!("Invalid token for host {}", update.fqdn);
            return Err(MonitorError::Forbidden);
        }

        if let Some(scan) = update.update_scan {
            self.store.record_scan(host.id, scan)?;
        }

        let mut reply = ScanReply::default();
        for (plugin, responses) in update.plugins {
            for (request_id, payload) in responses {
                self.transport
                    .send_response(&plugin, &host.fqdn, &request_id, payload);
            }
            let requests = self.transport.receive_all(&plugin, &host.fqdn);
            reply.plugins.insert(plugin, requests);
        }
        Ok(reply)
    }
}

fn host_name(graph: &ResourceGraph, host_id: Option<HostId>) -> String {
    host_id
        .and_then(|id| graph.host(id))
        .map(|h| h.pretty_name().to_string())
        .unwrap_or_default()
}

fn log_class(message: &str) -> &'static str {
    if message.contains("LustreError") {
        "log_error"
    } else {
        "log_info"
    }
}

fn parse_range_bound(raw: Option<&str>) -> MonitorResult<Option<DateTime<Utc>>> {
    let raw = match raw.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return Ok(None),
    };
    NaiveDateTime::parse_from_str(raw, LOG_RANGE_FORMAT)
        .map(|t| Some(t.and_utc()))
        .map_err(|e| MonitorError::invalid(raw, format!("expected {}: {}", LOG_RANGE_FORMAT, e)))
}

//! REST routes over [`lfsmon_core::MonitorService`].

use crate::config::MonitorConfig;
use crate::security::{bearer_token, constant_time_eq, AuthRateLimiter, PRUNE_INTERVAL};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lfsmon_core::model::{Alert, Job, TargetKind};
use lfsmon_core::query::{Page, PageRequest};
use lfsmon_core::service::{
    EventQuery, EventRow, LatestEventRow, LogQuery, LogRow, MgtDetails, ScanReply, ScanUpdate,
    TargetDetails,
};
use lfsmon_core::topology::{TargetBrief, TargetSummary};
use lfsmon_core::{FilesystemId, HostId, MonitorError, MonitorService, ResourceKind, ResourceRef};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Maps core errors onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(
    /// The failure being reported.
    pub MonitorError,
);

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        match err {
            MonitorError::InvalidArgument { .. } => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": err.to_string()}))).into_response()
            }
            MonitorError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": err.to_string()}))).into_response()
            }
            MonitorError::Forbidden => StatusCode::FORBIDDEN.into_response(),
            other => {
                tracing::error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({"error": "internal error"})),
                )
                    .into_response()
            }
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Query string of `/api/v1/targets`.
#[derive(Debug, Default, Deserialize)]
pub struct TargetsParams {
    /// Restrict to one filesystem.
    pub filesystem_id: Option<FilesystemId>,
}

/// Query string of the target summary and brief listings.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryParams {
    /// Restrict to one filesystem.
    pub filesystem_id: Option<FilesystemId>,
    /// Restrict to targets mountable on this host.
    pub host_id: Option<HostId>,
    /// Comma separated kind tokens, e.g. `OST,MDT`.
    pub kinds: Option<String>,
}

/// Query string of `/api/v1/events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventsParams {
    /// Events about this host.
    pub host_id: Option<HostId>,
    /// Severity token.
    pub severity: Option<String>,
    /// Event type token.
    pub event_type: Option<String>,
    /// First row.
    pub offset: Option<i64>,
    /// Page size.
    pub limit: Option<usize>,
}

/// Query string of `/api/v1/alerts`.
#[derive(Debug, Default, Deserialize)]
pub struct AlertsParams {
    /// Active alerts instead of the cleared history.
    #[serde(default)]
    pub active: bool,
    /// First row.
    pub offset: Option<i64>,
    /// Page size.
    pub limit: Option<usize>,
}

/// Query string of `/api/v1/logs`.
#[derive(Debug, Default, Deserialize)]
pub struct LogsParams {
    /// Lines from this host.
    pub host_id: Option<HostId>,
    /// Lower bound, `MM/DD/YYYY HH:MM`.
    pub start_time: Option<String>,
    /// Upper bound, `MM/DD/YYYY HH:MM`.
    pub end_time: Option<String>,
    /// Only Lustre kernel messages.
    #[serde(default)]
    pub lustre_only: bool,
    /// Case-insensitive substring.
    pub search: Option<String>,
    /// First row.
    pub offset: Option<i64>,
    /// Page size.
    pub limit: Option<usize>,
}

fn parse_kinds(raw: Option<&str>) -> Result<Vec<TargetKind>, MonitorError> {
    let tokens: Vec<&str> = raw.map(|r| r.split(',').collect()).unwrap_or_default();
    TargetKind::parse_list(&tokens)
}

/// HTTP front end of the monitor.
#[derive(Clone)]
pub struct MonitorApi {
    service: Arc<MonitorService>,
    config: Arc<MonitorConfig>,
    rate_limiter: Arc<AuthRateLimiter>,
}

impl MonitorApi {
    /// Wraps a service with the server configuration.
    pub fn new(service: Arc<MonitorService>, config: Arc<MonitorConfig>) -> Self {
        if config.admin_token.is_none() {
            tracing::warn!("Monitor API is running without authentication, set admin_token in config");
        }
        Self {
            service,
            config,
            rate_limiter: Arc::new(AuthRateLimiter::new()),
        }
    }

    /// All routes with auth, security headers and tracing.
    pub fn router(self: Arc<Self>) -> Router {
        let protected = Router::new()
            .route("/health", get(health_handler))
            .route("/api/v1/mgts", get(mgts_handler))
            .route("/api/v1/targets", get(targets_handler))
            .route("/api/v1/targets/summary", get(targets_summary_handler))
            .route("/api/v1/targets/brief", get(targets_brief_handler))
            .route("/api/v1/events", get(events_handler))
            .route("/api/v1/events/latest", get(latest_events_handler))
            .route("/api/v1/alerts", get(alerts_handler))
            .route("/api/v1/logs", get(logs_handler))
            .route("/api/v1/jobs", get(jobs_handler))
            .route("/api/v1/transitions/:kind/:id", get(transitions_handler))
            .layer(axum::middleware::from_fn_with_state(
                self.clone(),
                auth_middleware,
            ));

        let public = Router::new()
            .route("/ready", get(ready_handler))
            .route("/api/v1/agent/scan", post(agent_scan_handler));

        Router::new()
            .merge(protected)
            .merge(public)
            .layer(axum::middleware::from_fn(
                crate::security::security_headers_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    /// Binds the listener and serves until shutdown. Also sweeps the auth limiter.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = self.config.bind_addr;
        let limiter = Arc::clone(&self.rate_limiter);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                ticker.tick().await;
                limiter.prune();
            }
        });
        let router = Arc::new(self).router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Monitor API listening on {}", addr);

        axum::serve(listener, router.into_make_service()).await?;
        Ok(())
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ready_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

async fn mgts_handler(State(state): State<Arc<MonitorApi>>) -> ApiResult<Vec<MgtDetails>> {
    Ok(Json(state.service.list_mgts()?))
}

async fn targets_handler(
    State(state): State<Arc<MonitorApi>>,
    Query(params): Query<TargetsParams>,
) -> ApiResult<Vec<TargetDetails>> {
    Ok(Json(state.service.list_targets(params.filesystem_id)?))
}

async fn targets_summary_handler(
    State(state): State<Arc<MonitorApi>>,
    Query(params): Query<SummaryParams>,
) -> ApiResult<Vec<TargetSummary>> {
    let kinds = parse_kinds(params.kinds.as_deref())?;
    Ok(Json(state.service.list_targets_by_kind(
        params.filesystem_id,
        params.host_id,
        &kinds,
    )?))
}

async fn targets_brief_handler(
    State(state): State<Arc<MonitorApi>>,
    Query(params): Query<SummaryParams>,
) -> ApiResult<Vec<TargetBrief>> {
    let kinds = parse_kinds(params.kinds.as_deref())?;
    Ok(Json(state.service.list_targets_brief(&kinds)?))
}

async fn events_handler(
    State(state): State<Arc<MonitorApi>>,
    Query(params): Query<EventsParams>,
) -> ApiResult<Page<EventRow>> {
    let query = EventQuery {
        host_id: params.host_id,
        severity: params.severity,
        event_type: params.event_type,
        page: PageRequest::new(params.offset, params.limit),
    };
    Ok(Json(state.service.list_events(&query)?))
}

async fn latest_events_handler(State(state): State<Arc<MonitorApi>>) -> ApiResult<Vec<LatestEventRow>> {
    Ok(Json(state.service.list_latest_events()?))
}

async fn alerts_handler(
    State(state): State<Arc<MonitorApi>>,
    Query(params): Query<AlertsParams>,
) -> ApiResult<Page<Alert>> {
    let page = PageRequest::new(params.offset, params.limit);
    Ok(Json(state.service.list_alerts(params.active, page)?))
}

async fn logs_handler(
    State(state): State<Arc<MonitorApi>>,
    Query(params): Query<LogsParams>,
) -> ApiResult<Page<LogRow>> {
    let query = LogQuery {
        host_id: params.host_id,
        start_time: params.start_time,
        end_time: params.end_time,
        lustre_only: params.lustre_only,
        search: params.search,
        page: PageRequest::new(params.offset, params.limit),
    };
    Ok(Json(state.service.list_logs(&query)?))
}

async fn jobs_handler(State(state): State<Arc<MonitorApi>>) -> ApiResult<Vec<Job>> {
    Ok(Json(state.service.list_jobs()?))
}

async fn transitions_handler(
    State(state): State<Arc<MonitorApi>>,
    Path((kind, id)): Path<(String, u64)>,
) -> ApiResult<Vec<String>> {
    let kind: ResourceKind = kind.parse()?;
    Ok(Json(state.service.transitions(ResourceRef { kind, id })?))
}

async fn agent_scan_handler(
    State(state): State<Arc<MonitorApi>>,
    Json(update): Json<ScanUpdate>,
) -> ApiResult<ScanReply> {
    Ok(Json(state.service.update_scan(update)?))
}

fn client_id(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, r#"Bearer realm="lfsmon""#)],
        "Unauthorized",
    )
        .into_response()
}

async fn auth_middleware(
    State(state): State<Arc<MonitorApi>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return next.run(request).await;
    };

    let client = client_id(&request);
    if state.rate_limiter.is_rate_limited(&client) {
        return (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response();
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .is_some_and(|provided| constant_time_eq(provided, expected));

    if authorized {
        next.run(request).await
    } else {
        if state.rate_limiter.record_failure(&client) {
            tracing::warn!("Client {} locked out after repeated auth failures", client);
        }
        unauthorized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lfsmon_core::plugin::PluginQueues;
    use lfsmon_core::{Inventory, MemoryStore};
    use tower::ServiceExt;

    const INVENTORY: &str = r#"{
        "hosts": [
            {"id": 1, "fqdn": "mds1.lab", "address": "10.0.0.1", "agent_token": "mds-secret",
             "nids": ["10.0.0.1@tcp"], "state": "lnet_up"},
            {"id": 2, "fqdn": "oss1.lab", "address": "10.0.0.2", "agent_token": "oss-secret",
             "nids": ["10.0.0.2@tcp"], "state": "lnet_up"}
        ],
        "filesystems": [{"id": 1, "name": "fs", "mgt_id": 1, "state": "available"}],
        "targets": [
            {"id": 1, "kind": "MGT", "name": "MGS", "state": "mounted", "active_host": 1},
            {"id": 10, "kind": "MDT", "name": "fs-MDT0000", "state": "mounted", "filesystem_id": 1, "active_host": 1},
            {"id": 11, "kind": "OST", "name": "fs-OST0000", "state": "unmounted", "filesystem_id": 1}
        ],
        "mounts": [
            {"target_id": 1, "host_id": 1, "primary": true},
            {"target_id": 10, "host_id": 1, "primary": true},
            {"target_id": 11, "host_id": 2, "primary": true}
        ],
        "events": [
            {"id": 1, "created_at": "2024-03-01T10:00:00Z", "severity": "INFO", "host_id": 1,
             "payload": {"type": "LearnEvent", "target_id": 10}, "message": "Discovered fs-MDT0000"},
            {"id": 2, "created_at": "2024-03-01T10:05:00Z", "severity": "WARNING", "host_id": 2,
             "payload": {"type": "SyslogEvent", "log_id": 1}, "message": "OST reconnect"}
        ],
        "alerts": [
            {"id": 1, "message": "fs-OST0000 offline", "severity": "ERROR", "host_id": 2,
             "begin": "2024-03-01T09:00:00Z", "active": true}
        ],
        "logs": [
            {"id": 1, "device_reported_time": "2024-03-01T10:05:00Z", "from_host": "oss1.lab",
             "syslog_tag": "kernel:", "message": " Lustre: fs-OST0000: connection from 10.0.0.1@tcp"}
        ],
        "jobs": [
            {"id": 1, "description": "Start fs-OST0000", "state": "pending", "created_at": "2024-03-01T10:00:00Z"}
        ]
    }"#;

    fn router_with(config: MonitorConfig) -> (Router, Arc<PluginQueues>) {
        let store = Arc::new(MemoryStore::new(Inventory::from_json(INVENTORY).unwrap()));
        let queues = Arc::new(PluginQueues::new());
        let service = Arc::new(MonitorService::new(
            store,
            queues.clone(),
            config.service_settings().unwrap(),
        ));
        let api = Arc::new(MonitorApi::new(service, Arc::new(config)));
        (api.router(), queues)
    }

    fn router() -> Router {
        router_with(MonitorConfig::default()).0
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn scan_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/agent/scan")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, json) = get_json(router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["cache-control"], "no-store");
    }

    #[tokio::test]
    async fn test_mgts_endpoint() {
        let (status, json) = get_json(router(), "/api/v1/mgts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["label"], "MGS");
        assert_eq!(json[0]["fs_names"][0], "fs");
        assert_eq!(json[0]["status"], "STARTED");
    }

    #[tokio::test]
    async fn test_targets_endpoint_unknown_filesystem() {
        let (status, json) = get_json(router(), "/api/v1/targets?filesystem_id=99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("99"));
    }

    #[tokio::test]
    async fn test_targets_endpoint_includes_transitions() {
        let (status, json) = get_json(router(), "/api/v1/targets?filesystem_id=1").await;
        assert_eq!(status, StatusCode::OK);
        let ost = &json[2];
        assert_eq!(ost["name"], "fs-OST0000");
        assert_eq!(ost["status"], "STOPPED");
        assert_eq!(ost["available_transitions"], serde_json::json!(["mounted", "removed"]));
    }

    #[tokio::test]
    async fn test_targets_summary_by_kind() {
        let (status, json) = get_json(router(), "/api/v1/targets/summary?kinds=OST,MDT").await;
        assert_eq!(status, StatusCode::OK);
        let kinds: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["kind"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["OST", "MDT"]);
    }

    #[tokio::test]
    async fn test_targets_summary_bad_kind() {
        let (status, json) = get_json(router(), "/api/v1/targets/summary?kinds=OST,XYZ").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("XYZ"));
    }

    #[tokio::test]
    async fn test_targets_brief() {
        let (status, json) = get_json(router(), "/api/v1/targets/brief").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 3);
        assert_eq!(json[2]["primary_server_name"], "oss1.lab");
    }

    #[tokio::test]
    async fn test_events_paged() {
        let (status, json) = get_json(router(), "/api/v1/events?offset=0&limit=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["iTotalRecords"], 2);
        assert_eq!(json["aaData"].as_array().unwrap().len(), 1);
        assert_eq!(json["aaData"][0]["event_host"], "oss1.lab");
    }

    #[tokio::test]
    async fn test_events_negative_offset() {
        let (status, _) = get_json(router(), "/api/v1/events?offset=-3").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_latest_events() {
        let (status, json) = get_json(router(), "/api/v1/events/latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["event_message"], "OST reconnect");
    }

    #[tokio::test]
    async fn test_alerts_active_only() {
        let (status, json) = get_json(router(), "/api/v1/alerts?active=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["iTotalRecords"], 1);
        assert_eq!(json["aaData"][0]["severity"], "ERROR");

        let (_, json) = get_json(router(), "/api/v1/alerts").await;
        assert_eq!(json["iTotalRecords"], 0);
    }

    #[tokio::test]
    async fn test_logs_annotated() {
        let (status, json) = get_json(router(), "/api/v1/logs?lustre_only=true").await;
        assert_eq!(status, StatusCode::OK);
        let row = &json["aaData"][0];
        assert_eq!(
            row["message"],
            " Lustre: [[target|11|fs-OST0000]]: connection from [[nid|10.0.0.1@tcp|10.0.0.1]]"
        );
        assert_eq!(row["service"], "kernel");
        assert_eq!(row["DT_RowClass"], "log_info");
    }

    #[tokio::test]
    async fn test_logs_bad_time() {
        let (status, _) = get_json(router(), "/api/v1/logs?start_time=tomorrow").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_jobs_endpoint() {
        let (status, json) = get_json(router(), "/api/v1/jobs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["state"], "pending");
    }

    #[tokio::test]
    async fn test_transitions_endpoint() {
        let (status, json) = get_json(router(), "/api/v1/transitions/target/10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!(["unmounted"]));

        let (status, _) = get_json(router(), "/api/v1/transitions/widget/10").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(router(), "/api/v1/transitions/host/77").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unauthorized_request_rejected_with_token() {
        let config = MonitorConfig {
            admin_token: Some("secret-token".to_string()),
            ..Default::default()
        };
        let (router, _) = router_with(config);

        let (status, _) = get_json(router, "/api/v1/mgts").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authorized_request_accepted_with_token() {
        let config = MonitorConfig {
            admin_token: Some("secret-token".to_string()),
            ..Default::default()
        };
        let (router, _) = router_with(config);

        let request = Request::builder()
            .uri("/api/v1/mgts")
            .header("Authorization", "Bearer secret-token")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_is_public() {
        let config = MonitorConfig {
            admin_token: Some("secret-token".to_string()),
            ..Default::default()
        };
        let (router, _) = router_with(config);
        let (status, _) = get_json(router, "/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_repeated_failures_rate_limited() {
        let config = MonitorConfig {
            admin_token: Some("secret-token".to_string()),
            ..Default::default()
        };
        let (router, _) = router_with(config);

        for _ in 0..5 {
            let request = Request::builder()
                .uri("/api/v1/jobs")
                .header("x-forwarded-for", "192.0.2.7")
                .header("Authorization", "Bearer wrong")
                .body(Body::empty())
                .unwrap();
            let response = router.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let request = Request::builder()
            .uri("/api/v1/jobs")
            .header("x-forwarded-for", "192.0.2.7")
            .header("Authorization", "Bearer secret-token")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_agent_scan_bad_token_forbidden() {
        let (router, queues) = router_with(MonitorConfig::default());
        queues.enqueue_request("linux", "oss1.lab", serde_json::json!({"op": "list"}));

        let response = router
            .oneshot(scan_request(serde_json::json!({
                "fqdn": "oss1.lab",
                "token": "mds-secret",
                "plugins": {"linux": {"r1": {"ok": true}}}
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        assert_eq!(queues.pending_requests("linux", "oss1.lab"), 1);
    }

    #[tokio::test]
    async fn test_agent_scan_relays_plugins() {
        let (router, queues) = router_with(MonitorConfig {
            admin_token: Some("admin".to_string()),
            ..Default::default()
        });
        queues.enqueue_request("linux", "oss1.lab", serde_json::json!({"op": "list"}));

        let response = router
            .oneshot(scan_request(serde_json::json!({
                "fqdn": "oss1.lab",
                "token": "oss-secret",
                "update_scan": {"mounts": []},
                "plugins": {"linux": {"r1": {"ok": true}}}
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["plugins"]["linux"][0]["op"], "list");
        assert_eq!(queues.take_responses("linux", "oss1.lab")[0].request_id, "r1");
    }

    #[tokio::test]
    async fn test_agent_scan_unknown_host() {
        let (router, _) = router_with(MonitorConfig::default());
        let response = router
            .oneshot(scan_request(serde_json::json!({"fqdn": "ghost.lab", "token": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

//! Bearer token checks, auth failure lockout and response headers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

const MAX_FAILURES: u32 = 5;
const FAILURE_WINDOW: Duration = Duration::from_secs(60);
const LOCKOUT: Duration = Duration::from_secs(60);
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// How often the server sweeps lapsed failure records.
pub const PRUNE_INTERVAL: Duration = FAILURE_WINDOW;

/// Compares two secrets without leaking where they differ.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").map(str::trim)
}

struct FailureRecord {
    failures: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

impl FailureRecord {
    fn is_live(&self, now: Instant) -> bool {
        self.window_start + FAILURE_WINDOW > now || self.locked_until.is_some_and(|until| until > now)
    }
}

/// Locks out a client after repeated authentication failures.
pub struct AuthRateLimiter {
    inner: Mutex<HashMap<String, FailureRecord>>,
}

impl AuthRateLimiter {
    /// An empty limiter.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Counts a failure for `client`. Returns true once the client is locked out.
    pub fn record_failure(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        if inner.len() >= MAX_TRACKED_CLIENTS && !inner.contains_key(client) {
            inner.retain(|_, r| r.is_live(now));
            if inner.len() >= MAX_TRACKED_CLIENTS {
                let oldest = inner
                    .iter()
                    .filter(|(_, r)| r.locked_until.is_none())
                    .min_by_key(|(_, r)| r.window_start)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    inner.remove(&oldest);
                }
            }
        }
        let record = inner.entry(client.to_string()).or_insert(FailureRecord {
            failures: 0,
            window_start: now,
            locked_until: None,
        });
        if record.window_start + FAILURE_WINDOW < now {
            record.failures = 0;
            record.window_start = now;
        }
        record.failures += 1;
        if record.failures >= MAX_FAILURES {
            record.locked_until = Some(now + LOCKOUT);
        }
        record.locked_until.is_some_and(|until| until > now)
    }

    /// True while `client` is locked out.
    pub fn is_rate_limited(&self, client: &str) -> bool {
        self.inner
            .lock()
            .get(client)
            .and_then(|r| r.locked_until)
            .is_some_and(|until| until > Instant::now())
    }

    /// Drops records whose window and lockout have both lapsed.
    pub fn prune(&self) {
        let now = Instant::now();
        self.inner.lock().retain(|_, r| r.is_live(now));
    }

    /// Number of clients with a live failure record.
    pub fn tracked_clients(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds hardening headers to every response.
pub async fn security_headers_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    use axum::http::{header, HeaderValue};

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    response
}

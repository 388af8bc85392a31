//! Fixed-window request limiting keyed by client address.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::HeaderMap;
use http::header::RETRY_AFTER;
use parking_lot::Mutex;

use crate::Limiter;
use crate::errors::{Error, JsonErrorResponse};

/// Number of tracked keys after which expired windows are dropped.
const PRUNE_THRESHOLD: usize = 4096;

const X_FORWARDED_FOR: http::HeaderName = http::HeaderName::from_static("x-forwarded-for");

/// At most `limit` requests per `window`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rule {
    pub limit: u32,
    pub window: Duration,
}

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Allowed,
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

#[derive(Default)]
struct Tracked {
    windows: HashMap<String, Vec<Window>>,
    /// Earliest time the next full prune may run.
    next_prune: Option<Instant>,
}

pub(crate) struct RateLimiter {
    rules: Vec<Rule>,
    tracked: Mutex<Tracked>,
}

impl Rule {
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(60),
        }
    }

    pub const fn per_hour(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(60 * 60),
        }
    }
}

impl Default for RateLimiter {
    /// 20 requests per minute and 500 per hour.
    fn default() -> Self {
        Self::new(vec![Rule::per_minute(20), Rule::per_hour(500)])
    }
}

impl RateLimiter {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            tracked: Mutex::new(Tracked::default()),
        }
    }

    /// Record a request for `key` unless one of the rules is already exhausted.
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    /// Drop keys whose windows all expired, at most once per shortest window.
    fn prune(&self, tracked: &mut Tracked, now: Instant) {
        if tracked.windows.len() <= PRUNE_THRESHOLD
            || tracked.next_prune.is_some_and(|next| now < next)
        {
            return;
        }

        tracked.windows.retain(|_, windows| {
            windows
                .iter()
                .zip(&self.rules)
                .any(|(window, rule)| now.duration_since(window.start) < rule.window)
        });

        let interval = self
            .rules
            .iter()
            .map(|rule| rule.window)
            .min()
            .unwrap_or_default();

        tracked.next_prune = Some(now + interval);
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut tracked = self.tracked.lock();

        self.prune(&mut tracked, now);

        let entry = tracked.windows.entry(key.to_string()).or_insert_with(|| {
            self.rules
                .iter()
                .map(|_| Window {
                    start: now,
                    count: 0,
                })
                .collect()
        });

        for (window, rule) in entry.iter_mut().zip(&self.rules) {
            if now.duration_since(window.start) >= rule.window {
                *window = Window {
                    start: now,
                    count: 0,
                };
            }
        }

        let retry_after = entry
            .iter()
            .zip(&self.rules)
            .filter(|(window, rule)| window.count >= rule.limit)
            .map(|(window, rule)| rule.window.saturating_sub(now.duration_since(window.start)))
            .max();

        if let Some(retry_after) = retry_after {
            return Decision::Limited { retry_after };
        }

        for window in entry.iter_mut() {
            window.count += 1;
        }

        Decision::Allowed
    }
}

/// Key requests by peer address. Forwarded addresses are only trusted from a local peer, i.e. a
/// reverse proxy on the same host, or when there is no peer address at all (Unix socket).
fn client_key(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let forwarded = || {
        headers
            .get(X_FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    };

    match peer {
        Some(ip) if ip.is_loopback() => forwarded().unwrap_or_else(|| ip.to_string()),
        Some(ip) => ip.to_string(),
        None => forwarded().unwrap_or_else(|| String::from("unknown")),
    }
}

/// Middleware rejecting requests of clients that exhausted their budget.
pub(crate) async fn limit(State(limiter): State<Limiter>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let key = client_key(req.headers(), peer);

    match limiter.check(&key) {
        Decision::Allowed => next.run(req).await,
        Decision::Limited { retry_after } => {
            tracing::info!(%key, "rate limit exceeded");

            let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            let response: JsonErrorResponse = Error::RateLimited.into();

            ([(RETRY_AFTER, seconds.to_string())], response).into_response()
        }
    }
}

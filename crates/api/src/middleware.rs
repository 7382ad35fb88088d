//! Per-client request rate limiting.
//!
//! Each client (see [`client_key`]) may make at most `RATE_LIMIT_MAX` requests
//! in any rolling `RATE_LIMIT_WINDOW_MS` span. Admission times are kept per
//! client and pruned as they fall out of the window.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::app::errors::{json_error, RATE_LIMITED};

/// Key shared by requests whose origin cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone)]
pub struct RateLimitState {
    clients: Arc<DashMap<String, VecDeque<Instant>>>,
    max: usize,
    window: Duration,
}

impl RateLimitState {
    /// At most `max` requests per client per `window`.
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
            max: usize::try_from(max.max(1)).unwrap_or(usize::MAX),
            window,
        }
    }

    /// Admit or refuse one request from `key`; `Err` carries the wait time.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut admitted = self.clients.entry(key.to_owned()).or_default();

        while admitted
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            admitted.pop_front();
        }

        if admitted.len() >= self.max {
            let oldest = admitted.front().copied().unwrap_or(now);
            return Err((oldest + self.window).saturating_duration_since(now));
        }

        admitted.push_back(now);
        Ok(())
    }

    /// Forget clients with no admissions inside the current window.
    pub fn prune(&self) {
        let now = Instant::now();
        self.clients.retain(|_, admitted| {
            admitted
                .back()
                .is_some_and(|t| now.saturating_duration_since(*t) < self.window)
        });
    }

    /// Periodically [`prune`](Self::prune) idle clients.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_housekeeping(&self) {
        let clients = Arc::downgrade(&self.clients);
        let (max, window) = (self.max, self.window);
        let every = window.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(clients) = clients.upgrade() else {
                    break;
                };
                RateLimitState { clients, max, window }.prune();
            }
        });
    }
}

pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer);

    match state.check(&key) {
        Ok(()) => next.run(req).await,
        Err(wait) => {
            tracing::debug!(client = %key, ?wait, "rate limit exceeded");
            let mut resp = json_error(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED);
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                resp.headers_mut().insert(header::RETRY_AFTER, value);
            }
            resp.into_response()
        }
    }
}

/// Identify the client: first `X-Forwarded-For` entry, else the peer IP.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|ip| ip.trim().parse::<std::net::IpAddr>().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        let peer: SocketAddr = "192.0.2.1:443".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer)), "192.0.2.1");
        assert_eq!(client_key(&HeaderMap::new(), None), UNKNOWN_CLIENT);
    }

    #[tokio::test(start_paused = true)]
    async fn allows_max_requests_then_refuses() {
        let state = RateLimitState::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(state.check("a").is_ok());
        }
        let wait = state.check("a").unwrap_err();
        assert_eq!(wait, Duration::from_secs(60));

        // Other clients have their own budget.
        assert!(state.check("b").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn never_admits_more_than_max_inside_one_window() {
        let window = Duration::from_secs(3);
        let state = RateLimitState::new(3, window);

        let mut admitted = 0;
        let started = Instant::now();
        while started.elapsed() < Duration::from_millis(2_900) {
            if state.check("a").is_ok() {
                admitted += 1;
            }
            tokio::time::advance(Duration::from_millis(50)).await;
        }

        assert_eq!(admitted, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rolling_window_caps_every_span() {
        let window = Duration::from_secs(10);
        let state = RateLimitState::new(5, window);
        let mut admissions = Vec::new();

        // Hammer for three windows, one attempt every 250ms.
        let started = Instant::now();
        while started.elapsed() < window * 3 {
            if state.check("a").is_ok() {
                admissions.push(Instant::now());
            }
            tokio::time::advance(Duration::from_millis(250)).await;
        }

        for (i, from) in admissions.iter().enumerate() {
            let in_span = admissions[i..]
                .iter()
                .take_while(|t| t.duration_since(*from) < window)
                .count();
            assert!(in_span <= 5, "{in_span} admissions within one window");
        }
        assert!(admissions.len() >= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_returns_once_window_has_passed() {
        let window = Duration::from_secs(60);
        let state = RateLimitState::new(2, window);

        assert!(state.check("a").is_ok());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(state.check("a").is_ok());
        assert!(state.check("a").is_err());

        // First admission has aged out; the second still counts.
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(state.check("a").is_ok());
        assert_eq!(state.check("a").unwrap_err(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_idle_clients() {
        let window = Duration::from_secs(5);
        let state = RateLimitState::new(2, window);

        state.check("a").unwrap();
        state.check("b").unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        state.check("b").unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        state.prune();
        assert_eq!(state.clients.len(), 1);
        assert!(state.clients.contains_key("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_is_treated_as_one() {
        let state = RateLimitState::new(0, Duration::from_secs(60));
        assert!(state.check("a").is_ok());
        assert!(state.check("a").is_err());
    }
}

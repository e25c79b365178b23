//! Authentication and admission middleware.

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::rejection::GateRejection;
use crate::auth::CredentialVerifier;
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::ratelimit::{RateLimiter, Verdict};

/// Client identity used when the peer address is unknown.
const UNKNOWN_CLIENT: &str = "unknown";

/// Sweep cadence when none is configured.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Shared state for the gatekeeping middleware.
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    verifier: Arc<CredentialVerifier>,
    limiter: Arc<RateLimiter>,
    sweep_interval: Duration,
}

impl Gatekeeper {
    /// Wrap an existing verifier and limiter, sweeping every 30 seconds.
    pub fn new(verifier: Arc<CredentialVerifier>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            verifier,
            limiter,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Set the cadence used by [`spawn_sweeper`](Self::spawn_sweeper).
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Build the verifier and limiter from configuration.
    ///
    /// A missing token hash is a configuration error: protected routes must
    /// never fall open.
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        config.validate()?;
        let token_hash = config
            .auth
            .token_hash
            .as_deref()
            .ok_or_else(|| GateError::Config("auth.token_hash is required".to_string()))?;

        let verifier = CredentialVerifier::new(token_hash)?;
        let limiter = RateLimiter::from_config(&config.rate_limiting)?;
        Ok(Self::new(Arc::new(verifier), Arc::new(limiter)).with_sweep_interval(
            Duration::from_secs(config.rate_limiting.sweep_interval_secs),
        ))
    }

    /// Start evicting stale limiter entries in the background.
    ///
    /// Call once at startup from within a tokio runtime; the task runs until
    /// the returned handle is aborted.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        info!(interval = ?self.sweep_interval, "Starting limiter sweeper");
        self.limiter.spawn_sweeper(self.sweep_interval)
    }

    /// The credential verifier.
    pub fn verifier(&self) -> &Arc<CredentialVerifier> {
        &self.verifier
    }

    /// The rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Interval between background sweeps.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

/// Route identifier for a request: `"<METHOD> <matched path pattern>"`.
///
/// HEAD is counted as GET, since the router answers HEAD with the GET
/// handler. Falls back to the literal URI path outside a matched route.
pub fn route_identity(request: &Request) -> String {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = if *request.method() == Method::HEAD {
        &Method::GET
    } else {
        request.method()
    };
    format!("{} {}", method, path)
}

/// Client identity for a request: the peer IP address.
pub fn client_identity(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Reject requests without a valid `Authorization: Basic <token>` header.
pub async fn require_token(
    State(gate): State<Gatekeeper>,
    request: Request,
    next: Next,
) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    match gate.verifier.authenticate(header_value) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            debug!(
                route = %route_identity(&request),
                client = %client_identity(&request),
                "Rejected unauthenticated request"
            );
            GateRejection::Unauthorized.into_response()
        }
    }
}

/// Reject requests that exceed their route's admission policy.
pub async fn enforce_rate_limit(
    State(gate): State<Gatekeeper>,
    request: Request,
    next: Next,
) -> Response {
    let route = route_identity(&request);
    let client = client_identity(&request);

    match gate.limiter.admit(&route, &client) {
        Verdict::Rejected { retry_after } => {
            warn!(route = %route, client = %client, retry_after = ?retry_after, "Rate limit exceeded");
            GateRejection::RateLimited { retry_after }.into_response()
        }
        Verdict::Admitted | Verdict::Unlimited => next.run(request).await,
    }
}

use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::{config::AppConfig, error::AppError};

/// Clients that expose neither a peer address nor a forwarding header share this bucket.
const SHARED_CLIENT_KEY: &str = "shared";

/// Throttle
///
/// One rate-limit group: a per-client GCRA limiter and the name it logs under.
/// Routes that share a `Throttle` share its budget.
#[derive(Clone)]
pub struct Throttle {
    group: &'static str,
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl Throttle {
    pub fn per_minute(group: &'static str, requests: u32) -> Self {
        let requests = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        Self {
            group,
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(requests))),
        }
    }

    /// Consumes one unit of `client`'s budget.
    pub fn check(&self, client: &str) -> Result<(), AppError> {
        self.limiter.check_key(&client.to_string()).map_err(|_| {
            tracing::warn!(group = self.group, client, "rate limit exceeded");
            AppError::TooManyAttempts
        })
    }
}

/// The two throttle groups of the API.
#[derive(Clone)]
pub struct RateLimits {
    /// signup, signin and signout.
    pub auth: Throttle,
    /// Every other bearer-protected route.
    pub default: Throttle,
}

impl RateLimits {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            auth: Throttle::per_minute("auth", config.auth_throttle_per_minute),
            default: Throttle::per_minute("default", config.default_throttle_per_minute),
        }
    }
}

/// Identifies the caller: peer IP when the server was started with connect
/// info, else the first `x-forwarded-for` hop.
pub fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| SHARED_CLIENT_KEY.to_string())
}

/// Rejects the request with 429 once the caller's budget for the group is spent.
pub async fn throttle(
    State(throttle): State<Throttle>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    throttle.check(&client_key(&req))?;
    Ok(next.run(req).await)
}

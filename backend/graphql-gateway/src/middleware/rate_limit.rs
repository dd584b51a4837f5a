//! Rate limiting middleware
//!
//! Per-client-IP token bucket built on `governor`'s keyed limiter.
//! Clients are keyed by the TCP peer address. Proxy headers are honoured only
//! when `trust_proxy_headers` is set, since any client can forge them.
//! Idle buckets are pruned every [`PRUNE_EVERY`] checks to bound the key map.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorTooManyRequests,
    Error,
};
use futures_util::future::LocalBoxFuture;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::future::{ready, Ready};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RateLimitSettings;

/// Number of limiter checks between idle-bucket pruning passes
pub const PRUNE_EVERY: u64 = 1024;

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Requests per second per IP
    pub req_per_second: u32,
    /// Burst capacity (how many requests can be made at once)
    pub burst_size: u32,
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            req_per_second: 50,
            burst_size: 20,
            trust_proxy_headers: false,
        }
    }
}

impl From<RateLimitSettings> for RateLimitConfig {
    fn from(settings: RateLimitSettings) -> Self {
        Self {
            req_per_second: settings.per_second,
            burst_size: settings.burst,
            trust_proxy_headers: settings.trust_proxy_headers,
        }
    }
}

impl RateLimitConfig {
    /// Zero values fall back to one request so the quota stays valid
    fn quota(&self) -> Quota {
        let per_second = NonZeroU32::new(self.req_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst_size).unwrap_or(NonZeroU32::MIN);
        Quota::per_second(per_second).allow_burst(burst)
    }
}

/// State shared by every worker's copy of the middleware
struct SharedLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    checks: AtomicU64,
    trust_proxy_headers: bool,
}

impl SharedLimiter {
    fn check(&self, ip: &IpAddr) -> bool {
        let allowed = self.limiter.check_key(ip).is_ok();

        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.limiter.retain_recent();
            self.limiter.shrink_to_fit();
            debug!(tracked_clients = self.limiter.len(), "Pruned idle rate limit buckets");
        }

        allowed
    }
}

/// Rate limit middleware factory
#[derive(Clone)]
pub struct RateLimitMiddleware {
    shared: Arc<SharedLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            shared: Arc::new(SharedLimiter {
                limiter: RateLimiter::keyed(config.quota()),
                checks: AtomicU64::new(0),
                trust_proxy_headers: config.trust_proxy_headers,
            }),
        }
    }

    /// Number of client buckets currently held by the limiter
    pub fn tracked_clients(&self) -> usize {
        self.shared.limiter.len()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service,
            shared: self.shared.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: S,
    shared: Arc<SharedLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let ip = client_ip(&req, self.shared.trust_proxy_headers);

        if !self.shared.check(&ip) {
            warn!(client_ip = %ip, "Rate limit exceeded");
            return Box::pin(async move { Err(ErrorTooManyRequests("Rate limit exceeded")) });
        }

        debug!(client_ip = %ip, "Rate limit check passed");

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res)
        })
    }
}

/// Client key: the peer address, or the proxy-reported client when trusted
fn client_ip(req: &ServiceRequest, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        let forwarded = req
            .connection_info()
            .realip_remote_addr()
            .and_then(parse_ip);
        if let Some(ip) = forwarded {
            return ip;
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

/// Accept both bare IPs and `ip:port` / `[v6]:port` forms
fn parse_ip(value: &str) -> Option<IpAddr> {
    let value = value.trim();
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

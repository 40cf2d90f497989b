//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use sessionvault_common::errors::AppError;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Shared limiter plus the configured rate, for the 429 message
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<GlobalRateLimiter>,
    requests_per_second: u32,
}

/// Create a new rate limiter; zero values are raised to one
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> RateLimitState {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(rate);
    let quota = Quota::per_second(rate).allow_burst(burst);

    RateLimitState {
        limiter: Arc::new(RateLimiter::direct(quota)),
        requests_per_second: rate.get(),
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match state.limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!("Rate limit exceeded");
            Err(AppError::RateLimited {
                limit: state.requests_per_second,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let state = create_rate_limiter(100, 200);
        assert!(state.limiter.check().is_ok());
        assert_eq!(state.requests_per_second, 100);
    }

    #[test]
    fn test_burst_is_exhausted() {
        let state = create_rate_limiter(1, 2);
        assert!(state.limiter.check().is_ok());
        assert!(state.limiter.check().is_ok());
        assert!(state.limiter.check().is_err());
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let state = create_rate_limiter(0, 0);
        assert_eq!(state.requests_per_second, 1);
        assert!(state.limiter.check().is_ok());
    }
}

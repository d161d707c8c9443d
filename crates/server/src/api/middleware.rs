//! Metrics and rate limiting middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::ErrorResponse;
use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
    RATE_LIMITED_TOTAL,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Per-client rate limiting.
///
/// Clients are keyed by peer address. Requests without connection info
/// (in-process tests) count as localhost. Over-limit requests get 429 with a
/// `Retry-After` header in whole seconds.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter() else {
        return next.run(request).await;
    };

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    match limiter.check(client).await {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            RATE_LIMITED_TOTAL.inc();
            let retry_after = wait.as_secs_f64().ceil().max(1.0) as u64;
            debug!(%client, retry_after, "Rate limited");

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse {
                    error: "rate limit exceeded".to_string(),
                }),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    use assetflow_core::{Config, RateLimitConfig, SqliteTicketStore, TicketStore};

    async fn dummy_handler() -> &'static str {
        "OK"
    }

    fn create_test_state(rate_limit: RateLimitConfig) -> Arc<AppState> {
        let ticket_store: Arc<dyn TicketStore> = Arc::new(SqliteTicketStore::in_memory().unwrap());
        let config = Config {
            rate_limit,
            ..Config::default()
        };
        Arc::new(AppState::new(config, ticket_store))
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/test", get(dummy_handler))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ))
            .with_state(state)
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/test").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_over_limit() {
        let app = app(create_test_state(RateLimitConfig {
            enabled: true,
            requests_per_minute: 2,
        }));

        for _ in 0..2 {
            let response = app.clone().oneshot(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap();
        assert!((1..=30).contains(&retry_after));
    }

    #[tokio::test]
    async fn test_rate_limit_disabled_allows_all() {
        let app = app(create_test_state(RateLimitConfig {
            enabled: false,
            requests_per_minute: 1,
        }));

        for _ in 0..5 {
            let response = app.clone().oneshot(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_rate_limit_keys_on_peer_address() {
        let app = app(create_test_state(RateLimitConfig {
            enabled: true,
            requests_per_minute: 1,
        }));

        let from = |last: u8| {
            let mut request = request();
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::from(([192, 168, 0, last], 4000))));
            request
        };

        assert_eq!(app.clone().oneshot(from(1)).await.unwrap().status(), StatusCode::OK);
        assert_eq!(app.clone().oneshot(from(2)).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            app.oneshot(from(1)).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::warn;

/// Paths reachable without a key, for load balancer probes.
const OPEN_PATHS: &[&str] = &["/health"];

/// Which API keys may drive the gateway.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Accepted keys. Empty disables the check.
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    /// Accepts exactly `api_keys`.
    pub fn new(api_keys: Vec<String>) -> Self {
        Self { api_keys }
    }

    /// At least one key is configured.
    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    fn accepts(&self, key: &str) -> bool {
        self.api_keys.iter().any(|k| k == key)
    }
}

/// `?api_key=` on any URL, so the page and its WebSocket can authenticate.
#[derive(serde::Deserialize, Default)]
pub struct AuthQuery {
    /// Key passed in the query string.
    pub api_key: Option<String>,
}

enum Rejection {
    Missing,
    Invalid,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Missing => "API key required",
            Self::Invalid => "Invalid API key",
        };
        warn!(reason = message, "Rejected request");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}

/// `Authorization: Bearer <key>` wins over the query parameter.
fn presented_key(headers: &HeaderMap, query: AuthQuery) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .or(query.api_key)
}

/// Rejects requests without an accepted key when auth is enabled.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthConfig>>,
    headers: HeaderMap,
    Query(query): Query<AuthQuery>,
    request: Request,
    next: Next,
) -> Response {
    if !auth.is_enabled() || OPEN_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match presented_key(&headers, query) {
        Some(key) if auth.accepts(&key) => next.run(request).await,
        Some(_) => Rejection::Invalid.into_response(),
        None => Rejection::Missing.into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use tower::ServiceExt;

    fn app(keys: &[&str]) -> Router {
        let auth = Arc::new(AuthConfig::new(keys.iter().map(ToString::to_string).collect()));
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/api/status", get(|| async { "status" }))
            .layer(from_fn_with_state(auth, auth_middleware))
    }

    async fn status_of(app: Router, request: axum::http::Request<Body>) -> StatusCode {
        app.oneshot(request).await.unwrap().status()
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_auth_config_disabled() {
        assert!(!AuthConfig::new(vec![]).is_enabled());
    }

    #[test]
    fn test_auth_config_accepts_only_known_keys() {
        let config = AuthConfig::new(vec!["key123".to_string()]);
        assert!(config.is_enabled());
        assert!(config.accepts("key123"));
        assert!(!config.accepts("key124"));
    }

    #[test]
    fn test_header_beats_query() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        let query = AuthQuery {
            api_key: Some("from-query".to_string()),
        };
        assert_eq!(presented_key(&headers, query).as_deref(), Some("from-header"));
    }

    #[tokio::test]
    async fn test_no_keys_lets_everything_through() {
        assert_eq!(status_of(app(&[]), get_request("/api/status")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_and_wrong_keys_rejected() {
        assert_eq!(
            status_of(app(&["k"]), get_request("/api/status")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(app(&["k"]), get_request("/api/status?api_key=nope")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(app(&["k"]), get_request("/api/status?api_key=k")).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_health_is_open() {
        assert_eq!(status_of(app(&["k"]), get_request("/health")).await, StatusCode::OK);
    }
}

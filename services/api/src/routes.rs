use crate::infra::{AppState, Registry};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;

use resident_registry::auth::auth_router;
use resident_registry::requests::request_router;
use resident_registry::verify::verify_router;

/// Merge the component routers with the operational endpoints.
pub(crate) fn portal_routes(registry: &Registry) -> axum::Router {
    auth_router(registry.bootstrap.clone())
        .merge(request_router(registry.engine.clone()))
        .merge(verify_router(registry.gateway.clone()))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{build_registry_with_issuer, seed_demo_accounts};
    use axum::body::Body;
    use axum::http::Request;
    use resident_registry::config::AppConfig;
    use resident_registry::requests::{
        DocumentIssuer, DocumentNumber, DocumentRequest, IssuerError, StoredFile,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NullIssuer;

    impl DocumentIssuer for NullIssuer {
        fn issue(
            &self,
            _request: &DocumentRequest,
            number: &DocumentNumber,
        ) -> Result<StoredFile, IssuerError> {
            Ok(StoredFile {
                location: format!("memory/{}.pdf", number.0),
            })
        }
    }

    #[tokio::test]
    async fn health_and_login_are_served_from_the_merged_router() {
        let config = AppConfig::load().expect("config loads");
        let registry =
            build_registry_with_issuer(&config, Arc::new(NullIssuer)).expect("registry builds");
        seed_demo_accounts(&registry.directory);
        let app = portal_routes(&registry);

        let health = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("handler runs");
        assert_eq!(health.status(), StatusCode::OK);

        let login = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "contact": "09171234567", "birthdate": "1990-05-01" })
                            .to_string(),
                    ))
                    .expect("request builds"),
            )
            .await
            .expect("handler runs");
        assert_eq!(login.status(), StatusCode::OK);
    }
}

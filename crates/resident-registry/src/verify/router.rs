use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use super::domain::PublicProfile;
use super::service::{TokenStore, VerificationGateway};
use crate::audit::{AuditTrail, Origin};
use crate::auth::{AccountDirectory, ResidentId};
use crate::error::AppError;
use crate::requests::DocumentArchive;

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) token: String,
}

/// Router builder for the public verification path and the staff token
/// issuance behind it.
pub fn verify_router<S, R, D, T>(gateway: Arc<VerificationGateway<S, R, D, T>>) -> Router
where
    S: TokenStore + 'static,
    R: AccountDirectory + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    Router::new()
        .route("/api/v1/verify/:token", get(resolve_handler::<S, R, D, T>))
        .route(
            "/api/v1/staff/residents/:id/token",
            post(issue_token_handler::<S, R, D, T>),
        )
        .with_state(gateway)
}

/// Sessionless lookup used by QR scanners.
pub(crate) async fn resolve_handler<S, R, D, T>(
    State(gateway): State<Arc<VerificationGateway<S, R, D, T>>>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> Result<Json<PublicProfile>, AppError>
where
    S: TokenStore + 'static,
    R: AccountDirectory + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let origin = Origin::from_headers(&headers);
    Ok(Json(gateway.resolve(&token, &origin)?))
}

pub(crate) async fn issue_token_handler<S, R, D, T>(
    State(gateway): State<Arc<VerificationGateway<S, R, D, T>>>,
    headers: HeaderMap,
    Path(resident_id): Path<String>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError>
where
    S: TokenStore + 'static,
    R: AccountDirectory + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let session = gateway.sessions().authenticate(&headers)?;
    let origin = Origin::from_headers(&headers);
    let token = gateway.issue_token(&session, &ResidentId(resident_id), origin)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token: token.0 })))
}

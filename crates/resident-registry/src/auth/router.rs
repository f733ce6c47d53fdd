use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Credential, ResidentProfile};
use super::repository::AccountDirectory;
use super::service::{AuthError, CredentialBootstrap};
use crate::audit::{AuditTrail, Origin};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) contact: String,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default)]
    pub(crate) birthdate: Option<NaiveDate>,
}

impl LoginRequest {
    fn credential(&self) -> Result<Credential, AuthError> {
        match (&self.password, self.birthdate) {
            (Some(password), None) => Ok(Credential::Password(password.clone())),
            (None, Some(birthdate)) => Ok(Credential::Birthdate(birthdate)),
            _ => Err(AuthError::Validation(
                "supply exactly one of password or birthdate".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    pub(crate) token: String,
    pub(crate) profile: ResidentProfile,
    pub(crate) requires_password_setup: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetPasswordRequest {
    pub(crate) password: String,
    pub(crate) confirm: String,
}

/// Router builder for the credential surface.
pub fn auth_router<R, T>(service: Arc<CredentialBootstrap<R, T>>) -> Router
where
    R: AccountDirectory + 'static,
    T: AuditTrail + 'static,
{
    Router::new()
        .route("/api/v1/auth/login", post(login_handler::<R, T>))
        .route("/api/v1/auth/password", post(set_password_handler::<R, T>))
        .with_state(service)
}

pub(crate) async fn login_handler<R, T>(
    State(service): State<Arc<CredentialBootstrap<R, T>>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError>
where
    R: AccountDirectory + 'static,
    T: AuditTrail + 'static,
{
    let credential = payload.credential()?;
    let origin = Origin::from_headers(&headers);
    let success = service.login(&payload.contact, credential, origin)?;
    Ok(Json(LoginResponse {
        token: success.token.0,
        profile: success.profile,
        requires_password_setup: success.requires_password_setup,
    }))
}

pub(crate) async fn set_password_handler<R, T>(
    State(service): State<Arc<CredentialBootstrap<R, T>>>,
    headers: HeaderMap,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError>
where
    R: AccountDirectory + 'static,
    T: AuditTrail + 'static,
{
    let session = service.sessions().authenticate(&headers)?;
    let origin = Origin::from_headers(&headers);
    service.set_password(&session, &payload.password, &payload.confirm, origin)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "status": "password set" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_requires_exactly_one_credential() {
        let both = LoginRequest {
            contact: "09171234567".to_string(),
            password: Some("secret1".to_string()),
            birthdate: NaiveDate::from_ymd_opt(1990, 5, 1),
        };
        assert!(both.credential().is_err());

        let neither = LoginRequest {
            contact: "09171234567".to_string(),
            password: None,
            birthdate: None,
        };
        assert!(neither.credential().is_err());

        let password_only = LoginRequest {
            contact: "09171234567".to_string(),
            password: Some("secret1".to_string()),
            birthdate: None,
        };
        assert!(matches!(
            password_only.credential(),
            Ok(Credential::Password(_))
        ));
    }
}

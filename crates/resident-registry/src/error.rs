use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::requests::WorkflowError;
use crate::telemetry::TelemetryError;
use crate::verify::VerifyError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Auth(AuthError),
    Workflow(WorkflowError),
    Verify(VerifyError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Auth(err) => write!(f, "{}", err),
            AppError::Workflow(err) => write!(f, "{}", err),
            AppError::Verify(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Auth(err) => Some(err),
            AppError::Workflow(err) => Some(err),
            AppError::Verify(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Auth(err) => match err {
                AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredential | AuthError::SessionRequired => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::PasswordRequired => StatusCode::CONFLICT,
                AuthError::Credential(_) | AuthError::Directory(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Workflow(err) => match err {
                WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
                WorkflowError::NotFound => StatusCode::NOT_FOUND,
                WorkflowError::Conflict(_) => StatusCode::CONFLICT,
                WorkflowError::ResidentSessionRequired
                | WorkflowError::StaffSessionRequired => StatusCode::FORBIDDEN,
                WorkflowError::Issuer(_) => StatusCode::BAD_GATEWAY,
                WorkflowError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Verify(err) => match err {
                VerifyError::NotFound => StatusCode::NOT_FOUND,
                VerifyError::TooManyLookups => StatusCode::TOO_MANY_REQUESTS,
                VerifyError::StaffSessionRequired => StatusCode::FORBIDDEN,
                VerifyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({ "error": self.to_string() });
        if matches!(&self, AppError::Auth(AuthError::PasswordRequired)) {
            // Signals the client to switch from birthdate to password mode.
            body["password_required"] = json!(true);
        }

        (status, Json(body)).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        Self::Auth(value)
    }
}

impl From<WorkflowError> for AppError {
    fn from(value: WorkflowError) -> Self {
        Self::Workflow(value)
    }
}

impl From<VerifyError> for AppError {
    fn from(value: VerifyError) -> Self {
        Self::Verify(value)
    }
}

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use super::domain::{DocumentKind, DocumentRequest, IssuedDocument, RequestId};
use super::repository::{DocumentArchive, RequestFilter, RequestRepository};
use super::service::{RequestDetail, RequestWorkflowEngine};
use crate::audit::{Actor, AuditAction, AuditPage, AuditQuery, AuditTrail, EntityKind, Origin};
use crate::auth::ResidentId;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitRequestBody {
    pub(crate) kind: DocumentKind,
    #[serde(default)]
    pub(crate) purpose: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApproveBody {
    #[serde(default)]
    pub(crate) fee_cents: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectBody {
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WalkInBody {
    pub(crate) resident_id: String,
    pub(crate) kind: DocumentKind,
    #[serde(default)]
    pub(crate) file_location: Option<String>,
}

/// Flat query-string shape for the staff audit endpoint; tagged actor enums
/// do not deserialize from form pairs.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuditQueryParams {
    pub(crate) actor_resident: Option<String>,
    pub(crate) actor_staff: Option<String>,
    pub(crate) action: Option<AuditAction>,
    pub(crate) entity_kind: Option<EntityKind>,
    pub(crate) from: Option<NaiveDate>,
    pub(crate) to: Option<NaiveDate>,
    pub(crate) page: Option<usize>,
    pub(crate) per_page: Option<usize>,
}

impl AuditQueryParams {
    fn into_query(self) -> AuditQuery {
        let actor = match (self.actor_resident, self.actor_staff) {
            (Some(id), _) => Some(Actor::Resident(id)),
            (None, Some(id)) => Some(Actor::Staff(id)),
            (None, None) => None,
        };
        AuditQuery {
            actor,
            action: self.action,
            entity_kind: self.entity_kind,
            from: self.from,
            to: self.to,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Router builder for resident and staff request endpoints.
pub fn request_router<R, D, T>(engine: Arc<RequestWorkflowEngine<R, D, T>>) -> Router
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    Router::new()
        .route(
            "/api/v1/requests",
            post(submit_handler::<R, D, T>).get(list_own_handler::<R, D, T>),
        )
        .route("/api/v1/requests/:id", get(get_handler::<R, D, T>))
        .route(
            "/api/v1/requests/:id/approve",
            post(approve_handler::<R, D, T>),
        )
        .route(
            "/api/v1/requests/:id/reject",
            post(reject_handler::<R, D, T>),
        )
        .route(
            "/api/v1/requests/:id/payment",
            post(payment_handler::<R, D, T>),
        )
        .route("/api/v1/requests/:id/issue", post(issue_handler::<R, D, T>))
        .route("/api/v1/staff/requests", get(search_handler::<R, D, T>))
        .route("/api/v1/staff/documents", post(walk_in_handler::<R, D, T>))
        .route("/api/v1/staff/audit", get(audit_handler::<R, D, T>))
        .with_state(engine)
}

pub(crate) async fn submit_handler<R, D, T>(
    State(engine): State<Arc<RequestWorkflowEngine<R, D, T>>>,
    headers: HeaderMap,
    Json(body): Json<SubmitRequestBody>,
) -> Result<(StatusCode, Json<DocumentRequest>), AppError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let session = engine.sessions().authenticate(&headers)?;
    let origin = Origin::from_headers(&headers);
    let record = engine.submit(&session, body.kind, body.purpose, origin)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn list_own_handler<R, D, T>(
    State(engine): State<Arc<RequestWorkflowEngine<R, D, T>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<DocumentRequest>>, AppError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let session = engine.sessions().authenticate(&headers)?;
    Ok(Json(engine.list_own(&session)?))
}

pub(crate) async fn get_handler<R, D, T>(
    State(engine): State<Arc<RequestWorkflowEngine<R, D, T>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<RequestDetail>, AppError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let session = engine.sessions().authenticate(&headers)?;
    Ok(Json(engine.get(&session, &RequestId(id))?))
}

pub(crate) async fn approve_handler<R, D, T>(
    State(engine): State<Arc<RequestWorkflowEngine<R, D, T>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<DocumentRequest>, AppError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let session = engine.sessions().authenticate(&headers)?;
    let origin = Origin::from_headers(&headers);
    Ok(Json(engine.approve(
        &session,
        &RequestId(id),
        body.fee_cents,
        origin,
    )?))
}

pub(crate) async fn reject_handler<R, D, T>(
    State(engine): State<Arc<RequestWorkflowEngine<R, D, T>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RejectBody>,
) -> Result<Json<DocumentRequest>, AppError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let session = engine.sessions().authenticate(&headers)?;
    let origin = Origin::from_headers(&headers);
    Ok(Json(engine.reject(
        &session,
        &RequestId(id),
        &body.reason,
        origin,
    )?))
}

/// Endpoint for the external payment-confirmation channel.
pub(crate) async fn payment_handler<R, D, T>(
    State(engine): State<Arc<RequestWorkflowEngine<R, D, T>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DocumentRequest>, AppError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let origin = Origin::from_headers(&headers);
    Ok(Json(engine.confirm_payment(&RequestId(id), origin)?))
}

pub(crate) async fn issue_handler<R, D, T>(
    State(engine): State<Arc<RequestWorkflowEngine<R, D, T>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<DocumentRequest>), AppError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let session = engine.sessions().authenticate(&headers)?;
    let origin = Origin::from_headers(&headers);
    let record = engine.begin_issuance(&session, &RequestId(id), origin)?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

pub(crate) async fn search_handler<R, D, T>(
    State(engine): State<Arc<RequestWorkflowEngine<R, D, T>>>,
    headers: HeaderMap,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<Vec<DocumentRequest>>, AppError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let session = engine.sessions().authenticate(&headers)?;
    Ok(Json(engine.search(&session, &filter)?))
}

pub(crate) async fn walk_in_handler<R, D, T>(
    State(engine): State<Arc<RequestWorkflowEngine<R, D, T>>>,
    headers: HeaderMap,
    Json(body): Json<WalkInBody>,
) -> Result<(StatusCode, Json<IssuedDocument>), AppError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let session = engine.sessions().authenticate(&headers)?;
    let origin = Origin::from_headers(&headers);
    let document = engine.record_walk_in_document(
        &session,
        ResidentId(body.resident_id),
        body.kind,
        body.file_location,
        origin,
    )?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub(crate) async fn audit_handler<R, D, T>(
    State(engine): State<Arc<RequestWorkflowEngine<R, D, T>>>,
    headers: HeaderMap,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditPage>, AppError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let session = engine.sessions().authenticate(&headers)?;
    Ok(Json(engine.query_audit(&session, &params.into_query())?))
}

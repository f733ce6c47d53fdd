use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::domain::{
    DocumentKind, DocumentNumber, DocumentRequest, IssuedDocument, PaymentStatus, RequestId,
    RequestNumber, RequestStatus,
};
use super::issuer::{DocumentIssuer, IssuerError, StoredFile};
use super::repository::{DocumentArchive, RepositoryError, RequestFilter, RequestRepository};
use crate::audit::{
    Actor, AuditAction, AuditEntry, AuditPage, AuditQuery, AuditTrail, EntityKind, Origin,
};
use crate::auth::{ResidentId, Session, SessionStore, StaffId};

/// Monotonic allocators for request and document numbers. `fetch_add` is the
/// mutual-exclusion guarantee: N concurrent submissions receive N distinct
/// numbers.
pub struct Sequences {
    request: AtomicU64,
    document: AtomicU64,
}

impl Sequences {
    pub fn starting_at(request: u64, document: u64) -> Self {
        Self {
            request: AtomicU64::new(request),
            document: AtomicU64::new(document),
        }
    }

    fn next_request(&self) -> RequestNumber {
        RequestNumber::from_sequence(self.request.fetch_add(1, Ordering::Relaxed))
    }

    fn next_document(&self) -> DocumentNumber {
        DocumentNumber::from_sequence(self.document.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Sequences {
    fn default() -> Self {
        Self::starting_at(1, 1)
    }
}

/// Full request plus the linked document once issuance has completed.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDetail {
    pub request: DocumentRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<IssuedDocument>,
}

/// Owns the document-request state machine and its coupling to payment and
/// issuance. Every transition lands exactly one audit entry carrying the
/// before/after status-and-payment snapshot.
pub struct RequestWorkflowEngine<R, D, T> {
    requests: Arc<R>,
    archive: Arc<D>,
    trail: Arc<T>,
    issuer: Arc<dyn DocumentIssuer>,
    sessions: Arc<SessionStore>,
    sequences: Sequences,
}

impl<R, D, T> RequestWorkflowEngine<R, D, T>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    pub fn new(
        requests: Arc<R>,
        archive: Arc<D>,
        trail: Arc<T>,
        issuer: Arc<dyn DocumentIssuer>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            requests,
            archive,
            trail,
            issuer,
            sessions,
            sequences: Sequences::default(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Create a request in Pending/Unpaid with the next sequential number.
    pub fn submit(
        &self,
        session: &Session,
        kind: DocumentKind,
        purpose: Option<String>,
        origin: Origin,
    ) -> Result<DocumentRequest, WorkflowError> {
        let resident = session
            .resident_id()
            .ok_or(WorkflowError::ResidentSessionRequired)?;
        let purpose = purpose
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let record = DocumentRequest {
            id: RequestId(Uuid::new_v4().to_string()),
            request_number: self.sequences.next_request(),
            resident,
            kind,
            purpose,
            status: RequestStatus::Pending,
            payment: PaymentStatus::Unpaid,
            fee_cents: None,
            rejection_reason: None,
            failure_note: None,
            processed_by: None,
            processed_at: None,
            issued_document: None,
            created_at: Utc::now(),
        };

        let stored = self.requests.insert(record)?;
        self.trail.record(AuditEntry::new(
            session.actor.clone(),
            AuditAction::RequestSubmitted,
            EntityKind::DocumentRequest,
            stored.id.0.clone(),
            serde_json::Value::Null,
            stored.snapshot(),
            origin,
        ));
        Ok(stored)
    }

    /// Approve a pending request, optionally attaching a fee. A missing or
    /// zero fee marks the request fee-exempt and settles payment immediately,
    /// so issuance is not gated on a confirmation that will never arrive.
    pub fn approve(
        &self,
        session: &Session,
        id: &RequestId,
        fee_cents: Option<u32>,
        origin: Origin,
    ) -> Result<DocumentRequest, WorkflowError> {
        let staff = require_staff(session)?;
        let current = self.fetch_required(id)?;

        let mut next = current.clone();
        next.status = RequestStatus::Approved;
        next.fee_cents = fee_cents;
        next.payment = if next.fee_exempt() {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Unpaid
        };
        next.processed_by = Some(staff);
        next.processed_at = Some(Utc::now());

        self.transition(session.actor.clone(), current, next, AuditAction::RequestApproved, origin)
    }

    /// Reject from Pending or Approved with a mandatory reason. Terminal.
    pub fn reject(
        &self,
        session: &Session,
        id: &RequestId,
        reason: &str,
        origin: Origin,
    ) -> Result<DocumentRequest, WorkflowError> {
        let staff = require_staff(session)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::Validation(
                "a rejection reason is required".to_string(),
            ));
        }
        let current = self.fetch_required(id)?;

        let mut next = current.clone();
        next.status = RequestStatus::Rejected;
        next.rejection_reason = Some(reason.to_string());
        next.processed_by = Some(staff);
        next.processed_at = Some(Utc::now());

        self.transition(session.actor.clone(), current, next, AuditAction::RequestRejected, origin)
    }

    /// Callback for the external payment channel; no session involved.
    pub fn confirm_payment(
        &self,
        id: &RequestId,
        origin: Origin,
    ) -> Result<DocumentRequest, WorkflowError> {
        let current = self.fetch_required(id)?;
        if current.status != RequestStatus::Approved {
            return Err(WorkflowError::Conflict(format!(
                "payment applies only to approved requests, not {}",
                current.status.label()
            )));
        }
        if current.payment == PaymentStatus::Paid {
            return Ok(current);
        }

        let mut next = current.clone();
        next.payment = PaymentStatus::Paid;
        self.requests
            .update_if_status(next.clone(), current.status)
            .map_err(stale_to_conflict)?;
        self.trail.record(AuditEntry::new(
            Actor::System,
            AuditAction::PaymentConfirmed,
            EntityKind::DocumentRequest,
            next.id.0.clone(),
            current.snapshot(),
            next.snapshot(),
            origin,
        ));
        Ok(next)
    }

    /// Move an approved, payment-cleared request into Processing and hand it
    /// to the issuer on a background task. Idempotent: a call that observes
    /// Processing returns the current record without spawning, and the
    /// Approved-to-Processing compare-and-swap guarantees only one caller
    /// ever spawns, so a request can never gain two issued documents.
    pub fn begin_issuance(
        self: &Arc<Self>,
        session: &Session,
        id: &RequestId,
        origin: Origin,
    ) -> Result<DocumentRequest, WorkflowError> {
        require_staff(session)?;
        let current = self.fetch_required(id)?;

        if current.status == RequestStatus::Processing {
            return Ok(current);
        }
        if current.status != RequestStatus::Approved {
            return Err(WorkflowError::Conflict(format!(
                "issuance starts from approved requests, not {}",
                current.status.label()
            )));
        }
        if !current.payment_cleared() {
            return Err(WorkflowError::Conflict(
                "payment has not been settled for this request".to_string(),
            ));
        }

        let mut next = current.clone();
        next.status = RequestStatus::Processing;
        next.failure_note = None;
        match self
            .requests
            .update_if_status(next.clone(), RequestStatus::Approved)
        {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => {
                // Lost the race; if the winner started issuance we report
                // that state instead of failing the caller.
                let now = self.fetch_required(id)?;
                if matches!(
                    now.status,
                    RequestStatus::Processing | RequestStatus::Completed
                ) {
                    return Ok(now);
                }
                return Err(WorkflowError::Conflict(
                    "request state changed while starting issuance".to_string(),
                ));
            }
            Err(other) => return Err(other.into()),
        }

        self.trail.record(AuditEntry::new(
            session.actor.clone(),
            AuditAction::IssuanceStarted,
            EntityKind::DocumentRequest,
            next.id.0.clone(),
            current.snapshot(),
            next.snapshot(),
            origin,
        ));

        let engine = Arc::clone(self);
        let request = next.clone();
        tokio::spawn(async move {
            let number = engine.sequences.next_document();
            let issuer = Arc::clone(&engine.issuer);
            let issue_request = request.clone();
            let issue_number = number.clone();
            // The issuer does synchronous rendering and storage I/O; keep it
            // off the async workers so polling callers still get scheduled.
            let result = match tokio::task::spawn_blocking(move || {
                issuer.issue(&issue_request, &issue_number)
            })
            .await
            {
                Ok(result) => result,
                Err(join_err) => Err(IssuerError::Rendering(format!(
                    "issuance task failed: {join_err}"
                ))),
            };
            match result {
                Ok(stored) => {
                    if let Err(err) = engine.complete_issuance(&request.id, number, stored) {
                        warn!(request = %request.id.0, %err, "issuance completion failed");
                    }
                }
                Err(err) => {
                    if let Err(err) = engine.fail_issuance(&request.id, &err) {
                        warn!(request = %request.id.0, %err, "issuance failure handling failed");
                    }
                }
            }
        });

        Ok(next)
    }

    /// Issuer callback: link the produced file and complete the request.
    pub fn complete_issuance(
        &self,
        id: &RequestId,
        number: DocumentNumber,
        file: StoredFile,
    ) -> Result<DocumentRequest, WorkflowError> {
        let current = self.fetch_required(id)?;
        if current.status != RequestStatus::Processing {
            return Err(WorkflowError::Conflict(format!(
                "completion applies to processing requests, not {}",
                current.status.label()
            )));
        }

        let document = IssuedDocument {
            document_number: number.clone(),
            resident: current.resident.clone(),
            source_request: Some(current.id.clone()),
            kind: current.kind,
            file_location: Some(file.location),
            issued_at: Utc::now(),
            issued_by: Actor::System,
        };
        self.archive.insert(document.clone())?;
        self.trail.record(AuditEntry::new(
            Actor::System,
            AuditAction::DocumentRecorded,
            EntityKind::IssuedDocument,
            document.document_number.0.clone(),
            serde_json::Value::Null,
            json!({
                "kind": document.kind.label(),
                "source_request": document.source_request.as_ref().map(|id| id.0.clone()),
                "file_location": document.file_location,
            }),
            Origin::internal(),
        ));

        let mut next = current.clone();
        next.status = RequestStatus::Completed;
        next.issued_document = Some(number);
        self.requests
            .update_if_status(next.clone(), RequestStatus::Processing)
            .map_err(stale_to_conflict)?;
        self.trail.record(AuditEntry::new(
            Actor::System,
            AuditAction::IssuanceCompleted,
            EntityKind::DocumentRequest,
            next.id.0.clone(),
            current.snapshot(),
            next.snapshot(),
            Origin::internal(),
        ));
        Ok(next)
    }

    /// Issuer failure path: return the request to Approved with a visible
    /// note. Surfaced to staff; never retried silently.
    pub fn fail_issuance(
        &self,
        id: &RequestId,
        error: &IssuerError,
    ) -> Result<DocumentRequest, WorkflowError> {
        let current = self.fetch_required(id)?;
        if current.status != RequestStatus::Processing {
            return Err(WorkflowError::Conflict(format!(
                "failure applies to processing requests, not {}",
                current.status.label()
            )));
        }

        let mut next = current.clone();
        next.status = RequestStatus::Approved;
        next.failure_note = Some(error.to_string());
        self.requests
            .update_if_status(next.clone(), RequestStatus::Processing)
            .map_err(stale_to_conflict)?;
        warn!(request = %next.id.0, %error, "issuance failed; request returned to approved");
        self.trail.record(AuditEntry::new(
            Actor::System,
            AuditAction::IssuanceFailed,
            EntityKind::DocumentRequest,
            next.id.0.clone(),
            current.snapshot(),
            next.snapshot(),
            Origin::internal(),
        ));
        Ok(next)
    }

    /// Record a document issued over the counter, without a portal request.
    pub fn record_walk_in_document(
        &self,
        session: &Session,
        resident: ResidentId,
        kind: DocumentKind,
        file_location: Option<String>,
        origin: Origin,
    ) -> Result<IssuedDocument, WorkflowError> {
        require_staff(session)?;
        let document = IssuedDocument {
            document_number: self.sequences.next_document(),
            resident,
            source_request: None,
            kind,
            file_location,
            issued_at: Utc::now(),
            issued_by: session.actor.clone(),
        };
        self.archive.insert(document.clone())?;
        self.trail.record(AuditEntry::new(
            session.actor.clone(),
            AuditAction::DocumentRecorded,
            EntityKind::IssuedDocument,
            document.document_number.0.clone(),
            serde_json::Value::Null,
            json!({
                "kind": document.kind.label(),
                "source_request": serde_json::Value::Null,
                "file_location": document.file_location,
            }),
            origin,
        ));
        Ok(document)
    }

    /// Read one request. Residents see only their own; a request owned by
    /// someone else is indistinguishable from one that does not exist.
    pub fn get(&self, session: &Session, id: &RequestId) -> Result<RequestDetail, WorkflowError> {
        let record = self.fetch_required(id)?;
        match &session.actor {
            Actor::Staff(_) => {}
            Actor::Resident(resident) => {
                if record.resident.0 != *resident {
                    return Err(WorkflowError::NotFound);
                }
            }
            _ => return Err(WorkflowError::ResidentSessionRequired),
        }

        let document = match &record.issued_document {
            Some(number) => self.archive.fetch(number)?,
            None => None,
        };
        Ok(RequestDetail { request: record, document })
    }

    /// All of the session holder's own requests, newest first.
    pub fn list_own(&self, session: &Session) -> Result<Vec<DocumentRequest>, WorkflowError> {
        let resident = session
            .resident_id()
            .ok_or(WorkflowError::ResidentSessionRequired)?;
        Ok(self.requests.for_resident(&resident)?)
    }

    /// Staff-side search across residents by status, kind, and date range.
    pub fn search(
        &self,
        session: &Session,
        filter: &RequestFilter,
    ) -> Result<Vec<DocumentRequest>, WorkflowError> {
        require_staff(session)?;
        Ok(self.requests.search(filter)?)
    }

    /// Staff-side read over the audit trail.
    pub fn query_audit(
        &self,
        session: &Session,
        query: &AuditQuery,
    ) -> Result<AuditPage, WorkflowError> {
        require_staff(session)?;
        Ok(self.trail.query(query))
    }

    fn fetch_required(&self, id: &RequestId) -> Result<DocumentRequest, WorkflowError> {
        self.requests.fetch(id)?.ok_or(WorkflowError::NotFound)
    }

    fn transition(
        &self,
        actor: Actor,
        current: DocumentRequest,
        next: DocumentRequest,
        action: AuditAction,
        origin: Origin,
    ) -> Result<DocumentRequest, WorkflowError> {
        if !current.status.can_transition(next.status) {
            return Err(WorkflowError::Conflict(format!(
                "cannot move a {} request to {}",
                current.status.label(),
                next.status.label()
            )));
        }
        self.requests
            .update_if_status(next.clone(), current.status)
            .map_err(stale_to_conflict)?;
        self.trail.record(AuditEntry::new(
            actor,
            action,
            EntityKind::DocumentRequest,
            next.id.0.clone(),
            current.snapshot(),
            next.snapshot(),
            origin,
        ));
        Ok(next)
    }
}

fn require_staff(session: &Session) -> Result<StaffId, WorkflowError> {
    session.staff_id().ok_or(WorkflowError::StaffSessionRequired)
}

fn stale_to_conflict(err: RepositoryError) -> WorkflowError {
    match err {
        RepositoryError::Conflict => WorkflowError::Conflict(
            "request was changed by a concurrent action".to_string(),
        ),
        RepositoryError::NotFound => WorkflowError::NotFound,
        other => WorkflowError::Repository(other),
    }
}

/// Failures raised by the workflow engine.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("request not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("a resident session is required")]
    ResidentSessionRequired,
    #[error("a staff session is required")]
    StaffSessionRequired,
    #[error(transparent)]
    Issuer(#[from] IssuerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

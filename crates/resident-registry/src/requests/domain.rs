use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::{ResidentId, StaffId};

/// Identifier wrapper for document requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Human-readable, sequentially assigned request number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestNumber(pub String);

impl RequestNumber {
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("REQ-{sequence:06}"))
    }
}

/// Sequentially assigned number printed on issued documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentNumber(pub String);

impl DocumentNumber {
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("DOC-{sequence:06}"))
    }
}

/// Closed set of documents the registry issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Clearance,
    ResidencyCertificate,
    IndigencyCertificate,
    GoodMoralCertificate,
    BusinessClearance,
}

impl DocumentKind {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentKind::Clearance => "clearance",
            DocumentKind::ResidencyCertificate => "residency_certificate",
            DocumentKind::IndigencyCertificate => "indigency_certificate",
            DocumentKind::GoodMoralCertificate => "good_moral_certificate",
            DocumentKind::BusinessClearance => "business_clearance",
        }
    }
}

/// Lifecycle of a document request.
///
/// Completed and Rejected are terminal. Processing may fall back to Approved
/// only when the issuer fails; no other backwards edge exists, and a request
/// in Processing or beyond can never be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Processing,
    Completed,
    Rejected,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Processing => "processing",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Rejected)
    }

    /// The full transition table for the workflow.
    pub fn can_transition(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::Approved, RequestStatus::Processing)
                | (RequestStatus::Approved, RequestStatus::Rejected)
                | (RequestStatus::Processing, RequestStatus::Completed)
                | (RequestStatus::Processing, RequestStatus::Approved)
        )
    }
}

/// Payment state attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

/// A resident's request for a document, owned for reading by the requester
/// and mutated only through staff-driven transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub id: RequestId,
    pub request_number: RequestNumber,
    pub resident: ResidentId,
    pub kind: DocumentKind,
    pub purpose: Option<String>,
    pub status: RequestStatus,
    pub payment: PaymentStatus,
    /// Fee in centavos; absent or zero means fee-exempt.
    pub fee_cents: Option<u32>,
    pub rejection_reason: Option<String>,
    /// Visible note left when the issuer fails and the request reverts.
    pub failure_note: Option<String>,
    pub processed_by: Option<StaffId>,
    pub processed_at: Option<DateTime<Utc>>,
    pub issued_document: Option<DocumentNumber>,
    pub created_at: DateTime<Utc>,
}

impl DocumentRequest {
    pub fn fee_exempt(&self) -> bool {
        self.fee_cents.map_or(true, |fee| fee == 0)
    }

    /// Issuance is gated on settled payment unless the request is fee-exempt.
    pub fn payment_cleared(&self) -> bool {
        self.fee_exempt() || self.payment == PaymentStatus::Paid
    }

    /// Status-and-payment snapshot recorded on both sides of every audit
    /// entry for a transition.
    pub fn snapshot(&self) -> Value {
        json!({
            "status": self.status.label(),
            "payment": self.payment.label(),
            "fee_cents": self.fee_cents,
        })
    }
}

/// A durable document artifact. May exist without an originating request:
/// staff also record documents issued over the counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedDocument {
    pub document_number: DocumentNumber,
    pub resident: ResidentId,
    pub source_request: Option<RequestId>,
    pub kind: DocumentKind,
    /// Absent until generation completes.
    pub file_location: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub issued_by: crate::audit::Actor,
}

/// Bounded public summary used by the verification gateway.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedDocumentSummary {
    pub document_number: DocumentNumber,
    pub kind: DocumentKind,
    pub issued_at: DateTime<Utc>,
}

impl IssuedDocument {
    pub fn summary(&self) -> IssuedDocumentSummary {
        IssuedDocumentSummary {
            document_number: self.document_number.clone(),
            kind: self.kind,
            issued_at: self.issued_at,
        }
    }
}

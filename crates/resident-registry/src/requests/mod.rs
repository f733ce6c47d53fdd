//! Document-request workflow: the Pending → Approved → Processing →
//! Completed state machine, its payment coupling, and asynchronous issuance.

pub mod domain;
pub mod issuer;
pub mod poll;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    DocumentKind, DocumentNumber, DocumentRequest, IssuedDocument, IssuedDocumentSummary,
    PaymentStatus, RequestId, RequestNumber, RequestStatus,
};
pub use issuer::{DocumentIssuer, IssuerError, StoredFile};
pub use poll::{await_completion, PollOutcome, PollPlan};
pub use repository::{
    DocumentArchive, MemoryDocumentArchive, MemoryRequestStore, RepositoryError, RequestFilter,
    RequestRepository,
};
pub use router::request_router;
pub use service::{RequestDetail, RequestWorkflowEngine, Sequences, WorkflowError};

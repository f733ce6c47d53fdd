use super::domain::{DocumentNumber, DocumentRequest};

/// Location of a generated document artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub location: String,
}

/// The rendering collaborator. Produces a durable file for an approved
/// request; may take non-zero time, so the engine always invokes it off the
/// caller's path.
pub trait DocumentIssuer: Send + Sync {
    fn issue(
        &self,
        request: &DocumentRequest,
        number: &DocumentNumber,
    ) -> Result<StoredFile, IssuerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error("document rendering failed: {0}")]
    Rendering(String),
    #[error("document storage failed: {0}")]
    Storage(String),
}

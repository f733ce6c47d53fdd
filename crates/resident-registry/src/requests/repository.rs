use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::Deserialize;

use super::domain::{
    DocumentKind, DocumentNumber, DocumentRequest, IssuedDocument, RequestId, RequestStatus,
};
use crate::auth::ResidentId;

/// Staff-side search filter; all criteria optional and ANDed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub kind: Option<DocumentKind>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RequestFilter {
    fn matches(&self, request: &DocumentRequest) -> bool {
        if let Some(status) = self.status {
            if request.status != status {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if request.kind != kind {
                return false;
            }
        }
        let created = request.created_at.date_naive();
        if let Some(from) = self.from {
            if created < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if created > to {
                return false;
            }
        }
        true
    }
}

/// Storage abstraction over document requests.
///
/// `update_if_status` is the concurrency primitive: the new record is written
/// only if the stored status still equals `expected`, otherwise the write is
/// refused with [`RepositoryError::Conflict`]. This serializes transitions
/// per request id without a check-then-write race.
pub trait RequestRepository: Send + Sync {
    fn insert(&self, record: DocumentRequest) -> Result<DocumentRequest, RepositoryError>;
    fn update_if_status(
        &self,
        record: DocumentRequest,
        expected: RequestStatus,
    ) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<DocumentRequest>, RepositoryError>;
    fn for_resident(&self, resident: &ResidentId) -> Result<Vec<DocumentRequest>, RepositoryError>;
    fn search(&self, filter: &RequestFilter) -> Result<Vec<DocumentRequest>, RepositoryError>;
}

/// Storage abstraction over issued document records.
pub trait DocumentArchive: Send + Sync {
    fn insert(&self, document: IssuedDocument) -> Result<(), RepositoryError>;
    fn fetch(&self, number: &DocumentNumber) -> Result<Option<IssuedDocument>, RepositoryError>;
    fn for_request(&self, request: &RequestId) -> Result<Vec<IssuedDocument>, RepositoryError>;
    fn recent_for_resident(
        &self,
        resident: &ResidentId,
        limit: usize,
    ) -> Result<Vec<IssuedDocument>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was changed by another action")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Mutex-guarded reference store for requests.
#[derive(Default)]
pub struct MemoryRequestStore {
    records: Mutex<HashMap<RequestId, DocumentRequest>>,
}

impl RequestRepository for MemoryRequestStore {
    fn insert(&self, record: DocumentRequest) -> Result<DocumentRequest, RepositoryError> {
        let mut guard = self.records.lock().expect("request mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update_if_status(
        &self,
        record: DocumentRequest,
        expected: RequestStatus,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("request mutex poisoned");
        match guard.get(&record.id) {
            Some(current) if current.status == expected => {
                guard.insert(record.id.clone(), record);
                Ok(())
            }
            Some(_) => Err(RepositoryError::Conflict),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<DocumentRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_resident(&self, resident: &ResidentId) -> Result<Vec<DocumentRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request mutex poisoned");
        let mut matching: Vec<DocumentRequest> = guard
            .values()
            .filter(|record| &record.resident == resident)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    fn search(&self, filter: &RequestFilter) -> Result<Vec<DocumentRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request mutex poisoned");
        let mut matching: Vec<DocumentRequest> = guard
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}

/// Mutex-guarded reference store for issued documents.
#[derive(Default)]
pub struct MemoryDocumentArchive {
    documents: Mutex<Vec<IssuedDocument>>,
}

impl DocumentArchive for MemoryDocumentArchive {
    fn insert(&self, document: IssuedDocument) -> Result<(), RepositoryError> {
        let mut guard = self.documents.lock().expect("archive mutex poisoned");
        if guard
            .iter()
            .any(|existing| existing.document_number == document.document_number)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.push(document);
        Ok(())
    }

    fn fetch(&self, number: &DocumentNumber) -> Result<Option<IssuedDocument>, RepositoryError> {
        let guard = self.documents.lock().expect("archive mutex poisoned");
        Ok(guard
            .iter()
            .find(|document| &document.document_number == number)
            .cloned())
    }

    fn for_request(&self, request: &RequestId) -> Result<Vec<IssuedDocument>, RepositoryError> {
        let guard = self.documents.lock().expect("archive mutex poisoned");
        Ok(guard
            .iter()
            .filter(|document| document.source_request.as_ref() == Some(request))
            .cloned()
            .collect())
    }

    fn recent_for_resident(
        &self,
        resident: &ResidentId,
        limit: usize,
    ) -> Result<Vec<IssuedDocument>, RepositoryError> {
        let guard = self.documents.lock().expect("archive mutex poisoned");
        let mut matching: Vec<IssuedDocument> = guard
            .iter()
            .filter(|document| &document.resident == resident)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::domain::{PaymentStatus, RequestNumber};
    use chrono::Utc;

    fn request(id: &str, status: RequestStatus) -> DocumentRequest {
        DocumentRequest {
            id: RequestId(id.to_string()),
            request_number: RequestNumber::from_sequence(1),
            resident: ResidentId("res-1".to_string()),
            kind: DocumentKind::Clearance,
            purpose: None,
            status,
            payment: PaymentStatus::Unpaid,
            fee_cents: None,
            rejection_reason: None,
            failure_note: None,
            processed_by: None,
            processed_at: None,
            issued_document: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn stale_status_write_is_refused() {
        let store = MemoryRequestStore::default();
        store
            .insert(request("req-1", RequestStatus::Pending))
            .expect("inserts");

        let mut approved = request("req-1", RequestStatus::Approved);
        approved.processed_at = Some(Utc::now());
        store
            .update_if_status(approved, RequestStatus::Pending)
            .expect("first transition lands");

        let rejected = request("req-1", RequestStatus::Rejected);
        let err = store
            .update_if_status(rejected, RequestStatus::Pending)
            .expect_err("stale expectation refused");
        assert!(matches!(err, RepositoryError::Conflict));
    }

    #[test]
    fn archive_refuses_duplicate_document_numbers() {
        let archive = MemoryDocumentArchive::default();
        let document = IssuedDocument {
            document_number: DocumentNumber::from_sequence(1),
            resident: ResidentId("res-1".to_string()),
            source_request: None,
            kind: DocumentKind::Clearance,
            file_location: Some("documents/DOC-000001.pdf".to_string()),
            issued_at: Utc::now(),
            issued_by: crate::audit::Actor::System,
        };
        archive.insert(document.clone()).expect("first insert");
        assert!(matches!(
            archive.insert(document),
            Err(RepositoryError::Conflict)
        ));
    }
}

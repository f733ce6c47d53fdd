#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;

use resident_registry::audit::MemoryAuditTrail;
use resident_registry::auth::{
    CredentialBootstrap, MemoryAccountDirectory, ResidentAccount, ResidentId, Session,
    SessionStore, StaffId,
};
use resident_registry::requests::{
    DocumentIssuer, DocumentNumber, DocumentRequest, IssuerError, MemoryDocumentArchive,
    MemoryRequestStore, RequestWorkflowEngine, StoredFile,
};
use resident_registry::verify::{MemoryTokenStore, VerificationGateway};

pub type TestEngine =
    RequestWorkflowEngine<MemoryRequestStore, MemoryDocumentArchive, MemoryAuditTrail>;
pub type TestBootstrap = CredentialBootstrap<MemoryAccountDirectory, MemoryAuditTrail>;
pub type TestGateway = VerificationGateway<
    MemoryTokenStore,
    MemoryAccountDirectory,
    MemoryDocumentArchive,
    MemoryAuditTrail,
>;

/// Issuer stub with a switchable failure mode and an optional per-call delay
/// so tests can hold a request in Processing.
#[derive(Default)]
pub struct StubIssuer {
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl StubIssuer {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().expect("delay mutex poisoned") = delay;
    }
}

impl DocumentIssuer for StubIssuer {
    fn issue(
        &self,
        _request: &DocumentRequest,
        number: &DocumentNumber,
    ) -> Result<StoredFile, IssuerError> {
        let delay = *self.delay.lock().expect("delay mutex poisoned");
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(IssuerError::Rendering("printer jam".to_string()));
        }
        Ok(StoredFile {
            location: format!("documents/{}.pdf", number.0),
        })
    }
}

/// Everything wired together over the in-memory reference stores.
pub struct Portal {
    pub directory: Arc<MemoryAccountDirectory>,
    pub sessions: Arc<SessionStore>,
    pub trail: Arc<MemoryAuditTrail>,
    pub requests: Arc<MemoryRequestStore>,
    pub archive: Arc<MemoryDocumentArchive>,
    pub tokens: Arc<MemoryTokenStore>,
    pub issuer: Arc<StubIssuer>,
    pub engine: Arc<TestEngine>,
    pub bootstrap: Arc<TestBootstrap>,
    pub gateway: Arc<TestGateway>,
}

pub fn portal() -> Portal {
    portal_with_lookup_limit(1_000)
}

pub fn portal_with_lookup_limit(lookup_limit: u32) -> Portal {
    let directory = Arc::new(MemoryAccountDirectory::default());
    let sessions = Arc::new(SessionStore::default());
    let trail = Arc::new(MemoryAuditTrail::default());
    let requests = Arc::new(MemoryRequestStore::default());
    let archive = Arc::new(MemoryDocumentArchive::default());
    let tokens = Arc::new(MemoryTokenStore::default());
    let issuer = Arc::new(StubIssuer::default());

    let engine = Arc::new(RequestWorkflowEngine::new(
        requests.clone(),
        archive.clone(),
        trail.clone(),
        issuer.clone(),
        sessions.clone(),
    ));
    let bootstrap = Arc::new(CredentialBootstrap::new(
        directory.clone(),
        sessions.clone(),
        trail.clone(),
    ));
    let gateway = Arc::new(VerificationGateway::new(
        tokens.clone(),
        directory.clone(),
        archive.clone(),
        trail.clone(),
        sessions.clone(),
        lookup_limit,
        Duration::from_secs(60),
    ));

    Portal {
        directory,
        sessions,
        trail,
        requests,
        archive,
        tokens,
        issuer,
        engine,
        bootstrap,
        gateway,
    }
}

pub fn account(resident_id: &str, contact: &str) -> ResidentAccount {
    ResidentAccount {
        resident_id: ResidentId(resident_id.to_string()),
        contact: contact.to_string(),
        full_name: "Maria Santos".to_string(),
        address: "12 Mabini St".to_string(),
        birthdate: NaiveDate::from_ymd_opt(1990, 5, 1).expect("valid date"),
        password_hash: None,
        has_password: false,
        active: true,
    }
}

pub fn seed_maria(portal: &Portal) -> ResidentId {
    portal.directory.seed(account("res-1", "09171234567"));
    ResidentId("res-1".to_string())
}

pub fn staff_session(portal: &Portal) -> Session {
    let token = portal
        .sessions
        .issue_staff(&StaffId("staff-1".to_string()));
    portal
        .sessions
        .resolve(&token.0)
        .expect("staff session resolves")
}

pub fn resident_session(portal: &Portal, resident_id: &str) -> Session {
    let token = portal
        .sessions
        .issue_resident(&ResidentId(resident_id.to_string()));
    portal
        .sessions
        .resolve(&token.0)
        .expect("resident session resolves")
}

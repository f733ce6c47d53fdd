use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use super::domain::{PublicProfile, VerificationToken, RECENT_DOCUMENT_LIMIT};
use super::throttle::LookupThrottle;
use crate::audit::{AuditAction, AuditEntry, AuditTrail, EntityKind, Origin};
use crate::auth::{AccountDirectory, ResidentId, Session, SessionStore};
use crate::requests::DocumentArchive;

/// Storage abstraction for the token ↔ resident association.
pub trait TokenStore: Send + Sync {
    /// Bind `token` to `resident`, unless the resident already holds a token,
    /// in which case the held token is returned instead. The already-held
    /// check and the insert happen under one lock acquisition, so concurrent
    /// callers can never leave a resident with two tokens. Fails only when
    /// `token` itself is already bound to another resident.
    fn insert_or_existing(
        &self,
        token: VerificationToken,
        resident: ResidentId,
    ) -> Result<VerificationToken, TokenStoreError>;
    fn resolve(&self, token: &VerificationToken) -> Option<ResidentId>;
}

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("token value already in use")]
    Collision,
}

/// Mutex-guarded reference store with a per-resident index.
#[derive(Default)]
pub struct MemoryTokenStore {
    by_token: Mutex<HashMap<VerificationToken, ResidentId>>,
}

impl TokenStore for MemoryTokenStore {
    fn insert_or_existing(
        &self,
        token: VerificationToken,
        resident: ResidentId,
    ) -> Result<VerificationToken, TokenStoreError> {
        let mut guard = self.by_token.lock().expect("token mutex poisoned");
        if let Some((existing, _)) = guard.iter().find(|(_, owner)| **owner == resident) {
            return Ok(existing.clone());
        }
        if guard.contains_key(&token) {
            return Err(TokenStoreError::Collision);
        }
        guard.insert(token.clone(), resident);
        Ok(token)
    }

    fn resolve(&self, token: &VerificationToken) -> Option<ResidentId> {
        let guard = self.by_token.lock().expect("token mutex poisoned");
        guard.get(token).cloned()
    }
}

const GENERATION_RETRIES: usize = 4;

/// Sessionless, token-keyed read path onto a restricted resident projection,
/// plus the staff-side token issuance that feeds it.
pub struct VerificationGateway<S, R, D, T> {
    tokens: Arc<S>,
    directory: Arc<R>,
    archive: Arc<D>,
    trail: Arc<T>,
    sessions: Arc<SessionStore>,
    throttle: LookupThrottle,
}

impl<S, R, D, T> VerificationGateway<S, R, D, T>
where
    S: TokenStore + 'static,
    R: AccountDirectory + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    pub fn new(
        tokens: Arc<S>,
        directory: Arc<R>,
        archive: Arc<D>,
        trail: Arc<T>,
        sessions: Arc<SessionStore>,
        lookup_limit: u32,
        lookup_window: Duration,
    ) -> Self {
        Self {
            tokens,
            directory,
            archive,
            trail,
            sessions,
            throttle: LookupThrottle::new(lookup_limit, lookup_window),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Issue a resident's verification token. At most one token exists per
    /// resident: repeat calls return the existing token unchanged, so QR
    /// codes already printed stay valid. The store decides "existing or new"
    /// atomically, so concurrent issuance for the same resident converges on
    /// one token. A generation collision is retried with a fresh value,
    /// never surfaced.
    pub fn issue_token(
        &self,
        session: &Session,
        resident: &ResidentId,
        origin: Origin,
    ) -> Result<VerificationToken, VerifyError> {
        session.staff_id().ok_or(VerifyError::StaffSessionRequired)?;
        let account = self
            .directory
            .fetch(resident)
            .map_err(|err| VerifyError::Store(err.to_string()))?
            .ok_or(VerifyError::NotFound)?;

        for _ in 0..GENERATION_RETRIES {
            let minted = VerificationToken::mint();
            match self
                .tokens
                .insert_or_existing(minted.clone(), account.resident_id.clone())
            {
                Ok(token) => {
                    // Audit only the write that actually created the binding.
                    if token == minted {
                        self.trail.record(AuditEntry::new(
                            session.actor.clone(),
                            AuditAction::TokenIssued,
                            EntityKind::VerificationToken,
                            token.0.clone(),
                            serde_json::Value::Null,
                            json!({ "resident": account.resident_id.0 }),
                            origin.clone(),
                        ));
                    }
                    return Ok(token);
                }
                Err(TokenStoreError::Collision) => continue,
            }
        }
        Err(VerifyError::Store(
            "could not allocate a unique token".to_string(),
        ))
    }

    /// Resolve a scanned token into the restricted projection. Requires no
    /// session. Unknown and throttled lookups reveal nothing about whether
    /// the token exists.
    pub fn resolve(
        &self,
        raw_token: &str,
        origin: &Origin,
    ) -> Result<PublicProfile, VerifyError> {
        if !self.throttle.allow(&origin.remote_addr) {
            return Err(VerifyError::TooManyLookups);
        }

        let token = VerificationToken(raw_token.to_string());
        let resident = self.tokens.resolve(&token).ok_or(VerifyError::NotFound)?;
        let account = self
            .directory
            .fetch(&resident)
            .map_err(|err| VerifyError::Store(err.to_string()))?
            .ok_or(VerifyError::NotFound)?;

        let documents = self
            .archive
            .recent_for_resident(&resident, RECENT_DOCUMENT_LIMIT)
            .map_err(|err| VerifyError::Store(err.to_string()))?
            .iter()
            .map(|document| document.summary())
            .collect();

        Ok(PublicProfile::from_account(&account, documents))
    }
}

/// Failures on the verification surface.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("verification token not recognized")]
    NotFound,
    #[error("too many lookups from this address; try again later")]
    TooManyLookups,
    #[error("a staff session is required")]
    StaffSessionRequired,
    #[error("verification store error: {0}")]
    Store(String),
}

use std::sync::Arc;

use serde_json::json;

use super::domain::{login_mode, Credential, LoginMode, ResidentAccount, ResidentProfile};
use super::password::{hash_password, neutral_verify, verify_password};
use super::repository::{AccountDirectory, DirectoryError};
use super::session::{Session, SessionStore, SessionToken};
use crate::audit::{Actor, AuditAction, AuditEntry, AuditTrail, EntityKind, Origin};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Successful login payload.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub token: SessionToken,
    pub profile: ResidentProfile,
    /// True when the account authenticated by birthdate and still needs its
    /// one-time password setup.
    pub requires_password_setup: bool,
}

/// Resolves login mode and promotes accounts from birthdate verification to
/// password auth. Every attempt, pass or fail, leaves one audit entry.
pub struct CredentialBootstrap<R, T> {
    directory: Arc<R>,
    sessions: Arc<SessionStore>,
    trail: Arc<T>,
}

impl<R, T> CredentialBootstrap<R, T>
where
    R: AccountDirectory + 'static,
    T: AuditTrail + 'static,
{
    pub fn new(directory: Arc<R>, sessions: Arc<SessionStore>, trail: Arc<T>) -> Self {
        Self {
            directory,
            sessions,
            trail,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Authenticate a resident by contact number plus password or birthdate.
    ///
    /// An unknown contact, a deactivated account, and a wrong secret all
    /// surface as [`AuthError::InvalidCredential`]; the only mode signal the
    /// caller ever receives is [`AuthError::PasswordRequired`] when a
    /// birthdate is offered against a password-bearing account.
    pub fn login(
        &self,
        contact: &str,
        credential: Credential,
        origin: Origin,
    ) -> Result<LoginSuccess, AuthError> {
        let account = match self.directory.fetch_by_contact(contact)? {
            Some(account) if account.active => account,
            _ => {
                // Keep the unknown-contact path as expensive as a real
                // verification before failing.
                if let Credential::Password(password) = &credential {
                    neutral_verify(password);
                }
                self.record_failure(Actor::Anonymous, contact, "invalid credential", &origin);
                return Err(AuthError::InvalidCredential);
            }
        };

        let actor = Actor::Resident(account.resident_id.0.clone());
        let outcome = self.check_credential(&account, credential);

        match outcome {
            Ok(requires_password_setup) => {
                let token = self.sessions.issue_resident(&account.resident_id);
                self.trail.record(AuditEntry::new(
                    actor,
                    AuditAction::LoginSucceeded,
                    EntityKind::ResidentAccount,
                    account.resident_id.0.clone(),
                    serde_json::Value::Null,
                    json!({ "requires_password_setup": requires_password_setup }),
                    origin,
                ));
                Ok(LoginSuccess {
                    token,
                    profile: account.profile(),
                    requires_password_setup,
                })
            }
            Err(err) => {
                let reason = match &err {
                    AuthError::PasswordRequired => "password required",
                    _ => "invalid credential",
                };
                self.record_failure(actor, &account.resident_id.0, reason, &origin);
                Err(err)
            }
        }
    }

    fn check_credential(
        &self,
        account: &ResidentAccount,
        credential: Credential,
    ) -> Result<bool, AuthError> {
        match (login_mode(account), credential) {
            (LoginMode::Password, Credential::Password(password)) => {
                let hash = account
                    .password_hash
                    .as_deref()
                    .ok_or(AuthError::InvalidCredential)?;
                if verify_password(&password, hash)? {
                    Ok(false)
                } else {
                    Err(AuthError::InvalidCredential)
                }
            }
            (LoginMode::Password, Credential::Birthdate(_)) => Err(AuthError::PasswordRequired),
            (LoginMode::Birthdate, Credential::Birthdate(birthdate)) => {
                if account.birthdate == birthdate {
                    Ok(true)
                } else {
                    Err(AuthError::InvalidCredential)
                }
            }
            (LoginMode::Birthdate, Credential::Password(password)) => {
                neutral_verify(&password);
                Err(AuthError::InvalidCredential)
            }
        }
    }

    /// Set or rotate the session holder's password. The first set is the
    /// bootstrap; either way a repeat call simply replaces the hash, so two
    /// tabs finishing setup at once both succeed with last-write-wins.
    pub fn set_password(
        &self,
        session: &Session,
        password: &str,
        confirm: &str,
        origin: Origin,
    ) -> Result<(), AuthError> {
        let resident_id = session
            .resident_id()
            .ok_or(AuthError::SessionRequired)?;

        if password != confirm {
            return Err(AuthError::Validation(
                "password and confirmation do not match".to_string(),
            ));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let hash = hash_password(password)?;
        let bootstrapped = self.directory.store_password(&resident_id, hash)?;

        let action = if bootstrapped {
            AuditAction::CredentialBootstrap
        } else {
            AuditAction::CredentialRotate
        };
        self.trail.record(AuditEntry::new(
            session.actor.clone(),
            action,
            EntityKind::ResidentAccount,
            resident_id.0,
            json!({ "has_password": !bootstrapped }),
            json!({ "has_password": true }),
            origin,
        ));
        Ok(())
    }

    fn record_failure(&self, actor: Actor, entity_id: &str, reason: &str, origin: &Origin) {
        self.trail.record(AuditEntry::new(
            actor,
            AuditAction::LoginFailed,
            EntityKind::ResidentAccount,
            entity_id,
            serde_json::Value::Null,
            json!({ "reason": reason }),
            origin.clone(),
        ));
    }
}

/// Failures on the credential surface.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Covers unknown contact, deactivated account, and wrong secret alike.
    #[error("contact number or credential is incorrect")]
    InvalidCredential,
    /// The account finished bootstrap; the client must switch to password mode.
    #[error("this account requires its password to log in")]
    PasswordRequired,
    #[error("{0}")]
    Validation(String),
    #[error("a valid session is required")]
    SessionRequired,
    #[error("credential processing failed: {0}")]
    Credential(String),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

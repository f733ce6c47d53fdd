//! Opaque, uuid-keyed sessions.
//!
//! Sessions are explicit objects resolved per request from a bearer token;
//! there is no process-wide "current user".

use std::collections::HashMap;
use std::sync::Mutex;

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use super::domain::{ResidentId, StaffId};
use super::service::AuthError;
use crate::audit::Actor;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(pub String);

impl SessionToken {
    fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// A resolved session: who the bearer token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    pub actor: Actor,
}

impl Session {
    pub fn resident_id(&self) -> Option<ResidentId> {
        match &self.actor {
            Actor::Resident(id) => Some(ResidentId(id.clone())),
            _ => None,
        }
    }

    pub fn staff_id(&self) -> Option<StaffId> {
        match &self.actor {
            Actor::Staff(id) => Some(StaffId(id.clone())),
            _ => None,
        }
    }
}

/// In-memory token-to-actor map shared by all routers. Sessions have no
/// expiry: an entry lives until `revoke` or process restart, so the map
/// grows with logins that never log out. A TTL sweep belongs here if the
/// store ever outlives short-running deployments.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Actor>>,
}

impl SessionStore {
    pub fn issue_resident(&self, resident: &ResidentId) -> SessionToken {
        self.issue(Actor::Resident(resident.0.clone()))
    }

    pub fn issue_staff(&self, staff: &StaffId) -> SessionToken {
        self.issue(Actor::Staff(staff.0.clone()))
    }

    fn issue(&self, actor: Actor) -> SessionToken {
        let token = SessionToken::mint();
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.insert(token.0.clone(), actor);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Session> {
        let guard = self.sessions.lock().expect("session mutex poisoned");
        guard.get(token).map(|actor| Session {
            token: SessionToken(token.to_string()),
            actor: actor.clone(),
        })
    }

    pub fn revoke(&self, token: &str) {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.remove(token);
    }

    /// Resolve the `Authorization: Bearer <token>` header into a session.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Session, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::SessionRequired)?;
        self.resolve(&token).ok_or(AuthError::SessionRequired)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_sessions_resolve_to_their_actor() {
        let store = SessionStore::default();
        let token = store.issue_resident(&ResidentId("res-1".to_string()));
        let session = store.resolve(&token.0).expect("session resolves");
        assert_eq!(session.resident_id(), Some(ResidentId("res-1".to_string())));
        assert_eq!(session.staff_id(), None);
    }

    #[test]
    fn revoked_sessions_no_longer_resolve() {
        let store = SessionStore::default();
        let token = store.issue_staff(&StaffId("staff-1".to_string()));
        store.revoke(&token.0);
        assert!(store.resolve(&token.0).is_none());
    }

    #[test]
    fn authenticate_requires_bearer_header() {
        let store = SessionStore::default();
        let token = store.issue_resident(&ResidentId("res-1".to_string()));

        let mut headers = HeaderMap::new();
        assert!(store.authenticate(&headers).is_err());

        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token.0).parse().expect("header value"),
        );
        assert!(store.authenticate(&headers).is_ok());
    }
}

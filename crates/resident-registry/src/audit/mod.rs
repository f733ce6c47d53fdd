//! Append-only activity trail.
//!
//! Every mutation of an account, request, or issued document records exactly
//! one [`AuditEntry`]. The [`AuditTrail`] trait exposes `record` and a
//! paginated `query` and nothing else, so immutability is enforced by the
//! type rather than by convention. Recording is infallible by signature:
//! the business mutation has already committed by the time an entry is
//! written, and the trail must never veto it.

use std::sync::Mutex;

use axum::http::HeaderMap;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who performed an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Resident(String),
    Staff(String),
    /// Background work such as the issuance task.
    System,
    /// Sessionless callers on the public verification path.
    Anonymous,
}

/// Closed set of recordable actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    LoginSucceeded,
    LoginFailed,
    CredentialBootstrap,
    CredentialRotate,
    RequestSubmitted,
    RequestApproved,
    RequestRejected,
    PaymentConfirmed,
    IssuanceStarted,
    IssuanceCompleted,
    IssuanceFailed,
    DocumentRecorded,
    TokenIssued,
}

/// Entity families the trail covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ResidentAccount,
    DocumentRequest,
    IssuedDocument,
    VerificationToken,
}

/// Network metadata captured with every entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub remote_addr: String,
    pub client: String,
}

impl Origin {
    pub fn new(remote_addr: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            client: client.into(),
        }
    }

    /// Best-effort extraction from request headers; proxies put the caller
    /// address in `x-forwarded-for`. The header is only as trustworthy as
    /// the deployment: a reverse proxy in front of the service must strip
    /// any client-supplied value and set its own, or the recorded address
    /// (and anything keyed on it, like the lookup throttle) is spoofable.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let remote_addr = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let client = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        Self {
            remote_addr,
            client,
        }
    }

    pub fn internal() -> Self {
        Self::new("internal", "registry-core")
    }
}

/// One immutable activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: Actor,
    pub action: AuditAction,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    /// Opaque snapshot of the entity before the mutation, `null` for creations.
    pub before: Value,
    /// Opaque snapshot after the mutation.
    pub after: Value,
    pub recorded_at: DateTime<Utc>,
    pub origin: Origin,
}

impl AuditEntry {
    pub fn new(
        actor: Actor,
        action: AuditAction,
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        before: Value,
        after: Value,
        origin: Origin,
    ) -> Self {
        Self {
            actor,
            action,
            entity_kind,
            entity_id: entity_id.into(),
            before,
            after,
            recorded_at: Utc::now(),
            origin,
        }
    }
}

/// Read filter; all fields optional and ANDed together.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub actor: Option<Actor>,
    pub action: Option<AuditAction>,
    pub entity_kind: Option<EntityKind>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// One-based page index.
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl AuditQuery {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(actor) = &self.actor {
            if actor != &entry.actor {
                return false;
            }
        }
        if let Some(action) = self.action {
            if action != entry.action {
                return false;
            }
        }
        if let Some(kind) = self.entity_kind {
            if kind != entry.entity_kind {
                return false;
            }
        }
        let recorded = entry.recorded_at.date_naive();
        if let Some(from) = self.from {
            if recorded < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if recorded > to {
                return false;
            }
        }
        true
    }
}

/// One page of matching entries, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

const DEFAULT_PER_PAGE: usize = 50;

/// Append-and-read contract. No update or delete exists.
pub trait AuditTrail: Send + Sync {
    fn record(&self, entry: AuditEntry);
    fn query(&self, query: &AuditQuery) -> AuditPage;
}

/// Reference trail backed by a mutex-guarded vector.
#[derive(Default)]
pub struct MemoryAuditTrail {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditTrail for MemoryAuditTrail {
    fn record(&self, entry: AuditEntry) {
        let mut guard = self.entries.lock().expect("audit mutex poisoned");
        guard.push(entry);
    }

    fn query(&self, query: &AuditQuery) -> AuditPage {
        let guard = self.entries.lock().expect("audit mutex poisoned");
        let mut matching: Vec<AuditEntry> = guard
            .iter()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect();
        matching.reverse();

        let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).max(1);
        let page = query.page.unwrap_or(1).max(1);
        let total = matching.len();
        let entries = matching
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        AuditPage {
            entries,
            page,
            per_page,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(action: AuditAction, entity_id: &str) -> AuditEntry {
        AuditEntry::new(
            Actor::Staff("staff-1".to_string()),
            action,
            EntityKind::DocumentRequest,
            entity_id,
            Value::Null,
            json!({ "status": "pending" }),
            Origin::internal(),
        )
    }

    #[test]
    fn query_filters_by_action() {
        let trail = MemoryAuditTrail::default();
        trail.record(entry(AuditAction::RequestSubmitted, "req-1"));
        trail.record(entry(AuditAction::RequestApproved, "req-1"));
        trail.record(entry(AuditAction::RequestSubmitted, "req-2"));

        let page = trail.query(&AuditQuery {
            action: Some(AuditAction::RequestSubmitted),
            ..AuditQuery::default()
        });

        assert_eq!(page.total, 2);
        assert!(page
            .entries
            .iter()
            .all(|entry| entry.action == AuditAction::RequestSubmitted));
    }

    #[test]
    fn query_paginates_newest_first() {
        let trail = MemoryAuditTrail::default();
        for index in 0..5 {
            trail.record(entry(AuditAction::RequestSubmitted, &format!("req-{index}")));
        }

        let page = trail.query(&AuditQuery {
            page: Some(2),
            per_page: Some(2),
            ..AuditQuery::default()
        });

        assert_eq!(page.total, 5);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].entity_id, "req-2");
        assert_eq!(page.entries[1].entity_id, "req-1");
    }

    #[test]
    fn origin_from_headers_falls_back_to_unknown() {
        let headers = HeaderMap::new();
        let origin = Origin::from_headers(&headers);
        assert_eq!(origin.remote_addr, "unknown");
        assert_eq!(origin.client, "unknown");
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::ResidentAccount;
use crate::requests::IssuedDocumentSummary;

/// Opaque identifier embedded in a printed QR code. Carries no PII; the only
/// way to turn it into data is the public gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationToken(pub String);

impl VerificationToken {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// The maximum number of document summaries a public lookup may reveal.
pub const RECENT_DOCUMENT_LIMIT: usize = 5;

/// Restricted projection served to unauthenticated scanners. Explicit
/// allow-list of fields; built only from this struct so nothing else can
/// leak through the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub full_name: String,
    pub contact: String,
    pub address: String,
    pub active: bool,
    pub recent_documents: Vec<IssuedDocumentSummary>,
}

impl PublicProfile {
    pub fn from_account(account: &ResidentAccount, documents: Vec<IssuedDocumentSummary>) -> Self {
        Self {
            full_name: account.full_name.clone(),
            contact: account.contact.clone(),
            address: account.address.clone(),
            active: account.active,
            recent_documents: documents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::auth::ResidentId;

    #[test]
    fn projection_never_serializes_secrets() {
        let account = ResidentAccount {
            resident_id: ResidentId("res-1".to_string()),
            contact: "09171234567".to_string(),
            full_name: "Maria Santos".to_string(),
            address: "12 Mabini St".to_string(),
            birthdate: NaiveDate::from_ymd_opt(1990, 5, 1).expect("valid date"),
            password_hash: Some("$argon2id$stub".to_string()),
            has_password: true,
            active: true,
        };
        let profile = PublicProfile::from_account(&account, Vec::new());
        let value = serde_json::to_value(&profile).expect("serializes");
        assert!(value.get("password_hash").is_none());
        assert!(value.get("birthdate").is_none());
        assert!(value.get("resident_id").is_none());
    }
}

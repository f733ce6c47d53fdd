use std::collections::HashMap;
use std::sync::Mutex;

use super::domain::{ResidentAccount, ResidentId};

/// Storage abstraction over resident accounts. Durable storage is an
/// external collaborator; [`MemoryAccountDirectory`] is the reference
/// implementation used by the API service and tests.
pub trait AccountDirectory: Send + Sync {
    fn fetch_by_contact(&self, contact: &str) -> Result<Option<ResidentAccount>, DirectoryError>;
    fn fetch(&self, id: &ResidentId) -> Result<Option<ResidentAccount>, DirectoryError>;
    /// Store a new password hash. Returns `true` when this set was the
    /// bootstrap (no hash existed before), decided under the store's lock so
    /// two concurrent first-time setups cannot both observe "first".
    fn store_password(&self, id: &ResidentId, hash: String) -> Result<bool, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("account not found")]
    NotFound,
    #[error("account directory unavailable: {0}")]
    Unavailable(String),
}

/// Mutex-guarded map keyed by resident id, with a contact index.
#[derive(Default)]
pub struct MemoryAccountDirectory {
    accounts: Mutex<HashMap<ResidentId, ResidentAccount>>,
}

impl MemoryAccountDirectory {
    /// Register an account the way staff-side record creation would.
    pub fn seed(&self, account: ResidentAccount) {
        let mut guard = self.accounts.lock().expect("directory mutex poisoned");
        guard.insert(account.resident_id.clone(), account);
    }
}

impl AccountDirectory for MemoryAccountDirectory {
    fn fetch_by_contact(&self, contact: &str) -> Result<Option<ResidentAccount>, DirectoryError> {
        let guard = self.accounts.lock().expect("directory mutex poisoned");
        Ok(guard
            .values()
            .find(|account| account.contact == contact)
            .cloned())
    }

    fn fetch(&self, id: &ResidentId) -> Result<Option<ResidentAccount>, DirectoryError> {
        let guard = self.accounts.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn store_password(&self, id: &ResidentId, hash: String) -> Result<bool, DirectoryError> {
        let mut guard = self.accounts.lock().expect("directory mutex poisoned");
        let account = guard.get_mut(id).ok_or(DirectoryError::NotFound)?;
        let first_set = account.password_hash.is_none();
        account.password_hash = Some(hash);
        account.has_password = true;
        Ok(first_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn account() -> ResidentAccount {
        ResidentAccount {
            resident_id: ResidentId("res-1".to_string()),
            contact: "09171234567".to_string(),
            full_name: "Maria Santos".to_string(),
            address: "12 Mabini St".to_string(),
            birthdate: NaiveDate::from_ymd_opt(1990, 5, 1).expect("valid date"),
            password_hash: None,
            has_password: false,
            active: true,
        }
    }

    #[test]
    fn store_password_reports_bootstrap_once() {
        let directory = MemoryAccountDirectory::default();
        directory.seed(account());
        let id = ResidentId("res-1".to_string());

        let first = directory
            .store_password(&id, "hash-a".to_string())
            .expect("stores");
        let second = directory
            .store_password(&id, "hash-b".to_string())
            .expect("stores");

        assert!(first);
        assert!(!second);

        let stored = directory.fetch(&id).expect("fetches").expect("present");
        assert!(stored.has_password);
        assert_eq!(stored.password_hash.as_deref(), Some("hash-b"));
    }

    #[test]
    fn contact_lookup_finds_seeded_account() {
        let directory = MemoryAccountDirectory::default();
        directory.seed(account());
        let found = directory
            .fetch_by_contact("09171234567")
            .expect("queries")
            .expect("present");
        assert_eq!(found.resident_id, ResidentId("res-1".to_string()));
        assert!(directory
            .fetch_by_contact("09990000000")
            .expect("queries")
            .is_none());
    }
}

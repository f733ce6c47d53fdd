use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for resident records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResidentId(pub String);

/// Identifier wrapper for staff operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaffId(pub String);

/// Portal account attached to a resident record.
///
/// Accounts are created by staff alongside the resident record; they are
/// never deleted, only deactivated. `has_password` flips from false to true
/// exactly once, at credential bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidentAccount {
    pub resident_id: ResidentId,
    /// Unique contact number, doubling as the login handle.
    pub contact: String,
    pub full_name: String,
    pub address: String,
    /// On-file date of birth, compared for exact equality pre-password.
    pub birthdate: NaiveDate,
    pub password_hash: Option<String>,
    pub has_password: bool,
    pub active: bool,
}

impl ResidentAccount {
    pub fn profile(&self) -> ResidentProfile {
        ResidentProfile {
            resident_id: self.resident_id.clone(),
            full_name: self.full_name.clone(),
            contact: self.contact.clone(),
            address: self.address.clone(),
        }
    }
}

/// The two ways a resident can prove who they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    Birthdate(NaiveDate),
}

/// Which credential an account currently accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    Password,
    Birthdate,
}

/// Pure function of account state; no runtime field sniffing.
pub fn login_mode(account: &ResidentAccount) -> LoginMode {
    if account.has_password {
        LoginMode::Password
    } else {
        LoginMode::Birthdate
    }
}

/// What a resident sees about themselves after login. Never carries the
/// password hash or the birthdate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentProfile {
    pub resident_id: ResidentId,
    pub full_name: String,
    pub contact: String,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(has_password: bool) -> ResidentAccount {
        ResidentAccount {
            resident_id: ResidentId("res-1".to_string()),
            contact: "09171234567".to_string(),
            full_name: "Maria Santos".to_string(),
            address: "12 Mabini St".to_string(),
            birthdate: NaiveDate::from_ymd_opt(1990, 5, 1).expect("valid date"),
            password_hash: has_password.then(|| "$argon2id$stub".to_string()),
            has_password,
            active: true,
        }
    }

    #[test]
    fn mode_follows_password_flag() {
        assert_eq!(login_mode(&account(false)), LoginMode::Birthdate);
        assert_eq!(login_mode(&account(true)), LoginMode::Password);
    }

    #[test]
    fn profile_omits_secrets() {
        let profile = account(true).profile();
        let serialized = serde_json::to_value(&profile).expect("serializes");
        assert!(serialized.get("password_hash").is_none());
        assert!(serialized.get("birthdate").is_none());
    }
}

//! End-to-end scenarios for the credential bootstrap: birthdate-verified
//! first login, one-time password promotion, and the failure surface that
//! must not leak whether a contact number is registered.

mod common;

use chrono::NaiveDate;

use common::{account, portal, seed_maria};
use resident_registry::audit::{AuditAction, AuditQuery, AuditTrail, Origin};
use resident_registry::auth::{AuthError, Credential};

fn birthdate(year: i32, month: u32, day: u32) -> Credential {
    Credential::Birthdate(NaiveDate::from_ymd_opt(year, month, day).expect("valid date"))
}

#[test]
fn correct_birthdate_logs_in_and_flags_password_setup() {
    let portal = portal();
    seed_maria(&portal);

    let success = portal
        .bootstrap
        .login("09171234567", birthdate(1990, 5, 1), Origin::internal())
        .expect("birthdate login succeeds");

    assert!(success.requires_password_setup);
    assert_eq!(success.profile.full_name, "Maria Santos");
    assert!(portal.sessions.resolve(&success.token.0).is_some());
}

#[test]
fn wrong_birthdate_fails_with_invalid_credential() {
    let portal = portal();
    seed_maria(&portal);

    let err = portal
        .bootstrap
        .login("09171234567", birthdate(1990, 5, 2), Origin::internal())
        .expect_err("wrong birthdate rejected");
    assert!(matches!(err, AuthError::InvalidCredential));
}

#[test]
fn unknown_contact_is_indistinguishable_from_wrong_secret() {
    let portal = portal();
    seed_maria(&portal);

    let unknown = portal
        .bootstrap
        .login("09990000000", birthdate(1990, 5, 1), Origin::internal())
        .expect_err("unknown contact rejected");
    let wrong = portal
        .bootstrap
        .login("09171234567", birthdate(1971, 1, 1), Origin::internal())
        .expect_err("wrong birthdate rejected");

    assert!(matches!(unknown, AuthError::InvalidCredential));
    assert!(matches!(wrong, AuthError::InvalidCredential));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[test]
fn full_bootstrap_scenario() {
    let portal = portal();
    seed_maria(&portal);

    // First login with the on-file birthdate.
    let first = portal
        .bootstrap
        .login("09171234567", birthdate(1990, 5, 1), Origin::internal())
        .expect("birthdate login succeeds");
    assert!(first.requires_password_setup);

    // One-time password setup.
    let session = portal
        .sessions
        .resolve(&first.token.0)
        .expect("session resolves");
    portal
        .bootstrap
        .set_password(&session, "secret1", "secret1", Origin::internal())
        .expect("password set");

    // Birthdate mode is now refused with the explicit mode signal.
    let err = portal
        .bootstrap
        .login("09171234567", birthdate(1990, 5, 1), Origin::internal())
        .expect_err("birthdate refused after bootstrap");
    assert!(matches!(err, AuthError::PasswordRequired));

    // The new password works and no further setup is requested.
    let second = portal
        .bootstrap
        .login(
            "09171234567",
            Credential::Password("secret1".to_string()),
            Origin::internal(),
        )
        .expect("password login succeeds");
    assert!(!second.requires_password_setup);
}

#[test]
fn password_against_passwordless_account_is_invalid_not_mode_hint() {
    let portal = portal();
    seed_maria(&portal);

    let err = portal
        .bootstrap
        .login(
            "09171234567",
            Credential::Password("guess".to_string()),
            Origin::internal(),
        )
        .expect_err("password refused before bootstrap");
    assert!(matches!(err, AuthError::InvalidCredential));
}

#[test]
fn deactivated_account_cannot_log_in() {
    let portal = portal();
    let mut deactivated = account("res-9", "09179999999");
    deactivated.active = false;
    portal.directory.seed(deactivated);

    let err = portal
        .bootstrap
        .login("09179999999", birthdate(1990, 5, 1), Origin::internal())
        .expect_err("deactivated account rejected");
    assert!(matches!(err, AuthError::InvalidCredential));
}

#[test]
fn set_password_validates_confirmation_and_length() {
    let portal = portal();
    seed_maria(&portal);
    let success = portal
        .bootstrap
        .login("09171234567", birthdate(1990, 5, 1), Origin::internal())
        .expect("birthdate login succeeds");
    let session = portal
        .sessions
        .resolve(&success.token.0)
        .expect("session resolves");

    let mismatch = portal
        .bootstrap
        .set_password(&session, "secret1", "secret2", Origin::internal())
        .expect_err("mismatch rejected");
    assert!(matches!(mismatch, AuthError::Validation(_)));

    let short = portal
        .bootstrap
        .set_password(&session, "abc", "abc", Origin::internal())
        .expect_err("short password rejected");
    assert!(matches!(short, AuthError::Validation(_)));

    // Neither failed attempt counts as a bootstrap.
    let page = portal.trail.query(&AuditQuery {
        action: Some(AuditAction::CredentialBootstrap),
        ..AuditQuery::default()
    });
    assert_eq!(page.total, 0);
}

#[test]
fn every_attempt_is_audited_with_origin() {
    let portal = portal();
    seed_maria(&portal);
    let origin = Origin::new("203.0.113.7", "portal-web");

    portal
        .bootstrap
        .login("09171234567", birthdate(1985, 1, 1), origin.clone())
        .expect_err("wrong birthdate rejected");
    portal
        .bootstrap
        .login("09171234567", birthdate(1990, 5, 1), origin.clone())
        .expect("correct birthdate accepted");

    let failures = portal.trail.query(&AuditQuery {
        action: Some(AuditAction::LoginFailed),
        ..AuditQuery::default()
    });
    let successes = portal.trail.query(&AuditQuery {
        action: Some(AuditAction::LoginSucceeded),
        ..AuditQuery::default()
    });
    assert_eq!(failures.total, 1);
    assert_eq!(successes.total, 1);
    assert_eq!(failures.entries[0].origin.remote_addr, "203.0.113.7");
    assert_eq!(successes.entries[0].origin.client, "portal-web");
}

#[test]
fn concurrent_password_setup_is_safe_and_bootstraps_once() {
    let portal = portal();
    seed_maria(&portal);
    let success = portal
        .bootstrap
        .login("09171234567", birthdate(1990, 5, 1), Origin::internal())
        .expect("birthdate login succeeds");
    let session = portal
        .sessions
        .resolve(&success.token.0)
        .expect("session resolves");

    let handles: Vec<_> = ["secret1", "secret2"]
        .into_iter()
        .map(|password| {
            let bootstrap = portal.bootstrap.clone();
            let session = session.clone();
            let password = password.to_string();
            std::thread::spawn(move || {
                bootstrap.set_password(&session, &password, &password, Origin::internal())
            })
        })
        .collect();
    for handle in handles {
        handle
            .join()
            .expect("setup thread joins")
            .expect("each call succeeds cleanly");
    }

    // Exactly one of the two writes was the bootstrap; the other is a rotate.
    let bootstraps = portal.trail.query(&AuditQuery {
        action: Some(AuditAction::CredentialBootstrap),
        ..AuditQuery::default()
    });
    let rotates = portal.trail.query(&AuditQuery {
        action: Some(AuditAction::CredentialRotate),
        ..AuditQuery::default()
    });
    assert_eq!(bootstraps.total, 1);
    assert_eq!(rotates.total, 1);

    // Last write wins: exactly one of the two passwords logs in.
    let outcomes: Vec<bool> = ["secret1", "secret2"]
        .into_iter()
        .map(|password| {
            portal
                .bootstrap
                .login(
                    "09171234567",
                    Credential::Password(password.to_string()),
                    Origin::internal(),
                )
                .is_ok()
        })
        .collect();
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
}

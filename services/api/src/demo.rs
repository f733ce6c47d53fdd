use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::infra::{build_registry_with_issuer, seed_demo_accounts, FileSystemIssuer, Registry};
use resident_registry::audit::{AuditQuery, AuditTrail, Origin};
use resident_registry::auth::{Credential, Session, StaffId};
use resident_registry::config::AppConfig;
use resident_registry::error::AppError;
use resident_registry::requests::{
    await_completion, DocumentKind, PollOutcome, PollPlan, WorkflowError,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Directory for generated documents (defaults to APP_DOCUMENT_SPOOL)
    #[arg(long)]
    pub(crate) spool_dir: Option<PathBuf>,
    /// Fee to attach on approval, in centavos (0 means fee-exempt)
    #[arg(long, default_value_t = 5_000)]
    pub(crate) fee_cents: u32,
    /// Skip the QR verification portion of the demo
    #[arg(long)]
    pub(crate) skip_verification: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(spool) = args.spool_dir {
        config.issuance.spool_dir = spool;
    }

    let issuer = Arc::new(FileSystemIssuer::new(config.issuance.spool_dir.clone())?);
    let registry = build_registry_with_issuer(&config, issuer)?;
    let maria = seed_demo_accounts(&registry.directory);
    let origin = Origin::new("127.0.0.1", "registry-demo");

    println!("Resident registry portal demo");
    println!("Documents spool: {}", config.issuance.spool_dir.display());

    // --- Credential bootstrap -------------------------------------------
    println!("\n[1] Credential bootstrap");
    let first = registry
        .bootstrap
        .login(
            "09171234567",
            Credential::Birthdate(chrono::NaiveDate::from_ymd_opt(1990, 5, 1).expect("seed date")),
            origin.clone(),
        )
        .map_err(AppError::Auth)?;
    println!(
        "- birthdate login accepted for {} (password setup required: {})",
        first.profile.full_name, first.requires_password_setup
    );

    let session = registry
        .sessions
        .resolve(&first.token.0)
        .expect("freshly issued session resolves");
    registry
        .bootstrap
        .set_password(&session, "secret1", "secret1", origin.clone())
        .map_err(AppError::Auth)?;
    println!("- password set; account promoted to password auth");

    match registry.bootstrap.login(
        "09171234567",
        Credential::Birthdate(chrono::NaiveDate::from_ymd_opt(1990, 5, 1).expect("seed date")),
        origin.clone(),
    ) {
        Err(err) => println!("- birthdate now refused: {err}"),
        Ok(_) => println!("- unexpected: birthdate still accepted"),
    }

    let resident = login_with_password(&registry, &origin)?;
    println!("- password login accepted");

    // --- Request lifecycle ----------------------------------------------
    println!("\n[2] Document request lifecycle");
    let request = registry
        .engine
        .submit(
            &resident,
            DocumentKind::Clearance,
            Some("for employment".to_string()),
            origin.clone(),
        )
        .map_err(AppError::Workflow)?;
    println!(
        "- submitted {} ({}) as {}",
        request.request_number.0,
        request.kind.label(),
        request.status.label()
    );

    let staff_token = registry
        .sessions
        .issue_staff(&StaffId("staff-demo".to_string()));
    let staff = registry
        .sessions
        .resolve(&staff_token.0)
        .expect("staff session resolves");

    let approved = registry
        .engine
        .approve(&staff, &request.id, Some(args.fee_cents), origin.clone())
        .map_err(AppError::Workflow)?;
    println!(
        "- approved with fee {:?} centavos; payment {}",
        approved.fee_cents,
        approved.payment.label()
    );

    if !approved.payment_cleared() {
        let paid = registry
            .engine
            .confirm_payment(&request.id, origin.clone())
            .map_err(AppError::Workflow)?;
        println!("- payment confirmed: {}", paid.payment.label());
    }

    registry
        .engine
        .begin_issuance(&staff, &request.id, origin.clone())
        .map_err(AppError::Workflow)?;
    println!("- issuance started; polling for completion");

    let plan = PollPlan {
        interval: Duration::from_millis(200),
        max_attempts: 25,
    };
    match await_completion(&registry.engine, &resident, &request.id, plan)
        .await
        .map_err(AppError::Workflow)?
    {
        PollOutcome::Completed(detail) => {
            let document = detail.document.expect("completed request links a document");
            println!(
                "- completed: {} at {}",
                document.document_number.0,
                document.file_location.as_deref().unwrap_or("<pending>")
            );
        }
        PollOutcome::Rejected(detail) => println!(
            "- rejected: {}",
            detail
                .request
                .rejection_reason
                .as_deref()
                .unwrap_or("<no reason>")
        ),
        PollOutcome::StillProcessing(_) => {
            println!("- still processing after the polling budget; check back later")
        }
    }

    // --- QR verification -------------------------------------------------
    if !args.skip_verification {
        println!("\n[3] QR verification");
        let token = registry
            .gateway
            .issue_token(&staff, &maria, origin.clone())
            .map_err(AppError::Verify)?;
        println!("- verification token issued: {}", token.0);

        let profile = registry
            .gateway
            .resolve(&token.0, &origin)
            .map_err(AppError::Verify)?;
        println!(
            "- public projection: {} ({}), {} recent document(s)",
            profile.full_name,
            profile.address,
            profile.recent_documents.len()
        );
    }

    // --- Audit trail ------------------------------------------------------
    println!("\n[4] Audit trail");
    let page = registry.trail.query(&AuditQuery {
        per_page: Some(50),
        ..AuditQuery::default()
    });
    println!("- {} entries recorded:", page.total);
    for entry in page.entries.iter().rev() {
        println!(
            "  {:?} {} ({})",
            entry.action, entry.entity_id, entry.origin.remote_addr
        );
    }

    Ok(())
}

fn login_with_password(registry: &Registry, origin: &Origin) -> Result<Session, AppError> {
    let success = registry
        .bootstrap
        .login(
            "09171234567",
            Credential::Password("secret1".to_string()),
            origin.clone(),
        )
        .map_err(AppError::Auth)?;
    registry
        .sessions
        .resolve(&success.token.0)
        .ok_or_else(|| AppError::Workflow(WorkflowError::NotFound))
}

//! Bounded client-side polling for asynchronous issuance.
//!
//! The caller never blocks on the issuer directly: it polls `get` at a fixed
//! interval until the request is terminal or the attempt budget runs out, at
//! which point "still processing" is reported as a valid outcome rather than
//! an error.

use std::time::Duration;

use super::domain::{RequestId, RequestStatus};
use super::repository::{DocumentArchive, RequestRepository};
use super::service::{RequestDetail, RequestWorkflowEngine, WorkflowError};
use crate::audit::AuditTrail;
use crate::auth::Session;

/// How often and how long to poll before giving up.
#[derive(Debug, Clone, Copy)]
pub struct PollPlan {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPlan {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            max_attempts: 20,
        }
    }
}

/// Terminal observation of a poll loop.
#[derive(Debug)]
pub enum PollOutcome {
    Completed(RequestDetail),
    Rejected(RequestDetail),
    /// The attempt budget ran out while issuance was still in flight.
    StillProcessing(RequestDetail),
}

pub async fn await_completion<R, D, T>(
    engine: &RequestWorkflowEngine<R, D, T>,
    session: &Session,
    id: &RequestId,
    plan: PollPlan,
) -> Result<PollOutcome, WorkflowError>
where
    R: RequestRepository + 'static,
    D: DocumentArchive + 'static,
    T: AuditTrail + 'static,
{
    let attempts = plan.max_attempts.max(1);
    let mut detail = engine.get(session, id)?;
    for attempt in 0..attempts {
        match detail.request.status {
            RequestStatus::Completed => return Ok(PollOutcome::Completed(detail)),
            RequestStatus::Rejected => return Ok(PollOutcome::Rejected(detail)),
            _ => {
                // A present file location means issuance finished even if the
                // status write has not landed yet.
                if detail.document.as_ref().is_some_and(|d| d.file_location.is_some()) {
                    return Ok(PollOutcome::Completed(detail));
                }
            }
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(plan.interval).await;
            detail = engine.get(session, id)?;
        }
    }
    Ok(PollOutcome::StillProcessing(detail))
}

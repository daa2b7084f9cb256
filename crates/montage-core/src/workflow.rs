//! Job status machine.
//!
//! Statuses form a total order: `Pending -> Received -> InProgress ->
//! Completed -> Shipped`. Any forward move is legal, including skipping
//! intermediate states. Moving backward is not. Re-submitting the current
//! status succeeds without changing anything.

use crate::error::{MontageError, MontageResult};
use crate::models::account::{Account, Role};
use crate::models::job::{Job, JobStatus};

/// Result of a legal transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The requested status equals the current one.
    Unchanged,
    /// The job moved forward; the owner should be notified.
    Advanced { from: JobStatus, to: JobStatus },
}

impl TransitionOutcome {
    pub fn is_change(&self) -> bool {
        matches!(self, TransitionOutcome::Advanced { .. })
    }
}

/// Check that `actor` may move a job from `current` to `target`.
pub fn check_transition(
    current: JobStatus,
    target: JobStatus,
    actor: &Account,
) -> MontageResult<TransitionOutcome> {
    match actor.role {
        Role::Manager | Role::Admin => {}
        Role::Client => {
            return Err(MontageError::forbidden(
                "shops cannot change the status of a job",
            ));
        }
    }

    if target < current {
        return Err(MontageError::InvalidTransition {
            from: current,
            to: target,
        });
    }
    if target == current {
        return Ok(TransitionOutcome::Unchanged);
    }
    Ok(TransitionOutcome::Advanced {
        from: current,
        to: target,
    })
}

/// Apply a transition to a job in place.
///
/// Does not touch the price snapshot or version; the caller persists the
/// job and handles notification.
pub fn transition(
    job: &mut Job,
    target: JobStatus,
    actor: &Account,
) -> MontageResult<TransitionOutcome> {
    let outcome = check_transition(job.status, target, actor)?;
    if outcome.is_change() {
        job.status = target;
    }
    Ok(outcome)
}

/// Whether a job at `status` has its price frozen.
pub fn freezes_price(status: JobStatus) -> bool {
    status >= JobStatus::Completed
}

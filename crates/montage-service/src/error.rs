//! Notification error types.
//!
//! Delivery failures are logged by the dispatcher and never converted
//! into a failure of the status change that triggered them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("recipient {0} has no reachable address")]
    Unreachable(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

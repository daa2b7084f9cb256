//! Status-change notifications.
//!
//! Delivery runs on a spawned task so the caller of a transition never
//! waits on it. At most one attempt is made per status change.

use std::sync::Arc;

use montage_core::models::job::JobStatus;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::NotifyError;

/// Outbound channel to shop accounts (e-mail, SMS, ...).
pub trait Notifier: Send + Sync + 'static {
    fn notify(
        &self,
        account_id: Uuid,
        status_label: &str,
        job_reference: &str,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Notifier that only records the event in the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(
        &self,
        account_id: Uuid,
        status_label: &str,
        job_reference: &str,
    ) -> Result<(), NotifyError> {
        info!(
            account_id = %account_id,
            status = status_label,
            job_reference,
            "Job status notification"
        );
        Ok(())
    }
}

/// Fire-and-forget front of a [`Notifier`].
pub struct NotificationDispatcher<N: Notifier> {
    notifier: Arc<N>,
}

impl<N: Notifier> Clone for NotificationDispatcher<N> {
    fn clone(&self) -> Self {
        Self {
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<N: Notifier> NotificationDispatcher<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            notifier: Arc::new(notifier),
        }
    }

    /// Queue a notification for `account_id` about a job now at `status`.
    ///
    /// Must be called from within a tokio runtime. Failures are logged and
    /// dropped.
    pub fn dispatch(&self, account_id: Uuid, status: JobStatus, job_reference: String) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier
                .notify(account_id, status.label(), &job_reference)
                .await
            {
                warn!(
                    account_id = %account_id,
                    status = %status,
                    job_reference = %job_reference,
                    error = %err,
                    "Status notification failed"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    struct ChannelNotifier(mpsc::UnboundedSender<(Uuid, String, String)>);

    impl Notifier for ChannelNotifier {
        async fn notify(
            &self,
            account_id: Uuid,
            status_label: &str,
            job_reference: &str,
        ) -> Result<(), NotifyError> {
            self.0
                .send((account_id, status_label.into(), job_reference.into()))
                .map_err(|e| NotifyError::Delivery(e.to_string()))
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        async fn notify(&self, account_id: Uuid, _: &str, _: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Unreachable(account_id.to_string()))
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_label_and_reference() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::new(ChannelNotifier(tx));
        let shop = Uuid::new_v4();

        dispatcher.dispatch(shop, JobStatus::InProgress, "CMD-9".into());

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, (shop, "in progress".to_string(), "CMD-9".to_string()));
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let dispatcher = NotificationDispatcher::new(FailingNotifier);
        dispatcher.dispatch(Uuid::new_v4(), JobStatus::Shipped, "CMD-10".into());
        tokio::task::yield_now().await;
    }
}

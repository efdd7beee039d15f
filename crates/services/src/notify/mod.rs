//! Assignment notifications sent when a session is launched.

mod email;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use email::SmtpNotifier;

/// What the assigned auditor is told about a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentNotice {
    pub recipient: String,
    pub auditor_name: String,
    pub template_name: String,
    pub access_url: String,
}

impl AssignmentNotice {
    #[must_use]
    pub fn subject(&self) -> String {
        format!("New Audit Assigned: {}", self.template_name)
    }

    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "Hello {},\n\n\
             You have been assigned a new audit: {}.\n\n\
             Start the audit here:\n{}\n",
            self.auditor_name, self.template_name, self.access_url
        )
    }
}

/// Delivers assignment notices. Failures never undo the launch.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `NotifyError` when the notice cannot be delivered.
    async fn notify(&self, notice: &AssignmentNotice) -> Result<(), NotifyError>;
}

/// Used when SMTP is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, notice: &AssignmentNotice) -> Result<(), NotifyError> {
        tracing::debug!(recipient = %notice.recipient, "notifications disabled; skipping");
        Err(NotifyError::Disabled)
    }
}

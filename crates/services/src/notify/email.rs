use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{AssignmentNotice, Notifier};
use crate::config::EmailConfig;
use crate::error::NotifyError;

/// Plain-text assignment emails over STARTTLS SMTP.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    config: EmailConfig,
}

impl SmtpNotifier {
    #[must_use]
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, notice: &AssignmentNotice) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.config.from_address.parse()?)
            .to(notice.recipient.parse()?)
            .subject(notice.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(notice.body())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notice: &AssignmentNotice) -> Result<(), NotifyError> {
        let email = self.build_message(notice)?;

        let mut transport =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);
        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport = transport.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport.build().send(email).await?;
        tracing::info!(to = %notice.recipient, "assignment email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> SmtpNotifier {
        SmtpNotifier::new(EmailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            from_address: "audits@example.com".into(),
            smtp_user: None,
            smtp_password: None,
        })
    }

    fn notice(recipient: &str) -> AssignmentNotice {
        AssignmentNotice {
            recipient: recipient.into(),
            auditor_name: "Mo".into(),
            template_name: "Ladder safety".into(),
            access_url: "https://audits.example.com/execute/1".into(),
        }
    }

    #[test]
    fn builds_message_for_valid_addresses() {
        assert!(notifier().build_message(&notice("mo@example.com")).is_ok());
    }

    #[test]
    fn rejects_malformed_recipient() {
        let err = notifier().build_message(&notice("not-an-address")).unwrap_err();
        assert!(matches!(err, NotifyError::Address(_)));
    }
}

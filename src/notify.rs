use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{error, info, warn};

use crate::settings::SmtpSettings;

/// Escalation channel for a fetch that ran out of attempts. Returns whether
/// the message went out; callers only log a `false`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> bool;
}

/// Mails the failure to the configured recipient list. Without an SMTP relay
/// or recipients the message only reaches the log.
pub struct MailNotifier {
    smtp: Option<SmtpSettings>,
    recipients: Vec<String>,
}

impl MailNotifier {
    pub fn new(smtp: Option<SmtpSettings>, recipients: Vec<String>) -> Self {
        Self { smtp, recipients }
    }

    fn build_message(&self, smtp: &SmtpSettings, subject: &str, body: &str) -> Result<Message> {
        let from: Mailbox = smtp
            .from
            .parse()
            .with_context(|| format!("Invalid sender address {:?}", smtp.from))?;

        let mut builder = Message::builder().from(from).subject(subject);
        for to in &self.recipients {
            let mailbox: Mailbox = to
                .parse()
                .with_context(|| format!("Invalid recipient address {:?}", to))?;
            builder = builder.to(mailbox);
        }

        builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("Failed to build failure mail")
    }

    fn send(smtp: &SmtpSettings, message: &Message) -> Result<()> {
        let mut relay = SmtpTransport::starttls_relay(&smtp.host)
            .with_context(|| format!("Invalid SMTP relay {}", smtp.host))?
            .port(smtp.port);
        if !smtp.username.is_empty() {
            relay = relay.credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ));
        }
        relay
            .build()
            .send(message)
            .with_context(|| format!("SMTP send via {} failed", smtp.host))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify(&self, subject: &str, body: &str) -> bool {
        let Some(smtp) = self.smtp.clone() else {
            error!(subject, body, "No SMTP relay configured; failure mail not sent");
            return false;
        };
        if self.recipients.is_empty() {
            error!(subject, body, "No failure recipients configured; failure mail not sent");
            return false;
        }

        let message = match self.build_message(&smtp, subject, body) {
            Ok(m) => m,
            Err(e) => {
                warn!("{:#}", e);
                return false;
            }
        };

        let sent = tokio::task::spawn_blocking(move || Self::send(&smtp, &message)).await;
        match sent {
            Ok(Ok(())) => {
                info!("Failure mail sent to {} recipient(s)", self.recipients.len());
                true
            }
            Ok(Err(e)) => {
                warn!("{:#}", e);
                false
            }
            Err(e) => {
                warn!("Mail task panicked: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.net".into(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: "Role Bot <bot@example.net>".into(),
        }
    }

    #[tokio::test]
    async fn unconfigured_relay_reports_not_sent() {
        let n = MailNotifier::new(None, vec!["ops@example.net".into()]);
        assert!(!n.notify("subject", "body").await);
    }

    #[tokio::test]
    async fn empty_recipient_list_reports_not_sent() {
        let n = MailNotifier::new(Some(relay()), Vec::new());
        assert!(!n.notify("subject", "body").await);
    }

    #[test]
    fn message_addresses_every_recipient() {
        let n = MailNotifier::new(
            Some(relay()),
            vec!["a@example.net".into(), "b@example.net".into()],
        );
        let msg = n.build_message(&relay(), "Scrape failed", "details").unwrap();
        assert_eq!(msg.envelope().to().len(), 2);
    }

    #[test]
    fn bad_recipient_is_rejected() {
        let n = MailNotifier::new(Some(relay()), vec!["not an address".into()]);
        assert!(n.build_message(&relay(), "s", "b").is_err());
    }
}

// ==================== OUTBOUND MAIL ====================
// OTP delivery. Production uses an authenticated SMTP relay; without SMTP credentials
// every message is logged and kept in memory instead.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt;
use std::sync::Mutex;

use crate::config::SmtpConfig;

#[derive(Debug)]
pub enum EmailError {
    RelayConnectionFailed(String),
    InvalidAddress(String),
    InvalidMessage(String),
    FailedToSend(String),
}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailError::RelayConnectionFailed(e) => write!(f, "EmailError: relay connection failed: {}", e),
            EmailError::InvalidAddress(e) => write!(f, "EmailError: invalid address: {}", e),
            EmailError::InvalidMessage(e) => write!(f, "EmailError: invalid message: {}", e),
            EmailError::FailedToSend(e) => write!(f, "EmailError: failed to send: {}", e),
        }
    }
}

impl std::error::Error for EmailError {}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait SendEmail: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(config: &SmtpConfig, app_name: &str) -> Result<Self, EmailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| EmailError::RelayConnectionFailed(e.to_string()))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let from = format!("{} <{}>", app_name, config.username)
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidAddress(e.to_string()))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl SendEmail for SmtpSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidAddress(e.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_HTML)
            .body(message.html_body)
            .map_err(|e| EmailError::InvalidMessage(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| EmailError::FailedToSend(e.to_string()))?;

        Ok(())
    }
}

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SendEmail for RecordingSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        log::info!("📧 [mail disabled] to={} subject={}", message.to, message.subject);
        log::debug!("{}", message.html_body);
        self.sent
            .lock()
            .map_err(|_| EmailError::FailedToSend("recording sender lock poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

pub fn otp_message(app_name: &str, to: &str, code: &str, ttl_seconds: i64) -> EmailMessage {
    let minutes = (ttl_seconds / 60).max(1);
    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<body style="margin:0;background:#f4f6f8;font-family:Helvetica,Arial,sans-serif;">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0">
    <tr><td align="center" style="padding:24px;">
      <table role="presentation" width="560" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:6px;">
        <tr><td style="background:#1f4e9c;color:#ffffff;padding:18px 24px;font-size:20px;">{app} email verification</td></tr>
        <tr><td style="padding:24px;font-size:16px;color:#222222;">
          <p>Use this code to finish creating your {app} account:</p>
          <p style="font-size:28px;letter-spacing:6px;font-weight:bold;color:#1f4e9c;">{code}</p>
          <p>The code expires in {minutes} minute(s) and can be used once.</p>
          <p style="color:#777777;">If you did not try to sign up, you can ignore this message.</p>
        </td></tr>
      </table>
    </td></tr>
  </table>
</body>
</html>"#,
        app = app_name,
        code = code,
        minutes = minutes,
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("{} verification code", app_name),
        html_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_message() {
        let message = otp_message("BITAcademia", "asha@example.com", "482913", 300);
        assert_eq!(message.to, "asha@example.com");
        assert!(message.subject.contains("BITAcademia"));
        assert!(message.html_body.contains("482913"));
        assert!(message.html_body.contains("5 minute(s)"));
    }

    #[tokio::test]
    async fn test_recording_sender_keeps_messages() {
        let sender = RecordingSender::new();
        sender
            .send(otp_message("Portal", "a@example.com", "111111", 60))
            .await
            .unwrap();
        sender
            .send(otp_message("Portal", "b@example.com", "222222", 60))
            .await
            .unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, "b@example.com");
    }

    #[tokio::test]
    async fn test_smtp_sender_rejects_bad_from_address() {
        let config = SmtpConfig {
            host: "smtp.example.com".into(),
            username: "not an address".into(),
            password: "secret".into(),
        };
        assert!(matches!(
            SmtpSender::new(&config, "Portal"),
            Err(EmailError::InvalidAddress(_))
        ));
    }
}

//! Outbound email
//!
//! Comment notifications are built with lettre and handed to a
//! `MailTransport`. Which transport is used comes from the `email` section of
//! the configuration: SMTP relay, one file per message, or nothing at all.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmailConfig, EmailTransportKind};

pub const COMMENT_SUBJECT: &str = "Comment";
pub const COMMENT_BODY: &str = "You have left a comment!";

/// Delivers a fully built message
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: Message) -> Result<()>;
}

/// Port of SMTP submission over implicit TLS
pub const SMTPS_PORT: u16 = 465;

/// Upper bound on one SMTP exchange, so a dead relay cannot hold a request
pub const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// TLS from the first byte (port 465)
    Implicit,
    /// Plain greeting upgraded with STARTTLS (port 587 and others)
    StartTls,
}

impl SmtpSecurity {
    pub fn for_port(port: u16) -> Self {
        if port == SMTPS_PORT {
            SmtpSecurity::Implicit
        } else {
            SmtpSecurity::StartTls
        }
    }
}

/// SMTP relay transport
pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let host = config
            .smtp_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow!("SMTP host not configured"))?;

        let builder = match SmtpSecurity::for_port(config.smtp_port) {
            SmtpSecurity::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
        }
        .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?;
        let mut builder = builder
            .port(config.smtp_port)
            .timeout(Some(SMTP_TIMEOUT));

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn deliver(&self, message: Message) -> Result<()> {
        self.mailer
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Writes each message as an `.eml` file into a directory
pub struct FileMailTransport {
    transport: AsyncFileTransport<Tokio1Executor>,
}

impl FileMailTransport {
    pub fn new(dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create email directory: {:?}", dir))?;
        Ok(Self {
            transport: AsyncFileTransport::new(dir),
        })
    }
}

#[async_trait]
impl MailTransport for FileMailTransport {
    async fn deliver(&self, message: Message) -> Result<()> {
        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to write email: {}", e))?;
        Ok(())
    }
}

/// Drops every message
pub struct DisabledMailTransport;

#[async_trait]
impl MailTransport for DisabledMailTransport {
    async fn deliver(&self, _message: Message) -> Result<()> {
        Ok(())
    }
}

/// Build the transport selected by the configuration
pub fn transport_from_config(config: &EmailConfig) -> Result<Arc<dyn MailTransport>> {
    Ok(match config.transport {
        EmailTransportKind::Smtp => Arc::new(SmtpMailTransport::new(config)?),
        EmailTransportKind::File => Arc::new(FileMailTransport::new(&config.file_dir)?),
        EmailTransportKind::Disabled => Arc::new(DisabledMailTransport),
    })
}

/// Sends the notification that follows a submitted comment
pub struct NotificationService {
    transport: Arc<dyn MailTransport>,
    from: String,
    to: String,
}

impl NotificationService {
    pub fn new(transport: Arc<dyn MailTransport>, config: &EmailConfig) -> Self {
        Self {
            transport,
            from: config.from.clone(),
            to: config.notify_to.clone(),
        }
    }

    fn build_comment_message(&self) -> Result<Message> {
        Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(self.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(COMMENT_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(COMMENT_BODY.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))
    }

    /// Send the comment notification, ignoring any failure
    pub async fn comment_submitted(&self) {
        let _ = self.try_comment_submitted().await;
    }

    async fn try_comment_submitted(&self) -> Result<()> {
        let message = self.build_comment_message()?;
        self.transport.deliver(message).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FailingTransport, RecordingTransport};
    use super::*;

    #[tokio::test]
    async fn test_comment_notification_headers() {
        let recorder = Arc::new(RecordingTransport::default());
        let service = NotificationService::new(recorder.clone(), &EmailConfig::default());

        service.comment_submitted().await;

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let raw = String::from_utf8(sent[0].formatted()).unwrap();
        assert!(raw.contains("Subject: Comment"));
        assert!(raw.contains("From: blogicum_mail@mail.com"));
        assert!(raw.contains("To: admin@blogicum.not"));
        assert!(raw.contains(COMMENT_BODY));
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let service = NotificationService::new(Arc::new(FailingTransport), &EmailConfig::default());
        // Must return normally
        service.comment_submitted().await;
    }

    #[tokio::test]
    async fn test_invalid_sender_is_swallowed() {
        let recorder = Arc::new(RecordingTransport::default());
        let config = EmailConfig {
            from: "not an address".to_string(),
            ..EmailConfig::default()
        };
        let service = NotificationService::new(recorder.clone(), &config);

        service.comment_submitted().await;

        assert_eq!(recorder.count(), 0);
    }

    #[tokio::test]
    async fn test_file_transport_writes_message() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmailConfig {
            transport: EmailTransportKind::File,
            file_dir: dir.path().join("mail"),
            ..EmailConfig::default()
        };
        let service = NotificationService::new(transport_from_config(&config).unwrap(), &config);

        service.comment_submitted().await;

        let written = std::fs::read_dir(dir.path().join("mail")).unwrap().count();
        assert_eq!(written, 1);
    }

    #[test]
    fn test_smtp_requires_host() {
        let config = EmailConfig {
            transport: EmailTransportKind::Smtp,
            ..EmailConfig::default()
        };
        assert!(transport_from_config(&config).is_err());
    }

    #[test]
    fn test_smtp_security_by_port() {
        assert_eq!(SmtpSecurity::for_port(465), SmtpSecurity::Implicit);
        assert_eq!(SmtpSecurity::for_port(587), SmtpSecurity::StartTls);
        assert_eq!(SmtpSecurity::for_port(25), SmtpSecurity::StartTls);
    }

    #[tokio::test]
    async fn test_smtp_transport_builds_for_both_ports() {
        for port in [465, 587] {
            let config = EmailConfig {
                transport: EmailTransportKind::Smtp,
                smtp_host: Some("smtp.example.com".to_string()),
                smtp_port: port,
                ..EmailConfig::default()
            };
            assert!(transport_from_config(&config).is_ok());
        }
    }
}

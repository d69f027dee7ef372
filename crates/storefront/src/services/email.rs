//! SMTP delivery for order confirmations.
//!
//! Uses lettre's async transport with STARTTLS. Messages are multipart with a
//! plain text and an HTML alternative.

use async_trait::async_trait;
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;

use super::notification::{NotificationError, Notifier, OutboundEmail};
use crate::config::EmailConfig;

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::InvalidAddress` if the sender address is
    /// malformed, or `Transport` if the relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, NotificationError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e: SmtpError| NotificationError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        let address = config
            .from_address
            .parse::<Address>()
            .map_err(|_| NotificationError::InvalidAddress(config.from_address.clone()))?;

        Ok(Self {
            mailer,
            from: Mailbox::new(Some(config.from_name.clone()), address),
        })
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message, NotificationError> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|_| NotificationError::InvalidAddress(email.to.clone()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| NotificationError::Transport(format!("failed to build message: {e}")))
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotificationError> {
        let message = self.build_message(email)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use secrecy::SecretString;

    fn config(from_address: &str) -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.qmart.test".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("pw"),
            from_address: from_address.to_string(),
            from_name: "Q-Mart".to_string(),
        }
    }

    fn outbound(to: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: "Order Confirmation - 65a1b2c3d4e5f60718293a4b".to_string(),
            text_body: "Thanks for your order!".to_string(),
            html_body: "<p>Thanks for your order!</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sender_uses_display_name() {
        let service = EmailService::new(&config("orders@qmart.test")).unwrap();
        assert_eq!(service.from.name.as_deref(), Some("Q-Mart"));
        assert_eq!(service.from.email.to_string(), "orders@qmart.test");
    }

    #[tokio::test]
    async fn test_invalid_sender_rejected() {
        assert!(matches!(
            EmailService::new(&config("not an address")),
            Err(NotificationError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let service = EmailService::new(&config("orders@qmart.test")).unwrap();
        assert!(matches!(
            service.build_message(&outbound("nobody")),
            Err(NotificationError::InvalidAddress(_))
        ));
        assert!(service.build_message(&outbound("meera@qmart.test")).is_ok());
    }
}

//! Outgoing mail over SMTP.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use placement_common::{AppError, AppResult, config::MailConfig};

/// Plain-text mailer.
#[derive(Clone)]
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Build a STARTTLS relay transport. Does not connect.
    pub fn new(config: &MailConfig) -> AppResult<Self> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid mail.from_address: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::Mail(e.to_string()))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Build a plain-text message.
    pub fn compose(&self, to: &str, subject: &str, body: &str) -> AppResult<Message> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid recipient {to}: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Mail(e.to_string()))
    }

    /// Send a plain-text message.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let message = self.compose(to, subject, body)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        tracing::debug!(to = %to, subject = %subject, "Mail sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mail_config(from: &str) -> MailConfig {
        MailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 2525,
            username: None,
            password: None,
            from_address: from.to_string(),
        }
    }

    #[test]
    fn test_compose_plain_text() {
        let service = EmailService::new(&mail_config("Placement Cell <noreply@uni.edu>")).unwrap();
        let message = service
            .compose("recruiter@acme.com", "Account approved", "You can now post jobs.")
            .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Account approved"));
        assert!(raw.contains("To: recruiter@acme.com"));
        assert!(raw.contains("text/plain"));
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(matches!(
            EmailService::new(&mail_config("not an address")),
            Err(AppError::Config(_))
        ));

        let service = EmailService::new(&mail_config("noreply@uni.edu")).unwrap();
        assert!(matches!(
            service.compose("nobody", "s", "b"),
            Err(AppError::Mail(_))
        ));
    }
}

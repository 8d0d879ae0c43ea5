use crate::config::email::EmailConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// Outbound mail boundary. Callers compose the subject and HTML body;
/// a failed delivery surfaces as [`AppError::Delivery`].
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> AppResult<()>;
}

#[derive(Clone)]
pub struct EmailService {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: Option<String>,
}

impl EmailService {
    /// Build from environment variables. Without SMTP settings the
    /// service runs in dev mode: mail is logged and skipped.
    pub fn from_env() -> Self {
        match EmailConfig::from_env() {
            Some(cfg) => {
                let creds = Credentials::new(cfg.smtp_username.clone(), cfg.smtp_password.clone());
                let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
                    .map(|builder| builder.port(cfg.smtp_port).credentials(creds).build());

                match transport {
                    Ok(t) => Self {
                        transport: Some(t),
                        from_address: Some(cfg.from_address),
                    },
                    Err(e) => {
                        tracing::warn!("Failed to build SMTP transport: {e}");
                        Self {
                            transport: None,
                            from_address: None,
                        }
                    }
                }
            }
            None => Self {
                transport: None,
                from_address: None,
            },
        }
    }

    /// Returns true if SMTP is configured and available.
    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> AppResult<()> {
        let (transport, from_address) = match (&self.transport, &self.from_address) {
            (Some(t), Some(f)) => (t, f),
            _ => {
                tracing::info!("SMTP not configured, skipping email to {to}: {subject}");
                tracing::debug!("dropped email body: {html_body}");
                return Ok(());
            }
        };

        let from_mailbox: Mailbox = from_address
            .parse()
            .map_err(|e: lettre::address::AddressError| {
                AppError::Delivery(format!("invalid from address '{from_address}': {e}"))
            })?;
        let to_mailbox: Mailbox = to.parse().map_err(|e: lettre::address::AddressError| {
            AppError::Delivery(format!("invalid to address '{to}': {e}"))
        })?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| AppError::Delivery(e.to_string()))?;

        transport
            .send(email)
            .await
            .map_err(|e| AppError::Delivery(e.to_string()))?;
        tracing::info!("Email sent to {to}: {subject}");
        Ok(())
    }
}

use anyhow::Context;
use axum::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use crate::config::SmtpConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .context("smtp relay")?
            .port(cfg.port)
            .credentials(creds)
            .build();
        let from = cfg.sender.parse().context("parse MAIL_SENDER")?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient.parse().context("parse recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build message")?;
        self.transport.send(message).await.context("smtp send")?;
        debug!(%recipient, "mail dispatched");
        Ok(())
    }
}

// src/notify/email.rs
use anyhow::{anyhow, Context, Result};
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use tracing::{info, warn};

use super::{parse_recipients, Delivery, DeliveryOutcome};
use crate::render::{RenderedDigest, DEFAULT_TITLE};

pub const DEFAULT_SENDER: &str = "no-reply@example.com";

/// SMTP settings read from the environment.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub user: String,
    pub pass: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
}

impl SmtpSettings {
    pub fn from_env() -> Result<Self> {
        let var = |k: &str| std::env::var(k).map_err(|_| anyhow!("{k} missing"));
        Ok(Self {
            host: var("SMTP_HOST")?,
            user: var("SMTP_USER")?,
            pass: var("SMTP_PASS")?,
            sender: std::env::var("SENDER_EMAIL").unwrap_or_else(|_| DEFAULT_SENDER.to_string()),
            recipients: parse_recipients(&std::env::var("RECIPIENTS").unwrap_or_default()),
            subject: std::env::var("EMAIL_SUBJECT").unwrap_or_else(|_| DEFAULT_TITLE.to_string()),
        })
    }
}

pub struct EmailDelivery {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailDelivery {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let creds = Credentials::new(settings.user.clone(), settings.pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();
        let from = settings
            .sender
            .parse()
            .with_context(|| format!("invalid SENDER_EMAIL {:?}", settings.sender))?;
        Ok(Self { mailer, from })
    }

    fn message(&self, doc: &RenderedDigest, to: &str) -> Result<Message> {
        let to: Mailbox = to.parse().with_context(|| format!("invalid recipient {to:?}"))?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(doc.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                doc.text.clone(),
                doc.html.clone(),
            ))
            .context("build email")
    }

    async fn send_one(&self, doc: &RenderedDigest, to: &str) -> Result<()> {
        let msg = self.message(doc, to)?;
        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Delivery for EmailDelivery {
    async fn deliver(&self, doc: &RenderedDigest, recipients: &[String]) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(recipients.len());
        for to in recipients {
            match self.send_one(doc, to).await {
                Ok(()) => {
                    info!(recipient = %to, "digest delivered");
                    outcomes.push(DeliveryOutcome::ok(to.as_str()));
                }
                Err(e) => {
                    warn!(recipient = %to, error = %format!("{e:#}"), "delivery failed");
                    outcomes.push(DeliveryOutcome::failed(to.as_str(), format!("{e:#}")));
                }
            }
        }
        outcomes
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

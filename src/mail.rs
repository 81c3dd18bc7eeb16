use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::{
    config::Region,
    types::{Body, Content, Destination, EmailContent, Message},
    Client,
};
use axum::async_trait;
use tracing::info;

/// Outbound mail collaborator. Takes an already rendered message; transport
/// details stay behind the trait.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SesMailer {
    client: Client,
    from: String,
}

impl SesMailer {
    pub async fn new(region: &str, from: &str) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self {
            client: Client::new(&shared),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl MailSender for SesMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let destination = Destination::builder().to_addresses(to).build();

        let subject_content = Content::builder()
            .data(subject)
            .charset("UTF-8")
            .build()
            .context("build subject")?;
        let body_content = Content::builder()
            .data(body)
            .charset("UTF-8")
            .build()
            .context("build body")?;

        let message = Message::builder()
            .subject(subject_content)
            .body(Body::builder().text(body_content).build())
            .build();

        let result = self
            .client
            .send_email()
            .from_email_address(&self.from)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .context("ses send_email")?;

        info!(to = %to, message_id = ?result.message_id(), "mail sent");
        Ok(())
    }
}

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail relay unreachable: {0}")]
    Transport(String),

    #[error("Mail relay rejected the message: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &Message) -> Result<(), MailError> {
        info!(to = %message.to, subject = %message.subject, "mail (not delivered): {}", message.body);
        Ok(())
    }
}

/// Posts messages as JSON to an HTTP mail relay.
pub struct RelayMailer {
    client: reqwest::Client,
    url: String,
    from: String,
}

impl RelayMailer {
    pub fn new(url: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, message: &Message) -> Result<(), MailError> {
        let payload = json!({
            "from": self.from,
            "to": message.to,
            "subject": message.subject,
            "text": message.body,
            "html": message.body,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{} {}", status, detail)));
        }
        info!(to = %message.to, subject = %message.subject, "mail relayed");
        Ok(())
    }
}

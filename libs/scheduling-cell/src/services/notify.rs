use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;

/// Payload for a booking confirmation message.
#[derive(Debug, Clone)]
pub struct ConfirmationNotice {
    pub recipient_email: String,
    pub recipient_name: String,
    pub doctor_name: String,
    pub formatted_date: String,
    pub formatted_time: String,
}

/// Outbound confirmation collaborator. Delivery is fire-and-forget from
/// the booking path: the engine logs a failure and keeps the booking.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_confirmation(&self, notice: ConfirmationNotice) -> Result<()>;
}

/// Posts confirmations to the configured mail relay endpoint.
pub struct MailerClient {
    client: reqwest::Client,
    endpoint: String,
    from: String,
}

impl MailerClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.mailer_url.clone(),
            from: config.mailer_from.clone(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for MailerClient {
    async fn send_confirmation(&self, notice: ConfirmationNotice) -> Result<()> {
        debug!("Sending booking confirmation to {}", notice.recipient_email);

        let body = json!({
            "from": self.from,
            "to": notice.recipient_email,
            "subject": "Your Appointment Confirmation",
            "name": notice.recipient_name,
            "doctor": notice.doctor_name,
            "date": notice.formatted_date,
            "time": notice.formatted_time,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("Mailer returned {}: {}", status, detail));
        }

        info!("Confirmation sent to {}", notice.recipient_email);
        Ok(())
    }
}

/// Used when no mailer endpoint is configured.
pub struct NullDispatcher;

#[async_trait]
impl NotificationDispatcher for NullDispatcher {
    async fn send_confirmation(&self, notice: ConfirmationNotice) -> Result<()> {
        debug!(
            "Mailer not configured, dropping confirmation for {}",
            notice.recipient_email
        );
        Ok(())
    }
}

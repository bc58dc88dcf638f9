use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::SubscriberId;

use super::{DeliveryError, NotificationChannel, OutgoingMessage};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: SubscriberId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Telegram Bot API transport for notifications.
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramChannel {
    pub fn new(token: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: TELEGRAM_API_URL.to_string(),
            token,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn send_message(
        &self,
        chat_id: SubscriberId,
        text: &str,
        parse_mode: Option<&str>,
    ) -> std::result::Result<(), DeliveryError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, self.token))
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response.json::<TelegramResponse>().await.ok();
        classify_response(status, body)
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send(
        &self,
        recipient: SubscriberId,
        message: &OutgoingMessage,
    ) -> std::result::Result<(), DeliveryError> {
        match self.send_message(recipient, &message.html, Some("HTML")).await {
            Err(DeliveryError::Rejected(reason)) if is_markup_error(&reason) => {
                tracing::debug!(recipient, "markup rejected ({}), resending as plain text", reason);
                self.send_message(recipient, &message.plain, None).await
            }
            other => other,
        }
    }
}

fn is_markup_error(reason: &str) -> bool {
    reason.to_lowercase().contains("can't parse entities")
}

fn classify_response(
    status: StatusCode,
    body: Option<TelegramResponse>,
) -> std::result::Result<(), DeliveryError> {
    if status.is_success() && body.as_ref().map_or(true, |b| b.ok) {
        return Ok(());
    }

    let description = body
        .as_ref()
        .and_then(|b| b.description.clone())
        .unwrap_or_else(|| format!("HTTP {status}"));

    match status {
        StatusCode::FORBIDDEN => Err(DeliveryError::Blocked(description)),
        StatusCode::TOO_MANY_REQUESTS => Err(DeliveryError::RateLimited {
            retry_after: body.and_then(|b| b.parameters).and_then(|p| p.retry_after),
        }),
        StatusCode::BAD_REQUEST if description.to_lowercase().contains("chat not found") => {
            Err(DeliveryError::Blocked(description))
        }
        s if s.is_server_error() => Err(DeliveryError::Transport(description)),
        _ => Err(DeliveryError::Rejected(description)),
    }
}

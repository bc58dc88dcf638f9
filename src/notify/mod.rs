mod message;
mod telegram;

pub use message::{format_price, format_tender, OutgoingMessage};
pub use telegram::TelegramChannel;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::SubscriberId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("recipient blocked the bot or is unreachable: {0}")]
    Blocked(String),

    #[error("rate limited, retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<u64> },

    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Outbound messaging transport. One call delivers one message to one
/// recipient; implementations bound each call with a timeout.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(
        &self,
        recipient: SubscriberId,
        message: &OutgoingMessage,
    ) -> std::result::Result<(), DeliveryError>;
}

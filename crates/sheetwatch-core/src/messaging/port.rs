use async_trait::async_trait;

use crate::{
    domain::ChatId,
    messaging::types::{MessageFormat, SendError},
};

/// Outbound chat port.
///
/// The dispatcher only needs "send this text to this recipient"; everything
/// Telegram-specific stays in the adapter crate.
#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn send_message(
        &self,
        recipient: ChatId,
        text: &str,
        format: MessageFormat,
    ) -> std::result::Result<(), SendError>;
}

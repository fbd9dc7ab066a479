//! Telegram adapter (teloxide).
//!
//! This crate implements the `sheetwatch-core` ChatPort over the Telegram Bot
//! API and hosts the control panel (start/stop/force-scan buttons).

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::ParseMode,
    ApiError, RequestError,
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use sheetwatch_core::{
    domain::ChatId,
    messaging::{
        port::ChatPort,
        types::{MessageFormat, SendError},
    },
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        Self::new(Bot::new(token))
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    async fn with_retry<T, Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
    ) -> std::result::Result<T, RequestError>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(after)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(after.duration()).await;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

/// Map a Telegram failure onto the dispatcher's classification.
pub fn classify(err: &RequestError) -> SendError {
    match err {
        RequestError::Api(
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::BotKickedFromChannel
            | ApiError::UserDeactivated,
        ) => SendError::Blocked,
        RequestError::Api(
            ApiError::CantInitiateConversation
            | ApiError::CantTalkWithBots
            | ApiError::ChatNotFound,
        ) => SendError::NoConversation,
        other => SendError::Rejected(format!("telegram error: {other}")),
    }
}

#[async_trait]
impl ChatPort for TelegramMessenger {
    async fn send_message(
        &self,
        recipient: ChatId,
        text: &str,
        format: MessageFormat,
    ) -> std::result::Result<(), SendError> {
        let parse_mode = match format {
            MessageFormat::MarkdownV2 => Some(ParseMode::MarkdownV2),
            MessageFormat::Html => Some(ParseMode::Html),
            MessageFormat::Text => None,
        };

        self.with_retry(|| {
            let req = self
                .bot
                .send_message(Self::tg_chat(recipient), text.to_string());
            match parse_mode {
                Some(mode) => req.parse_mode(mode),
                None => req,
            }
        })
        .await
        .map(|_| ())
        .map_err(|e| classify(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_and_kicked_are_permanent() {
        assert_eq!(
            classify(&RequestError::Api(ApiError::BotBlocked)),
            SendError::Blocked
        );
        assert_eq!(
            classify(&RequestError::Api(ApiError::UserDeactivated)),
            SendError::Blocked
        );
    }

    #[test]
    fn removal_from_groups_and_channels_is_permanent() {
        for err in [
            ApiError::BotKicked,
            ApiError::BotKickedFromSupergroup,
            ApiError::BotKickedFromChannel,
        ] {
            assert_eq!(classify(&RequestError::Api(err)), SendError::Blocked);
        }
    }

    #[test]
    fn unopened_chats_are_no_conversation() {
        assert_eq!(
            classify(&RequestError::Api(ApiError::CantInitiateConversation)),
            SendError::NoConversation
        );
        assert_eq!(
            classify(&RequestError::Api(ApiError::ChatNotFound)),
            SendError::NoConversation
        );
        assert_eq!(
            classify(&RequestError::Api(ApiError::CantTalkWithBots)),
            SendError::NoConversation
        );
    }

    #[test]
    fn markup_errors_are_rejected_for_fallback() {
        let err = RequestError::Api(ApiError::Unknown(
            "Bad Request: can't parse entities: Character '.' is reserved".to_string(),
        ));
        assert!(matches!(classify(&err), SendError::Rejected(msg) if msg.contains("parse entities")));
    }
}

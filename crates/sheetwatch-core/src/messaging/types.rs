/// Parse mode for an outgoing message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageFormat {
    MarkdownV2,
    Html,
    Text,
}

/// Why a send failed, as classified by the chat adapter.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The recipient blocked the bot (or is otherwise permanently gone).
    #[error("bot was blocked by the user")]
    Blocked,

    /// The recipient never opened a conversation with the bot.
    #[error("user has not initiated conversation with the bot")]
    NoConversation,

    /// Anything else: markup rejected, network trouble, flood control.
    #[error("{0}")]
    Rejected(String),
}

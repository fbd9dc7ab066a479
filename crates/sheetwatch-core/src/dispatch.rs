//! Per-recipient delivery with MarkdownV2 → HTML fallback.
//!
//! This is where delivery failures stop: every error is classified, logged and
//! turned into a [`DeliveryOutcome`]. Nothing here returns `Err`.

use std::sync::Arc;

use crate::{
    domain::ChatId,
    formatting::RenderedRow,
    messaging::{
        port::ChatPort,
        types::{MessageFormat, SendError},
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Sent; `fallback` is true when only the HTML rendering went through.
    Delivered { fallback: bool },
    SkippedBlocked,
    SkippedNoConversation,
    FailedBoth,
}

/// Tally of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub via_fallback: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DeliveryReport {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered { fallback } => {
                self.delivered += 1;
                if fallback {
                    self.via_fallback += 1;
                }
            }
            DeliveryOutcome::SkippedBlocked | DeliveryOutcome::SkippedNoConversation => {
                self.skipped += 1
            }
            DeliveryOutcome::FailedBoth => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.via_fallback += other.via_fallback;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    chat: Arc<dyn ChatPort>,
}

impl Dispatcher {
    pub fn new(chat: Arc<dyn ChatPort>) -> Self {
        Self { chat }
    }

    pub async fn deliver(&self, recipient: ChatId, rich: &str, plain: &str) -> DeliveryOutcome {
        let rich_err = match self
            .chat
            .send_message(recipient, rich, MessageFormat::MarkdownV2)
            .await
        {
            Ok(()) => return DeliveryOutcome::Delivered { fallback: false },
            Err(e) => e,
        };

        match rich_err {
            SendError::NoConversation => {
                tracing::info!(
                    %recipient,
                    "Cannot send message: user has not initiated conversation with the bot"
                );
                DeliveryOutcome::SkippedNoConversation
            }
            SendError::Blocked => {
                tracing::info!(%recipient, "Cannot send message: bot was blocked by the user");
                DeliveryOutcome::SkippedBlocked
            }
            SendError::Rejected(reason) => {
                tracing::warn!(%recipient, error = %reason, "MarkdownV2 send failed, falling back to HTML");
                match self
                    .chat
                    .send_message(recipient, plain, MessageFormat::Html)
                    .await
                {
                    Ok(()) => DeliveryOutcome::Delivered { fallback: true },
                    Err(html_err) => {
                        tracing::error!(
                            %recipient,
                            markdown_error = %reason,
                            html_error = %html_err,
                            "HTML fallback failed, dropping message for recipient"
                        );
                        DeliveryOutcome::FailedBoth
                    }
                }
            }
        }
    }

    /// Deliver one rendered row to every recipient, in order.
    pub async fn broadcast(&self, recipients: &[ChatId], row: &RenderedRow) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for &recipient in recipients {
            report.record(self.deliver(recipient, &row.rich, &row.plain).await);
        }
        report
    }

    /// Send an unformatted notice to every recipient (best-effort).
    pub async fn broadcast_text(&self, recipients: &[ChatId], text: &str) -> usize {
        let mut sent = 0usize;
        for &recipient in recipients {
            match self
                .chat
                .send_message(recipient, text, MessageFormat::Text)
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(%recipient, error = %e, "Cannot send notice to recipient");
                }
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChat;

    fn rendered() -> RenderedRow {
        RenderedRow {
            rich: "*New Entry:*\n*Name:* Alice".to_string(),
            plain: "<b>New Entry:</b>\n<b>Name</b>: Alice".to_string(),
        }
    }

    #[tokio::test]
    async fn rich_success_needs_no_fallback() {
        let chat = Arc::new(FakeChat::default());
        let d = Dispatcher::new(chat.clone());
        let row = rendered();

        let outcome = d.deliver(ChatId(1), &row.rich, &row.plain).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { fallback: false });
        let attempts = chat.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].format, MessageFormat::MarkdownV2);
    }

    #[tokio::test]
    async fn blocked_recipient_is_skipped_without_plain_attempt() {
        let chat = Arc::new(FakeChat::default());
        chat.fail_on(1, MessageFormat::MarkdownV2, SendError::Blocked);
        let d = Dispatcher::new(chat.clone());
        let row = rendered();

        let outcome = d.deliver(ChatId(1), &row.rich, &row.plain).await;

        assert_eq!(outcome, DeliveryOutcome::SkippedBlocked);
        assert_eq!(chat.attempts().len(), 1);
    }

    #[tokio::test]
    async fn no_conversation_is_skipped_without_plain_attempt() {
        let chat = Arc::new(FakeChat::default());
        chat.fail_on(1, MessageFormat::MarkdownV2, SendError::NoConversation);
        let d = Dispatcher::new(chat.clone());
        let row = rendered();

        let outcome = d.deliver(ChatId(1), &row.rich, &row.plain).await;

        assert_eq!(outcome, DeliveryOutcome::SkippedNoConversation);
        assert_eq!(chat.attempts().len(), 1);
    }

    #[tokio::test]
    async fn rejected_markdown_falls_back_to_html() {
        let chat = Arc::new(FakeChat::default());
        chat.fail_on(
            1,
            MessageFormat::MarkdownV2,
            SendError::Rejected("can't parse entities".to_string()),
        );
        let d = Dispatcher::new(chat.clone());
        let row = rendered();

        let outcome = d.deliver(ChatId(1), &row.rich, &row.plain).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { fallback: true });
        let attempts = chat.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1].format, MessageFormat::Html);
        assert_eq!(attempts[1].text, row.plain);
    }

    #[tokio::test]
    async fn both_renderings_failing_is_reported_not_raised() {
        let chat = Arc::new(FakeChat::default());
        chat.fail_on(1, MessageFormat::MarkdownV2, SendError::Rejected("bad".into()));
        chat.fail_on(1, MessageFormat::Html, SendError::Rejected("worse".into()));
        let d = Dispatcher::new(chat.clone());
        let row = rendered();

        let outcome = d.deliver(ChatId(1), &row.rich, &row.plain).await;

        assert_eq!(outcome, DeliveryOutcome::FailedBoth);
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_stop_the_others() {
        let chat = Arc::new(FakeChat::default());
        chat.fail_on(2, MessageFormat::MarkdownV2, SendError::Blocked);
        chat.fail_on(3, MessageFormat::MarkdownV2, SendError::Rejected("x".into()));
        chat.fail_on(3, MessageFormat::Html, SendError::Rejected("y".into()));
        let d = Dispatcher::new(chat.clone());

        let report = d
            .broadcast(&[ChatId(1), ChatId(2), ChatId(3), ChatId(4)], &rendered())
            .await;

        assert_eq!(
            report,
            DeliveryReport {
                delivered: 2,
                via_fallback: 0,
                skipped: 1,
                failed: 1,
            }
        );
        assert_eq!(chat.sent_to(1).len(), 1);
        assert_eq!(chat.sent_to(4).len(), 1);
    }

    #[tokio::test]
    async fn notice_goes_out_as_plain_text() {
        let chat = Arc::new(FakeChat::default());
        chat.fail_on(2, MessageFormat::Text, SendError::NoConversation);
        let d = Dispatcher::new(chat.clone());

        let sent = d
            .broadcast_text(&[ChatId(1), ChatId(2)], "Force scan error: boom")
            .await;

        assert_eq!(sent, 1);
        assert_eq!(chat.sent_to(1)[0].format, MessageFormat::Text);
    }
}

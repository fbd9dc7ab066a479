use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::time::{sleep_until, Instant};

use crate::{
    domain::ChatId,
    messaging::{
        port::ChatPort,
        types::{MessageFormat, SendError},
    },
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Gap between any two outbound sends (bot-wide flood limit, ~25/sec).
    pub global_min_interval: Duration,
    /// Gap between two sends to the same recipient (~1/sec per chat).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40),
            per_chat_min_interval: Duration::from_millis(1050),
        }
    }
}

/// Next free send slot: bot-wide and per recipient.
#[derive(Debug, Default)]
struct Schedule {
    global_next: Option<Instant>,
    chat_next: HashMap<ChatId, Instant>,
}

impl Schedule {
    /// Book the earliest instant satisfying both gaps and return it.
    fn book(&mut self, recipient: ChatId, now: Instant, cfg: &ThrottleConfig) -> Instant {
        let mut at = now;
        if let Some(next) = self.global_next {
            at = at.max(next);
        }
        if let Some(next) = self.chat_next.get(&recipient) {
            at = at.max(*next);
        }

        self.global_next = Some(at + cfg.global_min_interval);
        self.chat_next.insert(recipient, at + cfg.per_chat_min_interval);
        at
    }
}

/// ChatPort decorator that spaces out outbound sends.
///
/// A burst of new rows fans out rows × recipients messages; this keeps that
/// burst under Telegram's flood limits instead of collecting 429s.
pub struct ThrottledMessenger {
    inner: Arc<dyn ChatPort>,
    cfg: ThrottleConfig,
    schedule: std::sync::Mutex<Schedule>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn ChatPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            schedule: std::sync::Mutex::new(Schedule::default()),
        }
    }

    fn reserve(&self, recipient: ChatId) -> Instant {
        let mut schedule = self
            .schedule
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        schedule.book(recipient, Instant::now(), &self.cfg)
    }
}

#[async_trait::async_trait]
impl ChatPort for ThrottledMessenger {
    async fn send_message(
        &self,
        recipient: ChatId,
        text: &str,
        format: MessageFormat,
    ) -> std::result::Result<(), SendError> {
        let slot = self.reserve(recipient);
        if slot > Instant::now() {
            tracing::trace!(recipient = %recipient, "Waiting for send slot");
            sleep_until(slot).await;
        }
        self.inner.send_message(recipient, text, format).await
    }
}

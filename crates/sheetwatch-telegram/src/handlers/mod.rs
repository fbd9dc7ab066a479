//! Telegram update handlers.
//!
//! Every update is checked against the allow-list before it can touch the
//! controller.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message},
};

use sheetwatch_core::{
    domain::UserId,
    monitor::ScanOutcome,
    security::is_authorized,
};

use crate::router::AppState;

mod callback;
mod commands;

pub(crate) const START_BOT: &str = "start_bot";
pub(crate) const STOP_BOT: &str = "stop_bot";
pub(crate) const FORCE_SCAN: &str = "force_scan";

pub(crate) fn control_panel() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("Start Bot", START_BOT),
            InlineKeyboardButton::callback("Stop Bot", STOP_BOT),
        ],
        vec![InlineKeyboardButton::callback("Force Scan", FORCE_SCAN)],
    ])
}

pub(crate) fn describe_scan(outcome: &ScanOutcome) -> String {
    match outcome {
        ScanOutcome::Sent { rows, report } => format!(
            "🔎 Force scan sent {rows} row(s): {} delivered, {} skipped, {} failed.",
            report.delivered, report.skipped, report.failed
        ),
        ScanOutcome::Failed { error } => format!("❌ Force scan failed: {error}"),
    }
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));

    if !is_authorized(user_id, &state.cfg.telegram_allowed_users) {
        tracing::warn!(chat_id = msg.chat.id.0, "Unauthorized message");
        let _ = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        return Ok(());
    }

    match msg.text() {
        Some(text) if text.starts_with('/') => commands::handle_command(bot, msg, state).await,
        _ => Ok(()),
    }
}

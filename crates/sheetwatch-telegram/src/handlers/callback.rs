use std::sync::Arc;

use teloxide::prelude::*;

use sheetwatch_core::{controller::StartOutcome, domain::UserId, security::is_authorized};

use super::{control_panel, describe_scan, FORCE_SCAN, START_BOT, STOP_BOT};
use crate::router::AppState;

fn start_reply(outcome: StartOutcome) -> &'static str {
    match outcome {
        StartOutcome::Started => "✅ Bot Started.",
        StartOutcome::AlreadyRunning => "ℹ️ Bot is already running.",
    }
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let data = q.data.clone().unwrap_or_default();

    if !is_authorized(
        Some(UserId(q.from.id.0 as i64)),
        &state.cfg.telegram_allowed_users,
    ) {
        tracing::warn!(user_id = q.from.id.0, "Unauthorized callback");
        let _ = bot
            .answer_callback_query(cb_id)
            .text("Unauthorized".to_string())
            .await;
        return Ok(());
    }

    // Answer first: a force scan can outlive the callback deadline.
    let _ = bot.answer_callback_query(cb_id).await;

    let reply = match data.as_str() {
        START_BOT => start_reply(state.controller.start().await).to_string(),
        STOP_BOT => {
            state.controller.stop();
            "🛑 Bot Stopped.".to_string()
        }
        FORCE_SCAN => {
            let outcome = state.controller.force_scan().await;
            tracing::info!(summary = %describe_scan(&outcome), "Force scan finished");
            return Ok(());
        }
        other => {
            tracing::debug!(data = %other, "Ignoring unknown callback");
            return Ok(());
        }
    };

    if let Some(msg) = &q.message {
        if let Err(e) = bot
            .edit_message_text(msg.chat().id, msg.id(), reply)
            .reply_markup(control_panel())
            .await
        {
            // Editing to identical text fails; the panel is still usable.
            tracing::debug!(error = %e, "Panel edit failed");
        }
    }

    Ok(())
}

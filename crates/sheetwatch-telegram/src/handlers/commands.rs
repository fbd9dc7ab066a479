use std::sync::Arc;

use teloxide::{prelude::*, types::ParseMode};

use sheetwatch_core::{controller::ControllerStatus, formatting::escape_html};

use super::{control_panel, describe_scan};
use crate::router::AppState;

fn parse_command(text: &str) -> String {
    // Telegram may send `/cmd@botname arg1 ...`
    let first = text.split_whitespace().next().unwrap_or("");
    first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

fn format_status(status: &ControllerStatus, worksheet: &str) -> String {
    let state = if status.running {
        "🟢 Running"
    } else {
        "⚪ Stopped"
    };
    let last_poll = status
        .last_poll
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());

    format!(
        "📊 <b>Status</b>\n\n\
Monitor: {state}\n\
Worksheet: <code>{}</code>\n\
Rows seen: {}\n\
Last poll: {last_poll}\n\
Poll interval: {}\n\
Recipients: {}\n\
Sheets API calls: {}",
        escape_html(worksheet),
        status.cursor,
        format_duration(status.poll_interval.as_secs()),
        status.recipients,
        status.api_calls,
    )
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let cmd = parse_command(text);
    tracing::debug!(command = %cmd, chat_id = msg.chat.id.0, "Command received");

    match cmd.as_str() {
        "start" | "menu" => {
            bot.send_message(msg.chat.id, "Choose an action:")
                .reply_markup(control_panel())
                .await?;
        }
        "status" => {
            let status = state.controller.status();
            bot.send_message(msg.chat.id, format_status(&status, &state.cfg.worksheet_name))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        "scan" => {
            let outcome = state.controller.force_scan().await;
            bot.send_message(msg.chat.id, describe_scan(&outcome)).await?;
        }
        "help" => {
            bot.send_message(
                msg.chat.id,
                "/start - Show the control panel\n\
/status - Show monitor status\n\
/scan - Re-send the most recent rows\n\
/help - Show this message",
            )
            .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Unknown command. Try /help.")
                .await?;
        }
    }

    Ok(())
}

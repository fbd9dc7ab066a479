use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use sheetwatch_core::{config::Config, controller::Controller};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub controller: Arc<Controller>,
}

/// Serve the control panel until the process is interrupted.
pub async fn run_polling(
    cfg: Arc<Config>,
    bot: Bot,
    controller: Arc<Controller>,
) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "Control panel online"),
        Err(e) => tracing::warn!(error = %e, "getMe failed; continuing with polling"),
    }
    tracing::info!(
        recipients = cfg.recipients.len(),
        allowed_users = cfg.telegram_allowed_users.len(),
        worksheet = %cfg.worksheet_name,
        "Watching spreadsheet"
    );

    let state = Arc::new(AppState { cfg, controller });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

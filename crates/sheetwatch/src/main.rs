use std::sync::Arc;

use sheetwatch_core::{
    backoff::{Backoff, BackoffConfig},
    config::Config,
    controller::Controller,
    dispatch::Dispatcher,
    domain::ChatId,
    messaging::throttled::{ThrottleConfig, ThrottledMessenger},
    monitor::{Monitor, MonitorSettings},
};
use sheetwatch_sheets::SheetsClient;
use sheetwatch_telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> Result<(), sheetwatch_core::Error> {
    sheetwatch_core::logging::init("sheetwatch")?;

    let cfg = Arc::new(Config::load()?);

    let source = Arc::new(SheetsClient::from_config(&cfg)?);
    let telegram = TelegramMessenger::from_token(cfg.telegram_bot_token.clone());
    let bot = telegram.bot();
    let chat = Arc::new(ThrottledMessenger::new(
        Arc::new(telegram),
        ThrottleConfig::default(),
    ));

    let backoff = Arc::new(Backoff::new(BackoffConfig {
        max_retries: cfg.max_retries,
        initial_delay: cfg.initial_backoff,
    }));
    let monitor = Arc::new(Monitor::new(
        source,
        backoff,
        Dispatcher::new(chat),
        cfg.recipients.iter().copied().map(ChatId).collect(),
        MonitorSettings {
            poll_interval: cfg.poll_interval,
            force_scan_rows: cfg.force_scan_rows,
        },
    ));

    if let Err(e) = monitor.headers().await {
        tracing::warn!(error = %e, "Could not load header row; will retry on first poll");
    }
    if cfg.skip_existing_rows {
        if let Err(e) = monitor.skip_existing_rows().await {
            tracing::warn!(error = %e, "Could not skip existing rows; starting from zero");
        }
    }

    let controller = Arc::new(Controller::new(monitor));
    if cfg.auto_start {
        controller.start().await;
    }

    let result = sheetwatch_telegram::router::run_polling(cfg, bot, controller.clone())
        .await
        .map_err(|e| sheetwatch_core::Error::External(format!("telegram bot failed: {e}")));

    controller.stop();
    controller.wait_stopped().await;
    tracing::info!("Shut down");

    result
}

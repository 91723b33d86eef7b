use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use ytn_core::{
    config::Config,
    dispatcher::Dispatcher,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    monitor::ChannelMonitor,
    ports::ContentSource,
    scheduler::SchedulerLoop,
    store::{ConfigStore, JsonConfigStore},
};
use ytn_telegram::{
    build_bot,
    router::{run_polling, AppState},
    TelegramMessenger,
};
use ytn_youtube::YouTubeClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ytn_core::logging::init("ytn")?;

    let cfg = Arc::new(Config::load()?);
    let store: Arc<dyn ConfigStore> = Arc::new(
        JsonConfigStore::open(&cfg.data_dir)
            .with_context(|| format!("opening data dir {}", cfg.data_dir.display()))?,
    );
    log_configuration(store.as_ref());

    let content: Arc<dyn ContentSource> = Arc::new(YouTubeClient::new(
        cfg.youtube_api_key.clone(),
        cfg.youtube_api_base.clone(),
        cfg.http_timeout,
    )?);

    let bot = build_bot(&cfg)?;
    // Notifications and command replies share one throttle.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        content.clone(),
        messenger.clone(),
        store.clone(),
        cfg.pacing,
    ));
    let monitor = Arc::new(ChannelMonitor::new(content.clone(), dispatcher, cfg.pacing));
    let scheduler = Arc::new(SchedulerLoop::new(store.clone(), monitor, cfg.pacing));

    let cancel = CancellationToken::new();

    let scheduler_task = {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        store,
        content,
        messenger,
    });
    let mut polling_task = tokio::spawn(run_polling(state, bot, cancel.clone()));

    let polling_result = tokio::select! {
        _ = shutdown_signal() => None,
        res = &mut polling_task => Some(res),
    };

    cancel.cancel();

    let polling_result = match polling_result {
        Some(res) => res,
        None => polling_task.await,
    };
    if let Err(e) = scheduler_task.await {
        error!("scheduler task panicked: {e}");
    }
    info!(state = ?scheduler.state(), "shutdown complete");

    polling_result
        .context("telegram polling task panicked")?
        .context("telegram bot failed")
}

fn log_configuration(store: &dyn ConfigStore) {
    match store.list_channels() {
        Ok(channels) => {
            info!(count = channels.len(), "monitored channels");
            for c in channels {
                info!(channel_id = %c.id, name = %c.name, "channel");
            }
        }
        Err(e) => error!("failed to read channels: {e}"),
    }
    match store.list_chats() {
        Ok(chats) => {
            info!(count = chats.len(), "destination chats");
            for c in chats {
                info!(chat_id = c.id, title = %c.title, kind = %c.kind, "chat");
            }
        }
        Err(e) => error!("failed to read chats: {e}"),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(t), Ok(i)) => (t, i),
            (Err(e), _) | (_, Err(e)) => {
                error!("failed to install signal handlers: {e}");
                std::future::pending::<()>().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("received SIGINT (Ctrl+C), shutting down gracefully"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down gracefully");
    }
}

use std::{sync::Arc, time::Duration};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;
use tracing::info;

use ytn_core::{
    config::Config, messaging::port::MessagingPort, ports::ContentSource, store::ConfigStore,
};

use crate::handlers;

/// Shared dependencies injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: Arc<dyn ConfigStore>,
    pub content: Arc<dyn ContentSource>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Long-poll for updates until `cancel` fires.
pub async fn run_polling(
    state: Arc<AppState>,
    bot: Bot,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let me = bot.get_me().await?;
    info!(username = %me.username(), "telegram bot started");
    info!(admins = state.cfg.admin_users.len(), "admin users configured");

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .build();

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        cancel.cancelled().await;
        // The dispatcher refuses to shut down before it is running.
        loop {
            match shutdown.shutdown() {
                Ok(done) => {
                    done.await;
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    });

    dispatcher.dispatch().await;
    info!("telegram polling stopped");
    Ok(())
}

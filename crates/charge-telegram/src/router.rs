use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use charge_core::{config::Config, service::ChargeService};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub service: Arc<ChargeService>,
    pub messenger: TelegramMessenger,
    /// Our own username, used to ignore `/cmd@other_bot` in groups.
    pub bot_username: Option<String>,
}

pub async fn run_polling(cfg: Arc<Config>, service: Arc<ChargeService>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            tracing::info!(username = %me.username(), "bot started");
            Some(me.username().to_string())
        }
        Err(e) => {
            tracing::warn!(error = %e, "get_me failed; only bare commands will be answered");
            None
        }
    };

    let state = Arc::new(AppState {
        cfg,
        service,
        messenger: TelegramMessenger::new(bot.clone()),
        bot_username,
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    tracing::info!("dispatcher stopped");
    Ok(())
}

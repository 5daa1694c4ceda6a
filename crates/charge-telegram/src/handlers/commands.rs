use std::sync::Arc;

use teloxide::prelude::*;

use charge_core::{
    command::{self, Command},
    formatting::{escape_html, preformatted_chunks, split_text_chunks},
};

use crate::router::AppState;

pub async fn handle_command(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    let user_id = msg.from().map(|u| u.id.0);

    if !command::is_addressed_to(text, state.bot_username.as_deref()) {
        return Ok(());
    }

    let Some(parsed) = command::parse(text) else {
        let (cmd, _) = command::split_command(text);
        tracing::debug!(chat_id = chat_id.0, command = %cmd, "unknown command");
        let reply = format!("未知命令：/{cmd}\n发送 /帮助 查看用法");
        send_plain(&state, chat_id, &reply).await;
        return Ok(());
    };

    tracing::info!(chat_id = chat_id.0, user_id = ?user_id, command = ?parsed, "command received");

    // Reports are column-aligned, so they go out as <pre>; everything else is plain text.
    let aligned = matches!(parsed, Command::Query { .. });
    let reply = state.service.handle(parsed).await;

    if aligned {
        send_preformatted(&state, chat_id, &reply).await;
    } else {
        send_plain(&state, chat_id, &reply).await;
    }
    Ok(())
}

async fn send_plain(state: &AppState, chat_id: ChatId, text: &str) {
    let limit = state.cfg.telegram_safe_limit.max(200);
    for chunk in split_text_chunks(&escape_html(text), limit) {
        if let Err(e) = state.messenger.send_html(chat_id, &chunk).await {
            tracing::warn!(chat_id = chat_id.0, error = %e, "reply failed");
            return;
        }
    }
}

async fn send_preformatted(state: &AppState, chat_id: ChatId, text: &str) {
    let limit = state.cfg.telegram_safe_limit.max(200);
    for chunk in preformatted_chunks(text, limit) {
        if let Err(e) = state.messenger.send_html(chat_id, &chunk).await {
            tracing::warn!(chat_id = chat_id.0, error = %e, "reply failed");
            return;
        }
    }
}

//! Telegram adapter (teloxide).
//!
//! Feeds command text into `charge-core` and sends the reply back as Telegram HTML.

use teloxide::{prelude::*, types::ParseMode};
use tokio::time::sleep;

pub mod handlers;
pub mod router;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    pub async fn send_html(&self, chat_id: ChatId, html: &str) -> anyhow::Result<()> {
        self.with_retry(|| {
            self.bot
                .send_message(chat_id, html.to_string())
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> anyhow::Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!(retry_after = ?d, "telegram flood control, retrying");
                    sleep(d).await;
                }
                Err(e) => return Err(anyhow::anyhow!("telegram error: {e}")),
            }
        }
    }
}

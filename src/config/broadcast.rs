use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Reads the optional Telegram notifier configuration from the environment.
///
/// Both `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID` must be set for the
/// reporter to start; a partial configuration is an error so a typo does not
/// silently disable notifications.
pub fn load_telegram_config() -> Result<Option<TelegramConfig>> {
    let token = env::var("TELEGRAM_BOT_TOKEN").ok();
    let chat_id = env::var("TELEGRAM_CHAT_ID").ok();

    match (token, chat_id) {
        (Some(bot_token), Some(chat_id)) => {
            chat_id
                .parse::<i64>()
                .context("TELEGRAM_CHAT_ID must be a numeric chat id")?;
            Ok(Some(TelegramConfig { bot_token, chat_id }))
        }
        (None, None) => Ok(None),
        _ => anyhow::bail!(
            "TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must be set together or not at all"
        ),
    }
}

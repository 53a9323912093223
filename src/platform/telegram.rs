use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};
use tracing::debug;

use crate::error::SendError;
use crate::platform::MessageSender;

/// Sends messages through the Telegram Bot API.
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(token: &str, timeout: Duration, api_url: Option<&str>) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        let mut bot = Bot::with_client(token, client);
        if let Some(url) = api_url {
            let url = reqwest::Url::parse(url)
                .with_context(|| format!("Invalid Telegram API url: {}", url))?;
            bot = bot.set_api_url(url);
        }

        Ok(Self { bot })
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    fn platform(&self) -> &'static str {
        "telegram"
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        debug!("Telegram sendMessage to chat {}", chat_id);
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

/// Split Bot API failures into "this chat refuses us" and everything else.
fn classify(err: RequestError) -> SendError {
    match err {
        RequestError::Api(api) => match api {
            ApiError::BotBlocked
            | ApiError::ChatNotFound
            | ApiError::UserDeactivated
            | ApiError::BotKicked
            | ApiError::CantInitiateConversation => SendError::Unreachable(api.to_string()),
            other => SendError::Api(other.to_string()),
        },
        RequestError::Network(e) => SendError::Network(e.to_string()),
        other => SendError::Api(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_bot_is_unreachable() {
        let err = classify(RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(err, SendError::Unreachable(_)));
        assert_eq!(err.hint(), Some("has the user blocked the bot?"));
    }

    #[test]
    fn test_chat_not_found_is_unreachable() {
        let err = classify(RequestError::Api(ApiError::ChatNotFound));
        assert!(matches!(err, SendError::Unreachable(_)));
        assert!(err.hint().unwrap().contains("started the bot"));
    }

    #[test]
    fn test_other_api_errors_kept_apart() {
        let err = classify(RequestError::Api(ApiError::MessageTextIsEmpty));
        assert!(matches!(err, SendError::Api(_)));
    }

    #[test]
    fn test_new_rejects_bad_api_url() {
        assert!(TelegramSender::new("123:abc", Duration::from_secs(5), Some("not a url")).is_err());
        assert!(TelegramSender::new("123:abc", Duration::from_secs(5), None).is_ok());
    }
}

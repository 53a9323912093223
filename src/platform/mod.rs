pub mod telegram;

use async_trait::async_trait;

use crate::error::SendError;

/// Delivers a text message to one chat on a messaging platform.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Platform identifier (e.g., "telegram")
    fn platform(&self) -> &'static str;

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError>;
}

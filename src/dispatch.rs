use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::error::SendError;
use crate::logging::Stage;
use crate::platform::MessageSender;

/// Outcome of sending to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    Delivered,
    Failed(SendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub chat_id: i64,
    pub result: SendResult,
}

impl SendReport {
    pub fn is_delivered(&self) -> bool {
        matches!(self.result, SendResult::Delivered)
    }
}

/// Fans one message out to every recipient, at most `max_parallel`
/// sends in flight. A failed recipient never stops the others.
pub struct Dispatcher {
    sender: Arc<dyn MessageSender>,
    max_parallel: usize,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn MessageSender>, max_parallel: usize) -> Self {
        Self {
            sender,
            max_parallel: max_parallel.max(1),
        }
    }

    pub async fn dispatch(&self, recipients: &BTreeSet<i64>, text: &str) -> Vec<SendReport> {
        let platform = self.sender.platform();

        stream::iter(recipients.iter().copied())
            .map(|chat_id| async move {
                info!(stage = %Stage::Send, platform, chat_id, "Attempting to send message");
                let result = match self.sender.send_text(chat_id, text).await {
                    Ok(()) => {
                        info!(stage = %Stage::Send, platform, chat_id, outcome = "delivered", "Message sent");
                        SendResult::Delivered
                    }
                    Err(e) => {
                        error!(
                            stage = %Stage::Send,
                            platform,
                            chat_id,
                            outcome = "failed",
                            hint = e.hint().unwrap_or(""),
                            "Failed to send message: {}",
                            e
                        );
                        SendResult::Failed(e)
                    }
                };
                SendReport { chat_id, result }
            })
            .buffer_unordered(self.max_parallel)
            .collect()
            .await
    }
}

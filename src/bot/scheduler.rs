use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::MessageId;

use crate::bot::Bot;

/// Fire-and-forget deferred jobs. Only message cleanup for now; recurring
/// jobs plug in here.
#[derive(Debug, Clone)]
pub struct Scheduler {
    bot: Bot,
}

impl Scheduler {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Delete a message after the given delay
    pub fn delete_msg(&self, chat_id: ChatId, msg_id: MessageId, delay: Duration) {
        let bot = self.bot.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = bot.delete_message(chat_id, msg_id).await;
        });
    }
}

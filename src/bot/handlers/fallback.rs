use anyhow::Result;
use teloxide::prelude::*;
use tracing::debug;

use crate::bot::Bot;

/// The bot has no free-form conversation; anything that reached neither a
/// command nor a callback is removed to keep private chats tidy.
pub async fn unhandled_private_msg(bot: Bot, msg: Message) -> Result<()> {
    debug!("{}: deleting unhandled message", msg.chat.id);
    bot.delete_message(msg.chat.id, msg.id).await?;
    Ok(())
}

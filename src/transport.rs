use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};
use teloxide::{ApiError, RequestError};
use thiserror::Error;

use crate::bot::Bot;

pub type Result<T> = std::result::Result<T, SendError>;

/// How a single delivery attempt can fail, as seen by the broadcaster
#[derive(Debug, Error)]
pub enum SendError {
    #[error("recipient has blocked the bot")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("rate limited, retry after {0:?}")]
    RetryAfter(Duration),
    #[error("transport error: {0}")]
    Network(String),
}

impl From<RequestError> for SendError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::RetryAfter(delay) => SendError::RetryAfter(delay),
            RequestError::Api(api) => match api {
                ApiError::BotBlocked
                | ApiError::BotKicked
                | ApiError::BotKickedFromSupergroup
                | ApiError::UserDeactivated
                | ApiError::CantInitiateConversation => SendError::Forbidden,
                other => SendError::BadRequest(other.to_string()),
            },
            other => SendError::Network(other.to_string()),
        }
    }
}

/// Per-message delivery knobs, forwarded verbatim to the Bot API call
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Whether the recipient gets an audible notification
    pub notify: bool,
    pub reply_markup: Option<InlineKeyboardMarkup>,
    pub reply_to: Option<MessageId>,
}

impl SendOptions {
    pub fn silent() -> Self {
        Self { notify: false, ..Default::default() }
    }

    pub fn notify() -> Self {
        Self { notify: true, ..Default::default() }
    }
}

/// The slice of the Bot API the broadcaster needs
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, chat: ChatId, text: &str, opts: &SendOptions) -> Result<MessageId>;

    async fn send_typing(&self, chat: ChatId) -> Result<()>;
}

#[async_trait]
impl Transport for Bot {
    async fn send_text(&self, chat: ChatId, text: &str, opts: &SendOptions) -> Result<MessageId> {
        let mut req = self.send_message(chat, text).disable_notification(!opts.notify);
        if let Some(markup) = &opts.reply_markup {
            req = req.reply_markup(markup.clone());
        }
        if let Some(reply_to) = opts.reply_to {
            req = req.reply_to_message_id(reply_to);
        }
        let message = req.await?;
        Ok(message.id)
    }

    async fn send_typing(&self, chat: ChatId) -> Result<()> {
        use teloxide::types::ChatAction;
        self.send_chat_action(chat, ChatAction::Typing).await?;
        Ok(())
    }
}

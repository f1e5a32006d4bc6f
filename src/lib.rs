pub mod bot;
pub mod broadcaster;
pub mod config;
pub mod render;
pub mod transport;

/// Reply to a message in the same chat, quoting it
#[macro_export]
macro_rules! reply_to {
    ($bot:expr, $msg:expr, $text:expr) => {
        $bot.send_message($msg.chat.id, $text).reply_to_message_id($msg.id)
    };
}

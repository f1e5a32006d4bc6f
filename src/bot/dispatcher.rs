use std::time::Duration;

use teloxide::prelude::*;

use super::filter::{filter_callbackdata, filter_private_chat};
use super::handlers::*;
use super::utils::RateLimiter;
use super::{Bot, Scheduler};
use crate::broadcaster::Broadcaster;
use crate::config::Config;
use crate::render::Renderer;

pub async fn start_dispatcher(config: Config, bot: Bot, broadcaster: Broadcaster, tmpl: Renderer) {
    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(admin_command_handler())
                .branch(public_command_handler())
                .branch(filter_private_chat().endpoint(unhandled_private_msg)),
        )
        .branch(
            Update::filter_callback_query()
                .chain(filter_callbackdata())
                .chain(callback_query_handler()),
        );

    // At most 10 commands per user per minute
    let rate_limiter = RateLimiter::new(Duration::from_secs(60), 10);

    let scheduler = Scheduler::new(bot.clone());

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![config, broadcaster, tmpl, rate_limiter, scheduler])
        // NOTE: an empty distribution function serializes update handling;
        // the default would only serialize within a chat
        .distribution_function(|_| None::<()>)
        .build()
        .dispatch()
        .await;
}

use anyhow::Result;
use minijinja::context;
use teloxide::dispatching::DpHandlerDescription;
use teloxide::dptree::case;
use teloxide::prelude::*;
use tracing::info;

use super::utils::{settings_keyboard, user_locale};
use crate::bot::command::PublicCommand;
use crate::bot::filter::filter_private_chat;
use crate::bot::utils::RateLimiter;
use crate::bot::{Bot, Scheduler};
use crate::broadcaster::{Broadcaster, Content};
use crate::config::Config;
use crate::render::Renderer;
use crate::reply_to;
use crate::transport::SendOptions;

pub fn public_command_handler() -> Handler<'static, DependencyMap, Result<()>, DpHandlerDescription>
{
    teloxide::filter_command::<PublicCommand, _>()
        .chain(filter_private_chat())
        // Over-quota users are dropped silently
        .chain(dptree::filter(|message: Message, limiter: RateLimiter| {
            message.from().map(|user| limiter.insert(user.id).is_none()).unwrap_or_default()
        }))
        .branch(case![PublicCommand::Start].endpoint(cmd_start))
        .branch(case![PublicCommand::Help].endpoint(cmd_help))
        .branch(case![PublicCommand::Settings].endpoint(cmd_settings))
}

async fn cmd_start(
    bot: Bot,
    msg: Message,
    cfg: Config,
    tmpl: Renderer,
    broadcaster: Broadcaster,
) -> Result<()> {
    let user = msg.from();
    info!("{}: /start", msg.chat.id);

    // The greeting goes through the broadcast queue so a burst of new users
    // stays under the send-rate ceiling
    broadcaster.send_content(msg.chat.id, Content::Typing, SendOptions::silent()).await;

    let locale = user_locale(&msg, &cfg);
    let is_admin = user.map(|u| cfg.telegram.admin_ids.contains(&ChatId(u.id.0 as i64)));
    let text = if is_admin.unwrap_or_default() {
        tmpl.render("common/start_admin.j2", &locale, context! {})?
    } else {
        let name = user.map(|u| u.first_name.clone()).unwrap_or_default();
        tmpl.render("common/start.j2", &locale, context! { name => name })?
    };
    reply_to!(bot, msg, text).await?;
    Ok(())
}

async fn cmd_help(bot: Bot, msg: Message, cfg: Config, tmpl: Renderer) -> Result<()> {
    info!("{}: /help", msg.chat.id);
    let text = tmpl.render("common/help.j2", &user_locale(&msg, &cfg), context! {})?;
    reply_to!(bot, msg, text).await?;
    Ok(())
}

async fn cmd_settings(
    bot: Bot,
    msg: Message,
    cfg: Config,
    tmpl: Renderer,
    scheduler: Scheduler,
) -> Result<()> {
    info!("{}: /settings", msg.chat.id);
    let text = tmpl.render("common/settings.j2", &user_locale(&msg, &cfg), context! {})?;
    let menu = bot
        .send_message(msg.chat.id, text)
        .reply_markup(settings_keyboard(&tmpl.locales()))
        .await?;
    // Stale menus clean themselves up
    scheduler.delete_msg(menu.chat.id, menu.id, cfg.menu_ttl);
    Ok(())
}

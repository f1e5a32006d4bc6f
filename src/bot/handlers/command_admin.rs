use anyhow::Result;
use minijinja::context;
use teloxide::dispatching::DpHandlerDescription;
use teloxide::dptree::case;
use teloxide::prelude::*;
use tracing::info;

use super::utils::user_locale;
use crate::bot::command::AdminCommand;
use crate::bot::filter::filter_admin_msg;
use crate::bot::Bot;
use crate::broadcaster::{Broadcaster, Content};
use crate::config::Config;
use crate::render::Renderer;
use crate::reply_to;
use crate::transport::SendOptions;

pub fn admin_command_handler() -> Handler<'static, DependencyMap, Result<()>, DpHandlerDescription>
{
    teloxide::filter_command::<AdminCommand, _>()
        .chain(filter_admin_msg())
        .branch(case![AdminCommand::Admin].endpoint(cmd_admin))
        .branch(case![AdminCommand::Broadcast(text)].endpoint(cmd_broadcast))
}

async fn cmd_admin(bot: Bot, msg: Message, cfg: Config, tmpl: Renderer) -> Result<()> {
    info!("{}: /admin", msg.chat.id);
    let text = tmpl.render("admin/panel.j2", &user_locale(&msg, &cfg), context! {})?;
    reply_to!(bot, msg, text).await?;
    Ok(())
}

async fn cmd_broadcast(
    bot: Bot,
    msg: Message,
    cfg: Config,
    tmpl: Renderer,
    broadcaster: Broadcaster,
    text: String,
) -> Result<()> {
    let locale = user_locale(&msg, &cfg);
    if text.trim().is_empty() {
        let usage = tmpl.render("admin/broadcast_usage.j2", &locale, context! {})?;
        reply_to!(bot, msg, usage).await?;
        return Ok(());
    }

    info!("{}: /broadcast to {} admins", msg.chat.id, cfg.telegram.admin_ids.len());
    broadcaster
        .broadcast(&cfg.telegram.admin_ids, Content::text(text), SendOptions::notify())
        .await;

    let done = tmpl.render(
        "admin/broadcast_done.j2",
        &locale,
        context! { count => cfg.telegram.admin_ids.len() },
    )?;
    reply_to!(bot, msg, done).await?;
    Ok(())
}

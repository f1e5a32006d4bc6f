use anyhow::Result;
use minijinja::context;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, BotCommandScope, Recipient};
use teloxide::utils::command::BotCommands;
use tracing::info;

use crate::bot::Bot;
use crate::config::Config;
use crate::render::Renderer;

// NOTE: Clone is required by dptree's Injectable bound
#[derive(BotCommands, Clone, PartialEq, Debug)]
#[command(rename_rule = "lowercase")]
pub enum PublicCommand {
    #[command(description = "restart the conversation")]
    Start,
    #[command(description = "how to use this bot")]
    Help,
    #[command(description = "change bot settings")]
    Settings,
}

#[derive(BotCommands, Clone, PartialEq, Debug)]
#[command(rename_rule = "lowercase")]
pub enum AdminCommand {
    #[command(description = "show the admin panel")]
    Admin,
    #[command(description = "send a message to every admin")]
    Broadcast(String),
}

/// Install the command menu: per-locale public commands for private chats,
/// plus per-admin chat scopes that append the admin commands.
pub async fn set_bot_commands(bot: &Bot, config: &Config, tmpl: &Renderer) -> Result<()> {
    // Drop whatever a previous run left behind
    bot.set_my_commands(vec![]).scope(BotCommandScope::AllGroupChats).await?;
    bot.set_my_commands(vec![]).scope(BotCommandScope::AllPrivateChats).await?;

    let locales = tmpl.locales();
    for locale in &locales {
        let commands = public_commands(tmpl, locale)?;
        bot.set_my_commands(commands.clone())
            .scope(BotCommandScope::AllPrivateChats)
            .language_code(locale.as_str())
            .await?;
        for &admin_id in &config.telegram.admin_ids {
            let mut admin_commands = commands.clone();
            admin_commands.extend(admin_commands_for(tmpl, locale)?);
            bot.set_my_commands(admin_commands)
                .scope(BotCommandScope::Chat { chat_id: Recipient::Id(admin_id) })
                .language_code(locale.as_str())
                .await?;
        }
    }
    info!("command menu installed for {} locales", locales.len());
    Ok(())
}

fn public_commands(tmpl: &Renderer, locale: &str) -> Result<Vec<BotCommand>> {
    Ok(vec![
        BotCommand::new("start", tmpl.render("commands/start.j2", locale, context! {})?),
        BotCommand::new("help", tmpl.render("commands/help.j2", locale, context! {})?),
        BotCommand::new("settings", tmpl.render("commands/settings.j2", locale, context! {})?),
    ])
}

fn admin_commands_for(tmpl: &Renderer, locale: &str) -> Result<Vec<BotCommand>> {
    Ok(vec![
        BotCommand::new("admin", tmpl.render("commands/admin.j2", locale, context! {})?),
        BotCommand::new("broadcast", tmpl.render("commands/broadcast.j2", locale, context! {})?),
    ])
}

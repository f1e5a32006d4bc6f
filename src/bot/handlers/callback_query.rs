use anyhow::{Context, Result};
use minijinja::context;
use teloxide::dispatching::DpHandlerDescription;
use teloxide::dptree::case;
use teloxide::prelude::*;
use tracing::info;

use super::utils::settings_keyboard;
use crate::bot::utils::CallbackData;
use crate::bot::Bot;
use crate::render::Renderer;

pub fn callback_query_handler() -> Handler<'static, DependencyMap, Result<()>, DpHandlerDescription>
{
    dptree::entry()
        .branch(case![CallbackData::SetLocale(locale)].endpoint(callback_set_locale))
        .branch(case![CallbackData::CloseMenu].endpoint(callback_close_menu))
}

async fn callback_set_locale(
    bot: Bot,
    query: CallbackQuery,
    tmpl: Renderer,
    locale: String,
) -> Result<()> {
    let message = query.message.context("message is too old")?;
    info!("{}: <- locale {}", query.from.id, locale);

    bot.answer_callback_query(query.id).await?;
    let text = tmpl.render("common/settings.j2", &locale, context! {})?;
    bot.edit_message_text(message.chat.id, message.id, text)
        .reply_markup(settings_keyboard(&tmpl.locales()))
        .await?;
    Ok(())
}

async fn callback_close_menu(bot: Bot, query: CallbackQuery) -> Result<()> {
    let message = query.message.context("message is too old")?;
    info!("{}: <- close menu", query.from.id);

    bot.answer_callback_query(query.id).await?;
    bot.delete_message(message.chat.id, message.id).await?;
    Ok(())
}

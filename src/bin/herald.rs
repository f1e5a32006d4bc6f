use anyhow::Result;
use herald::bot::command::set_bot_commands;
use herald::bot::start_dispatcher;
use herald::broadcaster::{Broadcaster, Content};
use herald::config::Config;
use herald::render::Renderer;
use herald::transport::SendOptions;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::new("./config.toml")?;

    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .try_init()
        .unwrap();

    let bot = teloxide::Bot::new(&config.telegram.token)
        .parse_mode(ParseMode::Html)
        .cache_me();
    let tmpl = Renderer::new(config.templates_dir.as_str(), &config.default_locale);
    let broadcaster =
        Broadcaster::new(bot.clone(), config.broadcast.max_messages_per_second);

    bot.delete_webhook().drop_pending_updates(true).await?;
    set_bot_commands(&bot, &config, &tmpl).await?;

    let admins = config.telegram.admin_ids.clone();
    broadcaster.broadcast(&admins, Content::text("Bot was started"), SendOptions::silent()).await;

    info!("starting dispatcher");
    tokio::select! {
        _ = start_dispatcher(config, bot, broadcaster.clone(), tmpl) => {}
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }

    broadcaster.broadcast(&admins, Content::text("Bot was stopped"), SendOptions::silent()).await;
    info!("bot stopped");

    Ok(())
}

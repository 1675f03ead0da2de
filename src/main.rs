mod archive;
mod command;
mod config;
mod context;
mod error;
mod event;
mod extract;
mod handler;
mod helper;
mod logging;
mod plugin;
mod registry;

use anyhow::anyhow;
use serenity::{all::GatewayIntents, Client};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.general.discord_token.clone();

    let db_path = cfg.database_path()?;
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let registry = crate::registry::SiteRegistry::open(&db_path)
        .await
        .map_err(|e| anyhow!("Could not open `{}`: {}", db_path.to_string_lossy(), e))?;
    log_internal!("Watch-lists stored in {}", db_path.to_string_lossy());

    let archiver = crate::archive::Archiver::from_config(&cfg)?;
    let handler = handler::Handler::new(cfg, registry, archiver);

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    Client::builder(&token, intents)
        .event_handler(handler)
        .await?
        .start()
        .await
        .map_err(Into::into)
}

use crate::{
    archive::Archiver, config::Config, context::Context, event::Event, registry::SiteRegistry,
};
use serenity::all::{Interaction, Message, Ready};

/// Discord event handler
pub struct Handler {
    cfg: Config,
    registry: SiteRegistry,
    archiver: Archiver,
}

impl<'a> Handler {
    pub fn new(cfg: Config, registry: SiteRegistry, archiver: Archiver) -> Self {
        Self {
            cfg,
            registry,
            archiver,
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            registry: &self.registry,
            archiver: &self.archiver,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg).handle(self.ctx(&discord_ctx)).await;
    }

    async fn interaction_create(
        &self,
        discord_ctx: serenity::all::Context,
        interaction: Interaction,
    ) {
        Event::Interaction(interaction)
            .handle(self.ctx(&discord_ctx))
            .await;
    }
}

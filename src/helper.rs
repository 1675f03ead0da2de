//! Miscellaneous convenience methods

use crate::context::Context;
use anyhow::Result;
use serenity::all::GuildId;

#[serenity::async_trait]
pub trait UserHelper {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String;
}

#[serenity::async_trait]
impl UserHelper for serenity::all::User {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String {
        let nick_in_guild = match guild_id {
            Some(guild_id) => self.nick_in(ctx.cache_http, guild_id).await,
            None => None,
        };

        // May not be in a guild, e.g. DM.  Fall back to global username.
        nick_in_guild.unwrap_or_else(|| self.name.clone())
    }
}

#[serenity::async_trait]
pub trait MessageHelper {
    async fn can_manage_messages(&self, ctx: &Context) -> Result<bool>;
}

#[serenity::async_trait]
impl MessageHelper for serenity::all::Message {
    /// Whether the author holds Manage Messages in the channel the message was sent to.  Always
    /// false outside of a server.
    async fn can_manage_messages(&self, ctx: &Context) -> Result<bool> {
        let Some(guild_id) = self.guild_id else {
            return Ok(false);
        };

        let member = guild_id.member(ctx.cache_http, self.author.id).await?;
        let Some(channel) = self.channel(ctx.cache_http).await?.guild() else {
            return Ok(false);
        };

        // The cache guard must be gone before the fallback awaits.
        let cached = ctx
            .cache
            .guild(guild_id)
            .map(|guild| guild.user_permissions_in(&channel, &member));
        let permissions = match cached {
            Some(permissions) => permissions,
            None => guild_id
                .to_partial_guild(ctx.cache_http)
                .await?
                .user_permissions_in(&channel, &member),
        };

        Ok(permissions.manage_messages())
    }
}

use crate::{
    command::Reply, error::RegistryError, event::*, extract::extract, log_event, logging::*,
    plugin::*, registry::SiteRegistry,
};
use anyhow::Result;
use serenity::all::{CreateAllowedMentions, CreateMessage, GuildId};
use url::Url;

/// Archives links to watched sites as they are posted
pub struct Watch;

#[serenity::async_trait]
impl Plugin for Watch {
    fn name(&self) -> &'static str {
        "watch"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };
        let Some(guild_id) = msg.guild_id else {
            return Ok(EventHandled::No);
        };

        let links = watched_links(ctx.registry, guild_id, &msg.content).await?;
        for url in &links {
            log_event!("{} posted watched link {}", msg.author.color(), url.color());

            let result = {
                let _typing = msg.channel_id.start_typing(ctx.http);
                ctx.archiver.render(url).await
            };
            let reply = Reply::Archive {
                source: url.clone(),
                result,
            };

            msg.channel_id
                .send_message(
                    ctx.cache_http,
                    CreateMessage::new()
                        .content(reply.to_string())
                        .reference_message(msg)
                        .allowed_mentions(CreateAllowedMentions::new().replied_user(false)),
                )
                .await?;
        }

        Ok(if links.is_empty() {
            EventHandled::No
        } else {
            EventHandled::Yes
        })
    }
}

/// Distinct links in `text` to sites watched in `guild_id`, in the order they were posted.
async fn watched_links(
    registry: &SiteRegistry,
    guild_id: GuildId,
    text: &str,
) -> Result<Vec<Url>, RegistryError> {
    let mut links: Vec<Url> = Vec::new();
    for url in extract(text) {
        if !links.contains(&url) && registry.matches(guild_id, &url).await? {
            links.push(url);
        }
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId::new(3);

    #[tokio::test]
    async fn test_watched_links() {
        let registry = SiteRegistry::in_memory().await.unwrap();
        registry.add(GUILD, "nytimes.com", "mod").await.unwrap();
        registry.add(GUILD, "wsj.com", "mod").await.unwrap();

        let text = "paywalled: https://www.nytimes.com/a, free: https://example.com/b, \
                    again https://www.nytimes.com/a and (https://wsj.com/c)";
        let links: Vec<String> = watched_links(&registry, GUILD, text)
            .await
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(links, ["https://www.nytimes.com/a", "https://wsj.com/c"]);
    }

    #[tokio::test]
    async fn test_watched_links_scoped_to_server() {
        let registry = SiteRegistry::in_memory().await.unwrap();
        registry.add(GUILD, "nytimes.com", "mod").await.unwrap();

        let links = watched_links(&registry, GuildId::new(4), "https://nytimes.com/a")
            .await
            .unwrap();
        assert!(links.is_empty());
    }
}

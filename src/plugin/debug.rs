use crate::{event::*, log_event, logging::*, plugin::*};
use anyhow::Result;
use serenity::all::Interaction;

/// Prints debug information about event to stdout
pub struct Debug;

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Ready(ready) => {
                log_event!(
                    "Connected to {} server(s) as {}",
                    ready.guilds.len(),
                    ctx.cache.current_user().color(),
                );
            }
            Event::Message(msg) => {
                log_event!(
                    "{}{}{}{}{}{} {}",
                    msg.guild_id.color(ctx.http).await,
                    Glue {}.color(),
                    msg.channel_id.color(ctx.http).await,
                    Glue {}.color(),
                    msg.author.color(),
                    Glue {}.color(),
                    msg.content,
                );
            }
            Event::Interaction(Interaction::Command(command)) => {
                log_event!(
                    "{}{}{}{}{}{} /{}",
                    command.guild_id.color(ctx.http).await,
                    Glue {}.color(),
                    command.channel_id.color(ctx.http).await,
                    Glue {}.color(),
                    command.user.color(),
                    Glue {}.color(),
                    command.data.name,
                );
            }
            // Autocomplete, components and modals are never registered.
            Event::Interaction(_) => {}
        }

        Ok(EventHandled::No)
    }
}

//! Serenity delivers Discord events through one callback per event kind.  That doesn't mesh well
//! with the plugin list, so the handler funnels every callback into a single Event enum.

use crate::{context::Context, log_error};
use serenity::all::{CommandInteraction, Interaction, Message, Ready};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
    Interaction(Interaction),
}

impl Event {
    // When an event occurs, offer it to each plugin in order until one claims it.
    pub async fn handle(self, ctx: Context<'_>) {
        for plugin in crate::plugin::plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => log_error!("Error in plugin {}: {:#}", plugin.name(), err),
            }
        }
    }

    /// If this is a message invoking the prefixed text command `cmd`, e.g. `!addsite foo.com`,
    /// return the message and everything after the command name.
    pub fn is_bot_cmd<'e>(
        &'e self,
        ctx: &Context<'_>,
        cmd: &str,
    ) -> Option<(&'e Message, &'e str)> {
        let Event::Message(msg) = self else {
            return None;
        };

        let rest = msg
            .content
            .trim_start()
            .strip_prefix(ctx.cfg.general.command_prefix.as_str())?;
        let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));

        name.eq_ignore_ascii_case(cmd).then_some((msg, args.trim()))
    }

    /// If this is an invocation of a slash command, return it.
    pub fn is_slash_cmd(&self) -> Option<&CommandInteraction> {
        match self {
            Event::Interaction(Interaction::Command(command)) => Some(command),
            _ => None,
        }
    }
}

pub enum EventHandled {
    Yes,
    No,
}

use crate::{command::Verb, event::*, log_internal, plugin::*};
use anyhow::Result;
use serenity::all::{Command, CommandOptionType, CreateCommand, CreateCommandOption, Permissions};

/// Registers the slash commands once the connection to Discord is ready.
pub struct Ready;

#[serenity::async_trait]
impl Plugin for Ready {
    fn name(&self) -> &'static str {
        "ready"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Ready(_) = event else {
            return Ok(EventHandled::No);
        };

        let commands = Verb::ALL.into_iter().map(slash_command).collect();
        let registered = Command::set_global_commands(ctx.http, commands).await?;
        log_internal!("Registered {} slash command(s)", registered.len());

        Ok(EventHandled::Yes)
    }
}

fn slash_command(verb: Verb) -> CreateCommand {
    let mut command = CreateCommand::new(verb.name()).description(verb.description());

    if let Some((name, description)) = verb.argument() {
        command = command.add_option(
            CreateCommandOption::new(CommandOptionType::String, name, description).required(true),
        );
    }
    // Server admins can still grant these to other roles in the integration settings.
    if verb.requires_manage_messages() {
        command = command.default_member_permissions(Permissions::MANAGE_MESSAGES);
    }
    if verb.requires_server() {
        command = command.dm_permission(false);
    }

    command
}

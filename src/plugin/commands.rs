use crate::{
    command::{execute, Invocation, Verb},
    error::CommandError,
    event::*,
    helper::*,
    log_error, log_event,
    logging::*,
    plugin::*,
};
use anyhow::Result;
use serenity::all::{CommandInteraction, EditInteractionResponse, Message};

/// The site and archive commands, as both prefixed text and slash commands
pub struct Commands;

#[serenity::async_trait]
impl Plugin for Commands {
    fn name(&self) -> &'static str {
        "commands"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.general.command_prefix;
        let lines: Vec<String> = Verb::ALL.iter().map(|verb| verb.usage(prefix)).collect();
        Some(lines.join("\n"))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Some(command) = event.is_slash_cmd() {
            return handle_slash(ctx, command).await;
        }

        for verb in Verb::ALL {
            if let Some((msg, args)) = event.is_bot_cmd(ctx, verb.name()) {
                return handle_text(ctx, verb, msg, args).await;
            }
        }

        Ok(EventHandled::No)
    }
}

async fn handle_text(
    ctx: &Context<'_>,
    verb: Verb,
    msg: &Message,
    args: &str,
) -> Result<EventHandled> {
    // Only worth the extra requests when the answer matters.
    let can_manage_messages = if verb.requires_manage_messages() {
        msg.can_manage_messages(ctx).await.unwrap_or_else(|err| {
            log_error!("Could not check permissions of {}: {:#}", msg.author.color(), err);
            false
        })
    } else {
        false
    };

    let invocation = Invocation {
        verb,
        guild_id: msg.guild_id,
        author: msg.author.nick_in_guild(ctx, msg.guild_id).await,
        can_manage_messages,
        argument: Some(args.to_owned()).filter(|args| !args.is_empty()),
    };

    let text = {
        let _typing = msg.channel_id.start_typing(ctx.http);
        respond(ctx, &invocation).await
    };

    msg.reply(ctx.cache_http, text).await?;
    Ok(EventHandled::Yes)
}

async fn handle_slash(ctx: &Context<'_>, command: &CommandInteraction) -> Result<EventHandled> {
    let Some(verb) = Verb::from_name(&command.data.name) else {
        return Ok(EventHandled::No);
    };

    // Rendering can take minutes.  Interactions must be acknowledged within three seconds.
    command.defer(ctx.cache_http).await?;

    // Discord resolves the member's permissions in the channel for us.
    let can_manage_messages = command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .is_some_and(|permissions| permissions.manage_messages());

    let invocation = Invocation {
        verb,
        guild_id: command.guild_id,
        author: command.user.nick_in_guild(ctx, command.guild_id).await,
        can_manage_messages,
        argument: command
            .data
            .options
            .first()
            .and_then(|option| option.value.as_str())
            .map(str::to_owned),
    };

    let text = respond(ctx, &invocation).await;
    command
        .edit_response(ctx.cache_http, EditInteractionResponse::new().content(text))
        .await?;

    Ok(EventHandled::Yes)
}

/// Text to show the user.  Command failures are answers too.
async fn respond(ctx: &Context<'_>, invocation: &Invocation) -> String {
    match execute(ctx.registry, ctx.archiver, invocation).await {
        Ok(reply) => {
            log_event!(
                "{} ran {}{} {}",
                invocation.author,
                invocation.verb.name(),
                Glue {}.color(),
                invocation.argument.as_deref().unwrap_or_default(),
            );
            reply.to_string()
        }
        Err(err) => {
            if let CommandError::Storage(source) = &err {
                log_error!("{} failed: {}", invocation.verb.name(), source);
            } else {
                log_event!(
                    "{} was refused {}{} {}",
                    invocation.author,
                    invocation.verb.name(),
                    Glue {}.color(),
                    err
                );
            }
            err.to_string()
        }
    }
}

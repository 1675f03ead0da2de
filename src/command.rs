//! The bot's commands, independent of whether they arrived as prefixed text or a slash command

use crate::{
    archive::{ArchiveResult, Archiver},
    error::CommandError,
    registry::{Domain, SiteRegistry},
};
use serenity::all::GuildId;
use std::borrow::Cow;
use url::Url;

/// Discord rejects messages longer than this
const MESSAGE_LIMIT: usize = 2000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    AddSite,
    RemoveSite,
    ListSites,
    Archive,
    Render,
}

impl Verb {
    pub const ALL: [Verb; 5] = [
        Verb::AddSite,
        Verb::RemoveSite,
        Verb::ListSites,
        Verb::Archive,
        Verb::Render,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Verb::AddSite => "addsite",
            Verb::RemoveSite => "removesite",
            Verb::ListSites => "listsites",
            Verb::Archive => "archive",
            Verb::Render => "render",
        }
    }

    pub fn from_name(name: &str) -> Option<Verb> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.name().eq_ignore_ascii_case(name))
    }

    pub fn description(self) -> &'static str {
        match self {
            Verb::AddSite => "Watch a domain and archive links to it automatically",
            Verb::RemoveSite => "Stop watching a domain",
            Verb::ListSites => "List the domains watched in this server",
            Verb::Archive => "Look up an existing archive.today snapshot of a URL",
            Verb::Render => "Create an archive.today snapshot of a URL",
        }
    }

    /// Name and description of the single argument, if the verb takes one
    pub fn argument(self) -> Option<(&'static str, &'static str)> {
        match self {
            Verb::AddSite => Some(("domain", "Domain to watch, e.g. nytimes.com")),
            Verb::RemoveSite => Some(("domain", "Domain to stop watching")),
            Verb::ListSites => None,
            Verb::Archive => Some(("url", "URL to look up")),
            Verb::Render => Some(("url", "URL to archive")),
        }
    }

    pub fn requires_manage_messages(self) -> bool {
        matches!(self, Verb::AddSite | Verb::RemoveSite)
    }

    /// Watch-lists belong to a server, so these make no sense in a DM.
    pub fn requires_server(self) -> bool {
        matches!(self, Verb::AddSite | Verb::RemoveSite | Verb::ListSites)
    }

    pub fn usage(self, prefix: &str) -> String {
        match self.argument() {
            Some((arg, _)) => format!(
                "{}{} <{}> - {}",
                prefix,
                self.name(),
                arg,
                self.description()
            ),
            None => format!("{}{} - {}", prefix, self.name(), self.description()),
        }
    }
}

/// A command as issued by a user, with everything `execute` needs to know about the caller
#[derive(Debug)]
pub struct Invocation {
    pub verb: Verb,
    pub guild_id: Option<GuildId>,
    pub author: String,
    pub can_manage_messages: bool,
    pub argument: Option<String>,
}

#[derive(Debug)]
pub enum Reply {
    Added(Domain),
    Removed(Domain),
    Sites(Vec<Domain>),
    Archive { source: Url, result: ArchiveResult },
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Reply::Added(domain) => write!(
                f,
                "Added `{}` to the watch list.  Links to it will be archived automatically.",
                domain
            ),
            Reply::Removed(domain) => write!(f, "Removed `{}` from the watch list.", domain),
            Reply::Sites(sites) => f.write_str(&site_list(sites)),
            Reply::Archive {
                source,
                result: ArchiveResult::Archived { url },
            } => write!(f, "Archived copy of <{}>: {}", source, url),
            Reply::Archive {
                source: _,
                result:
                    ArchiveResult::Unavailable {
                        reason,
                        manual_links,
                    },
            } => {
                write!(f, "{}.  Try it by hand (may require a CAPTCHA):", reason)?;
                for link in manual_links {
                    write!(f, "\n{}", link)?;
                }
                Ok(())
            }
        }
    }
}

fn site_list(sites: &[Domain]) -> String {
    if sites.is_empty() {
        return "No sites are currently being watched.".to_owned();
    }

    let mut text = format!("Watched sites ({}):", sites.len());
    for (i, site) in sites.iter().enumerate() {
        let line = format!("\n- `{}`", site);
        // Leave room for the overflow line.
        if text.len() + line.len() + 32 > MESSAGE_LIMIT {
            text.push_str(&format!("\n…and {} more", sites.len() - i));
            break;
        }
        text.push_str(&line);
    }
    text
}

/// Run a command.  Performs exactly one registry or archive operation.
pub async fn execute(
    registry: &SiteRegistry,
    archiver: &Archiver,
    invocation: &Invocation,
) -> Result<Reply, CommandError> {
    let verb = invocation.verb;

    if verb.requires_manage_messages() && !invocation.can_manage_messages {
        return Err(CommandError::PermissionDenied(verb.name()));
    }

    let guild_id = match (verb.requires_server(), invocation.guild_id) {
        (true, None) => {
            return Err(CommandError::Validation(format!(
                "`{}` only works in a server.",
                verb.name()
            )))
        }
        (_, guild_id) => guild_id,
    };

    let argument = match verb.argument() {
        Some((name, _)) => {
            let argument = invocation
                .argument
                .as_deref()
                .map(str::trim)
                .filter(|argument| !argument.is_empty())
                .ok_or_else(|| {
                    CommandError::Validation(format!("`{}` needs a {}.", verb.name(), name))
                })?;
            Some(argument)
        }
        None => None,
    };

    match (verb, guild_id, argument) {
        (Verb::AddSite, Some(guild_id), Some(domain)) => registry
            .add(guild_id, domain, &invocation.author)
            .await
            .map(Reply::Added)
            .map_err(Into::into),
        (Verb::RemoveSite, Some(guild_id), Some(domain)) => registry
            .remove(guild_id, domain)
            .await
            .map(Reply::Removed)
            .map_err(Into::into),
        (Verb::ListSites, Some(guild_id), _) => registry
            .list(guild_id)
            .await
            .map(Reply::Sites)
            .map_err(Into::into),
        (Verb::Archive, _, Some(url)) => {
            let source = parse_target(url)?;
            let result = archiver.lookup(&source).await;
            Ok(Reply::Archive { source, result })
        }
        (Verb::Render, _, Some(url)) => {
            let source = parse_target(url)?;
            let result = archiver.render(&source).await;
            Ok(Reply::Archive { source, result })
        }
        // Guild and argument presence were checked above.
        (verb, _, _) => Err(CommandError::Validation(format!(
            "`{}` could not be run.",
            verb.name()
        ))),
    }
}

/// URLs typed by hand often lack a scheme.
fn parse_target(input: &str) -> Result<Url, CommandError> {
    let trimmed = input.trim_matches(|c: char| c == '<' || c == '>' || c == '`');
    let candidate = if trimmed.contains("://") {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(format!("https://{}", trimmed))
    };

    match Url::parse(&candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(url),
        _ => Err(CommandError::Validation(format!(
            "Please provide a valid URL: `{}` is not one.",
            trimmed
        ))),
    }
}

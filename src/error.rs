//! Error taxonomy for commands and their collaborators

use crate::registry::Domain;

/// Why a domain string was rejected
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("no domain given")]
    Empty,
    #[error("`{0}` is not a valid domain")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("`{0}` is already being watched")]
    AlreadyWatched(Domain),
    #[error("`{0}` is not being watched")]
    NotWatched(Domain),
    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Failures talking to archive.today or the CAPTCHA solver.  Never shown to users directly; the
/// archive workflow turns them into manual links.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: HTTP {0}")]
    UnexpectedStatus(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("blocked by a CAPTCHA")]
    Challenged,
    #[error("captcha service error: {0}")]
    Captcha(String),
    #[error("timed out")]
    Timeout,
}

/// Outcome of a command that did not produce a normal reply.  `Display` is the text shown to the
/// user.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("You need the Manage Messages permission to use `{0}`.")]
    PermissionDenied(&'static str),
    #[error("Something went wrong talking to the database.  Try again later.")]
    Storage(#[source] sqlx::Error),
}

impl From<RegistryError> for CommandError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Invalid(e) => {
                CommandError::Validation(format!("Please provide a valid domain: {}.", e))
            }
            RegistryError::AlreadyWatched(domain) => {
                CommandError::Validation(format!("`{}` is already being watched.", domain))
            }
            RegistryError::NotWatched(domain) => {
                CommandError::NotFound(format!("`{}` was not being watched.", domain))
            }
            RegistryError::Storage(e) => CommandError::Storage(e),
        }
    }
}

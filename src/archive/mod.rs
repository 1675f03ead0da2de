//! Getting an archive.today snapshot for a URL, or at least links to get one by hand

pub mod captcha;
pub mod service;
pub mod workflow;

use crate::{config::Config, error::ServiceError, log_internal, logging::PrintColor};
use anyhow::{anyhow, Result};
use captcha::{CaptchaSolver, SolveCaptcha};
use service::{ArchiveService, HttpArchiveService};
use url::Url;
use workflow::{Workflow, WorkflowSettings};

#[derive(Debug)]
pub enum ArchiveResult {
    Archived {
        url: Url,
    },
    /// Nothing automatic worked.  The links let the user look up or create a snapshot themselves.
    Unavailable {
        reason: FailureReason,
        manual_links: Vec<Url>,
    },
}

/// Why no snapshot could be produced.  Displayed to users.
#[derive(Debug, thiserror::Error)]
pub enum FailureReason {
    #[error("No archived copy exists yet")]
    NotArchived,
    #[error("archive.today asked for a CAPTCHA and no CAPTCHA solver is configured")]
    NoCaptchaSolver,
    #[error("archive.today kept asking for a CAPTCHA ({attempts} solved)")]
    Challenged { attempts: u32 },
    #[error("Archiving took too long")]
    TimedOut,
    #[error("archive.today could not be reached ({0})")]
    Service(#[from] ServiceError),
}

/// Entry point for everything archive related.  Owns the HTTP clients.
pub struct Archiver {
    service: Box<dyn ArchiveService>,
    solver: Option<Box<dyn CaptchaSolver>>,
    settings: WorkflowSettings,
    base_url: Url,
}

impl Archiver {
    pub fn new(
        service: Box<dyn ArchiveService>,
        solver: Option<Box<dyn CaptchaSolver>>,
        settings: WorkflowSettings,
        base_url: Url,
    ) -> Self {
        Self {
            service,
            solver,
            settings,
            base_url,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let archive = &cfg.archive;
        let base_url = Url::parse(&archive.base_url)
            .map_err(|e| anyhow!("Invalid archive base_url `{}`: {}", archive.base_url, e))?;
        let service = HttpArchiveService::new(base_url.clone(), archive.request_timeout())?;

        let solver: Option<Box<dyn CaptchaSolver>> = match &cfg.captcha.api_key {
            Some(api_key) => {
                let captcha_url = Url::parse(&cfg.captcha.base_url).map_err(|e| {
                    anyhow!("Invalid captcha base_url `{}`: {}", cfg.captcha.base_url, e)
                })?;
                Some(Box::new(SolveCaptcha::new(
                    captcha_url,
                    api_key.clone(),
                    archive.request_timeout(),
                    cfg.captcha.solve_timeout(),
                    cfg.captcha.poll_interval(),
                )?))
            }
            None => {
                log_internal!("No captcha API key configured; challenged archives will fail");
                None
            }
        };

        Ok(Self::new(
            Box::new(service),
            solver,
            archive.workflow_settings(),
            base_url,
        ))
    }

    /// Existing snapshot only.  Never submits anything.
    pub async fn lookup(&self, source: &Url) -> ArchiveResult {
        match self.service.lookup(source).await {
            Ok(Some(url)) => ArchiveResult::Archived { url },
            Ok(None) => self.unavailable(source, FailureReason::NotArchived),
            Err(err) => self.unavailable(source, FailureReason::Service(err)),
        }
    }

    /// Existing snapshot if there is one, otherwise capture a new one.
    pub async fn render(&self, source: &Url) -> ArchiveResult {
        match self.service.lookup(source).await {
            Ok(Some(url)) => return ArchiveResult::Archived { url },
            Ok(None) => {}
            // Submission uses a different endpoint, so still worth a try.
            Err(err) => log_internal!("Lookup of {} failed: {}", source.color(), err),
        }

        let workflow = Workflow::new(&*self.service, self.solver.as_deref(), &self.settings);
        match workflow.run(source).await {
            Ok(url) => ArchiveResult::Archived { url },
            Err(reason) => {
                log_internal!("Archiving {} failed: {}", source.color(), reason);
                self.unavailable(source, reason)
            }
        }
    }

    fn unavailable(&self, source: &Url, reason: FailureReason) -> ArchiveResult {
        ArchiveResult::Unavailable {
            reason,
            manual_links: manual_links(&self.base_url, source),
        }
    }
}

/// Links into archive.today's own UI: search for existing snapshots, and the save form
/// pre-filled with `source`.
pub fn manual_links(base_url: &Url, source: &Url) -> Vec<Url> {
    let mut search = base_url.clone();
    search.set_query(None);
    search.set_path(&format!("/{}", urlencoding::encode(source.as_str())));

    let mut save = base_url.clone();
    save.set_path("/");
    save.query_pairs_mut()
        .clear()
        .append_pair("run", "1")
        .append_pair("url", source.as_str());

    vec![search, save]
}

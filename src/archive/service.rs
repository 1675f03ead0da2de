//! archive.today over HTTP
//!
//! archive.today has no API; it is driven through the same endpoints its web form uses.  Redirects
//! are not followed so that their targets can be inspected:
//! - `/wip/<id>` means the snapshot is still being captured,
//! - `/<id>` is a finished snapshot,
//! - a page carrying a `data-sitekey` (usually served with HTTP 429) is a CAPTCHA challenge.
//!   A bare 429 without one is an error, since there is nothing to solve.
//!
//! Submissions go through the form on the front page, so its hidden `submitid` is fetched first
//! and sent along.

use crate::{error::ServiceError, log_internal, logging::PrintColor};
use regex::Regex;
use std::{sync::LazyLock, time::Duration};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static SITEKEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-sitekey\s*=\s*["']([^"']+)["']"#).expect("sitekey pattern is valid")
});

// Attribute order varies between the front page and challenge pages.
static SUBMIT_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<input[^>]*?(?:name=["']submitid["'][^>]*?value=["']([^"']*)["']|value=["']([^"']*)["'][^>]*?name=["']submitid["'])"#,
    )
    .expect("submitid pattern is valid")
});

/// One attempt at archiving `source`.  Lives only for the duration of a workflow run.
#[derive(Clone, Debug)]
pub struct ArchiveRequest {
    pub source: Url,
    /// Hidden field of the form the request is submitted through.
    pub submit_id: Option<String>,
    /// Solution to the last CAPTCHA we were shown, if any.
    pub captcha_token: Option<String>,
}

impl ArchiveRequest {
    pub fn new(source: Url) -> Self {
        Self {
            source,
            submit_id: None,
            captcha_token: None,
        }
    }
}

/// Parameters a CAPTCHA solver needs to produce a token for the page that challenged us.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    pub site_key: String,
    pub page_url: Url,
    /// The challenge page's own form has a fresh `submitid` to resubmit with.
    pub submit_id: Option<String>,
}

/// What archive.today said about a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Archived(Url),
    Pending(Url),
    Challenged(Challenge),
}

#[serenity::async_trait]
pub trait ArchiveService: Send + Sync {
    /// Start a request for `source`, with whatever the submission form needs.
    async fn prepare(&self, source: &Url) -> Result<ArchiveRequest, ServiceError> {
        Ok(ArchiveRequest::new(source.clone()))
    }
    /// Most recent existing snapshot of `source`, if there is one.
    async fn lookup(&self, source: &Url) -> Result<Option<Url>, ServiceError>;
    /// Ask for a new snapshot.
    async fn submit(&self, request: &ArchiveRequest) -> Result<Submission, ServiceError>;
    /// Check on a snapshot that was still being captured.
    async fn poll(&self, pending: &Url) -> Result<Submission, ServiceError>;
}

pub struct HttpArchiveService {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpArchiveService {
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut endpoint = self.base_url.clone();
        endpoint.set_path(path);
        endpoint.set_query(None);
        endpoint
    }
}

#[serenity::async_trait]
impl ArchiveService for HttpArchiveService {
    async fn prepare(&self, source: &Url) -> Result<ArchiveRequest, ServiceError> {
        let endpoint = self.endpoint("/");

        let response = self.client.get(endpoint.clone()).send().await?;
        let reply = Reply::read(response).await?;
        if !reply.is_success() {
            return Err(ServiceError::UnexpectedStatus(reply.status));
        }

        let mut request = ArchiveRequest::new(source.clone());
        request.submit_id = submit_id(&reply.body);
        if request.submit_id.is_none() {
            log_internal!("No submitid on {}, submitting without", endpoint.color());
        }
        Ok(request)
    }

    async fn lookup(&self, source: &Url) -> Result<Option<Url>, ServiceError> {
        let endpoint = self.endpoint(&format!("/newest/{}", source));

        log_internal!("Looking up snapshots of {}... ", source.color());
        let response = self.client.get(endpoint.clone()).send().await?;
        let reply = Reply::read(response).await?;

        match reply.classify(&endpoint)? {
            Some(Submission::Archived(snapshot)) => {
                log_internal!("Looking up snapshots of {}... found", source.color());
                Ok(Some(snapshot))
            }
            Some(Submission::Challenged(_)) => {
                log_internal!("Looking up snapshots of {}... challenged", source.color());
                Err(ServiceError::Challenged)
            }
            Some(Submission::Pending(_)) => Err(ServiceError::Malformed(
                "lookup redirected to a capture in progress".to_owned(),
            )),
            None if reply.status == 404 || reply.is_success() => {
                log_internal!("Looking up snapshots of {}... none", source.color());
                Ok(None)
            }
            None => Err(ServiceError::UnexpectedStatus(reply.status)),
        }
    }

    async fn submit(&self, request: &ArchiveRequest) -> Result<Submission, ServiceError> {
        let endpoint = self.endpoint("/submit/");

        let mut form = vec![("url", request.source.as_str()), ("anyway", "1")];
        if let Some(submit_id) = &request.submit_id {
            form.push(("submitid", submit_id.as_str()));
        }
        if let Some(token) = &request.captcha_token {
            form.push(("h-captcha-response", token.as_str()));
            form.push(("g-recaptcha-response", token.as_str()));
        }

        log_internal!("Submitting {} to {}... ", request.source.color(), endpoint.color());
        let response = self.client.post(endpoint.clone()).form(&form).send().await?;
        let reply = Reply::read(response).await?;

        let submission = reply
            .classify(&endpoint)?
            .ok_or(ServiceError::UnexpectedStatus(reply.status))?;
        log_internal!(
            "Submitting {} to {}... {}",
            request.source.color(),
            endpoint.color(),
            submission.label()
        );
        Ok(submission)
    }

    async fn poll(&self, pending: &Url) -> Result<Submission, ServiceError> {
        let response = self.client.get(pending.clone()).send().await?;
        let reply = Reply::read(response).await?;

        // The work-in-progress page is served with 200 until capture completes.
        match reply.classify(pending)? {
            Some(submission) => Ok(submission),
            None if reply.is_success() => Ok(Submission::Pending(pending.clone())),
            None => Err(ServiceError::UnexpectedStatus(reply.status)),
        }
    }
}

impl Submission {
    fn label(&self) -> &'static str {
        match self {
            Submission::Archived(_) => "archived",
            Submission::Pending(_) => "in progress",
            Submission::Challenged(_) => "captcha",
        }
    }
}

/// The parts of an HTTP response that decide what archive.today meant.
struct Reply {
    status: u16,
    location: Option<String>,
    refresh: Option<String>,
    body: String,
}

impl Reply {
    async fn read(response: reqwest::Response) -> Result<Self, ServiceError> {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        let status = response.status().as_u16();
        let location = header("location");
        let refresh = header("refresh");
        let body = response.text().await?;

        Ok(Self {
            status,
            location,
            refresh,
            body,
        })
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Ok(None)` when the response says nothing conclusive, e.g. a plain page or an error status.
    fn classify(&self, requested: &Url) -> Result<Option<Submission>, ServiceError> {
        let target = match (&self.location, &self.refresh) {
            (Some(location), _) if (300..400).contains(&self.status) => Some(location.as_str()),
            (_, Some(refresh)) => refresh_target(refresh),
            _ => None,
        };

        if let Some(target) = target {
            let target = requested
                .join(target)
                .map_err(|e| ServiceError::Malformed(format!("bad redirect `{}`: {}", target, e)))?;
            if is_work_in_progress(&target) {
                return Ok(Some(Submission::Pending(target)));
            }
            if is_snapshot(&target) {
                return Ok(Some(Submission::Archived(target)));
            }
        }

        if let Some(site_key) = SITEKEY_PATTERN
            .captures(&self.body)
            .and_then(|captures| captures.get(1))
        {
            return Ok(Some(Submission::Challenged(Challenge {
                site_key: site_key.as_str().to_owned(),
                page_url: requested.clone(),
                submit_id: submit_id(&self.body),
            })));
        }

        Ok(None)
    }
}

/// `Refresh: 0;url=https://archive.ph/wip/abc` -> `https://archive.ph/wip/abc`
fn refresh_target(refresh: &str) -> Option<&str> {
    let (_, target) = refresh.split_once(';')?;
    let target = target.trim();
    target
        .get(..4)
        .filter(|prefix| prefix.eq_ignore_ascii_case("url="))
        .map(|_| target[4..].trim())
}

fn submit_id(body: &str) -> Option<String> {
    let captures = SUBMIT_ID_PATTERN.captures(body)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|id| id.as_str().to_owned())
        .filter(|id| !id.is_empty())
}

fn is_work_in_progress(url: &Url) -> bool {
    url.path().starts_with("/wip/")
}

/// Snapshots live at a short opaque id directly under the root, e.g. `/AbC12`.
fn is_snapshot(url: &Url) -> bool {
    let id = url.path().trim_start_matches('/');
    id.len() >= 5 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

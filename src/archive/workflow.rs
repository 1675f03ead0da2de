//! The archiving state machine
//!
//! ```text
//! (prepare form) --> Submitted
//! Submitted --submit--> Archived                      (terminal)
//!           \---------> Pending --poll--> Archived
//!            \--------> Challenged --solve--> Submitted
//! any error, missing solver, too many challenges, or timeout --> Failed (terminal)
//! ```

use crate::{
    archive::{
        captcha::CaptchaSolver,
        service::{ArchiveRequest, ArchiveService, Challenge, Submission},
        FailureReason,
    },
    error::ServiceError,
};
use std::time::Duration;
use url::Url;

/// Tuning for a workflow run
#[derive(Clone, Debug)]
pub struct WorkflowSettings {
    /// How many CAPTCHA challenges to attempt before giving up.
    pub max_captcha_attempts: u32,
    /// Upper bound for a whole run, including polling and solving.
    pub render_timeout: Duration,
    /// Delay between checks on a snapshot that is still being captured.
    pub poll_interval: Duration,
}

#[derive(Debug)]
enum State {
    Submitted,
    Challenged(Challenge),
    Pending(Url),
    Archived(Url),
    Failed(FailureReason),
}

impl From<Result<Submission, ServiceError>> for State {
    fn from(result: Result<Submission, ServiceError>) -> Self {
        match result {
            Ok(Submission::Archived(url)) => State::Archived(url),
            Ok(Submission::Pending(url)) => State::Pending(url),
            Ok(Submission::Challenged(challenge)) => State::Challenged(challenge),
            Err(err) => State::Failed(FailureReason::Service(err)),
        }
    }
}

pub struct Workflow<'a> {
    service: &'a dyn ArchiveService,
    solver: Option<&'a dyn CaptchaSolver>,
    settings: &'a WorkflowSettings,
}

/// Mutable bookkeeping for one run
struct Run {
    request: ArchiveRequest,
    challenges: u32,
}

impl<'a> Workflow<'a> {
    pub fn new(
        service: &'a dyn ArchiveService,
        solver: Option<&'a dyn CaptchaSolver>,
        settings: &'a WorkflowSettings,
    ) -> Self {
        Self {
            service,
            solver,
            settings,
        }
    }

    /// Drive a fresh request for `source` to a terminal state.
    pub async fn run(&self, source: &Url) -> Result<Url, FailureReason> {
        tokio::time::timeout(self.settings.render_timeout, self.drive(source))
            .await
            .unwrap_or(Err(FailureReason::TimedOut))
    }

    async fn drive(&self, source: &Url) -> Result<Url, FailureReason> {
        let mut run = Run {
            request: self.service.prepare(source).await?,
            challenges: 0,
        };

        let mut state = State::Submitted;
        loop {
            state = match state {
                State::Archived(url) => return Ok(url),
                State::Failed(reason) => return Err(reason),
                state => self.step(state, &mut run).await,
            };
        }
    }

    async fn step(&self, state: State, run: &mut Run) -> State {
        match state {
            State::Submitted => self.service.submit(&run.request).await.into(),
            State::Challenged(challenge) => {
                if run.challenges >= self.settings.max_captcha_attempts {
                    return State::Failed(FailureReason::Challenged {
                        attempts: run.challenges,
                    });
                }
                run.challenges += 1;

                let Some(solver) = self.solver else {
                    return State::Failed(FailureReason::NoCaptchaSolver);
                };
                match solver.solve(&challenge).await {
                    Ok(token) => {
                        run.request.captcha_token = Some(token);
                        if let Some(submit_id) = challenge.submit_id {
                            run.request.submit_id = Some(submit_id);
                        }
                        State::Submitted
                    }
                    Err(err) => State::Failed(FailureReason::Service(err)),
                }
            }
            State::Pending(url) => {
                tokio::time::sleep(self.settings.poll_interval).await;
                self.service.poll(&url).await.into()
            }
            terminal => terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    /// Replays canned answers to `submit`/`poll` in order, then keeps repeating the last one.
    struct ScriptedService {
        answers: Mutex<VecDeque<Submission>>,
        tokens_seen: Mutex<Vec<Option<String>>>,
        submit_ids_seen: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedService {
        fn new(answers: impl IntoIterator<Item = Submission>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().collect()),
                tokens_seen: Mutex::new(Vec::new()),
                submit_ids_seen: Mutex::new(Vec::new()),
            }
        }

        fn next(&self) -> Submission {
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.pop_front().unwrap()
            } else {
                answers.front().cloned().unwrap()
            }
        }
    }

    #[serenity::async_trait]
    impl ArchiveService for ScriptedService {
        async fn prepare(&self, source: &Url) -> Result<ArchiveRequest, ServiceError> {
            let mut request = ArchiveRequest::new(source.clone());
            request.submit_id = Some("front-page".to_owned());
            Ok(request)
        }

        async fn lookup(&self, _source: &Url) -> Result<Option<Url>, ServiceError> {
            Ok(None)
        }

        async fn submit(&self, request: &ArchiveRequest) -> Result<Submission, ServiceError> {
            self.tokens_seen
                .lock()
                .unwrap()
                .push(request.captcha_token.clone());
            self.submit_ids_seen
                .lock()
                .unwrap()
                .push(request.submit_id.clone());
            Ok(self.next())
        }

        async fn poll(&self, _pending: &Url) -> Result<Submission, ServiceError> {
            Ok(self.next())
        }
    }

    struct FailingService;

    #[serenity::async_trait]
    impl ArchiveService for FailingService {
        async fn prepare(&self, _source: &Url) -> Result<ArchiveRequest, ServiceError> {
            Err(ServiceError::UnexpectedStatus(503))
        }

        async fn lookup(&self, _source: &Url) -> Result<Option<Url>, ServiceError> {
            Err(ServiceError::UnexpectedStatus(503))
        }

        async fn submit(&self, _request: &ArchiveRequest) -> Result<Submission, ServiceError> {
            Err(ServiceError::UnexpectedStatus(503))
        }

        async fn poll(&self, _pending: &Url) -> Result<Submission, ServiceError> {
            Err(ServiceError::UnexpectedStatus(503))
        }
    }

    struct CountingSolver {
        calls: AtomicUsize,
    }

    #[serenity::async_trait]
    impl CaptchaSolver for CountingSolver {
        async fn solve(&self, _challenge: &Challenge) -> Result<String, ServiceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{}", n))
        }
    }

    fn settings() -> WorkflowSettings {
        WorkflowSettings {
            max_captcha_attempts: 2,
            render_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn challenge() -> Submission {
        Submission::Challenged(Challenge {
            site_key: "key".to_owned(),
            page_url: url("https://archive.today/submit/"),
            submit_id: Some("challenge-page".to_owned()),
        })
    }

    fn source() -> Url {
        url("https://www.nytimes.com/x")
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let service = ScriptedService::new([Submission::Archived(url("https://archive.ph/AbCdE"))]);
        let settings = settings();
        let archived = Workflow::new(&service, None, &settings)
            .run(&source())
            .await
            .unwrap();
        assert_eq!(archived.as_str(), "https://archive.ph/AbCdE");
    }

    #[tokio::test]
    async fn test_pending_then_archived() {
        let service = ScriptedService::new([
            Submission::Pending(url("https://archive.ph/wip/AbCdE")),
            Submission::Pending(url("https://archive.ph/wip/AbCdE")),
            Submission::Archived(url("https://archive.ph/AbCdE")),
        ]);
        let settings = settings();
        let archived = Workflow::new(&service, None, &settings)
            .run(&source())
            .await
            .unwrap();
        assert_eq!(archived.path(), "/AbCdE");
    }

    #[tokio::test]
    async fn test_challenge_solved_and_resubmitted_with_token() {
        let service = ScriptedService::new([
            challenge(),
            Submission::Archived(url("https://archive.ph/AbCdE")),
        ]);
        let solver = CountingSolver {
            calls: AtomicUsize::new(0),
        };
        let settings = settings();

        let archived = Workflow::new(&service, Some(&solver), &settings)
            .run(&source())
            .await;
        assert!(archived.is_ok());
        assert_eq!(
            *service.tokens_seen.lock().unwrap(),
            [None, Some("token-1".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_resubmission_uses_challenge_page_form() {
        let service = ScriptedService::new([
            challenge(),
            Submission::Archived(url("https://archive.ph/AbCdE")),
        ]);
        let solver = CountingSolver {
            calls: AtomicUsize::new(0),
        };
        let settings = settings();

        Workflow::new(&service, Some(&solver), &settings)
            .run(&source())
            .await
            .unwrap();
        assert_eq!(
            *service.submit_ids_seen.lock().unwrap(),
            [
                Some("front-page".to_owned()),
                Some("challenge-page".to_owned())
            ]
        );
    }

    #[tokio::test]
    async fn test_repeated_challenges_hit_the_limit() {
        let service = ScriptedService::new([challenge()]);
        let solver = CountingSolver {
            calls: AtomicUsize::new(0),
        };
        let settings = settings();

        let result = Workflow::new(&service, Some(&solver), &settings)
            .run(&source())
            .await;
        assert!(matches!(result, Err(FailureReason::Challenged { attempts: 2 })));
        assert_eq!(solver.calls.load(Ordering::SeqCst), 2);
        // The initial submission plus one resubmission per solved challenge.
        assert_eq!(service.tokens_seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_challenge_without_solver_fails() {
        let service = ScriptedService::new([challenge()]);
        let settings = settings();
        let result = Workflow::new(&service, None, &settings)
            .run(&source())
            .await;
        assert!(matches!(result, Err(FailureReason::NoCaptchaSolver)));
    }

    #[tokio::test]
    async fn test_service_error_fails() {
        let settings = settings();
        let result = Workflow::new(&FailingService, None, &settings)
            .run(&source())
            .await;
        assert!(matches!(
            result,
            Err(FailureReason::Service(ServiceError::UnexpectedStatus(503)))
        ));
    }

    #[tokio::test]
    async fn test_stuck_pending_times_out() {
        let service =
            ScriptedService::new([Submission::Pending(url("https://archive.ph/wip/AbCdE"))]);
        let settings = WorkflowSettings {
            render_timeout: Duration::from_millis(50),
            ..settings()
        };
        let result = Workflow::new(&service, None, &settings)
            .run(&source())
            .await;
        assert!(matches!(result, Err(FailureReason::TimedOut)));
    }
}

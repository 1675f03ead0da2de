//! CAPTCHA solving through the SolveCaptcha HTTP API (2captcha-compatible `in.php`/`res.php`)

use crate::{archive::service::Challenge, error::ServiceError, log_internal, logging::PrintColor};
use std::time::Duration;
use url::Url;

const NOT_READY: &str = "CAPCHA_NOT_READY";

#[serenity::async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Produce a response token for `challenge`.
    async fn solve(&self, challenge: &Challenge) -> Result<String, ServiceError>;
}

pub struct SolveCaptcha {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    solve_timeout: Duration,
    poll_interval: Duration,
}

/// Every SolveCaptcha response has this shape.  `request` holds a task id, a token, or an error
/// code depending on the call and `status`.
#[derive(serde::Deserialize)]
struct ApiResponse {
    status: u8,
    request: String,
}

impl SolveCaptcha {
    pub fn new(
        base_url: Url,
        api_key: String,
        request_timeout: Duration,
        solve_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
            solve_timeout,
            poll_interval,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::Malformed(format!("bad captcha endpoint: {}", e)))
    }

    async fn create_task(&self, challenge: &Challenge) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(self.endpoint("in.php")?)
            .form(&[
                ("key", self.api_key.as_str()),
                ("method", "hcaptcha"),
                ("sitekey", challenge.site_key.as_str()),
                ("pageurl", challenge.page_url.as_str()),
                ("json", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<ApiResponse>()
            .await?;

        match response.status {
            1 => Ok(response.request),
            _ => Err(ServiceError::Captcha(response.request)),
        }
    }

    /// `Ok(None)` while the solver is still working.
    async fn fetch_token(&self, task_id: &str) -> Result<Option<String>, ServiceError> {
        let response = self
            .client
            .get(self.endpoint("res.php")?)
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "get"),
                ("id", task_id),
                ("json", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<ApiResponse>()
            .await?;

        match response.status {
            1 => Ok(Some(response.request)),
            _ if response.request == NOT_READY => Ok(None),
            _ => Err(ServiceError::Captcha(response.request)),
        }
    }

    async fn wait_for_token(&self, task_id: &str) -> Result<String, ServiceError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            if let Some(token) = self.fetch_token(task_id).await? {
                return Ok(token);
            }
        }
    }
}

#[serenity::async_trait]
impl CaptchaSolver for SolveCaptcha {
    async fn solve(&self, challenge: &Challenge) -> Result<String, ServiceError> {
        log_internal!("Solving captcha for {}... ", challenge.page_url.color());

        let task_id = self.create_task(challenge).await?;
        let token = tokio::time::timeout(self.solve_timeout, self.wait_for_token(&task_id))
            .await
            .map_err(|_| ServiceError::Timeout)??;

        log_internal!("Solving captcha for {}... done", challenge.page_url.color());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn solver(server: &MockServer, solve_timeout: Duration) -> SolveCaptcha {
        SolveCaptcha::new(
            Url::parse(&format!("{}/", server.uri())).unwrap(),
            "api-key".to_owned(),
            Duration::from_secs(5),
            solve_timeout,
            Duration::from_millis(10),
        )
        .unwrap()
    }

    fn challenge() -> Challenge {
        Challenge {
            site_key: "site-key-123".to_owned(),
            page_url: Url::parse("https://archive.today/submit/").unwrap(),
            submit_id: None,
        }
    }

    async fn mount_task(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/in.php"))
            .and(body_string_contains("sitekey=site-key-123"))
            .and(body_string_contains("method=hcaptcha"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "status": 1,
                    "request": "task-1",
                })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_solve_waits_until_ready() {
        let server = MockServer::start().await;
        mount_task(&server).await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .and(query_param("id", "task-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": 0,
                "request": NOT_READY,
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .and(query_param("id", "task-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": 1,
                "request": "solved-token",
            })))
            .mount(&server)
            .await;

        let token = solver(&server, Duration::from_secs(5))
            .solve(&challenge())
            .await
            .unwrap();
        assert_eq!(token, "solved-token");
    }

    #[tokio::test]
    async fn test_solve_reports_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/in.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": 0,
                "request": "ERROR_WRONG_USER_KEY",
            })))
            .mount(&server)
            .await;

        let err = solver(&server, Duration::from_secs(5))
            .solve(&challenge())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Captcha(code) if code == "ERROR_WRONG_USER_KEY"));
    }

    #[tokio::test]
    async fn test_solve_gives_up_after_timeout() {
        let server = MockServer::start().await;
        mount_task(&server).await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": 0,
                "request": NOT_READY,
            })))
            .mount(&server)
            .await;

        let err = solver(&server, Duration::from_millis(100))
            .solve(&challenge())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
    }
}

use crate::archive::workflow::WorkflowSettings;
use anyhow::{anyhow, Result};
use std::{path::PathBuf, time::Duration};

const CONFIG_PATH_REL_HOME: &str = ".config/archivebot/config.toml";
const DATABASE_PATH_REL_DATA: &str = "archivebot/archivebot.db";

/// Bot configuration
///
/// Read from an optional TOML file, then overridden by environment variables (and `.env`).
#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: General,
    pub database: Database,
    pub archive: Archive,
    pub captcha: Captcha,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct General {
    pub discord_token: String,
    pub command_prefix: String,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Database {
    /// Defaults to a file in the platform data directory.
    pub path: Option<PathBuf>,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Archive {
    pub base_url: String,
    pub request_timeout_seconds: u64,
    pub render_timeout_seconds: u64,
    pub poll_interval_seconds: u64,
    pub max_captcha_attempts: u32,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Captcha {
    /// Without a key, archive.today challenges can't be solved.
    pub api_key: Option<String>,
    pub base_url: String,
    pub solve_timeout_seconds: u64,
    pub poll_interval_seconds: u64,
}

impl Default for General {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            command_prefix: "!".to_owned(),
        }
    }
}

impl Default for Archive {
    fn default() -> Self {
        Self {
            base_url: "https://archive.today".to_owned(),
            request_timeout_seconds: 30,
            render_timeout_seconds: 120,
            poll_interval_seconds: 2,
            max_captcha_attempts: 2,
        }
    }
}

impl Default for Captcha {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.solvecaptcha.com".to_owned(),
            solve_timeout_seconds: 120,
            poll_interval_seconds: 5,
        }
    }
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("ARCHIVEBOT_CONFIG") {
            return Ok(PathBuf::from(path));
        }

        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        // A missing .env is fine; the variables may come from the real environment.
        let _ = dotenvy::dotenv();

        let path = Self::config_path()?;

        let mut config = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::parse(&contents).map_err(|e| {
                anyhow!(
                    "Could not parse configuration at `{}`: {}",
                    path.to_string_lossy(),
                    e
                )
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(anyhow!(
                    "Could not read configuration at `{}`: {}",
                    path.to_string_lossy(),
                    e
                ))
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Credentials and deployment paths usually come from the environment rather than the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = var("DISCORD_TOKEN") {
            self.general.discord_token = token;
        }
        if let Some(prefix) = var("COMMAND_PREFIX") {
            self.general.command_prefix = prefix;
        }
        if let Some(api_key) = var("SOLVECAPTCHA_API_KEY") {
            self.captcha.api_key = Some(api_key);
        }
        if let Some(path) = var("DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.discord_token.trim().is_empty() {
            return Err(anyhow!(
                "No Discord token configured.  Set DISCORD_TOKEN or `general.discord_token`"
            ));
        }
        if self.general.command_prefix.trim().is_empty() {
            return Err(anyhow!("`general.command_prefix` must not be empty"));
        }
        if self.archive.render_timeout_seconds == 0 || self.captcha.solve_timeout_seconds == 0 {
            return Err(anyhow!("Timeouts must be at least one second"));
        }
        if self.archive.poll_interval_seconds == 0 || self.captcha.poll_interval_seconds == 0 {
            return Err(anyhow!("Poll intervals must be at least one second"));
        }
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        dirs::data_dir()
            .map(|p| p.join(DATABASE_PATH_REL_DATA))
            .ok_or(anyhow!("Could not find data directory; set DATABASE_PATH"))
    }
}

impl Archive {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            max_captcha_attempts: self.max_captcha_attempts,
            render_timeout: Duration::from_secs(self.render_timeout_seconds),
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
        }
    }
}

impl Captcha {
    pub fn solve_timeout(&self) -> Duration {
        Duration::from_secs(self.solve_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

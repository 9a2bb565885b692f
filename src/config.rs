use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::http::BasicAuth;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .abacus.toml.
///
/// All fields are optional. The tool works with zero config as long as the
/// credential environment variables are set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub azure_devops: AzureDevOpsConfig,

    #[serde(default)]
    pub jira: JiraConfig,

    /// Default locations used when a command omits its optional path arguments
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureDevOpsConfig {
    /// Basic-auth username. Azure DevOps ignores it for PAT auth, any value works.
    #[serde(default = "default_azdo_username")]
    pub username: String,
    /// Personal access token. If None, falls back to AZDO_TOKEN env var.
    pub token: Option<String>,
}

impl Default for AzureDevOpsConfig {
    fn default() -> Self {
        Self {
            username: default_azdo_username(),
            token: None,
        }
    }
}

fn default_azdo_username() -> String {
    "anything".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraConfig {
    /// Falls back to JIRA_USER env var.
    pub user: Option<String>,
    /// Falls back to JIRA_TOKEN env var.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub projects: PathBuf,
    pub pull_requests: PathBuf,
    pub git_log: PathBuf,
    pub repos: PathBuf,
    pub jira_prs: PathBuf,
    pub jira_set_input: PathBuf,
    pub jira_set_output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            projects: PathBuf::from("local-only/projects.csv"),
            pull_requests: PathBuf::from("local-only/pullrequests.csv"),
            git_log: PathBuf::from("local-only/gitlog.csv"),
            repos: PathBuf::from("local-only/repos"),
            jira_prs: PathBuf::from("local-only/jira-prs.csv"),
            jira_set_input: PathBuf::from("local-only/jira-set.csv"),
            jira_set_output: PathBuf::from("local-only/jira-set-output.csv"),
        }
    }
}

impl Config {
    /// Load configuration from .abacus.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".abacus.toml");
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Azure DevOps credentials: config file value takes precedence,
    /// falls back to AZDO_TOKEN.
    pub fn azdo_auth(&self) -> BasicAuth {
        self.azdo_auth_with(|key| std::env::var(key).ok())
    }

    /// Jira credentials: config file values take precedence,
    /// fall back to JIRA_USER / JIRA_TOKEN.
    pub fn jira_auth(&self) -> BasicAuth {
        self.jira_auth_with(|key| std::env::var(key).ok())
    }

    fn azdo_auth_with(&self, env: impl Fn(&str) -> Option<String>) -> BasicAuth {
        BasicAuth {
            username: self.azure_devops.username.clone(),
            password: self
                .azure_devops
                .token
                .clone()
                .or_else(|| env("AZDO_TOKEN")),
        }
    }

    fn jira_auth_with(&self, env: impl Fn(&str) -> Option<String>) -> BasicAuth {
        BasicAuth {
            username: self
                .jira
                .user
                .clone()
                .or_else(|| env("JIRA_USER"))
                .unwrap_or_default(),
            password: self.jira.token.clone().or_else(|| env("JIRA_TOKEN")),
        }
    }
}

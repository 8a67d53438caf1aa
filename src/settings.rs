//! Connection settings for the IronMQ service.

use crate::error::{Error, Result};

/// Default API host.
pub const DEFAULT_HOST: &str = "mq-aws-us-east-1-1.iron.io";
/// Default API version (path prefix).
pub const DEFAULT_API_VERSION: &str = "3";

const ENV_TOKEN: &str = "IRON_TOKEN";
const ENV_PROJECT_ID: &str = "IRON_PROJECT_ID";
const ENV_HOST: &str = "IRON_HOST";
const ENV_PORT: &str = "IRON_PORT";
const ENV_SCHEME: &str = "IRON_SCHEME";
const ENV_API_VERSION: &str = "IRON_API_VERSION";
const ENV_USER_AGENT: &str = "IRON_USER_AGENT";

/// Fully resolved connection settings.
///
/// Settings are immutable once a [`Client`](crate::Client) is built; every
/// queue handle and endpoint refers back to the same shared value.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub api_version: String,
    pub project_id: String,
    pub token: String,
    pub user_agent: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_version", &self.api_version)
            .field("project_id", &self.project_id)
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Settings {
    /// Settings for the given project and token, with default host and scheme.
    pub fn new(project_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            scheme: "https".to_string(),
            host: DEFAULT_HOST.to_string(),
            port: 443,
            api_version: DEFAULT_API_VERSION.to_string(),
            project_id: project_id.into(),
            token: token.into(),
            user_agent: default_user_agent(),
        }
    }

    /// Resolve settings from `IRON_*` environment variables.
    ///
    /// `IRON_TOKEN` and `IRON_PROJECT_ID` are required; host, port, scheme,
    /// API version and user agent fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get(ENV_TOKEN).ok_or_else(|| Error::Config(format!("{ENV_TOKEN} is not set")))?;
        let project_id = get(ENV_PROJECT_ID)
            .ok_or_else(|| Error::Config(format!("{ENV_PROJECT_ID} is not set")))?;

        let mut settings = Settings::new(project_id, token);

        if let Some(host) = get(ENV_HOST) {
            settings.host = host;
        }
        if let Some(scheme) = get(ENV_SCHEME) {
            settings.scheme = scheme;
        }
        if let Some(port) = get(ENV_PORT) {
            settings.port = port
                .parse()
                .map_err(|_| Error::Config(format!("{ENV_PORT} is not a valid port: {port}")))?;
        }
        if let Some(version) = get(ENV_API_VERSION) {
            settings.api_version = version;
        }
        if let Some(agent) = get(ENV_USER_AGENT) {
            settings.user_agent = agent;
        }

        Ok(settings)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// `scheme://host:port`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

fn default_user_agent() -> String {
    format!("ironmq-rust/{}", env!("CARGO_PKG_VERSION"))
}

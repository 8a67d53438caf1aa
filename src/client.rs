//! HTTP client and configuration.

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::protocol::{ListQueuesResponse, QueueRequest, QueueResponse};
use crate::queue::Queue;
use crate::retry::RetryConfig;
use crate::settings::Settings;
use crate::types::{ListOptions, QueueInfo};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use std::sync::Arc;
use std::time::Duration;

/// An IronMQ client.
///
/// The client is cloneable and can be shared across threads. Clones share
/// one connection pool and one immutable [`Settings`] value; cloning only
/// bumps a reference count.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) settings: Settings,
    pub(crate) default_headers: HeaderMap,
    pub(crate) retry: RetryConfig,
    pub(crate) deadline: Option<Duration>,
    pub(crate) log_bodies: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("settings", &self.inner.settings)
            .field("retry", &self.inner.retry)
            .field("deadline", &self.inner.deadline)
            .field("log_bodies", &self.inner.log_bodies)
            .finish()
    }
}

impl Client {
    /// Create a client with default transport settings.
    pub fn new(settings: Settings) -> Result<Self> {
        ClientBuilder::new(settings).build()
    }

    /// Create a client from `IRON_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(Settings::from_env()?)
    }

    /// Create a client builder for customization.
    pub fn builder(settings: Settings) -> ClientBuilder {
        ClientBuilder::new(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Create a queue handle.
    ///
    /// No network request is made until an operation is called.
    pub fn queue(&self, name: impl Into<String>) -> Queue {
        Queue {
            client: self.clone(),
            name: name.into(),
        }
    }

    /// Create a queue. All `info` fields are optional; the queue type
    /// cannot be changed afterwards.
    pub async fn create_queue(&self, name: &str, info: QueueInfo) -> Result<QueueInfo> {
        if name.is_empty() {
            return Err(Error::InvalidQueueName);
        }

        let info = QueueInfo {
            name: name.to_string(),
            ..info
        };
        let endpoint = Endpoint::action(&self.inner.settings, "queues", &[name])?;
        let out: QueueResponse = self
            .execute(Method::PUT, endpoint, Some(&QueueRequest { queue: &info }))
            .await?;
        Ok(out.queue)
    }

    /// List queues in the project.
    pub async fn list_queues(&self, options: ListOptions) -> Result<Vec<Queue>> {
        let mut endpoint = Endpoint::action(&self.inner.settings, "queues", &[])?;

        if let Some(previous) = options.previous.as_deref().filter(|p| !p.is_empty()) {
            endpoint = endpoint.query("previous", previous);
        }
        if let Some(prefix) = options.prefix.as_deref().filter(|p| !p.is_empty()) {
            endpoint = endpoint.query("prefix", prefix);
        }
        if let Some(per_page) = options.per_page.filter(|n| *n > 0) {
            endpoint = endpoint.query("per_page", per_page);
        }

        let out: ListQueuesResponse = self.execute::<(), _>(Method::GET, endpoint, None).await?;
        Ok(out.queues.into_iter().map(|q| self.queue(q.name)).collect())
    }

    /// First page of queues.
    pub async fn list(&self) -> Result<Vec<Queue>> {
        self.list_queues(ListOptions::default()).await
    }

    /// A page of queues after `previous`, the name of the last queue of
    /// the prior page (empty for the first page).
    pub async fn list_page(&self, previous: &str, per_page: u32) -> Result<Vec<Queue>> {
        self.list_queues(ListOptions::new().previous(previous).per_page(per_page))
            .await
    }

    /// Queues whose names start with `prefix`.
    pub async fn filter(&self, prefix: &str) -> Result<Vec<Queue>> {
        self.list_queues(ListOptions::new().prefix(prefix)).await
    }

    pub async fn filter_page(
        &self,
        prefix: &str,
        previous: &str,
        per_page: u32,
    ) -> Result<Vec<Queue>> {
        self.list_queues(
            ListOptions::new()
                .prefix(prefix)
                .previous(previous)
                .per_page(per_page),
        )
        .await
    }

    /// Service version information from `GET /version`.
    pub async fn server_version(&self) -> Result<serde_json::Value> {
        let endpoint = Endpoint::version(&self.inner.settings)?;
        self.execute::<(), _>(Method::GET, endpoint, None).await
    }
}

/// Builder for configuring a Client.
#[must_use = "builders do nothing unless you call .build()"]
pub struct ClientBuilder {
    settings: Settings,
    default_headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    deadline: Option<Duration>,
    retry: RetryConfig,
    log_bodies: bool,
}

impl ClientBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            default_headers: Vec::new(),
            timeout: None,
            deadline: None,
            retry: RetryConfig::default(),
            log_bodies: false,
        }
    }

    /// Add a header sent with every request.
    ///
    /// Names and values are validated in [`build`](Self::build).
    pub fn default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((key.into(), value.into()));
        self
    }

    /// Set the per-attempt transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bound a whole call, retries and backoff included.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the retry policy for 503 responses and dropped connections.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.retry.max_retries = retries;
        self
    }

    /// Log request and response bodies at debug level.
    pub fn log_bodies(mut self, enabled: bool) -> Self {
        self.log_bodies = enabled;
        self
    }

    /// Build the client.
    ///
    /// Fails if the token, user agent or a default header is not a valid
    /// header value, or if the HTTP client cannot be built.
    pub fn build(self) -> Result<Client> {
        let mut headers = HeaderMap::new();
        let mut auth = header_value(&format!("OAuth {}", self.settings.token))?;
        auth.set_sensitive(true);
        headers.insert(http::header::AUTHORIZATION, auth);
        headers.insert(http::header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            http::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );
        headers.insert(http::header::USER_AGENT, header_value(&self.settings.user_agent)?);

        for (key, value) in &self.default_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| Error::Config(format!("invalid header name: {key}")))?;
            headers.insert(name, header_value(value)?);
        }

        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(512)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30));

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder.build().map_err(Error::Network)?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                http,
                settings: self.settings,
                default_headers: headers,
                retry: self.retry,
                deadline: self.deadline,
                log_bodies: self.log_bodies,
            }),
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::Config("invalid header value".to_string()))
}

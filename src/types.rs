//! Queue metadata and option types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest server-side long-poll wait, in seconds.
pub const MAX_WAIT_SECS: u32 = 30;

/// Server-maintained timestamps. Never sent by the client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// How a queue delivers its messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    /// Consumers reserve messages.
    Pull,
    /// Every subscriber receives every message.
    Multicast,
    /// Each message goes to one subscriber.
    Unicast,
    /// A type this client does not know about.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueueType::Pull => "pull",
            QueueType::Multicast => "multicast",
            QueueType::Unicast => "unicast",
            QueueType::Unknown => "unknown",
        })
    }
}

/// Queue metadata.
///
/// On write every field is optional: unset fields are omitted and leave
/// the server's value in place. `size`, `total_messages` and the
/// timestamps are only ever read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing)]
    pub size: u64,
    #[serde(default, skip_serializing)]
    pub total_messages: u64,

    /// Seconds a message lives before it expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_expiration: Option<u64>,
    /// Default reservation window in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_timeout: Option<u64>,

    /// Immutable once the queue exists.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub queue_type: Option<QueueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<PushInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<Alert>,

    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl QueueInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message_expiration(mut self, secs: u64) -> Self {
        self.message_expiration = Some(secs);
        self
    }

    pub fn message_timeout(mut self, secs: u64) -> Self {
        self.message_timeout = Some(secs);
        self
    }

    pub fn queue_type(mut self, queue_type: QueueType) -> Self {
        self.queue_type = Some(queue_type);
        self
    }

    pub fn push(mut self, push: PushInfo) -> Self {
        self.push = Some(push);
        self
    }

    pub fn alert(mut self, alert: Alert) -> Self {
        self.alerts.push(alert);
        self
    }
}

/// Push queue configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushInfo {
    /// Seconds between delivery retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries_delay: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscribers: Vec<QueueSubscriber>,
    /// Queue that receives messages whose delivery finally failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_queue: Option<String>,
}

impl PushInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retries_delay(mut self, secs: u32) -> Self {
        self.retries_delay = Some(secs);
        self
    }

    pub fn error_queue(mut self, queue: impl Into<String>) -> Self {
        self.error_queue = Some(queue.into());
        self
    }

    pub fn subscriber(mut self, subscriber: QueueSubscriber) -> Self {
        self.subscribers.push(subscriber);
        self
    }
}

/// A push target configured on a queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSubscriber {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// Extra HTTP headers sent with each delivery.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl QueueSubscriber {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Subscriber identified by name only, as used for removal.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Delivery status of one message to one subscriber.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub retried: u32,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub url: String,
}

impl Subscriber {
    /// Delivery has not been attempted yet.
    pub fn is_queued(&self) -> bool {
        self.status == "queued"
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    #[default]
    Fixed,
    Progressive,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    #[default]
    Asc,
    Desc,
}

/// Queue size trigger that posts a notification message to `queue`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type", default)]
    pub alert_type: AlertType,
    #[serde(default)]
    pub trigger: u64,
    #[serde(default)]
    pub direction: AlertDirection,
    #[serde(default)]
    pub queue: String,
    /// Minimum seconds between two alerts.
    #[serde(default)]
    pub snooze: u64,
}

impl Alert {
    pub fn new(alert_type: AlertType, trigger: u64, queue: impl Into<String>) -> Self {
        Self {
            alert_type,
            trigger,
            direction: AlertDirection::Asc,
            queue: queue.into(),
            snooze: 0,
        }
    }

    pub fn direction(mut self, direction: AlertDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn snooze(mut self, secs: u64) -> Self {
        self.snooze = secs;
        self
    }
}

/// Options for listing queues.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct ListOptions {
    pub prefix: Option<String>,
    /// Name of the last queue on the previous page.
    pub previous: Option<String>,
    pub per_page: Option<u32>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn previous(mut self, previous: impl Into<String>) -> Self {
        self.previous = Some(previous.into());
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }
}

/// Options for reserving messages.
///
/// `reserve` and `pop` are shorthands for common combinations.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ReserveOptions {
    /// Number of messages.
    pub n: u32,
    /// Reservation window in seconds; 0 uses the queue default.
    pub timeout: u32,
    /// Long-poll for up to this many seconds, capped at [`MAX_WAIT_SECS`].
    pub wait: u32,
    /// Delete messages as they are handed out instead of reserving them.
    pub delete: bool,
}

impl Default for ReserveOptions {
    fn default() -> Self {
        Self {
            n: 1,
            timeout: 0,
            wait: 0,
            delete: false,
        }
    }
}

impl ReserveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n(mut self, n: u32) -> Self {
        self.n = n;
        self
    }

    pub fn timeout(mut self, secs: u32) -> Self {
        self.timeout = secs;
        self
    }

    pub fn wait(mut self, secs: u32) -> Self {
        self.wait = secs.min(MAX_WAIT_SECS);
        self
    }

    pub fn delete(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }
}

/// Bounds for polling subscriber delivery status.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct PollOptions {
    /// Pause before each status request.
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_attempts: None,
            timeout: None,
            cancel: None,
        }
    }
}

impl PollOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

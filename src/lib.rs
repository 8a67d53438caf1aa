//! IronMQ Rust Client
//!
//! An async client for IronMQ, the hosted elastic message queue, over its
//! v3 HTTP/JSON API.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ironmq::{Client, QueueInfo, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ironmq::Error> {
//!     let client = Client::new(Settings::new("my-project-id", "my-token"))?;
//!     let queue = client.queue("orders");
//!
//!     queue.create(QueueInfo::new()).await?;
//!     queue.push_strings(["first", "second"]).await?;
//!
//!     if let Some(message) = queue.reserve().await? {
//!         println!("got {}", message.body);
//!         message.delete().await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Errors
//!
//! Every call returns [`Error`]. Responses other than 200/201 become
//! [`Error::Api`]; match on [`Error::kind`] or [`Error::status_code`]
//! rather than the message text. HTTP 503 is retried with quadratic
//! backoff before it is reported, see [`RetryConfig`].

mod client;
mod endpoint;
mod error;
mod message;
pub mod protocol;
mod queue;
mod request;
mod retry;
mod settings;
mod types;

pub use client::{Client, ClientBuilder};
pub use endpoint::Endpoint;
pub use error::{ApiError, Error, ErrorKind, Result, QUEUE_NOT_FOUND_MESSAGE};
pub use message::Message;
pub use queue::Queue;
pub use retry::{JitterMode, RetryConfig};
pub use settings::{Settings, DEFAULT_API_VERSION, DEFAULT_HOST};
pub use types::{
    Alert, AlertDirection, AlertType, ListOptions, PollOptions, PushInfo, QueueInfo,
    QueueSubscriber, QueueType, ReserveOptions, Subscriber, Timestamps, MAX_WAIT_SECS,
};

/// Re-exported so callers can build [`PollOptions::cancel`] tokens.
pub use tokio_util::sync::CancellationToken;

//! Queue handle and operations.

use crate::client::Client;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{
    AlertsBody, AlertsRequest, DeleteMessageRequest, DeleteMessagesRequest, MessageRef,
    MessageResponse, MessagesResponse, PushMessagesRequest, PushMessagesResponse, QueueRequest,
    QueueResponse, ReleaseRequest, ReserveRequest, SubscriberStatusResponse, SubscribersRequest,
    TouchRequest, TouchResponse,
};
use crate::types::{
    Alert, PollOptions, QueueInfo, QueueSubscriber, ReserveOptions, Subscriber, MAX_WAIT_SECS,
};
use http::Method;
use tracing::debug;

/// Messages returned by [`Queue::peek`].
const DEFAULT_PEEK: u32 = 30;

/// Reservation window used by [`Queue::reserve_n`], in seconds.
const DEFAULT_RESERVE_TIMEOUT: u32 = 60;

/// A handle to a queue.
///
/// This is a lightweight, cloneable value - pure identity plus the client
/// used to reach the service. It carries no server state, and creating one
/// makes no request.
#[derive(Clone, Debug)]
pub struct Queue {
    pub(crate) client: Client,
    pub(crate) name: String,
}

impl Queue {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Endpoint> {
        let mut path = Vec::with_capacity(segments.len() + 1);
        path.push(self.name.as_str());
        path.extend_from_slice(segments);
        Endpoint::action(self.client.settings(), "queues", &path)
    }

    /// Stamp returned messages with this queue.
    fn attach(&self, mut messages: Vec<Message>) -> Vec<Message> {
        for message in &mut messages {
            message.queue = Some(self.clone());
        }
        messages
    }

    /// Create this queue. See [`Client::create_queue`].
    pub async fn create(&self, info: QueueInfo) -> Result<QueueInfo> {
        self.client.create_queue(&self.name, info).await
    }

    /// Queue metadata. Also a cheap existence check.
    pub async fn info(&self) -> Result<QueueInfo> {
        let out: QueueResponse = self
            .client
            .execute::<(), _>(Method::GET, self.endpoint(&[])?, None)
            .await?;
        Ok(out.queue)
    }

    /// Update queue settings. Unset fields are left unchanged; the name and
    /// type of an existing queue cannot change, so `info.name` is ignored.
    pub async fn update(&self, info: QueueInfo) -> Result<QueueInfo> {
        let info = QueueInfo {
            name: String::new(),
            ..info
        };
        let out: QueueResponse = self
            .client
            .execute(Method::PATCH, self.endpoint(&[])?, Some(&QueueRequest { queue: &info }))
            .await?;
        Ok(out.queue)
    }

    pub async fn delete(&self) -> Result<()> {
        self.client
            .execute_empty::<()>(Method::DELETE, self.endpoint(&[])?, None)
            .await
    }

    /// Add alerts to the queue.
    pub async fn add_alerts(&self, alerts: &[Alert]) -> Result<()> {
        let body = AlertsRequest {
            queue: AlertsBody { alerts },
        };
        self.client
            .execute_empty(Method::PATCH, self.endpoint(&[])?, Some(&body))
            .await
    }

    /// Push one message body with no delay.
    pub async fn push_string(&self, body: impl Into<String>) -> Result<String> {
        self.push_message(Message::new(body)).await
    }

    /// Push several bodies with no delay; ids come back in input order.
    pub async fn push_strings<I, S>(&self, bodies: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages: Vec<Message> = bodies.into_iter().map(Message::new).collect();
        self.push_messages(&messages).await
    }

    /// Push one message.
    ///
    /// Fails with [`Error::NoIdsReturned`] if the service assigned no id.
    pub async fn push_message(&self, message: Message) -> Result<String> {
        self.push_messages(std::slice::from_ref(&message))
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoIdsReturned)
    }

    /// Push messages in one call; ids come back in input order.
    pub async fn push_messages(&self, messages: &[Message]) -> Result<Vec<String>> {
        let out: PushMessagesResponse = self
            .client
            .execute(
                Method::POST,
                self.endpoint(&["messages"])?,
                Some(&PushMessagesRequest { messages }),
            )
            .await?;
        debug!(queue = %self.name, count = out.ids.len(), "pushed messages");
        Ok(out.ids)
    }

    /// Look at up to 30 messages without reserving them.
    pub async fn peek(&self) -> Result<Vec<Message>> {
        self.peek_n(DEFAULT_PEEK).await
    }

    /// Look at up to `n` messages (max 100) without reserving them.
    pub async fn peek_n(&self, n: u32) -> Result<Vec<Message>> {
        let endpoint = self.endpoint(&["messages"])?.query("n", n);
        let out: MessagesResponse = self
            .client
            .execute::<(), _>(Method::GET, endpoint, None)
            .await?;
        Ok(self.attach(out.messages))
    }

    /// Fetch one message by id without reserving it.
    pub async fn get_message(&self, id: &str) -> Result<Message> {
        let out: MessageResponse = self
            .client
            .execute::<(), _>(Method::GET, self.endpoint(&["messages", id])?, None)
            .await?;
        let mut message = out.message;
        message.queue = Some(self.clone());
        Ok(message)
    }

    /// Reserve one message, if any is available.
    ///
    /// The message stays on the queue until deleted; if the reservation
    /// expires first it becomes visible again.
    pub async fn reserve(&self) -> Result<Option<Message>> {
        Ok(self.reserve_n(1).await?.into_iter().next())
    }

    /// Reserve up to `n` messages for 60 seconds.
    pub async fn reserve_n(&self, n: u32) -> Result<Vec<Message>> {
        self.long_poll(n, DEFAULT_RESERVE_TIMEOUT, 0, false).await
    }

    /// Reserve up to `n` messages for `timeout` seconds.
    pub async fn get_n_with_timeout(&self, n: u32, timeout: u32) -> Result<Vec<Message>> {
        self.long_poll(n, timeout, 0, false).await
    }

    /// Take one message off the queue, deleting it.
    pub async fn pop(&self) -> Result<Option<Message>> {
        Ok(self.pop_n(1).await?.into_iter().next())
    }

    /// Take up to `n` messages off the queue, deleting them.
    pub async fn pop_n(&self, n: u32) -> Result<Vec<Message>> {
        self.long_poll(n, 0, 0, true).await
    }

    /// Reserve with all knobs: `wait` long-polls for up to that many seconds
    /// (capped at 30), and `delete` removes messages instead of reserving.
    pub async fn long_poll(&self, n: u32, timeout: u32, wait: u32, delete: bool) -> Result<Vec<Message>> {
        self.reserve_with(
            ReserveOptions::new()
                .n(n)
                .timeout(timeout)
                .wait(wait)
                .delete(delete),
        )
        .await
    }

    pub async fn reserve_with(&self, options: ReserveOptions) -> Result<Vec<Message>> {
        let body = ReserveRequest {
            n: options.n,
            timeout: options.timeout,
            wait: options.wait.min(MAX_WAIT_SECS),
            delete: options.delete,
        };
        let out: MessagesResponse = self
            .client
            .execute(Method::POST, self.endpoint(&["reservations"])?, Some(&body))
            .await?;
        debug!(queue = %self.name, count = out.messages.len(), delete = options.delete, "reserved messages");
        Ok(self.attach(out.messages))
    }

    /// Delete every message in the queue.
    pub async fn clear(&self) -> Result<()> {
        self.client
            .execute_empty::<()>(Method::DELETE, self.endpoint(&["messages"])?, None)
            .await
    }

    /// Delete one message. Pass the current reservation id for a reserved
    /// message, or an empty string for one that is not reserved.
    pub async fn delete_message(&self, id: &str, reservation_id: &str) -> Result<()> {
        self.client
            .execute_empty(
                Method::DELETE,
                self.endpoint(&["messages", id])?,
                Some(&DeleteMessageRequest { reservation_id }),
            )
            .await
    }

    /// Delete unreserved messages by id.
    pub async fn delete_messages<S: AsRef<str>>(&self, ids: &[S]) -> Result<()> {
        let body = DeleteMessagesRequest {
            ids: ids
                .iter()
                .map(|id| MessageRef {
                    id: id.as_ref(),
                    reservation_id: None,
                })
                .collect(),
        };
        self.client
            .execute_empty(Method::DELETE, self.endpoint(&["messages"])?, Some(&body))
            .await
    }

    /// Delete reserved messages; each entry sends its id and reservation id.
    pub async fn delete_reserved_messages(&self, messages: &[Message]) -> Result<()> {
        let body = DeleteMessagesRequest {
            ids: messages
                .iter()
                .map(|m| MessageRef {
                    id: &m.id,
                    reservation_id: Some(&m.reservation_id),
                })
                .collect(),
        };
        self.client
            .execute_empty(Method::DELETE, self.endpoint(&["messages"])?, Some(&body))
            .await
    }

    /// Extend a reservation by the queue default. Returns the new
    /// reservation id; the old one stops working.
    pub async fn touch_message(&self, id: &str, reservation_id: &str) -> Result<String> {
        self.touch_message_for(id, reservation_id, 0).await
    }

    /// Extend a reservation by `timeout` seconds (0 = queue default).
    /// Returns the new reservation id; the old one stops working.
    pub async fn touch_message_for(&self, id: &str, reservation_id: &str, timeout: u32) -> Result<String> {
        let body = TouchRequest {
            timeout: (timeout > 0).then_some(timeout),
            reservation_id,
        };
        let out: TouchResponse = self
            .client
            .execute(Method::POST, self.endpoint(&["messages", id, "touch"])?, Some(&body))
            .await?;
        Ok(out.reservation_id)
    }

    /// Put a reserved message back, visible again after `delay` seconds.
    /// The reservation id is consumed.
    pub async fn release_message(&self, id: &str, reservation_id: &str, delay: u64) -> Result<()> {
        let body = ReleaseRequest {
            delay,
            reservation_id,
        };
        self.client
            .execute_empty(Method::POST, self.endpoint(&["messages", id, "release"])?, Some(&body))
            .await
    }

    /// Delivery status of a pushed message, one entry per subscriber.
    pub async fn message_subscribers(&self, id: &str) -> Result<Vec<Subscriber>> {
        let out: SubscriberStatusResponse = self
            .client
            .execute::<(), _>(Method::GET, self.endpoint(&["messages", id, "subscribers"])?, None)
            .await?;
        Ok(out.subscribers)
    }

    /// Add subscribers, keeping existing ones.
    pub async fn add_subscribers(&self, subscribers: &[QueueSubscriber]) -> Result<()> {
        self.subscribers_call(Method::POST, subscribers).await
    }

    /// Replace the whole subscriber list.
    pub async fn replace_subscribers(&self, subscribers: &[QueueSubscriber]) -> Result<()> {
        self.subscribers_call(Method::PUT, subscribers).await
    }

    /// Remove subscribers by name.
    pub async fn remove_subscribers<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let subscribers: Vec<QueueSubscriber> = names
            .iter()
            .map(|name| QueueSubscriber::named(name.as_ref()))
            .collect();
        self.remove_subscribers_collection(&subscribers).await
    }

    pub async fn remove_subscribers_collection(&self, subscribers: &[QueueSubscriber]) -> Result<()> {
        self.subscribers_call(Method::DELETE, subscribers).await
    }

    async fn subscribers_call(&self, method: Method, subscribers: &[QueueSubscriber]) -> Result<()> {
        self.client
            .execute_empty(
                method,
                self.endpoint(&["subscribers"])?,
                Some(&SubscribersRequest { subscribers }),
            )
            .await
    }

    /// Poll delivery status until at least `n` subscribers are reported and
    /// none of them is still queued.
    ///
    /// Sleeps `options.interval` before every request. Stops early on the
    /// first request error, and otherwise ends with [`Error::PollExhausted`],
    /// [`Error::Timeout`] or [`Error::Cancelled`] according to `options`.
    pub async fn poll_message_subscribers(
        &self,
        id: &str,
        n: usize,
        options: PollOptions,
    ) -> Result<Vec<Subscriber>> {
        let cancel = options.cancel.clone().unwrap_or_default();

        let bounded = async {
            match options.timeout {
                Some(timeout) => tokio::time::timeout(timeout, self.poll_subscribers(id, n, &options))
                    .await
                    .unwrap_or(Err(Error::Timeout)),
                None => self.poll_subscribers(id, n, &options).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = bounded => result,
        }
    }

    async fn poll_subscribers(&self, id: &str, n: usize, options: &PollOptions) -> Result<Vec<Subscriber>> {
        let mut attempts: u32 = 0;
        loop {
            if options.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(Error::PollExhausted { attempts });
            }

            tokio::time::sleep(options.interval).await;
            attempts += 1;

            let subscribers = self.message_subscribers(id).await?;
            if subscribers.len() >= n && !subscribers.iter().any(Subscriber::is_queued) {
                return Ok(subscribers);
            }
            debug!(queue = %self.name, message = id, attempts, seen = subscribers.len(), "delivery still pending");
        }
    }
}

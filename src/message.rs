//! Messages and their lifecycle calls.

use crate::error::{Error, Result};
use crate::queue::Queue;
use crate::types::Subscriber;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A queue message.
///
/// Used both for pushing (only `body` and `delay` matter) and for messages
/// handed back by the service. Messages returned by a [`Queue`] remember
/// that queue, so [`delete`](Self::delete), [`touch`](Self::touch) and
/// [`release`](Self::release) can be called on the message directly.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub body: String,
    /// Seconds to wait before the message becomes available. Write-only.
    #[serde(default, skip_serializing_if = "is_zero", skip_deserializing)]
    pub delay: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub reserved_count: u32,
    /// Changes on every reserve and touch; required to delete, touch or
    /// release a reserved message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reservation_id: String,
    #[serde(skip)]
    pub(crate) queue: Option<Queue>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

impl Message {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, secs: u64) -> Self {
        self.delay = secs;
        self
    }

    /// The queue this message was read from, if any.
    pub fn queue(&self) -> Option<&Queue> {
        self.queue.as_ref()
    }

    fn owner(&self) -> Result<&Queue> {
        self.queue.as_ref().ok_or(Error::Detached)
    }

    /// Delete this message, using its current reservation id.
    pub async fn delete(&self) -> Result<()> {
        self.owner()?
            .delete_message(&self.id, &self.reservation_id)
            .await
    }

    /// Extend the reservation by the queue's default timeout.
    pub async fn touch(&mut self) -> Result<()> {
        self.touch_for(0).await
    }

    /// Extend the reservation by `timeout` seconds (0 = queue default).
    ///
    /// On success the held reservation id is replaced by the new one.
    pub async fn touch_for(&mut self, timeout: u32) -> Result<()> {
        let reservation_id = self
            .owner()?
            .touch_message_for(&self.id, &self.reservation_id, timeout)
            .await?;
        self.reservation_id = reservation_id;
        Ok(())
    }

    /// Put the message back, visible again after `delay` seconds.
    pub async fn release(&self, delay: u64) -> Result<()> {
        self.owner()?
            .release_message(&self.id, &self.reservation_id, delay)
            .await
    }

    /// Delivery status for each push subscriber.
    pub async fn subscribers(&self) -> Result<Vec<Subscriber>> {
        self.owner()?.message_subscribers(&self.id).await
    }
}

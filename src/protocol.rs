//! Request and response bodies, one pair per endpoint.
//!
//! These mirror the JSON envelopes of the v3 API exactly. Request types
//! borrow from the caller so nothing is cloned on the way out.

use crate::message::Message;
use crate::types::{Alert, QueueInfo, QueueSubscriber, Subscriber};
use serde::{Deserialize, Serialize};

/// `PUT` / `PATCH queues/{name}`
#[derive(Debug, Serialize)]
pub struct QueueRequest<'a> {
    pub queue: &'a QueueInfo,
}

/// `GET` / `PUT` / `PATCH queues/{name}`
#[derive(Debug, Deserialize)]
pub struct QueueResponse {
    pub queue: QueueInfo,
}

/// `PATCH queues/{name}` carrying only alerts.
#[derive(Debug, Serialize)]
pub struct AlertsRequest<'a> {
    pub queue: AlertsBody<'a>,
}

#[derive(Debug, Serialize)]
pub struct AlertsBody<'a> {
    pub alerts: &'a [Alert],
}

/// `GET queues`
#[derive(Debug, Deserialize)]
pub struct ListQueuesResponse {
    #[serde(default)]
    pub queues: Vec<QueueName>,
}

#[derive(Debug, Deserialize)]
pub struct QueueName {
    pub name: String,
}

/// `POST queues/{name}/messages`
#[derive(Debug, Serialize)]
pub struct PushMessagesRequest<'a> {
    pub messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
pub struct PushMessagesResponse {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// `POST queues/{name}/reservations`
#[derive(Debug, Serialize)]
pub struct ReserveRequest {
    pub n: u32,
    pub timeout: u32,
    pub wait: u32,
    pub delete: bool,
}

/// `GET queues/{name}/messages` and `POST queues/{name}/reservations`
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// `GET queues/{name}/messages/{id}`
#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub message: Message,
}

/// `DELETE queues/{name}/messages/{id}`
#[derive(Debug, Serialize)]
pub struct DeleteMessageRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    pub reservation_id: &'a str,
}

/// `DELETE queues/{name}/messages` with a body.
#[derive(Debug, Serialize)]
pub struct DeleteMessagesRequest<'a> {
    pub ids: Vec<MessageRef<'a>>,
}

#[derive(Debug, Serialize)]
pub struct MessageRef<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<&'a str>,
}

/// `POST queues/{name}/messages/{id}/touch`
#[derive(Debug, Serialize)]
pub struct TouchRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    pub reservation_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TouchResponse {
    #[serde(default)]
    pub reservation_id: String,
}

/// `POST queues/{name}/messages/{id}/release`
#[derive(Debug, Serialize)]
pub struct ReleaseRequest<'a> {
    pub delay: u64,
    pub reservation_id: &'a str,
}

/// `POST` / `PUT` / `DELETE queues/{name}/subscribers`
#[derive(Debug, Serialize)]
pub struct SubscribersRequest<'a> {
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub subscribers: &'a [QueueSubscriber],
}

/// `GET queues/{name}/messages/{id}/subscribers`
#[derive(Debug, Deserialize)]
pub struct SubscriberStatusResponse {
    #[serde(default)]
    pub subscribers: Vec<Subscriber>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_touch_omits_default_timeout() {
        let body = TouchRequest {
            timeout: None,
            reservation_id: "r1",
        };
        assert_eq!(serde_json::to_value(body).unwrap(), json!({"reservation_id": "r1"}));
    }

    #[test]
    fn test_bulk_delete_shapes() {
        let by_id = DeleteMessagesRequest {
            ids: vec![MessageRef {
                id: "m1",
                reservation_id: None,
            }],
        };
        assert_eq!(serde_json::to_value(by_id).unwrap(), json!({"ids": [{"id": "m1"}]}));

        let reserved = DeleteMessagesRequest {
            ids: vec![MessageRef {
                id: "m1",
                reservation_id: Some("r1"),
            }],
        };
        assert_eq!(
            serde_json::to_value(reserved).unwrap(),
            json!({"ids": [{"id": "m1", "reservation_id": "r1"}]})
        );
    }

    #[test]
    fn test_reserve_request_shape() {
        let body = ReserveRequest {
            n: 2,
            timeout: 60,
            wait: 0,
            delete: true,
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"n": 2, "timeout": 60, "wait": 0, "delete": true})
        );
    }
}

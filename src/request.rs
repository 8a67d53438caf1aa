//! Request execution: serialization, retry, and error mapping.

use crate::client::Client;
use crate::endpoint::Endpoint;
use crate::error::{ApiError, Error, Result};
use bytes::Bytes;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error as _;
use tracing::{debug, warn};

/// Wire body used when a call carries no payload.
const EMPTY_OBJECT: &[u8] = b"{}";

impl Client {
    /// Perform a call and decode the JSON response into `O`.
    pub(crate) async fn execute<I, O>(
        &self,
        method: Method,
        endpoint: Endpoint,
        body: Option<&I>,
    ) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let bytes = self.send(method, endpoint, body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Perform a call and discard the response body.
    pub(crate) async fn execute_empty<I>(
        &self,
        method: Method,
        endpoint: Endpoint,
        body: Option<&I>,
    ) -> Result<()>
    where
        I: Serialize + ?Sized,
    {
        self.send(method, endpoint, body).await.map(drop)
    }

    /// Serialize, dispatch with retry, and map the final status.
    ///
    /// Returns the fully read body of a successful response.
    async fn send<I>(&self, method: Method, endpoint: Endpoint, body: Option<&I>) -> Result<Bytes>
    where
        I: Serialize + ?Sized,
    {
        let payload = match body {
            Some(body) => Bytes::from(serde_json::to_vec(body)?),
            None => Bytes::from_static(EMPTY_OBJECT),
        };

        if self.inner.log_bodies {
            debug!(%method, url = %endpoint, body = %String::from_utf8_lossy(&payload), "request body");
        }

        match self.inner.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.dispatch(&method, &endpoint, payload))
                .await
                .map_err(|_| Error::Timeout)?,
            None => self.dispatch(&method, &endpoint, payload).await,
        }
    }

    async fn dispatch(&self, method: &Method, endpoint: &Endpoint, payload: Bytes) -> Result<Bytes> {
        let mut attempt: u32 = 0;

        let response = loop {
            debug!(%method, url = %endpoint, attempt, "dispatching request");

            let request = self
                .inner
                .http
                .request(method.clone(), endpoint.url().clone())
                .headers(self.inner.default_headers.clone())
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(payload.clone());

            match request.send().await {
                Ok(resp)
                    if resp.status() == StatusCode::SERVICE_UNAVAILABLE
                        && self.inner.retry.should_retry(attempt) =>
                {
                    // Read the body so the connection goes back to the pool.
                    if let Err(err) = resp.bytes().await {
                        debug!(url = %endpoint, attempt, error = %err, "failed to drain 503 body");
                    }
                    let delay = self.inner.retry.backoff(attempt);
                    warn!(url = %endpoint, attempt, ?delay, "service unavailable, backing off");
                    tokio::time::sleep(delay).await;
                }
                Ok(resp) => break resp,
                Err(err) if is_closed_without_response(&err) && self.inner.retry.should_retry(attempt) => {
                    warn!(url = %endpoint, attempt, error = %err, "connection closed without response, retrying");
                }
                Err(err) => return Err(err.into()),
            }

            attempt += 1;
        };

        let status = response.status();
        let body = response.bytes().await?;

        if self.inner.log_bodies {
            debug!(%status, url = %endpoint, body = %String::from_utf8_lossy(&body), "response body");
        }

        match ApiError::from_response(status, &body) {
            Some(err) => {
                debug!(url = %endpoint, status = err.status, error = %err, "request failed");
                Err(err.into())
            }
            None => Ok(body),
        }
    }
}

/// Whether the connection was closed before any response arrived.
///
/// This is the only transport failure that is retried.
fn is_closed_without_response(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return true;
            }
        }
        if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
            if io_err.kind() == std::io::ErrorKind::UnexpectedEof {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{test_builder, test_client};
    use crate::retry::RetryConfig;
    use crate::settings::Settings;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Echo {
        value: u32,
    }

    /// Raw TCP server that reads each request, optionally writes `reply`,
    /// then closes the socket. Returns the port and the accept count.
    async fn raw_server(reply: Option<&'static [u8]>) -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                // Headers plus the two-byte `{}` body.
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.ends_with(b"\r\n\r\n{}") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                if let Some(reply) = reply {
                    let _ = socket.write_all(reply).await;
                }
                drop(socket);
            }
        });

        (port, accepted)
    }

    fn raw_client(port: u16, retry: RetryConfig) -> Client {
        let settings = Settings::new("p1", "t")
            .with_scheme("http")
            .with_host("127.0.0.1")
            .with_port(port);
        Client::builder(settings).retry(retry).build().unwrap()
    }

    fn endpoint(client: &Client) -> Endpoint {
        Endpoint::action(client.settings(), "queues", &["q"]).unwrap()
    }

    #[tokio::test]
    async fn test_sends_auth_and_json_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/projects/p1/queues/q"))
            .and(header("authorization", "OAuth secret"))
            .and(header("accept", "application/json"))
            .and(header("content-type", "application/json"))
            .and(header("accept-encoding", "gzip, deflate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let out: Echo = client
            .execute::<(), _>(Method::GET, endpoint(&client), None)
            .await
            .unwrap();
        assert_eq!(out, Echo { value: 7 });

        let requests = server.received_requests().await.unwrap();
        let agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
        assert!(agent.starts_with("ironmq-rust/"));
    }

    #[tokio::test]
    async fn test_absent_payload_is_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(body_json(serde_json::json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"msg": "Deleted"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        assert_ok!(
            client
                .execute_empty::<()>(Method::DELETE, endpoint(&client), None)
                .await
        );
    }

    #[tokio::test]
    async fn test_retries_service_unavailable_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({"msg": "busy"})))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let started = Instant::now();
        let out: Echo = client
            .execute::<(), _>(Method::GET, endpoint(&client), None)
            .await
            .unwrap();

        assert_eq!(out.value, 1);
        // 10ms then 40ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_map_last_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({"msg": "Service Unavailable"})),
            )
            .expect(6)
            .mount(&server)
            .await;

        let client = test_builder(&server)
            .retry(RetryConfig::default().with_backoff_unit(Duration::from_millis(1)))
            .build()
            .unwrap();
        let err = client
            .execute_empty::<()>(Method::GET, endpoint(&client), None)
            .await
            .unwrap_err();

        match err {
            Error::Api(api) => {
                assert_eq!(api.status, 503);
                assert_eq!(api.message, "503 Service Unavailable: Service Unavailable");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_max_retries_is_configurable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_builder(&server).max_retries(0).build().unwrap();
        let err = client
            .execute_empty::<()>(Method::GET, endpoint(&client), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn test_hard_failures_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"msg": "Queue not found"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .execute::<(), Echo>(Method::GET, endpoint(&client), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "404 Not Found: Queue not found");
        assert!(err.is_queue_not_found());
    }

    #[tokio::test]
    async fn test_decode_failure_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .execute::<(), Echo>(Method::GET, endpoint(&client), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn test_discarded_body_is_not_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        assert_ok!(
            client
                .execute_empty(Method::POST, endpoint(&client), Some(&serde_json::json!({"a": 1})))
                .await
        );
    }

    #[tokio::test]
    async fn test_serialize_failure_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        // Map keys must be strings in JSON.
        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1u8], 1u8);

        let client = test_client(&server);
        let err = client
            .execute_empty(Method::POST, endpoint(&client), Some(&bad))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn test_deadline_bounds_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = test_builder(&server)
            .deadline(Duration::from_millis(100))
            .build()
            .unwrap();
        let err = client
            .execute_empty::<()>(Method::GET, endpoint(&client), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let settings = Settings::new("p1", "t")
            .with_scheme("http")
            .with_host("127.0.0.1")
            .with_port(1);
        let client = Client::new(settings).unwrap();
        let err = client
            .execute_empty::<()>(Method::GET, endpoint(&client), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_closed_without_response_is_retried() {
        let (port, accepted) = raw_server(None).await;

        let client = raw_client(port, RetryConfig::default());
        let err = client
            .execute_empty::<()>(Method::GET, endpoint(&client), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network(_)), "got {err:?}");
        assert_eq!(accepted.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_closed_without_response_honors_max_retries() {
        let (port, accepted) = raw_server(None).await;

        let client = raw_client(port, RetryConfig::default().with_max_retries(1));
        let err = client
            .execute_empty::<()>(Method::GET, endpoint(&client), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network(_)), "got {err:?}");
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_malformed_response_is_not_retried() {
        let (port, accepted) = raw_server(Some(b"garbage\r\n\r\n")).await;

        let client = raw_client(port, RetryConfig::default());
        let err = client
            .execute_empty::<()>(Method::GET, endpoint(&client), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network(_)), "got {err:?}");
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_per_attempt_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_builder(&server)
            .timeout(Duration::from_millis(100))
            .deadline(Duration::from_secs(10))
            .build()
            .unwrap();
        let started = Instant::now();
        let err = client
            .execute_empty::<()>(Method::GET, endpoint(&client), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_body_logging_leaves_payloads_intact() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({"a": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": 3})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_builder(&server).log_bodies(true).build().unwrap();
        assert!(client.inner.log_bodies);
        let out: Echo = client
            .execute(Method::POST, endpoint(&client), Some(&serde_json::json!({"a": 1})))
            .await
            .unwrap();
        assert_eq!(out, Echo { value: 3 });
    }
}

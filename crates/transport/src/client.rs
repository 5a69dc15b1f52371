use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use skiff_protocol::{ChunkPayload, FIELD_ETAGS, FIELD_FILES, PARAM_MD5};

use crate::TransportError;
use crate::retry::RetryPolicy;

/// Outcome of one logical exchange: the status and body of the last attempt,
/// or a synthesized 500 when the attempt budget ran out.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the body as JSON.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    fn synthesized(attempts: u32, detail: &str) -> Self {
        Self {
            status: 500,
            body: format!("synthetic error 500 after {attempts} attempts: {detail}"),
        }
    }
}

/// HTTP client that retries one logical exchange per [`send`] call.
///
/// [`send`]: RetryingClient::send
#[derive(Debug)]
pub struct RetryingClient {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    /// Builds the client with the access token baked into every request and
    /// the per-attempt deadline from `policy`.
    pub fn new(token: &str, policy: RetryPolicy) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token {token}"))
                .map_err(|_| TransportError::InvalidToken)?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(policy.attempt_timeout)
            .build()?;

        Ok(Self { http, policy })
    }

    /// Posts the payload to `uri`, retrying per the policy.
    ///
    /// `build_payload` is invoked once per attempt: a multipart body is
    /// single-use, so each retry rebuilds it from scratch. This call never
    /// fails; when the budget is exhausted it returns a synthesized
    /// 500-equivalent reply describing the last failure.
    pub async fn send<F>(&self, uri: &str, build_payload: F) -> Reply
    where
        F: Fn() -> ChunkPayload,
    {
        let mut last_failure = String::from("no attempt made");

        for attempt in 1..=self.policy.max_attempts {
            let payload = build_payload();
            let summary = payload.describe();

            let request = self
                .http
                .post(uri)
                .header("content-range", payload.range.to_string())
                .multipart(build_form(payload));

            let resp = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    let delay = self.policy.delay_for_transport_error(&e);
                    warn!(
                        attempt,
                        uri,
                        error = %e,
                        request_body = %summary,
                        "transport failure, retrying"
                    );
                    last_failure = format!("transport error: {e}");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let status = resp.status().as_u16();
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        attempt,
                        uri,
                        status,
                        error = %e,
                        request_body = %summary,
                        "failed reading response body, retrying"
                    );
                    last_failure = format!("body read error: {e}");
                    tokio::time::sleep(self.policy.delay_transport_other).await;
                    continue;
                }
            };

            match self.policy.delay_for_status(status) {
                None => {
                    if attempt > 1 {
                        debug!(uri, status, attempt, "exchange settled after retries");
                    }
                    return Reply { status, body };
                }
                Some(delay) => {
                    warn!(
                        attempt,
                        uri,
                        status,
                        delay_ms = delay.as_millis() as u64,
                        request_body = %summary,
                        server_body = %body,
                        "retryable status, backing off"
                    );
                    last_failure = format!("status {status}: {body}");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        warn!(
            uri,
            attempts = self.policy.max_attempts,
            "retry budget exhausted, synthesizing terminal reply"
        );
        Reply::synthesized(self.policy.max_attempts, &last_failure)
    }
}

/// Single JSON POST with no retries and no token; transport-level failures
/// come back as a 400-style reply so callers always get a [`Reply`].
pub async fn post_json_once<T: Serialize>(uri: &str, body: &T) -> Reply {
    let client = reqwest::Client::new();
    match client.post(uri).json(body).send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Reply { status, body }
        }
        Err(e) => Reply {
            status: 400,
            body: format!("request failed: {e}"),
        },
    }
}

/// Expands a payload description into the actual multipart form.
fn build_form(payload: ChunkPayload) -> Form {
    let ChunkPayload {
        params,
        file_name,
        bytes,
        chunk_hash,
        range: _,
        etags,
    } = payload;

    let mut form = Form::new();
    for (key, value) in params {
        form = form.text(key, value);
    }

    let mut part_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&chunk_hash) {
        part_headers.insert("content-md5", value);
    }
    let part = Part::bytes(bytes).file_name(file_name).headers(part_headers);
    form = form.part(FIELD_FILES, part);
    form = form.text(PARAM_MD5, chunk_hash);

    if let Some(etags) = etags {
        form = form.text(FIELD_ETAGS, etags);
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use skiff_protocol::ContentRange;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    fn sample_payload() -> ChunkPayload {
        ChunkPayload {
            params: vec![
                ("user_id".into(), "u-1".into()),
                ("version".into(), "v-1".into()),
            ],
            file_name: "data.bin".into(),
            bytes: b"abcd".to_vec(),
            chunk_hash: "e2fc714c4727ee9395f324cd2e7f331f".into(),
            range: ContentRange::for_part(0, 4, 4),
            etags: None,
        }
    }

    #[tokio::test]
    async fn success_returns_without_delay() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/storage/upload/b-1/"))
                .respond_with(status_code(200).body(r#"{"guid":"g-1"}"#)),
        );

        // Huge delays: if any sleep ran, the elapsed bound below fails.
        let policy = RetryPolicy {
            delay_429: Duration::from_secs(30),
            ..RetryPolicy::default()
        };
        let client = RetryingClient::new("tok", policy).unwrap();
        let uri = format!("http://{}/storage/upload/b-1/", server.addr());

        let started = Instant::now();
        let reply = client.send(&uri, sample_payload).await;
        assert_eq!(reply.status, 200);
        assert!(reply.is_success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn retries_429_then_returns_success() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/storage/upload/b-1/"))
                .times(4)
                .respond_with(cycle![
                    status_code(429).body("busy"),
                    status_code(429).body("busy"),
                    status_code(429).body("busy"),
                    status_code(200).body(r#"{"guid":"g-1"}"#),
                ]),
        );

        let policy = RetryPolicy {
            delay_429: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        let client = RetryingClient::new("tok", policy).unwrap();
        let uri = format!("http://{}/storage/upload/b-1/", server.addr());

        let builds = AtomicU32::new(0);
        let started = Instant::now();
        let reply = client
            .send(&uri, || {
                builds.fetch_add(1, Ordering::SeqCst);
                sample_payload()
            })
            .await;

        assert_eq!(reply.status, 200);
        // The body is rebuilt for every attempt, never reused.
        assert_eq!(builds.load(Ordering::SeqCst), 4);
        // Three sleeps between the four attempts.
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn exhausted_budget_synthesizes_500() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/storage/upload/b-1/"))
                .times(3)
                .respond_with(status_code(500).body("boom")),
        );

        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        }
        .immediate();
        let client = RetryingClient::new("tok", policy).unwrap();
        let uri = format!("http://{}/storage/upload/b-1/", server.addr());

        let reply = client.send(&uri, sample_payload).await;
        assert_eq!(reply.status, 500);
        assert!(reply.body.contains("after 3 attempts"), "{}", reply.body);
        assert!(reply.body.contains("status 500"), "{}", reply.body);
    }

    #[tokio::test]
    async fn extra_status_set_is_retried() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/storage/upload/b-1/"))
                .times(2)
                .respond_with(cycle![
                    status_code(418).body("not ready"),
                    status_code(200).body("{}"),
                ]),
        );

        let policy = RetryPolicy {
            extra_retry_statuses: vec![418],
            ..RetryPolicy::default()
        }
        .immediate();
        let client = RetryingClient::new("tok", policy).unwrap();
        let uri = format!("http://{}/storage/upload/b-1/", server.addr());

        let reply = client.send(&uri, sample_payload).await;
        assert_eq!(reply.status, 200);
    }

    #[tokio::test]
    async fn plain_rejection_is_terminal() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/storage/upload/b-1/"))
                .times(1)
                .respond_with(status_code(403).body("forbidden")),
        );

        let client = RetryingClient::new("tok", RetryPolicy::default()).unwrap();
        let uri = format!("http://{}/storage/upload/b-1/", server.addr());

        let reply = client.send(&uri, sample_payload).await;
        assert_eq!(reply.status, 403);
        assert_eq!(reply.body, "forbidden");
    }

    #[tokio::test]
    async fn partial_content_is_terminal() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/storage/upload/b-1/"))
                .times(1)
                .respond_with(status_code(206).body(r#"{"upload_id":"u-1"}"#)),
        );

        let client = RetryingClient::new("tok", RetryPolicy::default()).unwrap();
        let uri = format!("http://{}/storage/upload/b-1/", server.addr());

        let reply = client.send(&uri, sample_payload).await;
        assert_eq!(reply.status, 206);
    }

    #[tokio::test]
    async fn multipart_fields_reach_the_wire() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/storage/upload/b-1/"),
                request::headers(contains(("content-range", "bytes 0-3/4"))),
                request::body(matches("user_id")),
                request::body(matches("data.bin")),
                request::body(matches("e2fc714c4727ee9395f324cd2e7f331f")),
            ])
            .respond_with(status_code(200).body("{}")),
        );

        let client = RetryingClient::new("tok", RetryPolicy::default()).unwrap();
        let uri = format!("http://{}/storage/upload/b-1/", server.addr());

        let reply = client.send(&uri, sample_payload).await;
        assert_eq!(reply.status, 200);
    }

    #[tokio::test]
    async fn etags_field_sent_when_present() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/storage/upload/b-1/"),
                request::body(matches(r"etags\[\]")),
                request::body(matches("1,aaa,2,bbb")),
            ])
            .respond_with(status_code(200).body("{}")),
        );

        let client = RetryingClient::new("tok", RetryPolicy::default()).unwrap();
        let uri = format!("http://{}/storage/upload/b-1/", server.addr());

        let reply = client
            .send(&uri, || ChunkPayload {
                etags: Some("1,aaa,2,bbb".into()),
                ..sample_payload()
            })
            .await;
        assert_eq!(reply.status, 200);
    }

    #[tokio::test]
    async fn connection_failure_counts_as_transient() {
        // Nothing listens on this port; every attempt fails at the transport
        // level and the budget runs out.
        let policy = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        }
        .immediate();
        let client = RetryingClient::new("tok", policy).unwrap();

        let reply = client
            .send("http://127.0.0.1:9/storage/upload/b-1/", sample_payload)
            .await;
        assert_eq!(reply.status, 500);
        assert!(reply.body.contains("transport error"), "{}", reply.body);
    }

    #[tokio::test]
    async fn post_json_once_returns_reply() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/storage/login/"))
                .respond_with(status_code(200).body(r#"{"token":"t","id":"u-1"}"#)),
        );

        let uri = format!("http://{}/storage/login/", server.addr());
        let reply = post_json_once(&uri, &serde_json::json!({"login": "a"})).await;
        assert_eq!(reply.status, 200);
        assert!(reply.body.contains("t"));
    }

    #[tokio::test]
    async fn post_json_once_maps_transport_failure_to_400() {
        let reply = post_json_once(
            "http://127.0.0.1:9/storage/login/",
            &serde_json::json!({"login": "a"}),
        )
        .await;
        assert_eq!(reply.status, 400);
        assert!(reply.body.contains("request failed"));
    }

    #[test]
    fn reply_parse_json() {
        let reply = Reply {
            status: 200,
            body: r#"{"guid":"g-9"}"#.into(),
        };
        let ack: skiff_protocol::ChunkAck = reply.parse().unwrap();
        assert_eq!(ack.guid, "g-9");
    }

    #[test]
    fn invalid_token_rejected_at_build() {
        let err = RetryingClient::new("bad\ntoken", RetryPolicy::default()).unwrap_err();
        assert!(matches!(err, TransportError::InvalidToken));
    }
}

//! HTTP executor backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use stockroom_core::PendingOperation;

use crate::error::ExecutorError;
use crate::executor::{plan, Executor};

/// Header carrying the record's tenant.
pub const HOTEL_ID_HEADER: &str = "x-hotel-id";

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Configuration for [`HttpExecutor`].
#[derive(Debug, Clone)]
pub struct HttpExecutorConfig {
    /// Prefix joined with each record's endpoint.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Sent as `Authorization: Bearer <token>` when set.
    pub bearer_token: Option<String>,

    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl Default for HttpExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            timeout: Duration::from_secs(30),
            bearer_token: None,
            headers: Vec::new(),
        }
    }
}

impl HttpExecutorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Replays operations as JSON requests against a base URL.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExecutor {
    /// Build an executor. Fails if a header or the token is not a valid
    /// header value.
    pub fn new(config: HttpExecutorConfig) -> Result<Self, ExecutorError> {
        let mut headers = HeaderMap::new();

        if let Some(token) = &config.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ExecutorError::Config(format!("bearer token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ExecutorError::Config(format!("header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ExecutorError::Config(format!("header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ExecutorError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL for an endpoint. Absolute endpoints are used as-is.
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, op: &PendingOperation) -> Result<Value, ExecutorError> {
        let plan = plan(op)?;
        let url = self.url_for(plan.endpoint);

        let mut request = self.client.request(plan.method.clone(), &url);
        if let Some(hotel_id) = &op.hotel_id {
            request = request.header(HOTEL_ID_HEADER, hotel_id.as_str());
        }
        if let Some(body) = plan.body {
            request = request.json(body);
        }

        tracing::debug!(id = %op.id, method = %plan.method, url = %url, "replaying operation");

        let response = request
            .send()
            .await
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ExecutorError::Status {
                status: status.as_u16(),
                body: truncate(text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ExecutorError::Decode(e.to_string()))
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stockroom_core::{NewOperation, OperationId, OperationType};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer it with `status` and `body`, and hand
    /// back the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        buf.len() >= head_end + 4 + content_length
    }

    fn op(new: NewOperation) -> PendingOperation {
        new.into_pending(OperationId::new("1-00000000"), "t".into())
    }

    #[test]
    fn test_url_joining() {
        let executor = HttpExecutor::new(HttpExecutorConfig::new("http://api.local/")).unwrap();
        assert_eq!(executor.url_for("/api/products"), "http://api.local/api/products");
        assert_eq!(executor.url_for("api/products"), "http://api.local/api/products");
        assert_eq!(
            executor.url_for("https://other.local/x"),
            "https://other.local/x"
        );
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let config = HttpExecutorConfig::new("http://api.local").header("bad header", "x");
        assert!(matches!(
            HttpExecutor::new(config),
            Err(ExecutorError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_create_sends_body_and_headers() {
        let (base, server) = serve_once("201 Created", r#"{"id": 42}"#).await;
        let executor = HttpExecutor::new(HttpExecutorConfig::new(base).bearer_token("secret")).unwrap();

        let result = executor
            .execute(&op(NewOperation::new(OperationType::Create, "/api/products")
                .data(json!({"name": "soap"}))
                .hotel_id("h-9")))
            .await
            .unwrap();
        assert_eq!(result, json!({"id": 42}));

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /api/products HTTP/1.1"));
        assert!(lower.contains("authorization: bearer secret"));
        assert!(lower.contains("x-hotel-id: h-9"));
        assert!(lower.contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"name":"soap"}"#));
    }

    #[tokio::test]
    async fn test_delete_sends_no_body() {
        let (base, server) = serve_once("204 No Content", "").await;
        let executor = HttpExecutor::new(HttpExecutorConfig::new(base)).unwrap();

        let result = executor
            .execute(&op(NewOperation::new(OperationType::Delete, "/api/products/3")
                .data(json!({"ignored": true}))))
            .await
            .unwrap();
        assert_eq!(result, Value::Null);

        let request = server.await.unwrap();
        assert!(request.starts_with("DELETE /api/products/3 HTTP/1.1"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (base, server) = serve_once("422 Unprocessable Entity", r#"{"error":"bad qty"}"#).await;
        let executor = HttpExecutor::new(HttpExecutorConfig::new(base)).unwrap();

        let err = executor
            .execute(&op(NewOperation::new(OperationType::Update, "/api/products/3")
                .data(json!({"qty": -1}))))
            .await
            .unwrap_err();
        server.await.unwrap();

        match err {
            ExecutorError::Status { status, body } => {
                assert_eq!(status, 422);
                assert!(body.contains("bad qty"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let executor = HttpExecutor::new(
            HttpExecutorConfig::new(format!("http://{}", addr)).timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let err = executor
            .execute(&op(NewOperation::new(OperationType::Create, "/api/products")))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Transport(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(body);
        assert!(cut.len() <= MAX_ERROR_BODY);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}

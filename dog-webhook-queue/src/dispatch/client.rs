use std::error::Error as _;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::{QueueResult, QueueError, DeliveryError};

/// One webhook POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    pub target: String,
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: String,
}

impl WebhookRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What the target answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport used for webhook delivery.
///
/// `Err` means no response was received at all; any response, including
/// non-2xx, is `Ok`.
#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn post(&self, request: WebhookRequest) -> Result<WebhookResponse, DeliveryError>;
}

/// reqwest-backed webhook client with a per-request timeout
#[derive(Clone)]
pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    pub fn new(timeout: Duration) -> QueueResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::Configuration(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    async fn post(&self, request: WebhookRequest) -> Result<WebhookResponse, DeliveryError> {
        let mut builder = self
            .client
            .post(&request.target)
            .header(CONTENT_TYPE, "application/json")
            .body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();

        // success bodies are never recorded
        let body = if status.is_success() {
            String::new()
        } else {
            response
                .text()
                .await
                .unwrap_or_else(|e| format!("unreadable response body: {e}"))
        };

        Ok(WebhookResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn transport_error(err: reqwest::Error) -> DeliveryError {
    let mut causes = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }

    let msg = if err.is_timeout() {
        format!("timed out: {err}")
    } else {
        err.to_string()
    };

    DeliveryError::Transport {
        msg,
        trace: (!causes.is_empty()).then(|| causes.join("\ncaused by: ")),
    }
}

use std::env;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::Stream;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_CONNECT_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse;
use crate::types::ChatRequest;

/// Endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn/v1/";
/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "THINKSTREAM_API_KEY";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// The raw lines of one response body.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Something that can turn a request into the lines of a streamed response.
///
/// [`ChatClient`] is the HTTP implementation; tests substitute scripted transports.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response body as lines.
    ///
    /// Errors returned here mean no response body was obtained.  Failures while reading the body
    /// are yielded as `Err` items of the stream.
    async fn open(&self, request: &ChatRequest) -> Result<LineStream>;
}

/// Client for OpenAI-compatible chat-completion endpoints.
#[derive(Debug, Clone)]
pub struct ChatClient {
    api_key: String,
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new client against the default endpoint.
    ///
    /// The API key can be provided directly or read from the `THINKSTREAM_API_KEY` environment
    /// variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key.filter(|key| !key.trim().is_empty()) {
            Some(key) => key,
            None => env::var(API_KEY_ENV).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_ENV} environment variable not set"
                ))
            })?,
        };
        let base_url = parse_base_url(base_url.unwrap_or(DEFAULT_BASE_URL))?;

        // Only connecting is bounded; a long reasoning stream must not be cut off.
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
        })
    }

    /// The endpoint requests are sent to.
    pub fn completions_url(&self) -> Result<Url> {
        Ok(self.base_url.join("chat/completions")?)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
                Error::authentication("API key contains characters not valid in a header")
            })?;
        bearer.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };
        let (error_type, message) = parse_error_body(&body);
        let message = message.unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                body.trim().to_string()
            }
        });
        error_for_status(status, error_type, message, retry_after)
    }
}

#[async_trait::async_trait]
impl Transport for ChatClient {
    async fn open(&self, request: &ChatRequest) -> Result<LineStream> {
        CLIENT_REQUESTS.click();
        let started = Instant::now();
        let url = self.completions_url()?;
        let headers = self.default_headers()?;

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;
        CLIENT_CONNECT_DURATION.add(started.elapsed().as_secs_f64());
        tracing::debug!(
            status = %response.status(),
            model = %request.model,
            "response headers received"
        );

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        Ok(Box::pin(sse::lines(response.bytes_stream())))
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    // `Url::join` drops the last path segment unless the base ends in a slash.
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Extract `(type, message)` from the error bodies OpenAI-compatible endpoints send.
///
/// Understands `{"error": {"type", "message"}}` and the flat `{"code", "message"}` form.
fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
        code: Option<serde_json::Value>,
        message: Option<String>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
    }

    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse {
            error: Some(detail),
            ..
        }) => (detail.error_type, detail.message),
        Ok(ErrorResponse { code, message, .. }) => {
            let code = code.map(|code| match code {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
            (code, message)
        }
        Err(_) => (None, None),
    }
}

fn error_for_status(
    status: StatusCode,
    error_type: Option<String>,
    message: String,
    retry_after: Option<u64>,
) -> Error {
    match status.as_u16() {
        400 | 422 => Error::bad_request(message),
        401 => Error::authentication(message),
        403 => Error::permission(message),
        404 => Error::not_found(message),
        429 => Error::rate_limit(message, retry_after),
        500 => Error::internal_server(message),
        502..=504 => Error::service_unavailable(message, retry_after),
        code => Error::api(code, error_type, message),
    }
}

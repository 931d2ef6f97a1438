//! HTTP client utilities: client construction, request logging and
//! translation of the server's error envelope.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::client::{ClientError, ServerError};
use crate::options::TransportOptions;

/// Build a configured HTTP client from transport options.
///
/// This applies timeouts, proxies, the API key and any extra headers as
/// default headers, so individual requests need no further setup.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ClientError::Config(format!("invalid proxy {proxy_url:?}: {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder = builder.default_headers(default_headers(transport_options)?);

    Ok(builder.build()?)
}

fn default_headers(transport_options: &TransportOptions) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();

    if let Some(api_key) = &transport_options.api_key {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|_| ClientError::Config("Invalid API key".to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    if let Some(extra) = &transport_options.extra_headers {
        for (key, value) in extra {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| ClientError::Config(format!("Invalid header name {key:?}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::Config(format!("Invalid value for header {key:?}")))?;
            headers.insert(name, value);
        }
    }

    Ok(headers)
}

/// Request body helpers that log what is sent.
pub trait RequestBuilderExt {
    /// Serialize `body` as the JSON request body, logging it at trace level.
    fn json_logged<T: Serialize + ?Sized>(self, body: &T) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn json_logged<T: Serialize + ?Sized>(self, body: &T) -> Self {
        if tracing::enabled!(tracing::Level::TRACE) {
            if let Ok(text) = serde_json::to_string(body) {
                tracing::trace!(body = %text, "request body");
            }
        }
        self.json(body)
    }
}

/// Response body helpers that log what is received.
#[async_trait]
pub trait ResponseExt: Sized {
    /// Read the whole body as text, logging it at trace level.
    async fn text_logged(self) -> Result<String, ClientError>;

    /// Read the whole body and decode it as JSON.
    async fn json_logged<T: DeserializeOwned + Send>(self) -> Result<T, ClientError>;
}

#[async_trait]
impl ResponseExt for reqwest::Response {
    async fn text_logged(self) -> Result<String, ClientError> {
        let status = self.status();
        let text = self.text().await?;
        tracing::trace!(%status, body = %text, "response body");
        Ok(text)
    }

    async fn json_logged<T: DeserializeOwned + Send>(self) -> Result<T, ClientError> {
        let text = self.text_logged().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Pass a successful response through, or turn a failed one into an error.
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    tracing::debug!(%status, url = %response.url(), "response");

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text_logged().await.unwrap_or_default();
    Err(handle_error_response(status, &body))
}

/// Translate an unsuccessful response body into a typed error.
///
/// The server reports failures as
/// `{"error": {"code": 400, "message": "...", "type": "invalid_request_error"}}`.
pub fn handle_error_response(status: StatusCode, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = envelope.error.code.unwrap_or(i32::from(status.as_u16()));
            tracing::warn!(
                %status,
                code,
                kind = %envelope.error.kind,
                message = %envelope.error.message,
                "server error"
            );
            ClientError::Server(ServerError {
                status,
                code,
                message: envelope.error.message,
                kind: envelope.error.kind,
            })
        }
        Err(_) => ClientError::Status {
            status,
            body: body.to_string(),
        },
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    /// Falls back to the HTTP status when absent.
    code: Option<i32>,
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
}

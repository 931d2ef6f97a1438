//! The server client and its error types.

use std::pin::Pin;

use futures::Stream;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::completion::{CompletionRequest, CompletionResponse};
use crate::api::embedding::{EmbeddingRequest, EmbeddingResponse, RerankRequest, RerankResponse};
use crate::api::openai::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, EmbeddingsRequest,
    EmbeddingsResponse, EncodedEmbeddingsRequest, EncodingFormat, ModelList, OaiCompletionChunk,
    OaiCompletionRequest, OaiCompletionResponse,
};
use crate::api::server::{LoraAdapter, LoraAdapterScale, Metrics, Props, PropsUpdate, PropsUpdateResponse};
use crate::api::tokenize::{
    ApplyTemplateRequest, ApplyTemplateResponse, DetokenizeRequest, DetokenizeResponse,
    TokenWithPiece, TokenizeBody, TokenizeRequest, TokenizeResponse,
};
use crate::api::Streamed;
use crate::http::{build_http_client, check_status, handle_error_response, RequestBuilderExt, ResponseExt};
use crate::model::Health;
use crate::options::TransportOptions;
use crate::sse::SSEResponseExt;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Stream is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Server error: {0}")]
    Server(ServerError),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Invalid base64 embedding: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid embedding: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// The server's error envelope, if this error carries one.
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            ClientError::Server(server) => Some(server),
            _ => None,
        }
    }
}

/// Error reported by the server in its JSON error envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message} (code {code})")]
pub struct ServerError {
    /// HTTP status of the response
    pub status: StatusCode,

    /// Machine-readable code from the envelope, usually the HTTP status
    pub code: i32,

    pub message: String,

    /// Error category, e.g. `invalid_request_error` or `not_supported_error`
    pub kind: String,
}

/// Boxed stream of decoded events returned by the streaming operations.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = Result<T, ClientError>> + Send>>;

/// Client for a llama.cpp server.
///
/// One HTTP connection pool is shared by every call and by clones.
///
/// # Example
/// ```no_run
/// use futures::StreamExt;
/// use llama_server_client::api::completion::CompletionRequest;
/// use llama_server_client::LlamaClient;
///
/// # async fn run() -> Result<(), llama_server_client::ClientError> {
/// let client = LlamaClient::from_env()?;
/// let request = CompletionRequest::new("Once upon a time").with_n_predict(64);
///
/// let mut stream = client.completion_stream(&request).await?;
/// while let Some(chunk) = stream.next().await {
///     print!("{}", chunk?.content);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LlamaClient {
    http: reqwest::Client,
    transport_options: TransportOptions,
}

impl LlamaClient {
    /// Create a client from transport options.
    pub fn new(transport_options: TransportOptions) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_http_client(&transport_options)?,
            transport_options,
        })
    }

    /// Create a client configured from the environment, see
    /// [`TransportOptions::from_env`].
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(TransportOptions::from_env()?)
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.transport_options
    }

    async fn get<T: DeserializeOwned + Send>(&self, path: &str) -> Result<T, ClientError> {
        tracing::debug!(path, "GET");
        let response = self.http.get(self.transport_options.endpoint(path)).send().await?;
        check_status(response).await?.json_logged().await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Send,
    {
        check_status(self.send_post(path, body).await?)
            .await?
            .json_logged()
            .await
    }

    async fn post_stream<B, T>(&self, path: &str, body: &B) -> Result<EventStream<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Send + 'static,
    {
        let response = check_status(self.send_post(path, body).await?).await?;
        Ok(Box::pin(response.sse_events::<T>()))
    }

    async fn send_post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ClientError> {
        tracing::debug!(path, "POST");
        Ok(self
            .http
            .post(self.transport_options.endpoint(path))
            .json_logged(body)
            .send()
            .await?)
    }

    /// `GET /health`
    ///
    /// A 503 means the model is still loading and maps to
    /// [`Health::LoadingModel`] rather than an error.
    pub async fn health(&self) -> Result<Health, ClientError> {
        #[derive(Deserialize)]
        struct HealthBody {
            status: String,
        }

        tracing::debug!(path = "/health", "GET");
        let response = self.http.get(self.transport_options.endpoint("/health")).send().await?;
        let status = response.status();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Ok(Health::LoadingModel);
        }
        if !status.is_success() {
            let body = response.text_logged().await.unwrap_or_default();
            return Err(handle_error_response(status, &body));
        }

        let body: HealthBody = response.json_logged().await?;
        Ok(Health::from_status(&body.status))
    }

    /// `POST /completion` with `stream: false`.
    pub async fn completion(&self, request: &CompletionRequest) -> Result<CompletionResponse, ClientError> {
        self.post("/completion", &Streamed::new(request, false)).await
    }

    /// `POST /completion` with `stream: true`. Each event carries the newly
    /// generated text; the last one has `stop == true`.
    pub async fn completion_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<EventStream<CompletionResponse>, ClientError> {
        self.post_stream("/completion", &Streamed::new(request, true)).await
    }

    /// `POST /tokenize` with `with_pieces: false`.
    pub async fn tokenize(&self, request: &TokenizeRequest) -> Result<Vec<i32>, ClientError> {
        let body = TokenizeBody {
            request,
            with_pieces: false,
        };
        let response: TokenizeResponse<i32> = self.post("/tokenize", &body).await?;
        Ok(response.tokens)
    }

    /// `POST /tokenize` with `with_pieces: true`.
    pub async fn tokenize_with_pieces(
        &self,
        request: &TokenizeRequest,
    ) -> Result<Vec<TokenWithPiece>, ClientError> {
        let body = TokenizeBody {
            request,
            with_pieces: true,
        };
        let response: TokenizeResponse<TokenWithPiece> = self.post("/tokenize", &body).await?;
        Ok(response.tokens)
    }

    /// `POST /detokenize`
    pub async fn detokenize(&self, request: &DetokenizeRequest) -> Result<String, ClientError> {
        let response: DetokenizeResponse = self.post("/detokenize", request).await?;
        Ok(response.content)
    }

    /// `POST /apply-template`
    pub async fn apply_template(
        &self,
        request: &ApplyTemplateRequest,
    ) -> Result<ApplyTemplateResponse, ClientError> {
        self.post("/apply-template", request).await
    }

    /// `POST /embedding`
    pub async fn embedding(&self, request: &EmbeddingRequest) -> Result<Vec<EmbeddingResponse>, ClientError> {
        self.post("/embedding", request).await
    }

    /// `POST /reranking`
    pub async fn rerank(&self, request: &RerankRequest) -> Result<RerankResponse, ClientError> {
        self.post("/reranking", request).await
    }

    /// `GET /props`
    pub async fn props(&self) -> Result<Props, ClientError> {
        self.get("/props").await
    }

    /// `POST /props`. Returns the server's `success` flag.
    pub async fn set_props(&self, update: &PropsUpdate) -> Result<bool, ClientError> {
        let response: PropsUpdateResponse = self.post("/props", update).await?;
        Ok(response.success)
    }

    /// `GET /metrics`
    pub async fn metrics(&self) -> Result<Metrics, ClientError> {
        tracing::debug!(path = "/metrics", "GET");
        let response = self.http.get(self.transport_options.endpoint("/metrics")).send().await?;
        let text = check_status(response).await?.text_logged().await?;
        Ok(Metrics::new(text))
    }

    /// `GET /lora-adapters`
    pub async fn lora_adapters(&self) -> Result<Vec<LoraAdapter>, ClientError> {
        self.get("/lora-adapters").await
    }

    /// `POST /lora-adapters`. Adapters missing from `adapters` are disabled.
    pub async fn set_lora_adapters(&self, adapters: &[LoraAdapterScale]) -> Result<(), ClientError> {
        // The reply body differs between server versions; only the status matters.
        check_status(self.send_post("/lora-adapters", adapters).await?).await?;
        Ok(())
    }

    /// `GET /v1/models`
    pub async fn models(&self) -> Result<ModelList, ClientError> {
        self.get("/v1/models").await
    }

    /// `POST /v1/completions` with `stream: false`.
    pub async fn oai_completion(
        &self,
        request: &OaiCompletionRequest,
    ) -> Result<OaiCompletionResponse, ClientError> {
        self.post("/v1/completions", &Streamed::new(request, false)).await
    }

    /// `POST /v1/completions` with `stream: true`.
    pub async fn oai_completion_stream(
        &self,
        request: &OaiCompletionRequest,
    ) -> Result<EventStream<OaiCompletionChunk>, ClientError> {
        self.post_stream("/v1/completions", &Streamed::new(request, true)).await
    }

    /// `POST /v1/chat/completions` with `stream: false`.
    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ClientError> {
        self.post("/v1/chat/completions", &Streamed::new(request, false)).await
    }

    /// `POST /v1/chat/completions` with `stream: true`.
    pub async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<EventStream<ChatCompletionChunk>, ClientError> {
        self.post_stream("/v1/chat/completions", &Streamed::new(request, true)).await
    }

    /// `POST /v1/embeddings` with `encoding_format: "float"`.
    pub async fn embeddings_float(
        &self,
        request: &EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse<Vec<f32>>, ClientError> {
        let body = EncodedEmbeddingsRequest {
            request,
            encoding_format: EncodingFormat::Float,
        };
        self.post("/v1/embeddings", &body).await
    }

    /// `POST /v1/embeddings` with `encoding_format: "base64"`.
    pub async fn embeddings_base64(
        &self,
        request: &EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse<String>, ClientError> {
        let body = EncodedEmbeddingsRequest {
            request,
            encoding_format: EncodingFormat::Base64,
        };
        self.post("/v1/embeddings", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<LlamaClient>();
    }

    #[test]
    fn test_server_error_display() {
        let err = ClientError::Server(ServerError {
            status: StatusCode::BAD_REQUEST,
            code: 400,
            message: "tools param requires --jinja flag".to_string(),
            kind: "invalid_request_error".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Server error: invalid_request_error: tools param requires --jinja flag (code 400)"
        );
        assert!(err.server_error().unwrap().message.contains("--jinja"));
    }

    #[test]
    fn test_new_applies_options() {
        let client = LlamaClient::new(TransportOptions::new("http://10.0.0.2:8080")).unwrap();
        assert_eq!(client.transport_options().base_url, "http://10.0.0.2:8080");
    }
}

//! OpenAI-compatible endpoints: `/v1/models`, `/v1/completions`,
//! `/v1/chat/completions` and `/v1/embeddings`.
//! See: <https://platform.openai.com/docs/api-reference/chat>

use base64::Engine;
use nonempty::NonEmpty;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::client::ClientError;
use crate::model::{FinishReason, Message, Role, Timings};

// --- Models ---

/// Response of `GET /v1/models`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub owned_by: String,
    pub meta: Option<ModelMeta>,
}

/// GGUF metadata of the loaded model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModelMeta {
    pub vocab_type: i32,
    pub n_vocab: i64,
    pub n_ctx_train: i64,
    pub n_embd: i64,
    pub n_params: i64,
    pub size: i64,
}

/// Token accounting of an OpenAI-style response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// --- Completions ---

/// Request for `POST /v1/completions`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OaiCompletionRequest {
    /// Ignored by llama.cpp, which serves the model it was started with.
    pub model: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
    pub seed: Option<i64>,
    pub n: Option<u32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub echo: Option<bool>,
    pub logprobs: Option<u32>,
}

impl OaiCompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    option_setters! {
        with_model => model: String,
        with_max_tokens => max_tokens: u32,
        with_temperature => temperature: f32,
        with_top_p => top_p: f32,
        with_stop => stop: Vec<String>,
        with_seed => seed: i64,
        with_n => n: u32,
        with_presence_penalty => presence_penalty: f32,
        with_frequency_penalty => frequency_penalty: f32,
        with_echo => echo: bool,
        with_logprobs => logprobs: u32,
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub index: u32,
    pub logprobs: Option<Value>,
    pub finish_reason: Option<FinishReason>,
}

/// Response of a non-streamed `POST /v1/completions`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OaiCompletionResponse {
    pub id: Option<String>,
    pub object: Option<String>,
    #[serde(default)]
    pub created: i64,
    pub model: Option<String>,
    pub choices: NonEmpty<CompletionChoice>,
    pub usage: Option<Usage>,
    pub timings: Option<Timings>,
}

impl OaiCompletionResponse {
    pub fn first_choice(&self) -> &CompletionChoice {
        self.choices.first()
    }
}

/// One event of a streamed `POST /v1/completions`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OaiCompletionChunk {
    pub id: Option<String>,
    pub object: Option<String>,
    #[serde(default)]
    pub created: i64,
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    pub usage: Option<Usage>,
    pub timings: Option<Timings>,
}

impl OaiCompletionChunk {
    pub fn first_choice(&self) -> Option<&CompletionChoice> {
        self.choices.first()
    }
}

// --- Chat completions ---

/// Request for `POST /v1/chat/completions`.
///
/// # Example
/// ```rust
/// use llama_server_client::api::openai::{ChatCompletionRequest, ResponseFormat};
/// use llama_server_client::model::Message;
///
/// let request = ChatCompletionRequest::new(vec![
///     Message::system("Write an answer to the user's message."),
///     Message::user("Nice to meet you!"),
/// ])
/// .with_response_format(ResponseFormat::Text)
/// .with_max_completion_tokens(128);
/// assert_eq!(request.messages.len(), 2);
/// ```
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub seed: Option<i64>,
    pub response_format: Option<ResponseFormat>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub max_completion_tokens: Option<u32>,
    pub n: Option<u32>,
    pub logprobs: Option<bool>,
    pub top_logprobs: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub top_p: Option<f32>,
    /// Requires `--jinja` on the server.
    pub tools: Option<Vec<Tool>>,
    pub tool_choice: Option<ToolChoice>,
}

impl ChatCompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    option_setters! {
        with_model => model: String,
        with_temperature => temperature: f32,
        with_seed => seed: i64,
        with_response_format => response_format: ResponseFormat,
        with_frequency_penalty => frequency_penalty: f32,
        with_presence_penalty => presence_penalty: f32,
        with_max_completion_tokens => max_completion_tokens: u32,
        with_n => n: u32,
        with_logprobs => logprobs: bool,
        with_top_logprobs => top_logprobs: u32,
        with_stop => stop: Vec<String>,
        with_top_p => top_p: f32,
        with_tools => tools: Vec<Tool>,
        with_tool_choice => tool_choice: ToolChoice,
    }
}

/// Output format constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    /// Any JSON object, optionally constrained by `schema`.
    JsonObject {
        #[serde(skip_serializing_if = "Option::is_none")]
        schema: Option<Value>,
    },
    JsonSchema { json_schema: JsonSchemaFormat },
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub schema: Value,
    pub strict: Option<bool>,
}

impl ResponseFormat {
    /// Constrain the output to the JSON schema of `T`.
    pub fn json_schema_for<T: JsonSchema>() -> Result<Self, ClientError> {
        let schema = serde_json::to_value(schemars::schema_for!(T))?;
        Ok(ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: T::schema_name().to_string(),
                schema,
                strict: Some(true),
            },
        })
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

impl Tool {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: Some(description.into()),
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    pub finish_reason: Option<FinishReason>,
    pub logprobs: Option<Value>,
}

/// Response of a non-streamed `POST /v1/chat/completions`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub object: Option<String>,
    #[serde(default)]
    pub created: i64,
    pub model: Option<String>,
    pub system_fingerprint: Option<String>,
    pub choices: NonEmpty<ChatChoice>,
    pub usage: Option<Usage>,
    pub timings: Option<Timings>,
}

impl ChatCompletionResponse {
    pub fn first_choice(&self) -> &ChatChoice {
        self.choices.first()
    }
}

/// One event of a streamed `POST /v1/chat/completions`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: Option<String>,
    pub object: Option<String>,
    #[serde(default)]
    pub created: i64,
    pub model: Option<String>,
    pub system_fingerprint: Option<String>,
    /// Empty on the trailing usage-only chunk.
    #[serde(default)]
    pub choices: Vec<ChatChunkChoice>,
    pub usage: Option<Usage>,
    pub timings: Option<Timings>,
}

impl ChatCompletionChunk {
    pub fn first_choice(&self) -> Option<&ChatChunkChoice> {
        self.choices.first()
    }

    /// New content text of the first choice, if any.
    pub fn delta_content(&self) -> Option<&str> {
        self.first_choice()?.delta.content.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChatDelta,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatDelta {
    pub role: Option<Role>,
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Fragment of a tool call; fragments with the same `index` concatenate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: u32,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub function: Option<FunctionCallDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FunctionCallDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

// --- Embeddings ---

/// Request for `POST /v1/embeddings`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingsRequest {
    pub input: EmbeddingInput,
    pub model: Option<String>,
}

impl EmbeddingsRequest {
    pub fn new(input: impl Into<EmbeddingInput>) -> Self {
        Self {
            input: input.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl From<&str> for EmbeddingInput {
    fn from(input: &str) -> Self {
        EmbeddingInput::Single(input.to_string())
    }
}

impl From<String> for EmbeddingInput {
    fn from(input: String) -> Self {
        EmbeddingInput::Single(input)
    }
}

impl From<Vec<String>> for EmbeddingInput {
    fn from(inputs: Vec<String>) -> Self {
        EmbeddingInput::Batch(inputs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EncodingFormat {
    Float,
    Base64,
}

/// Embeddings body with `encoding_format` chosen by the operation.
#[derive(Debug, Serialize)]
pub(crate) struct EncodedEmbeddingsRequest<'a> {
    #[serde(flatten)]
    pub request: &'a EmbeddingsRequest,
    pub encoding_format: EncodingFormat,
}

/// Response of `POST /v1/embeddings`. `E` is `Vec<f32>` for float encoding
/// and `String` for base64 encoding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbeddingsResponse<E> {
    #[serde(default)]
    pub object: String,
    pub data: Vec<EmbeddingData<E>>,
    pub model: Option<String>,
    pub usage: Option<EmbeddingsUsage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbeddingData<E> {
    #[serde(default)]
    pub object: String,
    pub embedding: E,
    pub index: usize,
}

impl EmbeddingData<String> {
    /// Decode the base64 payload into floats.
    pub fn decode(&self) -> Result<Vec<f32>, ClientError> {
        decode_base64_embedding(&self.embedding)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EmbeddingsUsage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

/// Decode a base64 embedding: little-endian `f32` values, four bytes each.
pub fn decode_base64_embedding(encoded: &str) -> Result<Vec<f32>, ClientError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    if bytes.len() % 4 != 0 {
        return Err(ClientError::Embedding(format!(
            "decoded length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

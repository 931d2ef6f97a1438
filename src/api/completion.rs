//! Native completion endpoint, `POST /completion`.
//! See: <https://github.com/ggml-org/llama.cpp/tree/master/tools/server#post-completion-given-a-prompt-it-returns-the-predicted-completion>

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::api::server::LoraAdapterScale;
use crate::model::{ImageData, Timings};

/// Parameters of a native completion.
///
/// Only `prompt` is required; every unset field is left out of the request
/// body so the server applies its own defaults.
///
/// # Example
/// ```rust
/// use llama_server_client::api::completion::CompletionRequest;
///
/// let request = CompletionRequest::new("Building a website can be done in 10 steps:")
///     .with_n_predict(128)
///     .with_temperature(0.2)
///     .with_stop(vec!["\n\n".to_string()]);
/// assert_eq!(request.n_predict, Some(128));
/// ```
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: Option<f32>,
    pub dynatemp_range: Option<f32>,
    pub dynatemp_exponent: Option<f32>,
    pub top_k: Option<i32>,
    pub top_p: Option<f32>,
    pub min_p: Option<f32>,
    /// Maximum number of tokens to predict, `-1` for unbounded.
    pub n_predict: Option<i32>,
    pub n_indent: Option<i32>,
    pub n_keep: Option<i32>,
    pub stop: Option<Vec<String>>,
    pub typical_p: Option<f32>,
    pub repeat_penalty: Option<f32>,
    pub repeat_last_n: Option<i32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub dry_multiplier: Option<f32>,
    pub dry_base: Option<f32>,
    pub dry_allowed_length: Option<i32>,
    pub dry_penalty_last_n: Option<i32>,
    pub dry_sequence_breakers: Option<Vec<String>>,
    pub xtc_probability: Option<f32>,
    pub xtc_threshold: Option<f32>,
    /// 0 disables, 1 is Mirostat, 2 is Mirostat 2.0.
    pub mirostat: Option<i32>,
    pub mirostat_tau: Option<f32>,
    pub mirostat_eta: Option<f32>,
    /// GBNF grammar constraining the output.
    pub grammar: Option<String>,
    pub json_schema: Option<Value>,
    pub seed: Option<i64>,
    pub ignore_eos: Option<bool>,
    pub n_probs: Option<i32>,
    pub min_keep: Option<i32>,
    pub t_max_predict_ms: Option<i32>,
    pub image_data: Option<Vec<ImageData>>,
    pub id_slot: Option<i32>,
    pub cache_prompt: Option<bool>,
    pub return_tokens: Option<bool>,
    pub samplers: Option<Vec<String>>,
    pub timings_per_token: Option<bool>,
    pub post_sampling_probs: Option<bool>,
    pub response_fields: Option<Vec<String>>,
    pub lora: Option<Vec<LoraAdapterScale>>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    option_setters! {
        with_temperature => temperature: f32,
        with_dynatemp_range => dynatemp_range: f32,
        with_dynatemp_exponent => dynatemp_exponent: f32,
        with_top_k => top_k: i32,
        with_top_p => top_p: f32,
        with_min_p => min_p: f32,
        with_n_predict => n_predict: i32,
        with_n_indent => n_indent: i32,
        with_n_keep => n_keep: i32,
        with_stop => stop: Vec<String>,
        with_typical_p => typical_p: f32,
        with_repeat_penalty => repeat_penalty: f32,
        with_repeat_last_n => repeat_last_n: i32,
        with_presence_penalty => presence_penalty: f32,
        with_frequency_penalty => frequency_penalty: f32,
        with_dry_multiplier => dry_multiplier: f32,
        with_dry_base => dry_base: f32,
        with_dry_allowed_length => dry_allowed_length: i32,
        with_dry_penalty_last_n => dry_penalty_last_n: i32,
        with_dry_sequence_breakers => dry_sequence_breakers: Vec<String>,
        with_xtc_probability => xtc_probability: f32,
        with_xtc_threshold => xtc_threshold: f32,
        with_mirostat => mirostat: i32,
        with_mirostat_tau => mirostat_tau: f32,
        with_mirostat_eta => mirostat_eta: f32,
        with_grammar => grammar: String,
        with_json_schema => json_schema: Value,
        with_seed => seed: i64,
        with_ignore_eos => ignore_eos: bool,
        with_n_probs => n_probs: i32,
        with_min_keep => min_keep: i32,
        with_t_max_predict_ms => t_max_predict_ms: i32,
        with_image_data => image_data: Vec<ImageData>,
        with_id_slot => id_slot: i32,
        with_cache_prompt => cache_prompt: bool,
        with_return_tokens => return_tokens: bool,
        with_samplers => samplers: Vec<String>,
        with_timings_per_token => timings_per_token: bool,
        with_post_sampling_probs => post_sampling_probs: bool,
        with_response_fields => response_fields: Vec<String>,
        with_lora => lora: Vec<LoraAdapterScale>,
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopType {
    /// Still generating (streamed chunks).
    None,
    /// End-of-sequence token.
    Eos,
    /// `n_predict` or the context limit was reached.
    Limit,
    /// A stop word matched.
    Word,
    #[serde(other)]
    Other,
}

/// Result of a native completion, or one chunk of a streamed one.
///
/// Streamed chunks carry the new text in `content`; the final chunk has
/// `stop == true` along with timings and settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tokens: Vec<i32>,
    #[serde(default)]
    pub stop: bool,
    pub id_slot: Option<i32>,
    pub index: Option<u32>,
    pub model: Option<String>,
    pub generation_settings: Option<Value>,
    pub stop_type: Option<StopType>,
    pub stopping_word: Option<String>,
    pub timings: Option<Timings>,
    pub tokens_cached: Option<u32>,
    pub tokens_evaluated: Option<u32>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(alias = "probs")]
    pub completion_probabilities: Option<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unset_fields_are_omitted() {
        let request = CompletionRequest::new("Hello").with_n_predict(16);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"prompt": "Hello", "n_predict": 16})
        );
    }

    #[test]
    fn test_lora_and_samplers_serialize() {
        let request = CompletionRequest::new("x")
            .with_samplers(vec!["top_k".into(), "temperature".into()])
            .with_lora(vec![LoraAdapterScale { id: 0, scale: 0.5 }]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["samplers"], json!(["top_k", "temperature"]));
        assert_eq!(value["lora"], json!([{"id": 0, "scale": 0.5}]));
    }

    #[test]
    fn test_final_chunk_deserializes() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "content": "",
            "id_slot": 0,
            "stop": true,
            "model": "gemma-3-1b",
            "tokens_predicted": 12,
            "tokens_evaluated": 20,
            "generation_settings": {"n_predict": 128},
            "stop_type": "eos",
            "stopping_word": "",
            "tokens_cached": 31,
            "timings": {"prompt_n": 20, "prompt_ms": 12.5, "predicted_n": 12, "predicted_ms": 80.0},
            "truncated": false
        }))
        .unwrap();

        assert!(response.stop);
        assert_eq!(response.stop_type, Some(StopType::Eos));
        assert_eq!(response.tokens_cached, Some(31));
        assert_eq!(response.timings.unwrap().predicted_n, 12.0);
        assert!(response.tokens.is_empty());
    }

    #[test]
    fn test_partial_chunk_deserializes() {
        let response: CompletionResponse =
            serde_json::from_str(r#"{"content":"Hel","stop":false,"id_slot":0}"#).unwrap();
        assert_eq!(response.content, "Hel");
        assert!(!response.stop);
        assert!(response.timings.is_none());
    }
}

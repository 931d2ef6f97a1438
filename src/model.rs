//! Data shapes shared by several endpoints.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single chat message, as accepted by `/apply-template` and
/// `/v1/chat/completions` and returned by the latter.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    /// Absent on assistant messages that only carry tool calls.
    pub content: Option<MessageContent>,

    /// Tool invocations requested by the assistant.
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Set on `Role::Tool` messages to answer a specific call.
    pub tool_call_id: Option<String>,

    /// Reasoning text emitted separately by thinking models.
    pub reasoning_content: Option<String>,
}

impl Message {
    fn text_message(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: None,
            reasoning_content: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text_message(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text_message(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text_message(Role::Assistant, content)
    }

    /// A user message made of several parts, e.g. text plus an image.
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            content: Some(MessageContent::Parts(parts)),
            ..Self::text_message(Role::User, String::new())
        }
    }

    /// The result of a tool call, fed back to the model.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::text_message(Role::Tool, content)
        }
    }

    /// Plain text content, if the message has any.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(MessageContent::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// Message content: either a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// An image given by URL; `data:image/png;base64,...` URLs are accepted
    /// by servers started with `--mmproj`.
    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,

    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,

    /// JSON-encoded arguments, exactly as generated by the model.
    pub arguments: String,
}

impl FunctionCall {
    /// Decode the arguments into `T`.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

fn function_kind() -> String {
    "function".to_string()
}

/// Base64 image attached to a native completion or embedding request.
/// Reference it from the prompt as `[img-<id>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub data: String,
    pub id: i32,
}

/// Prompt processing and generation timings reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub prompt_n: f64,
    pub prompt_ms: f64,
    pub prompt_per_token_ms: f64,
    pub prompt_per_second: f64,
    pub predicted_n: f64,
    pub predicted_ms: f64,
    pub predicted_per_token_ms: f64,
    pub predicted_per_second: f64,
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    #[serde(other)]
    Other,
}

/// Server state reported by `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Ok,
    LoadingModel,
    Error,
    Unknown,
}

impl Health {
    /// Map the `status` string of a health body.
    pub fn from_status(status: &str) -> Self {
        match status {
            "ok" => Health::Ok,
            "loading model" => Health::LoadingModel,
            "error" => Health::Error,
            _ => Health::Unknown,
        }
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Health::Ok => "ok",
            Health::LoadingModel => "loading model",
            Health::Error => "error",
            Health::Unknown => "unknown",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_message_omits_unset_fields() {
        let value = serde_json::to_value(Message::system("be brief")).unwrap();
        assert_eq!(value, json!({"role": "system", "content": "be brief"}));
    }

    #[test]
    fn test_multimodal_message_serializes_parts() {
        let msg = Message::user_parts(vec![
            ContentPart::text("Describe this image."),
            ContentPart::image_url("data:image/png;base64,AAAA"),
        ]);
        let value = serde_json::to_value(msg).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "Describe this image."},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                ]
            })
        );
    }

    #[test]
    fn test_tool_message_carries_call_id() {
        let value = serde_json::to_value(Message::tool("call_1", "12:00")).unwrap();
        assert_eq!(
            value,
            json!({"role": "tool", "content": "12:00", "tool_call_id": "call_1"})
        );
    }

    #[test]
    fn test_assistant_tool_call_without_content() {
        let msg: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "type": "function",
                "function": {"name": "get_time", "arguments": "{\"city\":\"London\"}"}
            }]
        }))
        .unwrap();

        assert_eq!(msg.text(), None);
        let call = &msg.tool_calls.unwrap()[0];
        assert_eq!(call.kind, "function");
        let args: serde_json::Value = call.function.parse_arguments().unwrap();
        assert_eq!(args["city"], "London");
    }

    #[test]
    fn test_unknown_finish_reason() {
        let reason: FinishReason = serde_json::from_str("\"tool_calls\"").unwrap();
        assert_eq!(reason, FinishReason::ToolCalls);
        let reason: FinishReason = serde_json::from_str("\"eos\"").unwrap();
        assert_eq!(reason, FinishReason::Other);
    }

    #[test]
    fn test_health_from_status() {
        assert_eq!(Health::from_status("ok"), Health::Ok);
        assert_eq!(Health::from_status("loading model"), Health::LoadingModel);
        assert_eq!(Health::from_status("error"), Health::Error);
        assert_eq!(Health::from_status("no slot available"), Health::Unknown);
    }
}

//! Tokenizer and chat template endpoints: `/tokenize`, `/detokenize`,
//! `/apply-template`.

use serde::{Deserialize, Serialize};

use crate::model::Message;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenizeRequest {
    pub content: String,
    /// Insert special tokens such as BOS.
    pub add_special: bool,
}

impl TokenizeRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            add_special: false,
        }
    }

    pub fn with_add_special(mut self, add_special: bool) -> Self {
        self.add_special = add_special;
        self
    }
}

/// Tokenize body with `with_pieces` chosen by the operation.
#[derive(Debug, Serialize)]
pub(crate) struct TokenizeBody<'a> {
    #[serde(flatten)]
    pub request: &'a TokenizeRequest,
    pub with_pieces: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenizeResponse<T> {
    pub tokens: Vec<T>,
}

/// A token id together with the text it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenWithPiece {
    pub id: i32,
    pub piece: Piece,
}

/// Token text. The server sends raw bytes when the piece is not valid UTF-8
/// on its own, e.g. half of a multi-byte character.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Piece {
    Text(String),
    Bytes(Vec<u8>),
}

impl Piece {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Piece::Text(text) => text.as_bytes(),
            Piece::Bytes(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetokenizeRequest {
    pub tokens: Vec<i32>,
}

impl DetokenizeRequest {
    pub fn new(tokens: Vec<i32>) -> Self {
        Self { tokens }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetokenizeResponse {
    pub content: String,
}

/// Render messages with the model's chat template without generating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyTemplateRequest {
    pub messages: Vec<Message>,
}

impl ApplyTemplateRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplyTemplateResponse {
    pub prompt: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokenize_body_sets_with_pieces() {
        let request = TokenizeRequest::new("Hello world!").with_add_special(true);
        let body = TokenizeBody {
            request: &request,
            with_pieces: true,
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"content": "Hello world!", "add_special": true, "with_pieces": true})
        );
    }

    #[test]
    fn test_pieces_can_be_text_or_bytes() {
        let response: TokenizeResponse<TokenWithPiece> = serde_json::from_value(json!({
            "tokens": [
                {"id": 198, "piece": "Hello"},
                {"id": 250, "piece": [226, 130]}
            ]
        }))
        .unwrap();

        assert_eq!(response.tokens[0].piece, Piece::Text("Hello".into()));
        assert_eq!(response.tokens[1].piece.as_bytes(), &[226u8, 130][..]);
    }
}

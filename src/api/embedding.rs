//! Native embedding and reranking endpoints: `/embedding`, `/reranking`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_with::skip_serializing_none;

use crate::model::ImageData;

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmbeddingRequest {
    pub content: String,
    pub image_data: Option<Vec<ImageData>>,
}

impl EmbeddingRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            image_data: None,
        }
    }

    pub fn with_image_data(mut self, image_data: Vec<ImageData>) -> Self {
        self.image_data = Some(image_data);
        self
    }
}

/// Embedding of one input.
///
/// With pooling the server returns a single vector; with `--pooling none`
/// it returns one vector per token. Both arrive here as a list of vectors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbeddingResponse {
    #[serde(default)]
    pub index: usize,
    #[serde(deserialize_with = "one_or_many_vectors")]
    pub embedding: Vec<Vec<f32>>,
}

fn one_or_many_vectors<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<f32>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Vectors {
        Many(Vec<Vec<f32>>),
        One(Vec<f32>),
    }

    Ok(match Vectors::deserialize(deserializer)? {
        Vectors::Many(many) => many,
        Vectors::One(one) => vec![one],
    })
}

/// Score `documents` against `query`. Needs a reranking model and
/// `--reranking` on the server.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<String>,
    pub top_n: Option<usize>,
}

impl RerankRequest {
    pub fn new(query: impl Into<String>, documents: Vec<String>) -> Self {
        Self {
            query: query.into(),
            documents,
            top_n: None,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RerankResponse {
    pub model: Option<String>,
    pub object: Option<String>,
    pub usage: Option<RerankUsage>,
    pub results: Vec<RerankResult>,
}

impl RerankResponse {
    /// Results ordered from most to least relevant.
    pub fn ranked(&self) -> Vec<&RerankResult> {
        let mut ranked: Vec<&RerankResult> = self.results.iter().collect();
        ranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        ranked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RerankResult {
    /// Position of the document in the request.
    pub index: usize,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RerankUsage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

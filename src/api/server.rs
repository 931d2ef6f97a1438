//! Server management endpoints: `/props`, `/metrics`, `/lora-adapters`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;

/// Server properties from `GET /props`.
///
/// Fields not modelled here are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Props {
    pub default_generation_settings: Option<Value>,
    pub total_slots: Option<u32>,
    pub model_path: Option<String>,
    pub chat_template: Option<String>,
    pub build_info: Option<String>,
    pub modalities: Option<Modalities>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Modalities {
    pub vision: bool,
    pub audio: bool,
}

/// Body of `POST /props`. Only accepted when the server runs with `--props`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropsUpdate {
    pub chat_template: Option<String>,
}

impl PropsUpdate {
    pub fn with_chat_template(mut self, chat_template: impl Into<String>) -> Self {
        self.chat_template = Some(chat_template.into());
        self
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PropsUpdateResponse {
    #[serde(default)]
    pub success: bool,
}

/// A loaded LoRA adapter, from `GET /lora-adapters`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoraAdapter {
    pub id: i32,
    pub path: String,
    pub scale: f64,
}

/// Scale to apply to an adapter, for `POST /lora-adapters` and per-request
/// `lora` lists. Adapters left out of a global update are disabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoraAdapterScale {
    pub id: i32,
    pub scale: f64,
}

/// Prometheus exposition text from `GET /metrics` (`--metrics`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metrics {
    pub text: String,
}

/// One sample line of the exposition text.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample<'a> {
    pub name: &'a str,
    pub labels: Vec<(&'a str, &'a str)>,
    pub value: f64,
}

impl Metrics {
    pub fn new(text: String) -> Self {
        Self { text }
    }

    /// Iterate the sample lines, skipping `#` comments, blank lines and
    /// anything that does not parse.
    pub fn samples(&self) -> impl Iterator<Item = MetricSample<'_>> + '_ {
        self.text.lines().filter_map(parse_sample)
    }

    /// First sample named `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.samples().find(|s| s.name == name).map(|s| s.value)
    }
}

fn parse_sample(line: &str) -> Option<MetricSample<'_>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (name, labels, rest) = match line.find('{') {
        Some(open) => {
            let close = open + line[open..].find('}')?;
            (&line[..open], parse_labels(&line[open + 1..close])?, &line[close + 1..])
        }
        None => {
            let split = line.find(char::is_whitespace)?;
            (&line[..split], Vec::new(), &line[split..])
        }
    };

    // An optional timestamp may follow the value.
    let value = rest.split_whitespace().next()?.parse().ok()?;
    Some(MetricSample {
        name: name.trim(),
        labels,
        value,
    })
}

fn parse_labels(raw: &str) -> Option<Vec<(&str, &str)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim(), value.trim().trim_matches('"')))
        })
        .collect()
}

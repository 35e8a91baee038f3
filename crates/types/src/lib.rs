//! Shared data types for STT Pipe

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Result structure returned by a finished pipeline execution.
///
/// Entries are kept as raw JSON so the dump written to disk carries every
/// field the service returned, not only the ones read here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<Value>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The pipeline's `response` field: literal text or a link to the real payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseRef {
    Text(String),
    Url(String),
}

impl ResponseRef {
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            ResponseRef::Url(raw.to_string())
        } else {
            ResponseRef::Text(raw.to_string())
        }
    }
}

/// Body collected from a successful GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub final_url: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Server answered with something other than 200.
    Status(u16),
    /// Request never produced a complete body.
    Transport(String),
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchFailure::Status(code) => write!(f, "[ERROR]: Failed to download file. Status code: {code}"),
            FetchFailure::Transport(reason) => write!(f, "[ERROR]: Failed to download file: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(FetchedBody),
    Failed(FetchFailure),
}

/// Text produced from raw bytes, with the label of the encoding used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static str,
    /// Some byte sequences were replaced with U+FFFD.
    pub had_errors: bool,
    /// The mojibake pass changed the text.
    pub repaired: bool,
}

/// What a run ends up with, consumed by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// The pipeline returned no result entries.
    Empty,
    Literal(String),
    Fetched { bytes: Vec<u8>, decoded: Decoded },
    Failed(FetchFailure),
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Empty => "empty",
            Artifact::Literal(_) => "literal",
            Artifact::Fetched { .. } => "fetched",
            Artifact::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub pipeline_id: String,
    pub input_path: String,
    pub artifact: String,
    pub response_url: Option<String>,
    pub encoding: Option<String>,
    pub json_path: String,
    pub hex_path: String,
    pub text_path: String,
    pub processing_time: f64,
}

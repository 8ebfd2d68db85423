use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One timestamped span of transcribed text.
///
/// Fields the backend reports beyond the ones modeled here (`tokens`,
/// `avg_logprob`, `no_speech_prob`, ...) are kept in `extra` and written back
/// out untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "id", default)]
    pub index: u32,
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Segment {
    pub fn new(index: u32, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Full output of a single transcription call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    #[serde(rename = "text")]
    pub full_text: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TranscriptionResult {
    pub fn new(full_text: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            full_text: full_text.into(),
            segments,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscribeOptions {
    /// Language hint such as "en" or "fr". `None` lets the model detect it.
    pub language: Option<String>,
}

impl TranscribeOptions {
    /// Treat a blank language field the same as an absent one.
    pub fn with_language(language: Option<String>) -> Self {
        let language = language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        Self { language }
    }
}

/// Blocking speech-to-text inference over a file on disk.
pub trait TranscriptionBackend: Send + Sync {
    fn name(&self) -> &str;
    fn transcribe(&self, audio_path: &Path, options: &TranscribeOptions)
        -> Result<TranscriptionResult>;
}

//! Transcript output encodings.
//!
//! `text` and `json` reduce the result to its full text, `verbose_json`
//! passes it through untouched, and `srt`/`vtt` build subtitle documents
//! from the segments.

pub mod subtitles;
pub mod timestamp;

use serde::Serialize;

use crate::error::WorkerError;
use crate::transcribe::backend::TranscriptionResult;

/// Requested response encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Text,
    Json,
    #[default]
    VerboseJson,
    Srt,
    Vtt,
}

impl OutputFormat {
    /// Parse a `response_format` value. Unknown values fall back to
    /// `VerboseJson` instead of failing. Matching is exact.
    pub fn parse(value: &str) -> Self {
        match value {
            "text" => Self::Text,
            "json" => Self::Json,
            "verbose_json" => Self::VerboseJson,
            "srt" => Self::Srt,
            "vtt" => Self::Vtt,
            other => {
                tracing::debug!("Unknown response_format {:?}, using verbose_json", other);
                Self::VerboseJson
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::VerboseJson => "verbose_json",
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

/// A rendered transcript, serialized as the HTTP response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderedOutput {
    /// `{"text": ...}`
    Text { text: String },
    /// `{"text": <document>, "format": "srt"|"vtt"}`
    Subtitles { text: String, format: SubtitleFormat },
    /// The backend result as produced.
    Verbose(TranscriptionResult),
}

#[cfg(test)]
impl RenderedOutput {
    /// The subtitle document, for SRT and VTT output.
    pub(crate) fn subtitle_text(&self) -> Option<&str> {
        match self {
            Self::Subtitles { text, .. } => Some(text),
            _ => None,
        }
    }
}

pub fn render(
    result: &TranscriptionResult,
    format: OutputFormat,
) -> Result<RenderedOutput, WorkerError> {
    let rendered = match format {
        OutputFormat::Text | OutputFormat::Json => RenderedOutput::Text {
            text: result.full_text.clone(),
        },
        OutputFormat::VerboseJson => RenderedOutput::Verbose(result.clone()),
        OutputFormat::Srt => RenderedOutput::Subtitles {
            text: subtitles::to_srt(&result.segments)?,
            format: SubtitleFormat::Srt,
        },
        OutputFormat::Vtt => RenderedOutput::Subtitles {
            text: subtitles::to_vtt(&result.segments)?,
            format: SubtitleFormat::Vtt,
        },
    };
    Ok(rendered)
}

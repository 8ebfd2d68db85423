use crate::error::WorkerError;
use crate::render::timestamp::{format_timestamp, TimestampStyle};
use crate::transcribe::backend::Segment;

fn time_range(segment: &Segment, style: TimestampStyle) -> Result<String, WorkerError> {
    Ok(format!(
        "{} --> {}",
        format_timestamp(segment.start, style)?,
        format_timestamp(segment.end, style)?
    ))
}

/// Render segments as an SRT document. Captions are numbered from 1.
pub fn to_srt(segments: &[Segment]) -> Result<String, WorkerError> {
    let mut lines = Vec::with_capacity(segments.len() * 4);
    for (i, segment) in segments.iter().enumerate() {
        lines.push((i + 1).to_string());
        lines.push(time_range(segment, TimestampStyle::Srt)?);
        lines.push(segment.text.trim().to_string());
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

/// Render segments as a WebVTT document.
pub fn to_vtt(segments: &[Segment]) -> Result<String, WorkerError> {
    let mut lines = Vec::with_capacity(2 + segments.len() * 3);
    lines.push("WEBVTT".to_string());
    lines.push(String::new());
    for segment in segments {
        lines.push(time_range(segment, TimestampStyle::Vtt)?);
        lines.push(segment.text.trim().to_string());
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

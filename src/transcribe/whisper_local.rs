use std::path::{Path, PathBuf};

use anyhow::Result;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::transcribe::audio::decode_for_whisper;
use crate::transcribe::backend::{
    Segment, TranscribeOptions, TranscriptionBackend, TranscriptionResult,
};

pub struct WhisperLocal {
    ctx: WhisperContext,
    threads: i32,
}

impl WhisperLocal {
    pub fn new(model_path: &Path, threads: u32) -> Result<Self> {
        let path = model_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("model path is not UTF-8: {}", model_path.display()))?;
        let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| anyhow::anyhow!("Failed to load Whisper model: {:?}", e))?;
        Ok(Self {
            ctx,
            threads: threads.max(1) as i32,
        })
    }
}

/// Resolve a model name like "medium" to `<model_dir>/ggml-medium.bin`.
/// Names ending in `.bin` are taken as paths.
pub fn resolve_model_path(model: &str, model_dir: &Path) -> PathBuf {
    if model.ends_with(".bin") {
        PathBuf::from(model)
    } else {
        model_dir.join(format!("ggml-{}.bin", model))
    }
}

impl TranscriptionBackend for WhisperLocal {
    fn name(&self) -> &str {
        "whisper-local"
    }

    fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
    ) -> Result<TranscriptionResult> {
        let samples = decode_for_whisper(audio_path)?;

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| anyhow::anyhow!("Failed to create state: {:?}", e))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads);
        params.set_language(options.language.as_deref());
        params.set_print_progress(false);
        params.set_print_realtime(false);

        state
            .full(params, &samples)
            .map_err(|e| anyhow::anyhow!("Transcription failed: {:?}", e))?;

        let mut text = String::new();
        let mut segments = Vec::new();
        let n_segments = state.full_n_segments();
        for i in 0..n_segments {
            if let Some(segment) = state.get_segment(i) {
                if let Ok(segment_text) = segment.to_str_lossy() {
                    // whisper.cpp timestamps are in centiseconds
                    let start = segment.start_timestamp() as f64 / 100.0;
                    let end = segment.end_timestamp() as f64 / 100.0;
                    text.push_str(&segment_text);
                    segments.push(Segment::new(
                        segments.len() as u32,
                        start,
                        end.max(start),
                        segment_text.to_string(),
                    ));
                }
            }
        }

        let mut result = TranscriptionResult::new(text, segments);
        if let Some(language) = &options.language {
            result
                .extra
                .insert("language".to_string(), serde_json::Value::from(language.clone()));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_name() {
        let path = resolve_model_path("medium", Path::new("/models"));
        assert_eq!(path, PathBuf::from("/models/ggml-medium.bin"));
    }

    #[test]
    fn test_resolve_model_explicit_path() {
        let path = resolve_model_path("/opt/ggml-large-v3.bin", Path::new("/models"));
        assert_eq!(path, PathBuf::from("/opt/ggml-large-v3.bin"));
    }
}

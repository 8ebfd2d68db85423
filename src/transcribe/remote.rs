use std::path::Path;

use anyhow::{Context, Result};
use reqwest::blocking::multipart;

use crate::config::RemoteConfig;
use crate::transcribe::backend::{TranscribeOptions, TranscriptionBackend, TranscriptionResult};

/// Env var consulted when `transcription.remote.api_key` is empty.
pub const API_KEY_ENV: &str = "WHISPER_WORKER_API_KEY";

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint.
pub struct RemoteBackend {
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl RemoteBackend {
    pub fn new(config: &RemoteConfig, model: &str) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            anyhow::bail!("transcription.remote.endpoint is not configured");
        }

        let api_key = if config.api_key.is_empty() {
            std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
        } else {
            Some(config.api_key.clone())
        };

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/audio/transcriptions", self.endpoint)
    }
}

impl TranscriptionBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
    ) -> Result<TranscriptionResult> {
        let file_bytes = std::fs::read(audio_path)
            .with_context(|| format!("failed to read {}", audio_path.display()))?;
        let filename = audio_path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("audio path has no filename: {}", audio_path.display()))?
            .to_string_lossy()
            .to_string();

        let mut form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(file_bytes)
                    .file_name(filename)
                    .mime_str(mime_for(audio_path))?,
            )
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = &options.language {
            form = form.text("language", language.clone());
        }

        // Inference time is unbounded; the blocking client defaults to 30s.
        let client = reqwest::blocking::Client::builder().timeout(None).build()?;
        let mut request = client.post(self.url()).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send()?.error_for_status()?;
        let result: TranscriptionResult = response
            .json()
            .context("remote backend returned an unexpected body")?;
        Ok(result)
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

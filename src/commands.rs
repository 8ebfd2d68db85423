use std::path::Path;

use anyhow::Result;

use whisper_worker::config::Config;
use whisper_worker::render::{render, OutputFormat, RenderedOutput};
use whisper_worker::transcribe::backend::TranscribeOptions;
use whisper_worker::transcribe::build_backend;
use whisper_worker::transcribe::upload::validate_extension;

/// Run a single transcription outside the HTTP service and print it.
pub fn transcribe_file(
    config: &Config,
    file: &Path,
    language: Option<String>,
    format: &str,
) -> Result<()> {
    validate_extension(file.to_str())?;
    if !file.is_file() {
        anyhow::bail!("No such file: {}", file.display());
    }

    tracing::info!("Loading Whisper model: {}", config.transcription.model);
    let backend = build_backend(&config.transcription)?;

    let options = TranscribeOptions::with_language(language);
    tracing::info!("Transcribing {} with {}", file.display(), backend.name());
    let result = backend.transcribe(file, &options)?;

    match render(&result, OutputFormat::parse(format))? {
        RenderedOutput::Subtitles { text, .. } => print!("{}", text),
        RenderedOutput::Text { text } => println!("{}", text.trim()),
        verbose => println!("{}", serde_json::to_string_pretty(&verbose)?),
    }
    Ok(())
}

pub fn init_config() -> Result<()> {
    print!("{}", Config::generate_default_commented());
    Ok(())
}

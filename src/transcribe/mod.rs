#[cfg(feature = "local-whisper")]
pub mod audio;
pub mod backend;
pub mod remote;
pub mod upload;
#[cfg(feature = "local-whisper")]
pub mod whisper_local;

use anyhow::Result;

use crate::config::TranscriptionConfig;
use crate::transcribe::backend::TranscriptionBackend;

/// Build the configured backend. Loading a local model can take a while, so
/// callers run this off the async runtime.
pub fn build_backend(config: &TranscriptionConfig) -> Result<Box<dyn TranscriptionBackend>> {
    match config.backend.as_str() {
        "local" => {
            #[cfg(feature = "local-whisper")]
            {
                use crate::transcribe::whisper_local::{resolve_model_path, WhisperLocal};
                let model_path = resolve_model_path(&config.model, &config.model_dir);
                tracing::info!("Loading Whisper model from {}", model_path.display());
                Ok(Box::new(WhisperLocal::new(&model_path, config.threads)?))
            }
            #[cfg(not(feature = "local-whisper"))]
            {
                anyhow::bail!(
                    "Local whisper backend requires building with the `local-whisper` feature"
                )
            }
        }
        "remote" => {
            use crate::transcribe::remote::RemoteBackend;
            Ok(Box::new(RemoteBackend::new(&config.remote, &config.model)?))
        }
        other => anyhow::bail!("Unknown transcription backend: {}", other),
    }
}

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::WorkerError;
use crate::render::{render, OutputFormat, RenderedOutput};
use crate::transcribe::backend::{TranscribeOptions, TranscriptionBackend};
use crate::transcribe::upload::{validate_extension, ScratchUpload};
use crate::watchdog::{IdleWatchdog, ShutdownTrigger};

/// Settings fixed for the lifetime of the service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Model name reported by the health check.
    pub model_name: String,
    pub idle_timeout: Duration,
    pub health_check_resets: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_size: String,
}

/// An uploaded audio file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct TranscribeRequest {
    pub file: Option<Upload>,
    pub language: Option<String>,
    pub format: OutputFormat,
}

/// Process-wide state shared by every request handler: the idle watchdog and
/// the slot the inference backend is installed into once it is ready.
pub struct WorkerService {
    settings: ServiceSettings,
    watchdog: IdleWatchdog,
    backend: RwLock<Option<Arc<dyn TranscriptionBackend>>>,
}

impl WorkerService {
    pub fn new(settings: ServiceSettings, trigger: impl ShutdownTrigger) -> Self {
        Self {
            settings,
            watchdog: IdleWatchdog::new(trigger),
            backend: RwLock::new(None),
        }
    }

    /// Arm the idle watchdog and install the loaded backend. If the watchdog
    /// cannot be armed the service stays not-ready.
    pub fn mark_ready(&self, backend: Arc<dyn TranscriptionBackend>) -> anyhow::Result<()> {
        let mut slot = self.backend.write();
        if slot.is_some() {
            anyhow::bail!("transcription backend already installed");
        }
        self.watchdog.start(self.settings.idle_timeout)?;
        tracing::info!(
            "Whisper model {} loaded successfully ({} backend)",
            self.settings.model_name,
            backend.name()
        );
        *slot = Some(backend);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.backend.read().is_some()
    }

    pub fn watchdog(&self) -> &IdleWatchdog {
        &self.watchdog
    }

    pub fn health(&self) -> HealthStatus {
        if self.settings.health_check_resets {
            self.watchdog.reset_activity();
        }
        HealthStatus {
            status: "ok",
            model_loaded: self.is_ready(),
            model_size: self.settings.model_name.clone(),
        }
    }

    pub async fn transcribe(
        &self,
        request: TranscribeRequest,
    ) -> Result<RenderedOutput, WorkerError> {
        self.watchdog.reset_activity();

        let backend = self
            .backend
            .read()
            .clone()
            .ok_or_else(|| WorkerError::ServiceUnavailable("Whisper model not loaded".into()))?;

        let upload = request
            .file
            .ok_or_else(|| WorkerError::InvalidInput("No file provided".into()))?;
        let extension = validate_extension(upload.filename.as_deref())?;

        let scratch = ScratchUpload::persist(&upload.data, &extension).map_err(|e| {
            tracing::error!("Failed to persist upload: {:?}", e);
            WorkerError::Internal(format!("Transcription failed: {}", e))
        })?;
        tracing::info!(
            "Processing audio file: {} ({} bytes)",
            upload.filename.as_deref().unwrap_or(""),
            upload.data.len()
        );
        drop(upload);

        let options = TranscribeOptions::with_language(request.language);
        tracing::info!("Starting transcription with options: {:?}", options);

        // The scratch file moves into the blocking task so it outlives the
        // inference call even if this future is dropped.
        let outcome = tokio::task::spawn_blocking(move || {
            let result = backend.transcribe(scratch.path(), &options);
            drop(scratch);
            result
        })
        .await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!("Transcription error: {:?}", e);
                return Err(WorkerError::Internal(format!("Transcription failed: {:#}", e)));
            }
            Err(e) => {
                tracing::error!("Transcription task failed: {:?}", e);
                return Err(WorkerError::Internal(format!("Transcription failed: {}", e)));
            }
        };

        render(&result, request.format).map_err(|e| {
            tracing::error!("Failed to render {} output: {}", request.format.as_str(), e);
            WorkerError::Internal(format!("Transcription failed: {}", e))
        })
    }
}

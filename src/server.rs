use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::WorkerError;
use crate::render::{OutputFormat, RenderedOutput};
use crate::service::{HealthStatus, ServiceSettings, TranscribeRequest, Upload, WorkerService};
use crate::transcribe::build_backend;

/// Build the HTTP router around a shared service.
pub fn router(service: Arc<WorkerService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/transcribe", post(transcribe_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// GET /health
async fn health_handler(State(service): State<Arc<WorkerService>>) -> Json<HealthStatus> {
    Json(service.health())
}

/// POST /transcribe
async fn transcribe_handler(
    State(service): State<Arc<WorkerService>>,
    multipart: Multipart,
) -> Result<Json<RenderedOutput>, WorkerError> {
    // Activity starts with the request, not once the body is buffered.
    service.watchdog().reset_activity();
    let request = read_form(multipart).await?;
    service.transcribe(request).await.map(Json)
}

async fn read_form(mut multipart: Multipart) -> Result<TranscribeRequest, WorkerError> {
    let mut request = TranscribeRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(form_error)?;
                request.file = Some(Upload {
                    filename,
                    data: data.to_vec(),
                });
            }
            "language" => {
                let text = field.text().await.map_err(form_error)?;
                request.language = Some(text);
            }
            "response_format" => {
                let text = field.text().await.map_err(form_error)?;
                request.format = OutputFormat::parse(&text);
            }
            _ => {}
        }
    }

    Ok(request)
}

fn form_error(e: MultipartError) -> WorkerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        WorkerError::PayloadTooLarge(format!("Upload too large: {}", e.body_text()))
    } else {
        WorkerError::InvalidInput(format!("Malformed multipart body: {}", e.body_text()))
    }
}

/// Run the worker until it goes idle or receives a termination signal.
///
/// The server starts listening right away; the backend loads in the
/// background and `/transcribe` answers 503 until it is ready.
pub async fn run(config: Config) -> Result<()> {
    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Received shutdown signal. Gracefully shutting down...");
        ctrlc_token.cancel();
    })?;

    let settings = ServiceSettings {
        model_name: config.transcription.model.clone(),
        idle_timeout: config.idle.timeout(),
        health_check_resets: config.idle.health_check_resets,
    };
    let service = Arc::new(WorkerService::new(settings, shutdown.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    let loader = tokio::spawn(load_backend(
        service.clone(),
        config.clone(),
        shutdown.clone(),
    ));

    let app = router(service.clone(), config.server.max_upload_bytes());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    service.watchdog().stop();
    tracing::info!("Server stopped");

    // Surface a model load failure as the process exit status.
    match tokio::time::timeout(Duration::from_secs(1), loader).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!("Shut down while the model was still loading"),
    }
    Ok(())
}

async fn load_backend(
    service: Arc<WorkerService>,
    config: Config,
    shutdown: CancellationToken,
) -> Result<()> {
    tracing::info!("Loading Whisper model: {}", config.transcription.model);
    let loaded = tokio::task::spawn_blocking(move || build_backend(&config.transcription))
        .await
        .context("model loading task panicked")
        .and_then(|r| r);

    let outcome = loaded.and_then(|backend| service.mark_ready(Arc::from(backend)));
    if let Err(e) = &outcome {
        tracing::error!("Failed to load Whisper model: {:#}", e);
        shutdown.cancel();
    }
    outcome
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub idle: IdleConfig,
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in megabytes.
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub timeout_mins: u64,
    /// Whether `GET /health` counts as activity. When true, a monitor polling
    /// health keeps an otherwise idle worker alive.
    pub health_check_resets: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub backend: String,
    pub model: String,
    pub model_dir: PathBuf,
    pub threads: u32,
    pub remote: RemoteConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// --- Default implementations ---

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            idle: IdleConfig::default(),
            transcription: TranscriptionConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_mb: 100,
        }
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            timeout_mins: 10,
            health_check_resets: true,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            model: "medium".to_string(),
            model_dir: default_model_dir(),
            threads: 4,
            remote: RemoteConfig::default(),
        }
    }
}

fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("whisper-worker")
        .join("models")
}

/// Upper bound for `idle.timeout_mins` (30 days).
pub const MAX_IDLE_TIMEOUT_MINS: u64 = 30 * 24 * 60;

impl IdleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_mins.saturating_mul(60))
    }
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

// --- Config loading ---

impl Config {
    /// Load config from the first file found, then apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: Option<&Path>) -> anyhow::Result<Self> {
        // 1. Check explicit path
        if let Some(p) = path {
            let content = std::fs::read_to_string(p).map_err(|e| {
                anyhow::anyhow!("Failed to read config file {}: {}", p.display(), e)
            })?;
            return Ok(toml::from_str(&content)?);
        }

        // 2. Check beside the executable
        if let Ok(exe_path) = std::env::current_exe() {
            let beside_exe = exe_path.parent().map(|p| p.join("whisper-worker.toml"));
            if let Some(p) = beside_exe {
                if p.exists() {
                    let content = std::fs::read_to_string(&p)?;
                    tracing::info!("Using config {}", p.display());
                    return Ok(toml::from_str(&content)?);
                }
            }
        }

        // 3. Check platform config directory
        if let Some(config_dir) = dirs::config_dir() {
            let platform_config = config_dir.join("whisper-worker").join("config.toml");
            if platform_config.exists() {
                let content = std::fs::read_to_string(&platform_config)?;
                tracing::info!("Using config {}", platform_config.display());
                return Ok(toml::from_str(&content)?);
            }
        }

        // 4. Fall back to defaults
        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Apply the container-style environment variables on top of the file
    /// config. `lookup` is `std::env::var` outside of tests.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("IDLE_TIMEOUT_MINUTES") {
            self.idle.timeout_mins = v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid IDLE_TIMEOUT_MINUTES {:?}: {}", v, e))?;
        }
        if let Some(v) = lookup("WHISPER_MODEL") {
            self.transcription.model = v;
        }
        if let Some(v) = lookup("WHISPER_BACKEND") {
            self.transcription.backend = v;
        }
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT {:?}: {}", v, e))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.idle.timeout_mins == 0 {
            anyhow::bail!("idle.timeout_mins must be at least 1");
        }
        if self.idle.timeout_mins > MAX_IDLE_TIMEOUT_MINS {
            anyhow::bail!(
                "idle.timeout_mins must be at most {} (got {})",
                MAX_IDLE_TIMEOUT_MINS,
                self.idle.timeout_mins
            );
        }
        if self.server.max_upload_mb == 0 {
            anyhow::bail!("server.max_upload_mb must be at least 1");
        }
        match self.transcription.backend.as_str() {
            "local" | "remote" => Ok(()),
            other => anyhow::bail!(
                "Unknown transcription backend {:?} (expected \"local\" or \"remote\")",
                other
            ),
        }
    }

    /// Generate a default config file with all fields and inline documentation.
    pub fn generate_default_commented() -> String {
        let model_dir = default_model_dir();
        let model_dir_str = model_dir.to_string_lossy().replace('\\', "\\\\");

        format!(
r#"# whisper-worker configuration
# Environment variables IDLE_TIMEOUT_MINUTES, WHISPER_MODEL, WHISPER_BACKEND,
# HOST and PORT override the values below.

[server]
# Address to listen on.
host = "0.0.0.0"
port = 8000
# Largest accepted upload in megabytes.
max_upload_mb = 100

[idle]
# Shut the worker down after this many minutes without requests (1 to 43200).
timeout_mins = 10
# Count GET /health as activity. Health probes will then keep an idle
# worker alive indefinitely.
health_check_resets = true

[transcription]
# Transcription backend: "local" (whisper.cpp on this machine) or "remote"
# (an OpenAI-compatible transcription API).
backend = "local"
# Whisper model name. Options: tiny, base, small, medium, large-v3
# Or an absolute path to a ggml .bin model file.
model = "medium"
# Directory searched for ggml-<model>.bin.
model_dir = "{model_dir}"
# Inference threads for the local backend.
threads = 4

[transcription.remote]
# Base URL; requests go to <endpoint>/v1/audio/transcriptions.
# endpoint = "http://localhost:9000"
# Bearer token (or set WHISPER_WORKER_API_KEY environment variable).
# api_key = ""
"#,
            model_dir = model_dir_str
        )
    }
}

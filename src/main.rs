mod cli;
mod commands;

use std::time::Duration;

use clap::Parser;
use cli::{Cli, Commands};
use whisper_worker::config::Config;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("whisper_worker=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
        idle_timeout_mins: None,
    });

    match command {
        Commands::InitConfig => crate::commands::init_config(),
        Commands::Transcribe {
            file,
            language,
            format,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            crate::commands::transcribe_file(&config, &file, language, &format)
        }
        Commands::Serve {
            host,
            port,
            idle_timeout_mins,
        } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(mins) = idle_timeout_mins {
                config.idle.timeout_mins = mins;
            }
            config.validate()?;

            tracing::info!("Starting whisper-worker");
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let outcome = runtime.block_on(whisper_worker::server::run(config));
            // A model load still running on the blocking pool must not hold
            // the process open.
            runtime.shutdown_timeout(Duration::from_secs(5));
            outcome
        }
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "whisper-worker",
    version,
    about = "Whisper transcription service that shuts itself down when idle"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP service (default if no subcommand)
    Serve {
        /// Address to listen on
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Minutes without requests before shutting down
        #[arg(long)]
        idle_timeout_mins: Option<u64>,
    },

    /// Transcribe one file with the configured backend and print the result
    Transcribe {
        /// Audio file to transcribe
        file: PathBuf,

        /// Language code (e.g. en, es, fr)
        #[arg(long)]
        language: Option<String>,

        /// Output format: json, text, verbose_json, srt or vtt
        #[arg(long, default_value = "verbose_json")]
        format: String,
    },

    /// Print a commented default config file
    InitConfig,
}

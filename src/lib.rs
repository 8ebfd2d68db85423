pub mod config;
pub mod error;
pub mod render;
pub mod server;
pub mod service;
pub mod transcribe;
pub mod watchdog;

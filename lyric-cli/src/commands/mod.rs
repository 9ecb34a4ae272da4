//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod config;
mod files;
mod task;

pub use config::ConfigCommands;
pub use task::TaskCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Transcription task control
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Server-side application config
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// List audio files in the source directory
    Files,
    /// List available whisper models
    Models,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Task { command } => task::handle_task_command(command, config).await,
        Commands::Config { command } => config::handle_config_command(command, config).await,
        Commands::Files => files::list_files(config).await,
        Commands::Models => files::list_models(config).await,
    }
}

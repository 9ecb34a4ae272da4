//! Config command handlers
//!
//! Shows and edits the server's persisted application config.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use colored::*;
use lyric_client::LyricClient;
use lyric_core::domain::config::{AVAILABLE_MODELS, AppConfig};

use crate::config::Config;

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current config
    Show,
    /// Update one or more config values
    Set(ConfigUpdate),
}

/// Values to change; omitted flags keep their current value
#[derive(Args, Debug, Default)]
pub struct ConfigUpdate {
    /// Directory holding the source audio files
    #[arg(long)]
    source_dir: Option<String>,
    /// Directory receiving generated .lrc files
    #[arg(long)]
    lyric_dir: Option<String>,
    /// Directory receiving tagged .mp3 files
    #[arg(long)]
    output_dir: Option<String>,
    /// Whisper model name
    #[arg(long)]
    model: Option<String>,
    /// Spoken language code, e.g. zh
    #[arg(long)]
    language: Option<String>,
    /// Initial prompt handed to whisper
    #[arg(long)]
    prompt: Option<String>,
    /// Artist written into tags
    #[arg(long)]
    singer: Option<String>,
    /// Album written into tags
    #[arg(long)]
    album: Option<String>,
    /// Cover image embedded as front cover
    #[arg(long)]
    cover: Option<String>,
}

/// Handle config commands
///
/// # Arguments
/// * `command` - The config command to execute
/// * `config` - The CLI configuration
pub async fn handle_config_command(command: ConfigCommands, config: &Config) -> Result<()> {
    let client = LyricClient::new(&config.server_url);

    match command {
        ConfigCommands::Show => {
            let current = client.get_config().await?;
            print_config(&current);
            Ok(())
        }
        ConfigCommands::Set(update) => {
            let mut current = client.get_config().await?;
            if !apply(&mut current, update)? {
                println!("{}", "Nothing to change.".yellow());
                return Ok(());
            }

            let saved = client.update_config(&current).await?;
            println!("{}", "✓ Config updated".green().bold());
            print_config(&saved);
            Ok(())
        }
    }
}

/// Applies the given values; returns whether anything was set
fn apply(config: &mut AppConfig, update: ConfigUpdate) -> Result<bool> {
    if let Some(model) = &update.model {
        if !AVAILABLE_MODELS.contains(&model.as_str()) {
            bail!(
                "Unknown model '{}'. Available: {}",
                model,
                AVAILABLE_MODELS.join(", ")
            );
        }
    }

    let fields = [
        (update.source_dir, &mut config.source_dir),
        (update.lyric_dir, &mut config.lyric_dir),
        (update.output_dir, &mut config.output_dir),
        (update.model, &mut config.model),
        (update.language, &mut config.language),
        (update.prompt, &mut config.prompt),
        (update.singer, &mut config.singer_name),
        (update.album, &mut config.album_name),
        (update.cover, &mut config.cover_path),
    ];

    let mut changed = false;
    for (value, slot) in fields {
        if let Some(value) = value {
            *slot = value;
            changed = true;
        }
    }

    Ok(changed)
}

fn print_config(config: &AppConfig) {
    let show = |value: &str| {
        if value.is_empty() {
            "(not set)".dimmed()
        } else {
            value.normal()
        }
    };

    println!("{}", "Config:".bold());
    println!("  Source dir:  {}", show(&config.source_dir));
    println!("  Lyric dir:   {}", show(&config.lyric_dir));
    println!("  Output dir:  {}", show(&config.output_dir));
    println!("  Model:       {}", config.model.cyan());
    println!("  Language:    {}", show(&config.language));
    println!("  Prompt:      {}", show(&config.prompt));
    println!("  Singer:      {}", show(&config.singer_name));
    println!("  Album:       {}", show(&config.album_name));
    println!("  Cover:       {}", show(&config.cover_path));

    let missing = config.missing_directories();
    if !missing.is_empty() {
        println!(
            "\n{}",
            format!("⚠ Not configured: {}", missing.join(", ")).yellow()
        );
    }
}

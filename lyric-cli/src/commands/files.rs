//! File and model listing

use anyhow::Result;
use colored::*;
use lyric_client::LyricClient;
use lyric_core::dto::files::FileInfo;

use crate::config::Config;

/// List source audio files with their lyric/output state
pub async fn list_files(config: &Config) -> Result<()> {
    let client = LyricClient::new(&config.server_url);
    let files = client.list_files().await?;

    if files.is_empty() {
        println!(
            "{}",
            "No audio files found. Is the source directory configured?".yellow()
        );
        return Ok(());
    }

    let done = files.iter().filter(|f| f.is_done()).count();
    println!(
        "{}",
        format!("Found {} file(s), {} already done:", files.len(), done).bold()
    );
    println!();
    for file in &files {
        print_file(file);
    }

    Ok(())
}

/// List whisper model names
pub async fn list_models(config: &Config) -> Result<()> {
    let client = LyricClient::new(&config.server_url);
    let models = client.list_models().await?;

    println!("{}", "Available models:".bold());
    for model in models {
        println!("  {} {}", "▸".cyan(), model);
    }

    Ok(())
}

fn print_file(file: &FileInfo) {
    let mark = |present: bool| if present { "✓".green() } else { "·".dimmed() };

    println!(
        "  {} lrc {} out  {}  {}",
        mark(file.has_lyric),
        mark(file.has_output),
        file.name,
        format_size(file.size_bytes).dimmed()
    );
}

fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB)
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

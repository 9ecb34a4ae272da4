//! Task command handlers
//!
//! Starting, cancelling and following the server's transcription job.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use futures_util::StreamExt;
use lyric_client::{LyricClient, StreamItem};
use lyric_core::domain::event::EventKind;
use lyric_core::domain::job::{FileTask, JobState, PhaseStatus};
use lyric_core::dto::task::TaskStatus;

use crate::config::Config;

/// Task subcommands
#[derive(Subcommand)]
pub enum TaskCommands {
    /// Start processing files from the source directory
    Start {
        /// File names, processed in the given order
        #[arg(required = true)]
        files: Vec<String>,

        /// Follow progress until the job ends
        #[arg(short, long)]
        watch: bool,
    },
    /// Cancel the running job after the current file
    Cancel,
    /// Show the current job status
    Status {
        /// Print the raw status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow the event stream until the job ends
    Watch {
        /// Replay recent events first
        #[arg(short, long)]
        replay: bool,
    },
}

/// Handle task commands
///
/// # Arguments
/// * `command` - The task command to execute
/// * `config` - The CLI configuration
pub async fn handle_task_command(command: TaskCommands, config: &Config) -> Result<()> {
    let client = LyricClient::new(&config.server_url);

    match command {
        TaskCommands::Start { files, watch } => start_task(&client, files, watch).await,
        TaskCommands::Cancel => cancel_task(&client).await,
        TaskCommands::Status { json } => show_status(&client, json).await,
        TaskCommands::Watch { replay } => watch_events(&client, replay).await,
    }
}

async fn start_task(client: &LyricClient, files: Vec<String>, watch: bool) -> Result<()> {
    // Subscribe before starting so no early event is missed
    let stream = if watch {
        Some(client.stream_events(false).await?)
    } else {
        None
    };

    let started = match client.start_task(files).await {
        Ok(started) => started,
        Err(e) if e.is_conflict() => {
            println!("{}", "A task is already running.".yellow());
            println!("{}", "  Use `lyric task watch --replay` to follow it.".dimmed());
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to start task"),
    };

    println!("{}", "✓ Task started".green().bold());
    println!("  Job:   {}", started.job_id.to_string().cyan());
    println!("  Files: {}", started.files_count);

    if let Some(stream) = stream {
        println!();
        follow(stream).await?;
    }

    Ok(())
}

async fn cancel_task(client: &LyricClient) -> Result<()> {
    let response = client.cancel_task().await?;

    if response.success {
        println!(
            "{}",
            "✓ Cancellation requested; the current file will finish first".green()
        );
    } else {
        println!("{}", "No task is running.".yellow());
    }

    Ok(())
}

async fn show_status(client: &LyricClient, json: bool) -> Result<()> {
    let status = client.task_status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

async fn watch_events(client: &LyricClient, replay: bool) -> Result<()> {
    let stream = client.stream_events(replay).await?;
    follow(stream).await
}

/// Prints events until the stream ends
async fn follow(mut stream: lyric_client::EventStream) -> Result<()> {
    while let Some(item) = stream.next().await {
        match item? {
            StreamItem::Event(event) => {
                println!(
                    "{} {}",
                    format!("#{:<4}", event.seq).dimmed(),
                    colorize_event(&event.kind)
                );
                if event.kind.is_terminal() {
                    break;
                }
            }
            StreamItem::Keepalive => {}
        }
    }

    Ok(())
}

fn colorize_event(kind: &EventKind) -> ColoredString {
    let text = describe_event(kind);
    match kind {
        EventKind::Progress { .. } => text.cyan(),
        EventKind::LineProduced { .. } => text.normal(),
        EventKind::PhaseComplete { .. } => text.dimmed(),
        EventKind::FileComplete { success: true, .. } => text.green(),
        EventKind::FileComplete { success: false, .. } => text.red(),
        EventKind::JobComplete { .. } => text.green().bold(),
        EventKind::JobCancelled => text.yellow().bold(),
        EventKind::Error { .. } => text.red(),
    }
}

/// One-line rendering of an event
fn describe_event(kind: &EventKind) -> String {
    match kind {
        EventKind::LineProduced { .. } => format!("  {}", kind),
        EventKind::PhaseComplete { .. } => format!("  {}", kind),
        EventKind::FileComplete { success: true, .. } => format!("✓ {}", kind),
        EventKind::FileComplete { success: false, .. } => format!("✗ {}", kind),
        _ => kind.to_string(),
    }
}

fn print_status(status: &TaskStatus) {
    let Some(job_id) = status.job_id else {
        println!("{}", "No task has run yet.".yellow());
        return;
    };

    println!("{}", "Task Status:".bold());
    println!("  Job:      {}", job_id.to_string().cyan());
    if let Some(state) = status.state {
        println!("  State:    {}", colorize_state(state));
    }
    if let Some(started) = status.started_at {
        println!("  Started:  {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(progress) = &status.progress {
        if status.running {
            println!(
                "  Current:  [{}/{}] {} {}",
                progress.current, progress.total, progress.phase, progress.file
            );
        }
    }
    println!(
        "  Results:  {} succeeded, {} failed",
        status.success_count.to_string().green(),
        status.fail_count.to_string().red()
    );

    if !status.files.is_empty() {
        println!("\n{}", "Files:".bold());
        for file in &status.files {
            print_file(file);
        }
    }
}

fn print_file(file: &FileTask) {
    println!(
        "  {:<40} transcribe {:<10} embed {}",
        file.name,
        colorize_phase(file.transcribe),
        colorize_phase(file.embed)
    );
    if let Some(error) = &file.error {
        println!("    {}", error.red());
    }
}

fn colorize_state(state: JobState) -> ColoredString {
    let text = format!("{:?}", state);
    match state {
        JobState::Pending => text.yellow(),
        JobState::Running => text.cyan(),
        JobState::Completed => text.green(),
        JobState::Cancelled => text.dimmed(),
    }
}

fn colorize_phase(status: PhaseStatus) -> ColoredString {
    let text = format!("{:?}", status);
    match status {
        PhaseStatus::Pending => text.dimmed(),
        PhaseStatus::Running => text.cyan(),
        PhaseStatus::Succeeded => text.green(),
        PhaseStatus::Failed => text.red(),
        PhaseStatus::Skipped => text.yellow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyric_core::domain::job::Phase;

    #[test]
    fn test_describe_progress_and_lines() {
        let progress = EventKind::Progress {
            current: 2,
            total: 5,
            phase: Phase::Embed,
            file: "b.mp3".to_string(),
            duration: Some(180.0),
        };
        assert_eq!(describe_event(&progress), "[2/5] embed b.mp3");

        let line = EventKind::LineProduced {
            time: "[00:01.50]".to_string(),
            text: "hello".to_string(),
        };
        assert_eq!(describe_event(&line), "  [00:01.50]hello");
    }

    #[test]
    fn test_describe_outcomes() {
        let failed = EventKind::FileComplete {
            file: "b.mp3".to_string(),
            success: false,
            message: Some("cannot decode".to_string()),
        };
        assert_eq!(describe_event(&failed), "✗ b.mp3 failed: cannot decode");

        let done = EventKind::JobComplete {
            success_count: 4,
            fail_count: 1,
        };
        assert_eq!(describe_event(&done), "job complete: 4 succeeded, 1 failed");

        let fatal = EventKind::Error {
            file: None,
            message: "worker is not accepting work".to_string(),
        };
        assert_eq!(describe_event(&fatal), "error: worker is not accepting work");
    }
}

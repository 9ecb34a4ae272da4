//! ffmpeg format conversion

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Thin wrapper over the ffmpeg binary
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: String,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Converts any input to 16 kHz mono WAV, the format whisper expects
    pub fn to_wav(&self, input: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.binary);
        command
            .arg("-i")
            .arg(input)
            .args(["-ar", "16000", "-ac", "1", "-y"])
            .arg(output);
        self.run(command)
    }

    /// Re-encodes any input as MP3 (LAME VBR quality 2)
    pub fn to_mp3(&self, input: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.binary);
        command
            .arg("-i")
            .arg(input)
            .args(["-codec:a", "libmp3lame", "-qscale:a", "2", "-y"])
            .arg(output);
        self.run(command)
    }

    fn run(&self, mut command: Command) -> Result<()> {
        debug!("Running {:?}", command);

        let output = command
            .output()
            .with_context(|| format!("Failed to execute '{}'. Is ffmpeg installed?", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg conversion failed: {}", last_lines(&stderr, 5));
        }

        Ok(())
    }
}

/// ffmpeg prints its whole banner to stderr; the cause is at the end
fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

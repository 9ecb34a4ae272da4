//! whisper.cpp transcription through its command line binary
//!
//! The audio is first converted to 16 kHz mono WAV in a scratch directory.
//! whisper-cli prints each segment on stdout as soon as it is decoded:
//!
//! ```text
//! [00:00:01.240 --> 00:00:04.980]   some lyric text
//! ```
//!
//! Segments are parsed line by line and reported while the process runs.

use super::{Ffmpeg, TranscribeRequest, Transcriber, Transcript};
use anyhow::{Context, Result};
use lyric_core::lrc::{LyricLine, LyricTrack};
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::{debug, info, warn};

/// Transcriber backed by the `whisper-cli` binary
#[derive(Debug, Clone)]
pub struct WhisperCli {
    binary: String,
    models_dir: PathBuf,
    threads: usize,
    ffmpeg: Ffmpeg,
}

impl WhisperCli {
    pub fn new(
        binary: impl Into<String>,
        models_dir: impl Into<PathBuf>,
        threads: usize,
        ffmpeg: Ffmpeg,
    ) -> Self {
        Self {
            binary: binary.into(),
            models_dir: models_dir.into(),
            threads,
            ffmpeg,
        }
    }

    /// Location of the ggml weights for a model name
    pub fn model_path(&self, model: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{}.bin", model))
    }
}

impl Transcriber for WhisperCli {
    fn transcribe(
        &self,
        request: &TranscribeRequest,
        on_line: &mut dyn FnMut(&LyricLine),
    ) -> Result<Transcript> {
        let model = self.model_path(&request.model);
        if !model.exists() {
            anyhow::bail!("Model not found: {}", model.display());
        }

        let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
        let wav = scratch.path().join("input.wav");
        self.ffmpeg.to_wav(&request.source, &wav)?;

        info!(
            "Transcribing {} with model {}",
            request.source.display(),
            request.model
        );

        let mut command = Command::new(&self.binary);
        command
            .arg("-m")
            .arg(&model)
            .arg("-f")
            .arg(&wav)
            .arg("-l")
            .arg(&request.language)
            .arg("-t")
            .arg(self.threads.to_string())
            // Each segment is decoded without the previous text as context,
            // which keeps hallucinated repeats out of lyrics
            .args(["-mc", "0"]);
        if !request.prompt.is_empty() {
            command.arg("--prompt").arg(&request.prompt);
        }
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = ChildGuard::new(
            command
                .spawn()
                .with_context(|| format!("Failed to execute '{}'", self.binary))?,
        );

        let stdout = child
            .child
            .stdout
            .take()
            .context("whisper stdout was not captured")?;

        // Drained on its own thread so a chatty stderr cannot stall stdout
        let stderr_reader = child.child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buffer = Vec::new();
                let _ = stderr.read_to_end(&mut buffer);
                String::from_utf8_lossy(&buffer).into_owned()
            })
        });

        let mut track = LyricTrack::new();
        let mut end_ms = None;

        let mut reader = BufReader::new(stdout);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            let read = reader
                .read_until(b'\n', &mut raw)
                .context("Failed to read whisper output")?;
            if read == 0 {
                break;
            }

            // Broken multibyte output must not fail the whole file
            let text = String::from_utf8_lossy(&raw);
            let Some(segment) = parse_segment(text.trim_end_matches(['\n', '\r'])) else {
                continue;
            };

            end_ms = Some(segment.end_ms);
            if segment.text.is_empty() {
                continue;
            }

            let lyric = LyricLine::new(segment.start_ms, segment.text);
            on_line(&lyric);
            track.push(lyric);
        }

        let status = child.wait().context("Failed to wait for whisper")?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            let detail = stderr.trim().lines().last().unwrap_or("no output");
            anyhow::bail!("whisper exited with {}: {}", status, detail);
        }

        debug!("Transcribed {} lines", track.len());

        Ok(Transcript {
            track,
            duration: end_ms.map(|ms| ms as f64 / 1000.0),
        })
    }
}

/// Kills and reaps the whisper process unless it was waited for
///
/// Any early return (read error, panicking callback) would otherwise leave
/// whisper running with its model loaded while the next file starts.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }

        warn!("Stopping whisper process {}", self.child.id());
        if let Err(err) = self.child.kill() {
            debug!("Failed to kill whisper: {}", err);
        }
        let _ = self.child.wait();
    }
}

#[derive(Debug, PartialEq)]
struct Segment {
    start_ms: u64,
    end_ms: u64,
    text: String,
}

/// Parses `[hh:mm:ss.mmm --> hh:mm:ss.mmm]  text`
fn parse_segment(line: &str) -> Option<Segment> {
    let rest = line.trim_start().strip_prefix('[')?;
    let (range, text) = rest.split_once(']')?;
    let (start, end) = range.split_once("-->")?;

    Some(Segment {
        start_ms: parse_clock(start.trim())?,
        end_ms: parse_clock(end.trim())?,
        text: text.trim().to_string(),
    })
}

fn parse_clock(value: &str) -> Option<u64> {
    let mut parts = value.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (secs, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    let secs: u64 = secs.parse().ok()?;
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Fraction of a second, scaled to exactly three digits
    let millis: u64 = format!("{:0<3}", &fraction[..fraction.len().min(3)])
        .parse()
        .ok()?;

    Some(((hours * 60 + minutes) * 60 + secs) * 1000 + millis)
}

//! Test doubles for the batch runner's collaborators

use crate::backend::{
    Backends, EmbedRequest, ExistingOutputs, TagEmbedder, TranscribeRequest, Transcriber,
    Transcript,
};
use lyric_core::domain::event::{Event, EventKind};
use lyric_core::domain::job::FileTask;
use lyric_core::lrc::{LyricLine, LyricTrack};
use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Blocks transcription of one file until released
pub struct Gate {
    file: String,
    started: Mutex<Option<oneshot::Sender<()>>>,
    release: Mutex<std_mpsc::Receiver<()>>,
}

/// Test side of a [`Gate`]
pub struct GateControl {
    pub started: oneshot::Receiver<()>,
    pub release: std_mpsc::Sender<()>,
}

impl Gate {
    pub fn new(file: &str) -> (Self, GateControl) {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let gate = Self {
            file: file.to_string(),
            started: Mutex::new(Some(started_tx)),
            release: Mutex::new(release_rx),
        };
        (
            gate,
            GateControl {
                started: started_rx,
                release: release_tx,
            },
        )
    }

    fn wait(&self, file: &str) {
        if file != self.file {
            return;
        }
        if let Some(started) = self.started.lock().unwrap().take() {
            let _ = started.send(());
        }
        let _ = self
            .release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(10));
    }
}

/// Emits two lines per file, failing for the configured names after the first
#[derive(Default)]
pub struct FakeTranscriber {
    pub failing: HashSet<String>,
    pub gate: Option<Gate>,
}

impl FakeTranscriber {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|name| name.to_string()).collect(),
            gate: None,
        }
    }

    pub fn gated(gate: Gate) -> Self {
        Self {
            failing: HashSet::new(),
            gate: Some(gate),
        }
    }
}

impl Transcriber for FakeTranscriber {
    fn transcribe(
        &self,
        request: &TranscribeRequest,
        on_line: &mut dyn FnMut(&LyricLine),
    ) -> anyhow::Result<Transcript> {
        let name = file_name(&request.source);
        if let Some(gate) = &self.gate {
            gate.wait(&name);
        }

        let mut track = LyricTrack::new();
        let first = LyricLine::new(0, format!("{} one", name));
        on_line(&first);
        track.push(first);

        if self.failing.contains(&name) {
            anyhow::bail!("cannot decode {}", name);
        }

        let second = LyricLine::new(1_000, format!("{} two", name));
        on_line(&second);
        track.push(second);

        Ok(Transcript {
            track,
            duration: Some(2.5),
        })
    }
}

/// Records every embed request and touches the output file
#[derive(Default)]
pub struct FakeEmbedder {
    pub calls: Mutex<Vec<EmbedRequest>>,
    pub failing: HashSet<String>,
}

impl FakeEmbedder {
    pub fn embedded(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|request| file_name(&request.source))
            .collect()
    }
}

impl TagEmbedder for FakeEmbedder {
    fn embed(&self, request: &EmbedRequest) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(request.clone());
        let name = file_name(&request.source);
        if self.failing.contains(&name) {
            anyhow::bail!("cannot tag {}", name);
        }
        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&request.output, b"tagged")?;
        Ok(())
    }
}

pub fn backends(transcriber: FakeTranscriber, embedder: Arc<FakeEmbedder>) -> Backends {
    Backends {
        transcriber: Arc::new(transcriber),
        embedder,
        skip_policy: Arc::new(ExistingOutputs),
    }
}

/// File task whose artifacts live under `dir`
pub fn file_task(dir: &Path, name: &str) -> FileTask {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name)
        .to_string();
    FileTask::new(
        name,
        dir.join("source").join(name),
        dir.join("lyrics").join(format!("{}.lrc", stem)),
        dir.join("output").join(format!("{}.mp3", stem)),
    )
}

/// Event kinds without the per-phase bookkeeping events
pub fn milestones(events: &[Event]) -> Vec<EventKind> {
    events
        .iter()
        .map(|event| event.kind.clone())
        .filter(|kind| !matches!(kind, EventKind::PhaseComplete { .. }))
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn existing(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, "[00:00.00]already here").unwrap();
}

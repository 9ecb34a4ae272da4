//! LRC lyric format
//!
//! Each line is `[mm:ss.xx]text`. Rendering and parsing are lossless down to
//! centisecond precision.

use serde::{Deserialize, Serialize};

fn format_centis(centis: u64) -> String {
    let minutes = centis / 6000;
    let secs = (centis % 6000) / 100;
    let frac = centis % 100;
    format!("[{:02}:{:02}.{:02}]", minutes, secs, frac)
}

/// A single timed lyric line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub time_ms: u64,
    pub text: String,
}

impl LyricLine {
    pub fn new(time_ms: u64, text: impl Into<String>) -> Self {
        Self {
            time_ms,
            text: text.into(),
        }
    }

    /// LRC timestamp rounded to centiseconds, e.g. `[01:05.25]`
    pub fn timestamp(&self) -> String {
        format_centis((self.time_ms + 5) / 10)
    }
}

/// An ordered set of lyric lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricTrack {
    pub lines: Vec<LyricLine>,
}

impl LyricTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: LyricLine) {
        self.lines.push(line);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Renders the track as LRC text
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("{}{}", line.timestamp(), line.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parses LRC text, skipping metadata tags, blank lines and malformed entries
    pub fn parse(source: &str) -> Self {
        let lines = source.lines().filter_map(parse_line).collect();
        Self { lines }
    }
}

fn parse_line(line: &str) -> Option<LyricLine> {
    let line = line.trim();
    let rest = line.strip_prefix('[')?;
    let (timestamp, text) = rest.split_once(']')?;

    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (minutes, seconds) = timestamp.split_once(':')?;
    let minutes: u64 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let time_ms = minutes * 60_000 + (seconds * 1000.0).round() as u64;
    Some(LyricLine::new(time_ms, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp() {
        let stamp = |ms| LyricLine::new(ms, "").timestamp();
        assert_eq!(stamp(0), "[00:00.00]");
        assert_eq!(stamp(5_500), "[00:05.50]");
        assert_eq!(stamp(65_250), "[01:05.25]");
        assert_eq!(stamp(1_004), "[00:01.00]");
        assert_eq!(stamp(1_005), "[00:01.01]");
        // Rounds into the next minute instead of printing 60 seconds
        assert_eq!(stamp(59_999), "[01:00.00]");
    }

    #[test]
    fn test_render() {
        let mut track = LyricTrack::new();
        track.push(LyricLine::new(1_500, "first"));
        track.push(LyricLine::new(62_340, "second"));

        assert_eq!(track.render(), "[00:01.50]first\n[01:02.34]second");
    }

    #[test]
    fn test_parse_skips_junk() {
        let source = "\
[ar:Somebody]
[00:01.50]first

not a lyric
[00:03.00]
[xx:yy]bad
[01:02.34] second ";

        let track = LyricTrack::parse(source);
        assert_eq!(
            track.lines,
            vec![LyricLine::new(1_500, "first"), LyricLine::new(62_340, "second")]
        );
    }

    #[test]
    fn test_parse_rendered_output() {
        let mut track = LyricTrack::new();
        track.push(LyricLine::new(0, "a"));
        track.push(LyricLine::new(123_450, "b"));

        assert_eq!(LyricTrack::parse(&track.render()), track);
    }
}

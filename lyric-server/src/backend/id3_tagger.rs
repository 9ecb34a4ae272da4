//! ID3 tag embedding
//!
//! Produces an MP3 copy of the source (re-encoding when it is not MP3 already)
//! and writes title, artist, album, SYLT synchronized lyrics and an optional
//! front cover into its ID3v2.4 tag.

use super::{EmbedRequest, Ffmpeg, TagEmbedder};
use anyhow::{Context, Result};
use id3::frame::{
    Content, Picture, PictureType, SynchronisedLyrics, SynchronisedLyricsType, TimestampFormat,
};
use id3::{Frame, Tag, TagLike, Version};
use lyric_core::lrc::LyricTrack;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// ISO-639-2 language written into the SYLT frame
const LYRICS_LANGUAGE: &str = "zho";

/// Embedder writing ID3v2.4 tags
#[derive(Debug, Clone)]
pub struct Id3Embedder {
    ffmpeg: Ffmpeg,
}

impl Id3Embedder {
    pub fn new(ffmpeg: Ffmpeg) -> Self {
        Self { ffmpeg }
    }

    fn prepare_output(&self, source: &Path, output: &Path) -> Result<()> {
        let parent = output.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;

        if is_mp3(source) {
            fs::copy(source, output)
                .with_context(|| format!("Failed to copy {}", source.display()))?;
            return Ok(());
        }

        // Converted next to the target, then moved into place
        let staging = tempfile::Builder::new()
            .suffix(".mp3")
            .tempfile_in(parent)
            .context("Failed to create staging file")?;
        self.ffmpeg.to_mp3(source, staging.path())?;
        staging
            .persist(output)
            .with_context(|| format!("Failed to move converted file to {}", output.display()))?;

        Ok(())
    }
}

impl TagEmbedder for Id3Embedder {
    fn embed(&self, request: &EmbedRequest) -> Result<()> {
        self.prepare_output(&request.source, &request.output)?;

        let mut tag = Tag::read_from_path(&request.output).unwrap_or_else(|_| Tag::new());

        tag.set_title(request.title.as_str());
        if !request.singer.is_empty() {
            tag.set_artist(request.singer.as_str());
        }
        if !request.album.is_empty() {
            tag.set_album(request.album.as_str());
        }

        if !request.track.is_empty() {
            tag.add_frame(lyrics_frame(&request.track));
        }

        if let Some(cover) = &request.cover {
            if cover.exists() {
                let data = fs::read(cover)
                    .with_context(|| format!("Failed to read cover {}", cover.display()))?;
                tag.add_frame(cover_frame(cover, data));
            } else {
                warn!("Cover image {} not found, skipping", cover.display());
            }
        }

        tag.write_to_path(&request.output, Version::Id3v24)
            .with_context(|| format!("Failed to write tags to {}", request.output.display()))?;

        debug!(
            "Embedded {} lyric lines into {}",
            request.track.len(),
            request.output.display()
        );
        Ok(())
    }
}

fn lyrics_frame(track: &LyricTrack) -> Frame {
    let content = track
        .lines
        .iter()
        .map(|line| (u32::try_from(line.time_ms).unwrap_or(u32::MAX), line.text.clone()))
        .collect();

    Frame::with_content(
        "SYLT",
        Content::SynchronisedLyrics(SynchronisedLyrics {
            lang: LYRICS_LANGUAGE.to_string(),
            timestamp_format: TimestampFormat::Ms,
            content_type: SynchronisedLyricsType::Lyrics,
            description: String::new(),
            content,
        }),
    )
}

fn cover_frame(path: &Path, data: Vec<u8>) -> Frame {
    Frame::with_content(
        "APIC",
        Content::Picture(Picture {
            mime_type: image_mime(path).to_string(),
            picture_type: PictureType::CoverFront,
            description: "Cover".to_string(),
            data,
        }),
    )
}

fn is_mp3(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
}

fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyric_core::lrc::LyricLine;

    fn request(dir: &Path, cover: Option<&str>) -> EmbedRequest {
        let mut track = LyricTrack::new();
        track.push(LyricLine::new(0, "first"));
        track.push(LyricLine::new(2_500, "second"));

        EmbedRequest {
            source: dir.join("song.mp3"),
            output: dir.join("out").join("song.mp3"),
            track,
            title: "song".to_string(),
            singer: "Singer".to_string(),
            album: String::new(),
            cover: cover.map(|name| dir.join(name)),
        }
    }

    #[test]
    fn test_embed_mp3_copies_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("song.mp3"), b"not really audio").unwrap();
        fs::write(dir.path().join("cover.png"), b"png bytes").unwrap();

        let embedder = Id3Embedder::new(Ffmpeg::new("ffmpeg"));
        let request = request(dir.path(), Some("cover.png"));
        embedder.embed(&request).unwrap();

        let tag = Tag::read_from_path(&request.output).unwrap();
        assert_eq!(tag.title(), Some("song"));
        assert_eq!(tag.artist(), Some("Singer"));
        assert_eq!(tag.album(), None);
        assert!(tag.get("SYLT").is_some());

        let picture = tag.pictures().next().unwrap();
        assert_eq!(picture.mime_type, "image/png");
        assert_eq!(picture.data, b"png bytes");
    }

    #[test]
    fn test_missing_cover_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("song.mp3"), b"not really audio").unwrap();

        let embedder = Id3Embedder::new(Ffmpeg::new("ffmpeg"));
        let request = request(dir.path(), Some("missing.jpg"));
        embedder.embed(&request).unwrap();

        let tag = Tag::read_from_path(&request.output).unwrap();
        assert_eq!(tag.pictures().count(), 0);
    }

    #[test]
    fn test_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Id3Embedder::new(Ffmpeg::new("ffmpeg"));

        assert!(embedder.embed(&request(dir.path(), None)).is_err());
    }

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime(Path::new("a.PNG")), "image/png");
        assert_eq!(image_mime(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(image_mime(Path::new("cover")), "image/jpeg");
    }
}

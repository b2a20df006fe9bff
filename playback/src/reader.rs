use anyhow::Result;
use common::Recording;
use flate2::read::GzDecoder;
use std::ffi::OsStr;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::error::PlaybackError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const RECORDING_EXTENSIONS: [&str; 3] = ["json", "replay", "gz"];

pub struct RecordingReader;

/// Headline figures for a recording, shown before it is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub duration: Duration,
    pub events: usize,
    pub mouse_movements: usize,
    /// Display names in roster order
    pub players: Vec<String>,
}

impl RecordingSummary {
    pub fn of(path: &Path, recording: &Recording) -> Self {
        Self {
            path: path.to_path_buf(),
            duration: recording.duration(),
            events: recording.events.len(),
            mouse_movements: recording.mouse_movements.len(),
            players: recording.players.iter().map(|p| p.name.clone()).collect(),
        }
    }
}

impl RecordingReader {
    /// Load a recording, gunzipping it first if the file is gzip-compressed.
    pub fn load_recording(path: &Path) -> Result<Recording, PlaybackError> {
        let bytes = fs::read(path).map_err(|source| PlaybackError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let recording = Self::parse(&bytes).map_err(|e| match e {
            ParseFailure::Io(source) => PlaybackError::Load {
                path: path.to_path_buf(),
                source,
            },
            ParseFailure::Json(source) => PlaybackError::Parse {
                path: path.to_path_buf(),
                source,
            },
        })?;
        debug!(
            ?path,
            events = recording.events.len(),
            mouse_movements = recording.mouse_movements.len(),
            "Loaded recording"
        );
        Ok(recording)
    }

    /// Load just long enough to describe the recording.
    pub fn summarize(path: &Path) -> Result<RecordingSummary, PlaybackError> {
        let recording = Self::load_recording(path)?;
        Ok(RecordingSummary::of(path, &recording))
    }

    fn parse(bytes: &[u8]) -> Result<Recording, ParseFailure> {
        if bytes.starts_with(&GZIP_MAGIC) {
            let mut json = Vec::new();
            GzDecoder::new(bytes)
                .read_to_end(&mut json)
                .map_err(ParseFailure::Io)?;
            serde_json::from_slice(&json).map_err(ParseFailure::Json)
        } else {
            serde_json::from_slice(bytes).map_err(ParseFailure::Json)
        }
    }

    pub fn list_recordings(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut recordings = Vec::new();

        fn find_recording_files(dir: &Path, recordings: &mut Vec<PathBuf>) -> Result<()> {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let path = entry.path();

                if path.is_dir() {
                    if let Err(e) = find_recording_files(&path, recordings) {
                        warn!(?path, "Skipping unreadable directory: {:#}", e);
                    }
                } else if path
                    .extension()
                    .and_then(OsStr::to_str)
                    .is_some_and(|ext| RECORDING_EXTENSIONS.contains(&ext))
                {
                    recordings.push(path);
                }
            }
            Ok(())
        }

        find_recording_files(dir, &mut recordings)?;

        // Newest first
        recordings.sort_by_cached_key(|path| {
            std::cmp::Reverse(
                path.metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH),
            )
        });

        Ok(recordings)
    }
}

enum ParseFailure {
    Io(std::io::Error),
    Json(serde_json::Error),
}

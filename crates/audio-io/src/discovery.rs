//! Data Directory Discovery

use crate::AudioError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Audio file formats recognised in data directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    /// evTAF `.cbin` recordings; recognised so they can be reported, not decoded
    Cbin,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Cbin => "cbin",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" => Some(AudioFormat::Wav),
            "cbin" => Some(AudioFormat::Cbin),
            _ => None,
        }
    }

    /// Fail for formats that can be found but not decoded
    pub fn ensure_supported(&self, path: &Path) -> Result<(), AudioError> {
        match self {
            AudioFormat::Wav => Ok(()),
            other => Err(AudioError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: other.extension().to_string(),
            }),
        }
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, AudioError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Determine the single audio format present in a directory
pub fn discover_format(dir: &Path) -> Result<AudioFormat, AudioError> {
    let entries = sorted_entries(dir)?;
    let has = |format: AudioFormat| {
        entries
            .iter()
            .any(|p| AudioFormat::from_path(p) == Some(format))
    };

    match (has(AudioFormat::Wav), has(AudioFormat::Cbin)) {
        (true, true) => Err(AudioError::AmbiguousFormat(dir.to_path_buf())),
        (true, false) => {
            info!("Found .wav files in {}, using .wav as file format", dir.display());
            Ok(AudioFormat::Wav)
        }
        (false, true) => {
            info!("Found .cbin files in {}, using .cbin as file format", dir.display());
            Ok(AudioFormat::Cbin)
        }
        (false, false) => Err(AudioError::NoAudioFiles(dir.to_path_buf())),
    }
}

/// All audio files of a format in the given directories, sorted per directory
pub fn list_audio_files(dirs: &[PathBuf], format: AudioFormat) -> Result<Vec<PathBuf>, AudioError> {
    let mut files = Vec::new();
    for dir in dirs {
        files.extend(
            sorted_entries(dir)?
                .into_iter()
                .filter(|p| AudioFormat::from_path(p) == Some(format)),
        );
    }
    Ok(files)
}

/// Annotation CSV files in a data directory
pub fn find_annotation_files(dir: &Path) -> Result<Vec<PathBuf>, AudioError> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect())
}

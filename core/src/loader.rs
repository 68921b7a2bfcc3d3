//! Radar data file loading

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::radar::RadarData;
use crate::schema::{normalize_integers, validate_data, DataError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("[docusaurus-techradar-plugin] Failed to read radar file at {}:\n{source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("[docusaurus-techradar-plugin] Failed to parse {}:\n{format}", .path.display())]
    UnsupportedFormat { path: PathBuf, format: FileFormat },
    #[error("[docusaurus-techradar-plugin] Failed to parse {}:\n{source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Radar file formats, by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    /// Recognized but not parsed
    Yaml,
    Unknown,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => FileFormat::Json,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            _ => FileFormat::Unknown,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Json => write!(f, "JSON"),
            FileFormat::Yaml => write!(f, "YAML support not yet implemented"),
            FileFormat::Unknown => write!(f, "Unsupported file format. Use .json file."),
        }
    }
}

/// Resolve `file_path` against `base_dir` into a normalized absolute path.
///
/// Absolute paths pass through. `.` and `..` components are folded
/// lexically, without touching the file system.
pub fn resolve_path(file_path: &Path, base_dir: &Path) -> PathBuf {
    let joined = base_dir.join(file_path);
    let absolute = std::path::absolute(&joined).unwrap_or(joined);

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

/// Load and validate the radar file at `file_path`, relative to `base_dir`.
///
/// The format is checked before the file is read, so an unsupported
/// extension never surfaces as a read error.
pub fn load_radar_data(file_path: &str, base_dir: &Path) -> Result<RadarData, LoadError> {
    let path = resolve_path(Path::new(file_path), base_dir);

    match FileFormat::from_path(&path) {
        FileFormat::Json => {}
        format => {
            return Err(LoadError::UnsupportedFormat {
                path: PathBuf::from(file_path),
                format,
            })
        }
    }

    debug!(path = %path.display(), "reading radar file");
    let contents = fs::read_to_string(&path).map_err(|source| LoadError::Read {
        path: path.clone(),
        source,
    })?;

    let raw: Value = serde_json::from_str(&contents).map_err(|source| LoadError::Parse {
        path: PathBuf::from(file_path),
        source,
    })?;

    validate_data(&raw, file_path)?;

    serde_json::from_value(normalize_integers(raw)).map_err(|source| LoadError::Parse {
        path: PathBuf::from(file_path),
        source,
    })
}

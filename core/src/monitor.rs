//! Watching the radar file for edits

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to create file watcher: {0}")]
    WatcherError(String),
    #[error("Failed to watch path: {0}")]
    PathError(String),
}

pub struct RadarFileMonitor {
    _watcher: RecommendedWatcher,
    _handle: thread::JoinHandle<()>,
}

/// Whether `event` touches `target`
fn affects(event: &Event, target: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p == target || p.file_name() == target.file_name())
}

impl RadarFileMonitor {
    /// Watch the radar file at `path`.
    ///
    /// The containing directory is watched rather than the file itself, so
    /// editors that save by replacing the file keep being tracked. When the
    /// file is created or modified, `changed` is set to true; the caller
    /// polls it and resets it before starting a new load cycle.
    pub fn new(path: &Path, changed: Arc<Mutex<bool>>) -> Result<Self, MonitorError> {
        let target = path.to_path_buf();
        let watch_dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let (tx, rx): (_, Receiver<Result<Event, notify::Error>>) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| MonitorError::WatcherError(e.to_string()))?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| MonitorError::PathError(e.to_string()))?;
        debug!(path = %target.display(), "watching radar file");

        let handle = thread::spawn(move || {
            for res in rx {
                match res {
                    Ok(event) if affects(&event, &target) => {
                        if let Ok(mut flag) = changed.lock() {
                            *flag = true;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "radar file watcher error"),
                }
            }
        });

        Ok(RadarFileMonitor {
            _watcher: watcher,
            _handle: handle,
        })
    }
}

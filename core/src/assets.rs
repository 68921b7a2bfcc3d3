//! Loading of the external rendering scripts
//!
//! The chart is drawn by D3 plus the radar visualization script, both pulled
//! from a CDN by the host page. Each script URL gets one shared slot: the
//! first request injects the script, later requests join the same slot, and
//! every waiter gives up after a fixed deadline. Failures are not retried;
//! call [`AssetLoader::forget`] and request again.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

pub const D3_SCRIPT_URL: &str = "https://d3js.org/d3.v7.min.js";
pub const RADAR_SCRIPT_BASE_URL: &str = "https://zalando.github.io/tech-radar/release";

/// How long to wait for scripts before reporting a timeout
pub const ASSET_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetLoadError {
    #[error("Failed to load {url}: {reason}")]
    Failed { url: String, reason: String },
    #[error("Loading timeout: {}", .pending.join(" "))]
    Timeout { pending: Vec<String> },
}

/// URL of the radar visualization script for `version`
pub fn radar_script_url(version: &str) -> String {
    format!("{RADAR_SCRIPT_BASE_URL}/radar-{version}.js")
}

/// The two scripts a radar needs, in load order
pub fn required_scripts(radar_version: &str) -> [String; 2] {
    [D3_SCRIPT_URL.to_string(), radar_script_url(radar_version)]
}

/// Host side of script loading (the page's DOM)
pub trait ScriptInjector: Send + Sync {
    /// Whether the script is already available on the page
    fn is_present(&self, url: &str) -> bool;
    /// Start loading the script. Completion is reported through
    /// [`AssetLoader::complete`].
    fn inject(&self, url: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetState {
    Pending,
    Ready,
    Failed(String),
}

/// Shared load state of one script
#[derive(Debug)]
pub struct AssetSlot {
    url: String,
    state: Mutex<AssetState>,
    done: Condvar,
}

impl AssetSlot {
    fn new(url: &str, state: AssetState) -> Self {
        AssetSlot {
            url: url.to_string(),
            state: Mutex::new(state),
            done: Condvar::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> AssetState {
        lock(&self.state).clone()
    }

    fn settle(&self, state: AssetState) {
        let mut current = lock(&self.state);
        if *current == AssetState::Pending {
            *current = state;
            self.done.notify_all();
        }
    }

    /// Block until the slot settles or `deadline` passes
    fn wait_until(&self, deadline: Instant) -> AssetState {
        let mut state = lock(&self.state);
        while *state == AssetState::Pending {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = self
                .done
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        state.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct AssetLoader {
    injector: Box<dyn ScriptInjector>,
    slots: Mutex<HashMap<String, Arc<AssetSlot>>>,
    timeout: Duration,
}

impl AssetLoader {
    pub fn new(injector: Box<dyn ScriptInjector>) -> Self {
        Self::with_timeout(injector, ASSET_LOAD_TIMEOUT)
    }

    pub fn with_timeout(injector: Box<dyn ScriptInjector>, timeout: Duration) -> Self {
        AssetLoader {
            injector,
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Get the slot for `url`, injecting the script on first request only
    pub fn request(&self, url: &str) -> Arc<AssetSlot> {
        let (slot, created) = {
            let mut slots = lock(&self.slots);
            match slots.get(url) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let state = if self.injector.is_present(url) {
                        AssetState::Ready
                    } else {
                        AssetState::Pending
                    };
                    let slot = Arc::new(AssetSlot::new(url, state));
                    slots.insert(url.to_string(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        // Inject outside the map lock: the host may report completion
        // synchronously from inside `inject`.
        if created && slot.state() == AssetState::Pending {
            debug!(url, "injecting script");
            self.injector.inject(url);
        }
        slot
    }

    /// Record the outcome of a script load reported by the host
    pub fn complete(&self, url: &str, result: Result<(), String>) {
        let slot = lock(&self.slots).get(url).cloned();
        let Some(slot) = slot else {
            debug!(url, "completion for a script that was never requested");
            return;
        };
        match result {
            Ok(()) => slot.settle(AssetState::Ready),
            Err(reason) => {
                warn!(url, %reason, "script failed to load");
                slot.settle(AssetState::Failed(reason));
            }
        }
    }

    /// Drop the slot for `url` so the next request injects again
    pub fn forget(&self, url: &str) {
        lock(&self.slots).remove(url);
    }

    /// Request every URL and wait for all of them under one deadline
    pub fn load_all(&self, urls: &[&str]) -> Result<(), AssetLoadError> {
        let slots: Vec<Arc<AssetSlot>> = urls.iter().map(|url| self.request(url)).collect();
        let deadline = Instant::now() + self.timeout;

        let mut pending = Vec::new();
        for slot in &slots {
            match slot.wait_until(deadline) {
                AssetState::Ready => {}
                AssetState::Failed(reason) => {
                    return Err(AssetLoadError::Failed {
                        url: slot.url().to_string(),
                        reason,
                    })
                }
                AssetState::Pending => pending.push(slot.url().to_string()),
            }
        }

        if pending.is_empty() {
            Ok(())
        } else {
            warn!(?pending, "timed out waiting for scripts");
            Err(AssetLoadError::Timeout { pending })
        }
    }

    /// Load D3 and the radar script for `radar_version`
    pub fn ensure_radar_scripts(&self, radar_version: &str) -> Result<(), AssetLoadError> {
        let [d3, radar] = required_scripts(radar_version);
        self.load_all(&[&d3, &radar])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Default)]
    struct RecordingInjector {
        present: Vec<String>,
        injected: Mutex<Vec<String>>,
    }

    impl ScriptInjector for Arc<RecordingInjector> {
        fn is_present(&self, url: &str) -> bool {
            self.present.iter().any(|p| p == url)
        }

        fn inject(&self, url: &str) {
            self.injected.lock().unwrap().push(url.to_string());
        }
    }

    fn loader(injector: &Arc<RecordingInjector>, timeout: Duration) -> AssetLoader {
        AssetLoader::with_timeout(Box::new(Arc::clone(injector)), timeout)
    }

    #[test]
    fn test_radar_script_url() {
        assert_eq!(
            radar_script_url("0.12"),
            "https://zalando.github.io/tech-radar/release/radar-0.12.js"
        );
    }

    #[test]
    fn test_repeated_requests_inject_once() {
        let injector = Arc::new(RecordingInjector::default());
        let loader = loader(&injector, Duration::from_millis(50));

        let first = loader.request(D3_SCRIPT_URL);
        let second = loader.request(D3_SCRIPT_URL);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(injector.injected.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_present_script_is_not_injected() {
        let injector = Arc::new(RecordingInjector {
            present: vec![D3_SCRIPT_URL.to_string()],
            ..Default::default()
        });
        let loader = loader(&injector, Duration::from_millis(50));

        assert_eq!(loader.request(D3_SCRIPT_URL).state(), AssetState::Ready);
        assert!(injector.injected.lock().unwrap().is_empty());
        assert!(loader.load_all(&[D3_SCRIPT_URL]).is_ok());
    }

    #[test]
    fn test_waiters_wake_on_completion() {
        let injector = Arc::new(RecordingInjector::default());
        let loader = Arc::new(loader(&injector, Duration::from_secs(5)));

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let loader = Arc::clone(&loader);
                thread::spawn(move || loader.ensure_radar_scripts("0.12"))
            })
            .collect();

        // Let the waiters register before completing.
        while injector.injected.lock().unwrap().len() < 2 {
            thread::yield_now();
        }
        loader.complete(D3_SCRIPT_URL, Ok(()));
        loader.complete(&radar_script_url("0.12"), Ok(()));

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Ok(()));
        }
        assert_eq!(injector.injected.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_timeout_lists_pending_scripts() {
        let injector = Arc::new(RecordingInjector::default());
        let loader = loader(&injector, Duration::from_millis(20));
        loader.request(D3_SCRIPT_URL);
        loader.complete(D3_SCRIPT_URL, Ok(()));

        let err = loader.ensure_radar_scripts("0.12").unwrap_err();
        assert_eq!(
            err,
            AssetLoadError::Timeout {
                pending: vec![radar_script_url("0.12")]
            }
        );
        assert!(err.to_string().starts_with("Loading timeout: "));
    }

    #[test]
    fn test_failure_is_sticky_until_forgotten() {
        let injector = Arc::new(RecordingInjector::default());
        let loader = loader(&injector, Duration::from_millis(20));
        loader.request(D3_SCRIPT_URL);
        loader.complete(D3_SCRIPT_URL, Err("network".to_string()));

        let err = loader.load_all(&[D3_SCRIPT_URL]).unwrap_err();
        assert!(matches!(err, AssetLoadError::Failed { .. }));
        // A late success does not overwrite the failure.
        loader.complete(D3_SCRIPT_URL, Ok(()));
        assert!(loader.load_all(&[D3_SCRIPT_URL]).is_err());
        assert_eq!(injector.injected.lock().unwrap().len(), 1);

        loader.forget(D3_SCRIPT_URL);
        assert_eq!(loader.request(D3_SCRIPT_URL).state(), AssetState::Pending);
        assert_eq!(injector.injected.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_synchronous_completion_from_inject() {
        struct Immediate {
            loader: Mutex<Option<std::sync::Weak<AssetLoader>>>,
            calls: AtomicUsize,
        }

        impl ScriptInjector for Arc<Immediate> {
            fn is_present(&self, _url: &str) -> bool {
                false
            }

            fn inject(&self, url: &str) {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let loader = self.loader.lock().unwrap().as_ref().and_then(|w| w.upgrade());
                if let Some(loader) = loader {
                    loader.complete(url, Ok(()));
                }
            }
        }

        let injector = Arc::new(Immediate {
            loader: Mutex::new(None),
            calls: AtomicUsize::new(0),
        });
        let loader = Arc::new(AssetLoader::with_timeout(
            Box::new(Arc::clone(&injector)),
            Duration::from_millis(50),
        ));
        *injector.loader.lock().unwrap() = Some(Arc::downgrade(&loader));

        assert!(loader.ensure_radar_scripts("0.12").is_ok());
        assert_eq!(injector.calls.load(Ordering::SeqCst), 2);
    }
}

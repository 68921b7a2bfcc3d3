//! Plugin lifecycle: configure, load, publish

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{merge_over_defaults, validate_options, ConfigError, PluginOptions};
use crate::loader::{load_radar_data, resolve_path, LoadError};
use crate::radar::RadarData;
use crate::PLUGIN_NAME;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("[docusaurus-techradar-plugin] Content published before it was loaded (state: {0:?})")]
    NotLoaded(LifecycleState),
    #[error("[docusaurus-techradar-plugin] Failed to serialize published data: {0}")]
    Publish(#[from] serde_json::Error),
}

/// Host-provided context for a site build
#[derive(Debug, Clone)]
pub struct LoadContext {
    pub site_dir: PathBuf,
}

/// Snapshot produced by one load cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginContent {
    pub radar_data: RadarData,
    pub radar_version: String,
    pub loaded_at: DateTime<Utc>,
}

/// What presentation code reads back under the plugin's key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginGlobalData {
    pub radar_data: RadarData,
    pub options: PluginOptions,
}

/// Shape published by earlier releases, read-only
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyGlobalData {
    radar_data: RadarData,
    radar_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PublishedShape {
    Current(PluginGlobalData),
    Legacy(LegacyGlobalData),
}

impl PluginGlobalData {
    /// Read published data in either the current or the legacy shape
    pub fn from_published(value: Value) -> Result<Self, serde_json::Error> {
        match serde_json::from_value(value)? {
            PublishedShape::Current(data) => Ok(data),
            PublishedShape::Legacy(legacy) => {
                debug!("normalizing legacy published radar data");
                let mut options = PluginGlobalData::placeholder().options;
                options.radar_version = legacy.radar_version;
                Ok(PluginGlobalData {
                    radar_data: legacy.radar_data,
                    options,
                })
            }
        }
    }

    /// Stand-in used when no published data is available, e.g. during
    /// server-side rendering.
    pub fn placeholder() -> Self {
        let quadrants = ["Q1", "Q2", "Q3", "Q4"]
            .into_iter()
            .map(|name| crate::radar::Quadrant {
                name: name.to_string(),
            })
            .collect();
        PluginGlobalData {
            radar_data: RadarData {
                title: None,
                quadrants,
                rings: vec![crate::radar::Ring {
                    name: "Ring 1".to_string(),
                    color: "#000000".to_string(),
                }],
                entries: Vec::new(),
            },
            options: PluginOptions {
                id: crate::config::DEFAULT_ID.to_string(),
                radar_file: String::new(),
                width: crate::config::DEFAULT_WIDTH,
                height: crate::config::DEFAULT_HEIGHT,
                radar_version: crate::config::DEFAULT_RADAR_VERSION.to_string(),
                colors: None,
            },
        }
    }
}

/// Host actions available while publishing content
pub trait PluginActions {
    fn set_global_data(&mut self, plugin_name: &str, plugin_id: &str, data: Value);
}

/// In-memory global data, keyed by plugin name then plugin id
#[derive(Debug, Default)]
pub struct GlobalDataStore {
    entries: HashMap<String, HashMap<String, Value>>,
}

impl GlobalDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, plugin_name: &str, plugin_id: &str) -> Option<&Value> {
        self.entries.get(plugin_name)?.get(plugin_id)
    }

    /// Published radar data for `plugin_id`, or the placeholder when nothing
    /// usable is published.
    pub fn plugin_data(&self, plugin_id: &str) -> PluginGlobalData {
        let Some(value) = self.get(PLUGIN_NAME, plugin_id) else {
            return PluginGlobalData::placeholder();
        };
        match PluginGlobalData::from_published(value.clone()) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "published radar data is unreadable, using placeholder");
                PluginGlobalData::placeholder()
            }
        }
    }
}

impl PluginActions for GlobalDataStore {
    fn set_global_data(&mut self, plugin_name: &str, plugin_id: &str, data: Value) {
        self.entries
            .entry(plugin_name.to_string())
            .or_default()
            .insert(plugin_id.to_string(), data);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Configured,
    Loaded,
    Published,
    Failed,
}

/// The tech radar plugin, configured for one site
#[derive(Debug)]
pub struct TechRadarPlugin {
    context: LoadContext,
    options: PluginOptions,
    state: LifecycleState,
}

impl TechRadarPlugin {
    /// Merge `options` over the defaults and validate them.
    ///
    /// Fails before any file is touched.
    pub fn new(context: LoadContext, options: Value) -> Result<Self, ConfigError> {
        let options = validate_options(&merge_over_defaults(options))?;
        info!(
            id = %options.id,
            radar_file = %options.radar_file,
            "tech radar plugin configured"
        );
        Ok(TechRadarPlugin {
            context,
            options,
            state: LifecycleState::Configured,
        })
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Read and validate the radar file. Each call is a new load cycle.
    pub fn load_content(&mut self) -> Result<PluginContent, PluginError> {
        match load_radar_data(&self.options.radar_file, &self.context.site_dir) {
            Ok(radar_data) => {
                info!(
                    entries = radar_data.entries.len(),
                    rings = radar_data.rings.len(),
                    "radar data loaded"
                );
                self.state = LifecycleState::Loaded;
                Ok(PluginContent {
                    radar_data,
                    radar_version: self.options.radar_version.clone(),
                    loaded_at: Utc::now(),
                })
            }
            Err(e) => {
                self.state = LifecycleState::Failed;
                Err(e.into())
            }
        }
    }

    /// Publish loaded content together with the validated options
    pub fn content_loaded(
        &mut self,
        content: PluginContent,
        actions: &mut dyn PluginActions,
    ) -> Result<(), PluginError> {
        if self.state != LifecycleState::Loaded {
            return Err(PluginError::NotLoaded(self.state));
        }
        let data = PluginGlobalData {
            radar_data: content.radar_data,
            options: self.options.clone(),
        };
        let value = serde_json::to_value(&data)?;
        actions.set_global_data(PLUGIN_NAME, &self.options.id, value);
        self.state = LifecycleState::Published;
        debug!(id = %self.options.id, "radar data published");
        Ok(())
    }

    /// Directory the presentation components are expected in.
    ///
    /// This is `theme/` next to this crate's manifest, fixed at compile time.
    /// The components themselves are not part of this crate: the host ships
    /// them there, or serves them from its own location and ignores this path.
    pub fn theme_path(&self) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("theme")
    }

    /// Files whose changes should trigger a new load cycle
    pub fn paths_to_watch(&self) -> Vec<PathBuf> {
        vec![self.radar_file_path()]
    }

    /// Absolute location of the configured radar file
    pub fn radar_file_path(&self) -> PathBuf {
        resolve_path(Path::new(&self.options.radar_file), &self.context.site_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const RADAR: &str = r##"{
        "title": "Tech Radar 2026",
        "quadrants": [{"name":"Languages"},{"name":"Tools"},{"name":"Platforms"},{"name":"Techniques"}],
        "rings": [{"name":"ADOPT","color":"#5ba300"},{"name":"TRIAL","color":"#009eb0"}],
        "entries": [{"label":"React","quadrant":0,"ring":0,"moved":0,"link":"/docs/react"}]
    }"##;

    fn site_with_radar() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/radar.json"), RADAR).unwrap();
        dir
    }

    fn context(dir: &TempDir) -> LoadContext {
        LoadContext {
            site_dir: dir.path().to_path_buf(),
        }
    }

    #[test]
    fn test_invalid_options_fail_construction() {
        let dir = TempDir::new().unwrap();
        let err = TechRadarPlugin::new(context(&dir), json!({ "radarFile": "./r.json", "width": 5000 }))
            .unwrap_err();
        assert!(err.to_string().contains("\"width\" must be less than or equal to 3000"));
    }

    #[test]
    fn test_missing_radar_file_option() {
        let dir = TempDir::new().unwrap();
        assert!(TechRadarPlugin::new(context(&dir), json!({})).is_err());
    }

    #[test]
    fn test_full_lifecycle() {
        let dir = site_with_radar();
        let mut plugin = TechRadarPlugin::new(
            context(&dir),
            json!({ "radarFile": "./data/radar.json", "radarVersion": "0.11" }),
        )
        .unwrap();
        assert_eq!(plugin.state(), LifecycleState::Configured);

        let content = plugin.load_content().unwrap();
        assert_eq!(plugin.state(), LifecycleState::Loaded);
        assert_eq!(content.radar_version, "0.11");
        assert_eq!(content.radar_data.entries[0].label, "React");

        let mut store = GlobalDataStore::new();
        plugin.content_loaded(content.clone(), &mut store).unwrap();
        assert_eq!(plugin.state(), LifecycleState::Published);

        let published = store.get(PLUGIN_NAME, "default").unwrap();
        assert_eq!(published["options"]["width"], json!(1450));
        assert_eq!(published["options"]["colors"]["grid"], json!("#bbb"));

        let data = store.plugin_data("default");
        assert_eq!(data.radar_data, content.radar_data);
        assert_eq!(&data.options, plugin.options());
    }

    #[test]
    fn test_load_failure_is_terminal_for_cycle() {
        let dir = TempDir::new().unwrap();
        let mut plugin = TechRadarPlugin::new(context(&dir), json!({ "radarFile": "missing.json" })).unwrap();
        let err = plugin.load_content().unwrap_err();
        assert!(matches!(err, PluginError::Load(LoadError::Read { .. })));
        assert_eq!(plugin.state(), LifecycleState::Failed);

        let content = PluginContent {
            radar_data: PluginGlobalData::placeholder().radar_data,
            radar_version: "0.12".to_string(),
            loaded_at: Utc::now(),
        };
        let mut store = GlobalDataStore::new();
        let err = plugin.content_loaded(content, &mut store).unwrap_err();
        assert!(matches!(err, PluginError::NotLoaded(LifecycleState::Failed)));
        assert!(store.get(PLUGIN_NAME, "default").is_none());
    }

    #[test]
    fn test_instance_id_keys_published_data() {
        let dir = site_with_radar();
        let mut plugin =
            TechRadarPlugin::new(context(&dir), json!({ "id": "team", "radarFile": "data/radar.json" })).unwrap();
        let content = plugin.load_content().unwrap();
        let mut store = GlobalDataStore::new();
        plugin.content_loaded(content, &mut store).unwrap();

        assert!(store.get(PLUGIN_NAME, "team").is_some());
        assert!(store.get(PLUGIN_NAME, "default").is_none());
        assert_eq!(store.plugin_data("default"), PluginGlobalData::placeholder());
    }

    #[test]
    fn test_legacy_shape_is_normalized() {
        let radar: Value = serde_json::from_str(RADAR).unwrap();
        let mut store = GlobalDataStore::new();
        store.set_global_data(
            PLUGIN_NAME,
            "default",
            json!({ "radarData": radar, "radarVersion": "0.10" }),
        );

        let data = store.plugin_data("default");
        assert_eq!(data.options.radar_version, "0.10");
        assert_eq!(data.radar_data.title.as_deref(), Some("Tech Radar 2026"));
    }

    #[test]
    fn test_unreadable_published_data_falls_back() {
        let mut store = GlobalDataStore::new();
        store.set_global_data(PLUGIN_NAME, "default", json!({ "radarData": 42 }));
        assert_eq!(store.plugin_data("default"), PluginGlobalData::placeholder());
    }

    #[test]
    fn test_paths_and_theme() {
        let dir = site_with_radar();
        let plugin = TechRadarPlugin::new(context(&dir), json!({ "radarFile": "./data/radar.json" })).unwrap();
        assert_eq!(plugin.paths_to_watch(), vec![dir.path().join("data/radar.json")]);
        assert!(plugin.theme_path().ends_with("theme"));
        assert_eq!(plugin.name(), "docusaurus-techradar-plugin");
    }
}

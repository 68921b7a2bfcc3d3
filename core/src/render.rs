//! Data handed to the presentation layer

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::{Colors, PluginOptions};
use crate::radar::{Entry, Quadrant, RadarData, Ring};

/// Shown when an entry points at a quadrant or ring that does not exist
const UNKNOWN: &str = "Unknown";

static NEXT_CHART_ID: AtomicU64 = AtomicU64::new(1);

/// Props a page passes to the radar component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechRadarProps {
    /// Alternate URL to fetch radar data from instead of the published data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Colors>,
}

/// Arguments for the external `radar_visualization` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationConfig {
    pub svg: String,
    pub width: u32,
    pub height: u32,
    pub colors: Colors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub quadrants: Vec<Quadrant>,
    pub rings: Vec<Ring>,
    pub entries: Vec<Entry>,
    pub print_layout: bool,
    pub links_in_new_tabs: bool,
}

impl VisualizationConfig {
    /// Props win over the published options, which win over the defaults.
    pub fn new(data: &RadarData, props: &TechRadarProps, options: &PluginOptions) -> Self {
        let colors = props
            .colors
            .as_ref()
            .or(options.colors.as_ref())
            .map(Colors::or_defaults)
            .unwrap_or_default();

        VisualizationConfig {
            svg: next_chart_id(),
            width: props.width.unwrap_or(options.width),
            height: props.height.unwrap_or(options.height),
            colors,
            title: data.title.clone(),
            quadrants: data.quadrants.clone(),
            rings: data.rings.clone(),
            entries: data.entries.clone(),
            print_layout: false,
            links_in_new_tabs: false,
        }
    }
}

/// Unique id for the svg element a chart is drawn into
pub fn next_chart_id() -> String {
    format!("radar-{}", NEXT_CHART_ID.fetch_add(1, Ordering::Relaxed))
}

/// What the entry drawer shows for a selected entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDetails {
    pub label: String,
    pub quadrant_name: String,
    pub ring_name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl EntryDetails {
    pub fn new(entry: &Entry, data: &RadarData) -> Self {
        EntryDetails {
            label: entry.label.clone(),
            quadrant_name: data.quadrant_name(entry.quadrant).unwrap_or(UNKNOWN).to_string(),
            ring_name: data.ring_name(entry.ring).unwrap_or(UNKNOWN).to_string(),
            status: entry.moved.description(),
            link: entry.link.clone(),
        }
    }

    /// Details for the entry clicked in the chart, looked up by label
    pub fn for_label(data: &RadarData, label: &str) -> Option<Self> {
        data.entry_by_label(label).map(|entry| Self::new(entry, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginGlobalData;
    use crate::radar::Moved;

    fn data() -> RadarData {
        let mut data = PluginGlobalData::placeholder().radar_data;
        data.title = Some("Radar".to_string());
        data.entries = vec![
            Entry {
                label: "Rust".to_string(),
                quadrant: 2,
                ring: 0,
                moved: Moved::In,
                link: Some("/docs/rust".to_string()),
            },
            Entry {
                label: "Perl".to_string(),
                quadrant: 1,
                ring: 3,
                moved: Moved::Out,
                link: None,
            },
        ];
        data
    }

    #[test]
    fn test_entry_details() {
        let details = EntryDetails::for_label(&data(), "Rust").unwrap();
        assert_eq!(details.quadrant_name, "Q3");
        assert_eq!(details.ring_name, "Ring 1");
        assert_eq!(details.status, "Moved in");
        assert_eq!(details.link.as_deref(), Some("/docs/rust"));
    }

    #[test]
    fn test_entry_details_unknown_ring() {
        let details = EntryDetails::for_label(&data(), "Perl").unwrap();
        assert_eq!(details.ring_name, "Unknown");
        assert_eq!(details.status, "Moved out");
        assert!(EntryDetails::for_label(&data(), "Cobol").is_none());
    }

    #[test]
    fn test_visualization_uses_options_when_props_absent() {
        let mut options = PluginGlobalData::placeholder().options;
        options.width = 800;
        options.colors = Some(Colors {
            background: Some("#000".to_string()),
            grid: None,
            inactive: None,
        });

        let config = VisualizationConfig::new(&data(), &TechRadarProps::default(), &options);
        assert_eq!((config.width, config.height), (800, 1000));
        assert_eq!(config.colors.background.as_deref(), Some("#000"));
        assert_eq!(config.colors.grid.as_deref(), Some("#bbb"));
        assert!(!config.print_layout);
        assert!(!config.links_in_new_tabs);
    }

    #[test]
    fn test_visualization_props_override() {
        let options = PluginGlobalData::placeholder().options;
        let props = TechRadarProps {
            width: Some(600),
            height: Some(500),
            colors: Some(Colors {
                background: None,
                grid: Some("#111".to_string()),
                inactive: None,
            }),
            ..Default::default()
        };

        let config = VisualizationConfig::new(&data(), &props, &options);
        assert_eq!((config.width, config.height), (600, 500));
        assert_eq!(config.colors.grid.as_deref(), Some("#111"));
        assert_eq!(config.colors.background.as_deref(), Some("#fff"));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["entries"][0]["moved"], serde_json::json!(1));
        assert_eq!(json["title"], serde_json::json!("Radar"));
    }

    #[test]
    fn test_chart_ids_are_unique() {
        let options = PluginGlobalData::placeholder().options;
        let a = VisualizationConfig::new(&data(), &TechRadarProps::default(), &options);
        let b = VisualizationConfig::new(&data(), &TechRadarProps::default(), &options);
        assert_ne!(a.svg, b.svg);
        assert!(a.svg.starts_with("radar-"));
    }
}

//! Plugin options and their validation

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::schema::{check, normalize_integers, Schema, SchemaError, Violations};

/// Default configuration values
pub const DEFAULT_ID: &str = "default";
pub const DEFAULT_WIDTH: u32 = 1450;
pub const DEFAULT_HEIGHT: u32 = 1000;
pub const DEFAULT_RADAR_VERSION: &str = "0.12";
pub const DEFAULT_BACKGROUND: &str = "#fff";
pub const DEFAULT_GRID: &str = "#bbb";
pub const DEFAULT_INACTIVE: &str = "#ddd";

/// Inclusive bounds for `width` and `height`
pub const MIN_DIMENSION: u32 = 400;
pub const MAX_DIMENSION: u32 = 3000;

#[derive(Debug, Error)]
#[error("[docusaurus-techradar-plugin] Invalid plugin options:\n{}", .violations.joined())]
pub struct ConfigError {
    pub violations: Violations,
}

/// Validated plugin options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginOptions {
    pub id: String,
    pub radar_file: String,
    pub width: u32,
    pub height: u32,
    pub radar_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Colors>,
}

/// Chart colors. Sub-fields a user leaves out stay unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive: Option<String>,
}

impl Default for Colors {
    fn default() -> Self {
        Colors {
            background: Some(DEFAULT_BACKGROUND.to_string()),
            grid: Some(DEFAULT_GRID.to_string()),
            inactive: Some(DEFAULT_INACTIVE.to_string()),
        }
    }
}

impl Colors {
    /// Fill unset sub-fields from the defaults
    pub fn or_defaults(&self) -> Colors {
        let defaults = Colors::default();
        Colors {
            background: self.background.clone().or(defaults.background),
            grid: self.grid.clone().or(defaults.grid),
            inactive: self.inactive.clone().or(defaults.inactive),
        }
    }
}

/// Options with every default filled in, except `radarFile`
pub fn default_options() -> Value {
    json!({
        "id": DEFAULT_ID,
        "width": DEFAULT_WIDTH,
        "height": DEFAULT_HEIGHT,
        "radarVersion": DEFAULT_RADAR_VERSION,
        "colors": {
            "background": DEFAULT_BACKGROUND,
            "grid": DEFAULT_GRID,
            "inactive": DEFAULT_INACTIVE,
        },
    })
}

/// Shallow-merge user options over [`default_options`].
///
/// Top-level keys replace the defaults wholesale, so a partial `colors`
/// object is kept as given. Non-object input is returned untouched and left
/// for validation to reject.
pub fn merge_over_defaults(options: Value) -> Value {
    match options {
        Value::Object(user) => {
            let mut merged = match default_options() {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            merged.extend(user);
            Value::Object(merged)
        }
        Value::Null => default_options(),
        other => other,
    }
}

fn optional_string() -> Value {
    json!({ "type": "string", "minLength": 1 })
}

fn dimension() -> Value {
    json!({ "type": "integer", "minimum": MIN_DIMENSION, "maximum": MAX_DIMENSION })
}

/// JSON Schema for plugin options; properties are listed in reporting order
pub fn options_document() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "PluginOptions",
        "type": "object",
        "properties": {
            "id": optional_string(),
            "radarFile": optional_string(),
            "width": dimension(),
            "height": dimension(),
            "radarVersion": optional_string(),
            "colors": {
                "type": "object",
                "properties": {
                    "background": optional_string(),
                    "grid": optional_string(),
                    "inactive": optional_string()
                },
                "additionalProperties": false
            }
        },
        "required": ["radarFile"],
        "additionalProperties": false
    })
}

fn options_schema() -> &'static Result<Schema, SchemaError> {
    static SCHEMA: OnceLock<Result<Schema, SchemaError>> = OnceLock::new();
    SCHEMA.get_or_init(|| Schema::compile("plugin options", options_document()))
}

/// Validate raw options and fill in defaults.
///
/// Every violation is reported, in declaration order of the option keys,
/// followed by undeclared keys.
pub fn validate_options(raw: &Value) -> Result<PluginOptions, ConfigError> {
    let violations = check(options_schema(), raw);
    if !violations.is_empty() {
        return Err(ConfigError { violations });
    }

    let normalized = merge_over_defaults(normalize_integers(raw.clone()));
    serde_json::from_value(normalized).map_err(|e| {
        let mut violations = Violations::new();
        violations.push("", e);
        ConfigError { violations }
    })
}

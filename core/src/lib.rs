//! Core library for the docusaurus tech radar plugin
//!
//! This library validates plugin options and radar data, loads the radar file
//! during a site build and publishes it for the presentation layer. It is
//! usable directly from Rust and exposed via a C FFI for non-Rust hosts.

pub mod assets;
pub mod config;
pub mod fetch;
pub mod loader;
pub mod monitor;
pub mod plugin;
pub mod radar;
pub mod render;
pub mod schema;
pub mod telemetry;
mod ffi;

pub use config::{validate_options, Colors, ConfigError, PluginOptions};
pub use ffi::*;
pub use loader::{load_radar_data, LoadError};
pub use plugin::{LoadContext, PluginContent, PluginError, PluginGlobalData, TechRadarPlugin};
pub use radar::{Entry, Moved, Quadrant, RadarData, Ring};
pub use schema::{validate_data, DataError};

/// Name the plugin registers under; first half of the published data key
pub const PLUGIN_NAME: &str = "docusaurus-techradar-plugin";

//! FFI boundary definitions for C interop

use std::cell::RefCell;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::ptr;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::error;

use crate::assets::{AssetLoadError, AssetLoader, ScriptInjector};
use crate::fetch::{resolve_radar_data, FetchError};
use crate::loader::LoadError;
use crate::monitor::RadarFileMonitor;
use crate::plugin::{GlobalDataStore, LoadContext, PluginContent, PluginError, TechRadarPlugin};
use crate::render::{EntryDetails, TechRadarProps, VisualizationConfig};

/// Opaque handle to the Rust core state
pub struct TechRadarCore {
    plugin: TechRadarPlugin,
    global_data: GlobalDataStore,
    content: Option<PluginContent>,
    monitor: Option<RadarFileMonitor>,
    radar_changed: Arc<Mutex<bool>>,
    assets: Option<AssetLoader>,
}

/// Summary of the published radar returned to C
#[repr(C)]
pub struct CRadarInfo {
    /// Chart width in pixels
    pub width: u32,
    /// Chart height in pixels
    pub height: u32,
    /// Number of rings (1-4)
    pub ring_count: u32,
    /// Number of entries
    pub entry_count: u32,
    /// Whether radar data has been published
    pub valid: bool,
}

/// Script loading callbacks supplied by the host page
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CScriptInjector {
    /// Passed back unchanged to both callbacks
    pub user_data: *mut c_void,
    /// Returns true when the script at `url` is already on the page
    pub is_present: Option<extern "C" fn(user_data: *mut c_void, url: *const c_char) -> bool>,
    /// Starts loading the script at `url`; the host reports the outcome
    /// with `techradar_core_script_loaded`
    pub inject: Option<extern "C" fn(user_data: *mut c_void, url: *const c_char)>,
}

// The host promises its callbacks and `user_data` may be used from any thread.
unsafe impl Send for CScriptInjector {}
unsafe impl Sync for CScriptInjector {}

impl ScriptInjector for CScriptInjector {
    fn is_present(&self, url: &str) -> bool {
        let (Some(is_present), Ok(url)) = (self.is_present, CString::new(url)) else {
            return false;
        };
        is_present(self.user_data, url.as_ptr())
    }

    fn inject(&self, url: &str) {
        if let (Some(inject), Ok(url)) = (self.inject, CString::new(url)) {
            inject(self.user_data, url.as_ptr());
        }
    }
}

/// Result codes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CResultCode {
    Ok = 0,
    InvalidArgument = 1,
    ConfigError = 2,
    ReadError = 3,
    FormatError = 4,
    DataError = 5,
    NotLoaded = 6,
    NetworkError = 7,
    ParseError = 8,
    AssetError = 9,
    Timeout = 10,
    MonitorError = 11,
}

impl From<&PluginError> for CResultCode {
    fn from(err: &PluginError) -> Self {
        match err {
            PluginError::Config(_) => CResultCode::ConfigError,
            PluginError::Load(LoadError::Read { .. }) => CResultCode::ReadError,
            PluginError::Load(LoadError::UnsupportedFormat { .. }) => CResultCode::FormatError,
            PluginError::Load(LoadError::Parse { .. }) => CResultCode::ParseError,
            PluginError::Load(LoadError::Data(_)) => CResultCode::DataError,
            PluginError::NotLoaded(_) => CResultCode::NotLoaded,
            PluginError::Publish(_) => CResultCode::ParseError,
        }
    }
}

impl From<&FetchError> for CResultCode {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::Status(_) | FetchError::Network(_) => CResultCode::NetworkError,
            FetchError::Parse(_) | FetchError::InvalidFormat => CResultCode::ParseError,
        }
    }
}

// Static storage for strings returned to C
// These are overwritten on each call, so C code must copy if needed
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
    static JSON_OUT: RefCell<Option<CString>> = const { RefCell::new(None) };
    static THEME_PATH_OUT: RefCell<Option<CString>> = const { RefCell::new(None) };
    static RADAR_PATH_OUT: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn stash(cell: &'static std::thread::LocalKey<RefCell<Option<CString>>>, value: &str) -> *const c_char {
    cell.with(|cell| {
        let cstring = CString::new(value).unwrap_or_default();
        let ptr = cstring.as_ptr();
        *cell.borrow_mut() = Some(cstring);
        ptr
    })
}

fn set_last_error(message: &str) {
    error!("{message}");
    stash(&LAST_ERROR, message);
}

fn clear_last_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

unsafe fn opt_str<'a>(s: *const c_char) -> Result<Option<&'a str>, CResultCode> {
    if s.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(s)
        .to_str()
        .map(Some)
        .map_err(|_| CResultCode::InvalidArgument)
}

unsafe fn opt_json(s: *const c_char) -> Result<Option<Value>, CResultCode> {
    match opt_str(s)? {
        None => Ok(None),
        Some(text) => serde_json::from_str(text).map(Some).map_err(|e| {
            set_last_error(&format!("invalid JSON argument: {e}"));
            CResultCode::InvalidArgument
        }),
    }
}

/// Install the default log subscriber (stderr, `RUST_LOG` filter)
///
/// Returns false when the `telemetry` feature is off or the host already
/// installed a subscriber.
#[no_mangle]
pub extern "C" fn techradar_core_init_logging() -> bool {
    crate::telemetry::init_default_tracing()
}

/// Create a core instance for the site at `site_dir`
///
/// `options_json` is the plugin options object as JSON, or null for none.
/// Returns null when the options are invalid; the reason is available from
/// `techradar_core_last_error`.
///
/// # Safety
/// Arguments must be valid C strings or null. The returned pointer must be
/// freed with `techradar_core_free`.
#[no_mangle]
pub unsafe extern "C" fn techradar_core_new(
    site_dir: *const c_char,
    options_json: *const c_char,
) -> *mut TechRadarCore {
    clear_last_error();
    let site_dir = match opt_str(site_dir) {
        Ok(Some(dir)) => PathBuf::from(dir),
        Ok(None) => PathBuf::from("."),
        Err(_) => {
            set_last_error("site_dir is not valid UTF-8");
            return ptr::null_mut();
        }
    };
    let options = match opt_json(options_json) {
        Ok(options) => options.unwrap_or(Value::Null),
        Err(_) => return ptr::null_mut(),
    };

    match TechRadarPlugin::new(LoadContext { site_dir }, options) {
        Ok(plugin) => Box::into_raw(Box::new(TechRadarCore {
            plugin,
            global_data: GlobalDataStore::new(),
            content: None,
            monitor: None,
            radar_changed: Arc::new(Mutex::new(false)),
            assets: None,
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free the core instance
///
/// # Safety
/// `core` must be a valid pointer returned by `techradar_core_new`
#[no_mangle]
pub unsafe extern "C" fn techradar_core_free(core: *mut TechRadarCore) {
    if !core.is_null() {
        drop(Box::from_raw(core));
    }
}

/// Message of the last failed call on this thread, or null
///
/// The string is owned by Rust and valid until the next failing call.
#[no_mangle]
pub extern "C" fn techradar_core_last_error() -> *const c_char {
    LAST_ERROR.with(|cell| cell.borrow().as_ref().map_or(ptr::null(), |s| s.as_ptr()))
}

/// Read and validate the radar file (load phase)
///
/// # Safety
/// `core` must be valid
#[no_mangle]
pub unsafe extern "C" fn techradar_core_load_content(core: *mut TechRadarCore) -> CResultCode {
    let core = match core.as_mut() {
        Some(c) => c,
        None => return CResultCode::InvalidArgument,
    };

    clear_last_error();
    match core.plugin.load_content() {
        Ok(content) => {
            core.content = Some(content);
            CResultCode::Ok
        }
        Err(e) => {
            core.content = None;
            set_last_error(&e.to_string());
            CResultCode::from(&e)
        }
    }
}

/// Publish the loaded content for presentation code
///
/// # Safety
/// `core` must be valid
#[no_mangle]
pub unsafe extern "C" fn techradar_core_content_loaded(core: *mut TechRadarCore) -> CResultCode {
    let core = match core.as_mut() {
        Some(c) => c,
        None => return CResultCode::InvalidArgument,
    };

    clear_last_error();
    let Some(content) = core.content.take() else {
        set_last_error("no loaded content to publish");
        return CResultCode::NotLoaded;
    };
    match core.plugin.content_loaded(content, &mut core.global_data) {
        Ok(()) => CResultCode::Ok,
        Err(e) => {
            set_last_error(&e.to_string());
            CResultCode::from(&e)
        }
    }
}

/// Published `{radarData, options}` as JSON (placeholder data when nothing
/// has been published)
///
/// # Safety
/// `core` must be valid
#[no_mangle]
pub unsafe extern "C" fn techradar_core_get_global_data(core: *const TechRadarCore) -> *const c_char {
    let Some(core) = core.as_ref() else {
        return ptr::null();
    };
    let data = core.global_data.plugin_data(&core.plugin.options().id);
    match serde_json::to_string(&data) {
        Ok(json) => stash(&JSON_OUT, &json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null()
        }
    }
}

/// Summary of the published radar
///
/// # Safety
/// `core` must be valid
#[no_mangle]
pub unsafe extern "C" fn techradar_core_get_info(core: *const TechRadarCore) -> CRadarInfo {
    let core = match core.as_ref() {
        Some(c) => c,
        None => {
            return CRadarInfo {
                width: 0,
                height: 0,
                ring_count: 0,
                entry_count: 0,
                valid: false,
            }
        }
    };

    let options = core.plugin.options();
    let published = core.global_data.get(core.plugin.name(), &options.id).is_some();
    let data = core.global_data.plugin_data(&options.id);
    CRadarInfo {
        width: options.width,
        height: options.height,
        ring_count: data.radar_data.rings.len() as u32,
        entry_count: data.radar_data.entries.len() as u32,
        valid: published,
    }
}

/// Directory of the bundled presentation components
///
/// The string is owned by Rust and valid until the next call to this
/// function on the same thread.
///
/// # Safety
/// `core` must be valid
#[no_mangle]
pub unsafe extern "C" fn techradar_core_theme_path(core: *const TechRadarCore) -> *const c_char {
    match core.as_ref() {
        Some(core) => stash(&THEME_PATH_OUT, &core.plugin.theme_path().to_string_lossy()),
        None => ptr::null(),
    }
}

/// Absolute path of the configured radar file
///
/// The string is owned by Rust and valid until the next call to this
/// function on the same thread.
///
/// # Safety
/// `core` must be valid
#[no_mangle]
pub unsafe extern "C" fn techradar_core_radar_file_path(core: *const TechRadarCore) -> *const c_char {
    match core.as_ref() {
        Some(core) => stash(&RADAR_PATH_OUT, &core.plugin.radar_file_path().to_string_lossy()),
        None => ptr::null(),
    }
}

/// Start watching the radar file for changes
///
/// # Safety
/// `core` must be valid
#[no_mangle]
pub unsafe extern "C" fn techradar_core_start_monitor(core: *mut TechRadarCore) -> CResultCode {
    let core = match core.as_mut() {
        Some(c) => c,
        None => return CResultCode::InvalidArgument,
    };

    // Stop existing monitor
    core.monitor = None;

    let changed_flag = Arc::clone(&core.radar_changed);
    match RadarFileMonitor::new(&core.plugin.radar_file_path(), changed_flag) {
        Ok(monitor) => {
            core.monitor = Some(monitor);
            CResultCode::Ok
        }
        Err(e) => {
            set_last_error(&e.to_string());
            CResultCode::MonitorError
        }
    }
}

/// Stop watching the radar file
///
/// # Safety
/// `core` must be valid
#[no_mangle]
pub unsafe extern "C" fn techradar_core_stop_monitor(core: *mut TechRadarCore) {
    if let Some(core) = core.as_mut() {
        core.monitor = None;
    }
}

/// Check if the radar file has changed since last check
/// Resets the flag after checking
///
/// # Safety
/// `core` must be valid
#[no_mangle]
pub unsafe extern "C" fn techradar_core_radar_changed(core: *mut TechRadarCore) -> bool {
    let core = match core.as_mut() {
        Some(c) => c,
        None => return false,
    };

    match core.radar_changed.lock() {
        Ok(mut changed) => std::mem::replace(&mut *changed, false),
        Err(_) => false,
    }
}

/// Install the host's script loading callbacks
///
/// Replaces any previous loader, forgetting scripts it was tracking.
///
/// # Safety
/// `core` must be valid; the callbacks and `user_data` must stay usable until
/// the core is freed or another injector is installed.
#[no_mangle]
pub unsafe extern "C" fn techradar_core_set_script_injector(
    core: *mut TechRadarCore,
    injector: CScriptInjector,
) -> CResultCode {
    let core = match core.as_mut() {
        Some(c) => c,
        None => return CResultCode::InvalidArgument,
    };
    if injector.inject.is_none() {
        return CResultCode::InvalidArgument;
    }
    core.assets = Some(AssetLoader::new(Box::new(injector)));
    CResultCode::Ok
}

/// Report that the script at `url` finished loading (`ok`) or failed
///
/// # Safety
/// `core` must be valid, `url` a valid C string
#[no_mangle]
pub unsafe extern "C" fn techradar_core_script_loaded(
    core: *const TechRadarCore,
    url: *const c_char,
    ok: bool,
) -> CResultCode {
    let Some(core) = core.as_ref() else {
        return CResultCode::InvalidArgument;
    };
    let Ok(Some(url)) = opt_str(url) else {
        return CResultCode::InvalidArgument;
    };
    let Some(assets) = &core.assets else {
        return CResultCode::InvalidArgument;
    };
    let result = if ok {
        Ok(())
    } else {
        Err("script load error".to_string())
    };
    assets.complete(url, result);
    CResultCode::Ok
}

/// Load D3 and the configured radar script, blocking until both are
/// available or the load timeout passes
///
/// # Safety
/// `core` must be valid
#[no_mangle]
pub unsafe extern "C" fn techradar_core_ensure_scripts(core: *const TechRadarCore) -> CResultCode {
    let Some(core) = core.as_ref() else {
        return CResultCode::InvalidArgument;
    };
    let Some(assets) = &core.assets else {
        set_last_error("no script injector installed");
        return CResultCode::InvalidArgument;
    };

    match assets.ensure_radar_scripts(&core.plugin.options().radar_version) {
        Ok(()) => CResultCode::Ok,
        Err(e) => {
            set_last_error(&e.to_string());
            match e {
                AssetLoadError::Timeout { .. } => CResultCode::Timeout,
                AssetLoadError::Failed { .. } => CResultCode::AssetError,
            }
        }
    }
}

/// Arguments for `radar_visualization` as JSON
///
/// `props_json` holds the component props (`source`, `width`, `height`,
/// `colors`) or null. When `source` is set the radar is fetched from it
/// (blocking). Returns null on failure.
///
/// # Safety
/// `core` must be valid, `props_json` a valid C string or null
#[no_mangle]
pub unsafe extern "C" fn techradar_core_visualization_json(
    core: *const TechRadarCore,
    props_json: *const c_char,
) -> *const c_char {
    let Some(core) = core.as_ref() else {
        return ptr::null();
    };
    let props: TechRadarProps = match opt_json(props_json) {
        Ok(None) => TechRadarProps::default(),
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(props) => props,
            Err(e) => {
                set_last_error(&format!("invalid props: {e}"));
                return ptr::null();
            }
        },
        Err(_) => return ptr::null(),
    };

    let published = core.global_data.plugin_data(&core.plugin.options().id);
    let data = match resolve_radar_data(props.source.as_deref(), &published) {
        Ok(data) => data,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null();
        }
    };

    let config = VisualizationConfig::new(&data, &props, &published.options);
    match serde_json::to_string(&config) {
        Ok(json) => stash(&JSON_OUT, &json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null()
        }
    }
}

/// Drawer details for the published entry labelled `label`, as JSON, or null
/// when there is no such entry
///
/// # Safety
/// `core` must be valid, `label` a valid C string
#[no_mangle]
pub unsafe extern "C" fn techradar_core_entry_details_json(
    core: *const TechRadarCore,
    label: *const c_char,
) -> *const c_char {
    let Some(core) = core.as_ref() else {
        return ptr::null();
    };
    let Ok(Some(label)) = opt_str(label) else {
        return ptr::null();
    };

    let published = core.global_data.plugin_data(&core.plugin.options().id);
    EntryDetails::for_label(&published.radar_data, label)
        .and_then(|details| serde_json::to_string(&details).ok())
        .map_or(ptr::null(), |json| stash(&JSON_OUT, &json))
}

/// Result code for a fetch of `url`, without keeping the data
///
/// Lets the host check an alternate source before rendering with it.
///
/// # Safety
/// `url` must be a valid C string
#[no_mangle]
pub unsafe extern "C" fn techradar_core_check_source(url: *const c_char) -> CResultCode {
    let Ok(Some(url)) = opt_str(url) else {
        return CResultCode::InvalidArgument;
    };
    match crate::fetch::fetch_radar_data(url) {
        Ok(_) => CResultCode::Ok,
        Err(e) => {
            set_last_error(&e.to_string());
            CResultCode::from(&e)
        }
    }
}

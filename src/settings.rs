//! Server settings
//!
//! Loaded from an optional JSON file, then overridden by environment
//! variables. Anything unreadable falls back to the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::FRAME_INTERVAL;
use crate::session::DEFAULT_GAME_NAME;

/// Env var naming the settings file
pub const SETTINGS_FILE_VAR: &str = "POOL_HALL_SETTINGS";

/// Where tables are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Lost on restart
    #[default]
    Memory,
    /// JSON-lines log on disk
    File,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::File => "file",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Some(StoreBackend::Memory),
            "file" | "disk" => Some(StoreBackend::File),
            _ => None,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listen address
    pub bind: String,
    /// Directory holding `index.html` and `game.js`
    pub static_dir: PathBuf,

    // === Storage ===
    pub store: StoreBackend,
    /// Log file for the `file` backend
    pub store_path: PathBuf,

    // === Game ===
    /// Label carried on every table
    pub game_name: String,
    /// Rack rows (2 rows = 3 object balls)
    pub rack_rows: u8,
    /// Half-width of the random nudge on non-apex balls
    pub rack_jitter: f64,
    /// Fixed RNG seed for reproducible racks; entropy when unset
    pub seed: Option<u64>,
    /// Seconds between rendered trace frames
    pub frame_interval: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            static_dir: PathBuf::from("static"),

            store: StoreBackend::Memory,
            store_path: PathBuf::from("pool-hall.jsonl"),

            game_name: DEFAULT_GAME_NAME.to_string(),
            rack_rows: 2,
            rack_jitter: 1.5,
            seed: None,
            frame_interval: FRAME_INTERVAL,
        }
    }
}

impl Settings {
    /// Settings file named by `POOL_HALL_SETTINGS` (if any), then env overrides
    pub fn load() -> Self {
        let mut settings = match std::env::var_os(SETTINGS_FILE_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => {
                log::info!("Using default settings");
                Self::default()
            }
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings
    }

    /// Parse a JSON settings file, falling back to defaults
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Bad settings file {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Cannot read {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Apply `POOL_HALL_*` overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("POOL_HALL_BIND") {
            self.bind = bind;
        }
        if let Some(dir) = lookup("POOL_HALL_STATIC_DIR") {
            self.static_dir = PathBuf::from(dir);
        }
        if let Some(store) = lookup("POOL_HALL_STORE") {
            match StoreBackend::from_str(&store) {
                Some(backend) => self.store = backend,
                None => log::warn!("Unknown store backend {:?}, keeping {}", store, self.store.as_str()),
            }
        }
        if let Some(path) = lookup("POOL_HALL_STORE_PATH") {
            self.store_path = PathBuf::from(path);
        }
        if let Some(seed) = lookup("POOL_HALL_SEED") {
            match seed.trim().parse() {
                Ok(seed) => self.seed = Some(seed),
                Err(_) => log::warn!("Ignoring non-numeric seed {:?}", seed),
            }
        }
    }
}

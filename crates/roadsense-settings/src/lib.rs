//! # roadsense-settings
//!
//! Configuration management with layered sources for the Roadsense relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`RoadsenseSettings::default()`]
//! 2. **Settings file** — `~/.roadsense/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `ROADSENSE_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use roadsense_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("listening on port {}", settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::{Arc, RwLock};

/// Global settings singleton.
///
/// `RwLock<Option<Arc<..>>>` rather than `OnceLock` so tests and startup
/// code can replace the cached value. Reads are a shared lock plus an
/// `Arc::clone`.
static SETTINGS: RwLock<Option<Arc<RoadsenseSettings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// On first call, loads from `~/.roadsense/settings.json` with env
/// overrides; afterwards returns the cached value. If loading fails the
/// compiled defaults are used and a warning is logged.
pub fn get_settings() -> Arc<RoadsenseSettings> {
    {
        let guard = SETTINGS.read().expect("settings lock poisoned");
        if let Some(ref s) = *guard {
            return Arc::clone(s);
        }
    }

    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    // Another thread may have initialized while we waited for the write lock.
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            RoadsenseSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Initialize the global settings with a specific value.
///
/// Replaces any previously cached settings. Used at server startup once the
/// config path from the CLI is known, and by tests.
pub fn init_settings(settings: RoadsenseSettings) {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(Arc::new(settings));
}

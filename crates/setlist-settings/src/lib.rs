//! # setlist-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from four layers (in priority order):
//! 1. **Compiled defaults**: [`SetlistSettings::default()`]
//! 2. **Settings file**: `~/.setlist/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `PORT`, `LEADER_PIN`, `SETLIST_*`
//! 4. **CLI flags**: applied by the binary
//!
//! The loaded value is immutable for the process lifetime and is handed to
//! components by `Arc`; there is no global settings singleton.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, load_with, settings_path};
pub use types::*;

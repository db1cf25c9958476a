//! # maira-settings
//!
//! Configuration management with layered sources for the session link.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`LinkSettings::default()`]
//! 2. **User file**: `~/.maira/link.json` (deep-merged over defaults)
//! 3. **Environment variables**: `MAIRA_*` overrides (highest priority)
//!
//! The loaded value is checked with [`LinkSettings::validate`] before use.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

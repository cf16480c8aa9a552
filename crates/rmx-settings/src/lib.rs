//! # rmx-settings
//!
//! Configuration management with layered sources for the rmx jam broker.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RmxSettings::default()`]
//! 2. **User file**: `~/.rmx/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `RMX_*` overrides (highest priority)
//!
//! Settings are loaded once by the binary and handed to the components that
//! need them; there is no global instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

//! Cross-feed price consistency monitor
//!
//! Wires the push and stream feeds into the reconciler and loads settings.

pub mod settings;

pub use settings::{load_settings, settings_from_toml, SETTINGS_ENV_PREFIX, SETTINGS_FILE};

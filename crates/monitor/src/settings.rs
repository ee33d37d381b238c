//! Settings loading
//!
//! Layers, lowest first: compiled-in defaults, optional `pricecheck.toml`,
//! `PRICECHECK__SECTION__KEY` environment variables.

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use config::builder::DefaultState;

use pricecheck_core::{CoreError, CoreResult, MonitorConfig};

pub const SETTINGS_FILE: &str = "pricecheck";
pub const SETTINGS_ENV_PREFIX: &str = "PRICECHECK";

fn invalid(e: config::ConfigError) -> CoreError {
    CoreError::InvalidConfig(e.to_string())
}

fn defaults() -> CoreResult<ConfigBuilder<DefaultState>> {
    let defaults = Config::try_from(&MonitorConfig::default()).map_err(invalid)?;
    Ok(Config::builder().add_source(defaults))
}

fn finish(builder: ConfigBuilder<DefaultState>) -> CoreResult<MonitorConfig> {
    let config: MonitorConfig = builder
        .build()
        .map_err(invalid)?
        .try_deserialize()
        .map_err(invalid)?;
    config.validate()?;
    Ok(config)
}

/// Load settings from the optional settings file and the environment.
pub fn load_settings() -> CoreResult<MonitorConfig> {
    let builder = defaults()?
        .add_source(File::with_name(SETTINGS_FILE).required(false))
        .add_source(
            Environment::with_prefix(SETTINGS_ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("push.pairs")
                .try_parsing(true),
        );
    finish(builder)
}

/// Load settings from TOML text layered over the defaults.
pub fn settings_from_toml(toml: &str) -> CoreResult<MonitorConfig> {
    finish(defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
}

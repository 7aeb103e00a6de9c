//! Configuration loading
//!
//! An optional TOML file is layered under `TRIARB__SECTION__KEY` environment
//! overrides, e.g. `TRIARB__TRADING__BASE_NOTIONAL=250`.

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use std::env;

use triarb_core::EngineConfig;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "TRIARB_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/triarb.toml";
const ENV_PREFIX: &str = "TRIARB";

/// Load from `$TRIARB_CONFIG` (or the default path) plus the environment
pub fn load() -> anyhow::Result<EngineConfig> {
    let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_from(&path)
}

/// Load from `path`; a missing file leaves every section at its default
pub fn load_from(path: &str) -> anyhow::Result<EngineConfig> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(environment());
    finish(builder.build().with_context(|| format!("reading {path}"))?)
}

/// Parse TOML text, without environment overrides
pub fn from_toml_str(toml: &str) -> anyhow::Result<EngineConfig> {
    let settings = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?;
    finish(settings)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn finish(settings: Config) -> anyhow::Result<EngineConfig> {
    let config: EngineConfig = settings
        .try_deserialize()
        .context("invalid configuration")?;
    config.validate()?;
    Ok(config)
}

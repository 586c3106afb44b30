//! Application settings: an optional `config.toml` overlaid with
//! `MIDDLEWARE_*` environment variables.

pub mod lifecycle;
pub mod log;
pub mod server;

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[doc(inline)]
pub use self::{lifecycle::Lifecycle, log::Log, server::Server};

/// Path of the configuration file read when present.
pub const DEFAULT_CONF_PATH: &str = "config.toml";

/// Prefix of environment variables overriding configuration values.
/// Nested sections are addressed with `__`, e.g.
/// `MIDDLEWARE_SERVER__BIND_PORT=9000`.
const ENV_VAR_PREFIX: &str = "MIDDLEWARE";

/// All configuration of the terminal middleware.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Conf {
    /// WebSocket server settings.
    pub server: Server,

    /// Application lifecycle settings.
    pub lifecycle: Lifecycle,

    /// Logging settings.
    pub log: Log,
}

impl Conf {
    /// Parses the configuration from [`DEFAULT_CONF_PATH`] (if present)
    /// and the environment.
    pub fn parse() -> Result<Self, config::ConfigError> {
        let mut cfg = Config::new();
        if Path::new(DEFAULT_CONF_PATH).exists() {
            let _ = cfg.merge(File::with_name(DEFAULT_CONF_PATH))?;
        }
        let _ = cfg
            .merge(Environment::with_prefix(ENV_VAR_PREFIX).separator("__"))?;
        cfg.try_into()
    }
}

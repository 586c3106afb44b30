//! Settings of the logger.

use serde::{Deserialize, Serialize};
use slog::Level;
use smart_default::SmartDefault;

/// Logging settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Log {
    /// Maximum allowed level of log entries: `TRACE`, `DEBUG`, `INFO`,
    /// `WARNING`, `ERROR` or `CRITICAL`.
    #[default(String::from("INFO"))]
    pub level: String,
}

impl Log {
    /// Returns the configured [`Level`], falling back to
    /// [`Level::Info`] on unrecognised values.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level.parse().unwrap_or(Level::Info)
    }
}

#[cfg(test)]
mod spec {
    use super::*;

    #[test]
    fn parses_configured_level() {
        assert_eq!(Log::default().level(), Level::Info);

        let log = Log {
            level: String::from("trace"),
        };
        assert_eq!(log.level(), Level::Trace);

        let log = Log {
            level: String::from("nonsense"),
        };
        assert_eq!(log.level(), Level::Info);
    }
}

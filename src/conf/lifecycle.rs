//! Settings of the application lifecycle manager.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Application lifecycle settings.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Lifecycle {
    /// How long to wait for the first AIT after a channel change before
    /// the running application is killed.
    #[default(Duration::from_secs(5))]
    #[serde(with = "humantime_serde")]
    pub ait_timeout: Duration,
}

#[cfg(test)]
mod spec {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(
            Lifecycle::default().ait_timeout,
            Duration::from_secs(5),
        );
    }
}

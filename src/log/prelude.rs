//! Re-exports of the scoped logging macros used throughout the crate.

pub use slog_scope::{crit, debug, error, info, trace, warn};

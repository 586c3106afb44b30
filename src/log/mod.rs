//! Logger initialization.

pub mod prelude;

use std::io;

use slog::{o, Drain, Duplicate, Level, Logger};
use slog_scope::GlobalLoggerGuard;

/// Builds a [`Logger`] writing JSON entries below [`Level::Warning`] to
/// `out` and the rest to `err`, with `RUST_LOG`-style filtering applied
/// through [`slog_envlogger`].
pub fn new_dual_logger<W1, W2>(out: W1, err: W2) -> Logger
where
    W1: io::Write + Send + 'static,
    W2: io::Write + Send + 'static,
{
    let out_drain = slog_json::Json::default(out).fuse();
    let err_drain = slog_json::Json::default(err).fuse();
    let drain = Duplicate(
        out_drain
            .filter(|record| !record.level().is_at_least(Level::Warning))
            .fuse(),
        err_drain
            .filter(|record| record.level().is_at_least(Level::Warning))
            .fuse(),
    )
    .fuse();
    let drain = slog_envlogger::new(drain).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

/// Initializes the global logger at the given maximum level, bridging
/// the `log` crate facade into it. The returned guard must be kept alive
/// for the lifetime of the process.
pub fn init(level: Level) -> GlobalLoggerGuard {
    let drain = new_dual_logger(io::stdout(), io::stderr())
        .filter_level(level)
        .fuse();
    let guard = slog_scope::set_global_logger(Logger::root(drain, o!()));
    let _ = slog_stdlog::init();
    guard
}

//! Logger setup for a profiler running inside someone else's process.
//!
//! The tracer only ever logs through the `log` facade. When the host process has not
//! installed a logger of its own, attach calls [`init`], which sets up `env_logger` on stderr
//! so the trace written to stdout stays readable. `RUST_LOG` still overrides the configured
//! level.

use crate::config::ProfilerConfig;

/// Installs an `env_logger` for the `eltscope` target at the configured level.
///
/// Returns false if a logger was already installed, which is not an error: the host's logger
/// is used instead.
pub fn init(config: &ProfilerConfig) -> bool {
    env_logger::Builder::new()
        .filter_module("eltscope", config.log_level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .is_ok()
}

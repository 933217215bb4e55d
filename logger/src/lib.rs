//! Logging initialization, trimmed from the teacher's `codechain-logger`:
//! same `RUST_LOG`-driven filter and colored-when-a-tty rendering, without
//! the email-alarm and structured-log-shipping machinery CodeChain layers
//! on top (no counterpart in this spec).

use std::io::Write;

use colored::Colorize;
use env_logger::Builder;
use log::LevelFilter;

/// Initializes the global logger. Safe to call more than once per process
/// (e.g. from repeated test setup); later calls are no-ops.
pub fn init() {
    init_with_default_filter(LevelFilter::Info)
}

pub fn init_with_default_filter(default: LevelFilter) {
    let stderr_is_tty = atty::is(atty::Stream::Stderr);
    let mut builder = Builder::new();
    builder.filter_level(default);
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        builder.parse_filters(&rust_log);
    }
    builder.format(move |buf, record| {
        let level = record.level();
        let target = record.target();
        let level_str = if stderr_is_tty {
            match level {
                log::Level::Error => level.to_string().red().bold(),
                log::Level::Warn => level.to_string().yellow().bold(),
                log::Level::Info => level.to_string().green(),
                log::Level::Debug => level.to_string().blue(),
                log::Level::Trace => level.to_string().normal(),
            }
        } else {
            level.to_string().normal()
        };
        writeln!(buf, "{} {} {}  {}", buf.timestamp_millis(), level_str, target, record.args())
    });
    let _ = builder.try_init();
}

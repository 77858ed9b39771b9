//! This module provides observability and diagnostics capabilities for the codec.
//!
//! Compression decisions (detected spans, chosen float parameters, bit widths) are
//! reported as structured key/value lines through the `log` facade. The
//! `log_metric!` macro is the primary tool; `enable_verbose_logging` installs an
//! `env_logger` backend for callers that do not configure one themselves.
//!
//! The macro body is guarded by `#[cfg(debug_assertions)]`, so all calls to it are
//! compiled out of release builds.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Once;

use log::LevelFilter;

use crate::error::FieldPackError;

#[doc(hidden)]
pub use log as __log;

/// Logs a structured key-value metric line at debug level, only in debug builds.
///
/// # Example
/// ```
/// use fieldpack::log_metric;
/// let span = 4;
/// log_metric!("event" = "detect_span", "outcome" = "marker", "span" = &span);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            // Collect each pair as a JSON string fragment
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+

            $crate::observability::__log::debug!("FIELDPACK_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` backend at `Info` level, printing `[LEVEL] message`.
///
/// When `log_file` is given, output is appended to that file instead of stderr.
/// Only the first call has any effect; later calls return `Ok(())` untouched.
pub fn enable_verbose_logging(log_file: Option<&Path>) -> Result<(), FieldPackError> {
    let file = match log_file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(LevelFilter::Info);

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}

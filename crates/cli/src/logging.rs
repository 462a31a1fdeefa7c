//! Logger setup.

use std::str::FromStr;

use log::LevelFilter;

use crate::error::CliError;

/// Level for this run: `--verbose` forces debug, otherwise the configured
/// level, falling back to info when it does not name a level.
#[must_use]
pub fn level(verbose: bool, configured: &str) -> LevelFilter {
    if verbose {
        return LevelFilter::Debug;
    }

    LevelFilter::from_str(configured).unwrap_or(LevelFilter::Info)
}

/// Install a stderr logger with millisecond RFC 3339 timestamps.
///
/// # Errors
///
/// Returns an error if a logger is already installed.
pub fn init(level: LevelFilter) -> Result<(), CliError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .map_err(|e| CliError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_selection() {
        assert_eq!(level(true, "warn"), LevelFilter::Debug);
        assert_eq!(level(false, "warn"), LevelFilter::Warn);
        assert_eq!(level(false, "TRACE"), LevelFilter::Trace);
        assert_eq!(level(false, "loud"), LevelFilter::Info);
    }
}

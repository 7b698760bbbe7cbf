//! Diagnostic logging on stderr. The operator's messages go to the
//! terminal instead; see `terminal.rs`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set, for a number of `-v` flags.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "nspd=warn",
        1 => "nspd=info",
        2 => "nspd=debug",
        _ => "nspd=trace",
    }
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_level() {
        assert_eq!(default_filter(0), "nspd=warn");
        assert_eq!(default_filter(1), "nspd=info");
        assert_eq!(default_filter(2), "nspd=debug");
        assert_eq!(default_filter(7), "nspd=trace");
    }

    #[test]
    fn every_default_filter_parses() {
        for v in 0..4 {
            assert!(EnvFilter::try_new(default_filter(v)).is_ok());
        }
    }
}

//! Logger setup for the desktop binary and for anyone embedding the library.

use env_logger::{Builder, Env};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Installs `env_logger` as the `log` backend.
///
/// `RUST_LOG` overrides [`DEFAULT_FILTER`]. Calling this more than once is
/// harmless: later calls leave the first logger in place.
pub fn init() {
    let env = Env::default().default_filter_or(DEFAULT_FILTER);
    if Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_ok()
    {
        log::debug!("logger initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        log::info!("still logging after a second init");
    }
}

//! Logging facilities with tracing

use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Maps the wrapper's numeric verbosity onto a tracing level.
#[must_use]
pub const fn level_for(debug_level: u32) -> LevelFilter {
    match debug_level {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn level_filter(debug_level: u32) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level_for(debug_level).into())
        .parse_lossy("")
}

fn build(debug_level: u32, filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(debug_level >= 2)
        .with_file(debug_level >= 3)
        .with_line_number(debug_level >= 3)
        .finish()
}

/// A stderr subscriber filtered by `debug_level` alone, for use with
/// [`tracing::subscriber::with_default`].
#[must_use]
pub fn subscriber(debug_level: u32) -> impl Subscriber + Send + Sync + 'static {
    build(debug_level, level_filter(debug_level))
}

/// Install a stderr subscriber. `RUST_LOG` wins over `debug_level` when set.
///
/// Returns `false` if the process already had a global subscriber; the
/// existing one is kept.
pub fn init(debug_level: u32) -> bool {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(..) => level_filter(debug_level),
    };

    tracing::subscriber::set_global_default(build(debug_level, filter)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn levels() {
        assert_eq!(level_for(0), LevelFilter::ERROR);
        assert_eq!(level_for(1), LevelFilter::WARN);
        assert_eq!(level_for(2), LevelFilter::DEBUG);
        assert_eq!(level_for(3), LevelFilter::TRACE);
        assert_eq!(level_for(42), LevelFilter::TRACE);
    }

    #[test]
    fn subscriber_honours_level() {
        tracing::subscriber::with_default(subscriber(1), || {
            assert!(tracing::enabled!(Level::WARN));
            assert!(!tracing::enabled!(Level::DEBUG));
        });

        tracing::subscriber::with_default(subscriber(3), || {
            assert!(tracing::enabled!(Level::TRACE));
        });
    }
}

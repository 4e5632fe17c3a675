//! Stderr logger for the museum binaries.
//!
//! Lines look like `[  1.234s  INFO driver] message`; the tag is the last
//! segment of the record's module path. Records from outside the
//! `augmented_museum*` crates are capped at `warn` so codec chatter does not
//! drown per-frame output.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const OWN_TARGET_PREFIX: &str = "augmented_museum";

struct MuseumLogger {
    own: LevelFilter,
    foreign: LevelFilter,
    t0: Instant,
}

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

impl MuseumLogger {
    fn new(level: LevelFilter) -> Self {
        Self {
            own: level,
            foreign: level.min(LevelFilter::Warn),
            t0: Instant::now(),
        }
    }

    fn threshold(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_TARGET_PREFIX) {
            self.own
        } else {
            self.foreign
        }
    }
}

impl Log for MuseumLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.threshold(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let secs = self.t0.elapsed().as_secs_f64();
        let mut err = std::io::stderr().lock();
        let _ = writeln!(
            err,
            "[{secs:7.3}s {:>5} {}] {}",
            record.level(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<MuseumLogger> = OnceLock::new();

/// Install the stderr logger. Only the first call has an effect.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    log::set_logger(LOGGER.get_or_init(|| MuseumLogger::new(level)))?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Span close events carry per-frame `render` and `composite` timings.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

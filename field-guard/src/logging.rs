//! Logging knobs for the engine and an optional subscriber installer.
//!
//! The engine emits `tracing` events and spans (one span per run, one per
//! relationship test and per component entry point) but never installs a
//! subscriber. Applications that want output call [`setup::init_logging`] once.

/// Controls how much per-unit detail the engine logs while it runs.
///
/// A wide dataset plans one unit per column per method plus one per column pair,
/// so unit-level and finding-level events are off unless asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log the completion and timing of every unit
    pub log_units: bool,
    /// Log every outlier finding as it is produced
    pub log_findings: bool,
    /// Longest error message or cell value copied into a log field, in bytes
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::balanced()
    }
}

impl LogConfig {
    /// Everything, with long fields.
    pub fn verbose() -> Self {
        Self {
            log_units: true,
            log_findings: true,
            max_field_length: 1024,
        }
    }

    /// Run-level events only, short fields.
    pub fn production() -> Self {
        Self {
            log_units: false,
            log_findings: false,
            max_field_length: 128,
        }
    }

    /// Unit timings without individual findings.
    pub fn balanced() -> Self {
        Self {
            log_units: true,
            log_findings: false,
            max_field_length: 256,
        }
    }
}

/// Debug event for a finished unit, emitted only when [`LogConfig::log_units`] is set.
#[macro_export]
macro_rules! log_unit {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_units {
            tracing::debug!($($arg)*);
        }
    };
}

/// Trace event for one finding, emitted only when [`LogConfig::log_findings`] is set.
#[macro_export]
macro_rules! log_finding {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_findings {
            tracing::trace!($($arg)*);
        }
    };
}

/// Cuts `value` to at most `max_length` bytes on a char boundary, marking the cut.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let end = (0..=max_length)
        .rev()
        .find(|&i| value.is_char_boundary(i))
        .unwrap_or(0);
    format!("{}…[{} bytes cut]", &value[..end], value.len() - end)
}

/// Installing a `tracing` subscriber for binaries and tests.
pub mod setup {
    use tracing::Level;

    /// Output shape of the installed subscriber.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LogFormat {
        /// Multi-line, human-oriented
        Pretty,
        /// One line per event
        Compact,
        /// One JSON object per event, for log shippers
        Json,
    }

    /// What [`init_logging`] installs.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Level for every target other than this crate
        pub default_level: Level,
        /// Level for `field_guard` targets
        pub engine_level: Level,
        pub format: LogFormat,
        /// Also emit an event when a span closes, carrying its duration
        pub span_timings: bool,
        /// Raw `EnvFilter` directives replacing the two levels above
        pub directives: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                default_level: Level::WARN,
                engine_level: Level::INFO,
                format: LogFormat::Compact,
                span_timings: false,
                directives: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON lines with span timings, engine at info.
        pub fn production() -> Self {
            Self {
                format: LogFormat::Json,
                span_timings: true,
                ..Self::default()
            }
        }

        /// Pretty output with the engine at debug.
        pub fn development() -> Self {
            Self {
                default_level: Level::INFO,
                engine_level: Level::DEBUG,
                format: LogFormat::Pretty,
                ..Self::default()
            }
        }

        pub fn with_default_level(mut self, level: Level) -> Self {
            self.default_level = level;
            self
        }

        pub fn with_engine_level(mut self, level: Level) -> Self {
            self.engine_level = level;
            self
        }

        pub fn with_format(mut self, format: LogFormat) -> Self {
            self.format = format;
            self
        }

        pub fn with_span_timings(mut self, enabled: bool) -> Self {
            self.span_timings = enabled;
            self
        }

        pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
            self.directives = Some(directives.into());
            self
        }

        /// `EnvFilter` directives for this configuration.
        pub fn filter_directives(&self) -> String {
            match &self.directives {
                Some(directives) => directives.clone(),
                None => format!(
                    "{},field_guard={}",
                    self.default_level.as_str().to_lowercase(),
                    self.engine_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs a global subscriber; `RUST_LOG` wins over the configured directives.
    ///
    /// Fails if a global subscriber is already installed.
    ///
    /// ```rust,no_run
    /// use field_guard::logging::setup::{init_logging, LogFormat, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_format(LogFormat::Json))
    ///     .expect("no subscriber installed yet");
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::fmt::format::FmtSpan;
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));
        let spans = if config.span_timings {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer = match config.format {
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_span_events(spans)
                .boxed(),
            LogFormat::Compact => tracing_subscriber::fmt::layer()
                .compact()
                .with_span_events(spans)
                .boxed(),
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_events(spans)
                .boxed(),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::{LogFormat, LoggingConfig};
    use super::*;
    use tracing::Level;

    #[test]
    fn test_presets() {
        assert_eq!(LogConfig::default(), LogConfig::balanced());
        assert!(LogConfig::verbose().log_findings);
        assert!(!LogConfig::production().log_units);
        assert_eq!(LogConfig::production().max_field_length, 128);
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("short", 10), "short");
        assert_eq!(truncate_field("0123456789abc", 10), "0123456789…[3 bytes cut]");
        // 'é' spans bytes 1..3, so a cut at 2 falls back to 1
        assert_eq!(truncate_field("aéb", 2), "a…[3 bytes cut]");
    }

    #[test]
    fn test_filter_directives() {
        let config = LoggingConfig::default().with_engine_level(Level::TRACE);
        assert_eq!(config.filter_directives(), "warn,field_guard=trace");

        let development = LoggingConfig::development();
        assert_eq!(development.format, LogFormat::Pretty);
        assert_eq!(development.filter_directives(), "info,field_guard=debug");

        let raw = LoggingConfig::production().with_directives("field_guard::analyzers=trace");
        assert_eq!(raw.filter_directives(), "field_guard::analyzers=trace");
        assert!(raw.span_timings);
    }
}

//! Logging for formguard crates.
//!
//! Output goes to stderr and is controlled from the environment:
//!
//! - `FORMGUARD_DEBUG=1` - enable debug logging
//! - `FORMGUARD_LOG_LEVEL=trace|debug|info|warn|error|off`
//! - `FORMGUARD_LOG_FORMAT=pretty|compact|json` (default `json`)
//!
//! ```rust
//! use formguard_log::{debug, info, warn};
//!
//! info!("csrf guard ready");
//! let session = "2f1c";
//! debug!(target: "formguard::csrf", "issuing token for session {}", session);
//! warn!("authenticity token rejected");
//! ```
//!
//! Callers must never pass token values to these macros.

use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Log severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            _ => Level::Off,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pretty,
    Compact,
    Json,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

/// Logging configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub debug: bool,
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            timestamps: true,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl LogConfig {
    /// Build the configuration from `FORMGUARD_*` variables and publish
    /// the level to the global atomics.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let debug = env_flag("FORMGUARD_DEBUG").unwrap_or(defaults.debug);

        let level = env::var("FORMGUARD_LOG_LEVEL")
            .ok()
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { defaults.level });

        let format = env::var("FORMGUARD_LOG_FORMAT")
            .ok()
            .and_then(|s| Format::parse(&s))
            .unwrap_or(defaults.format);

        let timestamps = env_flag("FORMGUARD_LOG_TIMESTAMPS").unwrap_or(defaults.timestamps);

        DEBUG_ENABLED.store(debug, Ordering::SeqCst);
        LOG_LEVEL.store(level as u8, Ordering::SeqCst);

        Self {
            debug,
            level,
            format,
            timestamps,
        }
    }
}

/// Force configuration loading. Called lazily by the first log line.
pub fn init() {
    Lazy::force(&CONFIG);
}

/// Current configuration.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

#[inline]
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    level != Level::Off && level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

pub fn current_level() -> Level {
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Change the minimum level at runtime.
pub fn set_level(level: Level) {
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Toggle debug mode at runtime. Enabling it lowers the level to debug.
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        set_level(Level::Debug);
    }
}

#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    let config = config();
    if !is_level_enabled(level) {
        return;
    }

    let line = render(level, target, message, config);
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", line);
}

/// Render one log line in the configured format.
pub fn render(level: Level, target: &str, message: &str, config: &LogConfig) -> String {
    match config.format {
        Format::Pretty => {
            let mut out = String::new();
            if config.timestamps {
                out.push_str(&chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f ").to_string());
            }
            out.push_str(&format!("{:5} ", level.as_str()));
            if !target.is_empty() {
                out.push_str(&format!("[{}] ", target));
            }
            out.push_str(message);
            out
        }
        Format::Compact => {
            let initial = level.as_str().chars().next().unwrap_or('?');
            if target.is_empty() {
                format!("{} {}", initial, message)
            } else {
                format!("{} {}: {}", initial, target, message)
            }
        }
        Format::Json => render_json(level, target, message, config),
    }
}

#[cfg(feature = "json")]
fn render_json(level: Level, target: &str, message: &str, config: &LogConfig) -> String {
    use serde::Serialize;

    #[derive(Serialize)]
    struct Entry<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        level: &'a str,
        target: &'a str,
        message: &'a str,
    }

    let entry = Entry {
        timestamp: config.timestamps.then(|| chrono::Utc::now().to_rfc3339()),
        level: level.as_str(),
        target,
        message,
    };

    serde_json::to_string(&entry).unwrap_or_else(|_| message.to_string())
}

#[cfg(not(feature = "json"))]
fn render_json(level: Level, target: &str, message: &str, config: &LogConfig) -> String {
    let escape = |s: &str| s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
    let timestamp = if config.timestamps {
        format!(r#""timestamp":"{}","#, chrono::Utc::now().to_rfc3339())
    } else {
        String::new()
    };
    format!(
        r#"{{{}"level":"{}","target":"{}","message":"{}"}}"#,
        timestamp,
        level.as_str(),
        escape(target),
        escape(message)
    )
}

#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Trace) {
            $crate::log($crate::Level::Trace, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::trace!(target: module_path!(), $($arg)+)
    };
}

/// Log a debug message. Enabled by `FORMGUARD_DEBUG=1` or a debug level.
///
/// ```rust
/// use formguard_log::debug;
///
/// let path = "/posts";
/// debug!(target: "formguard::csrf", "skipping verification for {}", path);
/// ```
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_debug_enabled() || $crate::is_level_enabled($crate::Level::Debug) {
            $crate::log($crate::Level::Debug, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::debug!(target: module_path!(), $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Info) {
            $crate::log($crate::Level::Info, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::info!(target: module_path!(), $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Warn) {
            $crate::log($crate::Level::Warn, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::warn!(target: module_path!(), $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Error) {
            $crate::log($crate::Level::Error, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::error!(target: module_path!(), $($arg)+)
    };
}

#[cfg(feature = "tracing")]
pub mod tracing_compat {
    //! Bridge to `tracing` for applications that already run a subscriber.

    use super::*;

    /// A subscriber filtered at the formguard level unless `RUST_LOG` is set.
    pub fn subscriber() -> impl tracing::Subscriber {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{EnvFilter, fmt};

        let directive = match config().level {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false))
    }
}

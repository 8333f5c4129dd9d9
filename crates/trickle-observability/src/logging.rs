//! Tracing subscriber setup and the tracing render observer.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};
use trickle_core::{RenderEvent, RenderObserver, RenderPhase};

/// Errors installing logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Log level for the default filter directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format (for development).
    #[default]
    Human,
    /// JSON format (for log aggregation).
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level; `RUST_LOG` directives take precedence.
    #[serde(default)]
    pub level: LogLevel,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl LogConfig {
    /// Settings with the given level and the default format.
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Switch to JSON output.
    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.level.filter().into())
            .from_env_lossy()
    }
}

/// Install a global tracing subscriber writing to stderr.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Human => tracing_fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| LoggingError::Install(err.to_string()))
}

/// Render observer that turns events into tracing events.
///
/// Phase changes log at info (errors at warn), slot and patch events at
/// debug, and discarded deliveries at trace.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    label: Option<String>,
}

impl TracingObserver {
    /// Create an observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every event with a label, such as a route or page name.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("-")
    }
}

impl RenderObserver for TracingObserver {
    fn on_event(&self, event: &RenderEvent, elapsed: Duration) {
        let elapsed_us = elapsed.as_micros() as u64;
        let label = self.label();
        match event {
            RenderEvent::Phase(RenderPhase::Error(error)) => {
                warn!(label, elapsed_us, error = %error, "render phase: error");
            }
            RenderEvent::Phase(phase) => {
                info!(label, elapsed_us, ?phase, "render phase");
            }
            RenderEvent::SlotInline { fragment } => {
                debug!(label, elapsed_us, fragment = %fragment, "slot rendered inline");
            }
            RenderEvent::SlotBlocked { fragment } => {
                debug!(label, elapsed_us, fragment = %fragment, "slot blocked");
            }
            RenderEvent::SlotDeferred { cid, fragment } => {
                debug!(label, elapsed_us, cid, fragment = %fragment, "slot deferred");
            }
            RenderEvent::PatchSent {
                cid,
                fragment,
                bytes,
            } => {
                debug!(label, elapsed_us, cid, fragment = %fragment, bytes, "patch sent");
            }
            RenderEvent::VariantSuppressed { fragment, error } => {
                debug!(label, elapsed_us, fragment = %fragment, error = %error, "variant suppressed");
            }
            RenderEvent::DeliveryDiscarded { cid } => {
                trace!(label, elapsed_us, cid, "delivery discarded");
            }
        }
    }
}

//! # Logging
//!
//! `tracing` subscriber setup for hosts embedding the bridge.
//!
//! Events from the workspace crates are written to stdout in one of three
//! formats and, when a [`LoggerSink`] is configured, mirrored to the host's
//! own logging pipeline as [`LogEntry`] values. Bridge events come from two
//! kinds of threads (blocking callers and the network thread), so thread
//! names are shown by default.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::log::LogLevel;
//! use std::sync::Arc;
//!
//! // `host_log` implements `LoggerSink`
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(host_log)),
//! )?;
//! ```
//!
//! ## Redaction
//!
//! Request headers and cookies pass through the bridge's log statements.
//! [`redact_if_sensitive`] masks credential-like names and e-mail addresses,
//! and [`redact_url`] strips userinfo, query and fragment. With
//! `redact_pii` on (the default) the sink layer applies
//! [`redact_if_sensitive`] to every field it forwards.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use bridge_traits::log::{LogEntry, LogLevel, LoggerSink};
use core_async::runtime;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::error::{Error, Result};

/// Crates logged at the configured level by the default filter
const WORKSPACE_TARGETS: &[&str] = &[
    "core_async",
    "core_runtime",
    "core_bridge",
    "bridge_traits",
    "bridge_desktop",
];

/// HTTP stack crates, capped at `warn` by the default filter
const TRANSPORT_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls"];

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_NAMES: &[&str] = &[
    "token",
    "password",
    "secret",
    "api_key",
    "api-key",
    "authorization",
    "bearer",
    "cookie",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human readable
    Pretty,
    /// One JSON object per event
    Json,
    /// Single line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates by the default filter
    pub level: LogLevel,
    /// Mask credential-like fields forwarded to the sink
    pub redact_pii: bool,
    /// Replaces the default filter, e.g. `"core_bridge=trace,reqwest=info"`
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Emit span enter/exit events (pretty) or span lists (json)
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("redact_pii", &self.redact_pii)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .field("display_target", &self.display_target)
            .field("display_thread_info", &self.display_thread_info)
            .finish()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_pii: true,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
            display_thread_info: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_pii_redaction(mut self, redact: bool) -> Self {
        self.redact_pii = redact;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Mirror events to a host logger
    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns [`Error::Config`] when the filter does not parse or a global
/// subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let sink_layer = LoggerSinkLayer::new(config.logger_sink.clone(), config.redact_pii);

    tracing_subscriber::registry()
        .with(format_layer(&config))
        .with(filter)
        .with(sink_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn format_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => {
            let spans = if config.enable_spans {
                FmtSpan::ACTIVE
            } else {
                FmtSpan::NONE
            };
            layer.pretty().with_span_events(spans).boxed()
        }
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn default_directives(level: LogLevel) -> String {
    let level = level_directive(level);
    WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .chain(TRANSPORT_TARGETS.iter().map(|target| format!("{}=warn", target)))
        .collect::<Vec<_>>()
        .join(",")
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        None => default_directives(config.level),
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", directives, e)))
}

/// Forwards events to a host [`LoggerSink`].
///
/// Delivery never blocks the emitting thread when it drives a runtime. On a
/// multi-thread runtime the entry is spawned onto it. A current-thread
/// runtime (the network thread's) may be torn down with the delivery still
/// queued, so entries emitted there are handed to a detached thread instead.
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact: bool,
}

impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>, redact: bool) -> Self {
        Self { sink, redact }
    }

    fn entry_for<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>, level: LogLevel) -> LogEntry
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let metadata = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);

        for (name, value) in fields.values {
            let value = if self.redact {
                redact_if_sensitive(&name, &value)
            } else {
                value
            };
            entry = entry.with_field(name, value);
        }

        match ctx.lookup_current() {
            Some(span) => entry.with_span_id(span.name()),
            None => entry,
        }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };

        let level = match *event.metadata().level() {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        };
        if level < sink.min_level() {
            return;
        }

        let entry = self.entry_for(event, &ctx, level);
        let sink = Arc::clone(sink);

        match runtime::Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == runtime::RuntimeFlavor::MultiThread => {
                handle.spawn(async move {
                    if let Err(err) = sink.log(entry).await {
                        eprintln!("LoggerSink error: {}", err);
                    }
                });
            }
            Ok(_) => {
                let spawned = std::thread::Builder::new()
                    .name("log-sink".to_string())
                    .spawn(move || deliver(sink, entry));
                if let Err(err) = spawned {
                    eprintln!("LoggerSink error: {}", err);
                }
            }
            Err(_) => deliver(sink, entry),
        }
    }
}

fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    if let Err(err) = runtime::block_on(sink.log(entry)) {
        eprintln!("LoggerSink error: {}", err);
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: HashMap<String, String>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}

fn is_sensitive_name(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SENSITIVE_NAMES.iter().any(|sensitive| name.contains(sensitive))
}

fn mask_email(value: &str) -> Option<String> {
    if value.contains("://") || !value.contains('.') {
        return None;
    }
    let (local, _) = value.split_once('@')?;
    let first = local.chars().next().map(String::from).unwrap_or_default();
    Some(format!("{}***@{}", first, REDACTED))
}

/// Mask `value` when `name` looks like a credential or `value` looks like
/// an e-mail address.
///
/// Names are matched case-insensitively, so tracing field names and HTTP
/// header names (`Authorization`, `Set-Cookie`) are both covered.
pub fn redact_if_sensitive(name: &str, value: &str) -> String {
    if is_sensitive_name(name) {
        return REDACTED.to_string();
    }
    mask_email(value).unwrap_or_else(|| value.to_string())
}

/// Strip userinfo, query and fragment from a URL before logging it.
///
/// ```ignore
/// assert_eq!(
///     redact_url("https://user:pw@sync.example.com:8443/command?token=abc"),
///     "https://sync.example.com:8443/command"
/// );
/// ```
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = url::Url::parse(raw) else {
        return "[INVALID URL]".to_string();
    };

    // Fails only for cannot-be-a-base URLs, which have no userinfo
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

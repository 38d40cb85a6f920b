use std::sync::Arc;

use tracing::{level_filters::LevelFilter, Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;

/// Crates whose events follow the configured level
const CRATE_TARGETS: [&str; 4] = ["rolecast", "rolecast_core", "rolecast_hub", "rolecast_api"];

/// Initialize structured logging based on configuration
///
/// Supports both JSON (production) and pretty (development) formats
/// with configurable log levels and optional file output.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let default_filter = default_filter(&config.level)?;

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(default_filter);

    build_subscriber(config, env_filter)?.try_init()?;
    Ok(())
}

/// Assemble the subscriber without installing it
fn build_subscriber(
    config: &LoggingConfig,
    filter: EnvFilter,
) -> anyhow::Result<impl Subscriber + Send + Sync + 'static> {
    let writer = make_writer(config.file_path.as_deref())?;
    let ansi = config.file_path.is_none();

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(format_layer(&config.format, writer, ansi)))
}

fn format_layer<S>(
    format: &str,
    writer: BoxMakeWriter,
    ansi: bool,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let base = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_line_number(true)
        .with_ansi(ansi);

    if format == "json" {
        base.json()
            .with_current_span(true)
            .with_span_list(true)
            .with_file(true)
            .with_writer(writer)
            .boxed()
    } else {
        base.pretty().with_file(false).with_writer(writer).boxed()
    }
}

/// Append to `file_path` when set, stdout otherwise
fn make_writer(file_path: Option<&str>) -> anyhow::Result<BoxMakeWriter> {
    match file_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Ok(BoxMakeWriter::new(Arc::new(file)))
        }
        None => Ok(BoxMakeWriter::new(std::io::stdout)),
    }
}

/// Configured level for our crates and HTTP tracing, `warn` for dependencies
fn default_filter(level: &str) -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::try_new(default_directives(parse_log_level(level)?))?)
}

fn default_directives(level: Level) -> String {
    let level = LevelFilter::from_level(level);
    let mut directives = vec![LevelFilter::WARN.to_string()];
    directives.extend(CRATE_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.push(format!("tower_http={level}"));
    directives.join(",")
}

/// Parse log level string to tracing Level
fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}

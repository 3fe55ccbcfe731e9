//! Logging setup for the CRE harness.
//!
//! Stdout gets compact text, an optional log file gets JSON. The gRPC and HTTP transport crates are
//! held at `warn` unless `RUST_LOG` says otherwise.

use dotenvy::dotenv;
use std::{env, io::stdout, path::PathBuf, str::FromStr};
use strum::EnumString;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

const ENV_LOG_FILE: &str = "CRE_LOG_FILE";
const ENV_LOG_DIR: &str = "CRE_LOG_DIR";
const ENV_LOG_FORMAT_FILE: &str = "CRE_LOG_FORMAT_FILE";
const ENV_LOG_FORMAT_STDOUT: &str = "CRE_LOG_FORMAT_STDOUT";
const ENV_LOG_ROTATION: &str = "CRE_LOG_ROTATION";

/// Filter used when `RUST_LOG` is unset or empty.
pub const DEFAULT_FILTER: &str =
    "info,cre_harness=debug,h2=warn,hyper=warn,hyper_util=warn,tower=warn,alloy_transport_http=warn";

#[derive(EnumString, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
enum LogFormat {
    Text,
    Json,
}

#[derive(EnumString, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
enum LogRotation {
    #[default]
    Never,
    Daily,
    Hourly,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Self::NEVER,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Hourly => Self::HOURLY,
        }
    }
}

/// Logging options read from the `CRE_LOG_*` env vars.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    file: Option<String>,
    dir: PathBuf,
    format_file: LogFormat,
    format_stdout: LogFormat,
    rotation: LogRotation,
    filter: String,
}

impl LogSettings {
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| non_empty(key).and_then(|v| v.to_lowercase().parse().ok());

        Self {
            file: non_empty(ENV_LOG_FILE),
            dir: non_empty(ENV_LOG_DIR).map_or_else(|| PathBuf::from("."), PathBuf::from),
            format_file: parsed(ENV_LOG_FORMAT_FILE).unwrap_or(LogFormat::Json),
            format_stdout: parsed(ENV_LOG_FORMAT_STDOUT).unwrap_or(LogFormat::Text),
            rotation: non_empty(ENV_LOG_ROTATION)
                .and_then(|v| LogRotation::from_str(&v.to_lowercase()).ok())
                .unwrap_or_default(),
            filter: non_empty("RUST_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_string()),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder().parse_lossy(&self.filter)
    }
}

/// A boxed layer for tracing
pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Initialize logging.
///
/// Loads `.env` first. The returned guards must be held for the lifetime of the program, otherwise
/// buffered log lines are dropped.
///
/// Env var options:
/// - `CRE_LOG_FILE` - file name to write logs to. If empty, will not write logs to file.
/// - `CRE_LOG_DIR` - directory of the log file. Defaults to the current directory.
/// - `CRE_LOG_ROTATION` - `never` (default), `daily` or `hourly`.
/// - `CRE_LOG_FORMAT_FILE` - `json` (default) or `text`.
/// - `CRE_LOG_FORMAT_STDOUT` - `text` (default) or `json`.
/// - `RUST_LOG` - filter directives, [`DEFAULT_FILTER`] when unset.
pub fn init_logging() -> eyre::Result<Vec<WorkerGuard>> {
    dotenv().ok();
    let settings = LogSettings::from_env();

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(stdout());
    let mut guards = vec![stdout_guard];
    let mut layers: Vec<BoxedLayer<Registry>> =
        vec![layer(settings.format_stdout, stdout_writer, settings.env_filter())];

    if let Some(file) = &settings.file {
        let appender = RollingFileAppender::new(settings.rotation.into(), &settings.dir, file);
        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        guards.push(file_guard);
        layers.push(layer(settings.format_file, file_writer, settings.env_filter()));
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        file = settings.file.as_deref().unwrap_or_default(),
        dir = %settings.dir.display(),
        rotation = ?settings.rotation,
        format_file = ?settings.format_file,
        format_stdout = ?settings.format_stdout,
        filter = settings.filter,
        "logging configured"
    );

    Ok(guards)
}

fn layer(format: LogFormat, writer: NonBlocking, filter: EnvFilter) -> BoxedLayer<Registry> {
    match format {
        LogFormat::Json => fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Text => fmt::layer().compact().with_writer(writer).with_filter(filter).boxed(),
    }
}

use std::{fs::OpenOptions, io, path::PathBuf, sync::Mutex};

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::writer::BoxMakeWriter};

const FILTER_ENV: &str = "NBTOP_LOG";

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Where log lines go.
#[derive(Clone, Debug)]
pub enum LogSink {
    Stderr,
    File(PathBuf),
    /// The interactive view owns the terminal, so stderr is off limits.
    Discard,
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level: LogLevel,
    pub sink: LogSink,
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

pub fn init(config: &LogConfig) -> Result<(), InitError> {
    let writer = match &config.sink {
        LogSink::Stderr => BoxMakeWriter::new(io::stderr),
        LogSink::Discard => BoxMakeWriter::new(io::sink),
        LogSink::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(config.level))
        .with_target(config.level >= LogLevel::Debug)
        .with_ansi(matches!(config.sink, LogSink::Stderr))
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| InitError::Configure(err.to_string()))
}

fn build_env_filter(level: LogLevel) -> EnvFilter {
    if let Ok(filter) = std::env::var(FILTER_ENV) {
        return EnvFilter::new(filter);
    }
    // Dependency chatter drowns out the tick log below debug.
    EnvFilter::new(format!(
        "{level},hyper=warn,reqwest=warn,rustls=warn",
        level = level.to_filter()
    ))
}

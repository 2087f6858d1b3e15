use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use url::Url;

use crate::{error::ApiError, logging::LogLevel};

/// Command-line arguments for nbtop.
#[derive(Debug, Parser)]
#[command(name = "nbtop", version, about = "Resource monitor for Jupyter notebook servers")]
pub struct Args {
    /// Notebook server url (e.g. http://localhost:8888)
    #[arg(short, long, env = "NBTOP_URL")]
    pub url: String,

    /// Refresh interval in seconds
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub rate: u64,

    /// Skip verification of TLS certificates
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// How kernel memory is displayed
    #[arg(short, long, value_enum, default_value_t = MemoryMode::Percent)]
    pub memory: MemoryMode,

    /// Display full notebook URLs instead of paths
    #[arg(short, long)]
    pub links: bool,

    /// Keep notebook file extensions
    #[arg(short, long)]
    pub extension: bool,

    /// Prompt for the server password and log in first
    #[arg(short, long)]
    pub password: bool,

    /// Shut down every notebook on the server and exit
    #[arg(long, conflicts_with = "flat")]
    pub shutdown_all: bool,

    /// Print a plain table every tick instead of the interactive view
    #[arg(long, alias = "debug")]
    pub flat: bool,

    /// Log verbosity
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Append logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Which memory figure the kernel rows show.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MemoryMode {
    #[default]
    Percent,
    Absolute,
}

impl MemoryMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Percent => "MEM %",
            Self::Absolute => "MEM",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Interactive,
    Flat,
    ShutdownAll,
}

/// How session records turn into display names.
#[derive(Clone, Debug, Default)]
pub struct Naming {
    /// Server base used to build `/notebooks/...` links; `None` shows paths.
    pub link_base: Option<Url>,
    pub keep_extension: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: Url,
    pub tick: Duration,
    pub verify_tls: bool,
    pub memory: MemoryMode,
    pub naming: Naming,
    pub prompt_password: bool,
    pub mode: Mode,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self, ApiError> {
        let base_url = parse_base_url(&args.url)?;
        let mode = if args.shutdown_all {
            Mode::ShutdownAll
        } else if args.flat {
            Mode::Flat
        } else {
            Mode::Interactive
        };
        Ok(Self {
            naming: Naming {
                link_base: args.links.then(|| base_url.clone()),
                keep_extension: args.extension,
            },
            base_url,
            tick: Duration::from_secs(args.rate),
            verify_tls: !args.insecure,
            memory: args.memory,
            prompt_password: args.password,
            mode,
        })
    }

    /// Base url as typed by the user minus any trailing slash.
    pub fn server_label(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw.trim()).map_err(|source| ApiError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ApiError::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}

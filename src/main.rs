mod app;
mod client;
mod config;
mod error;
mod logging;
mod process;
mod reconcile;
mod render;
mod session;
mod terminal;
mod viewport;

use std::{
    io::{self, IsTerminal},
    process::ExitCode,
};

use clap::Parser;
use color_eyre::Result;

use crate::{
    app::{Dashboard, NoInput, TickSchedule},
    client::{NotebookClient, NotebookServer},
    config::{Args, Config, Mode},
    error::ApiError,
    logging::{LogConfig, LogSink},
    process::SystemSampler,
    render::{FlatRenderer, TuiRenderer},
    terminal::{CrosstermInput, TerminalGuard},
};

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let args = Args::parse();

    let sink = match (&args.log_file, args.shutdown_all || args.flat) {
        (Some(path), _) => LogSink::File(path.clone()),
        (None, true) => LogSink::Stderr,
        (None, false) => LogSink::Discard,
    };
    logging::init(&LogConfig {
        level: args.log_level,
        sink,
    })?;

    match run(&args) {
        Ok(code) => Ok(code),
        Err(err) => match err.downcast_ref::<ApiError>() {
            Some(api) => {
                tracing::error!(%api, "fatal");
                eprintln!("{api}");
                Ok(ExitCode::from(api.exit_code()))
            }
            None => Err(err),
        },
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let config = Config::from_args(args)?;
    let mut client = NotebookClient::new(&config)?;
    if config.prompt_password {
        let password = rpassword::prompt_password("Password: ")?;
        client.login(&password)?;
    }

    // Fail on misconfiguration before the terminal is taken over.
    client.sessions()?;

    match config.mode {
        Mode::ShutdownAll => {
            if app::shutdown_all(&client, &mut io::stdout())? {
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("no running notebooks found");
                Ok(ExitCode::from(1))
            }
        }
        Mode::Flat => {
            let mut dashboard = dashboard(&config, client);
            let stdout = io::stdout();
            let clear = stdout.is_terminal();
            dashboard.run(&mut FlatRenderer::new(stdout, clear), &mut NoInput)?;
            Ok(ExitCode::SUCCESS)
        }
        Mode::Interactive => {
            let mut dashboard = dashboard(&config, client);
            let (_guard, terminal) = TerminalGuard::acquire()?;
            dashboard.run(&mut TuiRenderer::new(terminal), &mut CrosstermInput)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn dashboard(config: &Config, client: NotebookClient) -> Dashboard<NotebookClient, SystemSampler> {
    Dashboard::new(
        client,
        SystemSampler::new(),
        config.server_label(),
        config.memory,
        TickSchedule {
            interval: config.tick,
        },
    )
}

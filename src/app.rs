use std::time::Duration;

use color_eyre::Result;

use crate::{
    client::NotebookServer,
    config::MemoryMode,
    process::ProcessSampler,
    reconcile::{Row, reconcile},
    render::{Renderer, View},
    viewport::Viewport,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    Home,
    End,
    Shutdown,
    Quit,
    Noop,
}

/// How long to wait for input before the next tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Wait up to the duration, returning as soon as a key arrives.
    Poll(Duration),
    /// Nothing to act on: sleep the full duration, then drain without blocking.
    Sleep(Duration),
}

pub trait InputSource {
    fn next_command(&mut self, mode: ReadMode) -> Result<Command>;
}

/// Input source for the flat listing: there is nothing to read, only wait.
pub struct NoInput;

impl InputSource for NoInput {
    fn next_command(&mut self, mode: ReadMode) -> Result<Command> {
        let (ReadMode::Poll(wait) | ReadMode::Sleep(wait)) = mode;
        std::thread::sleep(wait);
        Ok(Command::Noop)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TickSchedule {
    pub interval: Duration,
}

impl TickSchedule {
    pub fn read_mode(&self, row_count: usize) -> ReadMode {
        if row_count == 0 {
            ReadMode::Sleep(self.interval)
        } else {
            ReadMode::Poll(self.interval)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// The reconciliation loop: sample, fetch, join, draw, react.
pub struct Dashboard<S, P> {
    server: S,
    sampler: P,
    server_label: String,
    memory: MemoryMode,
    schedule: TickSchedule,
    rows: Vec<Row>,
    viewport: Viewport,
    status: Option<String>,
}

impl<S: NotebookServer, P: ProcessSampler> Dashboard<S, P> {
    pub fn new(
        server: S,
        sampler: P,
        server_label: impl Into<String>,
        memory: MemoryMode,
        schedule: TickSchedule,
    ) -> Self {
        Self {
            server,
            sampler,
            server_label: server_label.into(),
            memory,
            schedule,
            rows: Vec::new(),
            viewport: Viewport::default(),
            status: None,
        }
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[cfg(test)]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// One sample and one fetch, joined into this tick's rows.
    ///
    /// Transport failures propagate and end the loop.
    pub fn refresh(&mut self) -> Result<()> {
        let stats = self.sampler.sample();
        let sessions = self.server.sessions()?;
        self.rows = reconcile(&stats, sessions);
        self.viewport.sync(self.rows.len());
        tracing::debug!(
            rows = self.rows.len(),
            processes = stats.len(),
            "reconciled"
        );
        Ok(())
    }

    pub fn run<R, I>(&mut self, renderer: &mut R, input: &mut I) -> Result<()>
    where
        R: Renderer,
        I: InputSource,
    {
        loop {
            self.refresh()?;
            if let Some(height) = renderer.body_height()? {
                self.viewport.resize(height);
            }
            renderer.render(&self.view())?;

            let mode = self.schedule.read_mode(self.rows.len());
            let command = input.next_command(mode)?;
            if self.dispatch(command) == Flow::Quit {
                tracing::info!("quit requested");
                return Ok(());
            }
        }
    }

    fn view(&self) -> View<'_> {
        View {
            server: &self.server_label,
            rows: &self.rows,
            viewport: &self.viewport,
            memory: self.memory,
            status: self.status.as_deref(),
        }
    }

    fn dispatch(&mut self, command: Command) -> Flow {
        match command {
            Command::Quit => return Flow::Quit,
            Command::MoveDown => self.viewport.move_down(),
            Command::MoveUp => self.viewport.move_up(),
            Command::PageDown => self.viewport.page_down(),
            Command::PageUp => self.viewport.page_up(),
            Command::Home => self.viewport.jump_top(),
            Command::End => self.viewport.jump_bottom(),
            Command::Shutdown => self.shutdown_selected(),
            Command::Noop => {}
        }
        Flow::Continue
    }

    /// Best effort: the outcome is only displayed, never retried. The next
    /// tick's listing shows whether the kernel actually went away.
    fn shutdown_selected(&mut self) {
        let Some(row) = self.viewport.selected().and_then(|i| self.rows.get(i)) else {
            return;
        };
        let outcome = match self.server.shutdown(&row.kernel_id) {
            Ok(status) => status.to_string(),
            Err(err) => {
                tracing::warn!(kernel = %row.kernel_id, %err, "shutdown request failed");
                "failed".to_string()
            }
        };
        self.status = Some(format!("{}: {outcome}", row.display_name));
        self.viewport.anticipate_removal();
    }
}

/// Shuts down every session the server lists and reports each outcome.
///
/// Returns `false` when there was nothing to shut down.
pub fn shutdown_all<S: NotebookServer>(server: &S, out: &mut impl std::io::Write) -> Result<bool> {
    let sessions = server.sessions()?;
    if sessions.is_empty() {
        return Ok(false);
    }
    for session in sessions {
        let status = server.shutdown(&session.kernel_id)?;
        writeln!(out, "{}: {status}", session.display_name)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::VecDeque,
    };

    use ratatui::{Terminal, backend::TestBackend};

    use super::*;
    use crate::{
        error::ApiError,
        process::{ProcessStat, ProcessStats},
        render::TuiRenderer,
        session::SessionRecord,
    };

    /// Serves scripted listings; a kernel disappears once it is shut down.
    #[derive(Default)]
    struct FakeServer {
        sessions: RefCell<Vec<SessionRecord>>,
        failing: RefCell<VecDeque<bool>>,
        shutdowns: RefCell<Vec<String>>,
        ignore_shutdown: bool,
    }

    impl FakeServer {
        fn with_kernels(ids: &[&str]) -> Self {
            Self {
                sessions: RefCell::new(
                    ids.iter()
                        .map(|id| SessionRecord {
                            kernel_id: id.to_string(),
                            display_name: format!("nb/{id}"),
                        })
                        .collect(),
                ),
                ..Self::default()
            }
        }
    }

    impl NotebookServer for FakeServer {
        fn sessions(&self) -> Result<Vec<SessionRecord>, ApiError> {
            if self.failing.borrow_mut().pop_front().unwrap_or(false) {
                return Err(ApiError::Tls {
                    url: "https://nb".into(),
                });
            }
            Ok(self.sessions.borrow().clone())
        }

        fn shutdown(&self, kernel_id: &str) -> Result<u16, ApiError> {
            self.shutdowns.borrow_mut().push(kernel_id.to_string());
            if !self.ignore_shutdown {
                self.sessions
                    .borrow_mut()
                    .retain(|s| s.kernel_id != kernel_id);
            }
            Ok(204)
        }
    }

    struct FakeSampler(ProcessStats);

    impl ProcessSampler for FakeSampler {
        fn sample(&mut self) -> ProcessStats {
            self.0.clone()
        }
    }

    fn sampler(ids: &[&str]) -> FakeSampler {
        FakeSampler(
            ids.iter()
                .map(|id| {
                    (
                        id.to_string(),
                        ProcessStat {
                            kernel_id: id.to_string(),
                            cpu_percent: 10.0,
                            mem_percent: 1.0,
                            mem_bytes: 1,
                            started_at: 0,
                        },
                    )
                })
                .collect(),
        )
    }

    /// Replays commands and records the read mode asked for each time.
    struct Script {
        commands: VecDeque<Command>,
        modes: Vec<ReadMode>,
    }

    impl Script {
        fn new(commands: &[Command]) -> Self {
            Self {
                commands: commands.iter().copied().collect(),
                modes: Vec::new(),
            }
        }
    }

    impl InputSource for Script {
        fn next_command(&mut self, mode: ReadMode) -> Result<Command> {
            self.modes.push(mode);
            Ok(self.commands.pop_front().unwrap_or(Command::Quit))
        }
    }

    fn dashboard<S: NotebookServer>(server: S, sampler: FakeSampler) -> Dashboard<S, FakeSampler> {
        Dashboard::new(
            server,
            sampler,
            "http://nb",
            MemoryMode::Percent,
            TickSchedule {
                interval: Duration::from_millis(5),
            },
        )
    }

    fn tui(height: u16) -> TuiRenderer<TestBackend> {
        TuiRenderer::new(Terminal::new(TestBackend::new(80, height)).unwrap())
    }

    #[test]
    fn rows_follow_sessions_with_sentinels_for_missing_processes() {
        let mut app = dashboard(FakeServer::with_kernels(&["a", "b"]), sampler(&["b", "zzz"]));
        app.refresh().unwrap();
        let rows = app.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].stat.is_none());
        assert_eq!(rows[0].cpu_cell(), "-99");
        assert_eq!(rows[1].cpu_cell(), "10.0");
    }

    #[test]
    fn shutdown_targets_the_cursor_row() {
        let server = FakeServer::with_kernels(&["a", "b", "c"]);
        let mut app = dashboard(server, sampler(&[]));
        let mut input = Script::new(&[Command::MoveDown, Command::Shutdown]);
        app.run(&mut tui(10), &mut input).unwrap();

        assert_eq!(*app.server.shutdowns.borrow(), ["b"]);
        let ids: Vec<_> = app.rows().iter().map(|r| r.kernel_id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(app.viewport().cursor_line(), 2);
        assert_eq!(app.status.as_deref(), Some("nb/b: 204"));
    }

    #[test]
    fn shutting_down_the_last_row_moves_the_cursor_up() {
        let server = FakeServer::with_kernels(&["a", "b", "c"]);
        let mut app = dashboard(server, sampler(&[]));
        let mut input = Script::new(&[Command::End, Command::Shutdown, Command::Noop]);
        app.run(&mut tui(10), &mut input).unwrap();

        assert_eq!(*app.server.shutdowns.borrow(), ["c"]);
        assert_eq!(app.rows().len(), 2);
        assert_eq!(app.viewport().cursor_line(), 2);
    }

    #[test]
    fn failed_shutdown_leaves_the_row_for_the_next_tick() {
        let server = FakeServer {
            ignore_shutdown: true,
            ..FakeServer::with_kernels(&["a", "b"])
        };
        let mut app = dashboard(server, sampler(&[]));
        let mut input = Script::new(&[Command::End, Command::Shutdown]);
        app.run(&mut tui(10), &mut input).unwrap();

        assert_eq!(app.rows().len(), 2);
        // The cursor stepped off the last row once; the row itself stays listed.
        assert_eq!(app.viewport().cursor_line(), 1);
    }

    #[test]
    fn no_rows_means_sleeping_instead_of_polling() {
        let mut app = dashboard(FakeServer::default(), sampler(&[]));
        let mut input = Script::new(&[Command::Shutdown, Command::MoveDown]);
        app.run(&mut tui(10), &mut input).unwrap();

        let interval = Duration::from_millis(5);
        assert!(input.modes.iter().all(|m| *m == ReadMode::Sleep(interval)));
        assert!(app.server.shutdowns.borrow().is_empty());
    }

    #[test]
    fn rows_present_means_polling() {
        let mut app = dashboard(FakeServer::with_kernels(&["a"]), sampler(&[]));
        let mut input = Script::new(&[]);
        app.run(&mut tui(10), &mut input).unwrap();
        assert_eq!(input.modes, [ReadMode::Poll(Duration::from_millis(5))]);
    }

    #[test]
    fn transport_failure_ends_the_loop() {
        let server = FakeServer::with_kernels(&["a"]);
        server.failing.borrow_mut().extend([false, true]);
        let mut app = dashboard(server, sampler(&[]));
        let mut input = Script::new(&[Command::Noop, Command::Noop, Command::Noop]);
        let err = app.run(&mut tui(10), &mut input).unwrap_err();

        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Tls { .. })));
        assert_eq!(input.modes.len(), 1);
    }

    #[test]
    fn viewport_follows_the_terminal_height() {
        let ids: Vec<String> = (0..20).map(|i| format!("k{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut app = dashboard(FakeServer::with_kernels(&refs), sampler(&[]));
        let mut input = Script::new(&[Command::PageDown]);
        app.run(&mut tui(9), &mut input).unwrap();

        assert_eq!(app.viewport().visible_height(), 5);
        assert_eq!(app.viewport().cursor_line(), 6);
        assert_eq!(app.viewport().scroll_offset(), 1);
    }

    #[test]
    fn shutdown_all_reports_each_notebook() {
        let server = FakeServer::with_kernels(&["a", "b"]);
        let mut out = Vec::new();
        assert!(shutdown_all(&server, &mut out).unwrap());
        assert_eq!(String::from_utf8(out).unwrap(), "nb/a: 204\nnb/b: 204\n");
        assert_eq!(*server.shutdowns.borrow(), ["a", "b"]);
    }

    #[test]
    fn shutdown_all_with_nothing_running() {
        let mut out = Vec::new();
        assert!(!shutdown_all(&FakeServer::default(), &mut out).unwrap());
        assert!(out.is_empty());
    }
}

use std::{
    io::{self, Stdout},
    time::Duration,
};

use color_eyre::Result;
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::app::{Command, InputSource, ReadMode};

/// Raw mode plus alternate screen, released when dropped.
///
/// Dropping restores the terminal on quit and on error propagation; the
/// panic hook installed here covers unwinding before the report prints.
pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn acquire() -> Result<(Self, Terminal<CrosstermBackend<Stdout>>)> {
        enable_raw_mode()?;
        let guard = Self { _private: () };
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore();
            previous(info);
        }));
        Ok((guard, terminal))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore();
    }
}

fn restore() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
}

/// Keyboard input read through crossterm.
pub struct CrosstermInput;

impl InputSource for CrosstermInput {
    fn next_command(&mut self, mode: ReadMode) -> Result<Command> {
        let wait = match mode {
            ReadMode::Poll(timeout) => timeout,
            ReadMode::Sleep(interval) => {
                std::thread::sleep(interval);
                Duration::ZERO
            }
        };
        if !event::poll(wait)? {
            return Ok(Command::Noop);
        }
        match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => Ok(command_for(key)),
            _ => Ok(Command::Noop),
        }
    }
}

pub fn command_for(key: KeyEvent) -> Command {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Command::Quit,
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Command::Quit,
        KeyCode::Char('s') | KeyCode::Char('S') => Command::Shutdown,
        KeyCode::Down | KeyCode::Char('j') => Command::MoveDown,
        KeyCode::Up | KeyCode::Char('k') => Command::MoveUp,
        KeyCode::PageDown => Command::PageDown,
        KeyCode::PageUp => Command::PageUp,
        KeyCode::Home => Command::Home,
        KeyCode::End => Command::End,
        _ => Command::Noop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn key_bindings() {
        assert_eq!(command_for(key(KeyCode::Char('q'))), Command::Quit);
        assert_eq!(command_for(key(KeyCode::Char('Q'))), Command::Quit);
        assert_eq!(command_for(key(KeyCode::Char('S'))), Command::Shutdown);
        assert_eq!(command_for(key(KeyCode::Down)), Command::MoveDown);
        assert_eq!(command_for(key(KeyCode::Char('k'))), Command::MoveUp);
        assert_eq!(command_for(key(KeyCode::End)), Command::End);
        assert_eq!(command_for(key(KeyCode::Char('x'))), Command::Noop);
    }

    #[test]
    fn ctrl_c_quits() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(command_for(ctrl_c), Command::Quit);
        assert_eq!(command_for(key(KeyCode::Char('c'))), Command::Noop);
    }
}

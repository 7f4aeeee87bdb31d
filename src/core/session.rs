//! Session management
//!
//! A session is one shell on its own PTY, plus the grid its output is
//! rendered into and the parser state for that output.

use std::os::unix::io::{AsRawFd, RawFd};

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tracing::trace;

use super::pty::{Pty, PtyError, WindowSize};
use super::term::{Grid, Modes, Parser};
use crate::wm::layout::Rect;

/// Program and arguments used to start each session's shell
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl Default for ShellCommand {
    fn default() -> Self {
        Self::new("bash")
    }
}

/// A shell session
pub struct Session {
    /// Registry slot, assigned on insert
    pub id: usize,
    /// Screen contents
    pub grid: Grid,
    parser: Parser,
    /// Border-corner origin and box size on the host terminal
    pub rect: Rect,
    /// `None` for detached sessions that have no shell behind them
    pty: Option<Pty>,
}

impl Session {
    /// Create a session with no process attached
    pub fn detached(width: u16, height: u16) -> Self {
        Self {
            id: 0,
            grid: Grid::new(width, height),
            parser: Parser::new(),
            rect: Rect::new(1, 1, width, height),
            pty: None,
        }
    }

    /// Start `shell` on a new PTY sized `width` x `height`
    pub fn spawn(shell: &ShellCommand, width: u16, height: u16) -> Result<Self, PtyError> {
        let pty = Pty::spawn(&shell.program, &shell.args, WindowSize::new(width, height))?;
        let mut session = Self::detached(width, height);
        session.pty = Some(pty);
        Ok(session)
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pty.as_ref().map(Pty::pid)
    }

    pub fn raw_fd(&self) -> Option<RawFd> {
        self.pty.as_ref().map(AsRawFd::as_raw_fd)
    }

    pub fn mouse_reporting(&self) -> bool {
        self.grid.modes().contains(Modes::MOUSE_REPORTING)
    }

    pub fn cursor_visible(&self) -> bool {
        self.grid.modes().contains(Modes::CURSOR_VISIBLE)
    }

    /// Feed output bytes through the parser into the grid
    pub fn feed_bytes(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.grid, bytes);
    }

    /// Read pending output from the shell.
    ///
    /// Returns `Ok(None)` when nothing is available, `Ok(Some(0))` at end of file.
    pub fn read_output(&self, buf: &mut [u8]) -> Result<Option<usize>, PtyError> {
        match &self.pty {
            Some(pty) => pty.read(buf),
            None => Ok(None),
        }
    }

    /// Send input bytes to the shell
    pub fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        match &self.pty {
            Some(pty) => pty.write_all(data),
            None => {
                trace!(session = self.id, len = data.len(), "dropping input for detached session");
                Ok(())
            }
        }
    }

    /// Move the session to a new tile: resizes both the grid and the PTY
    pub fn set_rect(&mut self, rect: Rect) -> Result<(), PtyError> {
        self.rect = rect;
        self.grid.resize(rect.width, rect.height);
        match &self.pty {
            Some(pty) => pty.resize(WindowSize::new(self.grid.width(), self.grid.height())),
            None => Ok(()),
        }
    }

    /// Forward a signal to the shell's process group
    pub fn signal(&self, signal: Signal) -> Result<(), PtyError> {
        match &self.pty {
            Some(pty) => pty.signal_group(signal),
            None => Ok(()),
        }
    }

    /// The shell has been waited for; skip the hangup on drop
    pub fn mark_reaped(&mut self) {
        if let Some(pty) = &mut self.pty {
            pty.mark_reaped();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_session_has_no_process() {
        let session = Session::detached(20, 5);
        assert!(session.pid().is_none());
        assert!(session.raw_fd().is_none());
        assert!(session.write(b"ignored").is_ok());
        let mut buf = [0u8; 8];
        assert!(matches!(session.read_output(&mut buf), Ok(None)));
    }

    #[test]
    fn test_feed_bytes_updates_grid_and_modes() {
        let mut session = Session::detached(20, 5);
        session.feed_bytes(b"hello\x1b[?1000h\x1b[?25l");
        assert!(session.grid.row_text(1).starts_with("hello"));
        assert!(session.mouse_reporting());
        assert!(!session.cursor_visible());
    }

    #[test]
    fn test_set_rect_resizes_grid() {
        let mut session = Session::detached(20, 5);
        session.set_rect(Rect::new(5, 3, 10, 4)).unwrap();
        assert_eq!(session.rect, Rect::new(5, 3, 10, 4));
        assert_eq!(session.grid.width(), 10);
        assert_eq!(session.grid.height(), 4);
    }

    #[test]
    fn test_default_shell_command() {
        let shell = ShellCommand::default().with_args(vec!["-l".to_string()]);
        assert_eq!(shell.program, "bash");
        assert_eq!(shell.args, vec!["-l"]);
    }
}

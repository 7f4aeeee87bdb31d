//! Host terminal setup and teardown

use std::fmt;
use std::io::{self, Write};

use crossterm::{
    cursor::{MoveTo, Show},
    execute,
    style::ResetColor,
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType},
    Command,
};
use tracing::warn;

/// Turn on X10 click reporting (`ESC [ ? 1000 h`)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnableClickReporting;

impl Command for EnableClickReporting {
    fn write_ansi(&self, f: &mut impl fmt::Write) -> fmt::Result {
        f.write_str("\x1b[?1000h")
    }
}

/// Turn off X10 click reporting (`ESC [ ? 1000 l`)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisableClickReporting;

impl Command for DisableClickReporting {
    fn write_ansi(&self, f: &mut impl fmt::Write) -> fmt::Result {
        f.write_str("\x1b[?1000l")
    }
}

/// Host terminal size as `(cols, rows)`
pub fn size() -> io::Result<(u16, u16)> {
    terminal::size()
}

/// Raw mode with click reporting for as long as the guard lives
pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self { _private: () };
        let mut stdout = io::stdout();
        execute!(stdout, Clear(ClearType::All), EnableClickReporting)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let restored = execute!(
            stdout,
            ResetColor,
            Clear(ClearType::All),
            DisableClickReporting,
            Show,
            MoveTo(0, 0),
        );
        if let Err(e) = restored.and_then(|_| stdout.flush()) {
            warn!("failed to restore terminal: {}", e);
        }
        if let Err(e) = disable_raw_mode() {
            warn!("failed to leave raw mode: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::queue;

    #[test]
    fn test_click_reporting_sequences() {
        let mut out: Vec<u8> = Vec::new();
        queue!(out, EnableClickReporting, DisableClickReporting).unwrap();
        assert_eq!(out, b"\x1b[?1000h\x1b[?1000l");
    }
}

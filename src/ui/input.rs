//! Input routing
//!
//! Classifies each chunk read from the host terminal: multiplexer commands
//! behind the `Ctrl-A` prefix, X10 mouse reports, or plain input for the
//! focused session.

use crate::wm::Rect;

/// Prefix byte that introduces a command (`Ctrl-A`)
pub const COMMAND_PREFIX: u8 = 0x01;

/// Multiplexer commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    NewSession,
    Quit,
    FocusNext,
    FocusPrevious,
}

/// Length of one X10 report on the wire
const REPORT_LEN: usize = 6;

/// An X10 mouse report, `ESC [ M b x y`, with 1-based coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseReport {
    pub button: u8,
    pub col: u16,
    pub row: u16,
}

impl MouseReport {
    /// Decode the report at the start of `chunk`
    pub fn parse(chunk: &[u8]) -> Option<Self> {
        match chunk {
            [0x1b, b'[', b'M', button, col, row, ..] => Some(Self {
                button: *button,
                col: u16::from(col.saturating_sub(32)),
                row: u16::from(row.saturating_sub(32)),
            }),
            _ => None,
        }
    }

    /// Decode consecutive reports from the start of `chunk`. Bytes after the
    /// last complete report are dropped with the chunk.
    pub fn parse_all(chunk: &[u8]) -> Vec<Self> {
        chunk
            .chunks(REPORT_LEN)
            .map_while(Self::parse)
            .collect()
    }

    /// Button press rather than release
    pub fn is_press(&self) -> bool {
        self.button & 0x03 != 0x03
    }

    /// Re-encode with coordinates relative to a session's content box
    pub fn encode_relative(&self, rect: &Rect) -> Vec<u8> {
        let (col, row) = rect.to_local(self.col, self.row);
        let encode = |v: u16| u8::try_from(v + 32).unwrap_or(u8::MAX);
        vec![0x1b, b'[', b'M', self.button, encode(col), encode(row)]
    }
}

/// What to do with a chunk of host input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputAction {
    /// Send the chunk to the focused session
    Forward,
    /// Drop the chunk
    Consume,
    Command(Command),
    /// One or more mouse reports; the chunk itself is not forwarded
    Mouse(Vec<MouseReport>),
}

/// Prefix-key state machine
#[derive(Debug, Default)]
pub struct InputRouter {
    command_pending: bool,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_command_pending(&self) -> bool {
        self.command_pending
    }

    pub fn route(&mut self, chunk: &[u8]) -> InputAction {
        if chunk.is_empty() {
            return InputAction::Consume;
        }
        let reports = MouseReport::parse_all(chunk);
        if !reports.is_empty() {
            return InputAction::Mouse(reports);
        }
        if chunk[0] == COMMAND_PREFIX {
            self.command_pending = true;
            if chunk.len() == 1 {
                return InputAction::Consume;
            }
            return self.command(&chunk[1..]);
        }
        if self.command_pending {
            return self.command(chunk);
        }
        InputAction::Forward
    }

    fn command(&mut self, bytes: &[u8]) -> InputAction {
        self.command_pending = false;
        match bytes {
            [b'c' | b'C', ..] => InputAction::Command(Command::NewSession),
            [b'q', ..] => InputAction::Command(Command::Quit),
            [0x1b, b'[', b'A' | b'C', ..] => InputAction::Command(Command::FocusNext),
            [0x1b, b'[', b'B' | b'D', ..] => InputAction::Command(Command::FocusPrevious),
            _ => InputAction::Consume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_input_forwards() {
        let mut router = InputRouter::new();
        assert_eq!(router.route(b"ls\r"), InputAction::Forward);
        assert_eq!(router.route(b"\x1b[A"), InputAction::Forward);
    }

    #[test]
    fn test_prefix_then_command() {
        let mut router = InputRouter::new();
        assert_eq!(router.route(&[COMMAND_PREFIX]), InputAction::Consume);
        assert!(router.is_command_pending());
        assert_eq!(router.route(b"c"), InputAction::Command(Command::NewSession));
        assert!(!router.is_command_pending());
        assert_eq!(router.route(b"x"), InputAction::Forward);
    }

    #[test]
    fn test_prefix_and_command_in_one_chunk() {
        let mut router = InputRouter::new();
        assert_eq!(router.route(b"\x01q"), InputAction::Command(Command::Quit));
        assert_eq!(router.route(b"\x01C"), InputAction::Command(Command::NewSession));
        assert!(!router.is_command_pending());
    }

    #[test]
    fn test_arrow_commands() {
        let mut router = InputRouter::new();
        for (seq, cmd) in [
            (b"\x1b[A", Command::FocusNext),
            (b"\x1b[C", Command::FocusNext),
            (b"\x1b[B", Command::FocusPrevious),
            (b"\x1b[D", Command::FocusPrevious),
        ] {
            router.route(&[COMMAND_PREFIX]);
            assert_eq!(router.route(seq), InputAction::Command(cmd));
        }
    }

    #[test]
    fn test_unknown_command_is_swallowed() {
        let mut router = InputRouter::new();
        router.route(&[COMMAND_PREFIX]);
        assert_eq!(router.route(b"z"), InputAction::Consume);
        assert_eq!(router.route(b"z"), InputAction::Forward);
    }

    #[test]
    fn test_double_prefix_stays_pending() {
        let mut router = InputRouter::new();
        router.route(&[COMMAND_PREFIX]);
        assert_eq!(router.route(&[COMMAND_PREFIX]), InputAction::Consume);
        assert!(router.is_command_pending());
    }

    #[test]
    fn test_mouse_report_decoding() {
        let mut router = InputRouter::new();
        let action = router.route(&[0x1b, b'[', b'M', 32, 33 + 9, 33 + 4]);
        assert_eq!(
            action,
            InputAction::Mouse(vec![MouseReport { button: 32, col: 10, row: 5 }])
        );

        let release = MouseReport::parse(&[0x1b, b'[', b'M', 35, 40, 40]).unwrap();
        assert!(!release.is_press());
        assert!(MouseReport::parse(b"\x1b[M").is_none());
    }

    #[test]
    fn test_coalesced_reports_are_split() {
        let mut router = InputRouter::new();
        let chunk = [0x1b, b'[', b'M', 32, 37, 37, 0x1b, b'[', b'M', 35, 37, 37];
        let InputAction::Mouse(reports) = router.route(&chunk) else {
            panic!("expected mouse reports");
        };
        assert_eq!(reports.len(), 2);
        assert!(reports[0].is_press());
        assert!(!reports[1].is_press());
        assert_eq!((reports[1].col, reports[1].row), (5, 5));
    }

    #[test]
    fn test_report_followed_by_keys_is_still_mouse() {
        let mut router = InputRouter::new();
        let mut chunk = vec![0x1b, b'[', b'M', 32, 42, 42];
        chunk.extend_from_slice(b"ls");
        assert_eq!(
            router.route(&chunk),
            InputAction::Mouse(vec![MouseReport { button: 32, col: 10, row: 10 }])
        );
    }

    #[test]
    fn test_mouse_relative_encoding() {
        let report = MouseReport { button: 32, col: 45, row: 16 };
        let bytes = report.encode_relative(&Rect::new(41, 13, 38, 10));
        assert_eq!(bytes, vec![0x1b, b'[', b'M', 32, 32 + 4, 32 + 3]);
    }
}

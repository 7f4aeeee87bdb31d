//! Control sequence parser
//!
//! Consumes a session's output byte by byte and applies it to a [`Grid`].
//! Every piece of partial state (escape prefix, collected arguments, a
//! half-received UTF-8 sequence, an OSC string being skipped) lives in the
//! parser, so output may be split across reads at any byte boundary.

use tracing::trace;

use super::grid::{style_sequence, EraseMode, Grid, Modes};

/// Maximum number of numeric arguments kept for one sequence
pub const MAX_ARGS: usize = 16;

const REPLACEMENT: &str = "\u{FFFD}";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    /// Collecting `ESC [` arguments; the final byte dispatches immediately
    CsiArgs,
    /// Skipping an `ESC ]` string until BEL or ST
    OscString,
    EscapeInOsc,
}

/// Resumable control sequence parser
#[derive(Debug, Default)]
pub struct Parser {
    state: ParserState,
    args: [Option<u16>; MAX_ARGS],
    /// Index of the argument currently being collected
    arg_index: usize,
    private: bool,
    utf8: [u8; 4],
    utf8_len: usize,
    utf8_need: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no sequence is partially consumed
    #[cfg(test)]
    pub fn is_ground(&self) -> bool {
        self.state == ParserState::Ground && self.utf8_need == 0
    }

    /// Apply a chunk of output to the grid
    pub fn advance(&mut self, grid: &mut Grid, bytes: &[u8]) {
        for &byte in bytes {
            self.feed(byte, grid);
        }
    }

    /// Feed a single byte
    pub fn feed(&mut self, byte: u8, grid: &mut Grid) {
        match self.state {
            ParserState::Ground => self.ground(byte, grid),
            ParserState::Escape => self.escape(byte, grid),
            ParserState::CsiArgs => self.csi_args(byte, grid),
            ParserState::OscString => match byte {
                0x07 => self.state = ParserState::Ground,
                0x1b => self.state = ParserState::EscapeInOsc,
                _ => {}
            },
            ParserState::EscapeInOsc => {
                if byte == b'\\' {
                    self.state = ParserState::Ground;
                } else {
                    self.state = ParserState::Escape;
                    self.escape(byte, grid);
                }
            }
        }
    }

    fn ground(&mut self, byte: u8, grid: &mut Grid) {
        if self.utf8_need > 0 {
            if byte & 0xC0 == 0x80 {
                self.utf8[self.utf8_len] = byte;
                self.utf8_len += 1;
                if self.utf8_len == self.utf8_need {
                    self.flush_utf8(grid);
                }
                return;
            }
            // Truncated sequence
            self.utf8_need = 0;
            self.utf8_len = 0;
            grid.put_glyph(REPLACEMENT);
        }

        match byte {
            0x1b => self.state = ParserState::Escape,
            b'\n' => grid.line_feed(),
            b'\r' => grid.carriage_return(),
            0x08 => grid.backspace(),
            b'\t' => grid.horizontal_tab(),
            0x20..=0x7e => {
                let buf = [byte];
                if let Ok(s) = std::str::from_utf8(&buf) {
                    grid.put_glyph(s);
                }
            }
            0x00..=0x1f | 0x7f => {}
            0xc2..=0xdf => self.begin_utf8(byte, 2),
            0xe0..=0xef => self.begin_utf8(byte, 3),
            0xf0..=0xf4 => self.begin_utf8(byte, 4),
            _ => grid.put_glyph(REPLACEMENT),
        }
    }

    fn begin_utf8(&mut self, lead: u8, len: usize) {
        self.utf8[0] = lead;
        self.utf8_len = 1;
        self.utf8_need = len;
    }

    fn flush_utf8(&mut self, grid: &mut Grid) {
        let bytes = &self.utf8[..self.utf8_len];
        match std::str::from_utf8(bytes) {
            Ok(s) => grid.put_glyph(s),
            Err(_) => grid.put_glyph(REPLACEMENT),
        }
        self.utf8_len = 0;
        self.utf8_need = 0;
    }

    fn escape(&mut self, byte: u8, grid: &mut Grid) {
        self.state = ParserState::Ground;
        match byte {
            b'[' => {
                self.args = [None; MAX_ARGS];
                self.arg_index = 0;
                self.private = false;
                self.state = ParserState::CsiArgs;
            }
            b']' => self.state = ParserState::OscString,
            b'c' => grid.reset(),
            0x40..=0x5f => trace!(byte, "ignoring escape sequence"),
            _ => {}
        }
    }

    fn csi_args(&mut self, byte: u8, grid: &mut Grid) {
        match byte {
            b'0'..=b'9' => {
                if let Some(slot) = self.args.get_mut(self.arg_index) {
                    let digit = u16::from(byte - b'0');
                    *slot = Some(slot.unwrap_or(0).saturating_mul(10).saturating_add(digit));
                }
            }
            b';' => {
                if self.arg_index < MAX_ARGS {
                    self.arg_index += 1;
                }
            }
            b'?' => self.private = true,
            _ => {
                self.state = ParserState::Ground;
                self.dispatch(byte, grid);
            }
        }
    }

    fn arg(&self, index: usize, default: u16) -> u16 {
        self.args.get(index).copied().flatten().unwrap_or(default)
    }

    fn dispatch(&mut self, action: u8, grid: &mut Grid) {
        let count = (self.arg_index + 1).min(MAX_ARGS);
        let n = self.arg(0, 1).max(1);

        match action {
            b'A' => grid.cursor_up(n),
            b'B' => grid.cursor_down(n),
            b'C' => grid.cursor_forward(n),
            b'D' => grid.cursor_backward(n),
            b'E' => grid.next_line(n),
            b'F' => grid.previous_line(n),
            b'G' => grid.set_column(self.arg(0, 1)),
            b'H' => {
                let row = self.arg(0, 1);
                let col = if count >= 2 {
                    self.arg(1, 1)
                } else {
                    self.args[0].unwrap_or(1)
                };
                grid.set_position(row, col);
            }
            b'J' => {
                if let Some(mode) = EraseMode::from_arg(self.arg(0, 0)) {
                    grid.erase_display(mode);
                }
                grid.mark_full();
            }
            b'K' => {
                if let Some(mode) = EraseMode::from_arg(self.arg(0, 0)) {
                    grid.erase_line(mode);
                }
                grid.mark_full();
            }
            b'h' | b'l' if self.private => {
                let enable = action == b'h';
                for value in self.args[..count].iter().flatten() {
                    match *value {
                        1000..=1006 => grid.set_mode(Modes::MOUSE_REPORTING, enable),
                        25 => grid.set_mode(Modes::CURSOR_VISIBLE, enable),
                        _ => {}
                    }
                }
            }
            b'm' => grid.set_style(style_sequence(&self.args[..count])),
            _ => {
                trace!(action = %char::from(action), "unhandled control sequence");
                return;
            }
        }

        if (b'A'..=b'H').contains(&action) {
            grid.mark_decoration();
        }
    }
}

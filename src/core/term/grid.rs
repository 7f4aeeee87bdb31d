//! Screen grid
//!
//! One session's visible contents: a bounded row-major array of cells, the
//! cursor, the active style string and the damage accumulated since the last
//! paint. Coordinates are 1-based and always clamped into the box.

use std::collections::BTreeSet;
use std::mem;

use bitflags::bitflags;

/// Largest box height a grid will hold.
pub const MAX_ROWS: u16 = 100;
/// Largest box width a grid will hold.
pub const MAX_COLS: u16 = 400;

const TAB_WIDTH: u16 = 8;

/// A single grid position
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// One displayable character, possibly multi-byte
    pub rune: String,
    /// Style escape sequence active when the rune was written
    pub style: String,
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank()
    }
}

impl Cell {
    pub fn blank() -> Self {
        Self {
            rune: " ".to_string(),
            style: String::new(),
        }
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.rune == " " && self.style.is_empty()
    }

    /// Get the display string (space if empty)
    pub fn display(&self) -> &str {
        if self.rune.is_empty() {
            " "
        } else {
            &self.rune
        }
    }
}

/// Cursor position, 1-based
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub x: u16,
    pub y: u16,
}

impl Default for Cursor {
    fn default() -> Self {
        Self { x: 1, y: 1 }
    }
}

bitflags! {
    /// Private modes a session's output can toggle
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Modes: u8 {
        const MOUSE_REPORTING = 0b0000_0001;
        const CURSOR_VISIBLE  = 0b0000_0010;
    }
}

impl Default for Modes {
    fn default() -> Self {
        Modes::CURSOR_VISIBLE
    }
}

/// Erase range selector shared by erase-in-display and erase-in-line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EraseMode {
    /// From the cursor (inclusive) to the end
    ToEnd,
    /// From the start to the cursor (inclusive)
    ToStart,
    /// Everything
    All,
}

impl EraseMode {
    pub fn from_arg(arg: u16) -> Option<Self> {
        match arg {
            0 => Some(EraseMode::ToEnd),
            1 => Some(EraseMode::ToStart),
            2 => Some(EraseMode::All),
            _ => None,
        }
    }
}

/// What changed since the last paint
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Damage {
    /// Whole grid must be repainted
    pub full: bool,
    /// Border and cursor decoration must be repainted
    pub decoration: bool,
    /// Rows to repaint
    pub lines: BTreeSet<u16>,
    /// Individual cells written, in write order
    pub glyphs: Vec<(u16, u16)>,
}

impl Damage {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        !self.full && !self.decoration && self.lines.is_empty() && self.glyphs.is_empty()
    }
}

/// Build the style sequence for a list of style arguments.
///
/// Omitted arguments become `0`; the result is `ESC [ a;b;... m`.
pub fn style_sequence(args: &[Option<u16>]) -> String {
    let joined: Vec<String> = args
        .iter()
        .map(|arg| arg.unwrap_or(0).to_string())
        .collect();
    format!("\x1b[{}m", joined.join(";"))
}

/// Cell storage and cursor for one session
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    cursor: Cursor,
    style: String,
    modes: Modes,
    damage: Damage,
}

impl Grid {
    /// Create a blank grid; dimensions are clamped to `1..=MAX_COLS` and `1..=MAX_ROWS`
    pub fn new(width: u16, height: u16) -> Self {
        let width = width.clamp(1, MAX_COLS);
        let height = height.clamp(1, MAX_ROWS);
        Self {
            width,
            height,
            cells: vec![Cell::blank(); width as usize * height as usize],
            cursor: Cursor::default(),
            style: String::new(),
            modes: Modes::default(),
            damage: Damage {
                full: true,
                ..Damage::default()
            },
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    #[cfg(test)]
    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn modes(&self) -> Modes {
        self.modes
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x == 0 || y == 0 || x > self.width || y > self.height {
            return None;
        }
        Some((y as usize - 1) * self.width as usize + (x as usize - 1))
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).and_then(|i| self.cells.get(i))
    }

    /// Write a glyph at the cursor with the active style and advance
    pub fn put_glyph(&mut self, rune: &str) {
        let Cursor { x, y } = self.cursor;
        if let Some(i) = self.index(x, y) {
            let cell = &mut self.cells[i];
            cell.rune.clear();
            cell.rune.push_str(rune);
            cell.style.clone_from(&self.style);
            self.damage.glyphs.push((x, y));
        }
        self.advance_char();
    }

    fn advance_char(&mut self) {
        self.cursor.x += 1;
        if self.cursor.x > self.width {
            self.line_feed();
        }
    }

    /// Column 1 of the next line; past the bottom edge wraps to line 1
    pub fn line_feed(&mut self) {
        self.cursor.x = 1;
        self.cursor.y += 1;
        if self.cursor.y > self.height {
            self.cursor.y = 1;
        }
    }

    pub fn carriage_return(&mut self) {
        self.cursor.x = 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor.x > 1 {
            self.cursor.x -= 1;
        }
        self.damage.lines.insert(self.cursor.y);
    }

    /// Move to the next tab stop, clamped to the right edge
    pub fn horizontal_tab(&mut self) {
        let next = ((self.cursor.x - 1) / TAB_WIDTH + 1) * TAB_WIDTH + 1;
        self.cursor.x = next.min(self.width);
    }

    pub fn cursor_up(&mut self, n: u16) {
        self.cursor.y = self.cursor.y.saturating_sub(n).max(1);
    }

    pub fn cursor_down(&mut self, n: u16) {
        self.cursor.y = self.cursor.y.saturating_add(n).min(self.height);
    }

    pub fn cursor_forward(&mut self, n: u16) {
        self.cursor.x = self.cursor.x.saturating_add(n).min(self.width);
    }

    pub fn cursor_backward(&mut self, n: u16) {
        self.cursor.x = self.cursor.x.saturating_sub(n).max(1);
    }

    /// Column 1, then down `n` rows
    pub fn next_line(&mut self, n: u16) {
        self.cursor.x = 1;
        self.cursor_down(n);
    }

    /// Column 1, then up `n` rows
    pub fn previous_line(&mut self, n: u16) {
        self.cursor.x = 1;
        self.cursor_up(n);
    }

    pub fn set_column(&mut self, col: u16) {
        self.cursor.x = col.clamp(1, self.width);
    }

    pub fn set_position(&mut self, row: u16, col: u16) {
        self.cursor.y = row.clamp(1, self.height);
        self.cursor.x = col.clamp(1, self.width);
    }

    fn blank_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.cells.len());
        for cell in self.cells.iter_mut().take(end).skip(start) {
            cell.rune.clear();
            cell.rune.push(' ');
            cell.style.clear();
        }
    }

    /// Erase part of the screen; the cursor never moves
    pub fn erase_display(&mut self, mode: EraseMode) {
        let Some(cursor) = self.index(self.cursor.x, self.cursor.y) else {
            return;
        };
        match mode {
            EraseMode::ToEnd => self.blank_range(cursor, self.cells.len()),
            EraseMode::ToStart => self.blank_range(0, cursor + 1),
            EraseMode::All => self.blank_range(0, self.cells.len()),
        }
        self.damage.full = true;
    }

    /// Erase part of the cursor's line; the cursor never moves
    pub fn erase_line(&mut self, mode: EraseMode) {
        let Some(cursor) = self.index(self.cursor.x, self.cursor.y) else {
            return;
        };
        let line_start = cursor - (self.cursor.x as usize - 1);
        let line_end = line_start + self.width as usize;
        match mode {
            EraseMode::ToEnd => self.blank_range(cursor, line_end),
            EraseMode::ToStart => self.blank_range(line_start, cursor + 1),
            EraseMode::All => self.blank_range(line_start, line_end),
        }
        self.damage.full = true;
    }

    pub fn set_style(&mut self, style: String) {
        self.style = style;
    }

    pub fn set_mode(&mut self, mode: Modes, enable: bool) {
        self.modes.set(mode, enable);
    }

    /// Full reset: blank cells, cursor at the box origin, no style
    pub fn reset(&mut self) {
        self.blank_range(0, self.cells.len());
        self.cursor = Cursor::default();
        self.style.clear();
        self.damage.full = true;
    }

    /// Re-dimension the grid, keeping the overlapping top-left region
    pub fn resize(&mut self, width: u16, height: u16) {
        let width = width.clamp(1, MAX_COLS);
        let height = height.clamp(1, MAX_ROWS);
        if width == self.width && height == self.height {
            self.damage.full = true;
            return;
        }

        let mut cells = vec![Cell::blank(); width as usize * height as usize];
        for y in 0..height.min(self.height) as usize {
            for x in 0..width.min(self.width) as usize {
                let old = y * self.width as usize + x;
                cells[y * width as usize + x] = mem::take(&mut self.cells[old]);
            }
        }

        self.cells = cells;
        self.width = width;
        self.height = height;
        self.cursor.x = self.cursor.x.min(width);
        self.cursor.y = self.cursor.y.min(height);
        self.damage = Damage {
            full: true,
            ..Damage::default()
        };
    }

    pub fn mark_decoration(&mut self) {
        self.damage.decoration = true;
    }

    pub fn mark_full(&mut self) {
        self.damage.full = true;
    }

    #[cfg(test)]
    pub fn damage(&self) -> &Damage {
        &self.damage
    }

    /// Hand the accumulated damage to the renderer and start afresh
    pub fn take_damage(&mut self) -> Damage {
        mem::take(&mut self.damage)
    }

    /// Text of one row, runes concatenated
    #[cfg(test)]
    pub fn row_text(&self, y: u16) -> String {
        (1..=self.width)
            .filter_map(|x| self.cell(x, y))
            .map(Cell::display)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(grid: &mut Grid, text: &str) {
        for ch in text.chars() {
            grid.put_glyph(ch.encode_utf8(&mut [0; 4]));
        }
    }

    #[test]
    fn test_put_glyph_advances_and_wraps() {
        let mut grid = Grid::new(3, 2);
        write(&mut grid, "abcd");
        assert_eq!(grid.row_text(1), "abc");
        assert_eq!(grid.row_text(2), "d  ");
        assert_eq!(grid.cursor(), Cursor { x: 2, y: 2 });
    }

    #[test]
    fn test_wrap_past_bottom_overwrites_first_line() {
        let mut grid = Grid::new(2, 2);
        write(&mut grid, "abcdef");
        assert_eq!(grid.row_text(1), "ef");
        assert_eq!(grid.row_text(2), "cd");
        assert_eq!(grid.cursor(), Cursor { x: 1, y: 2 });
    }

    #[test]
    fn test_glyph_captures_active_style() {
        let mut grid = Grid::new(10, 2);
        grid.set_style(style_sequence(&[Some(1), Some(31)]));
        write(&mut grid, "x");
        grid.set_style(String::new());
        write(&mut grid, "y");
        assert_eq!(grid.cell(1, 1).unwrap().style, "\x1b[1;31m");
        assert_eq!(grid.cell(2, 1).unwrap().style, "");
    }

    #[test]
    fn test_relative_moves_clamp() {
        let mut grid = Grid::new(10, 5);
        grid.cursor_up(3);
        grid.cursor_backward(7);
        assert_eq!(grid.cursor(), Cursor { x: 1, y: 1 });
        grid.cursor_down(100);
        grid.cursor_forward(u16::MAX);
        assert_eq!(grid.cursor(), Cursor { x: 10, y: 5 });
    }

    #[test]
    fn test_set_position_clamps_zero_and_overflow() {
        let mut grid = Grid::new(10, 5);
        grid.set_position(0, 0);
        assert_eq!(grid.cursor(), Cursor { x: 1, y: 1 });
        grid.set_position(99, 99);
        assert_eq!(grid.cursor(), Cursor { x: 10, y: 5 });
    }

    #[test]
    fn test_erase_line_ranges_include_cursor() {
        let mut grid = Grid::new(5, 1);
        write(&mut grid, "abcde");
        grid.set_column(3);
        grid.erase_line(EraseMode::ToEnd);
        assert_eq!(grid.row_text(1), "ab   ");

        let mut grid = Grid::new(5, 1);
        write(&mut grid, "abcde");
        grid.set_column(3);
        grid.erase_line(EraseMode::ToStart);
        assert_eq!(grid.row_text(1), "   de");
        assert_eq!(grid.cursor().x, 3);
    }

    #[test]
    fn test_erase_display_to_start_stops_at_cursor() {
        let mut grid = Grid::new(3, 3);
        write(&mut grid, "abcdefghi");
        grid.set_position(2, 2);
        grid.erase_display(EraseMode::ToStart);
        assert_eq!(grid.row_text(1), "   ");
        assert_eq!(grid.row_text(2), "  f");
        assert_eq!(grid.row_text(3), "ghi");
    }

    #[test]
    fn test_erase_display_all_blanks_style() {
        let mut grid = Grid::new(4, 3);
        grid.set_style("\x1b[7m".to_string());
        write(&mut grid, "hello");
        grid.set_position(2, 3);
        grid.erase_display(EraseMode::All);
        for y in 1..=3 {
            for x in 1..=4 {
                assert!(grid.cell(x, y).unwrap().is_blank());
            }
        }
        assert_eq!(grid.cursor(), Cursor { x: 3, y: 2 });
        assert!(grid.damage().full);
    }

    #[test]
    fn test_tab_stops() {
        let mut grid = Grid::new(20, 1);
        grid.horizontal_tab();
        assert_eq!(grid.cursor().x, 9);
        grid.horizontal_tab();
        assert_eq!(grid.cursor().x, 17);
        grid.horizontal_tab();
        assert_eq!(grid.cursor().x, 20);
    }

    #[test]
    fn test_resize_preserves_overlap_and_clamps_cursor() {
        let mut grid = Grid::new(4, 4);
        write(&mut grid, "abcdefgh");
        grid.set_position(4, 4);
        grid.resize(2, 3);
        assert_eq!(grid.row_text(1), "ab");
        assert_eq!(grid.row_text(2), "ef");
        assert_eq!(grid.cursor(), Cursor { x: 2, y: 3 });
    }

    #[test]
    fn test_dimensions_are_bounded() {
        let grid = Grid::new(u16::MAX, 0);
        assert_eq!(grid.width(), MAX_COLS);
        assert_eq!(grid.height(), 1);
        assert!(grid.cell(0, 1).is_none());
        assert!(grid.cell(MAX_COLS + 1, 1).is_none());
    }

    #[test]
    fn test_reset() {
        let mut grid = Grid::new(4, 2);
        grid.set_style("\x1b[1m".to_string());
        write(&mut grid, "abcde");
        grid.take_damage();
        grid.reset();
        assert_eq!(grid.row_text(1), "    ");
        assert_eq!(grid.cursor(), Cursor::default());
        assert_eq!(grid.style(), "");
        assert!(grid.take_damage().full);
    }

    #[test]
    fn test_style_sequence_defaults_omitted_to_zero() {
        assert_eq!(style_sequence(&[None]), "\x1b[0m");
        assert_eq!(style_sequence(&[Some(38), Some(5), None]), "\x1b[38;5;0m");
    }
}

//! Renderer
//!
//! Paints session grids onto the host terminal at their tiled positions,
//! draws the coloured borders and places the host cursor. All output is
//! queued through crossterm and flushed by the caller.

use std::collections::HashMap;
use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor},
    terminal::{Clear, ClearType},
};

use crate::core::term::{Cell, Damage};
use crate::core::Session;
use crate::wm::SessionManager;

/// Border and marker colours
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub focused: Color,
    pub unfocused: Color,
    pub cursor_marker: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            focused: Color::Rgb { r: 0, g: 128, b: 64 },
            unfocused: Color::Rgb { r: 64, g: 64, b: 64 },
            cursor_marker: Color::Rgb { r: 128, g: 128, b: 128 },
        }
    }
}

pub struct Renderer<W: Write> {
    out: W,
    palette: Palette,
    /// Content cell painted as a cursor marker, per unfocused session
    markers: HashMap<usize, (u16, u16)>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self {
            out,
            palette,
            markers: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Clear the host screen and repaint every session
    pub fn redraw_all(&mut self, manager: &SessionManager) -> io::Result<()> {
        self.markers.clear();
        queue!(self.out, Hide, ResetColor, Clear(ClearType::All))?;
        for (index, session) in manager.iter() {
            self.draw_full(session, manager.focused_index() == Some(index))?;
        }
        self.place_cursor(manager.focused())
    }

    /// Paint the damage one session accumulated
    pub fn paint(&mut self, session: &Session, damage: &Damage, focused: bool) -> io::Result<()> {
        queue!(self.out, Hide)?;
        if damage.full {
            return self.draw_full(session, focused);
        }

        for &y in &damage.lines {
            self.draw_span(session, y, 1, session.grid.width())?;
        }

        let mut glyphs = damage.glyphs.iter().copied().peekable();
        while let Some((start, y)) = glyphs.next() {
            let mut end = start;
            while let Some(&(x, next_y)) = glyphs.peek() {
                if next_y != y || x != end + 1 {
                    break;
                }
                end = x;
                glyphs.next();
            }
            self.draw_span(session, y, start, end)?;
        }

        if damage.decoration {
            self.draw_decoration(session, focused)?;
        } else if !focused {
            self.draw_marker(session)?;
        }
        Ok(())
    }

    /// Repaint every cell of a session, then its decoration
    pub fn draw_full(&mut self, session: &Session, focused: bool) -> io::Result<()> {
        for y in 1..=session.grid.height() {
            self.draw_span(session, y, 1, session.grid.width())?;
        }
        self.draw_decoration(session, focused)
    }

    /// Paint cells `from..=to` of row `y`
    fn draw_span(&mut self, session: &Session, y: u16, from: u16, to: u16) -> io::Result<()> {
        let (sx, sy) = session.rect.screen_pos(from, y);
        queue!(self.out, MoveTo(sx - 1, sy - 1))?;

        let mut active: Option<&str> = None;
        for x in from..=to {
            let Some(cell) = session.grid.cell(x, y) else {
                break;
            };
            if active != Some(cell.style.as_str()) {
                queue!(self.out, SetAttribute(Attribute::Reset), Print(&cell.style))?;
                active = Some(cell.style.as_str());
            }
            queue!(self.out, Print(cell.display()))?;
        }
        queue!(self.out, SetAttribute(Attribute::Reset))
    }

    /// Border in the focus colour, plus a cursor marker for unfocused sessions
    pub fn draw_decoration(&mut self, session: &Session, focused: bool) -> io::Result<()> {
        let border = if focused {
            self.clear_marker(session)?;
            self.palette.focused
        } else {
            self.draw_marker(session)?;
            self.palette.unfocused
        };

        let rect = session.rect;
        let edge = " ".repeat(rect.width as usize + 2);
        queue!(
            self.out,
            SetAttribute(Attribute::Reset),
            SetBackgroundColor(border),
            MoveTo(rect.x - 1, rect.y - 1),
            Print(&edge),
            MoveTo(rect.x - 1, rect.bottom() - 1),
            Print(&edge),
        )?;
        for row in rect.y + 1..rect.bottom() {
            queue!(
                self.out,
                MoveTo(rect.x - 1, row - 1),
                Print(' '),
                MoveTo(rect.right() - 1, row - 1),
                Print(' '),
            )?;
        }
        queue!(self.out, ResetColor)
    }

    /// Repaint the cell under a previously drawn marker
    fn clear_marker(&mut self, session: &Session) -> io::Result<()> {
        match self.markers.remove(&session.id) {
            Some((x, y)) => self.draw_span(session, y, x, x),
            None => Ok(()),
        }
    }

    /// Move an unfocused session's cursor marker to its current cursor
    fn draw_marker(&mut self, session: &Session) -> io::Result<()> {
        self.clear_marker(session)?;
        if !session.cursor_visible() {
            return Ok(());
        }
        let cursor = session.grid.cursor();
        let (sx, sy) = session.rect.screen_pos(cursor.x, cursor.y);
        let glyph = session
            .grid
            .cell(cursor.x, cursor.y)
            .map(Cell::display)
            .unwrap_or(" ");
        queue!(
            self.out,
            MoveTo(sx - 1, sy - 1),
            SetAttribute(Attribute::Reset),
            SetBackgroundColor(self.palette.cursor_marker),
            Print(glyph),
            ResetColor,
        )?;
        self.markers.insert(session.id, (cursor.x, cursor.y));
        Ok(())
    }

    /// Put the host cursor on the focused session's cursor
    pub fn place_cursor(&mut self, focused: Option<&Session>) -> io::Result<()> {
        let Some(session) = focused else {
            return queue!(self.out, Hide);
        };
        let cursor = session.grid.cursor();
        let (sx, sy) = session.rect.screen_pos(cursor.x, cursor.y);
        queue!(self.out, MoveTo(sx - 1, sy - 1))?;
        if session.cursor_visible() {
            queue!(self.out, Show)
        } else {
            queue!(self.out, Hide)
        }
    }
}

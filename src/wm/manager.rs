//! Session manager - the registry of live sessions
//!
//! Owns every session in a bounded [`Pool`], tracks which one has focus and
//! re-tiles the host terminal whenever the set of sessions or the host size
//! changes.

use nix::unistd::Pid;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::layout::tile;
use super::pool::{Direction, Pool};
use crate::core::{PtyError, Session, ShellCommand};

/// Upper bound on concurrent sessions
pub const MAX_SESSIONS: usize = 16;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session limit of {0} reached")]
    Limit(usize),

    #[error("Failed to start session: {0}")]
    Spawn(#[from] PtyError),
}

/// Focus moved from one session to another
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FocusChange {
    pub from: Option<usize>,
    pub to: usize,
}

pub struct SessionManager {
    sessions: Pool<Session>,
    focused: Option<usize>,
    /// Host terminal dimensions
    pub width: u16,
    pub height: u16,
    shell: ShellCommand,
}

impl SessionManager {
    pub fn new(width: u16, height: u16, shell: ShellCommand) -> Self {
        Self {
            sessions: Pool::with_capacity(MAX_SESSIONS),
            focused: None,
            width,
            height,
            shell,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Spawn a new shell session, focus it and re-tile
    pub fn spawn(&mut self) -> Result<usize, SessionError> {
        if self.sessions.is_full() {
            return Err(SessionError::Limit(MAX_SESSIONS));
        }
        let count = self.sessions.len() + 1;
        let size = tile(count, self.width, self.height)
            .last()
            .map(|r| (r.width, r.height))
            .unwrap_or((1, 1));
        let session = Session::spawn(&self.shell, size.0, size.1)?;
        self.insert(session)
    }

    /// Register a session, focus it and re-tile
    pub fn insert(&mut self, session: Session) -> Result<usize, SessionError> {
        let index = self
            .sessions
            .push(session)
            .map_err(|_| SessionError::Limit(MAX_SESSIONS))?;
        if let Some(session) = self.sessions.get_mut(index) {
            session.id = index;
            info!(session = index, pid = ?session.pid(), "session added");
        }
        self.focused = Some(index);
        self.retile();
        Ok(index)
    }

    /// Remove a session. Focus passes to its successor if it had focus.
    pub fn remove(&mut self, index: usize) -> Option<Session> {
        let session = self.sessions.remove(index)?;
        info!(session = index, pid = ?session.pid(), "session removed");
        if self.focused == Some(index) {
            self.focused = self.sessions.adjacent(index, Direction::Next);
        }
        self.retile();
        Some(session)
    }

    /// Remove the session whose shell has process id `pid`
    pub fn remove_by_pid(&mut self, pid: Pid) -> Option<Session> {
        let Some(index) = self.index_of_pid(pid) else {
            debug!(pid = pid.as_raw(), "reaped pid belongs to no session");
            return None;
        };
        let mut session = self.remove(index)?;
        session.mark_reaped();
        Some(session)
    }

    pub fn index_of_pid(&self, pid: Pid) -> Option<usize> {
        self.sessions
            .iter()
            .find(|(_, s)| s.pid() == Some(pid))
            .map(|(i, _)| i)
    }

    pub fn get(&self, index: usize) -> Option<&Session> {
        self.sessions.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Session> {
        self.sessions.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Session)> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Session)> {
        self.sessions.iter_mut()
    }

    pub fn focused_index(&self) -> Option<usize> {
        self.focused
    }

    pub fn focused(&self) -> Option<&Session> {
        self.focused.and_then(|i| self.sessions.get(i))
    }

    /// Give focus to `index`. Returns the change, or `None` if nothing moved.
    pub fn focus(&mut self, index: usize) -> Option<FocusChange> {
        if self.sessions.get(index).is_none() || self.focused == Some(index) {
            return None;
        }
        let change = FocusChange {
            from: self.focused,
            to: index,
        };
        self.focused = Some(index);
        debug!(from = ?change.from, to = index, "focus changed");
        Some(change)
    }

    /// Move focus cyclically to the neighbouring session
    pub fn focus_adjacent(&mut self, direction: Direction) -> Option<FocusChange> {
        let current = self.focused?;
        let next = self.sessions.adjacent(current, direction)?;
        self.focus(next)
    }

    /// The session whose box, border included, contains host position `(col, row)`
    pub fn session_at(&self, col: u16, row: u16) -> Option<usize> {
        self.sessions
            .iter()
            .find(|(_, s)| s.rect.contains(col, row))
            .map(|(i, _)| i)
    }

    /// Adopt new host dimensions and re-tile
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.retile();
    }

    /// Recompute every session's rect from the current count and host size
    pub fn retile(&mut self) {
        let rects = tile(self.sessions.len(), self.width, self.height);
        for ((index, session), rect) in self.sessions.iter_mut().zip(rects) {
            if let Err(e) = session.set_rect(rect) {
                warn!(session = index, "failed to resize session: {}", e);
            }
        }
    }
}

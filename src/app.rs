//! Application controller
//!
//! Owns the session registry, the renderer and the input router, and runs
//! the single-threaded event loop: wait on stdin and every PTY master, drain
//! pending signals, route input, feed output and repaint damage.

use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::libc::STDIN_FILENO;
use nix::poll::{poll, PollFd, PollFlags};
use nix::unistd::read;
use tracing::{debug, info, warn};

use crate::core::reap_children;
use crate::signals;
use crate::ui::input::{Command, InputAction, InputRouter, MouseReport};
use crate::ui::terminal;
use crate::ui::Renderer;
use crate::wm::{Direction, FocusChange, SessionManager};

/// Bytes read from stdin or a PTY per wake-up
const READ_BUFFER: usize = 4096;

/// Result of handling one chunk of host input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Bytes went to this session
    Forwarded(usize),
    /// Consumed by the multiplexer
    Handled,
    Quit,
}

/// Descriptors with pending input after a poll
#[derive(Debug, Default)]
struct Readiness {
    stdin: bool,
    sessions: Vec<usize>,
}

pub struct App<W: Write> {
    manager: SessionManager,
    renderer: Renderer<W>,
    router: InputRouter,
    poll_timeout: i32,
}

impl<W: Write> App<W> {
    pub fn new(manager: SessionManager, renderer: Renderer<W>, poll_timeout_ms: u32) -> Self {
        Self {
            manager,
            renderer,
            router: InputRouter::new(),
            poll_timeout: i32::try_from(poll_timeout_ms).unwrap_or(i32::MAX),
        }
    }

    #[cfg(test)]
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &Renderer<W> {
        &self.renderer
    }

    /// Run until the last session exits or the user quits
    pub fn run(&mut self) -> Result<()> {
        self.redraw()?;
        let mut buf = vec![0u8; READ_BUFFER];

        loop {
            self.handle_signals()?;
            if self.manager.is_empty() {
                info!("no sessions left");
                break;
            }

            let ready = self.wait()?;

            if ready.stdin {
                match read(STDIN_FILENO, &mut buf) {
                    Ok(0) => {
                        info!("terminal input closed");
                        break;
                    }
                    Ok(n) => {
                        if self.handle_input(&buf[..n])? == Outcome::Quit {
                            info!("quit requested");
                            break;
                        }
                    }
                    Err(Errno::EINTR) | Err(Errno::EAGAIN) => {}
                    Err(e) => return Err(e).context("failed to read terminal input"),
                }
            }

            for index in ready.sessions {
                self.pump_session(index, &mut buf)?;
            }
        }
        Ok(())
    }

    /// Block until stdin or a session has input, a signal lands, or the timeout expires
    fn wait(&self) -> Result<Readiness> {
        let stdin = io::stdin();
        let stdin_fd = stdin.as_fd();
        let sessions: Vec<(usize, BorrowedFd<'_>)> = self
            .manager
            .iter()
            .filter_map(|(index, session)| {
                // SAFETY: the master stays open while the manager holds the session
                session
                    .raw_fd()
                    .map(|fd| (index, unsafe { BorrowedFd::borrow_raw(fd) }))
            })
            .collect();

        let mut fds = Vec::with_capacity(sessions.len() + 1);
        fds.push(PollFd::new(&stdin_fd, PollFlags::POLLIN));
        for (_, fd) in &sessions {
            fds.push(PollFd::new(fd, PollFlags::POLLIN));
        }

        match poll(&mut fds, self.poll_timeout) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Readiness::default()),
            Err(e) => return Err(e).context("poll failed"),
        }

        let wanted = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
        let is_ready = |fd: &PollFd| fd.revents().is_some_and(|r| r.intersects(wanted));
        Ok(Readiness {
            stdin: is_ready(&fds[0]),
            sessions: sessions
                .iter()
                .zip(&fds[1..])
                .filter(|(_, fd)| is_ready(fd))
                .map(|((index, _), _)| *index)
                .collect(),
        })
    }

    /// Drain pending signal flags
    pub fn handle_signals(&mut self) -> io::Result<()> {
        if let Some(signal) = signals::take_forward() {
            if let Some(session) = self.manager.focused() {
                debug!(session = session.id, ?signal, "forwarding signal");
                if let Err(e) = session.signal(signal) {
                    warn!("failed to forward {:?}: {}", signal, e);
                }
            }
        }

        if signals::take_child_exited() {
            let mut removed = false;
            for pid in reap_children() {
                removed |= self.manager.remove_by_pid(pid).is_some();
            }
            if removed {
                self.redraw()?;
            }
        }

        if signals::take_resized() {
            match terminal::size() {
                Ok((cols, rows)) => {
                    info!(cols, rows, "terminal resized");
                    self.manager.resize(cols, rows);
                    self.redraw()?;
                }
                Err(e) => warn!("failed to query terminal size: {}", e),
            }
        }
        Ok(())
    }

    /// Route one chunk of host input
    pub fn handle_input(&mut self, chunk: &[u8]) -> io::Result<Outcome> {
        match self.router.route(chunk) {
            InputAction::Forward => match self.manager.focused_index() {
                Some(index) => self.write_to(index, chunk),
                None => Ok(Outcome::Handled),
            },
            InputAction::Consume => Ok(Outcome::Handled),
            InputAction::Command(command) => self.run_command(command),
            InputAction::Mouse(reports) => {
                let mut outcome = Outcome::Handled;
                for report in reports {
                    if let Outcome::Forwarded(index) = self.handle_mouse(report)? {
                        outcome = Outcome::Forwarded(index);
                    }
                }
                Ok(outcome)
            }
        }
    }

    fn run_command(&mut self, command: Command) -> io::Result<Outcome> {
        debug!(?command, "command");
        match command {
            Command::Quit => return Ok(Outcome::Quit),
            Command::NewSession => match self.manager.spawn() {
                Ok(index) => {
                    info!(session = index, "new session");
                    self.redraw()?;
                }
                Err(e) => warn!("cannot open session: {}", e),
            },
            Command::FocusNext => {
                if let Some(change) = self.manager.focus_adjacent(Direction::Next) {
                    self.repaint_focus(change)?;
                }
            }
            Command::FocusPrevious => {
                if let Some(change) = self.manager.focus_adjacent(Direction::Previous) {
                    self.repaint_focus(change)?;
                }
            }
        }
        Ok(Outcome::Handled)
    }

    fn handle_mouse(&mut self, report: MouseReport) -> io::Result<Outcome> {
        if report.is_press() {
            if let Some(index) = self.manager.session_at(report.col, report.row) {
                if let Some(change) = self.manager.focus(index) {
                    self.repaint_focus(change)?;
                }
            }
        }

        let Some(session) = self.manager.focused() else {
            return Ok(Outcome::Handled);
        };
        if !session.mouse_reporting() {
            return Ok(Outcome::Handled);
        }
        let bytes = report.encode_relative(&session.rect);
        let index = session.id;
        self.write_to(index, &bytes)
    }

    fn write_to(&mut self, index: usize, bytes: &[u8]) -> io::Result<Outcome> {
        let Some(session) = self.manager.get(index) else {
            return Ok(Outcome::Handled);
        };
        match session.write(bytes) {
            Ok(()) => Ok(Outcome::Forwarded(index)),
            Err(e) => {
                warn!(session = index, "write failed: {}", e);
                self.close_session(index)?;
                Ok(Outcome::Handled)
            }
        }
    }

    fn pump_session(&mut self, index: usize, buf: &mut [u8]) -> io::Result<()> {
        let Some(session) = self.manager.get(index) else {
            return Ok(());
        };
        match session.read_output(buf) {
            Ok(Some(0)) => {
                debug!(session = index, "end of output");
                self.close_session(index)
            }
            Ok(Some(n)) => self.handle_output(index, &buf[..n]),
            Ok(None) => Ok(()),
            Err(e) => {
                debug!(session = index, "read failed: {}", e);
                self.close_session(index)
            }
        }
    }

    /// Apply session output to its grid and paint the result
    pub fn handle_output(&mut self, index: usize, bytes: &[u8]) -> io::Result<()> {
        let focused = self.manager.focused_index() == Some(index);
        let Some(session) = self.manager.get_mut(index) else {
            return Ok(());
        };
        session.feed_bytes(bytes);
        let damage = session.grid.take_damage();

        if let Some(session) = self.manager.get(index) {
            self.renderer.paint(session, &damage, focused)?;
        }
        self.renderer.place_cursor(self.manager.focused())?;
        self.renderer.flush()
    }

    /// Drop a session and repaint the new tiling
    pub fn close_session(&mut self, index: usize) -> io::Result<()> {
        if self.manager.remove(index).is_some() {
            self.redraw()?;
        }
        Ok(())
    }

    fn repaint_focus(&mut self, change: FocusChange) -> io::Result<()> {
        if let Some(session) = change.from.and_then(|i| self.manager.get(i)) {
            self.renderer.draw_decoration(session, false)?;
        }
        if let Some(session) = self.manager.get(change.to) {
            self.renderer.draw_decoration(session, true)?;
        }
        self.renderer.place_cursor(self.manager.focused())?;
        self.renderer.flush()
    }

    /// Clear the host screen and repaint everything
    pub fn redraw(&mut self) -> io::Result<()> {
        for (_, session) in self.manager.iter_mut() {
            session.grid.take_damage();
        }
        if self.manager.is_empty() {
            return Ok(());
        }
        self.renderer.redraw_all(&self.manager)?;
        self.renderer.flush()
    }
}

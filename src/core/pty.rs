//! Unix pseudo-terminal wrapper
//!
//! Opens a PTY pair, forks a shell onto the slave side as a session leader
//! and exposes the non-blocking master for reading, writing, resizing and
//! signalling the shell's process group.

use std::ffi::{CStr, CString};
use std::os::fd::BorrowedFd;
use std::os::unix::io::{AsRawFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::{fcntl, open, FcntlArg, FdFlag, OFlag};
use nix::libc::{self, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::poll::{poll, PollFd, PollFlags};
use nix::pty::{grantpt, posix_openpt, ptsname, unlockpt, PtyMaster};
use nix::sys::signal::{kill, killpg, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, dup2, execvp, fork, read, setsid, write, ForkResult, Pid};
use thiserror::Error;
use tracing::{debug, warn};

/// Terminal type advertised to spawned shells. Shells inherit it from the
/// environment, so it must be exported before the first spawn.
pub const TERM: &str = "xterm";

/// Export [`TERM`] for every shell spawned afterwards.
///
/// Call once at startup while the process is still single threaded.
pub fn export_term() {
    std::env::set_var("TERM", TERM);
}

/// How long a blocked write waits for the master to drain
const WRITE_WAIT_MS: i32 = 100;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open PTY master: {0}")]
    OpenMaster(#[source] Errno),

    #[error("Failed to grant/unlock PTY: {0}")]
    Unlock(#[source] Errno),

    #[error("Failed to get PTY slave name: {0}")]
    PtsName(#[source] Errno),

    #[error("Invalid shell command: {0}")]
    InvalidCommand(String),

    #[error("Failed to fork: {0}")]
    Fork(#[source] Errno),

    #[error("Failed to configure PTY master: {0}")]
    Configure(#[source] Errno),

    #[error("Failed to set window size: {0}")]
    Resize(#[source] Errno),

    #[error("Failed to read from PTY: {0}")]
    Read(#[source] Errno),

    #[error("Failed to write to PTY: {0}")]
    Write(#[source] Errno),

    #[error("Failed to signal process group: {0}")]
    Signal(#[source] Errno),
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// PTY window size in character cells
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

impl WindowSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

/// A PTY master with its shell process
pub struct Pty {
    master: PtyMaster,
    child: Pid,
    reaped: bool,
}

impl Pty {
    /// Spawn `program` with `args` on a fresh PTY of the given size
    pub fn spawn(program: &str, args: &[String], size: WindowSize) -> Result<Self> {
        // Everything the child needs is allocated before fork
        let program_c =
            CString::new(program).map_err(|_| PtyError::InvalidCommand(program.to_string()))?;
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(program_c.clone());
        for arg in args {
            argv.push(CString::new(arg.as_str()).map_err(|_| PtyError::InvalidCommand(arg.clone()))?);
        }

        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(PtyError::OpenMaster)?;
        grantpt(&master).map_err(PtyError::Unlock)?;
        unlockpt(&master).map_err(PtyError::Unlock)?;

        // SAFETY: the process is single threaded at this point
        let slave_name = unsafe { ptsname(&master) }.map_err(PtyError::PtsName)?;
        let slave_path =
            CString::new(slave_name.as_str()).map_err(|_| PtyError::PtsName(Errno::EINVAL))?;

        set_window_size(master.as_raw_fd(), size)?;

        // SAFETY: the child only calls exec-path functions before execvp or _exit
        match unsafe { fork() }.map_err(PtyError::Fork)? {
            ForkResult::Child => {
                drop(master);
                exec_child(&slave_path, &program_c, &argv)
            }
            ForkResult::Parent { child } => {
                let flags = fcntl(master.as_raw_fd(), FcntlArg::F_GETFL)
                    .map_err(PtyError::Configure)?;
                let flags = OFlag::from_bits_truncate(flags);
                fcntl(
                    master.as_raw_fd(),
                    FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK),
                )
                .map_err(PtyError::Configure)?;
                // Later shells must not inherit this master
                fcntl(master.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
                    .map_err(PtyError::Configure)?;

                debug!(pid = child.as_raw(), tty = %slave_name, "spawned {}", program);
                Ok(Self {
                    master,
                    child,
                    reaped: false,
                })
            }
        }
    }

    /// Process id of the shell, also its process group id
    pub fn pid(&self) -> Pid {
        self.child
    }

    /// Record that the shell has already been waited for
    pub fn mark_reaped(&mut self) {
        self.reaped = true;
    }

    /// Non-blocking read from the master.
    ///
    /// `Ok(None)` means nothing is available yet; `Ok(Some(0))` is end of file.
    pub fn read(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        match read(self.master.as_raw_fd(), buf) {
            Ok(n) => Ok(Some(n)),
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(None),
            Err(e) => Err(PtyError::Read(e)),
        }
    }

    /// Write all of `data`, waiting for the master to drain when it is full
    pub fn write_all(&self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            match write(self.master.as_raw_fd(), data) {
                Ok(n) => data = &data[n..],
                Err(Errno::EINTR) => {}
                Err(Errno::EAGAIN) => self.wait_writable()?,
                Err(e) => return Err(PtyError::Write(e)),
            }
        }
        Ok(())
    }

    fn wait_writable(&self) -> Result<()> {
        // SAFETY: the master fd is valid for the lifetime of self
        let fd = unsafe { BorrowedFd::borrow_raw(self.master.as_raw_fd()) };
        let mut fds = [PollFd::new(&fd, PollFlags::POLLOUT)];
        match poll(&mut fds, WRITE_WAIT_MS) {
            Ok(0) => Err(PtyError::Write(Errno::EAGAIN)),
            Ok(_) | Err(Errno::EINTR) => Ok(()),
            Err(e) => Err(PtyError::Write(e)),
        }
    }

    pub fn resize(&self, size: WindowSize) -> Result<()> {
        set_window_size(self.master.as_raw_fd(), size)
    }

    /// Deliver `signal` to the shell's whole process group
    pub fn signal_group(&self, signal: Signal) -> Result<()> {
        killpg(self.child, signal).map_err(PtyError::Signal)
    }
}

impl AsRawFd for Pty {
    fn as_raw_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        if !self.reaped {
            if let Err(e) = kill(self.child, Signal::SIGHUP) {
                debug!(pid = self.child.as_raw(), "SIGHUP on close failed: {}", e);
            }
        }
    }
}

/// Child side of the fork: become session leader on the slave and exec.
fn exec_child(slave_path: &CStr, program: &CStr, argv: &[CString]) -> ! {
    if setsid().is_err() {
        child_exit();
    }

    let Ok(slave_fd) = open(slave_path, OFlag::O_RDWR, Mode::empty()) else {
        child_exit();
    };

    // SAFETY: TIOCSCTTY on a freshly opened slave in a new session
    unsafe {
        libc::ioctl(slave_fd, libc::TIOCSCTTY as _, 0);
    }

    for target in [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO] {
        if dup2(slave_fd, target).is_err() {
            child_exit();
        }
    }
    if slave_fd > STDERR_FILENO {
        let _ = close(slave_fd);
    }

    let _ = execvp(program, argv);
    child_exit()
}

fn child_exit() -> ! {
    // SAFETY: _exit skips the parent's atexit handlers and stdio buffers
    unsafe { libc::_exit(127) }
}

fn set_window_size(fd: RawFd, size: WindowSize) -> Result<()> {
    let winsize = libc::winsize {
        ws_row: size.rows,
        ws_col: size.cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    // SAFETY: TIOCSWINSZ reads a winsize struct
    let result = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &winsize) };
    if result < 0 {
        Err(PtyError::Resize(Errno::last()))
    } else {
        Ok(())
    }
}

/// Collect every child that has terminated, without blocking
pub fn reap_children() -> Vec<Pid> {
    let mut exited = Vec::new();
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
            Ok(status) => {
                if let Some(pid) = status.pid() {
                    debug!(pid = pid.as_raw(), ?status, "child terminated");
                    exited.push(pid);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!("waitpid failed: {}", e);
                break;
            }
        }
    }
    exited
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn read_until(pty: &Pty, needle: &str) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = String::new();
        let mut buf = [0u8; 1024];
        while Instant::now() < deadline && !out.contains(needle) {
            match pty.read(&mut buf) {
                Ok(Some(0)) | Err(_) => break,
                Ok(Some(n)) => out.push_str(&String::from_utf8_lossy(&buf[..n])),
                Ok(None) => std::thread::sleep(Duration::from_millis(10)),
            }
        }
        out
    }

    #[test]
    fn test_window_size() {
        let size = WindowSize::new(80, 24);
        assert_eq!(size.cols, 80);
        assert_eq!(size.rows, 24);
    }

    #[test]
    fn test_export_term() {
        export_term();
        assert_eq!(std::env::var("TERM").as_deref(), Ok(TERM));
    }

    #[test]
    fn test_interior_nul_is_rejected() {
        let err = Pty::spawn("bad\0name", &[], WindowSize::new(80, 24)).err();
        assert!(matches!(err, Some(PtyError::InvalidCommand(_))));
    }

    #[test]
    #[ignore = "spawns a real process on a PTY"]
    fn test_spawn_write_read_resize() {
        let pty = Pty::spawn("cat", &[], WindowSize::new(80, 24)).expect("spawn cat");
        pty.write_all(b"ping\n").expect("write");
        assert!(read_until(&pty, "ping").contains("ping"));
        pty.resize(WindowSize::new(100, 30)).expect("resize");
        pty.signal_group(Signal::SIGTERM).expect("signal");
    }
}

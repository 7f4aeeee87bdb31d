//! Core terminal emulation components.
//!
//! - **pty**: Unix pseudo-terminal wrapper and child reaping
//! - **term**: screen grid and control sequence parser
//! - **session**: a shell on a PTY together with its grid
//!
//! ```text
//! Session
//! ├── Pty (master fd + shell pid)
//! ├── Grid (cells, cursor, style, modes, damage)
//! └── Parser (resumable control sequence state)
//! ```

pub mod pty;
pub mod session;
pub mod term;

pub use pty::{export_term, reap_children, PtyError};
pub use session::{Session, ShellCommand};

//! User interface: host terminal handling, rendering and input routing.
//!
//! - **terminal**: raw mode guard and click reporting commands
//! - **renderer**: paints session grids, borders and the cursor
//! - **input**: prefix commands, mouse reports and forwarding

pub mod input;
pub mod renderer;
pub mod terminal;

pub use renderer::{Palette, Renderer};
pub use terminal::TerminalGuard;

//! Terminal emulation: the screen grid and the control sequence parser.

pub mod grid;
pub mod parser;

pub use grid::{Cell, Damage, Grid, Modes, MAX_COLS, MAX_ROWS};
pub use parser::Parser;

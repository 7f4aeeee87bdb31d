//! Window management: the session registry and its tiling.
//!
//! ```text
//! wm/
//! ├── mod.rs      - Module exports
//! ├── manager.rs  - SessionManager (registry, focus, re-tiling)
//! ├── pool.rs     - Pool (bounded storage with stable indices)
//! └── layout.rs   - Rect and the tiling computation
//! ```

pub mod layout;
pub mod manager;
pub mod pool;

pub use layout::Rect;
pub use manager::{FocusChange, SessionManager};
pub use pool::Direction;

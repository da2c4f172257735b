//! Base Module
//!
//! Building blocks shared by every stream object.
//!
//! ## Responsibilities
//! - Lifecycle and sticky failure state of stream objects
//! - Buffer windows with absolute position bookkeeping
//! - `Chain`, a rope of reference-counted blocks
//! - Owned / boxed / borrowed handles to wrapped objects
//! - Process-wide pools of reusable codec engines
//!
//! ## Buffer Window
//! ```text
//!   start_pos                 pos()                 limit_pos()
//!       │                       │                       │
//!       ▼                       ▼                       ▼
//!   ┌───────────────────────┬───────────────────────┐
//!   │   already consumed    │       available       │
//!   └───────────────────────┴───────────────────────┘
//!   start                 cursor                  limit
//! ```

mod chain;
mod cursor;
mod dependency;
mod object;
mod recycling_pool;

pub use chain::Chain;
pub use cursor::{BackwardCursor, BufferCursor};
pub use dependency::{Dependency, StableDependency};
pub use object::ObjectState;
pub use recycling_pool::{Recycled, RecyclingPool};

/// Absolute byte position in a stream
pub type Position = u64;

/// Largest slice that writers copy into their buffer instead of handing over
/// ownership of the source block.
pub const MAX_BYTES_TO_COPY: usize = 255;

/// Converts a buffer length into a position delta.
#[inline]
pub(crate) fn to_position(length: usize) -> Position {
    length as Position
}

/// Clamps a position delta to a buffer length.
#[inline]
pub(crate) fn to_length(delta: Position) -> usize {
    usize::try_from(delta).unwrap_or(usize::MAX)
}

//! Session-scoped fiber registry.
//!
//! Fibers live in an arena keyed by [`FiberId`]. Tree links are ids rather
//! than pointers, and are rebuilt by the tree builder on every pass.

mod core;
mod fiber;

pub use self::core::{Activation, FiberRegistry};
pub use self::fiber::{BoundaryAnchor, Fiber, FiberId, Phase, Player};

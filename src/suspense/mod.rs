//! Suspense boundaries and the tick-driven wait that resolves them.
//!
//! A boundary is pending from discovery until every state and reducer slot
//! in its fiber subtree has left its initial value, or until its deadline
//! passes. Either way it never returns to pending.

mod boundary;
mod wait;

pub use self::boundary::{
    Boundary, BoundaryListener, BoundaryRegistry, DiscoveredBoundary, SuspenseReport,
};
pub use self::wait::{SuspenseOutcome, SuspenseWait};

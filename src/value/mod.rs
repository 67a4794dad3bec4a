//! Dynamic values and identity comparison.
//!
//! Props, dependency lists and suspense baselines all compare values the same
//! way: numbers follow Object.is (`+0` and `-0` differ, `NaN` equals itself),
//! strings compare by content and everything reference-like compares by
//! pointer.

mod core;

pub use self::core::{Callback, SameValue, Value, callback, deps_changed, object_is};

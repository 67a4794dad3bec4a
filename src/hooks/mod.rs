//! Hook slots, the mount/update dispatcher and the handles hooks return.
//!
//! Every hook call consumes the next slot of the active fiber. The slot tag at
//! a given index must be the same on every activation; a mismatch is reported
//! as [`FiberError::HookOrderMismatch`](crate::FiberError::HookOrderMismatch).

mod dispatch;
mod event;
mod handles;
mod slot;

pub use self::dispatch::HookCx;
pub use self::event::{EventCallback, EventSignal, LocalSignal};
pub use self::handles::{DirtyFlag, Dispatch, ExitHandle, RefHandle, Setter};
pub use self::slot::{Cleanup, EffectFn, HookKind, cleanup};

pub(crate) use self::slot::{HookSlot, PendingEffect, TrackedState};

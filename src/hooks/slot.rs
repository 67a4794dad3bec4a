use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::context::ContextId;
use crate::error::Result;
use crate::value::{SameValue, Value};

/// Teardown returned by an effect body.
pub type Cleanup = Box<dyn FnOnce() -> Result<()>>;

/// Effect body scheduled during an activation.
pub type EffectFn = Box<dyn FnOnce() -> Result<Option<Cleanup>>>;

pub fn cleanup<F>(f: F) -> Option<Cleanup>
where
    F: FnOnce() -> Result<()> + 'static,
{
    Some(Box::new(f))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    State,
    Reducer,
    Effect,
    Ref,
    Context,
    Memo,
}

impl HookKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Reducer => "reducer",
            Self::Effect => "effect",
            Self::Ref => "ref",
            Self::Context => "context",
            Self::Memo => "memo",
        }
    }
}

pub(crate) struct StateCell<T> {
    pub(crate) value: T,
    pub(crate) initial: T,
    pub(crate) resolved: bool,
}

impl<T: Clone> StateCell<T> {
    pub(crate) fn new(initial: T) -> Self {
        Self {
            value: initial.clone(),
            initial,
            resolved: false,
        }
    }
}

/// Type-erased view of a state or reducer cell, read by suspense polling.
pub(crate) trait TrackedState {
    fn resolved(&self) -> bool;
}

impl<T: SameValue + Clone + 'static> TrackedState for RefCell<StateCell<T>> {
    fn resolved(&self) -> bool {
        self.borrow().resolved
    }
}

/// One state cell seen both as `Any` (typed access) and as `TrackedState`.
pub(crate) struct StateSlot {
    cell: Rc<dyn Any>,
    tracked: Rc<dyn TrackedState>,
}

impl StateSlot {
    pub(crate) fn new<T: SameValue + Clone + 'static>(cell: Rc<RefCell<StateCell<T>>>) -> Self {
        Self {
            cell: cell.clone(),
            tracked: cell,
        }
    }

    pub(crate) fn typed<T: 'static>(&self) -> Option<Rc<RefCell<StateCell<T>>>> {
        Rc::clone(&self.cell).downcast::<RefCell<StateCell<T>>>().ok()
    }
}

pub(crate) struct EffectSlot {
    pub(crate) deps: Option<Vec<Value>>,
    pub(crate) cleanup: Option<Cleanup>,
    pub(crate) has_run: bool,
}

pub(crate) struct MemoSlot {
    pub(crate) deps: Vec<Value>,
    pub(crate) value: Rc<dyn Any>,
}

pub(crate) enum HookSlot {
    State(StateSlot),
    Reducer {
        state: StateSlot,
        reducer: Rc<dyn Any>,
    },
    Effect(EffectSlot),
    Ref(Rc<dyn Any>),
    Context(ContextId),
    Memo(MemoSlot),
}

impl HookSlot {
    pub(crate) fn kind(&self) -> HookKind {
        match self {
            Self::State(_) => HookKind::State,
            Self::Reducer { .. } => HookKind::Reducer,
            Self::Effect(_) => HookKind::Effect,
            Self::Ref(_) => HookKind::Ref,
            Self::Context(_) => HookKind::Context,
            Self::Memo(_) => HookKind::Memo,
        }
    }

    pub(crate) fn tracked(&self) -> Option<&Rc<dyn TrackedState>> {
        match self {
            Self::State(slot) | Self::Reducer { state: slot, .. } => Some(&slot.tracked),
            _ => None,
        }
    }

    pub(crate) fn take_cleanup(&mut self) -> Option<Cleanup> {
        match self {
            Self::Effect(slot) => slot.cleanup.take(),
            _ => None,
        }
    }
}

impl fmt::Debug for HookSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Effect(slot) => f
                .debug_struct("Effect")
                .field("deps", &slot.deps)
                .field("has_cleanup", &slot.cleanup.is_some())
                .finish(),
            Self::Context(id) => f.debug_tuple("Context").field(id).finish(),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// Deps are stored on the slot only after the body succeeds.
pub(crate) struct PendingEffect {
    pub(crate) index: usize,
    pub(crate) deps: Option<Vec<Value>>,
    pub(crate) effect: EffectFn,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::handles::{DirtyFlag, store};

    #[test]
    fn tracked_state_reports_the_sticky_resolved_flag() {
        let cell = Rc::new(RefCell::new(StateCell::new(Option::<u32>::None)));
        let slot = StateSlot::new(cell.clone());
        let dirty = DirtyFlag::new();
        assert!(!slot.tracked.resolved());

        store(&cell, &dirty, None);
        assert!(!slot.tracked.resolved());
        store(&cell, &dirty, Some(3));
        assert!(slot.tracked.resolved());
        store(&cell, &dirty, None);
        assert!(slot.tracked.resolved());
    }

    #[test]
    fn typed_access_checks_the_stored_type() {
        let slot = StateSlot::new(Rc::new(RefCell::new(StateCell::new(1u8))));
        assert!(slot.typed::<u8>().is_some());
        assert!(slot.typed::<String>().is_none());
    }
}

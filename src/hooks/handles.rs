use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::value::SameValue;

use super::slot::StateCell;

/// Set whenever a setter or dispatch stores a value that differs from the
/// current one. Shared by every fiber of a session.
#[derive(Clone, Default)]
pub struct DirtyFlag(Rc<Cell<bool>>);

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.set(true);
    }

    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    /// Read and clear.
    pub fn take(&self) -> bool {
        self.0.replace(false)
    }
}

impl fmt::Debug for DirtyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DirtyFlag").field(&self.0.get()).finish()
    }
}

pub(crate) fn store<T: SameValue>(cell: &RefCell<StateCell<T>>, dirty: &DirtyFlag, next: T) {
    let mut cell = cell.borrow_mut();
    if !cell.resolved && !next.same_value(&cell.initial) {
        cell.resolved = true;
    }
    if !next.same_value(&cell.value) {
        dirty.mark();
    }
    cell.value = next;
}

/// Setter returned by `use_state`.
pub struct Setter<T> {
    cell: Rc<RefCell<StateCell<T>>>,
    dirty: DirtyFlag,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            dirty: self.dirty.clone(),
        }
    }
}

impl<T: SameValue + Clone + 'static> Setter<T> {
    pub(crate) fn new(cell: Rc<RefCell<StateCell<T>>>, dirty: DirtyFlag) -> Self {
        Self { cell, dirty }
    }

    /// Store `value`. The write always happens; an identical value leaves the
    /// dirty and resolved flags alone.
    pub fn set(&self, value: T) {
        store(&self.cell, &self.dirty, value);
    }

    /// Compute the next value from the currently stored one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.cell.borrow().value);
        self.set(next);
    }

    pub fn current(&self) -> T {
        self.cell.borrow().value.clone()
    }

    /// True once the value has ever diverged from the initial one.
    pub fn is_resolved(&self) -> bool {
        self.cell.borrow().resolved
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").finish_non_exhaustive()
    }
}

pub(crate) type ReducerFn<S, A> = Rc<dyn Fn(&S, A) -> S>;

/// Dispatch returned by `use_reducer`. Always applies the reducer from the
/// latest render.
pub struct Dispatch<S, A> {
    cell: Rc<RefCell<StateCell<S>>>,
    reducer: Rc<RefCell<ReducerFn<S, A>>>,
    dirty: DirtyFlag,
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            reducer: Rc::clone(&self.reducer),
            dirty: self.dirty.clone(),
        }
    }
}

impl<S: SameValue + Clone + 'static, A: 'static> Dispatch<S, A> {
    pub(crate) fn new(
        cell: Rc<RefCell<StateCell<S>>>,
        reducer: Rc<RefCell<ReducerFn<S, A>>>,
        dirty: DirtyFlag,
    ) -> Self {
        Self {
            cell,
            reducer,
            dirty,
        }
    }

    pub fn dispatch(&self, action: A) {
        let reducer = Rc::clone(&self.reducer.borrow());
        let next = {
            let current = &self.cell.borrow().value;
            reducer(current, action)
        };
        store(&self.cell, &self.dirty, next);
    }

    pub fn current(&self) -> S {
        self.cell.borrow().value.clone()
    }
}

impl<S, A> fmt::Debug for Dispatch<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch").finish_non_exhaustive()
    }
}

/// Mutable box returned by `use_ref`. Every activation hands back a clone of
/// the same allocation; writes never mark the session dirty.
pub struct RefHandle<T> {
    cell: Rc<RefCell<T>>,
}

impl<T> Clone for RefHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T> RefHandle<T> {
    pub(crate) fn from_cell(cell: Rc<RefCell<T>>) -> Self {
        Self { cell }
    }

    pub fn set(&self, value: T) {
        *self.cell.borrow_mut() = value;
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.borrow())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.cell.borrow_mut())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: Clone> RefHandle<T> {
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }
}

impl<T> fmt::Debug for RefHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefHandle")
            .field("ptr", &Rc::as_ptr(&self.cell))
            .finish()
    }
}

/// Ends the session after the current interaction instead of reshowing.
#[derive(Clone)]
pub struct ExitHandle {
    should_render: Rc<Cell<bool>>,
}

impl ExitHandle {
    pub(crate) fn new(should_render: Rc<Cell<bool>>) -> Self {
        Self { should_render }
    }

    pub fn exit(&self) {
        self.should_render.set(false);
    }
}

impl fmt::Debug for ExitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitHandle")
            .field("should_render", &self.should_render.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setter<T: SameValue + Clone + 'static>(initial: T) -> (Setter<T>, DirtyFlag) {
        let dirty = DirtyFlag::new();
        let cell = Rc::new(RefCell::new(StateCell::new(initial)));
        (Setter::new(cell, dirty.clone()), dirty)
    }

    #[test]
    fn identical_value_is_not_dirty() {
        let (set, dirty) = setter(0.0f64);
        set.set(0.0);
        assert!(!dirty.is_set());
        assert!(!set.is_resolved());
    }

    #[test]
    fn negative_zero_marks_dirty_and_resolved() {
        let (set, dirty) = setter(0.0f64);
        set.set(0.0);
        set.set(-0.0);
        assert!(dirty.take());
        assert!(set.is_resolved());
        assert!(set.current().is_sign_negative());
    }

    #[test]
    fn resolution_is_sticky() {
        let (set, _) = setter(1u32);
        set.set(2);
        set.set(1);
        assert!(set.is_resolved());
    }

    #[test]
    fn update_reads_the_stored_value() {
        let (set, _) = setter(1u32);
        set.update(|n| n + 1);
        set.update(|n| n * 10);
        assert_eq!(set.current(), 20);
    }
}

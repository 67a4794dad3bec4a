use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, ContextSnapshot};
use crate::error::{FiberError, Result};
use crate::registry::{Fiber, FiberRegistry, Phase, Player};
use crate::value::{SameValue, Value, deps_changed};

use super::event::{EventCallback, EventSignal};
use super::handles::{Dispatch, DirtyFlag, ExitHandle, ReducerFn, RefHandle, Setter};
use super::slot::{
    Cleanup, EffectSlot, HookKind, HookSlot, MemoSlot, PendingEffect, StateCell, StateSlot,
    cleanup,
};

/// Execution handle passed to component bodies.
///
/// Every hook resolves the fiber on top of the registry's activation stack
/// and consumes its next slot. Behavior is selected by the fiber's
/// [`Phase`]: mount pushes a fresh slot, update reuses the stored one and
/// rejects a slot of a different kind.
pub struct HookCx<'a> {
    registry: &'a mut FiberRegistry,
    snapshot: ContextSnapshot,
    dirty: DirtyFlag,
}

impl<'a> HookCx<'a> {
    pub fn new(registry: &'a mut FiberRegistry, snapshot: ContextSnapshot, dirty: DirtyFlag) -> Self {
        Self {
            registry,
            snapshot,
            dirty,
        }
    }

    pub fn context_snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }

    pub fn use_state<T>(&mut self, initial: T) -> Result<(T, Setter<T>)>
    where
        T: SameValue + Clone + 'static,
    {
        self.use_state_with(move || initial)
    }

    /// `use_state` with a lazy initializer, invoked on mount only.
    pub fn use_state_with<T, F>(&mut self, init: F) -> Result<(T, Setter<T>)>
    where
        T: SameValue + Clone + 'static,
        F: FnOnce() -> T,
    {
        let (_, slot) = self.claim("use_state", HookKind::State, || {
            HookSlot::State(StateSlot::new(Rc::new(RefCell::new(StateCell::new(init())))))
        })?;
        let cell = match slot {
            HookSlot::State(state) => state.typed::<T>(),
            _ => None,
        };
        let Some(cell) = cell else {
            return Err(self.retyped(HookKind::State));
        };
        let value = cell.borrow().value.clone();
        Ok((value, Setter::new(cell, self.dirty.clone())))
    }

    pub fn use_reducer<S, A, R>(&mut self, reducer: R, initial: S) -> Result<(S, Dispatch<S, A>)>
    where
        S: SameValue + Clone + 'static,
        A: 'static,
        R: Fn(&S, A) -> S + 'static,
    {
        self.use_reducer_with_init(reducer, initial, |state| state)
    }

    /// `use_reducer` whose initial state is computed once from `arg`.
    pub fn use_reducer_with_init<S, A, I, R, F>(
        &mut self,
        reducer: R,
        arg: I,
        init: F,
    ) -> Result<(S, Dispatch<S, A>)>
    where
        S: SameValue + Clone + 'static,
        A: 'static,
        R: Fn(&S, A) -> S + 'static,
        F: FnOnce(I) -> S,
    {
        let reducer: ReducerFn<S, A> = Rc::new(reducer);
        let mounted = Rc::clone(&reducer);
        let (_, slot) = self.claim("use_reducer", HookKind::Reducer, move || {
            let holder: Rc<RefCell<ReducerFn<S, A>>> = Rc::new(RefCell::new(mounted));
            HookSlot::Reducer {
                state: StateSlot::new(Rc::new(RefCell::new(StateCell::new(init(arg))))),
                reducer: holder,
            }
        })?;
        let parts = match slot {
            HookSlot::Reducer { state, reducer } => state.typed::<S>().zip(
                Rc::clone(reducer)
                    .downcast::<RefCell<ReducerFn<S, A>>>()
                    .ok(),
            ),
            _ => None,
        };
        let Some((cell, holder)) = parts else {
            return Err(self.retyped(HookKind::Reducer));
        };
        *holder.borrow_mut() = reducer;
        let value = cell.borrow().value.clone();
        Ok((value, Dispatch::new(cell, holder, self.dirty.clone())))
    }

    /// Schedule `effect` to run after this activation.
    ///
    /// `None` deps rerun on every activation; `Some(vec![])` runs once.
    pub fn use_effect<F>(&mut self, deps: Option<Vec<Value>>, effect: F) -> Result<()>
    where
        F: FnOnce() -> Result<Option<Cleanup>> + 'static,
    {
        self.schedule_effect("use_effect", deps, Box::new(effect))
    }

    pub fn use_ref<T: 'static>(&mut self, initial: T) -> Result<RefHandle<T>> {
        let (_, slot) = self.claim("use_ref", HookKind::Ref, || {
            let cell: Rc<dyn Any> = Rc::new(RefCell::new(initial));
            HookSlot::Ref(cell)
        })?;
        let cell = match slot {
            HookSlot::Ref(cell) => Rc::clone(cell).downcast::<RefCell<T>>().ok(),
            _ => None,
        };
        match cell {
            Some(cell) => Ok(RefHandle::from_cell(cell)),
            None => Err(self.retyped(HookKind::Ref)),
        }
    }

    /// Value visible for `context` at this point of the tree walk.
    pub fn use_context<T: Clone + 'static>(&mut self, context: &Context<T>) -> Result<T> {
        let (_, slot) = self.claim("use_context", HookKind::Context, || {
            HookSlot::Context(context.id())
        })?;
        if let HookSlot::Context(id) = slot {
            *id = context.id();
        }
        self.snapshot.read(context)
    }

    /// Cached value recomputed only when `deps` change.
    pub fn use_memo<T, F>(&mut self, deps: Vec<Value>, compute: F) -> Result<T>
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
    {
        let mut compute = Some(compute);
        let mounted_deps = deps.clone();
        let (_, slot) = self.claim("use_memo", HookKind::Memo, || {
            let value = compute.take().map(|f| f());
            HookSlot::Memo(MemoSlot {
                deps: mounted_deps,
                value: Rc::new(value),
            })
        })?;
        let value = match slot {
            HookSlot::Memo(memo) => {
                if let Some(f) = compute.take() {
                    if deps_changed(&memo.deps, &deps) {
                        memo.value = Rc::new(Some(f()));
                        memo.deps = deps;
                    }
                }
                memo.value.downcast_ref::<Option<T>>().cloned().flatten()
            }
            _ => None,
        };
        value.ok_or_else(|| self.retyped(HookKind::Memo))
    }

    /// Subscribe `callback` to `signal` and unsubscribe the same callback on
    /// cleanup. Default deps are the signal, the callback and the options.
    pub fn use_event<E, S>(
        &mut self,
        signal: &Rc<S>,
        callback: EventCallback<E>,
        options: Option<Value>,
        deps: Option<Vec<Value>>,
    ) -> Result<()>
    where
        E: 'static,
        S: EventSignal<E> + 'static,
    {
        let deps = deps.unwrap_or_else(|| {
            vec![
                Value::identity_of(signal),
                Value::identity_of(&callback),
                options.clone().unwrap_or_default(),
            ]
        });
        let signal = Rc::clone(signal);
        self.schedule_effect(
            "use_event",
            Some(deps),
            Box::new(move || {
                let subscribed = signal.subscribe(callback, options.as_ref());
                Ok(cleanup(move || {
                    signal.unsubscribe(&subscribed);
                    Ok(())
                }))
            }),
        )
    }

    /// Handle that ends the session after the current interaction.
    pub fn use_exit(&mut self) -> Result<ExitHandle> {
        let fiber = self.active_fiber("use_exit")?;
        Ok(ExitHandle::new(Rc::clone(&fiber.should_render)))
    }

    pub fn use_player(&mut self) -> Result<Player> {
        let fiber = self.active_fiber("use_player")?;
        Ok(fiber.player.clone())
    }

    fn schedule_effect(
        &mut self,
        hook: &'static str,
        deps: Option<Vec<Value>>,
        effect: super::EffectFn,
    ) -> Result<()> {
        let (index, slot) = self.claim(hook, HookKind::Effect, || {
            HookSlot::Effect(EffectSlot {
                deps: None,
                cleanup: None,
                has_run: false,
            })
        })?;
        let should_run = match slot {
            HookSlot::Effect(slot) => {
                match (&deps, &slot.deps) {
                    (None, _) => true,
                    _ if !slot.has_run => true,
                    (Some(_), None) => true,
                    (Some(next), Some(prev)) => deps_changed(prev, next),
                }
            }
            _ => false,
        };
        if should_run {
            self.active_fiber(hook)?
                .pending_effects
                .push(PendingEffect {
                    index,
                    deps,
                    effect,
                });
        }
        Ok(())
    }

    fn active_fiber(&mut self, hook: &'static str) -> Result<&mut Fiber> {
        let id = self
            .registry
            .current_fiber()
            .cloned()
            .ok_or(FiberError::OutsideActiveFiber { hook })?;
        self.registry
            .get_fiber_mut(&id)
            .ok_or(FiberError::OutsideActiveFiber { hook })
    }

    fn claim<F>(
        &mut self,
        hook: &'static str,
        kind: HookKind,
        init: F,
    ) -> Result<(usize, &mut HookSlot)>
    where
        F: FnOnce() -> HookSlot,
    {
        let fiber = self.active_fiber(hook)?;
        let index = fiber.hook_index;
        fiber.hook_index += 1;
        match fiber.phase {
            Phase::Mount => fiber.hooks.push(init()),
            Phase::Update => {
                let stored = fiber.hooks.get(index).map(HookSlot::kind);
                if stored != Some(kind) {
                    return Err(FiberError::HookOrderMismatch {
                        fiber: fiber.path.clone(),
                        index,
                        expected: stored.map(HookKind::as_str).unwrap_or("none"),
                        found: kind.as_str(),
                    });
                }
            }
        }
        let path = fiber.path.clone();
        fiber
            .hooks
            .get_mut(index)
            .map(|slot| (index, slot))
            .ok_or(FiberError::HookOrderMismatch {
                fiber: path,
                index,
                expected: "none",
                found: kind.as_str(),
            })
    }

    /// Error for a slot of the right kind holding a different value type.
    fn retyped(&self, kind: HookKind) -> FiberError {
        let (fiber, index) = self
            .registry
            .current_fiber()
            .and_then(|id| self.registry.get_fiber(id))
            .map(|fiber| (fiber.path.clone(), fiber.hook_index.saturating_sub(1)))
            .unwrap_or_default();
        FiberError::HookOrderMismatch {
            fiber,
            index,
            expected: kind.as_str(),
            found: "a different value type",
        }
    }
}

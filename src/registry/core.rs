use std::collections::HashMap;
use std::rc::Rc;

use crate::context::ContextSnapshot;
use crate::error::{FiberError, Result};
use crate::hooks::{DirtyFlag, HookCx, HookSlot};

use super::fiber::{Fiber, FiberId, Phase, Player};

/// Result of one successful activation.
#[derive(Debug)]
pub struct Activation<R> {
    pub output: R,
    pub effects_run: usize,
}

/// Session-scoped map from fiber id to fiber.
#[derive(Debug, Default)]
pub struct FiberRegistry {
    fibers: HashMap<FiberId, Fiber>,
    active: Vec<FiberId>,
    next_seq: u64,
}

impl FiberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    pub fn contains(&self, id: &FiberId) -> bool {
        self.fibers.contains_key(id)
    }

    /// Insert a fresh fiber, replacing any entry with the same id.
    pub fn create_fiber(&mut self, player: &Player, path: &str, name: &str) -> FiberId {
        let id = FiberId::derive(player, path);
        if let Some(previous) = self.fibers.remove(&id) {
            teardown_slots(previous);
        }
        let fiber = Fiber::new(
            id.clone(),
            player.clone(),
            path.to_string(),
            Rc::from(name),
            self.next_seq,
        );
        self.next_seq += 1;
        self.fibers.insert(id.clone(), fiber);
        id
    }

    pub fn get_or_create(&mut self, player: &Player, path: &str, name: &str) -> FiberId {
        let id = FiberId::derive(player, path);
        if self.fibers.contains_key(&id) {
            id
        } else {
            self.create_fiber(player, path, name)
        }
    }

    pub fn get_fiber(&self, id: &FiberId) -> Option<&Fiber> {
        self.fibers.get(id)
    }

    pub fn get_fiber_mut(&mut self, id: &FiberId) -> Option<&mut Fiber> {
        self.fibers.get_mut(id)
    }

    /// Fibers owned by `player`, oldest first.
    pub fn fibers_for_player(&self, player: &Player) -> Vec<FiberId> {
        let mut owned: Vec<&Fiber> = self
            .fibers
            .values()
            .filter(|fiber| fiber.player.id() == player.id())
            .collect();
        owned.sort_by_key(|fiber| fiber.seq);
        owned.into_iter().map(|fiber| fiber.id.clone()).collect()
    }

    /// Fiber whose body is currently executing.
    pub fn current_fiber(&self) -> Option<&FiberId> {
        self.active.last()
    }

    /// True once any fiber of `player` asked to end the session.
    pub fn exit_requested(&self, player: &Player) -> bool {
        self.fibers
            .values()
            .any(|fiber| fiber.player.id() == player.id() && !fiber.should_render.get())
    }

    /// Detach, run remaining cleanups and remove. Cleanup errors are dropped.
    /// Returns false when the fiber was already gone.
    pub fn delete_fiber(&mut self, id: &FiberId) -> bool {
        let Some(fiber) = self.fibers.remove(id) else {
            return false;
        };

        if let Some(parent_id) = &fiber.parent {
            let first_child = self.fibers.get(parent_id).and_then(|p| p.child.clone());
            if first_child.as_ref() == Some(id) {
                if let Some(parent) = self.fibers.get_mut(parent_id) {
                    parent.child = fiber.sibling.clone();
                }
            } else {
                let mut cursor = first_child;
                while let Some(current) = cursor {
                    let Some(node) = self.fibers.get_mut(&current) else {
                        break;
                    };
                    if node.sibling.as_ref() == Some(id) {
                        node.sibling = fiber.sibling.clone();
                        break;
                    }
                    cursor = node.sibling.clone();
                }
            }
        }

        let mut cursor = fiber.child.clone();
        while let Some(current) = cursor {
            cursor = match self.fibers.get_mut(&current) {
                Some(child) => {
                    child.parent = None;
                    child.sibling.clone()
                }
                None => None,
            };
        }

        teardown_slots(fiber);
        true
    }

    /// Delete every fiber of `player`, newest first.
    pub fn clear_player(&mut self, player: &Player) -> usize {
        let ids = self.fibers_for_player(player);
        self.delete_fibers(&ids)
    }

    /// Delete `ids` in reverse creation order.
    pub fn delete_fibers(&mut self, ids: &[FiberId]) -> usize {
        let mut ordered: Vec<(u64, FiberId)> = ids
            .iter()
            .filter_map(|id| self.fibers.get(id).map(|fiber| (fiber.seq, id.clone())))
            .collect();
        ordered.sort_by(|a, b| b.0.cmp(&a.0));
        ordered
            .into_iter()
            .filter(|(_, id)| self.delete_fiber(id))
            .count()
    }

    /// Clear the child chain of `id` before its children are relinked.
    pub(crate) fn reset_children(&mut self, id: &FiberId) {
        if let Some(fiber) = self.fibers.get_mut(id) {
            fiber.child = None;
        }
    }

    /// Append `child` to the end of `parent`'s child chain.
    pub fn link_child(&mut self, parent: &FiberId, child: &FiberId) {
        if parent == child || !self.fibers.contains_key(child) {
            return;
        }
        let Some(first) = self.fibers.get(parent).map(|p| p.child.clone()) else {
            return;
        };

        let mut index = 0;
        match first {
            None => {
                if let Some(p) = self.fibers.get_mut(parent) {
                    p.child = Some(child.clone());
                }
            }
            Some(first) => {
                let mut last = first;
                index = 1;
                loop {
                    let next = self.fibers.get(&last).and_then(|f| f.sibling.clone());
                    match next {
                        Some(next) if next != *child => {
                            last = next;
                            index += 1;
                        }
                        Some(_) => return,
                        None => break,
                    }
                }
                if last == *child {
                    return;
                }
                if let Some(prev) = self.fibers.get_mut(&last) {
                    prev.sibling = Some(child.clone());
                }
            }
        }

        if let Some(node) = self.fibers.get_mut(child) {
            node.parent = Some(parent.clone());
            node.sibling = None;
            node.index = index;
        }
    }

    /// Pre-order walk of `root` and its linked descendants.
    pub fn subtree(&self, root: &FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        if !self.fibers.contains_key(root) {
            return out;
        }
        let mut stack = vec![root.clone()];
        while let Some(id) = stack.pop() {
            let Some(fiber) = self.fibers.get(&id) else {
                continue;
            };
            let mut children = Vec::new();
            let mut cursor = fiber.child.clone();
            while let Some(child) = cursor {
                cursor = self.fibers.get(&child).and_then(|f| f.sibling.clone());
                children.push(child);
            }
            out.push(id);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Run `body` as the activation of fiber `id`.
    ///
    /// The cursor and pending effects are reset first. Scheduled effects are
    /// flushed after the body returns, then the fiber is promoted to
    /// [`Phase::Update`]. A failed activation leaves the phase unchanged and
    /// always pops the activation stack.
    pub fn activate<R, F>(
        &mut self,
        id: &FiberId,
        snapshot: ContextSnapshot,
        dirty: &DirtyFlag,
        body: F,
    ) -> Result<Activation<R>>
    where
        F: FnOnce(&mut HookCx<'_>) -> Result<R>,
    {
        let Some(fiber) = self.fibers.get_mut(id) else {
            return Err(FiberError::UnknownFiber {
                fiber: id.to_string(),
            });
        };
        if fiber.phase == Phase::Mount && !fiber.hooks.is_empty() {
            // A previous mount attempt failed part way.
            for slot in &mut fiber.hooks {
                if let Some(cleanup) = slot.take_cleanup() {
                    let _ = cleanup();
                }
            }
            fiber.hooks.clear();
        }
        fiber.hook_index = 0;
        fiber.pending_effects.clear();
        fiber.context_snapshot = snapshot.clone();

        self.active.push(id.clone());
        let outcome = {
            let mut cx = HookCx::new(self, snapshot, dirty.clone());
            body(&mut cx)
        };
        self.active.pop();
        let output = outcome?;

        if let Some(fiber) = self.fibers.get(id) {
            if fiber.phase == Phase::Update && fiber.hook_index != fiber.hooks.len() {
                let expected = fiber
                    .hooks
                    .get(fiber.hook_index)
                    .map(|slot| slot.kind().as_str())
                    .unwrap_or("none");
                return Err(FiberError::HookOrderMismatch {
                    fiber: fiber.path.clone(),
                    index: fiber.hook_index,
                    expected,
                    found: "none",
                });
            }
        }

        let effects_run = self.flush_effects(id)?;
        if let Some(fiber) = self.fibers.get_mut(id) {
            fiber.phase = Phase::Update;
        }
        Ok(Activation {
            output,
            effects_run,
        })
    }

    /// Run the effects scheduled on `id`, in scheduling order.
    ///
    /// Each slot's previous cleanup runs immediately before its new body.
    /// The first error aborts the flush and is returned.
    pub fn flush_effects(&mut self, id: &FiberId) -> Result<usize> {
        let Some(fiber) = self.fibers.get_mut(id) else {
            return Ok(0);
        };
        let pending = std::mem::take(&mut fiber.pending_effects);
        let mut ran = 0;
        for scheduled in pending {
            let previous = fiber
                .hooks
                .get_mut(scheduled.index)
                .and_then(HookSlot::take_cleanup);
            if let Some(cleanup) = previous {
                cleanup()?;
            }
            let next_cleanup = (scheduled.effect)()?;
            if let Some(HookSlot::Effect(slot)) = fiber.hooks.get_mut(scheduled.index) {
                slot.cleanup = next_cleanup;
                slot.deps = scheduled.deps;
                slot.has_run = true;
            }
            ran += 1;
        }
        Ok(ran)
    }
}

fn teardown_slots(mut fiber: Fiber) {
    for slot in &mut fiber.hooks {
        if let Some(cleanup) = slot.take_cleanup() {
            let _ = cleanup();
        }
    }
}

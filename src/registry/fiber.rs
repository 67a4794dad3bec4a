use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::context::{ContextSnapshot, SuspenseMeta};
use crate::hooks::{HookSlot, PendingEffect, TrackedState};

/// Owner of a session. Fibers are partitioned by player id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Player {
    id: Rc<str>,
    name: Rc<str>,
}

impl Player {
    pub fn new(id: impl Into<Rc<str>>, name: impl Into<Rc<str>>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Stable component-instance id: digest of the owning player and the
/// instance path, so the same logical node maps to the same fiber across
/// renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId(String);

impl FiberId {
    const HEX_LEN: usize = 32;

    pub fn derive(player: &Player, path: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(player.id().as_bytes());
        hasher.update(b"|");
        hasher.update(path.as_bytes());
        let hex = hasher.finalize().to_hex();
        Self(hex[..Self::HEX_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// First activation: every hook initializes its slot.
    Mount,
    /// Later activations: slots are reused and must keep their order.
    Update,
}

/// Boundary metadata carried by the fiber anchoring a suspense provider.
#[derive(Debug, Clone)]
pub struct BoundaryAnchor {
    pub meta: SuspenseMeta,
    pub resolved: bool,
}

pub struct Fiber {
    pub(crate) id: FiberId,
    pub(crate) path: String,
    pub(crate) name: Rc<str>,
    pub(crate) player: Player,
    pub(crate) phase: Phase,
    pub(crate) hooks: Vec<HookSlot>,
    pub(crate) hook_index: usize,
    pub(crate) pending_effects: Vec<PendingEffect>,
    pub(crate) context_snapshot: ContextSnapshot,
    pub(crate) should_render: Rc<Cell<bool>>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) index: usize,
    pub(crate) suspense: Option<BoundaryAnchor>,
    pub(crate) nearest_boundary: Option<Rc<str>>,
    pub(crate) seq: u64,
}

impl Fiber {
    pub(crate) fn new(id: FiberId, player: Player, path: String, name: Rc<str>, seq: u64) -> Self {
        Self {
            id,
            path,
            name,
            player,
            phase: Phase::Mount,
            hooks: Vec::new(),
            hook_index: 0,
            pending_effects: Vec::new(),
            context_snapshot: ContextSnapshot::new(),
            should_render: Rc::new(Cell::new(true)),
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            suspense: None,
            nearest_boundary: None,
            seq,
        }
    }

    pub fn id(&self) -> &FiberId {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub fn hook_index(&self) -> usize {
        self.hook_index
    }

    pub fn pending_effect_count(&self) -> usize {
        self.pending_effects.len()
    }

    pub fn context_snapshot(&self) -> &ContextSnapshot {
        &self.context_snapshot
    }

    pub fn should_render(&self) -> bool {
        self.should_render.get()
    }

    pub fn parent(&self) -> Option<&FiberId> {
        self.parent.as_ref()
    }

    pub fn child(&self) -> Option<&FiberId> {
        self.child.as_ref()
    }

    pub fn sibling(&self) -> Option<&FiberId> {
        self.sibling.as_ref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn suspense(&self) -> Option<&BoundaryAnchor> {
        self.suspense.as_ref()
    }

    pub fn nearest_boundary(&self) -> Option<&str> {
        self.nearest_boundary.as_deref()
    }

    /// Slot tags in registration order.
    pub fn hook_kinds(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|slot| slot.kind().as_str()).collect()
    }

    pub(crate) fn tracked_states(&self) -> Vec<Rc<dyn TrackedState>> {
        self.hooks
            .iter()
            .filter_map(|slot| slot.tracked().cloned())
            .collect()
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("phase", &self.phase)
            .field("hooks", &self.hooks)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("sibling", &self.sibling)
            .field("suspense", &self.suspense)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_per_player_and_path() {
        let alex = Player::new("p-1", "Alex");
        let sam = Player::new("p-2", "Sam");
        let a = FiberId::derive(&alex, "App#0/Counter#0");
        assert_eq!(a, FiberId::derive(&alex, "App#0/Counter#0"));
        assert_ne!(a, FiberId::derive(&alex, "App#0/Counter#1"));
        assert_ne!(a, FiberId::derive(&sam, "App#0/Counter#0"));
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}

use std::task::Poll;

use crate::registry::{FiberId, FiberRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspenseOutcome {
    /// Every tracked slot under the boundary has left its initial value.
    Resolved,
    /// The deadline passed first. Rendering proceeds with whatever state exists.
    TimedOut,
    /// The session ended while the boundary was still pending.
    Cancelled,
}

impl SuspenseOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Instance set seen at capture time, with each fiber's tracked slot count.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Baseline(Vec<(FiberId, usize)>);

impl Baseline {
    /// `None` while any instance is missing from the registry.
    fn capture(registry: &FiberRegistry, instances: &[FiberId]) -> Option<Self> {
        instances
            .iter()
            .map(|id| {
                registry
                    .get_fiber(id)
                    .map(|fiber| (id.clone(), fiber.tracked_states().len()))
            })
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    fn is_resolved(&self, registry: &FiberRegistry) -> bool {
        self.0.iter().all(|(id, _)| {
            registry.get_fiber(id).is_some_and(|fiber| {
                fiber
                    .tracked_states()
                    .iter()
                    .all(|state| state.resolved())
            })
        })
    }
}

enum WaitState {
    Pending {
        deadline: u64,
        baseline: Option<Baseline>,
    },
    Finished(SuspenseOutcome),
}

/// Pending → finished state machine for one boundary.
pub struct SuspenseWait {
    started: u64,
    state: WaitState,
}

impl SuspenseWait {
    pub fn new(started: u64, timeout_ticks: u64) -> Self {
        Self {
            started,
            state: WaitState::Pending {
                deadline: started.saturating_add(timeout_ticks),
                baseline: None,
            },
        }
    }

    pub fn started(&self) -> u64 {
        self.started
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, WaitState::Pending { .. })
    }

    pub fn outcome(&self) -> Option<SuspenseOutcome> {
        match self.state {
            WaitState::Finished(outcome) => Some(outcome),
            WaitState::Pending { .. } => None,
        }
    }

    pub fn has_baseline(&self) -> bool {
        matches!(
            self.state,
            WaitState::Pending {
                baseline: Some(_),
                ..
            }
        )
    }

    /// Record which instances the boundary waits on. No-op once a baseline
    /// exists, or while an instance is missing from the registry.
    pub fn capture(&mut self, registry: &FiberRegistry, instances: &[FiberId]) {
        if let WaitState::Pending { baseline, .. } = &mut self.state {
            if baseline.is_none() {
                *baseline = Baseline::capture(registry, instances);
            }
        }
    }

    /// Check the wait at tick `now`.
    ///
    /// Resolution needs the instance set and slot counts seen at capture,
    /// and every tracked slot flagged resolved. A changed instance set
    /// becomes the new baseline and the wait stays pending for that poll.
    pub fn poll(
        &mut self,
        now: u64,
        registry: &FiberRegistry,
        instances: &[FiberId],
    ) -> Poll<SuspenseOutcome> {
        self.capture(registry, instances);
        let (deadline, baseline) = match &mut self.state {
            WaitState::Finished(outcome) => return Poll::Ready(*outcome),
            WaitState::Pending { deadline, baseline } => (*deadline, baseline),
        };
        let current = Baseline::capture(registry, instances);
        let resolved = match (baseline.as_ref(), current) {
            (Some(before), Some(current)) if *before == current => {
                before.is_resolved(registry)
            }
            (_, Some(current)) => {
                *baseline = Some(current);
                false
            }
            (_, None) => false,
        };
        let outcome = if resolved {
            SuspenseOutcome::Resolved
        } else if now >= deadline {
            SuspenseOutcome::TimedOut
        } else {
            return Poll::Pending;
        };
        self.state = WaitState::Finished(outcome);
        Poll::Ready(outcome)
    }

    /// Stop waiting. Finished waits keep their outcome.
    pub fn cancel(&mut self) -> bool {
        if self.is_pending() {
            self.state = WaitState::Finished(SuspenseOutcome::Cancelled);
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for SuspenseWait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            WaitState::Pending { deadline, baseline } => format!(
                "pending(deadline={deadline}, instances={})",
                baseline.as_ref().map_or(0, |b| b.0.len())
            ),
            WaitState::Finished(outcome) => outcome.as_str().to_string(),
        };
        f.debug_struct("SuspenseWait")
            .field("started", &self.started)
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSnapshot;
    use crate::hooks::{DirtyFlag, Setter};
    use crate::registry::Player;

    fn mounted(registry: &mut FiberRegistry) -> (FiberId, Setter<Option<u32>>) {
        mounted_at(registry, "Loader#0")
    }

    fn mounted_at(registry: &mut FiberRegistry, path: &str) -> (FiberId, Setter<Option<u32>>) {
        let player = Player::new("p-1", "Alex");
        let id = registry.create_fiber(&player, path, "Loader");
        let setter = registry
            .activate(&id, ContextSnapshot::new(), &DirtyFlag::new(), |cx| {
                cx.use_state(Option::<u32>::None).map(|(_, set)| set)
            })
            .unwrap()
            .output;
        (id, setter)
    }

    #[test]
    fn resolves_only_after_state_moves() {
        let mut registry = FiberRegistry::new();
        let (id, setter) = mounted(&mut registry);
        let instances = vec![id];
        let mut wait = SuspenseWait::new(0, 10);

        assert_eq!(wait.poll(0, &registry, &instances), Poll::Pending);
        assert_eq!(wait.poll(1, &registry, &instances), Poll::Pending);
        setter.set(Some(7));
        assert_eq!(
            wait.poll(2, &registry, &instances),
            Poll::Ready(SuspenseOutcome::Resolved)
        );
        setter.set(None);
        assert_eq!(
            wait.poll(3, &registry, &instances),
            Poll::Ready(SuspenseOutcome::Resolved)
        );
    }

    #[test]
    fn state_set_before_the_first_poll_counts_as_resolved() {
        let mut registry = FiberRegistry::new();
        let (id, setter) = mounted(&mut registry);
        setter.set(Some(7));
        let mut wait = SuspenseWait::new(0, 10);
        assert_eq!(
            wait.poll(0, &registry, &[id]),
            Poll::Ready(SuspenseOutcome::Resolved)
        );
    }

    #[test]
    fn returning_to_the_initial_value_still_counts_as_resolved() {
        let mut registry = FiberRegistry::new();
        let (id, setter) = mounted(&mut registry);
        let mut wait = SuspenseWait::new(0, 10);
        assert_eq!(wait.poll(0, &registry, &[id.clone()]), Poll::Pending);
        setter.set(Some(1));
        setter.set(None);
        assert_eq!(
            wait.poll(1, &registry, &[id]),
            Poll::Ready(SuspenseOutcome::Resolved)
        );
    }

    #[test]
    fn instance_mounted_after_capture_must_resolve_too() {
        let mut registry = FiberRegistry::new();
        let (first, first_set) = mounted_at(&mut registry, "Loader#0");
        let mut wait = SuspenseWait::new(0, 10);
        wait.capture(&registry, &[first.clone()]);

        let (second, second_set) = mounted_at(&mut registry, "Loader#1");
        let both = vec![first, second];
        first_set.set(Some(1));
        assert_eq!(wait.poll(1, &registry, &both), Poll::Pending);
        assert_eq!(wait.poll(2, &registry, &both), Poll::Pending);

        second_set.set(Some(2));
        assert_eq!(
            wait.poll(3, &registry, &both),
            Poll::Ready(SuspenseOutcome::Resolved)
        );
    }

    #[test]
    fn times_out_at_the_deadline() {
        let mut registry = FiberRegistry::new();
        let (id, _setter) = mounted(&mut registry);
        let instances = vec![id];
        let mut wait = SuspenseWait::new(5, 3);
        assert_eq!(wait.poll(5, &registry, &instances), Poll::Pending);
        assert_eq!(wait.poll(7, &registry, &instances), Poll::Pending);
        assert_eq!(
            wait.poll(8, &registry, &instances),
            Poll::Ready(SuspenseOutcome::TimedOut)
        );
        assert!(!wait.cancel());
    }

    #[test]
    fn empty_baseline_resolves_immediately() {
        let registry = FiberRegistry::new();
        let mut wait = SuspenseWait::new(0, 10);
        assert_eq!(
            wait.poll(0, &registry, &[]),
            Poll::Ready(SuspenseOutcome::Resolved)
        );
    }

    #[test]
    fn deleted_instance_keeps_waiting() {
        let mut registry = FiberRegistry::new();
        let (id, setter) = mounted(&mut registry);
        let instances = vec![id.clone()];
        let mut wait = SuspenseWait::new(0, 10);
        wait.capture(&registry, &instances);
        setter.set(Some(1));
        registry.delete_fiber(&id);
        assert_eq!(wait.poll(1, &registry, &instances), Poll::Pending);
        assert!(wait.cancel());
        assert_eq!(wait.outcome(), Some(SuspenseOutcome::Cancelled));
    }
}

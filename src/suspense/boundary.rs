use std::fmt;
use std::task::Poll;

use crate::context::SuspenseMeta;
use crate::error::Result;
use crate::registry::{FiberId, FiberRegistry};

use super::wait::{SuspenseOutcome, SuspenseWait};

/// Boundary seen by the tree builder during one pass.
#[derive(Debug, Clone)]
pub struct DiscoveredBoundary {
    pub meta: SuspenseMeta,
    /// Fiber anchoring the boundary; its linked subtree is what gets tracked.
    pub anchor: FiberId,
}

#[derive(Debug)]
pub struct Boundary {
    pub meta: SuspenseMeta,
    pub anchor: FiberId,
    pub wait: SuspenseWait,
}

pub type BoundaryListener = Box<dyn FnMut(&str, SuspenseOutcome) -> Result<()>>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SuspenseReport {
    pub newly_resolved: Vec<String>,
    pub newly_timed_out: Vec<String>,
    pub still_pending: Vec<String>,
    /// Listener failures as `boundary: message`. One failing listener does
    /// not stop the others.
    pub listener_errors: Vec<String>,
}

impl SuspenseReport {
    /// True when this poll finished the last pending boundaries, so the
    /// surface on screen reflects pre-resolution state.
    pub fn all_just_resolved(&self) -> bool {
        self.still_pending.is_empty()
            && (!self.newly_resolved.is_empty() || !self.newly_timed_out.is_empty())
    }

    pub fn is_quiet(&self) -> bool {
        self.newly_resolved.is_empty() && self.newly_timed_out.is_empty()
    }
}

/// Boundaries of one session, keyed by boundary id in discovery order.
#[derive(Default)]
pub struct BoundaryRegistry {
    boundaries: Vec<Boundary>,
    listeners: Vec<BoundaryListener>,
}

impl BoundaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Boundary> {
        self.boundaries.iter().find(|b| b.meta.id == id)
    }

    /// Register boundaries not seen before. Known ids only refresh their
    /// anchor; a finished boundary stays finished.
    pub fn discover(&mut self, found: &[DiscoveredBoundary], now: u64, default_timeout: u64) -> usize {
        let mut added = 0;
        for entry in found {
            if let Some(existing) = self.boundaries.iter_mut().find(|b| b.meta.id == entry.meta.id) {
                existing.anchor = entry.anchor.clone();
                continue;
            }
            let timeout = entry.meta.timeout_ticks.unwrap_or(default_timeout);
            self.boundaries.push(Boundary {
                meta: entry.meta.clone(),
                anchor: entry.anchor.clone(),
                wait: SuspenseWait::new(now, timeout),
            });
            added += 1;
        }
        added
    }

    pub fn any_pending(&self) -> bool {
        self.boundaries.iter().any(|b| b.wait.is_pending())
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.boundaries
            .iter()
            .filter(|b| b.wait.is_pending())
            .map(|b| b.meta.id.clone())
            .collect()
    }

    /// Called once per boundary when it resolves or times out.
    pub fn on_resolve<F>(&mut self, listener: F)
    where
        F: FnMut(&str, SuspenseOutcome) -> Result<()> + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Poll every pending boundary against its anchor's current subtree.
    pub fn poll_all(&mut self, now: u64, registry: &mut FiberRegistry) -> SuspenseReport {
        let mut report = SuspenseReport::default();
        let mut finished = Vec::new();

        for boundary in self.boundaries.iter_mut().filter(|b| b.wait.is_pending()) {
            let instances = registry.subtree(&boundary.anchor);
            match boundary.wait.poll(now, registry, &instances) {
                Poll::Pending => report.still_pending.push(boundary.meta.id.clone()),
                Poll::Ready(outcome) => {
                    if let Some(anchor) = registry
                        .get_fiber_mut(&boundary.anchor)
                        .and_then(|fiber| fiber.suspense.as_mut())
                    {
                        anchor.resolved = true;
                    }
                    match outcome {
                        SuspenseOutcome::TimedOut => {
                            report.newly_timed_out.push(boundary.meta.id.clone())
                        }
                        _ => report.newly_resolved.push(boundary.meta.id.clone()),
                    }
                    finished.push((boundary.meta.id.clone(), outcome));
                }
            }
        }

        for (id, outcome) in finished {
            for listener in &mut self.listeners {
                if let Err(err) = listener(&id, outcome) {
                    report.listener_errors.push(format!("{id}: {err}"));
                }
            }
        }
        report
    }

    /// Cancel every pending wait. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for boundary in &mut self.boundaries {
            if boundary.wait.cancel() {
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn clear(&mut self) {
        self.boundaries.clear();
    }
}

impl fmt::Debug for BoundaryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryRegistry")
            .field("boundaries", &self.boundaries)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSnapshot;
    use crate::error::FiberError;
    use crate::hooks::DirtyFlag;
    use crate::registry::{BoundaryAnchor, Player};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn anchor(registry: &mut FiberRegistry, id: &str) -> DiscoveredBoundary {
        let player = Player::new("p-1", "Alex");
        let meta = SuspenseMeta {
            id: id.to_string(),
            timeout_ticks: Some(2),
        };
        let fiber = registry.create_fiber(&player, &format!("Suspense[{id}]"), "Suspense");
        registry.get_fiber_mut(&fiber).unwrap().suspense = Some(BoundaryAnchor {
            meta: meta.clone(),
            resolved: false,
        });
        let child = registry.create_fiber(&player, &format!("Suspense[{id}]/Child#0"), "Child");
        registry.link_child(&fiber, &child);
        registry
            .activate(&child, ContextSnapshot::new(), &DirtyFlag::new(), |cx| {
                cx.use_state(0u8).map(|_| ())
            })
            .unwrap();
        DiscoveredBoundary { meta, anchor: fiber }
    }

    #[test]
    fn rediscovery_keeps_the_original_wait() {
        let mut registry = FiberRegistry::new();
        let found = vec![anchor(&mut registry, "a")];
        let mut boundaries = BoundaryRegistry::new();
        assert_eq!(boundaries.discover(&found, 0, 100), 1);
        assert_eq!(boundaries.discover(&found, 5, 100), 0);
        assert_eq!(boundaries.get("a").unwrap().wait.started(), 0);
    }

    #[test]
    fn timeout_marks_the_anchor_and_notifies_every_listener() {
        let mut registry = FiberRegistry::new();
        let found = vec![anchor(&mut registry, "a")];
        let mut boundaries = BoundaryRegistry::new();
        boundaries.discover(&found, 0, 100);

        let seen = Rc::new(RefCell::new(Vec::new()));
        boundaries.on_resolve(|_, _| Err(FiberError::application("listener broke")));
        {
            let seen = seen.clone();
            boundaries.on_resolve(move |id, outcome| {
                seen.borrow_mut().push((id.to_string(), outcome));
                Ok(())
            });
        }

        let first = boundaries.poll_all(0, &mut registry);
        assert_eq!(first.still_pending, vec!["a"]);
        assert!(!first.all_just_resolved());
        assert!(boundaries.any_pending());

        let second = boundaries.poll_all(2, &mut registry);
        assert_eq!(second.newly_timed_out, vec!["a"]);
        assert!(second.all_just_resolved());
        assert_eq!(second.listener_errors, vec!["a: listener broke"]);
        assert_eq!(*seen.borrow(), vec![("a".to_string(), SuspenseOutcome::TimedOut)]);
        assert!(registry.get_fiber(&found[0].anchor).unwrap().suspense().unwrap().resolved);

        let third = boundaries.poll_all(3, &mut registry);
        assert!(third.is_quiet());
        assert!(!third.all_just_resolved());
    }

    #[test]
    fn cancel_all_stops_pending_waits() {
        let mut registry = FiberRegistry::new();
        let found = vec![anchor(&mut registry, "a"), anchor(&mut registry, "b")];
        let mut boundaries = BoundaryRegistry::new();
        boundaries.discover(&found, 0, 100);
        assert_eq!(boundaries.cancel_all(), 2);
        assert!(!boundaries.any_pending());
        assert!(boundaries.poll_all(1, &mut registry).is_quiet());
    }
}

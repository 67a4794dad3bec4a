use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::error::{FiberError, Result};
use crate::registry::Player;
use crate::runtime::Session;
use crate::runtime::host::{
    FormResponse, FormSurface, FormTicket, InputLock, InputPermissions, RunHandle, TickScheduler,
};

#[derive(Debug, Clone, Copy)]
struct Interval {
    every: u64,
    next_due: u64,
}

/// In-memory host with a manual tick clock.
///
/// Forms are recorded instead of displayed. Closing an open form queues the
/// canceled response a real client would send back.
#[derive(Debug, Default)]
pub struct SimulatedHost {
    tick: u64,
    next_handle: u64,
    next_ticket: FormTicket,
    intervals: BTreeMap<RunHandle, Interval>,
    one_shots: BTreeMap<RunHandle, u64>,
    cleared: Vec<RunHandle>,
    shown: Vec<String>,
    form_open: bool,
    closes: usize,
    closed_responses: VecDeque<FormResponse>,
    permissions: HashMap<String, InputPermissions>,
    acquires: usize,
    releases: usize,
    fail_show: bool,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `show` fail.
    pub fn failing_show(mut self) -> Self {
        self.fail_show = true;
        self
    }

    /// Move the clock one tick and return the runs that fired, in handle
    /// order. Intervals re-arm; one-shot runs are dropped.
    pub fn advance(&mut self) -> Vec<RunHandle> {
        self.tick += 1;
        let now = self.tick;
        let mut fired = Vec::new();
        for (handle, interval) in self.intervals.iter_mut() {
            if interval.next_due <= now {
                interval.next_due = now + interval.every;
                fired.push(*handle);
            }
        }
        let due: Vec<RunHandle> = self
            .one_shots
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(handle, _)| *handle)
            .collect();
        for handle in due {
            self.one_shots.remove(&handle);
            fired.push(handle);
        }
        fired.sort();
        fired
    }

    /// The player answers the open form.
    pub fn answer(&mut self, response: FormResponse) -> FormResponse {
        self.form_open = false;
        response
    }

    pub fn take_closed_response(&mut self) -> Option<FormResponse> {
        self.closed_responses.pop_front()
    }

    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    pub fn last_shown(&self) -> Option<&str> {
        self.shown.last().map(String::as_str)
    }

    pub fn form_open(&self) -> bool {
        self.form_open
    }

    pub fn closes(&self) -> usize {
        self.closes
    }

    pub fn cleared(&self) -> &[RunHandle] {
        &self.cleared
    }

    pub fn is_scheduled(&self, handle: RunHandle) -> bool {
        self.intervals.contains_key(&handle) || self.one_shots.contains_key(&handle)
    }

    pub fn active_runs(&self) -> usize {
        self.intervals.len() + self.one_shots.len()
    }

    pub fn acquires(&self) -> usize {
        self.acquires
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    pub fn permissions(&self, player: &Player) -> InputPermissions {
        self.permissions
            .get(player.id())
            .copied()
            .unwrap_or_default()
    }

    fn handle(&mut self) -> RunHandle {
        self.next_handle += 1;
        RunHandle(self.next_handle)
    }
}

impl FormSurface for SimulatedHost {
    fn show(&mut self, _player: &Player, payload: &str) -> Result<FormTicket> {
        if self.fail_show {
            return Err(FiberError::Host("form surface unavailable".to_string()));
        }
        self.shown.push(payload.to_string());
        self.form_open = true;
        self.next_ticket += 1;
        Ok(self.next_ticket)
    }

    fn close_all_forms(&mut self, _player: &Player) {
        self.closes += 1;
        if self.form_open {
            self.form_open = false;
            self.closed_responses.push_back(FormResponse::canceled());
        }
    }
}

impl TickScheduler for SimulatedHost {
    fn current_tick(&self) -> u64 {
        self.tick
    }

    fn run_interval(&mut self, every_ticks: u64) -> RunHandle {
        let handle = self.handle();
        let every = every_ticks.max(1);
        self.intervals.insert(
            handle,
            Interval {
                every,
                next_due: self.tick + every,
            },
        );
        handle
    }

    fn run_timeout(&mut self, after_ticks: u64) -> RunHandle {
        let handle = self.handle();
        self.one_shots
            .insert(handle, self.tick.saturating_add(after_ticks.max(1)));
        handle
    }

    fn clear_run(&mut self, handle: RunHandle) {
        let removed = self.intervals.remove(&handle).is_some()
            || self.one_shots.remove(&handle).is_some();
        if removed {
            self.cleared.push(handle);
        }
    }
}

impl InputLock for SimulatedHost {
    fn acquire(&mut self, player: &Player) -> Result<InputPermissions> {
        self.acquires += 1;
        let prior = self.permissions(player);
        self.permissions.insert(
            player.id().to_string(),
            InputPermissions {
                movement: false,
                camera: false,
            },
        );
        Ok(prior)
    }

    fn release(&mut self, player: &Player, prior: InputPermissions) {
        self.releases += 1;
        self.permissions.insert(player.id().to_string(), prior);
    }
}

/// One scripted host input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    Respond(FormResponse),
    Tick,
    Ticks(u64),
}

/// Open `session` and replay `steps` against `host`.
///
/// Canceled responses produced by forced closes are delivered after every
/// step. Stops early once the session closes.
pub fn run_scripted<I>(session: &mut Session, host: &mut SimulatedHost, steps: I) -> Result<()>
where
    I: IntoIterator<Item = ScriptStep>,
{
    session.open(host)?;
    deliver_closed(session, host)?;
    for step in steps {
        if !session.is_open() {
            break;
        }
        match step {
            ScriptStep::Respond(response) => {
                let response = host.answer(response);
                session.handle_response(host, response)?;
                deliver_closed(session, host)?;
            }
            ScriptStep::Tick => tick(session, host)?,
            ScriptStep::Ticks(count) => {
                for _ in 0..count {
                    tick(session, host)?;
                }
            }
        }
    }
    Ok(())
}

fn tick(session: &mut Session, host: &mut SimulatedHost) -> Result<()> {
    for handle in host.advance() {
        session.on_tick(host, handle)?;
        deliver_closed(session, host)?;
    }
    Ok(())
}

fn deliver_closed(session: &mut Session, host: &mut SimulatedHost) -> Result<()> {
    while let Some(response) = host.take_closed_response() {
        session.handle_response(host, response)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_rearm_and_one_shots_fire_once() {
        let mut host = SimulatedHost::new();
        let every = host.run_interval(2);
        let once = host.run_next_tick();

        assert_eq!(host.advance(), vec![once]);
        assert_eq!(host.advance(), vec![every]);
        assert!(host.advance().is_empty());
        assert_eq!(host.advance(), vec![every]);

        host.clear_run(every);
        host.clear_run(once);
        assert_eq!(host.cleared(), &[every]);
        assert_eq!(host.active_runs(), 0);
    }

    #[test]
    fn timeouts_fire_once_after_their_delay() {
        let mut host = SimulatedHost::new();
        let late = host.run_timeout(3);
        let soon = host.run_timeout(0);
        let dropped = host.run_timeout(2);
        host.clear_run(dropped);

        assert_eq!(host.advance(), vec![soon]);
        assert!(host.advance().is_empty());
        assert!(host.is_scheduled(late));
        assert_eq!(host.advance(), vec![late]);
        assert!(host.advance().is_empty());
        assert_eq!(host.cleared(), &[dropped]);
        assert_eq!(host.active_runs(), 0);
    }

    #[test]
    fn closing_an_open_form_queues_a_cancel() {
        let player = Player::new("p-1", "Alex");
        let mut host = SimulatedHost::new();
        host.close_all_forms(&player);
        assert!(host.take_closed_response().is_none());

        host.show(&player, "payload").unwrap();
        host.close_all_forms(&player);
        assert_eq!(host.take_closed_response(), Some(FormResponse::canceled()));
        assert_eq!(host.closes(), 2);
    }

    #[test]
    fn lock_restores_prior_permissions() {
        let player = Player::new("p-1", "Alex");
        let mut host = SimulatedHost::new();
        let prior = host.acquire(&player).unwrap();
        assert!(!host.permissions(&player).movement);
        host.release(&player, prior);
        assert_eq!(host.permissions(&player), InputPermissions::default());
    }
}

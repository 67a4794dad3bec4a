//! Host capabilities a session consumes.
//!
//! The host owns form display, the tick clock and input capture. Scheduled
//! runs carry no callback: the host hands fired [`RunHandle`]s back to
//! [`Session::on_tick`](super::Session::on_tick), and form responses to
//! [`Session::handle_response`](super::Session::handle_response).

use crate::error::Result;
use crate::registry::Player;

pub type FormTicket = u64;

/// Outcome of one displayed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormResponse {
    pub canceled: bool,
    pub selection: Option<usize>,
}

impl FormResponse {
    pub fn canceled() -> Self {
        Self {
            canceled: true,
            selection: None,
        }
    }

    pub fn selected(index: usize) -> Self {
        Self {
            canceled: false,
            selection: Some(index),
        }
    }
}

pub trait FormSurface {
    /// Display `payload` to `player`. The response arrives later.
    fn show(&mut self, player: &Player, payload: &str) -> Result<FormTicket>;
    /// Force-cancel whatever form `player` is looking at.
    fn close_all_forms(&mut self, player: &Player);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunHandle(pub u64);

pub trait TickScheduler {
    fn current_tick(&self) -> u64;
    fn run_interval(&mut self, every_ticks: u64) -> RunHandle;
    /// Fire once, `after_ticks` ticks from now. Zero is treated as one.
    fn run_timeout(&mut self, after_ticks: u64) -> RunHandle;

    fn run_next_tick(&mut self) -> RunHandle {
        self.run_timeout(1)
    }
    /// Must tolerate handles that already fired or were cleared.
    fn clear_run(&mut self, handle: RunHandle);
}

/// Input capture state, restored exactly on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPermissions {
    pub movement: bool,
    pub camera: bool,
}

impl Default for InputPermissions {
    fn default() -> Self {
        Self {
            movement: true,
            camera: true,
        }
    }
}

pub trait InputLock {
    /// Capture input for `player`, returning the state to restore.
    fn acquire(&mut self, player: &Player) -> Result<InputPermissions>;
    fn release(&mut self, player: &Player, prior: InputPermissions);
}

pub trait Host: FormSurface + TickScheduler + InputLock {}

impl<T> Host for T where T: FormSurface + TickScheduler + InputLock {}

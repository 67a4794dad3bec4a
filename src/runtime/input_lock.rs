use crate::error::Result;
use crate::registry::Player;

use super::host::{InputLock, InputPermissions};

/// Input capture held for the lifetime of a session.
///
/// The prior state is kept until [`release`](Self::release) hands it back;
/// later calls are no-ops, so every exit path can release unconditionally.
#[derive(Debug)]
pub struct InputLockGuard {
    player: Player,
    prior: Option<InputPermissions>,
}

impl InputLockGuard {
    pub fn acquire(lock: &mut impl InputLock, player: &Player) -> Result<Self> {
        let prior = lock.acquire(player)?;
        Ok(Self {
            player: player.clone(),
            prior: Some(prior),
        })
    }

    pub fn is_held(&self) -> bool {
        self.prior.is_some()
    }

    pub fn prior(&self) -> Option<InputPermissions> {
        self.prior
    }

    /// Returns false when already released.
    pub fn release(&mut self, lock: &mut impl InputLock) -> bool {
        match self.prior.take() {
            Some(prior) => {
                lock.release(&self.player, prior);
                true
            }
            None => false,
        }
    }
}

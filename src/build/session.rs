//! Reentrancy gate: at most one build session at a time.

use std::time::SystemTime;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct SessionGate {
    started_at: Mutex<Option<SystemTime>>,
    idle: Condvar,
}

/// An open session; closing happens on drop, including on early return.
#[derive(Debug)]
pub struct SessionGuard<'a> {
    gate: &'a SessionGate,
    started_at: SystemTime,
}

impl SessionGate {
    /// Open a session, or return the start time of the one in flight.
    pub fn try_open(&self) -> Result<SessionGuard<'_>, SystemTime> {
        let mut state = self.started_at.lock();
        if let Some(started) = *state {
            return Err(started);
        }
        let now = SystemTime::now();
        *state = Some(now);
        Ok(SessionGuard {
            gate: self,
            started_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.started_at.lock().is_some()
    }

    /// Block until no session is in flight.
    pub fn wait_idle(&self) {
        let mut state = self.started_at.lock();
        while state.is_some() {
            self.idle.wait(&mut state);
        }
    }
}

impl SessionGuard<'_> {
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        *self.gate.started_at.lock() = None;
        self.gate.idle.notify_all();
    }
}

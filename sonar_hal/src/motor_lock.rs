//! Exclusive motor ownership.
//!
//! A single `MotorLock` guards the physical motor and its `StepSequencer`
//! state. Every stepping entry point acquires it with `try_acquire`; the
//! returned `MotorLease` releases it on drop. Stepping functions take
//! `&MotorLease`, so stepping without ownership does not compile.
//!
//! The lock also carries the stop request for the current holder.
//! Acquiring a new lease clears a stale request.

use parking_lot::Mutex;
use sonar_common::hal::driver::HalError;
use sonar_common::hal::types::MotorOwner;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Single-owner guard around the motor.
#[derive(Debug, Default)]
pub struct MotorLock {
    owner: Mutex<Option<MotorOwner>>,
    stop_requested: AtomicBool,
}

impl MotorLock {
    /// Create an unlocked motor lock.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Atomically check and take ownership of the motor.
    ///
    /// # Errors
    /// Returns `HalError::MotorBusy` naming the current holder if the motor
    /// is already owned.
    pub fn try_acquire(self: &Arc<Self>, owner: MotorOwner) -> Result<MotorLease, HalError> {
        let mut held = self.owner.lock();
        if let Some(held_by) = *held {
            warn!("Motor request from {} rejected: held by {}", owner, held_by);
            return Err(HalError::MotorBusy { held_by });
        }
        *held = Some(owner);
        self.stop_requested.store(false, Ordering::SeqCst);
        debug!("Motor acquired by {}", owner);

        Ok(MotorLease {
            lock: Arc::clone(self),
            owner,
        })
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Option<MotorOwner> {
        *self.owner.lock()
    }

    /// True while a lease is alive.
    pub fn is_busy(&self) -> bool {
        self.holder().is_some()
    }

    /// Ask the current holder to stop at its next step boundary.
    ///
    /// Idempotent; a no-op when the motor is idle.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// True once a stop was requested for the current holder.
    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

/// Proof of motor ownership. Releases the lock on drop.
#[derive(Debug)]
pub struct MotorLease {
    lock: Arc<MotorLock>,
    owner: MotorOwner,
}

impl MotorLease {
    /// Operation holding this lease.
    pub fn owner(&self) -> MotorOwner {
        self.owner
    }

    /// True once `request_stop` was called on the lock.
    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.lock.stop_requested()
    }

    /// True if this lease was handed out by `lock`.
    pub fn belongs_to(&self, lock: &Arc<MotorLock>) -> bool {
        Arc::ptr_eq(&self.lock, lock)
    }
}

impl Drop for MotorLease {
    fn drop(&mut self) {
        *self.lock.owner.lock() = None;
        debug!("Motor released by {}", self.owner);
    }
}

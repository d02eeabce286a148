//! Thread-safe, re-entrancy guarded handle to a governance engine.
//!
//! Calls from different threads queue on the mutex and run one at a time.
//! A call made from inside an in-flight call on the same thread (a
//! collaborator calling back into governance) is rejected with
//! [`GovernanceError::Reentrancy`].

use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::sync::Arc;

use crate::engine::GovernanceEngine;
use crate::error::{GovernanceError, Result};

pub struct SharedGovernance<L, R, C> {
    inner: Arc<ReentrantMutex<RefCell<GovernanceEngine<L, R, C>>>>,
}

impl<L, R, C> Clone for SharedGovernance<L, R, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, R, C> SharedGovernance<L, R, C> {
    pub fn new(engine: GovernanceEngine<L, R, C>) -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(engine))),
        }
    }

    /// Run a state-changing call with exclusive access to the engine.
    pub fn call<T>(
        &self,
        op: impl FnOnce(&mut GovernanceEngine<L, R, C>) -> Result<T>,
    ) -> Result<T> {
        let guard = self.inner.lock();
        let mut engine = guard
            .try_borrow_mut()
            .map_err(|_| GovernanceError::Reentrancy)?;
        op(&mut *engine)
    }

    /// Run a read-only query. Also rejected while a call is in flight on
    /// this thread, since the engine state may be mid-transition.
    pub fn query<T>(&self, op: impl FnOnce(&GovernanceEngine<L, R, C>) -> T) -> Result<T> {
        let guard = self.inner.lock();
        let engine = guard.try_borrow().map_err(|_| GovernanceError::Reentrancy)?;
        Ok(op(&*engine))
    }
}

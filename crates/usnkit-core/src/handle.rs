//! Reference-counted sharing of one OS resource.
//!
//! A volume handle is opened once and shared by the enumerator, cursors,
//! caches and monitors built on top of it. Each of them holds its own
//! [`SharedHandle`] instance; the underlying resource is released exactly
//! once, when the last instance closes.
//!
//! ## Counting
//!
//! The count starts at 0 for the first instance, each clone adds one, each
//! close subtracts one. Release runs when the count first goes negative.
//! Closing an instance twice is a recoverable error; using an instance
//! after its own close is a programming error and panics.

use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use std::sync::Arc;
use tracing::trace;

use crate::error::{Result, UsnError};

/// A resource that must be released exactly once.
pub trait Release {
    fn release(&self);
}

struct Coordinator<R: Release> {
    resource: R,
    refs: Mutex<i64>,
}

impl<R: Release> Coordinator<R> {
    fn add(&self, delta: i64) {
        let mut refs = self.refs.lock();
        if *refs < 0 {
            panic!("SharedHandle: resource already released");
        }
        *refs += delta;
        trace!(refs = *refs, "Shared handle count changed");
        if *refs < 0 {
            self.resource.release();
        }
    }
}

/// One instance of a shared resource.
///
/// `Clone` produces an independent instance that must be closed on its own.
/// Dropping an instance that is still open closes it.
pub struct SharedHandle<R: Release> {
    inner: RwLock<Option<Arc<Coordinator<R>>>>,
}

impl<R: Release> SharedHandle<R> {
    /// Wrap a freshly opened resource.
    pub fn new(resource: R) -> Self {
        SharedHandle {
            inner: RwLock::new(Some(Arc::new(Coordinator {
                resource,
                refs: Mutex::new(0),
            }))),
        }
    }

    /// Borrow the resource.
    ///
    /// # Panics
    ///
    /// Panics if this instance has been closed.
    pub fn get(&self) -> MappedRwLockReadGuard<'_, R> {
        RwLockReadGuard::map(self.inner.read(), |slot| match slot {
            Some(coordinator) => &coordinator.resource,
            None => panic!("SharedHandle: used after close"),
        })
    }

    /// Close this instance. The resource is released when every instance
    /// has been closed.
    pub fn close(&self) -> Result<()> {
        match self.inner.write().take() {
            Some(coordinator) => {
                coordinator.add(-1);
                Ok(())
            }
            None => Err(UsnError::AlreadyClosed),
        }
    }

    /// Returns true once this instance has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.read().is_none()
    }
}

impl<R: Release> Clone for SharedHandle<R> {
    /// # Panics
    ///
    /// Panics if this instance has been closed.
    fn clone(&self) -> Self {
        let slot = self.inner.read();
        let coordinator = match slot.as_ref() {
            Some(coordinator) => Arc::clone(coordinator),
            None => panic!("SharedHandle: cloned after close"),
        };
        coordinator.add(1);
        SharedHandle {
            inner: RwLock::new(Some(coordinator)),
        }
    }
}

impl<R: Release> Drop for SharedHandle<R> {
    fn drop(&mut self) {
        if let Some(coordinator) = self.inner.get_mut().take() {
            coordinator.add(-1);
        }
    }
}

//! Fence transactions
//!
//! A [`Fence`] owns a live value and, while a transaction is open, a pending
//! copy of it. Writes go to the pending copy; committing replaces the live
//! `Arc` in one step, so readers holding a [`LiveReader`] observe either
//! the old value or the new one.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::FenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    Idle,
    InTransaction,
}

/// Cloneable read handle to the committed value
pub struct LiveReader<T> {
    live: Arc<RwLock<Arc<T>>>,
}

impl<T> Clone for LiveReader<T> {
    fn clone(&self) -> Self {
        Self { live: Arc::clone(&self.live) }
    }
}

impl<T> LiveReader<T> {
    /// Current committed value
    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.live.read())
    }
}

pub struct Fence<T> {
    live: Arc<RwLock<Arc<T>>>,
    pending: Option<T>,
    commits: u64,
}

impl<T: Clone> Fence<T> {
    pub fn new(initial: T) -> Self {
        Self {
            live: Arc::new(RwLock::new(Arc::new(initial))),
            pending: None,
            commits: 0,
        }
    }

    pub fn state(&self) -> FenceState {
        if self.pending.is_some() {
            FenceState::InTransaction
        } else {
            FenceState::Idle
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of committed transactions
    pub fn commits(&self) -> u64 {
        self.commits
    }

    pub fn live(&self) -> Arc<T> {
        Arc::clone(&self.live.read())
    }

    pub fn reader(&self) -> LiveReader<T> {
        LiveReader { live: Arc::clone(&self.live) }
    }

    /// Open a transaction on a copy of the live value.
    ///
    /// Beginning while already open discards the pending copy, starts over
    /// from the live value and reports [`FenceError::NestedBegin`].
    pub fn begin(&mut self) -> Result<(), FenceError> {
        let base = (*self.live()).clone();
        self.begin_with(base)
    }

    /// Open a transaction on `base` instead of the live value
    pub fn begin_with(&mut self, base: T) -> Result<(), FenceError> {
        let nested = self.pending.replace(base).is_some();
        if nested {
            log::warn!("SceneBegin while a transaction is open, pending changes discarded");
            return Err(FenceError::NestedBegin);
        }
        Ok(())
    }

    pub fn pending_mut(&mut self) -> Option<&mut T> {
        self.pending.as_mut()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    /// Swap the pending value into live
    pub fn end(&mut self) -> Result<Arc<T>, FenceError> {
        let pending = self.pending.take().ok_or_else(|| {
            log::warn!("SceneEnd without SceneBegin ignored");
            FenceError::UnmatchedEnd
        })?;
        Ok(self.publish(pending))
    }

    /// Drop the open transaction, if any
    pub fn abort(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Apply `f` as a single-step transaction outside any bracket
    pub fn apply_immediate<F: FnOnce(&mut T)>(&mut self, f: F) -> Arc<T> {
        let mut next = (*self.live()).clone();
        f(&mut next);
        self.publish(next)
    }

    fn publish(&mut self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        *self.live.write() = Arc::clone(&value);
        self.commits += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_end_swaps() {
        let mut fence = Fence::new(vec![1]);
        fence.begin().unwrap();
        fence.pending_mut().unwrap().push(2);
        assert_eq!(*fence.live(), vec![1]);
        let committed = fence.end().unwrap();
        assert_eq!(*committed, vec![1, 2]);
        assert_eq!(*fence.live(), vec![1, 2]);
        assert_eq!(fence.state(), FenceState::Idle);
        assert_eq!(fence.commits(), 1);
    }

    #[test]
    fn test_unmatched_end() {
        let mut fence = Fence::new(0);
        assert_eq!(fence.end(), Err(FenceError::UnmatchedEnd));
        assert_eq!(*fence.live(), 0);
        assert_eq!(fence.commits(), 0);
    }

    #[test]
    fn test_nested_begin_restarts() {
        let mut fence = Fence::new(String::from("live"));
        fence.begin().unwrap();
        fence.pending_mut().unwrap().push_str("-stale");
        assert_eq!(fence.begin(), Err(FenceError::NestedBegin));
        assert_eq!(fence.pending().map(String::as_str), Some("live"));
        assert_eq!(fence.state(), FenceState::InTransaction);
    }

    #[test]
    fn test_reader_sees_commits() {
        let mut fence = Fence::new(0u32);
        let reader = fence.reader();
        fence.apply_immediate(|v| *v = 7);
        assert_eq!(*reader.snapshot(), 7);
        assert!(!fence.abort());
    }
}

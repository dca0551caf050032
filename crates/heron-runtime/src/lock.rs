//! Re-entrant runtime lock
//!
//! A runtime may be entered by one thread at a time. The owning thread may
//! re-acquire the lock any number of times; other threads block on a condition
//! variable until the owner fully releases it, the deadline passes or the lock
//! is disposed.

use crate::error::{HeronError, HeronResult};
use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
    disposed: bool,
}

/// Owner-tagged re-entrant lock over a plain mutex and condition variable
#[derive(Debug, Default)]
pub struct RuntimeLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl RuntimeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire, waiting at most `timeout` for another owner to release.
    ///
    /// Returns the recursion depth after acquisition.
    pub fn acquire_timeout(&self, timeout: Duration) -> HeronResult<usize> {
        let me = thread::current().id();
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.disposed {
                return Err(HeronError::RuntimeClosed);
            }
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    trace!(thread = ?me, "runtime lock acquired");
                    return Ok(1);
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    return Ok(state.depth);
                }
                Some(_) => {
                    if Instant::now() >= deadline {
                        return Err(HeronError::LockTimeout(timeout.as_millis() as u64));
                    }
                    self.released.wait_until(&mut state, deadline);
                }
            }
        }
    }

    /// Release one level. Returns the remaining depth.
    pub fn release(&self) -> HeronResult<usize> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            return Err(HeronError::NotOwner);
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            trace!(thread = ?me, "runtime lock released");
            self.released.notify_one();
        }
        Ok(state.depth)
    }

    /// Fail unless the current thread owns the lock
    pub fn ensure_held(&self) -> HeronResult<()> {
        let state = self.state.lock();
        if state.disposed {
            return Err(HeronError::RuntimeClosed);
        }
        if state.owner != Some(thread::current().id()) {
            return Err(HeronError::NotLocked);
        }
        Ok(())
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// Recursion depth of the current owner (0 when unlocked)
    pub fn depth(&self) -> usize {
        self.state.lock().depth
    }

    /// Mark disposed and wake every waiter. The current owner keeps its hold
    /// until it releases.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        state.disposed = true;
        self.released.notify_all();
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reentrant_acquire_release() {
        let lock = RuntimeLock::new();
        assert_eq!(lock.acquire_timeout(Duration::from_millis(10)).unwrap(), 1);
        assert_eq!(lock.acquire_timeout(Duration::from_millis(10)).unwrap(), 2);
        assert!(lock.ensure_held().is_ok());
        assert_eq!(lock.release().unwrap(), 1);
        assert_eq!(lock.release().unwrap(), 0);
        assert!(!lock.is_locked());
        assert!(matches!(lock.release(), Err(HeronError::NotOwner)));
        assert!(matches!(lock.ensure_held(), Err(HeronError::NotLocked)));
    }

    #[test]
    fn test_other_thread_times_out() {
        let lock = Arc::new(RuntimeLock::new());
        lock.acquire_timeout(Duration::from_millis(10)).unwrap();
        let contender = lock.clone();
        let result = thread::spawn(move || contender.acquire_timeout(Duration::from_millis(50)))
            .join()
            .unwrap();
        assert!(matches!(result, Err(HeronError::LockTimeout(50))));
        let other = lock.clone();
        let unlock = thread::spawn(move || other.release()).join().unwrap();
        assert!(matches!(unlock, Err(HeronError::NotOwner)));
    }

    #[test]
    fn test_waiter_acquires_after_release() {
        let lock = Arc::new(RuntimeLock::new());
        lock.acquire_timeout(Duration::from_millis(10)).unwrap();
        let contender = lock.clone();
        let waiter = thread::spawn(move || {
            let depth = contender.acquire_timeout(Duration::from_secs(5))?;
            contender.release()?;
            Ok::<_, HeronError>(depth)
        });
        thread::sleep(Duration::from_millis(30));
        lock.release().unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), 1);
    }

    #[test]
    fn test_dispose_wakes_waiters() {
        let lock = Arc::new(RuntimeLock::new());
        lock.acquire_timeout(Duration::from_millis(10)).unwrap();
        let contender = lock.clone();
        let waiter = thread::spawn(move || contender.acquire_timeout(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(30));
        lock.dispose();
        assert!(matches!(waiter.join().unwrap(), Err(HeronError::RuntimeClosed)));
        // the owner can still unwind its hold
        assert_eq!(lock.release().unwrap(), 0);
        assert!(matches!(lock.ensure_held(), Err(HeronError::RuntimeClosed)));
    }
}

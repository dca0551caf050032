//! Engine pool
//!
//! A bounded slot table of runtimes. `get_engine()` hands out a runtime locked
//! by the calling thread; checking it back in resets its global state and
//! returns the slot to idle. A background sweeper disposes runtimes idle for
//! longer than `idle_timeout`, never shrinking the pool below `min_size`.
//!
//! ```
//! use heron_runtime::{EnginePool, PoolConfig};
//!
//! let pool = EnginePool::new(PoolConfig::new().max_size(2)).unwrap();
//! let engine = pool.get_engine().unwrap();
//! assert_eq!(engine.execute_i64("6 * 7").unwrap(), 42);
//! engine.release().unwrap();
//! pool.close();
//! ```

use crate::config::PoolConfig;
use crate::convert::ValueConverter;
use crate::error::{HeronError, HeronResult};
use crate::runtime::Runtime;
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info_span, trace, warn};

/// Statistics about pool operation
///
/// All counters are atomic and can be read at any time without locking.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Runtimes created
    pub created: AtomicU64,
    /// Runtimes disposed (idle expiry, abandoned checkouts, pool close)
    pub disposed: AtomicU64,
    /// Successful checkouts
    pub checkouts: AtomicU64,
    /// Checkins returning a runtime to idle
    pub checkins: AtomicU64,
    /// Checkouts that gave up waiting
    pub timeouts: AtomicU64,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get snapshot of current stats
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            disposed: self.disposed.load(Ordering::Relaxed),
            checkouts: self.checkouts.load(Ordering::Relaxed),
            checkins: self.checkins.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub created: u64,
    pub disposed: u64,
    pub checkouts: u64,
    pub checkins: u64,
    pub timeouts: u64,
}

impl PoolStatsSnapshot {
    /// Checkouts not yet checked in (abandoned engines count as returned once disposed)
    pub fn outstanding(&self) -> u64 {
        self.checkouts.saturating_sub(self.checkins)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Idle,
    Active,
    Disposed,
}

struct Slot {
    id: u64,
    runtime: Runtime,
    state: SlotState,
    last_used: Instant,
}

struct PoolShared {
    config: PoolConfig,
    slots: Mutex<Vec<Slot>>,
    available: Condvar,
    closed: AtomicBool,
    next_slot: AtomicU64,
    /// Slots being built outside the mutex; only changed while holding it
    reserved: AtomicUsize,
    stats: PoolStats,
}

impl PoolShared {
    fn new_runtime(&self) -> Runtime {
        Runtime::with_converter(
            self.config.runtime.clone(),
            ValueConverter::with_config(self.config.converter.clone()),
        )
    }

    /// Build a slot; callers must not hold the slots mutex
    fn new_slot(&self, state: SlotState) -> Slot {
        let id = self.next_slot.fetch_add(1, Ordering::Relaxed);
        let runtime = self.new_runtime();
        PoolStats::bump(&self.stats.created, 1);
        trace!(slot = id, "pool runtime created");
        Slot {
            id,
            runtime,
            state,
            last_used: Instant::now(),
        }
    }

    /// Dispose expired idle slots, keeping at least `min_size` live ones
    fn sweep_locked(&self, slots: &mut Vec<Slot>) -> usize {
        let now = Instant::now();
        let mut live = slots.iter().filter(|s| s.state != SlotState::Disposed).count();
        let mut disposed = 0;
        for slot in slots.iter_mut() {
            if live <= self.config.min_size {
                break;
            }
            if slot.state == SlotState::Idle
                && now.duration_since(slot.last_used) >= self.config.idle_timeout
            {
                slot.state = SlotState::Disposed;
                slot.runtime.close();
                live -= 1;
                disposed += 1;
            }
        }
        slots.retain(|s| s.state != SlotState::Disposed);
        if disposed > 0 {
            PoolStats::bump(&self.stats.disposed, disposed as u64);
            debug!(disposed, live, "swept idle runtimes");
        }
        disposed
    }

    fn sweep(&self) -> usize {
        let mut slots = self.slots.lock();
        self.sweep_locked(&mut slots)
    }

    /// Return a checked-in slot to idle
    fn return_slot(&self, id: u64) {
        let mut slots = self.slots.lock();
        match slots.iter_mut().find(|s| s.id == id) {
            Some(slot) if !self.closed.load(Ordering::Acquire) => {
                slot.state = SlotState::Idle;
                slot.last_used = Instant::now();
                PoolStats::bump(&self.stats.checkins, 1);
                trace!(slot = id, "runtime checked in");
            }
            Some(slot) => slot.runtime.close(),
            None => {}
        }
        drop(slots);
        self.available.notify_one();
    }

    /// Dispose a slot whose runtime can no longer be recycled
    fn discard_slot(&self, id: u64) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.iter_mut().find(|s| s.id == id) {
            slot.state = SlotState::Disposed;
            slot.runtime.close();
            PoolStats::bump(&self.stats.disposed, 1);
        }
        slots.retain(|s| s.state != SlotState::Disposed);
        drop(slots);
        self.available.notify_one();
    }
}

/// Bounded pool of runtimes
pub struct EnginePool {
    shared: Arc<PoolShared>,
    sweeper: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
}

impl EnginePool {
    /// Create a pool, prewarming `min_size` runtimes and starting the sweeper
    pub fn new(config: PoolConfig) -> HeronResult<Self> {
        config.validate()?;
        let shared = Arc::new(PoolShared {
            config,
            slots: Mutex::new(Vec::new()),
            available: Condvar::new(),
            closed: AtomicBool::new(false),
            next_slot: AtomicU64::new(1),
            reserved: AtomicUsize::new(0),
            stats: PoolStats::new(),
        });
        let prewarmed: Vec<Slot> = (0..shared.config.min_size)
            .map(|_| shared.new_slot(SlotState::Idle))
            .collect();
        shared.slots.lock().extend(prewarmed);

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let interval = shared.config.sweep_interval;
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("heron-pool-sweeper".into())
            .spawn(move || {
                debug!("pool sweeper started");
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            worker.sweep();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("pool sweeper stopped");
            })
            .map_err(|e| HeronError::host(format!("failed to spawn pool sweeper: {e}")))?;

        debug!(
            min_size = shared.config.min_size,
            max_size = shared.config.max_size,
            "engine pool created"
        );
        Ok(Self {
            shared,
            sweeper: Mutex::new(Some((shutdown_tx, handle))),
        })
    }

    /// Check out a runtime, locked by the calling thread
    pub fn get_engine(&self) -> HeronResult<PooledEngine> {
        let shared = &self.shared;
        let span = info_span!("get_engine", max_size = shared.config.max_size);
        let _enter = span.enter();

        let deadline = Instant::now() + shared.config.wait_timeout;
        let mut slots = shared.slots.lock();
        let (id, runtime) = loop {
            if shared.closed.load(Ordering::Acquire) {
                return Err(HeronError::PoolClosed);
            }
            shared.sweep_locked(&mut slots);

            if let Some(slot) = slots.iter_mut().find(|s| s.state == SlotState::Idle) {
                slot.state = SlotState::Active;
                break (slot.id, slot.runtime.clone());
            }
            if slots.len() + shared.reserved.load(Ordering::Relaxed) < shared.config.max_size {
                shared.reserved.fetch_add(1, Ordering::Relaxed);
                let slot = MutexGuard::unlocked(&mut slots, || shared.new_slot(SlotState::Active));
                shared.reserved.fetch_sub(1, Ordering::Relaxed);
                if shared.closed.load(Ordering::Acquire) {
                    slot.runtime.close();
                    PoolStats::bump(&shared.stats.disposed, 1);
                    return Err(HeronError::PoolClosed);
                }
                let checkout = (slot.id, slot.runtime.clone());
                slots.push(slot);
                break checkout;
            }
            if Instant::now() >= deadline {
                PoolStats::bump(&shared.stats.timeouts, 1);
                let waited = shared.config.wait_timeout.as_millis() as u64;
                warn!(waited_ms = waited, "engine pool exhausted");
                return Err(HeronError::PoolExhausted(waited));
            }
            shared.available.wait_until(&mut slots, deadline);
        };
        drop(slots);

        // Give the slot back if locking fails or unwinds
        let pending = scopeguard::guard(id, |id| shared.discard_slot(id));
        runtime.acquire()?;
        scopeguard::ScopeGuard::into_inner(pending);

        PoolStats::bump(&shared.stats.checkouts, 1);
        trace!(slot = id, runtime = runtime.id(), "runtime checked out");
        Ok(PooledEngine {
            pool: Arc::clone(shared),
            slot: id,
            runtime,
            checked_in: false,
            _not_send: PhantomData,
        })
    }

    /// Dispose expired idle runtimes now
    pub fn sweep(&self) -> usize {
        self.shared.sweep()
    }

    /// Dispose every runtime and stop the sweeper. Later checkouts fail.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let disposed = {
            let mut slots = self.shared.slots.lock();
            for slot in slots.iter() {
                slot.runtime.close();
            }
            let disposed = slots.len();
            slots.clear();
            disposed
        };
        PoolStats::bump(&self.shared.stats.disposed, disposed as u64);
        self.shared.available.notify_all();

        if let Some((shutdown, handle)) = self.sweeper.lock().take() {
            let _ = shutdown.send(());
            if handle.join().is_err() {
                warn!("pool sweeper panicked");
            }
        }
        debug!(disposed, "engine pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn stats(&self) -> &PoolStats {
        &self.shared.stats
    }

    /// Live runtimes (idle and active)
    pub fn size(&self) -> usize {
        self.shared.slots.lock().len()
    }

    pub fn idle_count(&self) -> usize {
        self.shared
            .slots
            .lock()
            .iter()
            .filter(|s| s.state == SlotState::Idle)
            .count()
    }

    pub fn active_count(&self) -> usize {
        self.shared
            .slots
            .lock()
            .iter()
            .filter(|s| s.state == SlotState::Active)
            .count()
    }
}

impl Drop for EnginePool {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnginePool")
            .field("size", &self.size())
            .field("closed", &self.is_closed())
            .field("stats", &self.shared.stats.snapshot())
            .finish()
    }
}

/// A checked-out runtime, locked by the thread that checked it out
///
/// Check it back in with [`PooledEngine::release`]. Dropping it without a
/// checkin disposes the runtime instead of recycling it.
pub struct PooledEngine {
    pool: Arc<PoolShared>,
    slot: u64,
    runtime: Runtime,
    checked_in: bool,
    _not_send: PhantomData<*const ()>,
}

impl PooledEngine {
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Reset, unlock and return the runtime to the pool
    pub fn release(mut self) -> HeronResult<()> {
        self.checkin()
    }

    /// Same as [`PooledEngine::release`]
    pub fn close(self) -> HeronResult<()> {
        self.release()
    }

    fn unlock_fully(&self) -> HeronResult<()> {
        while self.runtime.is_locked_by_current_thread() {
            self.runtime.unlock()?;
        }
        Ok(())
    }

    /// Unlock before disposing the slot; a failure only leaves a warning
    fn unlock_or_warn(&self) {
        if let Err(err) = self.unlock_fully() {
            warn!(slot = self.slot, error = %err, "runtime lock not released before disposal");
        }
    }

    fn checkin(&mut self) -> HeronResult<()> {
        self.checked_in = true;
        if self.runtime.is_closed() {
            self.unlock_or_warn();
            self.pool.discard_slot(self.slot);
            return Ok(());
        }
        let result = self.runtime.reset().and_then(|()| self.unlock_fully());
        match result {
            Ok(()) => {
                self.pool.return_slot(self.slot);
                Ok(())
            }
            Err(err) => {
                warn!(slot = self.slot, error = %err, "checkin failed, disposing runtime");
                self.unlock_or_warn();
                self.pool.discard_slot(self.slot);
                Err(err)
            }
        }
    }
}

impl Deref for PooledEngine {
    type Target = Runtime;

    fn deref(&self) -> &Runtime {
        &self.runtime
    }
}

impl Drop for PooledEngine {
    fn drop(&mut self) {
        if self.checked_in {
            return;
        }
        warn!(slot = self.slot, "pooled engine dropped without checkin, disposing");
        self.unlock_or_warn();
        self.pool.discard_slot(self.slot);
    }
}

impl fmt::Debug for PooledEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledEngine")
            .field("slot", &self.slot)
            .field("runtime", &self.runtime)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn small_pool(max: usize) -> EnginePool {
        EnginePool::new(
            PoolConfig::new()
                .max_size(max)
                .wait_timeout(Duration::from_millis(50))
                .sweep_interval(Duration::from_secs(60)),
        )
        .unwrap()
    }

    #[test]
    fn test_checkin_recycles_and_resets() {
        let pool = small_pool(1);
        let engine = pool.get_engine().unwrap();
        let first = engine.id();
        engine.execute_void("var leaked = 1").unwrap();
        engine.release().unwrap();

        let engine = pool.get_engine().unwrap();
        assert_eq!(engine.id(), first);
        assert!(engine.execute_bool("typeof leaked === 'undefined'").unwrap());
        engine.release().unwrap();

        let stats = pool.stats().snapshot();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.checkouts, 2);
        assert_eq!(stats.checkins, 2);
    }

    #[test]
    fn test_exhausted_pool_times_out() {
        let pool = small_pool(1);
        let _held = pool.get_engine().unwrap();
        assert!(matches!(pool.get_engine(), Err(HeronError::PoolExhausted(50))));
        assert_eq!(pool.stats().snapshot().timeouts, 1);
    }

    #[test]
    fn test_min_size_is_prewarmed_and_kept() {
        let pool = EnginePool::new(
            PoolConfig::new()
                .min_size(1)
                .max_size(3)
                .idle_timeout(Duration::from_millis(10))
                .sweep_interval(Duration::from_secs(60)),
        )
        .unwrap();
        assert_eq!(pool.size(), 1);
        let a = pool.get_engine().unwrap();
        let b = pool.get_engine().unwrap();
        assert_eq!(pool.size(), 2);
        a.release().unwrap();
        b.release().unwrap();

        thread::sleep(Duration::from_millis(30));
        assert_eq!(pool.sweep(), 1);
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.sweep(), 0);
    }

    #[test]
    fn test_dropped_engine_is_disposed() {
        let pool = small_pool(1);
        let engine = pool.get_engine().unwrap();
        let runtime = engine.runtime().clone();
        drop(engine);
        assert!(runtime.is_closed());
        assert_eq!(pool.size(), 0);
        let replacement = pool.get_engine().unwrap();
        assert!(!replacement.ptr_eq(&runtime));
        replacement.release().unwrap();
    }

    #[test]
    fn test_concurrent_growth_respects_max_size() {
        let pool = Arc::new(small_pool(2));
        let workers: Vec<_> = (0..6)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || match pool.get_engine() {
                    Ok(engine) => {
                        thread::sleep(Duration::from_millis(5));
                        engine.release().unwrap();
                        true
                    }
                    Err(HeronError::PoolExhausted(_)) => false,
                    Err(other) => panic!("unexpected error: {other}"),
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        let stats = pool.stats().snapshot();
        assert!(stats.created <= 2);
        assert!(pool.size() <= 2);
        assert_eq!(stats.checkouts, stats.checkins);
    }

    #[test]
    fn test_runtime_closed_while_checked_out_is_discarded() {
        let pool = small_pool(1);
        let engine = pool.get_engine().unwrap();
        let runtime = engine.runtime().clone();
        runtime.close();
        engine.release().unwrap();
        assert!(!runtime.is_locked_by_current_thread());
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.stats().snapshot().disposed, 1);

        let replacement = pool.get_engine().unwrap();
        assert!(!replacement.ptr_eq(&runtime));
        replacement.release().unwrap();
    }

    #[test]
    fn test_close_disposes_everything() {
        let pool = small_pool(2);
        let engine = pool.get_engine().unwrap();
        let runtime = engine.runtime().clone();
        pool.close();
        assert!(runtime.is_closed());
        assert!(matches!(pool.get_engine(), Err(HeronError::PoolClosed)));
        engine.release().unwrap();
        assert_eq!(pool.size(), 0);
    }
}

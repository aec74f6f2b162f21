//! Deferred reclamation of shared coefficient objects
//!
//! The audio thread retires coefficient objects constantly while smoothing,
//! but it may never run a deallocator. Retired objects are deposited here
//! (through a lock-free channel when coming from the audio thread) and a
//! periodic sweep on a non-realtime thread frees whatever nothing else
//! references anymore.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use madrigal_core::domain::coeffs::SharedCoeffs;
use tracing::{debug, trace};

use super::bounded_channel::BoundedChannel;

/// Capacity of the audio-thread deposit channel
///
/// Sized from worst-case churn: one coefficient install per inner chunk for
/// the whole ramp duration, with headroom. Overflow is a sizing bug, not a
/// runtime condition.
const DEPOSIT_CHANNEL_CAPACITY: usize = 256;

/// Default sweep cadence
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(2);

/// Shared-ownership reclamation pool
///
/// Objects deposited here are retained until the pool holds the only
/// remaining reference, then freed by the next sweep. The audio thread only
/// ever adds candidates; scanning and freeing happen exclusively on
/// non-realtime threads.
pub struct ReclaimPool {
    /// Objects awaiting release; scanned only by the sweeping thread
    retained: Mutex<Vec<SharedCoeffs>>,

    /// Audio-thread deposit path
    deferred: BoundedChannel<Option<SharedCoeffs>>,

    /// Set by the audio thread after a deferred deposit
    pending: AtomicBool,
}

impl ReclaimPool {
    pub fn new() -> Self {
        Self {
            retained: Mutex::new(Vec::new()),
            deferred: BoundedChannel::with_capacity(DEPOSIT_CHANNEL_CAPACITY),
            pending: AtomicBool::new(false),
        }
    }

    /// Deposit an object for deferred release
    ///
    /// From the audio thread this pushes into the lock-free deposit channel
    /// and sets the pending flag: no lock, no allocation, no free. From
    /// any other thread it inserts directly into the retained set,
    /// deduplicated so re-depositing an object already held is a no-op.
    pub fn deposit(&self, obj: SharedCoeffs, on_realtime_thread: bool) {
        if on_realtime_thread {
            if let Err(rejected) = self.deferred.push(Some(obj)) {
                // Channel full means the pool was sized too small for the
                // parameter churn rate. Leak rather than free here: a leak
                // is recovered at teardown, a free on the audio thread is
                // not recoverable at all.
                debug_assert!(false, "reclaim pool deposit channel overflow");
                std::mem::forget(rejected);
                return;
            }
            self.pending.store(true, Ordering::Release);
        } else {
            let mut retained = self.retained.lock().unwrap();
            Self::insert_deduped(&mut retained, obj);
        }
    }

    fn insert_deduped(retained: &mut Vec<SharedCoeffs>, obj: SharedCoeffs) {
        if !retained.iter().any(|held| Arc::ptr_eq(held, &obj)) {
            retained.push(obj);
        }
    }

    /// Drain deferred deposits and free everything no longer referenced
    ///
    /// Must be called from a non-realtime thread. An object is released
    /// exactly when its strong count is 1, i.e. the pool is the sole
    /// remaining owner; anything still referenced elsewhere survives until
    /// a later sweep.
    pub fn sweep(&self) {
        let mut retained = self.retained.lock().unwrap();

        if self.pending.swap(false, Ordering::AcqRel) {
            let mut slot: Option<SharedCoeffs> = None;
            while self.deferred.try_pop(&mut slot) {
                if let Some(obj) = slot.take() {
                    Self::insert_deduped(&mut retained, obj);
                }
            }
        }

        let before = retained.len();
        retained.retain(|obj| Arc::strong_count(obj) > 1);
        let freed = before - retained.len();
        if freed > 0 {
            trace!(freed, held = retained.len(), "reclaim sweep");
        }
    }

    /// Number of objects currently held for deferred release
    pub fn retained_len(&self) -> usize {
        self.retained.lock().unwrap().len()
    }

    /// True when deferred deposits are waiting to be drained
    pub fn pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for ReclaimPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Background thread driving a pool's periodic sweep
///
/// Owned by the filter chain; the control surface may also call
/// [`ReclaimPool::sweep`] directly. Stops promptly on drop.
pub struct ReclaimSweeper {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReclaimSweeper {
    /// Poll granularity for the stop flag; keeps shutdown bounded even
    /// with multi-second sweep intervals
    const STOP_POLL: Duration = Duration::from_millis(50);

    pub fn spawn(pool: Arc<ReclaimPool>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("madrigal-reclaim".to_string())
            .spawn(move || {
                debug!(?interval, "reclaim sweeper started");
                let mut last_sweep = Instant::now();
                while !stop_flag.load(Ordering::Acquire) {
                    thread::sleep(Self::STOP_POLL.min(interval));
                    if last_sweep.elapsed() >= interval {
                        pool.sweep();
                        last_sweep = Instant::now();
                    }
                }
                // Final sweep so teardown leaves nothing reclaimable behind
                pool.sweep();
                debug!("reclaim sweeper stopped");
            })
            .expect("failed to spawn reclaim sweeper thread");

        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for ReclaimSweeper {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

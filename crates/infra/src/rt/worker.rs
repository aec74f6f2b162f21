//! Background coefficient computation
//!
//! Each band owns one worker thread. The audio thread enqueues parameter
//! snapshots through a lock-free channel; the worker wakes on a short
//! timer, drains everything pending, runs the coefficient factory, and
//! publishes the results in arrival order on a second channel for the
//! audio thread to collect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use madrigal_core::domain::coeffs::{design, CoefficientSet};
use madrigal_core::domain::params::BandParams;
use tracing::{debug, warn};

use super::bounded_channel::BoundedChannel;

/// Requests/results buffered per band; plenty for any realistic control
/// churn between worker wakeups
const CHANNEL_CAPACITY: usize = 64;

/// Worker wakeup cadence; bounded well under one UI frame so parameter
/// edits land within a couple of audio blocks
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Per-band coefficient worker
///
/// `request` and `collect` are the audio-thread surface: both are
/// non-blocking, allocation-free channel operations. Everything expensive
/// happens on the owned thread, which is joined on drop.
pub struct CoefficientWorker {
    input: Arc<BoundedChannel<Option<BandParams>>>,
    output: Arc<BoundedChannel<Option<CoefficientSet>>>,
    pending: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CoefficientWorker {
    /// Spawn a worker computing coefficients at the given sample rate
    pub fn spawn(sample_rate: f32) -> Self {
        let input = Arc::new(BoundedChannel::with_capacity(CHANNEL_CAPACITY));
        let output = Arc::new(BoundedChannel::with_capacity(CHANNEL_CAPACITY));
        let pending = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_input = Arc::clone(&input);
        let thread_output = Arc::clone(&output);
        let thread_pending = Arc::clone(&pending);
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("madrigal-coeffs".to_string())
            .spawn(move || {
                debug!(sample_rate, "coefficient worker started");
                while !thread_stop.load(Ordering::Acquire) {
                    if thread_pending.swap(false, Ordering::AcqRel) {
                        Self::drain_and_compute(&thread_input, &thread_output, sample_rate);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                debug!("coefficient worker stopped");
            })
            .expect("failed to spawn coefficient worker thread");

        Self {
            input,
            output,
            pending,
            stop,
            handle: Some(handle),
        }
    }

    /// Drain the input completely, in arrival order
    ///
    /// Rapid control churn can enqueue several parameter sets between
    /// wakeups; computing all of them keeps the output stream ordered so
    /// the consumer converges on the newest request. A result that does
    /// not fit the output channel is dropped; whatever the consumer has
    /// not yet collected will be superseded by a fresher set anyway.
    fn drain_and_compute(
        input: &BoundedChannel<Option<BandParams>>,
        output: &BoundedChannel<Option<CoefficientSet>>,
        sample_rate: f32,
    ) {
        let mut slot: Option<BandParams> = None;
        while input.try_pop(&mut slot) {
            let Some(params) = slot.take() else { continue };

            match design(&params, sample_rate) {
                Ok(set) => {
                    if output.push(Some(set)).is_err() {
                        warn!("coefficient output channel full, dropping result");
                    }
                }
                Err(e) => {
                    // Upstream validation should make this unreachable
                    warn!(error = %e, "coefficient design rejected parameters");
                }
            }
        }
    }

    /// Enqueue a parameter snapshot for computation
    ///
    /// Callable from the audio thread: lock-free push plus a flag store.
    /// Returns false when the input channel is full; the caller keeps its
    /// dirty state and retries on the next tick.
    pub fn request(&self, params: BandParams) -> bool {
        match self.input.push(Some(params)) {
            Ok(()) => {
                self.pending.store(true, Ordering::Release);
                true
            }
            Err(_) => false,
        }
    }

    /// Collect the next finished coefficient set, if any
    ///
    /// Swap-based so the audio thread's donated storage replaces the slot
    /// occupant and nothing is freed on the calling thread.
    pub fn collect(&self, out: &mut Option<CoefficientSet>) -> bool {
        self.output.exchange(out)
    }

    /// Finished results waiting to be collected (diagnostics)
    pub fn results_available(&self) -> usize {
        self.output.available_for_read()
    }
}

impl Drop for CoefficientWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

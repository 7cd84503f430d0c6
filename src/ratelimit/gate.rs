// FIFO admission gate over a fixed-window quota.
//
// Callers queue up in `acquire()` and are released strictly in arrival
// order by a single background pacing task. The pacer releases a whole
// window's worth of permits back-to-back, then sleeps until the window
// resets. It exits as soon as the queue is empty; the next arrival starts
// a new one.
//
// Queue, quota window and pacer state share one std Mutex. It is never
// held across an await point, so it is cheap and can't deadlock with the
// runtime.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::quota::QuotaWindow;
use crate::error::ConfigError;

/// Lifecycle of the pacing task for one gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    /// No pacing task exists. The next arrival spawns one.
    Idle,
    /// A pacing task exists and is waiting for the quota window to reset.
    Running,
    /// A pacing task is releasing waiters. Held only inside the gate's
    /// lock, so `pacer_state()` never reports it; it is what a pacer that
    /// panicked mid-release leaves behind for its drop guard.
    Draining,
}

/// Admission gate shared by every request that counts against one quota.
///
/// Cloning is cheap and clones share the same queue and quota.
#[derive(Clone)]
pub struct AdmissionGate {
    inner: Arc<Mutex<GateState>>,
}

struct GateState {
    window: QuotaWindow,
    /// One-shot signal per pending caller, in arrival order.
    queue: VecDeque<oneshot::Sender<()>>,
    pacer: PacerState,
}

impl AdmissionGate {
    /// Create a gate that admits at most `limit` callers per `period`.
    pub fn new(limit: u32, period: Duration) -> Result<Self, ConfigError> {
        Ok(Self::with_window(QuotaWindow::new(limit, period)?))
    }

    /// Create a gate around an existing quota window.
    pub fn with_window(window: QuotaWindow) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GateState {
                window,
                queue: VecDeque::new(),
                pacer: PacerState::Idle,
            })),
        }
    }

    /// Wait until the quota allows one more request.
    ///
    /// The caller is queued when `acquire` is called, not when the returned
    /// future is first polled, so call order is release order. Dropping the
    /// future before it resolves gives up the place in the queue without
    /// using a permit.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn acquire(&self) -> impl Future<Output = ()> + Send + 'static {
        let gate = self.clone();
        let mut admission = self.enqueue();

        async move {
            // A waiter is only ever dropped unsignaled if the pacer lost it;
            // queue up again rather than slipping past the quota.
            while (&mut admission).await.is_err() {
                warn!("Admission waiter dropped without a signal, re-queueing");
                admission = gate.enqueue();
            }
        }
    }

    /// Treat the quota as used up for a full period starting now.
    ///
    /// Call this when the server rejects a request for exceeding its quota.
    /// Nobody else is admitted until the period has passed, even if the
    /// local count still had permits left.
    pub fn force_exhaust(&self) {
        let mut state = lock(&self.inner);
        state.window.force_block();
        debug!(queued = state.queue.len(), "Quota window forced shut");
    }

    /// Number of callers currently waiting, including abandoned ones not yet
    /// swept out by the pacer.
    pub fn queued(&self) -> usize {
        lock(&self.inner).queue.len()
    }

    pub fn pacer_state(&self) -> PacerState {
        lock(&self.inner).pacer
    }

    /// Snapshot of the quota window.
    pub fn window(&self) -> QuotaWindow {
        lock(&self.inner).window.clone()
    }

    fn enqueue(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();

        let start_pacer = {
            let mut state = lock(&self.inner);
            state.queue.push_back(tx);
            if state.pacer == PacerState::Idle {
                state.pacer = PacerState::Running;
                true
            } else {
                false
            }
        };

        if start_pacer {
            spawn_pacer(Arc::clone(&self.inner));
        }
        rx
    }
}

impl GateState {
    /// Release everything the quota allows at `now`.
    ///
    /// Returns how long to sleep before the next pass, or `None` once the
    /// queue is empty and the pacer should exit. The pacer state is updated
    /// under the same lock, so an arrival that sees `Idle` knows no pacer
    /// will pick up its waiter.
    fn next_wait(&mut self, now: Instant) -> Option<Duration> {
        loop {
            self.queue.retain(|waiter| !waiter.is_closed());

            if self.queue.is_empty() {
                self.pacer = PacerState::Idle;
                return None;
            }

            if self.window.is_exhausted_at(now) {
                self.pacer = PacerState::Running;
                return Some(self.window.time_until_reset(now));
            }

            self.pacer = PacerState::Draining;
            let released = self.drain(now);
            debug!(
                released = released,
                queued = self.queue.len(),
                remaining = self.window.remaining(),
                "Admitted waiters"
            );
        }
    }

    fn drain(&mut self, now: Instant) -> usize {
        let mut released = 0;
        while !self.window.is_exhausted_at(now) {
            let Some(waiter) = self.queue.pop_front() else {
                break;
            };
            // A failed send means the caller gave up; no permit is spent.
            if waiter.send(()).is_ok() {
                self.window.debit();
                released += 1;
            }
        }
        released
    }
}

fn spawn_pacer(inner: Arc<Mutex<GateState>>) {
    tokio::spawn(pace(inner));
}

async fn pace(inner: Arc<Mutex<GateState>>) {
    let mut guard = PacerGuard {
        inner: Arc::clone(&inner),
        finished: false,
    };

    loop {
        let (wait, queued) = {
            let mut state = lock(&inner);
            match state.next_wait(Instant::now()) {
                Some(wait) => (wait, state.queue.len()),
                None => {
                    guard.finished = true;
                    return;
                }
            }
        };

        info!(
            delay_ms = wait.as_millis() as u64,
            queued = queued,
            "Quota exhausted: waiting {}ms for the window to reset",
            wait.as_millis()
        );
        tokio::time::sleep(wait).await;
    }
}

/// Cleans up after a pacing task that stopped without emptying the queue.
/// A panic is a fault and is logged as one; a cancelled task (abort or
/// runtime shutdown while sleeping) is ordinary teardown. Either way the
/// state must not stay `Running`, or every later caller would wait on a
/// pacer that no longer exists.
struct PacerGuard {
    inner: Arc<Mutex<GateState>>,
    finished: bool,
}

impl Drop for PacerGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let restart = {
            let mut state = lock(&self.inner);
            if std::thread::panicking() {
                error!(
                    state = ?state.pacer,
                    queued = state.queue.len(),
                    "Admission pacing task panicked"
                );
            } else {
                debug!(
                    queued = state.queue.len(),
                    "Admission pacing task cancelled"
                );
            }
            if state.queue.is_empty() || tokio::runtime::Handle::try_current().is_err() {
                state.pacer = PacerState::Idle;
                false
            } else {
                state.pacer = PacerState::Running;
                true
            }
        };

        if restart {
            spawn_pacer(Arc::clone(&self.inner));
        }
    }
}

fn lock(inner: &Mutex<GateState>) -> MutexGuard<'_, GateState> {
    // The state stays consistent across a panic (every mutation is a single
    // push, pop or field write), so a poisoned lock is still usable.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

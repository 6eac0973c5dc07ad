//! Per-request deadline.
//!
//! A [`TimeoutGuard`] starts a background timer task on construction. When
//! the duration elapses without the guard being cancelled, its cancellation
//! token fires. Consumers either poll [`TimeoutGuard::is_fired`] between
//! units of work or `select!` on [`TimeoutGuard::fired`] to be woken the
//! moment the deadline passes.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const DISARMED: u8 = 2;

/// Time-boxed cancellation signal for one request.
///
/// Must be created inside a Tokio runtime. Dropping the guard cancels it.
#[derive(Debug)]
pub struct TimeoutGuard {
    duration: Duration,
    /// Expiry and `cancel` race on this; whichever leaves `ARMED` first wins
    state: Arc<AtomicU8>,
    fired: CancellationToken,
    disarmed: CancellationToken,
    timer: JoinHandle<()>,
}

impl TimeoutGuard {
    /// Start a countdown of `duration`
    pub fn start(duration: Duration) -> Self {
        let state = Arc::new(AtomicU8::new(ARMED));
        let fired = CancellationToken::new();
        let disarmed = CancellationToken::new();

        let timer = tokio::spawn({
            let state = state.clone();
            let fired = fired.clone();
            let disarmed = disarmed.clone();
            async move {
                tokio::select! {
                    biased;
                    () = disarmed.cancelled() => {}
                    () = tokio::time::sleep(duration) => {
                        if state
                            .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            debug!(timeout_ms = duration.as_millis() as u64, "Request deadline reached");
                            fired.cancel();
                        }
                    }
                }
            }
        });

        Self {
            duration,
            state,
            fired,
            disarmed,
            timer,
        }
    }

    /// Configured duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether the deadline has passed
    pub fn is_fired(&self) -> bool {
        self.fired.is_cancelled()
    }

    /// Resolves once the deadline passes; pending forever after `cancel`
    pub async fn fired(&self) {
        self.fired.cancelled().await;
    }

    /// Token that is cancelled when the deadline passes
    pub fn token(&self) -> CancellationToken {
        self.fired.clone()
    }

    /// Disarm the timer and release its task. Idempotent.
    ///
    /// After `cancel` returns before expiry the signal never fires.
    pub fn cancel(&self) {
        if self
            .state
            .compare_exchange(ARMED, DISARMED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
            && self.state.load(Ordering::Acquire) == FIRED
        {
            // Expiry won the race; make the signal visible before returning.
            self.fired.cancel();
        }
        self.disarmed.cancel();
        self.timer.abort();
    }

    /// Whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.disarmed.is_cancelled()
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! # Admission gate
//!
//! Counting admission control in front of the query-execution region. At most
//! `limit` workers are meant to be inside at once; the rest wait until a leaving
//! worker wakes one of them.
//!
//! ## Wake policies
//! - [`WakePolicy::CheckOnce`]: the occupancy check runs once per `enter`. A worker
//!   that had to wait is admitted as soon as it is woken, without looking at the
//!   count again. A newcomer can slip in between the wake-up and the woken worker's
//!   increment, so the count may briefly exceed the limit.
//! - [`WakePolicy::Recheck`]: the woken worker re-checks and waits again if the gate
//!   filled up in the meantime. The count never exceeds the limit.
//!
//! ## Notes
//! `enter` is not cancel-safe: dropping it while it waits leaves a stale waiter
//! count behind. Workers never race it against shutdown.

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, Notify};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakePolicy {
    #[default]
    CheckOnce,
    Recheck,
}

#[derive(Debug, Default)]
struct GateState {
    admitted: usize,
    /// Waiters registered with `wakeup` and not yet signalled.
    waiting: usize,
}

pub struct AdmissionGate {
    limit: usize,
    policy: WakePolicy,
    state: Mutex<GateState>,
    wakeup: Notify,
}

impl AdmissionGate {
    pub fn new(limit: usize, policy: WakePolicy) -> Self {
        Self {
            limit,
            policy,
            state: Mutex::new(GateState::default()),
            wakeup: Notify::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn policy(&self) -> WakePolicy {
        self.policy
    }

    pub async fn enter(&self) {
        let mut state = self.state.lock().await;
        match self.policy {
            WakePolicy::CheckOnce => {
                if state.admitted >= self.limit {
                    state = self.wait(state).await;
                }
            }
            WakePolicy::Recheck => {
                while state.admitted >= self.limit {
                    state = self.wait(state).await;
                }
            }
        }
        state.admitted += 1;
        metrics::gauge!(crate::observability::WORKERS_ADMITTED).set(state.admitted as f64);
    }

    /// Gives up admission and wakes at most one waiter.
    pub async fn leave(&self) {
        let mut state = self.state.lock().await;
        if state.admitted == 0 {
            tracing::warn!("admission gate left more often than entered");
        }
        state.admitted = state.admitted.saturating_sub(1);
        if state.waiting > 0 {
            state.waiting -= 1;
            self.wakeup.notify_one();
        }
        metrics::gauge!(crate::observability::WORKERS_ADMITTED).set(state.admitted as f64);
    }

    pub async fn admitted(&self) -> usize {
        self.state.lock().await.admitted
    }

    pub async fn waiting(&self) -> usize {
        self.state.lock().await.waiting
    }

    /// Releases the lock, sleeps until signalled, and re-takes the lock.
    async fn wait<'a>(&'a self, mut state: MutexGuard<'a, GateState>) -> MutexGuard<'a, GateState> {
        let notified = self.wakeup.notified();
        tokio::pin!(notified);
        // Register before unlocking so a `leave` between unlock and await is not lost.
        notified.as_mut().enable();
        state.waiting += 1;
        drop(state);

        let started = std::time::Instant::now();
        notified.await;
        metrics::histogram!(crate::observability::ADMISSION_WAIT_SECONDS)
            .record(started.elapsed().as_secs_f64());
        self.state.lock().await
    }
}

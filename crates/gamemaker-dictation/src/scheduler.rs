//! Silence timers for the dictation engine.
//!
//! The machine never sleeps itself. It asks for a timer by token and later
//! receives `SilenceElapsed(token)`; a token that no longer matches the
//! pending deadline is stale and ignored.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::engine::DictationHandle;
use crate::state::DictationInput;

/// Identifies one armed silence timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u64);

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arms and cancels one-shot timers.
pub trait Scheduler: Send {
    /// Deliver `SilenceElapsed(token)` after `delay` unless cancelled first.
    fn schedule(&mut self, token: TimerToken, delay: Duration);

    /// Cancel a timer. Unknown or already fired tokens are ignored.
    fn cancel(&mut self, token: TimerToken);
}

// =============================================================================
// Tokio
// =============================================================================

/// Timer backed by `tokio::time::sleep`, posting expiry into the engine channel.
pub struct TokioScheduler {
    handle: DictationHandle,
    pending: HashMap<TimerToken, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new(handle: DictationHandle) -> Self {
        Self {
            handle,
            pending: HashMap::new(),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, token: TimerToken, delay: Duration) {
        self.pending.retain(|_, task| !task.is_finished());

        let handle = self.handle.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.send(DictationInput::SilenceElapsed(token));
        });
        if let Some(previous) = self.pending.insert(token, task) {
            previous.abort();
        }
    }

    fn cancel(&mut self, token: TimerToken) {
        if let Some(task) = self.pending.remove(&token) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.pending.drain() {
            task.abort();
        }
    }
}

// =============================================================================
// Manual
// =============================================================================

/// Deterministic clock for tests.
///
/// Time only moves when [`ManualScheduler::advance`] is called, which returns
/// the tokens whose deadlines were reached so the caller can feed them back to
/// the engine.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    pending: Vec<(TimerToken, Duration)>,
    cancelled: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Move the clock forward and return the timers that fired, earliest first.
    pub fn advance(&mut self, by: Duration) -> Vec<TimerToken> {
        self.now += by;
        let now = self.now;

        let mut fired: Vec<(TimerToken, Duration)> = Vec::new();
        self.pending.retain(|&(token, deadline)| {
            if deadline <= now {
                fired.push((token, deadline));
                false
            } else {
                true
            }
        });
        fired.sort_by_key(|&(token, deadline)| (deadline, token));
        fired.into_iter().map(|(token, _)| token).collect()
    }

    /// Absolute deadline of an armed timer.
    pub fn deadline_of(&self, token: TimerToken) -> Option<Duration> {
        self.pending
            .iter()
            .find(|(t, _)| *t == token)
            .map(|&(_, deadline)| deadline)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// How many armed timers were cancelled before firing.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, token: TimerToken, delay: Duration) {
        self.pending.retain(|(t, _)| *t != token);
        self.pending.push((token, self.now + delay));
    }

    fn cancel(&mut self, token: TimerToken) {
        let before = self.pending.len();
        self.pending.retain(|(t, _)| *t != token);
        self.cancelled += before - self.pending.len();
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Scripted backend for tests and offline development.
//!
//! Replies are queued up front and handed out in order. Turns can optionally
//! be held at a gate until the test releases them, which makes in-flight
//! overlap observable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::dispatcher::{StartReply, TurnBackend, TurnReply, TurnRequest};
use crate::error::DispatchError;

type Scripted<T> = Mutex<VecDeque<Result<T, DispatchError>>>;

/// Backend that replays queued replies and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    start_replies: Scripted<StartReply>,
    turn_replies: Scripted<TurnReply>,
    requests: Mutex<Vec<TurnRequest>>,
    start_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Option<Semaphore>,
}

impl ScriptedBackend {
    /// Backend that answers turns immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that holds every turn until [`ScriptedBackend::release_turns`]
    /// is called.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn push_start(&self, reply: Result<StartReply, DispatchError>) -> &Self {
        lock(&self.start_replies).push_back(reply);
        self
    }

    pub fn push_turn(&self, reply: Result<TurnReply, DispatchError>) -> &Self {
        lock(&self.turn_replies).push_back(reply);
        self
    }

    /// Let `n` held turns complete.
    pub fn release_turns(&self, n: usize) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(n);
        }
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn turn_calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every turn request received so far, in order.
    pub fn requests(&self) -> Vec<TurnRequest> {
        lock(&self.requests).clone()
    }

    /// Highest number of turns that were ever outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl TurnBackend for ScriptedBackend {
    async fn start_session(&self) -> Result<StartReply, DispatchError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.start_replies)
            .pop_front()
            .unwrap_or_else(|| Err(DispatchError::transport("no scripted start reply")))
    }

    async fn send_turn(&self, request: &TurnRequest) -> Result<TurnReply, DispatchError> {
        lock(&self.requests).push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(ref gate) = self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let reply = lock(&self.turn_replies)
            .pop_front()
            .unwrap_or_else(|| Err(DispatchError::transport("no scripted turn reply")));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamemaker_core::types::{PhaseId, SessionId};

    fn request(text: &str) -> TurnRequest {
        TurnRequest {
            message: text.to_string(),
            session_id: SessionId::new("s"),
        }
    }

    #[tokio::test]
    async fn test_replies_in_order_then_transport_error() {
        let backend = ScriptedBackend::new();
        backend
            .push_turn(Ok(TurnReply {
                message: "one".to_string(),
                phase: Some(PhaseId::from("identifying")),
                agent: None,
                complete: false,
                payload: None,
            }))
            .push_turn(Err(DispatchError::application(None)));

        assert_eq!(backend.send_turn(&request("a")).await.unwrap().message, "one");
        assert!(matches!(
            backend.send_turn(&request("b")).await,
            Err(DispatchError::Application { .. })
        ));
        assert!(matches!(
            backend.send_turn(&request("c")).await,
            Err(DispatchError::Transport { .. })
        ));
        assert_eq!(backend.turn_calls(), 3);
        assert_eq!(backend.requests()[1].message, "b");
    }

    #[tokio::test]
    async fn test_start_calls_are_counted() {
        let backend = ScriptedBackend::new();
        assert!(backend.start_session().await.is_err());
        assert_eq!(backend.start_calls(), 1);
    }
}

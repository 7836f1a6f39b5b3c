//! Session controller: central coordinator for turns against one session.
//!
//! Owns the session identity, the current phase, and the exclusive
//! turn-in-progress flag. At most one turn is dispatched at a time; a
//! submission made while another is outstanding is rejected, not queued.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use uuid::Uuid;

use gamemaker_core::events::SessionEvent;
use gamemaker_core::types::{PhaseId, SessionId, Timestamp};

use crate::dispatcher::{TurnBackend, TurnReply, TurnRequest};
use crate::error::DispatchError;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Public types
// =============================================================================

/// Result of a successful [`SessionController::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    pub session_id: SessionId,
    pub phase: PhaseId,
    pub greeting: String,
}

/// What happened to a turn submission.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The backend answered and the reply was applied.
    Replied(TurnReport),
    /// The exchange failed. Phase is unchanged.
    Failed(DispatchError),
    /// The submission was not dispatched.
    Rejected(RejectReason),
}

impl TurnOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, TurnOutcome::Rejected(_))
    }
}

/// Why a submission was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another turn is outstanding.
    Busy,
    /// No session has been started yet.
    NotStarted,
    /// The session produced its game and accepts no more turns.
    SessionComplete,
    /// Nothing left after trimming.
    EmptyInput,
    /// The session was replaced while the reply was in flight.
    Superseded,
}

/// Applied reply of a successful turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub message: String,
    /// Session phase after the reply was applied.
    pub phase: PhaseId,
    pub agent: Option<String>,
    pub phase_changed: bool,
    pub complete: bool,
    pub payload: Option<serde_json::Value>,
}

// =============================================================================
// Internal state
// =============================================================================

#[derive(Debug, Clone)]
struct Session {
    id: SessionId,
    phase: PhaseId,
    terminal: bool,
}

#[derive(Debug, Clone, Copy)]
enum TurnSource {
    Typed,
    Voice,
}

impl fmt::Display for TurnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnSource::Typed => write!(f, "typed"),
            TurnSource::Voice => write!(f, "voice"),
        }
    }
}

/// Holds the turn-in-progress flag; releases it when dropped, whichever way
/// the turn ends.
struct TurnGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TurnGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Serializes turns against a single backend session.
///
/// Designed to be shared through an `Arc`: typed input and voice transcripts
/// both call into the same instance.
pub struct SessionController<B: TurnBackend> {
    backend: B,
    session: Mutex<Option<Session>>,
    turn_in_progress: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
}

impl<B: TurnBackend> SessionController<B> {
    /// Create a controller with no session. Call [`SessionController::start`]
    /// before submitting turns.
    pub fn new(backend: B) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            session: Mutex::new(None),
            turn_in_progress: AtomicBool::new(false),
            events,
        }
    }

    /// Subscribe to session notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.lock_session().as_ref().map(|s| s.id.clone())
    }

    pub fn phase(&self) -> Option<PhaseId> {
        self.lock_session().as_ref().map(|s| s.phase.clone())
    }

    /// Whether a turn is currently outstanding.
    pub fn is_busy(&self) -> bool {
        self.turn_in_progress.load(Ordering::Acquire)
    }

    /// Whether the current session has finished and accepts no more turns.
    pub fn is_complete(&self) -> bool {
        self.lock_session().as_ref().is_some_and(|s| s.terminal)
    }

    /// Where the current session's game can be opened.
    pub fn artifact_path(&self) -> Option<String> {
        self.lock_session()
            .as_ref()
            .map(|s| self.backend.artifact_path(&s.id))
    }

    /// Create a new backend session and adopt it.
    ///
    /// On failure the previous session state, if any, is left untouched.
    pub async fn start(&self) -> Result<SessionStart, DispatchError> {
        match self.backend.start_session().await {
            Ok(reply) => {
                *self.lock_session() = Some(Session {
                    id: reply.session_id.clone(),
                    phase: reply.phase.clone(),
                    terminal: false,
                });
                tracing::info!(
                    session_id = %reply.session_id,
                    phase = %reply.phase,
                    "Session started"
                );
                self.emit(SessionEvent::SessionStarted {
                    session_id: reply.session_id.clone(),
                    phase: reply.phase.clone(),
                    greeting: reply.greeting.clone(),
                    timestamp: Timestamp::now(),
                });
                Ok(SessionStart {
                    session_id: reply.session_id,
                    phase: reply.phase,
                    greeting: reply.greeting,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "Session start failed");
                self.emit(SessionEvent::StartFailed {
                    kind: err.kind(),
                    message: err.start_message(),
                    timestamp: Timestamp::now(),
                });
                Err(err)
            }
        }
    }

    /// Discard the current session and start a fresh one.
    pub async fn reset(&self) -> Result<SessionStart, DispatchError> {
        if let Some(old) = self.lock_session().take() {
            tracing::info!(session_id = %old.id, "Session discarded");
        }
        self.start().await
    }

    /// Submit typed input as a turn.
    pub async fn submit_turn(&self, text: &str) -> TurnOutcome {
        self.submit(text, TurnSource::Typed).await
    }

    /// Submit an externally produced transcript as a turn.
    ///
    /// Same path and rules as [`SessionController::submit_turn`]; a transcript
    /// that arrives while a turn is outstanding is dropped.
    pub async fn inject_transcript(&self, transcript: &str) -> TurnOutcome {
        self.submit(transcript, TurnSource::Voice).await
    }

    async fn submit(&self, text: &str, source: TurnSource) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Rejected(RejectReason::EmptyInput);
        }

        // Must happen before the first await.
        let Some(_guard) = TurnGuard::acquire(&self.turn_in_progress) else {
            tracing::debug!(source = %source, "Turn rejected: another turn is in flight");
            return TurnOutcome::Rejected(RejectReason::Busy);
        };

        let session_id = {
            let session = self.lock_session();
            match session.as_ref() {
                None => return TurnOutcome::Rejected(RejectReason::NotStarted),
                Some(s) if s.terminal => {
                    return TurnOutcome::Rejected(RejectReason::SessionComplete)
                }
                Some(s) => s.id.clone(),
            }
        };

        let turn_id = Uuid::new_v4();
        tracing::debug!(
            turn_id = %turn_id,
            session_id = %session_id,
            source = %source,
            "Dispatching turn"
        );
        self.emit(SessionEvent::TurnDispatched {
            text: text.to_string(),
            voice: matches!(source, TurnSource::Voice),
            timestamp: Timestamp::now(),
        });

        let request = TurnRequest {
            message: text.to_string(),
            session_id: session_id.clone(),
        };

        match self.backend.send_turn(&request).await {
            Ok(reply) => self.apply_reply(turn_id, &session_id, reply),
            Err(err) => {
                tracing::warn!(turn_id = %turn_id, error = %err, "Turn failed");
                if self.session_id().as_ref() == Some(&session_id) {
                    self.emit(SessionEvent::TurnFailed {
                        kind: err.kind(),
                        message: err.turn_message(),
                        timestamp: Timestamp::now(),
                    });
                }
                TurnOutcome::Failed(err)
            }
        }
    }

    fn apply_reply(&self, turn_id: Uuid, session_id: &SessionId, reply: TurnReply) -> TurnOutcome {
        let mut events = Vec::new();
        let report = {
            let mut guard = self.lock_session();
            let session = match guard.as_mut() {
                Some(s) if &s.id == session_id => s,
                _ => {
                    tracing::debug!(turn_id = %turn_id, "Discarding reply for a replaced session");
                    return TurnOutcome::Rejected(RejectReason::Superseded);
                }
            };

            let now = Timestamp::now();
            events.push(SessionEvent::AgentMessage {
                text: reply.message.clone(),
                agent: reply.agent.clone(),
                timestamp: now,
            });

            let previous = session.phase.clone();
            let phase_changed = match reply.phase {
                Some(ref next) if *next != session.phase => {
                    session.phase = next.clone();
                    true
                }
                _ => false,
            };
            if phase_changed {
                tracing::info!(
                    turn_id = %turn_id,
                    from = %previous,
                    to = %session.phase,
                    agent = reply.agent.as_deref().unwrap_or("-"),
                    "Phase changed"
                );
                events.push(SessionEvent::PhaseChanged {
                    from: previous,
                    to: session.phase.clone(),
                    agent: reply.agent.clone(),
                    timestamp: now,
                });
            }

            if reply.complete {
                session.terminal = true;
                tracing::info!(session_id = %session.id, "Session complete");
                events.push(SessionEvent::SessionCompleted {
                    session_id: session.id.clone(),
                    payload: reply.payload.clone(),
                    artifact_path: self.backend.artifact_path(&session.id),
                    timestamp: now,
                });
            }

            TurnReport {
                message: reply.message,
                phase: session.phase.clone(),
                agent: reply.agent,
                phase_changed,
                complete: reply.complete,
                payload: reply.payload,
            }
        };

        for event in events {
            self.emit(event);
        }
        TurnOutcome::Replied(report)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Tests
// =============================================================================

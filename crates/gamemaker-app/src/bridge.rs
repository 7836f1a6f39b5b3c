//! Forwards committed voice transcripts into the session as turns.
//!
//! Each commit is submitted in its own task the moment it arrives. There is
//! no buffer: a commit that lands while a turn is outstanding is rejected by
//! the controller and dropped here.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use gamemaker_core::events::DictationEvent;
use gamemaker_session::{RejectReason, SessionController, TurnBackend, TurnOutcome};

/// Subscribes to dictation commits and injects them into a controller.
pub struct TranscriptCommitBridge<B: TurnBackend + 'static> {
    controller: Arc<SessionController<B>>,
}

impl<B: TurnBackend + 'static> TranscriptCommitBridge<B> {
    pub fn new(controller: Arc<SessionController<B>>) -> Self {
        Self { controller }
    }

    /// Run the bridge in the background until the dictation channel closes.
    pub fn spawn(self, commits: broadcast::Receiver<DictationEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(commits))
    }

    pub async fn run(self, mut commits: broadcast::Receiver<DictationEvent>) {
        loop {
            match commits.recv().await {
                Ok(DictationEvent::Committed { text }) => {
                    self.forward(text);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Transcript bridge lagged behind dictation events");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Transcript bridge stopped");
    }

    /// Submit one transcript as a voice turn.
    pub fn forward(&self, text: String) -> JoinHandle<TurnOutcome> {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move {
            let outcome = controller.inject_transcript(&text).await;
            match &outcome {
                TurnOutcome::Replied(report) => {
                    tracing::debug!(phase = %report.phase, "Voice turn answered");
                }
                TurnOutcome::Rejected(RejectReason::Busy) => {
                    tracing::debug!(chars = text.len(), "Dropped transcript: a turn is in flight");
                }
                TurnOutcome::Rejected(reason) => {
                    tracing::debug!(?reason, "Transcript not submitted");
                }
                TurnOutcome::Failed(err) => {
                    tracing::debug!(error = %err, "Voice turn failed");
                }
            }
            outcome
        })
    }
}

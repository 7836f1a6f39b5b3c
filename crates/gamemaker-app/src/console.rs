//! Terminal rendering and the line-fed speech capability.
//!
//! Rendering is a pure observer: it subscribes to session and dictation events
//! and prints them. Nothing here changes session or dictation state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};

use gamemaker_core::events::{DictationEvent, SessionEvent};
use gamemaker_core::types::{Phase, PhaseId};
use gamemaker_dictation::{
    CapabilityError, DictationHandle, RecognitionEvent, RecognitionResult, RecognitionSettings,
    SpeechCapability,
};
use gamemaker_session::{agent_label, display_of, progress_index, RejectReason, TurnOutcome};

// =============================================================================
// Line-fed capability
// =============================================================================

/// Speech capability for terminals without a microphone.
///
/// While listening, each typed line is delivered to the dictation engine as a
/// final recognition result, so the silence delay and commit rules apply
/// exactly as they would to real speech. Without `continuous`, capture ends
/// after the first line, like a single-phrase recognizer.
#[derive(Debug, Clone)]
pub struct LineCapability {
    handle: DictationHandle,
    settings: RecognitionSettings,
    listening: Arc<AtomicBool>,
}

impl LineCapability {
    pub fn new(handle: DictationHandle, settings: RecognitionSettings) -> Self {
        Self {
            handle,
            settings,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Deliver one "spoken" line. Ignored unless listening.
    pub fn feed_line(&self, line: &str) -> bool {
        if !self.is_listening() {
            return false;
        }
        let delivered = self.handle.deliver(RecognitionEvent::Result {
            result_index: 0,
            results: vec![RecognitionResult::final_text(line)],
        });
        if !self.settings.continuous {
            self.end_capture();
        }
        delivered
    }

    fn end_capture(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            self.handle.deliver(RecognitionEvent::Ended);
        }
    }
}

impl SpeechCapability for LineCapability {
    fn start(&mut self) -> Result<(), CapabilityError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(CapabilityError::AlreadyRunning);
        }
        tracing::debug!(
            language = %self.settings.language,
            continuous = self.settings.continuous,
            interim_results = self.settings.interim_results,
            "Line capture started"
        );
        self.handle.deliver(RecognitionEvent::Started);
        Ok(())
    }

    fn stop(&mut self) {
        self.end_capture();
    }
}

// =============================================================================
// Rendering
// =============================================================================

fn progress_bar(phase: &PhaseId) -> String {
    let lit = progress_index(phase);
    let total = Phase::ALL.len();
    format!("[{}{}]", "#".repeat(lit), "-".repeat(total - lit))
}

/// Text shown for one session event, or `None` if it has no visible form.
pub fn render_session_event(event: &SessionEvent, artifact_base: &str) -> Option<String> {
    match event {
        SessionEvent::SessionStarted {
            phase, greeting, ..
        } => Some(format!(
            "{} {}\nGame Maker: {}",
            progress_bar(phase),
            display_of(phase).label,
            greeting
        )),
        SessionEvent::StartFailed { message, .. } => Some(format!("! {}", message)),
        SessionEvent::TurnDispatched { text, voice, .. } => {
            let speaker = if *voice { "You (voice)" } else { "You" };
            Some(format!("{}: {}", speaker, text))
        }
        SessionEvent::AgentMessage { text, agent, .. } => {
            let speaker = agent.as_deref().map(agent_label).unwrap_or("Game Maker");
            Some(format!("{}: {}", speaker, text))
        }
        SessionEvent::PhaseChanged { to, .. } => {
            Some(format!("{} {}", progress_bar(to), display_of(to).label))
        }
        SessionEvent::SessionCompleted { artifact_path, .. } => Some(format!(
            "Your game is ready! Open {}{}\nType /reset to make another.",
            artifact_base.trim_end_matches('/'),
            artifact_path
        )),
        SessionEvent::TurnFailed { message, .. } => Some(format!("! {}", message)),
        _ => None,
    }
}

/// Text shown for one dictation event, or `None` if it has no visible form.
pub fn render_dictation_event(event: &DictationEvent) -> Option<String> {
    match event {
        DictationEvent::ListeningStarted => {
            Some("(listening... type what you would say, /voice to stop)".to_string())
        }
        DictationEvent::TranscriptUpdated { committed, interim } if interim.is_empty() => {
            Some(format!("(heard: {})", committed))
        }
        DictationEvent::TranscriptUpdated { committed, interim } => {
            Some(format!("(heard: {} {}...)", committed, interim))
        }
        DictationEvent::ListeningStopped => Some("(stopped listening)".to_string()),
        DictationEvent::VoiceError { message, .. } => Some(format!("! {}", message)),
        _ => None,
    }
}

/// Feedback for a typed turn that was not dispatched.
///
/// Input made while a turn is in flight is ignored without comment.
pub fn render_rejection(outcome: &TurnOutcome) -> Option<&'static str> {
    match outcome {
        TurnOutcome::Rejected(RejectReason::NotStarted) => {
            Some("No session yet. Type /reset to start one.")
        }
        TurnOutcome::Rejected(RejectReason::SessionComplete) => {
            Some("This game is finished. Type /reset to make another.")
        }
        _ => None,
    }
}

/// Print session events until the controller goes away.
pub async fn print_session_events(
    mut events: broadcast::Receiver<SessionEvent>,
    artifact_base: String,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = render_session_event(&event, &artifact_base) {
                    println!("{}", line);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Session renderer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Print dictation events until the engine stops.
pub async fn print_dictation_events(mut events: broadcast::Receiver<DictationEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = render_dictation_event(&event) {
                    println!("{}", line);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Dictation renderer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

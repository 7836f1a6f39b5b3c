//! Dictation engine: runs the state machine against real collaborators.
//!
//! The engine owns the [`DictationMachine`], the [`SpeechCapability`] and the
//! [`Scheduler`]. Every input, whether a button press, a recognizer callback or
//! a timer expiry, arrives through one channel, so they are applied strictly
//! one at a time.

use tokio::sync::{broadcast, mpsc};

use gamemaker_core::config::DictationConfig;
use gamemaker_core::events::DictationEvent;

use crate::capability::{CapabilityError, RecognitionEvent, SpeechCapability};
use crate::scheduler::Scheduler;
use crate::state::{DictationInput, DictationMachine, DictationState, Effect};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Create the input channel shared by the engine, its capability and scheduler.
pub fn channel() -> (DictationHandle, mpsc::UnboundedReceiver<DictationInput>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DictationHandle { tx }, rx)
}

/// Cheap, cloneable sender for engine inputs.
#[derive(Debug, Clone)]
pub struct DictationHandle {
    tx: mpsc::UnboundedSender<DictationInput>,
}

impl DictationHandle {
    /// Returns `false` if the engine has stopped.
    pub fn send(&self, input: DictationInput) -> bool {
        self.tx.send(input).is_ok()
    }

    /// Start listening, or stop if already listening.
    pub fn toggle(&self) -> bool {
        self.send(DictationInput::Toggle)
    }

    /// Post a recognizer event.
    pub fn deliver(&self, event: RecognitionEvent) -> bool {
        self.send(DictationInput::Recognition(event))
    }

    /// Ask the engine loop to exit.
    pub fn shutdown(&self) -> bool {
        self.send(DictationInput::Shutdown)
    }
}

/// Executes machine effects and broadcasts the resulting notifications.
pub struct DictationEngine<C: SpeechCapability, S: Scheduler> {
    machine: DictationMachine,
    capability: C,
    scheduler: S,
    events: broadcast::Sender<DictationEvent>,
}

impl<C: SpeechCapability, S: Scheduler> DictationEngine<C, S> {
    pub fn new(machine: DictationMachine, capability: C, scheduler: S) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            machine,
            capability,
            scheduler,
            events,
        }
    }

    pub fn from_config(config: &DictationConfig, capability: C, scheduler: S) -> Self {
        Self::new(DictationMachine::from_config(config), capability, scheduler)
    }

    /// Receive every notification emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DictationEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> DictationState {
        self.machine.state()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Apply one input and carry out its effects.
    pub fn handle(&mut self, input: DictationInput) {
        for effect in self.machine.apply(input) {
            self.execute(effect);
        }
    }

    /// Process inputs until [`DictationHandle::shutdown`] is called.
    ///
    /// The loop also ends if every handle is dropped, but a scheduler or
    /// capability that keeps its own handle inside the engine prevents that,
    /// so callers should send shutdown explicitly.
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<DictationInput>) {
        tracing::info!("Dictation engine started");
        while let Some(input) = inputs.recv().await {
            if input == DictationInput::Shutdown {
                break;
            }
            self.handle(input);
        }
        if self.machine.state() == DictationState::Listening {
            self.capability.stop();
        }
        tracing::info!("Dictation engine stopped");
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartCapture => match self.capability.start() {
                Ok(()) => tracing::info!("Speech capture started"),
                Err(CapabilityError::AlreadyRunning) => {
                    tracing::debug!("Speech recognizer already running, continuing");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to start speech capture");
                    self.handle(DictationInput::StartFailed {
                        code: e.code().to_string(),
                    });
                }
            },
            Effect::StopCapture => {
                tracing::debug!("Stopping speech capture");
                self.capability.stop();
            }
            Effect::ArmSilenceTimer { token, delay } => {
                tracing::trace!(%token, delay_ms = delay.as_millis() as u64, "Arming silence timer");
                self.scheduler.schedule(token, delay);
            }
            Effect::CancelSilenceTimer { token } => {
                self.scheduler.cancel(token);
            }
            Effect::Notify(event) => {
                match &event {
                    DictationEvent::Committed { text } => {
                        tracing::info!(chars = text.len(), "Transcript committed");
                    }
                    DictationEvent::VoiceError { category, .. } => {
                        tracing::warn!(?category, "Voice recognition error");
                    }
                    _ => {}
                }
                // No subscribers is fine; nobody is rendering.
                let _ = self.events.send(event);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gamemaker_core::events::VoiceErrorCategory;

    use super::*;
    use crate::capability::{MockCapability, RecognitionResult};
    use crate::scheduler::{ManualScheduler, TokioScheduler};

    type TestEngine = DictationEngine<MockCapability, ManualScheduler>;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn engine() -> (TestEngine, MockCapability) {
        let mock = MockCapability::new();
        let engine = DictationEngine::new(
            DictationMachine::new(ms(2500), 3000),
            mock.clone(),
            ManualScheduler::new(),
        );
        (engine, mock)
    }

    fn finals(index: usize, texts: &[&str]) -> DictationInput {
        DictationInput::Recognition(RecognitionEvent::Result {
            result_index: index,
            results: texts
                .iter()
                .map(|t| RecognitionResult::final_text(*t))
                .collect(),
        })
    }

    /// Advance the manual clock and feed fired timers back into the engine.
    fn advance(engine: &mut TestEngine, by: Duration) {
        for token in engine.scheduler_mut().advance(by) {
            engine.handle(DictationInput::SilenceElapsed(token));
        }
    }

    fn drain(rx: &mut broadcast::Receiver<DictationEvent>) -> Vec<DictationEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn commits(events: &[DictationEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                DictationEvent::Committed { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_silence_after_last_final_commits_once() {
        let (mut engine, mock) = engine();
        let mut rx = engine.subscribe();

        engine.handle(DictationInput::Toggle);
        assert_eq!(mock.start_calls(), 1);

        engine.handle(finals(0, &["Once upon a"]));
        advance(&mut engine, ms(1000));
        engine.handle(finals(1, &["Once upon a", "time"]));

        // 3499 ms after the first final, 2499 ms after the last: still waiting.
        advance(&mut engine, ms(2499));
        assert_eq!(mock.stop_calls(), 0);

        advance(&mut engine, ms(1));
        assert_eq!(mock.stop_calls(), 1);
        assert_eq!(engine.scheduler().now(), ms(3500));

        engine.handle(DictationInput::Recognition(RecognitionEvent::Ended));
        assert_eq!(commits(&drain(&mut rx)), vec!["Once upon a time"]);
        assert_eq!(engine.state(), DictationState::Idle);
    }

    #[test]
    fn test_interim_results_do_not_extend_deadline() {
        let (mut engine, mock) = engine();
        engine.handle(DictationInput::Toggle);
        engine.handle(finals(0, &["hello"]));

        for i in 1..=5 {
            advance(&mut engine, ms(400));
            engine.handle(DictationInput::Recognition(RecognitionEvent::Result {
                result_index: 1,
                results: vec![
                    RecognitionResult::final_text("hello"),
                    RecognitionResult::interim(format!("wor{}", "l".repeat(i))),
                ],
            }));
        }
        assert_eq!(mock.stop_calls(), 0);

        advance(&mut engine, ms(500));
        assert_eq!(mock.stop_calls(), 1);
    }

    #[test]
    fn test_manual_stop_before_timer_commits_and_disarms() {
        let (mut engine, mock) = engine();
        let mut rx = engine.subscribe();

        engine.handle(DictationInput::Toggle);
        engine.handle(finals(0, &["build a platformer"]));
        engine.handle(DictationInput::Toggle);
        assert_eq!(mock.stop_calls(), 1);
        engine.handle(DictationInput::Recognition(RecognitionEvent::Ended));

        assert_eq!(engine.scheduler().pending_count(), 0);
        advance(&mut engine, ms(5000));
        assert_eq!(mock.stop_calls(), 1);
        assert_eq!(commits(&drain(&mut rx)), vec!["build a platformer"]);
    }

    #[test]
    fn test_start_then_stop_without_speech() {
        let (mut engine, _mock) = engine();
        let mut rx = engine.subscribe();

        engine.handle(DictationInput::Toggle);
        engine.handle(DictationInput::Recognition(RecognitionEvent::Started));
        engine.handle(DictationInput::Toggle);
        engine.handle(DictationInput::Recognition(RecognitionEvent::Ended));

        assert_eq!(
            drain(&mut rx),
            vec![
                DictationEvent::ListeningStarted,
                DictationEvent::ListeningStopped
            ]
        );
        assert_eq!(engine.state(), DictationState::Idle);
    }

    #[test]
    fn test_error_cancels_timer_and_reports() {
        let (mut engine, _mock) = engine();
        let mut rx = engine.subscribe();

        engine.handle(DictationInput::Toggle);
        engine.handle(finals(0, &["half a sentence"]));
        engine.handle(DictationInput::Recognition(RecognitionEvent::Error {
            code: "audio-capture".to_string(),
        }));

        assert_eq!(engine.scheduler().cancelled_count(), 1);
        assert_eq!(engine.scheduler().pending_count(), 0);

        let events = drain(&mut rx);
        assert!(commits(&events).is_empty());
        assert!(events.iter().any(|e| matches!(
            e,
            DictationEvent::VoiceError {
                category: VoiceErrorCategory::AudioCapture,
                dismiss_after_ms: 3000,
                ..
            }
        )));
    }

    #[test]
    fn test_already_running_is_swallowed() {
        let (mut engine, mock) = engine();
        let mut rx = engine.subscribe();
        mock.set_running(true);

        engine.handle(DictationInput::Toggle);
        assert_eq!(engine.state(), DictationState::Listening);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_start_failure_reports_and_returns_to_idle() {
        let (mut engine, mock) = engine();
        let mut rx = engine.subscribe();
        mock.fail_next_start(CapabilityError::Unavailable("no recognizer".to_string()));

        engine.handle(DictationInput::Toggle);
        assert_eq!(engine.state(), DictationState::Idle);
        assert!(matches!(
            drain(&mut rx).first(),
            Some(DictationEvent::VoiceError {
                category: VoiceErrorCategory::Other(code),
                ..
            }) if code == "not-supported"
        ));

        // The next toggle tries again.
        engine.handle(DictationInput::Toggle);
        assert_eq!(engine.state(), DictationState::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_commits_after_silence_delay() {
        let (handle, inputs) = channel();
        let capability = MockCapability::with_echo(handle.clone());
        let engine = DictationEngine::new(
            DictationMachine::new(ms(2500), 3000),
            capability,
            TokioScheduler::new(handle.clone()),
        );
        let mut rx = engine.subscribe();
        let task = tokio::spawn(engine.run(inputs));

        let start = tokio::time::Instant::now();
        handle.toggle();
        handle.deliver(RecognitionEvent::Result {
            result_index: 0,
            results: vec![RecognitionResult::final_text("Once upon a")],
        });
        tokio::time::sleep(ms(1000)).await;
        handle.deliver(RecognitionEvent::Result {
            result_index: 1,
            results: vec![
                RecognitionResult::final_text("Once upon a"),
                RecognitionResult::final_text("time"),
            ],
        });

        let text = loop {
            match rx.recv().await.unwrap() {
                DictationEvent::Committed { text } => break text,
                _ => continue,
            }
        };
        assert_eq!(text, "Once upon a time");
        assert_eq!(start.elapsed(), ms(3500));

        assert_eq!(rx.recv().await.unwrap(), DictationEvent::ListeningStopped);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_exits_when_senders_drop() {
        let (handle, inputs) = channel();
        let engine = DictationEngine::new(
            DictationMachine::new(ms(2500), 3000),
            MockCapability::new(),
            ManualScheduler::new(),
        );
        let task = tokio::spawn(engine.run(inputs));
        drop(handle);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("engine should stop once its inputs close")
            .unwrap();
    }
}

//! Turn-based session handling for the Game Maker client.
//!
//! Provides the backend dispatcher (one HTTP exchange per call), the session
//! controller that serializes turns and tracks the session phase, and the
//! phase display lookup used by renderers.

pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod mock;
pub mod phase;

pub use controller::{RejectReason, SessionController, SessionStart, TurnOutcome, TurnReport};
pub use dispatcher::{HealthStatus, HttpDispatcher, StartReply, TurnBackend, TurnReply, TurnRequest};
pub use error::DispatchError;
pub use mock::ScriptedBackend;
pub use phase::{agent_label, display_of, progress_index, PhaseDisplay};

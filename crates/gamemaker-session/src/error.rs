//! Error types for backend exchanges.

use gamemaker_core::error::GameMakerError;
use gamemaker_core::events::TurnFailureKind;

const TURN_TRANSPORT_MESSAGE: &str = "Failed to send message. Please try again.";
const TURN_FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";
const START_TRANSPORT_MESSAGE: &str =
    "Could not connect to the server. Please check your connection.";
const START_FALLBACK_MESSAGE: &str = "Failed to start session. Please refresh the page.";

/// Failure of a single backend exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The exchange itself failed: connection, timeout, status, or an
    /// unreadable body. `reason` is diagnostic detail for logs.
    #[error("transport failure: {reason}")]
    Transport { reason: String },
    /// The backend answered with `success: false`.
    #[error("backend rejected request: {}", .detail.as_deref().unwrap_or("no reason given"))]
    Application { detail: Option<String> },
}

impl DispatchError {
    pub fn transport(reason: impl Into<String>) -> Self {
        DispatchError::Transport {
            reason: reason.into(),
        }
    }

    pub fn application(detail: Option<String>) -> Self {
        DispatchError::Application {
            detail: detail.filter(|d| !d.trim().is_empty()),
        }
    }

    pub fn kind(&self) -> TurnFailureKind {
        match self {
            DispatchError::Transport { .. } => TurnFailureKind::Transport,
            DispatchError::Application { .. } => TurnFailureKind::Application,
        }
    }

    /// Message shown to the user when a turn fails.
    pub fn turn_message(&self) -> String {
        match self {
            DispatchError::Transport { .. } => TURN_TRANSPORT_MESSAGE.to_string(),
            DispatchError::Application { detail } => detail
                .clone()
                .unwrap_or_else(|| TURN_FALLBACK_MESSAGE.to_string()),
        }
    }

    /// Message shown to the user when a session cannot be started.
    pub fn start_message(&self) -> String {
        match self {
            DispatchError::Transport { .. } => START_TRANSPORT_MESSAGE.to_string(),
            DispatchError::Application { .. } => START_FALLBACK_MESSAGE.to_string(),
        }
    }
}

impl From<DispatchError> for GameMakerError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Transport { reason } => GameMakerError::Transport(reason),
            DispatchError::Application { detail } => {
                GameMakerError::Application(detail.unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::transport("connection refused");
        assert_eq!(err.to_string(), "transport failure: connection refused");

        let err = DispatchError::application(Some("Message is required".to_string()));
        assert_eq!(
            err.to_string(),
            "backend rejected request: Message is required"
        );

        let err = DispatchError::application(None);
        assert_eq!(err.to_string(), "backend rejected request: no reason given");
    }

    #[test]
    fn test_blank_application_detail_is_dropped() {
        let err = DispatchError::application(Some("   ".to_string()));
        assert_eq!(err, DispatchError::Application { detail: None });
    }

    #[test]
    fn test_kind() {
        assert_eq!(
            DispatchError::transport("x").kind(),
            TurnFailureKind::Transport
        );
        assert_eq!(
            DispatchError::application(None).kind(),
            TurnFailureKind::Application
        );
    }

    #[test]
    fn test_turn_messages() {
        assert_eq!(
            DispatchError::transport("timeout").turn_message(),
            "Failed to send message. Please try again."
        );
        assert_eq!(
            DispatchError::application(Some(
                "Invalid or expired session. Please start a new session.".to_string()
            ))
            .turn_message(),
            "Invalid or expired session. Please start a new session."
        );
        assert_eq!(
            DispatchError::application(None).turn_message(),
            "Something went wrong. Please try again."
        );
    }

    #[test]
    fn test_start_messages() {
        assert!(DispatchError::transport("refused")
            .start_message()
            .contains("Could not connect"));
        assert!(DispatchError::application(Some("boom".to_string()))
            .start_message()
            .contains("Failed to start session"));
    }

    #[test]
    fn test_conversion_into_top_level_error() {
        let err: GameMakerError = DispatchError::transport("dns").into();
        assert!(matches!(err, GameMakerError::Transport(ref r) if r == "dns"));

        let err: GameMakerError = DispatchError::application(Some("nope".to_string())).into();
        assert!(matches!(err, GameMakerError::Application(ref d) if d == "nope"));
    }
}

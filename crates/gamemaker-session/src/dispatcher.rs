//! Backend dispatcher: exactly one request/response exchange per call.
//!
//! Success and failure envelopes from the backend are normalized into
//! `Result<_, DispatchError>`. Nothing here retries, and no transport fault
//! escapes as anything other than `DispatchError::Transport`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use gamemaker_core::config::BackendConfig;
use gamemaker_core::error::{GameMakerError, Result};
use gamemaker_core::types::{Phase, PhaseId, SessionId};

use crate::error::DispatchError;

// =============================================================================
// Request / reply types
// =============================================================================

/// Body of a turn submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnRequest {
    pub message: String,
    pub session_id: SessionId,
}

/// A freshly created session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReply {
    pub session_id: SessionId,
    pub phase: PhaseId,
    pub greeting: String,
}

/// The agent's answer to a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub message: String,
    /// Phase after this turn. `None` when the backend omitted it.
    pub phase: Option<PhaseId>,
    pub agent: Option<String>,
    pub complete: bool,
    pub payload: Option<serde_json::Value>,
}

/// Backend health check result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

// =============================================================================
// Wire envelopes
// =============================================================================

#[derive(Debug, Deserialize)]
struct StartEnvelope {
    #[serde(default)]
    success: bool,
    session_id: Option<String>,
    phase: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl StartEnvelope {
    fn into_reply(self, status: StatusCode) -> std::result::Result<StartReply, DispatchError> {
        check_envelope(status, self.success, self.error)?;
        let session_id = self
            .session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DispatchError::transport("malformed response: missing session_id"))?;
        Ok(StartReply {
            session_id: SessionId::new(session_id),
            phase: self
                .phase
                .map(PhaseId::new)
                .unwrap_or_else(|| PhaseId::from(Phase::Identifying)),
            greeting: self.message.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TurnEnvelope {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    phase: Option<String>,
    agent: Option<String>,
    is_complete: Option<bool>,
    game_data: Option<serde_json::Value>,
    error: Option<String>,
}

impl TurnEnvelope {
    fn into_reply(self, status: StatusCode) -> std::result::Result<TurnReply, DispatchError> {
        if self.success {
            if let Some(ref error) = self.error {
                tracing::warn!(error = %error, "Backend reported an agent error alongside a successful turn");
            }
        }
        check_envelope(status, self.success, self.error)?;
        Ok(TurnReply {
            message: self.message.unwrap_or_default(),
            phase: self.phase.map(PhaseId::new),
            agent: self.agent,
            complete: self.is_complete.unwrap_or(false),
            payload: self.game_data.filter(|v| !v.is_null()),
        })
    }
}

/// `success: false` wins over the status code so the backend's own reason is
/// surfaced; a successful envelope on an error status is still a transport
/// failure.
fn check_envelope(
    status: StatusCode,
    success: bool,
    error: Option<String>,
) -> std::result::Result<(), DispatchError> {
    if !success {
        return Err(DispatchError::application(error));
    }
    if !status.is_success() {
        return Err(DispatchError::transport(format!(
            "backend returned status {}",
            status
        )));
    }
    Ok(())
}

// =============================================================================
// Trait
// =============================================================================

/// One exchange per call with the Game Maker backend.
#[async_trait]
pub trait TurnBackend: Send + Sync {
    /// Create a new session.
    async fn start_session(&self) -> std::result::Result<StartReply, DispatchError>;

    /// Submit one turn and wait for the agent's reply.
    async fn send_turn(
        &self,
        request: &TurnRequest,
    ) -> std::result::Result<TurnReply, DispatchError>;

    /// Path at which the finished game for `session_id` can be opened.
    fn artifact_path(&self, session_id: &SessionId) -> String {
        format!("/game/{}", session_id)
    }
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// `reqwest`-backed dispatcher.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpDispatcher {
    /// Build a dispatcher for the configured backend.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GameMakerError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Absolute URL of the finished game for `session_id`.
    pub fn artifact_url(&self, session_id: &SessionId) -> String {
        self.url(&self.artifact_path(session_id))
    }

    /// Query the backend health endpoint.
    pub async fn health(&self) -> std::result::Result<HealthStatus, DispatchError> {
        let request = self.client.get(self.url(&self.config.health_path));
        let (status, health) = self.exchange::<HealthStatus>(request).await?;
        if !status.is_success() {
            return Err(DispatchError::transport(format!(
                "backend returned status {}",
                status
            )));
        }
        Ok(health)
    }

    /// Send a request and decode its JSON body, whatever the status code.
    async fn exchange<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<(StatusCode, T), DispatchError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        match serde_json::from_slice::<T>(&body) {
            Ok(envelope) => Ok((status, envelope)),
            Err(e) if status.is_success() => Err(DispatchError::transport(format!(
                "malformed response: {}",
                e
            ))),
            Err(_) => Err(DispatchError::transport(format!(
                "backend returned status {}",
                status
            ))),
        }
    }
}

fn transport_error(err: reqwest::Error) -> DispatchError {
    if err.is_timeout() {
        DispatchError::transport("request timed out")
    } else if err.is_connect() {
        DispatchError::transport(format!("could not connect to backend: {}", err))
    } else {
        DispatchError::transport(err.to_string())
    }
}

#[async_trait]
impl TurnBackend for HttpDispatcher {
    async fn start_session(&self) -> std::result::Result<StartReply, DispatchError> {
        let url = self.url(&self.config.start_path);
        tracing::debug!(url = %url, "Requesting new session");

        let request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        let (status, envelope) = self.exchange::<StartEnvelope>(request).await?;
        envelope.into_reply(status)
    }

    async fn send_turn(
        &self,
        request: &TurnRequest,
    ) -> std::result::Result<TurnReply, DispatchError> {
        let url = self.url(&self.config.message_path);
        tracing::debug!(
            url = %url,
            session_id = %request.session_id,
            message_len = request.message.len(),
            "Sending turn"
        );

        let (status, envelope) = self
            .exchange::<TurnEnvelope>(self.client.post(&url).json(request))
            .await?;
        envelope.into_reply(status)
    }

    fn artifact_path(&self, session_id: &SessionId) -> String {
        format!(
            "{}/{}",
            self.config.game_path.trim_end_matches('/'),
            session_id
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

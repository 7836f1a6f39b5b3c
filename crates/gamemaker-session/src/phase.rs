//! Phase display lookup.
//!
//! Pure functions mapping a backend phase label to what a renderer shows.
//! Unknown labels are legal and pass through unchanged.

use gamemaker_core::types::{Phase, PhaseId};

/// Display data for a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseDisplay {
    /// Human-readable label, or the raw identifier for unknown phases.
    pub label: String,
    /// Position in the known progression. `None` for unknown phases.
    pub ordinal: Option<usize>,
}

fn label_of(phase: Phase) -> &'static str {
    match phase {
        Phase::Identifying => "Finding Your Book",
        Phase::Discussing => "Talking About the Story",
        Phase::Designing => "Designing the Game",
        Phase::Generating => "Building Your Game",
        Phase::Complete => "Game Ready!",
    }
}

/// Resolve the label and ordinal for a phase. Never fails.
pub fn display_of(phase: &PhaseId) -> PhaseDisplay {
    match phase.known() {
        Some(known) => PhaseDisplay {
            label: label_of(known).to_string(),
            ordinal: Some(known.ordinal()),
        },
        None => PhaseDisplay {
            label: phase.as_str().to_string(),
            ordinal: None,
        },
    }
}

/// Number of progress steps to light for a phase, in `0..=Phase::ALL.len()`.
pub fn progress_index(phase: &PhaseId) -> usize {
    phase
        .known()
        .map(|p| p.ordinal() + 1)
        .unwrap_or(0)
        .min(Phase::ALL.len())
}

/// Display name for the backend agent currently answering.
pub fn agent_label(agent: &str) -> &str {
    match agent {
        "story_analyst" => "Story Expert",
        "game_designer" => "Game Designer",
        "code_generator" => "Code Builder",
        other => other,
    }
}

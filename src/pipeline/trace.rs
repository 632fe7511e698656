//! Offline replay of recorded turn-taking traces.
//!
//! A trace is a JSON-lines file, one [`TraceEvent`] per line:
//!
//! ```text
//! {"event":"assistant_started","at":0.0}
//! {"event":"vad","at":1.0,"speaking":true}
//! {"event":"transcript","at":1.2,"text":"ruko"}
//! {"event":"tick","at":3.0}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::error::{AgentError, Result};
use crate::pipeline::messages::{Timestamp, TurnCommand, VoiceActivityEvent};
use crate::pipeline::turn::{TurnController, TurnState};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Vad { at: Timestamp, speaking: bool },
    Transcript { at: Timestamp, text: String },
    AssistantStarted {
        at: Timestamp,
        #[serde(default = "default_true")]
        interruptible: bool,
    },
    AssistantEnded { at: Timestamp },
    /// Advance the clock with no input.
    Tick { at: Timestamp },
    /// Hang up.
    Cancel,
}

fn default_true() -> bool {
    true
}

impl TraceEvent {
    pub fn at(&self) -> Option<Timestamp> {
        match self {
            Self::Vad { at, .. }
            | Self::Transcript { at, .. }
            | Self::AssistantStarted { at, .. }
            | Self::AssistantEnded { at }
            | Self::Tick { at } => Some(*at),
            Self::Cancel => None,
        }
    }

    /// Feed this event to `controller`.
    pub fn apply(&self, controller: &mut TurnController) -> Vec<TurnCommand> {
        match self {
            Self::Vad { at, speaking } => controller.on_voice_activity(VoiceActivityEvent {
                timestamp: *at,
                is_speaking: *speaking,
            }),
            Self::Transcript { at, text } => controller.on_transcript(*at, text),
            Self::AssistantStarted { at, interruptible } => {
                controller.on_assistant_speech_started(*at, *interruptible)
            }
            Self::AssistantEnded { at } => controller.on_assistant_speech_ended(*at),
            Self::Tick { at } => controller.advance_to(*at),
            Self::Cancel => {
                controller.cancel();
                Vec::new()
            }
        }
    }
}

/// Parse a JSON-lines trace.
///
/// # Errors
///
/// Returns [`AgentError::Trace`] naming the first malformed line.
pub fn parse_trace(reader: impl BufRead) -> Result<Vec<TraceEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(line)
            .map_err(|e| AgentError::Trace(format!("line {}: {e}", idx + 1)))?;
        events.push(event);
    }
    Ok(events)
}

/// A command emitted while replaying, tagged with the event that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayStep {
    /// Zero-based index of the triggering event.
    pub event: usize,
    pub state: TurnState,
    #[serde(flatten)]
    pub command: TurnCommand,
}

/// Run every event through `controller` in order.
///
/// Commands scheduled past the last event are not flushed; end a trace with a
/// `tick` to observe them.
pub fn replay(controller: &mut TurnController, events: &[TraceEvent]) -> Vec<ReplayStep> {
    let mut steps = Vec::new();
    for (idx, event) in events.iter().enumerate() {
        for command in event.apply(controller) {
            steps.push(ReplayStep {
                event: idx,
                state: controller.state(),
                command,
            });
        }
    }
    steps
}

//! Vaani: turn-taking core for an outbound sales voice agent.
//!
//! The agent calls retailers, speaks a scripted pitch in Hindi with English
//! terms, and listens. This crate decides who holds the floor:
//! Audio VAD / STT → [`TurnController`] → LLM / TTS
//!
//! # Architecture
//!
//! - **Turn controller**: synchronous state machine over voice activity,
//!   transcripts and assistant speech; emits stop-playback and commit-turn
//!   commands ([`pipeline::turn`])
//! - **Call session**: async host that stamps inputs with the session clock,
//!   wakes up for deferred deadlines and applies hooks ([`pipeline::session`])
//! - **Prompt**: system prompt from the persona and a YAML sales script
//!   ([`prompt`])
//! - **Config**: TOML configuration with two entry presets ([`config`])
//!
//! Speech recognition, synthesis and the language model are external
//! collaborators driven by the session's outputs.

pub mod chat;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompt;

pub use chat::{ChatContext, ChatMessage, ChatRole};
pub use config::{AgentConfig, EntryPreset};
pub use error::{AgentError, Result};
pub use pipeline::session::{CallSession, SessionHandle, SessionInput, SessionOutput};
pub use pipeline::turn::{TurnController, TurnControllerConfig, TurnState};

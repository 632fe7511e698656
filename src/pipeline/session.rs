//! Per-call session host for the turn controller.
//!
//! A [`CallSession`] owns one [`TurnController`], stamps every input with the
//! elapsed session time, wakes up for the controller's deferred deadlines and
//! turns controller commands into outputs for the audio / LLM / TTS driver.
//! Sessions share nothing; run one per active call.

use crate::chat::{ChatContext, ChatRole};
use crate::config::{AgentConfig, SessionConfig};
use crate::error::{AgentError, Result};
use crate::pipeline::hooks::Hooks;
use crate::pipeline::messages::{Timestamp, TurnCommand, UserTurn, VoiceActivityEvent};
use crate::pipeline::turn::TurnController;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Events fed into a running session by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionInput {
    /// VAD transition from the audio pipeline.
    VoiceActivity { is_speaking: bool },
    /// Recognized speech from the STT provider.
    Transcript { text: String },
    /// Playback of assistant audio began.
    AssistantSpeechStarted {
        #[serde(default = "default_true")]
        interruptible: bool,
    },
    /// Playback of assistant audio finished on its own.
    AssistantSpeechEnded,
    /// Ask the assistant to say something (e.g. the language-model reply).
    Say {
        text: String,
        #[serde(default = "default_true")]
        interruptible: bool,
    },
    /// The call ended.
    HangUp,
}

fn default_true() -> bool {
    true
}

/// Work the session hands to the downstream driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionOutput {
    /// Synthesize and play `text`.
    Speak { text: String, interruptible: bool },
    /// Halt assistant playback immediately.
    StopPlayback { at: Timestamp },
    /// Run the language model on the updated context.
    LlmRequest { turn: UserTurn, context: ChatContext },
    /// The session is over; no further outputs follow.
    Ended,
}

/// Sending side of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionInput>,
}

impl SessionHandle {
    /// Deliver an input to the session.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Channel`] if the session has stopped.
    pub async fn send(&self, input: SessionInput) -> Result<()> {
        self.tx
            .send(input)
            .await
            .map_err(|_| AgentError::Channel("call session has stopped".to_owned()))
    }

    /// Deliver an input from a non-async thread.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Channel`] if the session has stopped.
    pub fn blocking_send(&self, input: SessionInput) -> Result<()> {
        self.tx
            .blocking_send(input)
            .map_err(|_| AgentError::Channel("call session has stopped".to_owned()))
    }

    /// End the call.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Channel`] if the session has already stopped.
    pub async fn hang_up(&self) -> Result<()> {
        self.send(SessionInput::HangUp).await
    }
}

/// Forward JSON-lines [`SessionInput`]s from `reader` until end of input or
/// until the session stops. Blank and malformed lines are skipped.
///
/// Blocks the calling thread; run it off the async runtime.
///
/// # Errors
///
/// Returns [`AgentError::Io`] if reading fails.
pub fn feed_json_lines(reader: impl BufRead, handle: &SessionHandle) -> Result<usize> {
    let mut sent = 0;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<SessionInput>(line) {
            Ok(input) => {
                if handle.blocking_send(input).is_err() {
                    debug!("session stopped; input feed closed");
                    break;
                }
                sent += 1;
            }
            Err(e) => warn!(error = %e, "ignoring malformed input line"),
        }
    }
    Ok(sent)
}

/// One call: a turn controller plus the chat context it feeds.
pub struct CallSession {
    controller: TurnController,
    hooks: Hooks,
    context: ChatContext,
    settings: SessionConfig,
    greeting: Option<String>,
    max_history_messages: usize,
    input_rx: mpsc::Receiver<SessionInput>,
    output_tx: mpsc::Sender<SessionOutput>,
}

impl CallSession {
    /// Build a session from `config`, seeded with `context` (normally the
    /// system prompt from [`crate::prompt::initial_context`]).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfiguration`] if the turn-taking values
    /// are rejected.
    pub fn new(
        config: &AgentConfig,
        context: ChatContext,
        hooks: Hooks,
    ) -> Result<(Self, SessionHandle, mpsc::Receiver<SessionOutput>)> {
        let controller = TurnController::from_settings(&config.turn)?;
        let capacity = config.session.channel_capacity.max(1);
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);
        let greeting = Some(config.persona.greeting.trim())
            .filter(|g| config.session.greet_on_connect && !g.is_empty())
            .map(str::to_owned);
        let session = Self {
            controller,
            hooks,
            context,
            settings: config.session.clone(),
            greeting,
            max_history_messages: config.llm.max_history_messages,
            input_rx,
            output_tx,
        };
        Ok((session, SessionHandle { tx: input_tx }, output_rx))
    }

    /// Drive the session until hang-up, cancellation, or every handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Channel`] if the output receiver is dropped mid-call.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let started = Instant::now();
        let greeting_at = started + Duration::from_millis(self.settings.greeting_delay_ms);
        info!(greeting = self.greeting.is_some(), "call session started");

        let result = loop {
            let deadline = self
                .controller
                .next_deadline()
                .map(|ts| started + ts.offset());
            let greeting_pending = self.greeting.is_some();

            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => break Ok(()),
                () = tokio::time::sleep_until(deadline.unwrap_or(started)), if deadline.is_some() => {
                    let now = elapsed(started);
                    let commands = self.controller.advance_to(now);
                    self.dispatch(commands).await
                }
                () = tokio::time::sleep_until(greeting_at), if greeting_pending => {
                    match self.greeting.take() {
                        Some(text) => {
                            let interruptible = self.settings.greeting_interruptible;
                            self.speak(text, interruptible).await
                        }
                        None => Ok(()),
                    }
                }
                input = self.input_rx.recv() => match input {
                    None | Some(SessionInput::HangUp) => break Ok(()),
                    Some(input) => self.handle_input(elapsed(started), input).await,
                },
            };
            if let Err(e) = step {
                break Err(e);
            }
        };

        self.controller.cancel();
        let _ = self.output_tx.send(SessionOutput::Ended).await;
        info!("call session ended");
        result
    }

    async fn handle_input(&mut self, now: Timestamp, input: SessionInput) -> Result<()> {
        let commands = match input {
            SessionInput::VoiceActivity { is_speaking } => {
                self.controller.on_voice_activity(VoiceActivityEvent {
                    timestamp: now,
                    is_speaking,
                })
            }
            SessionInput::Transcript { text } => self.controller.on_transcript(now, &text),
            SessionInput::AssistantSpeechStarted { interruptible } => self
                .controller
                .on_assistant_speech_started(now, interruptible),
            SessionInput::AssistantSpeechEnded => self.controller.on_assistant_speech_ended(now),
            SessionInput::Say {
                text,
                interruptible,
            } => {
                let commands = self.controller.advance_to(now);
                self.dispatch(commands).await?;
                return self.speak(text, interruptible).await;
            }
            SessionInput::HangUp => Vec::new(),
        };
        self.dispatch(commands).await
    }

    async fn dispatch(&mut self, commands: Vec<TurnCommand>) -> Result<()> {
        for command in commands {
            let output = match command {
                TurnCommand::StopAssistantSpeech { at } => SessionOutput::StopPlayback { at },
                TurnCommand::CommitUserTurn(turn) => {
                    let text = turn.text();
                    if text.trim().is_empty() {
                        debug!("user turn without transcript; no LLM request");
                        continue;
                    }
                    self.context.push(ChatRole::User, text);
                    self.context.trim_history(self.max_history_messages);
                    let context = self.hooks.before_llm.apply(self.context.clone());
                    debug!(messages = context.messages().len(), "dispatching user turn");
                    SessionOutput::LlmRequest { turn, context }
                }
            };
            self.emit(output).await?;
        }
        Ok(())
    }

    async fn speak(&mut self, text: String, interruptible: bool) -> Result<()> {
        let text = self.hooks.before_tts.apply(text);
        if text.trim().is_empty() {
            debug!("empty utterance after hooks; nothing to say");
            return Ok(());
        }
        self.context.push(ChatRole::Assistant, text.clone());
        self.context.trim_history(self.max_history_messages);
        self.emit(SessionOutput::Speak {
            text,
            interruptible,
        })
        .await
    }

    async fn emit(&self, output: SessionOutput) -> Result<()> {
        self.output_tx
            .send(output)
            .await
            .map_err(|_| AgentError::Channel("session output receiver dropped".to_owned()))
    }
}

fn elapsed(started: Instant) -> Timestamp {
    Timestamp::from_offset(Instant::now().saturating_duration_since(started))
}

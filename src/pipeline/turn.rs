//! Turn-taking and interruption policy.
//!
//! [`TurnController`] turns voice-activity transitions, transcript fragments
//! and assistant speech lifecycle notifications into two commands: stop the
//! assistant's audio, or commit the user's turn to the language model.
//!
//! The controller is synchronous. Time-based transitions (the trailing
//! silence before a commit, the sustained speech that confirms an
//! interruption) are deferred actions on the logical session clock. Before
//! any timestamped input is handled, every action due at or before its
//! timestamp fires, so a deadline that coincides with an event counts as met.

use crate::config::TurnTakingConfig;
use crate::error::{AgentError, Result};
use crate::pipeline::messages::{
    PendingUserTurn, Speaker, SpeechSegment, Timestamp, TurnCommand, VoiceActivityEvent,
};
use crate::pipeline::timer::{DeferredActions, TimerId};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Validated, immutable turn-taking thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnControllerConfig {
    min_speech_duration: Duration,
    interrupt_speech_duration: Duration,
    interrupt_min_words: u32,
    min_endpointing_delay: Duration,
    allow_interruptions: bool,
}

impl TurnControllerConfig {
    /// Build a config from durations.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfiguration`] if any duration is zero.
    pub fn new(
        min_speech_duration: Duration,
        interrupt_speech_duration: Duration,
        interrupt_min_words: u32,
        min_endpointing_delay: Duration,
        allow_interruptions: bool,
    ) -> Result<Self> {
        for (name, value) in [
            ("min_speech_duration", min_speech_duration),
            ("interrupt_speech_duration", interrupt_speech_duration),
            ("min_endpointing_delay", min_endpointing_delay),
        ] {
            if value.is_zero() {
                return Err(AgentError::InvalidConfiguration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(Self {
            min_speech_duration,
            interrupt_speech_duration,
            interrupt_min_words,
            min_endpointing_delay,
            allow_interruptions,
        })
    }

    pub fn min_speech_duration(&self) -> Duration {
        self.min_speech_duration
    }

    pub fn interrupt_speech_duration(&self) -> Duration {
        self.interrupt_speech_duration
    }

    pub fn interrupt_min_words(&self) -> u32 {
        self.interrupt_min_words
    }

    pub fn min_endpointing_delay(&self) -> Duration {
        self.min_endpointing_delay
    }

    pub fn allow_interruptions(&self) -> bool {
        self.allow_interruptions
    }
}

impl TryFrom<&TurnTakingConfig> for TurnControllerConfig {
    type Error = AgentError;

    fn try_from(raw: &TurnTakingConfig) -> Result<Self> {
        let interrupt_min_words = u32::try_from(raw.interrupt_min_words).map_err(|_| {
            AgentError::InvalidConfiguration(format!(
                "interrupt_min_words must be a non-negative integer, got {}",
                raw.interrupt_min_words
            ))
        })?;
        Self::new(
            seconds("min_speech_duration", raw.min_speech_duration)?,
            seconds("interrupt_speech_duration", raw.interrupt_speech_duration)?,
            interrupt_min_words,
            seconds("min_endpointing_delay", raw.min_endpointing_delay)?,
            raw.allow_interruptions,
        )
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AgentError::InvalidConfiguration(format!(
            "{name} must be a positive number of seconds, got {value}"
        )));
    }
    Ok(Duration::from_nanos((value * 1e9).round() as u64))
}

/// Conversation floor as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Nobody is speaking.
    Idle,
    /// The user holds the floor (speaking, or within the endpointing delay).
    UserSpeaking,
    /// The assistant is playing audio.
    AssistantSpeaking,
    /// The assistant is playing audio and user speech has been detected but
    /// not yet confirmed as an intentional interruption.
    UserInterrupting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    CommitUserTurn,
    ConfirmInterruption,
}

/// Per-call turn-taking state machine.
#[derive(Debug)]
pub struct TurnController {
    config: TurnControllerConfig,
    state: TurnState,
    /// Open user segment, if the user is speaking right now.
    user_segment: Option<SpeechSegment>,
    /// Open assistant segment while the assistant is speaking.
    assistant_segment: Option<SpeechSegment>,
    pending: Option<PendingUserTurn>,
    /// Per-utterance interruption flag supplied with assistant-speech-started.
    assistant_interruptible: bool,
    timers: DeferredActions<Deferred>,
    commit_timer: Option<TimerId>,
    interrupt_timer: Option<TimerId>,
    /// Candidate interruption has lasted `interrupt_speech_duration`.
    interrupt_duration_met: bool,
    last_event_at: Option<Timestamp>,
}

impl TurnController {
    pub fn new(config: TurnControllerConfig) -> Self {
        Self {
            config,
            state: TurnState::Idle,
            user_segment: None,
            assistant_segment: None,
            pending: None,
            assistant_interruptible: true,
            timers: DeferredActions::new(),
            commit_timer: None,
            interrupt_timer: None,
            interrupt_duration_met: false,
            last_event_at: None,
        }
    }

    /// Validate raw config values and build a controller.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfiguration`] for non-positive durations
    /// or a negative word gate.
    pub fn from_settings(settings: &TurnTakingConfig) -> Result<Self> {
        Ok(Self::new(TurnControllerConfig::try_from(settings)?))
    }

    pub fn config(&self) -> &TurnControllerConfig {
        &self.config
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// The open segment for `speaker`, if any.
    pub fn open_segment(&self, speaker: Speaker) -> Option<&SpeechSegment> {
        match speaker {
            Speaker::User => self.user_segment.as_ref(),
            Speaker::Assistant => self.assistant_segment.as_ref(),
        }
    }

    /// The user turn being accumulated, if any.
    pub fn pending_turn(&self) -> Option<&PendingUserTurn> {
        self.pending.as_ref()
    }

    /// Whether a commit is waiting for the endpointing delay to elapse.
    pub fn is_commit_pending(&self) -> bool {
        self.commit_timer
            .is_some_and(|id| self.timers.is_pending(id))
    }

    /// When the host should call [`TurnController::advance_to`] next.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_deadline()
    }

    /// Handle a voice-activity transition.
    pub fn on_voice_activity(&mut self, event: VoiceActivityEvent) -> Vec<TurnCommand> {
        let at = event.timestamp;
        let mut out = Vec::new();
        if !self.accept(at) {
            return out;
        }
        self.fire_due(at, &mut out);
        if event.is_speaking {
            self.user_started(at);
        } else {
            self.user_stopped(at);
        }
        out
    }

    /// Handle a recognized transcript fragment for the user's current speech.
    pub fn on_transcript(&mut self, at: Timestamp, text: &str) -> Vec<TurnCommand> {
        let mut out = Vec::new();
        if !self.accept(at) {
            return out;
        }
        self.fire_due(at, &mut out);
        let in_user_turn = matches!(
            self.state,
            TurnState::UserSpeaking | TurnState::UserInterrupting
        );
        match self.pending.as_mut() {
            Some(pending) if in_user_turn => pending.push_fragment(text),
            _ => {
                debug!(state = ?self.state, "transcript outside a user turn dropped");
                return out;
            }
        }
        if self.state == TurnState::UserInterrupting {
            self.try_confirm_interruption(at, &mut out);
        }
        out
    }

    /// The assistant started playing audio.
    ///
    /// `interruptible` is the per-utterance flag; user speech can only
    /// interrupt when both it and the configured master switch are set.
    pub fn on_assistant_speech_started(
        &mut self,
        at: Timestamp,
        interruptible: bool,
    ) -> Vec<TurnCommand> {
        let mut out = Vec::new();
        if !self.accept(at) {
            return out;
        }
        self.fire_due(at, &mut out);
        match self.state {
            TurnState::Idle => {
                self.assistant_segment = Some(SpeechSegment::open(Speaker::Assistant, at));
                self.assistant_interruptible = interruptible;
                self.state = TurnState::AssistantSpeaking;
                debug!(%at, interruptible, "assistant speech started");
            }
            TurnState::AssistantSpeaking | TurnState::UserInterrupting => {
                debug!(
                    "{}",
                    AgentError::SpuriousCommand("assistant speech already active")
                );
            }
            TurnState::UserSpeaking => {
                warn!(%at, "assistant speech started while the user holds the floor; ignored");
            }
        }
        out
    }

    /// The assistant finished playing audio on its own.
    pub fn on_assistant_speech_ended(&mut self, at: Timestamp) -> Vec<TurnCommand> {
        let mut out = Vec::new();
        if !self.accept(at) {
            return out;
        }
        self.fire_due(at, &mut out);
        match self.state {
            TurnState::AssistantSpeaking => {
                self.close_assistant(at);
                self.state = TurnState::Idle;
                debug!(%at, "assistant speech ended");
            }
            TurnState::UserInterrupting => {
                // The floor is already free, so the candidate becomes a plain user turn.
                self.close_assistant(at);
                self.cancel_interrupt_timer();
                self.state = TurnState::UserSpeaking;
                debug!(%at, "assistant finished during candidate interruption");
            }
            TurnState::Idle | TurnState::UserSpeaking => {
                debug!(state = ?self.state, "assistant speech end with no assistant speech");
            }
        }
        out
    }

    /// Advance the logical clock, firing every deferred action due at `now`.
    pub fn advance_to(&mut self, now: Timestamp) -> Vec<TurnCommand> {
        let mut out = Vec::new();
        if self.accept(now) {
            self.fire_due(now, &mut out);
        }
        out
    }

    /// Explicit cancellation (call ended). Discards everything without committing.
    pub fn cancel(&mut self) {
        let discarded = self.timers.len();
        self.timers.clear();
        self.commit_timer = None;
        self.interrupt_timer = None;
        self.interrupt_duration_met = false;
        self.user_segment = None;
        self.assistant_segment = None;
        self.pending = None;
        self.assistant_interruptible = true;
        if self.state != TurnState::Idle {
            info!(state = ?self.state, discarded, "turn controller cancelled");
        }
        self.state = TurnState::Idle;
    }

    fn accept(&mut self, at: Timestamp) -> bool {
        if let Some(last) = self.last_event_at
            && at < last
        {
            warn!("{}; event discarded", AgentError::OutOfOrderEvent { at, last });
            return false;
        }
        self.last_event_at = Some(at);
        true
    }

    fn fire_due(&mut self, now: Timestamp, out: &mut Vec<TurnCommand>) {
        while let Some((id, deadline, action)) = self.timers.pop_due(now) {
            match action {
                Deferred::CommitUserTurn => {
                    if self.commit_timer == Some(id) {
                        self.commit_timer = None;
                        self.commit(deadline, out);
                    }
                }
                Deferred::ConfirmInterruption => {
                    if self.interrupt_timer == Some(id) {
                        self.interrupt_timer = None;
                        self.interrupt_duration_met = true;
                        self.try_confirm_interruption(deadline, out);
                    }
                }
            }
        }
    }

    fn user_started(&mut self, at: Timestamp) {
        match self.state {
            TurnState::Idle => {
                self.user_segment = Some(SpeechSegment::open(Speaker::User, at));
                self.pending = Some(PendingUserTurn::new());
                self.state = TurnState::UserSpeaking;
                debug!(%at, "user speech started");
            }
            TurnState::UserSpeaking => {
                if self.user_segment.is_some() {
                    debug!(%at, "duplicate user speech start ignored");
                    return;
                }
                if let Some(id) = self.commit_timer.take() {
                    self.timers.cancel(id);
                    debug!(%at, "user speech resumed; pending commit cancelled");
                }
                self.user_segment = Some(SpeechSegment::open(Speaker::User, at));
            }
            TurnState::AssistantSpeaking => {
                if !self.interruptions_enabled() {
                    debug!(%at, "user speech during uninterruptible assistant speech ignored");
                    return;
                }
                self.user_segment = Some(SpeechSegment::open(Speaker::User, at));
                self.pending = Some(PendingUserTurn::new());
                self.interrupt_duration_met = false;
                self.interrupt_timer = Some(self.timers.schedule(
                    at + self.config.interrupt_speech_duration,
                    Deferred::ConfirmInterruption,
                ));
                self.state = TurnState::UserInterrupting;
                debug!(%at, "possible interruption");
            }
            TurnState::UserInterrupting => {
                debug!(%at, "duplicate user speech start ignored");
            }
        }
    }

    fn user_stopped(&mut self, at: Timestamp) {
        match self.state {
            TurnState::UserSpeaking => {
                let Some(mut segment) = self.user_segment.take() else {
                    debug!(%at, "duplicate user speech stop ignored");
                    return;
                };
                let spoken = segment.duration_until(at);
                let confirmed = self
                    .pending
                    .as_ref()
                    .is_some_and(PendingUserTurn::has_confirmed_speech);
                if !confirmed && spoken < self.config.min_speech_duration {
                    self.pending = None;
                    self.state = TurnState::Idle;
                    debug!(%at, spoken_ms = spoken.as_millis() as u64, "speech too short; discarded as noise");
                    return;
                }
                segment.close(at);
                if let Some(pending) = self.pending.as_mut() {
                    pending.push_segment(segment);
                }
                self.commit_timer = Some(self.timers.schedule(
                    at + self.config.min_endpointing_delay,
                    Deferred::CommitUserTurn,
                ));
            }
            TurnState::UserInterrupting => {
                self.cancel_interrupt_timer();
                self.user_segment = None;
                self.pending = None;
                self.state = TurnState::AssistantSpeaking;
                debug!(%at, "interruption not confirmed; assistant continues");
            }
            TurnState::Idle | TurnState::AssistantSpeaking => {
                debug!(state = ?self.state, "user speech stop with no user segment");
            }
        }
    }

    fn try_confirm_interruption(&mut self, at: Timestamp, out: &mut Vec<TurnCommand>) {
        if self.state != TurnState::UserInterrupting || !self.interrupt_duration_met {
            return;
        }
        let words = self.pending.as_ref().map_or(0, PendingUserTurn::word_count);
        if words < self.config.interrupt_min_words as usize {
            return;
        }
        self.close_assistant(at);
        self.interrupt_duration_met = false;
        if let Some(pending) = self.pending.as_mut() {
            pending.confirm();
        }
        self.state = TurnState::UserSpeaking;
        info!(%at, words, "user interrupted the assistant");
        out.push(TurnCommand::StopAssistantSpeech { at });
    }

    fn commit(&mut self, at: Timestamp, out: &mut Vec<TurnCommand>) {
        if self.state != TurnState::UserSpeaking || self.user_segment.is_some() {
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };
        let ended_at = pending
            .segments()
            .last()
            .and_then(|s| s.end_time)
            .unwrap_or(at);
        let turn = pending.into_user_turn(ended_at);
        self.state = TurnState::Idle;
        info!(%at, fragments = turn.fragments.len(), "user turn committed");
        out.push(TurnCommand::CommitUserTurn(turn));
    }

    fn close_assistant(&mut self, at: Timestamp) {
        if let Some(mut segment) = self.assistant_segment.take() {
            segment.close(at);
        }
        self.assistant_interruptible = true;
    }

    fn cancel_interrupt_timer(&mut self) {
        if let Some(id) = self.interrupt_timer.take() {
            self.timers.cancel(id);
        }
        self.interrupt_duration_met = false;
    }

    fn interruptions_enabled(&self) -> bool {
        self.config.allow_interruptions && self.assistant_interruptible
    }
}

//! Message types passed into and out of the turn controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::time::Duration;

/// Monotonic logical time measured from the start of a call session.
///
/// Serialized as fractional seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Timestamp(Duration);

impl From<f64> for Timestamp {
    fn from(secs: f64) -> Self {
        Self::from_secs_f64(secs)
    }
}

impl From<Timestamp> for f64 {
    fn from(ts: Timestamp) -> Self {
        ts.as_secs_f64()
    }
}

impl Timestamp {
    /// The start of the session.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Timestamp `offset` after the session start.
    pub const fn from_offset(offset: Duration) -> Self {
        Self(offset)
    }

    /// Timestamp from fractional seconds, rounded to the nearest nanosecond.
    /// Negative or non-finite values clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Self(Duration::from_nanos((secs * 1e9).round() as u64))
        } else {
            Self::ZERO
        }
    }

    /// Timestamp from whole milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    /// Offset from the session start.
    pub const fn offset(self) -> Duration {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, or zero if `earlier` is later.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    /// Seconds since the session start.
    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}

/// A transition reported by the external voice-activity detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceActivityEvent {
    /// When the transition was observed.
    pub timestamp: Timestamp,
    /// Whether the audio stream contains speech from this point on.
    pub is_speaking: bool,
}

impl VoiceActivityEvent {
    /// Speech started at `timestamp`.
    pub const fn started(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            is_speaking: true,
        }
    }

    /// Speech stopped at `timestamp`.
    pub const fn stopped(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            is_speaking: false,
        }
    }
}

/// Who a speech segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// A span of speech attributed to one speaker. Open while `end_time` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechSegment {
    pub speaker: Speaker,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
}

impl SpeechSegment {
    /// Open a new segment for `speaker` starting at `start_time`.
    pub const fn open(speaker: Speaker, start_time: Timestamp) -> Self {
        Self {
            speaker,
            start_time,
            end_time: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Close the segment at `at`. Closing an already closed segment keeps the first end time.
    pub fn close(&mut self, at: Timestamp) {
        if self.end_time.is_none() {
            self.end_time = Some(at);
        }
    }

    /// Length of the segment, measured up to `now` while it is still open.
    pub fn duration_until(&self, now: Timestamp) -> std::time::Duration {
        self.end_time.unwrap_or(now).saturating_since(self.start_time)
    }
}

/// Transcript fragments and closed segments gathered for the user turn in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingUserTurn {
    fragments: Vec<String>,
    segments: Vec<SpeechSegment>,
    word_count: usize,
    confirmed: bool,
}

impl PendingUserTurn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a recognized fragment. Blank fragments are ignored.
    pub fn push_fragment(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        self.word_count += trimmed.split_whitespace().count();
        self.fragments.push(trimmed.to_owned());
    }

    /// Record a finished user segment as part of this turn.
    pub fn push_segment(&mut self, segment: SpeechSegment) {
        self.segments.push(segment);
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn segments(&self) -> &[SpeechSegment] {
        &self.segments
    }

    /// Number of whitespace-separated words recognized so far.
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Mark the turn as intentional speech, exempt from the noise filter.
    pub fn confirm(&mut self) {
        self.confirmed = true;
    }

    /// Whether this turn already contains speech that passed the noise filter
    /// or was confirmed as an interruption.
    pub fn has_confirmed_speech(&self) -> bool {
        self.confirmed || !self.segments.is_empty()
    }

    /// Consume the pending turn into its committed form.
    pub fn into_user_turn(self, ended_at: Timestamp) -> UserTurn {
        let started_at = self
            .segments
            .first()
            .map(|s| s.start_time)
            .unwrap_or(ended_at);
        UserTurn {
            fragments: self.fragments,
            started_at,
            ended_at,
        }
    }
}

/// A committed user turn, ready for language-model processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTurn {
    /// Transcript fragments in arrival order.
    pub fragments: Vec<String>,
    /// Start of the first user segment in the turn.
    pub started_at: Timestamp,
    /// End of the last user segment in the turn.
    pub ended_at: Timestamp,
}

impl UserTurn {
    /// Fragments joined with single spaces.
    pub fn text(&self) -> String {
        self.fragments.join(" ")
    }
}

/// Commands emitted by the turn controller to the audio / LLM driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TurnCommand {
    /// Halt assistant audio playback immediately.
    StopAssistantSpeech { at: Timestamp },
    /// Hand the finished user turn to the language model.
    CommitUserTurn(UserTurn),
}

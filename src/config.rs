//! Configuration types for the sales voice agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Top-level configuration for one agent deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Speech-to-text provider settings.
    pub stt: SttConfig,
    /// Language model provider settings.
    pub llm: LlmConfig,
    /// Text-to-speech provider settings.
    pub tts: TtsConfig,
    /// Turn-taking and interruption thresholds.
    pub turn: TurnTakingConfig,
    /// Who the assistant is and what it says first.
    pub persona: PersonaConfig,
    /// Call session behaviour.
    pub session: SessionConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_preset(EntryPreset::default())
    }
}

/// The two entry variants the agent ships with.
///
/// They differ in VAD sensitivity, persona and greeting. Neither is a
/// mandated default for the thresholds; both are valid presets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPreset {
    /// Direct assistant: conservative noise filter, male persona.
    Assistant,
    /// Pipeline agent: faster speech detection, female persona, concise replies.
    #[default]
    Pipeline,
}

impl FromStr for EntryPreset {
    type Err = crate::error::AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assistant" => Ok(Self::Assistant),
            "pipeline" => Ok(Self::Pipeline),
            other => Err(crate::error::AgentError::Config(format!(
                "unknown preset `{other}` (expected `assistant` or `pipeline`)"
            ))),
        }
    }
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Provider name.
    pub provider: String,
    /// Recognition languages, primary first.
    pub languages: Vec<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: "azure".to_owned(),
            languages: vec!["hi-IN".to_owned(), "en-IN".to_owned()],
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name.
    pub provider: String,
    /// Deployed model name.
    pub model: String,
    /// Provider API version.
    pub api_version: String,
    /// Maximum number of history messages to retain (excluding the system prompt).
    ///
    /// Set to 0 to disable trimming.
    pub max_history_messages: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "azure-openai".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            api_version: "2024-08-01-preview".to_owned(),
            max_history_messages: 24,
        }
    }
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Provider name.
    pub provider: String,
    /// Neural voice name.
    pub voice: String,
    /// Synthesis language.
    pub language: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: "azure".to_owned(),
            voice: "hi-IN-AnanyaNeural".to_owned(),
            language: "hi-IN".to_owned(),
        }
    }
}

/// Turn-taking thresholds as written in the config file.
///
/// Durations are in seconds. Values are validated when the turn controller
/// is built, not when the file is parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnTakingConfig {
    /// Minimum speech length before a VAD trigger counts as speech.
    pub min_speech_duration: f64,
    /// Continuous user speech required to confirm an interruption.
    pub interrupt_speech_duration: f64,
    /// Recognized words required to confirm an interruption (0 disables the gate).
    pub interrupt_min_words: i64,
    /// Trailing silence required before committing a user turn.
    pub min_endpointing_delay: f64,
    /// Master switch for user interruptions.
    pub allow_interruptions: bool,
}

impl Default for TurnTakingConfig {
    fn default() -> Self {
        Self::for_preset(EntryPreset::default())
    }
}

impl TurnTakingConfig {
    /// Thresholds used by `preset`.
    pub fn for_preset(preset: EntryPreset) -> Self {
        let min_speech_duration = match preset {
            EntryPreset::Assistant => 0.5,
            EntryPreset::Pipeline => 0.1,
        };
        Self {
            min_speech_duration,
            interrupt_speech_duration: 0.5,
            interrupt_min_words: 0,
            min_endpointing_delay: 0.5,
            allow_interruptions: true,
        }
    }
}

/// Grammatical gender the assistant speaks with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    #[default]
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

/// Persona and script settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub gender: Gender,
    /// Language the assistant speaks by default, e.g. `Hindi (hi-IN)`.
    pub primary_language: String,
    /// Language allowed for technical terms, e.g. `English (en-IN)`.
    pub secondary_language: String,
    /// Extra guideline sentences appended after the fixed ones.
    pub extra_guidelines: Vec<String>,
    /// YAML file holding the `sales_script` key.
    pub sales_script_path: PathBuf,
    /// First thing the assistant says once the call connects.
    pub greeting: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self::for_preset(EntryPreset::default())
    }
}

impl PersonaConfig {
    /// Persona used by `preset`.
    pub fn for_preset(preset: EntryPreset) -> Self {
        let base = Self {
            gender: Gender::Female,
            primary_language: "Hindi (hi-IN)".to_owned(),
            secondary_language: "English (en-IN)".to_owned(),
            extra_guidelines: Vec::new(),
            sales_script_path: PathBuf::from("sales_prompt.yaml"),
            greeting: String::new(),
        };
        match preset {
            EntryPreset::Assistant => Self {
                gender: Gender::Male,
                greeting: "नमस्ते सर, मैं श्रुति बोल रही हूँ रॉकेट सिंग कंपनी से। \
                           क्या आप हमारे नए product के बारे में जानना चाहेंगे?"
                    .to_owned(),
                ..base
            },
            EntryPreset::Pipeline => Self {
                extra_guidelines: vec![
                    "Do not say sir repeatedly, and make the responses concise unless asked for details."
                        .to_owned(),
                    "Encourage the retailer to stock the product immediately after the initial conversation."
                        .to_owned(),
                ],
                greeting: "नमस्ते सर, मैं SP Sales की तरफ से श्रुति बात कर रही हूँ। \
                           क्या आप अभी 2 minute बात कर सकते हैं?"
                    .to_owned(),
                ..base
            },
        }
    }
}

/// Call session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether the greeting is spoken automatically once the session starts.
    pub greet_on_connect: bool,
    /// Delay between session start and the greeting (ms).
    pub greeting_delay_ms: u64,
    /// Whether the user may interrupt the greeting.
    pub greeting_interruptible: bool,
    /// Capacity of the session input and output channels.
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greet_on_connect: true,
            greeting_delay_ms: 1_000,
            greeting_interruptible: true,
            channel_capacity: 64,
        }
    }
}

impl AgentConfig {
    /// Full configuration for one of the shipped entry variants.
    pub fn from_preset(preset: EntryPreset) -> Self {
        Self {
            stt: SttConfig::default(),
            llm: LlmConfig::default(),
            tts: TtsConfig::default(),
            turn: TurnTakingConfig::for_preset(preset),
            persona: PersonaConfig::for_preset(preset),
            session: SessionConfig::default(),
        }
    }

    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AgentError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AgentError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/vaani/config.toml`.
    ///
    /// `VAANI_CONFIG_DIR` overrides the directory.
    pub fn default_config_path() -> PathBuf {
        let dir = match std::env::var_os("VAANI_CONFIG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .map(|d| d.join("vaani"))
                .unwrap_or_else(|| PathBuf::from("/tmp/vaani-config")),
        };
        dir.join("config.toml")
    }
}

//! Sales prompt assembly.
//!
//! The system prompt is built from two layers:
//!
//! 1. **Persona guidelines**: fixed sentences parameterised by the
//!    assistant's gender and languages, followed by any extra guidelines
//!    from [`PersonaConfig::extra_guidelines`].
//! 2. **Sales script**: the `sales_script` entry of a YAML file, appended
//!    under a `Sales Script:` heading.

use crate::chat::ChatContext;
use crate::config::{AgentConfig, PersonaConfig};
use crate::error::{AgentError, Result};
use serde::Deserialize;
use std::path::Path;

/// The scripted talk track loaded from `sales_prompt.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalesScript {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SalesPromptFile {
    sales_script: Option<serde_yaml::Value>,
}

impl SalesScript {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Parse a sales prompt document. A missing `sales_script` key yields an
    /// empty script; a non-string value is rendered back to YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Prompt`] if the document is not valid YAML.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: SalesPromptFile =
            serde_yaml::from_str(content).map_err(|e| AgentError::Prompt(e.to_string()))?;
        let text = match file.sales_script {
            None | Some(serde_yaml::Value::Null) => String::new(),
            Some(serde_yaml::Value::String(s)) => s,
            Some(other) => serde_yaml::to_string(&other)
                .map_err(|e| AgentError::Prompt(e.to_string()))?,
        };
        Ok(Self { text })
    }

    /// Load a sales prompt document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Prompt(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Language name without its locale tag: `Hindi (hi-IN)` → `Hindi`.
fn language_name(label: &str) -> &str {
    label.split('(').next().unwrap_or(label).trim()
}

/// Assembles the system prompt from the persona and the sales script.
pub fn assemble_system_prompt(persona: &PersonaConfig, script: &SalesScript) -> String {
    let primary = persona.primary_language.trim();
    let secondary = persona.secondary_language.trim();
    let primary_name = language_name(primary);
    let secondary_name = language_name(secondary);

    let mut sentences = vec![
        format!(
            "You are a {} outbound sales voice assistant making calls to potential customers.",
            persona.gender.as_str()
        ),
        format!("Your primary language is {primary} with {secondary} as a secondary language."),
        format!(
            "You should primarily speak in {primary_name} but can use {secondary_name} for technical terms."
        ),
        format!(
            "Only use the {secondary_name} words that are specifically allowed in the language settings."
        ),
        "Keep your responses natural, conversational, and follow the sales script below.".to_owned(),
        "Speak clearly and be respectful of the customer's time and preferences.".to_owned(),
    ];
    sentences.extend(
        persona
            .extra_guidelines
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .map(str::to_owned),
    );

    let mut prompt = String::new();
    for sentence in &sentences {
        prompt.push_str(sentence);
        prompt.push(' ');
    }
    prompt.push_str("\n\nSales Script:\n");
    prompt.push_str(script.text());
    prompt
}

/// Build the initial chat context for a call: the system prompt assembled
/// from the configured persona and the sales script file.
///
/// # Errors
///
/// Returns an error if the sales script file cannot be loaded.
pub fn initial_context(config: &AgentConfig) -> Result<ChatContext> {
    let script = SalesScript::from_yaml_file(&config.persona.sales_script_path)?;
    Ok(ChatContext::with_system(assemble_system_prompt(
        &config.persona,
        &script,
    )))
}

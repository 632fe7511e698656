//! Transformation hooks applied between turn commits and downstream dispatch.
//!
//! A [`HookChain`] is an ordered list of pure functions. The session runs the
//! `before_llm` chain on the chat context after each committed user turn, and
//! the `before_tts` chain on every text about to be synthesized. The turn
//! controller never sees either.

use crate::chat::ChatContext;
use std::fmt;

type Hook<T> = Box<dyn Fn(T) -> T + Send + Sync>;

/// Ordered list of transformations. An empty chain is the identity.
pub struct HookChain<T> {
    hooks: Vec<Hook<T>>,
}

impl<T> Default for HookChain<T> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<T> fmt::Debug for HookChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookChain")
            .field("len", &self.hooks.len())
            .finish()
    }
}

impl<T> HookChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; hooks run in insertion order.
    #[must_use]
    pub fn then(mut self, hook: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.push(hook);
        self
    }

    pub fn push(&mut self, hook: impl Fn(T) -> T + Send + Sync + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Run every hook in order.
    pub fn apply(&self, value: T) -> T {
        self.hooks.iter().fold(value, |acc, hook| hook(acc))
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Hooks the session applies before language-model and speech-synthesis calls.
#[derive(Debug, Default)]
pub struct Hooks {
    pub before_llm: HookChain<ChatContext>,
    pub before_tts: HookChain<String>,
}

impl Hooks {
    /// No transformations.
    pub fn identity() -> Self {
        Self::default()
    }
}

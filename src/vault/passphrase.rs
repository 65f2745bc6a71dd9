//! Passphrase resolution for symmetric vaults.

use crate::error::{ConfError, ConfResult};
use dialoguer::Password;

/// Source of the vault passphrase.
pub trait PassphrasePrompt {
    /// Ask for the passphrase. With `confirm`, the passphrase must be entered
    /// twice and the prompt repeats until both entries match.
    fn ask(&mut self, confirm: bool) -> ConfResult<String>;
}

/// Masked terminal prompt.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

/// Map a dialoguer error to a `ConfError`.
fn input_err(e: dialoguer::Error) -> ConfError {
    ConfError::Prompt(format!("failed to read the pass phrase: {e}"))
}

impl PassphrasePrompt for TerminalPrompt {
    fn ask(&mut self, confirm: bool) -> ConfResult<String> {
        let mut prompt = Password::new().with_prompt("Pass phrase for encrypted configuration");
        if confirm {
            prompt = prompt.with_confirmation(
                "Pass phrase (again)",
                "The pass phrases do not match... please try again",
            );
        }
        prompt.interact().map_err(input_err)
    }
}

/// Non-interactive passphrase, for automation and tests.
#[derive(Debug, Clone)]
pub struct FixedPassphrase(pub String);

impl PassphrasePrompt for FixedPassphrase {
    fn ask(&mut self, _confirm: bool) -> ConfResult<String> {
        Ok(self.0.clone())
    }
}

/// Resolves the passphrase at most once and keeps it for later vaults.
pub struct PassphraseCache {
    prompt: Box<dyn PassphrasePrompt>,
    cached: Option<String>,
}

impl PassphraseCache {
    pub fn new(prompt: Box<dyn PassphrasePrompt>) -> Self {
        Self {
            prompt,
            cached: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.cached.is_some()
    }

    /// The cached passphrase, prompting on first use.
    pub fn resolve(&mut self, confirm: bool) -> ConfResult<&str> {
        if self.cached.is_none() {
            self.cached = Some(self.prompt.ask(confirm)?);
        }
        Ok(self.cached.as_deref().unwrap_or_default())
    }
}

impl std::fmt::Debug for PassphraseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseCache")
            .field("resolved", &self.cached.is_some())
            .finish()
    }
}

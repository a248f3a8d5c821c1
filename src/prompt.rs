use anyhow::Result;
use dialoguer::{Confirm, Input, Password, Select};

/// Operator questions asked during interactive setup and credential updates.
pub trait Prompter {
    /// Free text. With a default, an empty answer returns the default;
    /// without one, an answer is required.
    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Free text that may be left blank, which yields `None`.
    fn optional_text(&self, prompt: &str) -> Result<Option<String>>;

    /// One of `choices`.
    fn select(&self, prompt: &str, choices: &[&str], default: &str) -> Result<String>;

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Hidden input. Empty answers are allowed only when `allow_empty` is set.
    fn secret(&self, prompt: &str, allow_empty: bool) -> Result<String>;
}

/// [`Prompter`] on the controlling terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(prompt);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?.trim().to_string())
    }

    fn optional_text(&self, prompt: &str) -> Result<Option<String>> {
        let answer = Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(Some(answer.trim().to_string()).filter(|a| !a.is_empty()))
    }

    fn select(&self, prompt: &str, choices: &[&str], default: &str) -> Result<String> {
        let default_idx = choices.iter().position(|c| *c == default).unwrap_or(0);
        let idx = Select::new()
            .with_prompt(prompt)
            .items(choices)
            .default(default_idx)
            .interact()?;
        Ok(choices[idx].to_string())
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new().with_prompt(prompt).default(default).interact()?)
    }

    fn secret(&self, prompt: &str, allow_empty: bool) -> Result<String> {
        Ok(Password::new()
            .with_prompt(prompt)
            .allow_empty_password(allow_empty)
            .interact()?)
    }
}

/// WPA2 passphrases are 8 to 63 characters.
pub fn validate_passphrase(passphrase: &str) -> Result<(), String> {
    let len = passphrase.chars().count();
    if (8..=63).contains(&len) {
        Ok(())
    } else {
        Err(format!(
            "Passphrase must be 8-63 characters long. You entered {} characters.",
            len
        ))
    }
}

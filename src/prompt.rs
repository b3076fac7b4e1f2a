//! Decisions as data: a [`Menu`] lists labelled outcomes, the one automatic
//! mode takes, and the one a dismissed prompt means; a [`Prompter`] picks one.

use std::io;

use dialoguer::{Confirm, Input, Select};
use tracing::{info, warn};

use crate::session::CancelToken;

/// One labelled outcome.
#[derive(Debug, Clone)]
pub struct Choice<T> {
    pub label: String,
    pub value: T,
}

/// Labelled outcomes of a decision plus the one automatic mode takes.
#[derive(Debug, Clone)]
pub struct Menu<T> {
    pub title: String,
    pub choices: Vec<Choice<T>>,
    pub default: usize,
    /// Outcome of Esc or Ctrl-C; never the default.
    pub escape: Option<usize>,
}

impl<T: Clone> Menu<T> {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            choices: Vec::new(),
            default: 0,
            escape: None,
        }
    }

    pub fn choice(mut self, label: impl Into<String>, value: T) -> Self {
        self.choices.push(Choice {
            label: label.into(),
            value,
        });
        self
    }

    /// Make the most recently added choice the default.
    pub fn as_default(mut self) -> Self {
        self.default = self.choices.len().saturating_sub(1);
        self
    }

    /// Make the most recently added choice the dismissal outcome.
    pub fn as_escape(mut self) -> Self {
        self.escape = self.choices.len().checked_sub(1);
        self
    }

    pub fn labels(&self) -> Vec<String> {
        self.choices.iter().map(|c| c.label.clone()).collect()
    }

    pub fn default_value(&self) -> Option<T> {
        self.choices.get(self.default).map(|c| c.value.clone())
    }

    /// Value at `index`; out of range falls back to the default.
    pub fn resolve(&self, index: usize) -> Option<T> {
        self.choices
            .get(index)
            .map(|c| c.value.clone())
            .or_else(|| self.default_value())
    }

    pub fn escape_value(&self) -> Option<T> {
        self.escape
            .and_then(|i| self.choices.get(i))
            .map(|c| c.value.clone())
    }
}

/// Renders decisions and collects answers.
pub trait Prompter {
    /// Index of the chosen label; `None` when the prompt was dismissed.
    fn select(&mut self, title: &str, labels: &[String], default: usize) -> Option<usize>;

    /// Free text; `None` when nothing was entered.
    fn input(&mut self, prompt: &str) -> Option<String>;

    /// A dismissed question reads as "no".
    fn confirm(&mut self, prompt: &str, default: bool) -> bool;
}

/// Ask `ui` to choose from `menu`.
///
/// A dismissed prompt yields the menu's escape choice. An empty menu, or a
/// dismissed one without an escape choice, yields `fallback`.
pub fn choose<T: Clone>(ui: &mut dyn Prompter, menu: &Menu<T>, fallback: T) -> T {
    if menu.choices.is_empty() {
        return fallback;
    }
    match ui.select(&menu.title, &menu.labels(), menu.default) {
        Some(index) => menu.resolve(index).unwrap_or(fallback),
        None => menu.escape_value().unwrap_or(fallback),
    }
}

/// Interactive prompts on the terminal.
///
/// While a prompt owns the terminal, Ctrl-C arrives as an interrupted read
/// rather than a signal; it dismisses the prompt and cancels the session.
#[derive(Debug)]
pub struct TerminalPrompter {
    cancel: CancelToken,
}

impl TerminalPrompter {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }

    /// Answer of a prompt, `None` when dismissed, interrupted or broken.
    fn settle<T>(&self, answer: dialoguer::Result<Option<T>>) -> Option<T> {
        match answer {
            Ok(answer) => answer,
            Err(dialoguer::Error::IO(e)) if e.kind() == io::ErrorKind::Interrupted => {
                warn!("interrupt at a prompt, saving state");
                eprintln!("\nInterrupted: saving state before exit...");
                self.cancel.cancel();
                None
            }
            Err(e) => {
                warn!(error = %e, "prompt failed, treating it as dismissed");
                None
            }
        }
    }
}

impl Prompter for TerminalPrompter {
    fn select(&mut self, title: &str, labels: &[String], default: usize) -> Option<usize> {
        self.settle(
            Select::new()
                .with_prompt(title)
                .items(labels)
                .default(default)
                .interact_opt(),
        )
    }

    fn input(&mut self, prompt: &str) -> Option<String> {
        let answer: String = self.settle(
            Input::new()
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()
                .map(Some),
        )?;
        let answer = answer.trim();
        (!answer.is_empty()).then(|| answer.to_string())
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> bool {
        self.settle(
            Confirm::new()
                .with_prompt(prompt)
                .default(default)
                .interact_opt(),
        )
        .unwrap_or(false)
    }
}

/// Takes every default without asking.
#[derive(Debug, Default)]
pub struct AutoPrompter;

impl Prompter for AutoPrompter {
    fn select(&mut self, title: &str, labels: &[String], default: usize) -> Option<usize> {
        if let Some(label) = labels.get(default) {
            info!(title, choice = label.as_str(), "automatic mode: taking default");
        }
        Some(default)
    }

    fn input(&mut self, prompt: &str) -> Option<String> {
        info!(prompt, "automatic mode: no input");
        None
    }

    fn confirm(&mut self, _prompt: &str, default: bool) -> bool {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Pick {
        A,
        B,
        C,
    }

    struct Fixed(Option<usize>);

    impl Prompter for Fixed {
        fn select(&mut self, _: &str, _: &[String], _: usize) -> Option<usize> {
            self.0
        }
        fn input(&mut self, _: &str) -> Option<String> {
            None
        }
        fn confirm(&mut self, _: &str, default: bool) -> bool {
            default
        }
    }

    fn menu() -> Menu<Pick> {
        Menu::new("pick one")
            .choice("first", Pick::A)
            .choice("second", Pick::B)
            .as_default()
            .choice("third", Pick::C)
    }

    #[test]
    fn default_marks_previous_choice() {
        assert_eq!(menu().default, 1);
        assert_eq!(menu().default_value(), Some(Pick::B));
    }

    #[test]
    fn auto_prompter_takes_default() {
        assert_eq!(choose(&mut AutoPrompter, &menu(), Pick::A), Pick::B);
    }

    #[test]
    fn out_of_range_falls_back_to_default() {
        assert_eq!(choose(&mut Fixed(Some(9)), &menu(), Pick::A), Pick::B);
        assert_eq!(choose(&mut Fixed(Some(2)), &menu(), Pick::A), Pick::C);
    }

    #[test]
    fn empty_menu_yields_fallback() {
        let empty: Menu<Pick> = Menu::new("nothing");
        assert_eq!(choose(&mut Fixed(Some(0)), &empty, Pick::C), Pick::C);
    }

    #[test]
    fn dismissal_takes_the_escape_choice_not_the_default() {
        let escaping = menu().as_escape();
        assert_eq!(escaping.escape_value(), Some(Pick::C));
        assert_eq!(choose(&mut Fixed(None), &escaping, Pick::B), Pick::C);
        // no escape choice: the caller's fallback
        assert_eq!(choose(&mut Fixed(None), &menu(), Pick::A), Pick::A);
    }

    #[test]
    fn interrupted_prompt_cancels_the_session() {
        let token = CancelToken::new();
        let prompter = TerminalPrompter::new(token.clone());
        let interrupted = io::Error::from(io::ErrorKind::Interrupted);
        assert_eq!(prompter.settle::<usize>(Err(interrupted.into())), None);
        assert!(token.is_cancelled());
    }

    #[test]
    fn escape_and_broken_terminals_do_not_cancel() {
        let token = CancelToken::new();
        let prompter = TerminalPrompter::new(token.clone());
        assert_eq!(prompter.settle::<usize>(Ok(None)), None);
        assert_eq!(prompter.settle(Ok(Some(2))), Some(2));
        let broken = io::Error::from(io::ErrorKind::NotConnected);
        assert_eq!(prompter.settle::<bool>(Err(broken.into())), None);
        assert!(!token.is_cancelled());
    }
}

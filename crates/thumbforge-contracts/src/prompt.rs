use crate::answers::FormAnswers;

pub const CLOSING_CLAUSE: &str =
    "16:9 thumbnail composition, high contrast, no watermarks, suitable for social/YouTube.";
pub const REFERENCE_CLAUSE: &str = "Use the uploaded reference image as visual guidance.";
pub const NO_OVERLAY_CLAUSE: &str = "No text overlay.";

/// Builds the descriptive prompt for a set of guided answers.
pub fn compose_prompt(answers: &FormAnswers, has_reference: bool) -> String {
    let mut clauses = vec![
        format!("Category: {}.", answers.category_value()),
        format!("Style: {}.", answers.style_value()),
        format!("Colors/Vibe: {}.", answers.vibe_value()),
    ];
    match answers.overlay() {
        Some(text) => clauses.push(format!("Include text overlay: \"{text}\".")),
        None => clauses.push(NO_OVERLAY_CLAUSE.to_string()),
    }
    if has_reference {
        clauses.push(REFERENCE_CLAUSE.to_string());
    }
    clauses.push(CLOSING_CLAUSE.to_string());
    clauses.join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Text follows the guided answers.
    Derived,
    /// The user typed into the prompt; derivation is suspended until resync.
    Overridden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptState {
    text: String,
    mode: PromptMode,
}

impl PromptState {
    pub fn derived(answers: &FormAnswers, has_reference: bool) -> Self {
        Self {
            text: compose_prompt(answers, has_reference),
            mode: PromptMode::Derived,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> PromptMode {
        self.mode
    }

    pub fn is_overridden(&self) -> bool {
        self.mode == PromptMode::Overridden
    }

    /// Recomputes the text from the answers unless the user has overridden it.
    /// Returns whether the text was touched.
    pub fn refresh(&mut self, answers: &FormAnswers, has_reference: bool) -> bool {
        if self.mode == PromptMode::Overridden {
            return false;
        }
        self.text = compose_prompt(answers, has_reference);
        true
    }

    /// A direct edit always flips to `Overridden`, even if the new text happens
    /// to equal the derived one.
    pub fn edit(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.mode = PromptMode::Overridden;
    }

    /// Replaces the text without touching the mode.
    pub fn load(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn resync(&mut self, answers: &FormAnswers, has_reference: bool) {
        self.mode = PromptMode::Derived;
        self.text = compose_prompt(answers, has_reference);
    }

    /// The prompt that would be submitted, `None` when blank.
    pub fn effective(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

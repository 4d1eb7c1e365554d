use serde::{Deserialize, Serialize};

/// A multiple-choice field with one escape option that defers to free text.
pub trait GuidedChoice: Copy + PartialEq + Sized + 'static {
    const ALL: &'static [Self];
    const ESCAPE: Self;

    fn label(self) -> &'static str;

    fn is_escape(self) -> bool {
        self == Self::ESCAPE
    }

    fn parse(raw: &str) -> Option<Self> {
        let wanted = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|choice| choice.label().eq_ignore_ascii_case(wanted))
    }

    fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|choice| choice.label()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Gaming,
    Tech,
    Education,
    Vlog,
    Cooking,
    Fitness,
    Finance,
    Travel,
    Music,
    Other,
}

impl GuidedChoice for Category {
    const ALL: &'static [Self] = &[
        Self::Gaming,
        Self::Tech,
        Self::Education,
        Self::Vlog,
        Self::Cooking,
        Self::Fitness,
        Self::Finance,
        Self::Travel,
        Self::Music,
        Self::Other,
    ];
    const ESCAPE: Self = Self::Other;

    fn label(self) -> &'static str {
        match self {
            Self::Gaming => "Gaming",
            Self::Tech => "Tech",
            Self::Education => "Education",
            Self::Vlog => "Vlog",
            Self::Cooking => "Cooking",
            Self::Fitness => "Fitness",
            Self::Finance => "Finance",
            Self::Travel => "Travel",
            Self::Music => "Music",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Style {
    Minimal,
    Bold,
    Cinematic,
    Cartoon,
    Photorealistic,
    Retro,
    Custom,
}

impl GuidedChoice for Style {
    const ALL: &'static [Self] = &[
        Self::Minimal,
        Self::Bold,
        Self::Cinematic,
        Self::Cartoon,
        Self::Photorealistic,
        Self::Retro,
        Self::Custom,
    ];
    const ESCAPE: Self = Self::Custom;

    fn label(self) -> &'static str {
        match self {
            Self::Minimal => "Minimal",
            Self::Bold => "Bold",
            Self::Cinematic => "Cinematic",
            Self::Cartoon => "Cartoon",
            Self::Photorealistic => "Photorealistic",
            Self::Retro => "Retro",
            Self::Custom => "Custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vibe {
    Bright,
    Dark,
    Pastel,
    Neon,
    Warm,
    Cool,
    Custom,
}

impl GuidedChoice for Vibe {
    const ALL: &'static [Self] = &[
        Self::Bright,
        Self::Dark,
        Self::Pastel,
        Self::Neon,
        Self::Warm,
        Self::Cool,
        Self::Custom,
    ];
    const ESCAPE: Self = Self::Custom;

    fn label(self) -> &'static str {
        match self {
            Self::Bright => "Bright",
            Self::Dark => "Dark",
            Self::Pastel => "Pastel",
            Self::Neon => "Neon",
            Self::Warm => "Warm",
            Self::Cool => "Cool",
            Self::Custom => "Custom",
        }
    }
}

/// Guided answers used to derive a prompt.
///
/// The `custom_*` fields are only read while the matching choice sits on its
/// escape value, but they are kept when the user switches away so that
/// switching back restores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormAnswers {
    pub category: Category,
    pub custom_category: String,
    pub style: Style,
    pub custom_style: String,
    pub vibe: Vibe,
    pub custom_vibe: String,
    pub text_overlay: String,
}

impl Default for FormAnswers {
    fn default() -> Self {
        Self {
            category: Category::Tech,
            custom_category: String::new(),
            style: Style::Minimal,
            custom_style: String::new(),
            vibe: Vibe::Bright,
            custom_vibe: String::new(),
            text_overlay: String::new(),
        }
    }
}

impl FormAnswers {
    pub fn category_value(&self) -> String {
        resolve_choice(self.category, &self.custom_category)
    }

    pub fn style_value(&self) -> String {
        resolve_choice(self.style, &self.custom_style)
    }

    pub fn vibe_value(&self) -> String {
        resolve_choice(self.vibe, &self.custom_vibe)
    }

    /// Trimmed overlay text, `None` when blank.
    pub fn overlay(&self) -> Option<&str> {
        let trimmed = self.text_overlay.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Label of `choice`, or the free-text override when `choice` is the escape
/// value. A blank override falls back to the escape label itself.
pub fn resolve_choice<C: GuidedChoice>(choice: C, custom: &str) -> String {
    if !choice.is_escape() {
        return choice.label().to_string();
    }
    let trimmed = custom.trim();
    if trimmed.is_empty() {
        choice.label().to_string()
    } else {
        trimmed.to_string()
    }
}

pub mod bank;
pub mod classifier;
pub mod progress;

use std::{collections::BTreeMap, fmt};

/// Question id -> chosen dosha label, one entry per answered question.
///
/// Values are kept as plain strings: whatever the quiz flow recorded is what
/// gets scored and persisted, recognized label or not.
pub type AnswerMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Dosha {
    Vata,
    Pitta,
    Kapha,
}

impl Dosha {
    /// Fixed priority order. When two doshas score the same, the one listed
    /// first ranks higher.
    pub const ALL: [Dosha; 3] = [Dosha::Vata, Dosha::Pitta, Dosha::Kapha];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dosha::Vata => "Vata",
            Dosha::Pitta => "Pitta",
            Dosha::Kapha => "Kapha",
        }
    }

    /// Exact match against the three labels, anything else is `None`.
    pub fn from_label(label: &str) -> Option<Dosha> {
        Dosha::ALL.into_iter().find(|dosha| dosha.as_str() == label)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Dosha::Vata => "Air and space. Quick, creative and light on your feet, but prone to restlessness, dryness and irregular routines.",
            Dosha::Pitta => "Fire and water. Focused, driven and warm, but prone to irritability, overheating and inflammation.",
            Dosha::Kapha => "Earth and water. Calm, steady and strong, but prone to sluggishness, heaviness and congestion.",
        }
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Dosha::Vata => &[
                "Keep regular meal and sleep times",
                "Favour warm, moist, grounding foods",
                "Choose gentle yoga and oil massage",
            ],
            Dosha::Pitta => &[
                "Avoid skipping meals and very spicy food",
                "Favour cooling foods such as cucumber and coconut",
                "Exercise in the cooler parts of the day",
            ],
            Dosha::Kapha => &[
                "Get up early and keep active every day",
                "Favour light, warm and spiced meals",
                "Try vigorous exercise and new routines",
            ],
        }
    }
}

impl fmt::Display for Dosha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub id: &'static str,
    pub category: &'static str,
    pub text: &'static str,
    pub options: [QuizOption; 3],
}

impl Question {
    pub const fn new(
        id: &'static str,
        category: &'static str,
        text: &'static str,
        options: [QuizOption; 3],
    ) -> Self {
        Self {
            id,
            category,
            text,
            options,
        }
    }

    /// The option whose text is `text`, ignoring surrounding whitespace.
    pub fn option_for(&self, text: &str) -> Option<&QuizOption> {
        let text = text.trim();
        self.options.iter().find(|option| option.text == text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOption {
    pub text: &'static str,
    pub dosha: Dosha,
}

impl QuizOption {
    pub const fn new(text: &'static str, dosha: Dosha) -> Self {
        Self { text, dosha }
    }
}

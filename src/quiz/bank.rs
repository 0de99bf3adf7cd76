use super::{Dosha, Question, QuizOption};

/// The ordered catalog a quiz is played and scored against.
#[derive(Debug, Clone, Copy)]
pub struct QuestionBank {
    questions: &'static [Question],
}

impl QuestionBank {
    pub const fn new(questions: &'static [Question]) -> Self {
        Self { questions }
    }

    pub fn prakriti() -> Self {
        Self::new(PRAKRITI_QUESTIONS)
    }

    pub fn questions(&self) -> &'static [Question] {
        self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'static Question> {
        self.questions.get(index)
    }

    #[cfg(test)]
    pub fn find(&self, id: &str) -> Option<&'static Question> {
        self.questions.iter().find(|question| question.id == id)
    }
}

const fn options(vata: &'static str, pitta: &'static str, kapha: &'static str) -> [QuizOption; 3] {
    [
        QuizOption::new(vata, Dosha::Vata),
        QuizOption::new(pitta, Dosha::Pitta),
        QuizOption::new(kapha, Dosha::Kapha),
    ]
}

pub static PRAKRITI_QUESTIONS: &[Question] = &[
    Question::new(
        "q1",
        "Body Frame",
        "How would you describe your body frame?",
        options(
            "Thin, light, hard to gain weight",
            "Medium, athletic, well proportioned",
            "Broad, solid, gains weight easily",
        ),
    ),
    Question::new(
        "q2",
        "Skin",
        "What is your skin usually like?",
        options(
            "Dry, rough, cool to the touch",
            "Warm, oily, prone to redness",
            "Thick, smooth, moist and cool",
        ),
    ),
    Question::new(
        "q3",
        "Hair",
        "Which best describes your hair?",
        options(
            "Dry, frizzy or brittle",
            "Fine, straight, early greying or thinning",
            "Thick, wavy, lustrous",
        ),
    ),
    Question::new(
        "q4",
        "Appetite",
        "How is your appetite?",
        options(
            "Irregular, sometimes I forget to eat",
            "Strong, I get irritable when I miss a meal",
            "Steady, I can skip meals without trouble",
        ),
    ),
    Question::new(
        "q5",
        "Digestion",
        "How does your digestion usually behave?",
        options(
            "Variable, with gas or bloating",
            "Quick, sometimes with acidity or heartburn",
            "Slow, I feel heavy after meals",
        ),
    ),
    Question::new(
        "q6",
        "Sleep",
        "How do you sleep?",
        options(
            "Light and interrupted, I wake easily",
            "Moderate and sound, around 6 to 8 hours",
            "Deep and long, hard to wake up",
        ),
    ),
    Question::new(
        "q7",
        "Temperament",
        "How do you tend to react under pressure?",
        options(
            "Anxious and worried",
            "Irritable and impatient",
            "Calm, sometimes withdrawn",
        ),
    ),
    Question::new(
        "q8",
        "Memory",
        "How does your memory work?",
        options(
            "Learn quickly, forget quickly",
            "Sharp and precise",
            "Slow to learn, never forget",
        ),
    ),
    Question::new(
        "q9",
        "Speech",
        "How would others describe the way you speak?",
        options(
            "Fast and talkative, I jump between topics",
            "Clear, direct and persuasive",
            "Slow, soft and deliberate",
        ),
    ),
    Question::new(
        "q10",
        "Climate",
        "Which weather bothers you most?",
        options(
            "Cold, dry and windy days",
            "Hot and humid days",
            "Cold, damp and cloudy days",
        ),
    ),
    Question::new(
        "q11",
        "Energy",
        "What are your energy levels like?",
        options(
            "Comes in bursts, then I crash",
            "Strong and well directed",
            "Slow to start, steady endurance",
        ),
    ),
    Question::new(
        "q12",
        "Stress Response",
        "When things go wrong, you usually...",
        options(
            "Overthink and lose sleep",
            "Get frustrated and push harder",
            "Avoid it and hope it passes",
        ),
    ),
];

use rand::seq::SliceRandom;

use super::{bank::QuestionBank, AnswerMap, Dosha, Question, QuizOption};

/// Where a chat is in the questionnaire, kept in the dialogue storage
/// between messages.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QuizProgress {
    position: usize,
    answers: AnswerMap,
    // Display order of each question's options, indexes into `Question::options`
    option_order: Vec<[usize; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizStep {
    Recorded(Dosha),
    Unrecognized,
}

impl QuizProgress {
    pub fn new(bank: &QuestionBank, shuffle: bool) -> Self {
        let mut rng = rand::thread_rng();
        let option_order = (0..bank.len())
            .map(|_| {
                let mut order = [0, 1, 2];
                if shuffle {
                    order.shuffle(&mut rng);
                }
                order
            })
            .collect();

        Self {
            position: 0,
            answers: AnswerMap::new(),
            option_order,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn into_answers(self) -> AnswerMap {
        self.answers
    }

    pub fn current(&self, bank: &QuestionBank) -> Option<&'static Question> {
        bank.get(self.position)
    }

    pub fn is_complete(&self, bank: &QuestionBank) -> bool {
        self.position >= bank.len()
    }

    /// Options of the current question in the order they are shown.
    pub fn current_options(&self, bank: &QuestionBank) -> Vec<&'static QuizOption> {
        let Some(question) = self.current(bank) else {
            return Vec::new();
        };
        let order = self
            .option_order
            .get(self.position)
            .copied()
            .unwrap_or([0, 1, 2]);
        order.iter().map(|&i| &question.options[i]).collect()
    }

    /// Records the chosen option for the current question and moves on.
    /// Text that is not one of the current options leaves everything as is.
    pub fn answer(&mut self, bank: &QuestionBank, text: &str) -> QuizStep {
        let Some(question) = self.current(bank) else {
            return QuizStep::Unrecognized;
        };
        match question.option_for(text) {
            Some(option) => {
                self.answers
                    .insert(question.id.to_string(), option.dosha.as_str().to_string());
                self.position += 1;
                QuizStep::Recorded(option.dosha)
            }
            None => QuizStep::Unrecognized,
        }
    }

    /// Steps back one question. Returns false when already at the first one.
    pub fn back(&mut self) -> bool {
        if self.position == 0 {
            return false;
        }
        self.position -= 1;
        true
    }

    /// The answer previously given to the current question, if any.
    pub fn previous_answer(&self, bank: &QuestionBank) -> Option<&str> {
        let question = self.current(bank)?;
        self.answers.get(question.id).map(String::as_str)
    }

    pub fn progress_label(&self, bank: &QuestionBank) -> String {
        format!(
            "Question {} of {}",
            (self.position + 1).min(bank.len()),
            bank.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(progress: &QuizProgress, bank: &QuestionBank, dosha: Dosha) -> &'static str {
        progress
            .current_options(bank)
            .into_iter()
            .find(|option| option.dosha == dosha)
            .map(|option| option.text)
            .unwrap()
    }

    #[test]
    fn answering_advances_and_records_label() {
        let bank = QuestionBank::prakriti();
        let mut progress = QuizProgress::new(&bank, false);
        assert_eq!(progress.progress_label(&bank), "Question 1 of 12");

        let text = pick(&progress, &bank, Dosha::Pitta);
        assert_eq!(progress.answer(&bank, text), QuizStep::Recorded(Dosha::Pitta));
        assert_eq!(progress.position(), 1);
        assert_eq!(progress.answers().get("q1").map(String::as_str), Some("Pitta"));
        assert_eq!(progress.progress_label(&bank), "Question 2 of 12");
    }

    #[test]
    fn unknown_text_does_not_move() {
        let bank = QuestionBank::prakriti();
        let mut progress = QuizProgress::new(&bank, false);
        assert_eq!(progress.answer(&bank, "Something else"), QuizStep::Unrecognized);
        assert_eq!(progress.position(), 0);
        assert!(progress.answers().is_empty());

        // an option of another question is not accepted either
        let other = bank.get(1).unwrap().options[0].text;
        assert_eq!(progress.answer(&bank, other), QuizStep::Unrecognized);
    }

    #[test]
    fn back_keeps_answer_until_overwritten() {
        let bank = QuestionBank::prakriti();
        let mut progress = QuizProgress::new(&bank, false);
        assert!(!progress.back());

        let text = pick(&progress, &bank, Dosha::Vata);
        progress.answer(&bank, text);
        assert!(progress.back());
        assert_eq!(progress.position(), 0);
        assert_eq!(progress.previous_answer(&bank), Some("Vata"));

        let text = pick(&progress, &bank, Dosha::Kapha);
        progress.answer(&bank, text);
        assert_eq!(progress.answers().len(), 1);
        assert_eq!(progress.answers().get("q1").map(String::as_str), Some("Kapha"));
    }

    #[test]
    fn completes_after_last_question() {
        let bank = QuestionBank::prakriti();
        let mut progress = QuizProgress::new(&bank, true);
        while !progress.is_complete(&bank) {
            let text = pick(&progress, &bank, Dosha::Kapha);
            assert!(matches!(progress.answer(&bank, text), QuizStep::Recorded(Dosha::Kapha)));
        }
        assert!(progress.current(&bank).is_none());
        assert!(progress.current_options(&bank).is_empty());
        assert_eq!(progress.answer(&bank, "anything"), QuizStep::Unrecognized);
        assert_eq!(progress.progress_label(&bank), "Question 12 of 12");
        assert_eq!(progress.into_answers().len(), 12);
    }

    #[test]
    fn shuffled_order_is_a_permutation() {
        let bank = QuestionBank::prakriti();
        let progress = QuizProgress::new(&bank, true);
        let mut texts: Vec<&str> = progress.current_options(&bank).iter().map(|o| o.text).collect();
        texts.sort();
        let mut expected: Vec<&str> = bank.get(0).unwrap().options.iter().map(|o| o.text).collect();
        expected.sort();
        assert_eq!(texts, expected);
    }

    #[test]
    fn survives_dialogue_serialization() {
        let bank = QuestionBank::prakriti();
        let mut progress = QuizProgress::new(&bank, true);
        let text = pick(&progress, &bank, Dosha::Vata);
        progress.answer(&bank, text);

        let json = serde_json::to_string(&progress).unwrap();
        let restored: QuizProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.position(), 1);
        assert_eq!(restored.answers(), progress.answers());
        assert_eq!(restored.current_options(&bank), progress.current_options(&bank));
    }
}

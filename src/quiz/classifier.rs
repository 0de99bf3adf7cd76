//! Tally-and-threshold classification of a completed Prakriti quiz.

use std::fmt;

use super::{AnswerMap, Dosha};

/// Dominant and secondary within this many percentage points make a dual type.
pub const DUAL_THRESHOLD: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constitution {
    Single(Dosha),
    Dual(Dosha, Dosha),
}

impl fmt::Display for Constitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constitution::Single(dosha) => write!(f, "{}", dosha),
            Constitution::Dual(first, second) => write!(f, "{}-{}", first, second),
        }
    }
}

impl From<Constitution> for String {
    fn from(constitution: Constitution) -> Self {
        constitution.to_string()
    }
}

impl TryFrom<String> for Constitution {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parse = |label: &str| {
            Dosha::from_label(label).ok_or_else(|| format!("unknown dosha '{}'", label))
        };
        match value.split_once('-') {
            Some((first, second)) => Ok(Constitution::Dual(parse(first)?, parse(second)?)),
            None => Ok(Constitution::Single(parse(&value)?)),
        }
    }
}

impl serde::Serialize for Constitution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Constitution {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Constitution::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// Raw per-dosha answer counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreTriple {
    pub vata: usize,
    pub pitta: usize,
    pub kapha: usize,
}

impl ScoreTriple {
    /// Counts recognized labels; anything else is skipped.
    pub fn tally<'a>(labels: impl IntoIterator<Item = &'a String>) -> Self {
        let mut scores = Self::default();
        for label in labels {
            match Dosha::from_label(label) {
                Some(Dosha::Vata) => scores.vata += 1,
                Some(Dosha::Pitta) => scores.pitta += 1,
                Some(Dosha::Kapha) => scores.kapha += 1,
                None => {}
            }
        }
        scores
    }

    pub fn count(&self, dosha: Dosha) -> usize {
        match dosha {
            Dosha::Vata => self.vata,
            Dosha::Pitta => self.pitta,
            Dosha::Kapha => self.kapha,
        }
    }
}

/// round(count / total * 100), halves rounded up.
fn percentage(count: usize, total: usize) -> u8 {
    ((200 * count + total) / (2 * total)) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PrakritiResult {
    pub vata: u8,
    pub pitta: u8,
    pub kapha: u8,
    pub dominant: Dosha,
    pub secondary: Dosha,
    pub constitution: Constitution,
}

impl PrakritiResult {
    /// What an empty answer map classifies as.
    pub const EMPTY: PrakritiResult = PrakritiResult {
        vata: 0,
        pitta: 0,
        kapha: 0,
        dominant: Dosha::Vata,
        secondary: Dosha::Pitta,
        constitution: Constitution::Single(Dosha::Vata),
    };

    pub fn percentage(&self, dosha: Dosha) -> u8 {
        match dosha {
            Dosha::Vata => self.vata,
            Dosha::Pitta => self.pitta,
            Dosha::Kapha => self.kapha,
        }
    }

    pub fn is_dual(&self) -> bool {
        matches!(self.constitution, Constitution::Dual(..))
    }
}

pub fn classify(answers: &AnswerMap) -> PrakritiResult {
    if answers.is_empty() {
        return PrakritiResult::EMPTY;
    }

    let scores = ScoreTriple::tally(answers.values());
    // Unrecognized entries still count towards the denominator.
    let total = answers.len();
    let percent = |dosha: Dosha| percentage(scores.count(dosha), total);

    // sort_by is stable, so equal percentages keep the Dosha::ALL order
    let mut ranked = Dosha::ALL;
    ranked.sort_by(|a, b| percent(*b).cmp(&percent(*a)));
    let (dominant, secondary) = (ranked[0], ranked[1]);

    let constitution = if percent(dominant) - percent(secondary) <= DUAL_THRESHOLD {
        Constitution::Dual(dominant, secondary)
    } else {
        Constitution::Single(dominant)
    };

    PrakritiResult {
        vata: percent(Dosha::Vata),
        pitta: percent(Dosha::Pitta),
        kapha: percent(Dosha::Kapha),
        dominant,
        secondary,
        constitution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(labels: &[&str]) -> AnswerMap {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| (format!("q{}", i + 1), label.to_string()))
            .collect()
    }

    fn repeated(counts: &[(&str, usize)]) -> AnswerMap {
        let labels: Vec<&str> = counts
            .iter()
            .flat_map(|(label, n)| std::iter::repeat(*label).take(*n))
            .collect();
        answers(&labels)
    }

    #[test]
    fn empty_map_gives_fixed_default() {
        let result = classify(&AnswerMap::new());
        assert_eq!(result, PrakritiResult::EMPTY);
        assert_eq!((result.vata, result.pitta, result.kapha), (0, 0, 0));
        assert_eq!(result.dominant, Dosha::Vata);
        assert_eq!(result.secondary, Dosha::Pitta);
        assert_eq!(result.constitution.to_string(), "Vata");
    }

    #[test]
    fn clear_vata_majority() {
        let result = classify(&answers(&["Vata", "Vata", "Pitta", "Kapha"]));
        assert_eq!((result.vata, result.pitta, result.kapha), (50, 25, 25));
        assert_eq!(result.dominant, Dosha::Vata);
        // Pitta and Kapha tie, Pitta comes first in the priority order
        assert_eq!(result.secondary, Dosha::Pitta);
        assert_eq!(result.constitution, Constitution::Single(Dosha::Vata));
    }

    #[test]
    fn two_way_tie_is_dual_in_priority_order() {
        let result = classify(&answers(&["Vata", "Pitta"]));
        assert_eq!((result.vata, result.pitta, result.kapha), (50, 50, 0));
        assert_eq!(result.constitution.to_string(), "Vata-Pitta");

        let result = classify(&answers(&["Kapha", "Pitta"]));
        assert_eq!(result.dominant, Dosha::Pitta);
        assert_eq!(result.secondary, Dosha::Kapha);
        assert_eq!(result.constitution.to_string(), "Pitta-Kapha");

        let result = classify(&answers(&["Kapha", "Vata"]));
        assert_eq!(result.constitution.to_string(), "Vata-Kapha");
    }

    #[test]
    fn three_way_tie_is_reproducible() {
        let map = answers(&["Kapha", "Pitta", "Vata"]);
        for _ in 0..10 {
            let result = classify(&map);
            assert_eq!((result.vata, result.pitta, result.kapha), (33, 33, 33));
            assert_eq!(result.dominant, Dosha::Vata);
            assert_eq!(result.secondary, Dosha::Pitta);
            assert_eq!(result.constitution.to_string(), "Vata-Pitta");
        }
    }

    #[test]
    fn dual_boundary_is_inclusive_at_five_points() {
        // 8/20 = 40%, 7/20 = 35%: difference of exactly 5
        let result = classify(&repeated(&[("Kapha", 8), ("Pitta", 7), ("Vata", 5)]));
        assert_eq!((result.vata, result.pitta, result.kapha), (25, 35, 40));
        assert_eq!(result.constitution.to_string(), "Kapha-Pitta");

        // 53/100 vs 47/100: difference of 6
        let result = classify(&repeated(&[("Pitta", 53), ("Vata", 47)]));
        assert_eq!((result.pitta, result.vata), (53, 47));
        assert_eq!(result.constitution, Constitution::Single(Dosha::Pitta));
    }

    #[test]
    fn percentages_match_rounded_ratio() {
        for (v, p, k) in [(1, 1, 1), (5, 4, 3), (7, 0, 1), (2, 9, 1), (0, 0, 12)] {
            let map = repeated(&[("Vata", v), ("Pitta", p), ("Kapha", k)]);
            let total = (v + p + k) as f64;
            let result = classify(&map);
            for (dosha, count) in [(Dosha::Vata, v), (Dosha::Pitta, p), (Dosha::Kapha, k)] {
                let expected = (count as f64 / total * 100.0).round() as u8;
                assert!(result.percentage(dosha) <= 100);
                assert_eq!(result.percentage(dosha), expected, "{:?} of {:?}", dosha, (v, p, k));
            }
        }
    }

    #[test]
    fn halves_round_up() {
        // 1/8 = 12.5%
        let result = classify(&repeated(&[("Vata", 1), ("Pitta", 7)]));
        assert_eq!(result.vata, 13);
        assert_eq!(result.pitta, 88);
    }

    #[test]
    fn unrecognized_values_only_count_in_denominator() {
        let result = classify(&answers(&["Vata", "Pitta", "Kapha", "vata", "Unknown"]));
        assert_eq!((result.vata, result.pitta, result.kapha), (20, 20, 20));
        let sum = result.vata as u32 + result.pitta as u32 + result.kapha as u32;
        assert!(sum < 100);
        assert_eq!(result.constitution.to_string(), "Vata-Pitta");

        let result = classify(&answers(&["nonsense"]));
        assert_eq!((result.vata, result.pitta, result.kapha), (0, 0, 0));
        assert_eq!(result.dominant, Dosha::Vata);
        assert_eq!(result.constitution.to_string(), "Vata-Pitta");
    }

    #[test]
    fn rounded_percentages_may_exceed_one_hundred() {
        // 3/8 = 37.5 twice, both round up
        let result = classify(&repeated(&[("Vata", 3), ("Pitta", 3), ("Kapha", 2)]));
        assert_eq!((result.vata, result.pitta, result.kapha), (38, 38, 25));
    }

    #[test]
    fn constitution_serializes_as_label() {
        let dual = Constitution::Dual(Dosha::Pitta, Dosha::Kapha);
        assert_eq!(serde_json::to_string(&dual).unwrap(), "\"Pitta-Kapha\"");
        let parsed: Constitution = serde_json::from_str("\"Vata\"").unwrap();
        assert_eq!(parsed, Constitution::Single(Dosha::Vata));
        assert!(serde_json::from_str::<Constitution>("\"Air-Fire\"").is_err());
    }
}

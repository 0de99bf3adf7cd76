use std::{fmt, sync::LazyLock};

use regex::Regex;

use super::InputError;

/// Digits plus the separators people type between them.
static PHONE_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9 .()\-]*$").expect("static regex"));

/// Country calling codes the number is split on. Longest prefix wins.
const CALLING_CODES: &[&str] = &[
    "1", "7", "20", "27", "30", "31", "32", "33", "34", "36", "39", "40", "41", "43", "44", "45",
    "46", "47", "48", "49", "52", "55", "60", "61", "62", "63", "64", "65", "66", "81", "82",
    "84", "86", "90", "91", "92", "94", "351", "353", "880", "971", "972", "974", "977",
];

/// A validated phone number. Stored as calling code plus national digits;
/// `e164()` is the canonical form handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    calling_code: &'static str,
    national: String,
}

impl PhoneNumber {
    /// Parses what a user typed. Numbers without a `+` or `00` prefix are
    /// treated as national numbers of `default_calling_code`.
    pub fn parse(input: &str, default_calling_code: Option<&str>) -> Result<Self, InputError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(InputError::EmptyPhone);
        }

        let (international, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        if !PHONE_INPUT.is_match(rest) {
            return Err(InputError::InvalidPhoneCharacters);
        }
        let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(InputError::EmptyPhone);
        }

        let full = if international {
            digits
        } else if let Some(rest) = digits.strip_prefix("00") {
            rest.to_string()
        } else {
            let code = default_calling_code.ok_or(InputError::UnknownCallingCode)?;
            // trunk prefix, e.g. 0 20 7946 0958 in the UK
            let national = digits.strip_prefix('0').unwrap_or(&digits);
            format!("{}{}", code, national)
        };

        Self::from_international_digits(&full)
    }

    fn from_international_digits(digits: &str) -> Result<Self, InputError> {
        if !(8..=15).contains(&digits.len()) || digits.starts_with('0') {
            return Err(InputError::InvalidPhoneLength);
        }

        let calling_code = CALLING_CODES
            .iter()
            .filter(|code| digits.starts_with(**code))
            .max_by_key(|code| code.len())
            .copied()
            .ok_or(InputError::UnknownCallingCode)?;
        let national = &digits[calling_code.len()..];

        let valid = match calling_code {
            "1" => national.len() == 10 && !national.starts_with(&['0', '1'][..]),
            "44" => national.len() == 10,
            "91" => national.len() == 10 && national.starts_with(&['6', '7', '8', '9'][..]),
            _ => national.len() >= 4,
        };
        if !valid {
            return Err(InputError::InvalidPhoneLength);
        }

        Ok(Self {
            calling_code,
            national: national.to_string(),
        })
    }

    pub fn calling_code(&self) -> &str {
        self.calling_code
    }

    pub fn national(&self) -> &str {
        &self.national
    }

    pub fn e164(&self) -> String {
        format!("+{}{}", self.calling_code, self.national)
    }
}

/// Grouped for reading back to the user, e.g. `+91 98765 43210`.
impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.national();
        match (self.calling_code(), n.len()) {
            ("1", 10) => write!(f, "+1 ({}) {}-{}", &n[..3], &n[3..6], &n[6..]),
            ("91", 10) => write!(f, "+91 {} {}", &n[..5], &n[5..]),
            ("44", 10) => write!(f, "+44 {} {}", &n[..4], &n[4..]),
            (code, _) => write!(f, "+{} {}", code, n),
        }
    }
}

//! # Courier Types
//!
//! Small validated value types shared by the courier crates.
//!
//! - [`VisibleText`]: message text that renders at least one visible character
//! - [`PhoneNumber`]: an E.164 phone number with a display form for inbox headings

use std::fmt;

/// Errors produced when validating message text.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    #[error("text has no visible characters")]
    NoVisibleContent,
}

/// Message text that renders at least one visible character.
///
/// Whitespace, control characters and zero-width formatting characters do not count as
/// visible. The text is kept as given; line breaks and indentation are preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleText(String);

impl VisibleText {
    pub fn new(text: impl Into<String>) -> Result<Self, TextError> {
        let text = text.into();
        if text.chars().any(is_visible) {
            Ok(Self(text))
        } else {
            Err(TextError::NoVisibleContent)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_visible(c: char) -> bool {
    !c.is_whitespace()
        && !c.is_control()
        && !matches!(c, '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

impl fmt::Display for VisibleText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors produced when parsing a [`PhoneNumber`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhoneNumberError {
    #[error("phone number contains invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("phone number must have between 8 and 15 digits, got {0}")]
    InvalidLength(usize),
}

/// A phone number normalised to E.164 (`+<country><national>`).
///
/// Numbers without a leading `+` and exactly ten digits are treated as North American
/// numbers and receive the `+1` country code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parses a phone number, tolerating spaces, dots, dashes and parentheses.
    pub fn parse(input: &str) -> Result<Self, PhoneNumberError> {
        let input = input.trim();
        let (international, rest) = match input.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, input),
        };

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                other => return Err(PhoneNumberError::InvalidCharacter(other)),
            }
        }

        if !international && digits.len() == 10 {
            digits.insert(0, '1');
        }

        if !(8..=15).contains(&digits.len()) {
            return Err(PhoneNumberError::InvalidLength(digits.len()));
        }

        Ok(Self(format!("+{digits}")))
    }

    /// The E.164 form, e.g. `+12068773590`.
    pub fn as_e164(&self) -> &str {
        &self.0
    }

    /// Human-friendly form: `(206) 877-3590` for North American numbers, E.164 otherwise.
    pub fn pretty(&self) -> String {
        match self.0.strip_prefix("+1") {
            Some(national) if national.len() == 10 => format!(
                "({}) {}-{}",
                &national[..3],
                &national[3..6],
                &national[6..]
            ),
            _ => self.0.clone(),
        }
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

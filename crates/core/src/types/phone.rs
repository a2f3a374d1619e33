//! French phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains characters other than digits, separators and a leading +.
    #[error("phone number contains invalid characters")]
    InvalidCharacters,
    /// The digits do not form a French number.
    #[error("phone number must have 10 digits starting with 0, or +33 followed by 9 digits")]
    InvalidFormat,
}

/// A French phone number, normalized to ten digits (`0612345678`).
///
/// Accepted inputs: `06 12 34 56 78`, `06.12.34.56.78`, `06-12-34-56-78`,
/// `+33 6 12 34 56 78`, `0033612345678`.
///
/// ```
/// use fournil_core::Phone;
///
/// let phone = Phone::parse("+33 6 12 34 56 78").unwrap();
/// assert_eq!(phone.as_str(), "0612345678");
/// assert_eq!(phone.display(), "06 12 34 56 78");
/// assert!(Phone::parse("12345").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Parse and normalize a phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains letters, or does not
    /// form a ten-digit French number.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        let (international, rest) = s
            .strip_prefix('+')
            .map_or((false, s), |rest| (true, rest));

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '.' | '-' => {}
                _ => return Err(PhoneError::InvalidCharacters),
            }
        }

        let national = if international {
            digits.strip_prefix("33").map(|n| format!("0{n}"))
        } else if let Some(n) = digits.strip_prefix("0033") {
            Some(format!("0{n}"))
        } else {
            Some(digits)
        }
        .ok_or(PhoneError::InvalidFormat)?;

        let valid = national.len() == 10
            && national.starts_with('0')
            && national.chars().nth(1).is_some_and(|c| c != '0');
        if !valid {
            return Err(PhoneError::InvalidFormat);
        }

        Ok(Self(national))
    }

    /// Returns the normalized digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number grouped in pairs (`06 12 34 56 78`).
    #[must_use]
    pub fn display(&self) -> String {
        self.0
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Phone {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_national_formats() {
        for input in [
            "0612345678",
            "06 12 34 56 78",
            "06.12.34.56.78",
            "06-12-34-56-78",
        ] {
            assert_eq!(Phone::parse(input).unwrap().as_str(), "0612345678");
        }
    }

    #[test]
    fn test_parse_international_formats() {
        assert_eq!(
            Phone::parse("+33612345678").unwrap().as_str(),
            "0612345678"
        );
        assert_eq!(
            Phone::parse("+33 1 42 00 00 00").unwrap().as_str(),
            "0142000000"
        );
        assert_eq!(
            Phone::parse("0033612345678").unwrap().as_str(),
            "0612345678"
        );
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert_eq!(Phone::parse(""), Err(PhoneError::Empty));
        assert_eq!(Phone::parse("06 12 AB"), Err(PhoneError::InvalidCharacters));
        assert_eq!(Phone::parse("061234567"), Err(PhoneError::InvalidFormat));
        assert_eq!(Phone::parse("6123456789"), Err(PhoneError::InvalidFormat));
        assert_eq!(Phone::parse("0012345678"), Err(PhoneError::InvalidFormat));
        assert_eq!(Phone::parse("+44612345678"), Err(PhoneError::InvalidFormat));
    }

    #[test]
    fn test_display_groups_pairs() {
        let phone = Phone::parse("0612345678").unwrap();
        assert_eq!(phone.to_string(), "06 12 34 56 78");
    }
}

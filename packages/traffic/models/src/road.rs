//! Canonical road codes.
//!
//! A road code is one uppercase ASCII letter followed by one to three
//! digits (`A2`, `N266`, `A270`). Codes order naturally: by prefix letter,
//! then by number, so `A2 < A16 < A270 < N2`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A validated road code such as `A2` or `N266`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoadCode(String);

/// Error returned when a string is not a road code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid road code '{value}': expected a letter followed by 1-3 digits")]
pub struct InvalidRoadCodeError {
    /// The rejected input.
    pub value: String,
}

impl RoadCode {
    /// Parses a road code. Surrounding whitespace is trimmed and the prefix
    /// letter is uppercased.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRoadCodeError`] if the input is not a single letter
    /// followed by one to three digits.
    pub fn parse(raw: &str) -> Result<Self, InvalidRoadCodeError> {
        let candidate = raw.trim().to_ascii_uppercase();
        if is_road_code(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(InvalidRoadCodeError {
                value: raw.to_string(),
            })
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the road class letter (`'A'` for motorways, `'N'` for
    /// provincial roads).
    #[must_use]
    pub fn prefix(&self) -> char {
        self.0.chars().next().unwrap_or('?')
    }

    /// Returns the numeric part of the code.
    #[must_use]
    pub fn number(&self) -> u16 {
        self.0[1..].parse().unwrap_or(0)
    }
}

/// Returns `true` if `s` is exactly an uppercase letter followed by one to
/// three ASCII digits.
#[must_use]
pub fn is_road_code(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let digits = chars.as_str();
    first.is_ascii_uppercase()
        && (1..=3).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
}

impl Ord for RoadCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix()
            .cmp(&other.prefix())
            .then_with(|| self.number().cmp(&other.number()))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for RoadCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RoadCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoadCode {
    type Err = InvalidRoadCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoadCode {
    type Error = InvalidRoadCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoadCode> for String {
    fn from(code: RoadCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_motorway_and_provincial_codes() {
        assert_eq!(RoadCode::parse("A2").unwrap().as_str(), "A2");
        assert_eq!(RoadCode::parse(" n266 ").unwrap().as_str(), "N266");
        assert_eq!(RoadCode::parse("A270").unwrap().number(), 270);
    }

    #[test]
    fn rejects_malformed_codes() {
        for raw in ["", "A", "2A", "A2700", "AA2", "A-2", "Ä2"] {
            assert!(RoadCode::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn error_names_the_rejected_input() {
        let err = RoadCode::parse("A2700").unwrap_err();
        assert_eq!(err.value, "A2700");
        assert_eq!(
            err.to_string(),
            "invalid road code 'A2700': expected a letter followed by 1-3 digits"
        );
    }

    #[test]
    fn orders_naturally() {
        let mut codes: Vec<RoadCode> = ["N2", "A270", "A16", "A2"]
            .iter()
            .map(|c| RoadCode::parse(c).unwrap())
            .collect();
        codes.sort();
        let sorted: Vec<&str> = codes.iter().map(RoadCode::as_str).collect();
        assert_eq!(sorted, ["A2", "A16", "A270", "N2"]);
    }
}

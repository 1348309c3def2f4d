use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LevelParseError {
    #[error("proficiency level is blank")]
    Blank,

    #[error("unknown proficiency level: {0}")]
    Unknown(String),

    #[error("level range is inverted: {min} > {max}")]
    InvertedRange {
        min: ProficiencyLevel,
        max: ProficiencyLevel,
    },
}

//
// ─── PROFICIENCY LEVEL ─────────────────────────────────────────────────────────
//

/// CEFR proficiency level, ordered from beginner to mastery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProficiencyLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl ProficiencyLevel {
    pub const ALL: [ProficiencyLevel; 6] = [
        ProficiencyLevel::A1,
        ProficiencyLevel::A2,
        ProficiencyLevel::B1,
        ProficiencyLevel::B2,
        ProficiencyLevel::C1,
        ProficiencyLevel::C2,
    ];

    #[must_use]
    pub fn lowest() -> Self {
        Self::A1
    }

    #[must_use]
    pub fn highest() -> Self {
        Self::C2
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::C1 => "C1",
            Self::C2 => "C2",
        }
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProficiencyLevel {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LevelParseError::Blank);
        }
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| LevelParseError::Unknown(trimmed.to_owned()))
    }
}

impl TryFrom<String> for ProficiencyLevel {
    type Error = LevelParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProficiencyLevel> for String {
    fn from(value: ProficiencyLevel) -> Self {
        value.as_str().to_owned()
    }
}

//
// ─── LEVEL RANGE ───────────────────────────────────────────────────────────────
//

/// Inclusive range of levels a quiz should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRange {
    min: ProficiencyLevel,
    max: ProficiencyLevel,
}

impl LevelRange {
    /// Builds a range.
    ///
    /// # Errors
    ///
    /// Returns `LevelParseError::InvertedRange` when `min > max`.
    pub fn new(min: ProficiencyLevel, max: ProficiencyLevel) -> Result<Self, LevelParseError> {
        if min > max {
            return Err(LevelParseError::InvertedRange { min, max });
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub fn single(level: ProficiencyLevel) -> Self {
        Self {
            min: level,
            max: level,
        }
    }

    /// The whole A1-C2 scale, used by the placement quiz.
    #[must_use]
    pub fn full() -> Self {
        Self {
            min: ProficiencyLevel::lowest(),
            max: ProficiencyLevel::highest(),
        }
    }

    #[must_use]
    pub fn min(&self) -> ProficiencyLevel {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> ProficiencyLevel {
        self.max
    }

    #[must_use]
    pub fn contains(&self, level: ProficiencyLevel) -> bool {
        self.min <= level && level <= self.max
    }
}

impl Default for LevelRange {
    fn default() -> Self {
        Self::full()
    }
}

impl fmt::Display for LevelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

impl FromStr for LevelRange {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((min, max)) => Self::new(min.parse()?, max.parse()?),
            None => s.parse().map(Self::single),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively_and_trims() {
        assert_eq!(" b2 ".parse::<ProficiencyLevel>(), Ok(ProficiencyLevel::B2));
        assert_eq!("C1".parse::<ProficiencyLevel>(), Ok(ProficiencyLevel::C1));
    }

    #[test]
    fn blank_and_unknown_levels_are_rejected() {
        assert_eq!("".parse::<ProficiencyLevel>(), Err(LevelParseError::Blank));
        assert_eq!(
            "D1".parse::<ProficiencyLevel>(),
            Err(LevelParseError::Unknown("D1".into()))
        );
    }

    #[test]
    fn every_level_round_trips_through_display() {
        for level in ProficiencyLevel::ALL {
            assert_eq!(level.to_string().parse::<ProficiencyLevel>(), Ok(level));
        }
    }

    #[test]
    fn levels_are_ordered() {
        assert!(ProficiencyLevel::A1 < ProficiencyLevel::B1);
        assert_eq!(ProficiencyLevel::highest(), ProficiencyLevel::C2);
    }

    #[test]
    fn range_display_matches_prompt_format() {
        assert_eq!(LevelRange::full().to_string(), "A1-C2");
        assert_eq!(LevelRange::single(ProficiencyLevel::B1).to_string(), "B1");
    }

    #[test]
    fn range_parse_and_validation() {
        let range: LevelRange = "A2-B2".parse().unwrap();
        assert!(range.contains(ProficiencyLevel::B1));
        assert!(!range.contains(ProficiencyLevel::C1));
        assert!(matches!(
            "C1-A1".parse::<LevelRange>(),
            Err(LevelParseError::InvertedRange { .. })
        ));
    }

    #[test]
    fn serde_uses_plain_strings() {
        let json = serde_json::to_string(&ProficiencyLevel::A2).unwrap();
        assert_eq!(json, "\"A2\"");
        let level: ProficiencyLevel = serde_json::from_str("\"c2\"").unwrap();
        assert_eq!(level, ProficiencyLevel::C2);
    }
}

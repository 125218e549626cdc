//! Importance rank of a priority within one day.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Ordinal 1..=3, where 1 is the most important priority of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rank(u8);

impl Rank {
    pub const FIRST: Rank = Rank(1);
    pub const SECOND: Rank = Rank(2);
    pub const THIRD: Rank = Rank(3);

    /// All ranks in ascending order (most important first).
    pub const ALL: [Rank; 3] = [Rank::FIRST, Rank::SECOND, Rank::THIRD];

    /// Builds a rank, rejecting values outside 1..=3.
    pub fn new(value: u8) -> Result<Self, InvalidRank> {
        match value {
            1..=3 => Ok(Self(value)),
            other => Err(InvalidRank(i64::from(other))),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rank {
    type Error = InvalidRank;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Rank {
    type Error = InvalidRank;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| InvalidRank(value))
            .and_then(Self::new)
    }
}

impl From<Rank> for u8 {
    fn from(value: Rank) -> Self {
        value.0
    }
}

impl Display for Rank {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rank value outside the supported 1..=3 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRank(pub i64);

impl Display for InvalidRank {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "rank must be between 1 and 3, got {}", self.0)
    }
}

impl Error for InvalidRank {}

#[cfg(test)]
mod tests {
    use super::Rank;

    #[test]
    fn accepts_only_one_to_three() {
        assert!(Rank::new(0).is_err());
        assert_eq!(Rank::new(2).unwrap(), Rank::SECOND);
        assert!(Rank::new(4).is_err());
        assert!(Rank::try_from(-1_i64).is_err());
        assert!(Rank::try_from(300_i64).is_err());
    }

    #[test]
    fn all_is_sorted_by_importance() {
        let values: Vec<u8> = Rank::ALL.iter().map(|rank| rank.get()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }
}

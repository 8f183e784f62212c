use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseError;

/// Position of a block in the chain, starting at 0 for genesis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Height(pub u32);

impl Height {
    pub const GENESIS: Height = Height(0);

    /// The height directly above this one.
    pub fn next(self) -> Height {
        Height(self.0 + 1)
    }

    /// Offset this height by `count` blocks, `None` on overflow.
    pub fn checked_add(self, count: u32) -> Option<Height> {
        self.0.checked_add(count).map(Height)
    }

    /// Number of heights in `[self, end)`, zero when `end` is not above `self`.
    pub fn distance_to(self, end: Height) -> u32 {
        end.0.saturating_sub(self.0)
    }

    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 4]) -> Height {
        Height(u32::from_le_bytes(bytes))
    }
}

/// Accepts plain decimal digits only, so `+5` or ` 5` are rejected.
impl FromStr for Height {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidHeight(s.to_string()));
        }
        s.parse::<u32>()
            .map(Height)
            .map_err(|_| ParseError::InvalidHeight(s.to_string()))
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Height {
    fn from(value: u32) -> Self {
        Height(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_digits() {
        assert_eq!("0".parse::<Height>().unwrap(), Height(0));
        assert_eq!("840000".parse::<Height>().unwrap(), Height(840_000));
    }

    #[test]
    fn test_parse_rejects_signs_and_garbage() {
        for input in ["", "+1", "-1", "1.5", "abc", " 7", "99999999999"] {
            assert_eq!(
                input.parse::<Height>(),
                Err(ParseError::InvalidHeight(input.to_string())),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_distance() {
        assert_eq!(Height(3).distance_to(Height(7)), 4);
        assert_eq!(Height(7).distance_to(Height(3)), 0);
    }

    #[test]
    fn test_le_round_trip() {
        let height = Height(1234);
        assert_eq!(Height::from_le_bytes(height.to_le_bytes()), height);
    }
}

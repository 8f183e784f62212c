use crate::{Height, ParseError};
use serde::{Deserialize, Serialize};

/// The persisted resume point of a chain: the next height to process.
///
/// Every height strictly below the checkpoint has been committed to storage.
/// The value only moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The first height that has not been committed yet.
    pub next_height: Height,
}

impl Checkpoint {
    pub fn new(next_height: Height) -> Self {
        Self { next_height }
    }

    /// Checkpoint placed right after `height`.
    pub fn after(height: Height) -> Self {
        Self::new(height.next())
    }

    /// Stored form: 4 bytes, little-endian.
    pub fn encode(&self) -> [u8; 4] {
        self.next_height.to_le_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        let bytes: [u8; 4] = bytes
            .try_into()
            .map_err(|_| ParseError::InvalidCheckpoint(bytes.len()))?;
        Ok(Self::new(Height::from_le_bytes(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_checkpoint() {
        assert_eq!(Checkpoint::default().next_height, Height::GENESIS);
    }

    #[test]
    fn test_encode_decode() {
        let checkpoint = Checkpoint::after(Height(41));
        assert_eq!(checkpoint.encode(), [42, 0, 0, 0]);
        assert_eq!(Checkpoint::decode(&checkpoint.encode()).unwrap(), checkpoint);
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        assert_eq!(Checkpoint::decode(b"42"), Err(ParseError::InvalidCheckpoint(2)));
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing identifiers received from outside the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid hash: {0}")]
    InvalidHash(String),
    #[error("Invalid height: {0}")]
    InvalidHeight(String),
    #[error("invalid checkpoint encoding: expected 4 bytes, got {0}")]
    InvalidCheckpoint(usize),
}

macro_rules! hash_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Build from 32 bytes in wire order.
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let bytes: [u8; 32] = bytes.try_into().ok()?;
                Some(Self(bytes))
            }

            /// Bytes in wire order.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Lowercase hex of the wire order bytes. Used for storage keys.
            pub fn to_wire_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Bytes in display order (the reverse of wire order).
            pub fn to_display_bytes(&self) -> [u8; 32] {
                let mut bytes = self.0;
                bytes.reverse();
                bytes
            }
        }

        /// Parses the display-order hex form used in REST paths.
        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = <[u8; 32] as hex::FromHex>::from_hex(s)
                    .map_err(|_| ParseError::InvalidHash(s.to_string()))?;
                bytes.reverse();
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.to_display_bytes()))
            }
        }
    };
}

hash_newtype!(
    /// Double SHA-256 of a block header.
    BlockHash
);

hash_newtype!(
    /// Double SHA-256 of a transaction's non-witness serialization.
    Txid
);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GENESIS_DISPLAY: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

    #[test]
    fn test_display_round_trip() {
        let hash: BlockHash = GENESIS_DISPLAY.parse().unwrap();
        assert_eq!(hash.to_string(), GENESIS_DISPLAY);
    }

    #[test]
    fn test_wire_order_is_reversed() {
        let hash: BlockHash = GENESIS_DISPLAY.parse().unwrap();
        assert_eq!(hash.0[31], 0x00);
        assert_eq!(hash.0[0], 0x6f);
        assert!(hash.to_wire_hex().starts_with("6fe28c0ab6f1b372"));
    }

    #[test]
    fn test_rejects_malformed_hex() {
        let err = "invalid".parse::<BlockHash>().unwrap_err();
        assert_eq!(err, ParseError::InvalidHash("invalid".to_string()));
        assert_eq!(err.to_string(), "Invalid hash: invalid");
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!("00ff".parse::<Txid>().is_err());
        assert!(BlockHash::from_slice(&[0u8; 31]).is_none());
        assert!(BlockHash::from_slice(&[0u8; 32]).is_some());
    }
}

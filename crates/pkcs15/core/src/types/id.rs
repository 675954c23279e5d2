//! PKCS#15 object identifiers

use std::fmt;

/// Maximum length of a PKCS#15 identifier in bytes
pub const MAX_ID_SIZE: usize = 255;

/// Errors when parsing an identifier from text
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdParseError {
    /// No hex digits were given
    #[error("identifier is empty")]
    Empty,

    /// Input is not valid hex
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Identifier exceeds the maximum length
    #[error("identifier is {0} bytes long, at most {MAX_ID_SIZE} allowed")]
    TooLong(usize),
}

/// Identifier of a PKCS#15 object
///
/// Private keys, public keys and PINs are linked through these identifiers: a private key and its
/// public key share the same id, and a private key names its PIN through its authentication id.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Id(Vec<u8>);

impl Id {
    /// Create an identifier from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex string such as `45`, `0A:1B` or `0a 1b`
    pub fn from_hex(s: &str) -> Result<Self, IdParseError> {
        let digits: String = s
            .chars()
            .filter(|c| *c != ':' && !c.is_whitespace())
            .collect();
        if digits.is_empty() {
            return Err(IdParseError::Empty);
        }

        let bytes = hex::decode(&digits)?;
        if bytes.len() > MAX_ID_SIZE {
            return Err(IdParseError::TooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Raw identifier bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the identifier has no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl From<&[u8]> for Id {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

//! Key, public key and PIN objects found on the card

use super::Id;

/// Key algorithm of a PKCS#15 key object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA
    Rsa,
    /// DSA
    Dsa,
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rsa => write!(f, "RSA"),
            Self::Dsa => write!(f, "DSA"),
        }
    }
}

/// Card-specific location of an object
///
/// Opaque to the pipeline; only the card layer interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHandle {
    /// Absolute or relative file path of the object's data
    pub path: Vec<u8>,
    /// Card reference (key reference or PIN reference)
    pub reference: Option<u8>,
}

/// A private key object as described by the card's directory files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKey {
    /// Human readable label
    pub label: String,
    /// Identifier, shared with the matching public key
    pub id: Id,
    /// Identifier of the PIN protecting the key, if any
    pub auth_id: Option<Id>,
    /// Key algorithm
    pub algorithm: KeyAlgorithm,
    /// Modulus length in bits (RSA) or length of the prime `p` (DSA)
    pub modulus_bits: usize,
    /// Whether the card performs operations with this key itself
    pub native: bool,
    /// Where the key lives on the card
    pub handle: ObjectHandle,
}

impl PrivateKey {
    /// Modulus length in bytes
    pub const fn modulus_len(&self) -> usize {
        self.modulus_bits / 8
    }
}

/// A PIN authentication object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    /// Human readable label, shown in prompts
    pub label: String,
    /// Authentication identifier
    pub auth_id: Id,
    /// Minimum PIN length
    pub min_length: usize,
    /// Length the card stores the PIN at
    pub stored_length: usize,
    /// Maximum PIN length, zero when unbounded
    pub max_length: usize,
    /// Whether the PIN must be padded to its stored length
    pub needs_padding: bool,
    /// Padding byte
    pub pad_char: u8,
    /// Where the PIN lives on the card
    pub handle: ObjectHandle,
}

impl Pin {
    /// Whether a PIN of `len` bytes satisfies the length constraints
    pub const fn accepts_length(&self, len: usize) -> bool {
        len >= self.min_length && (self.max_length == 0 || len <= self.max_length)
    }
}

/// A public key object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    /// Human readable label
    pub label: String,
    /// Identifier, shared with the matching private key
    pub id: Id,
    /// Key algorithm
    pub algorithm: KeyAlgorithm,
    /// Where the key lives on the card
    pub handle: ObjectHandle,
}

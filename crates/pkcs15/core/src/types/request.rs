//! Operation requests and results

use std::fmt;

/// Private key operation to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Compute a signature over a digest
    Sign,
    /// Decrypt a ciphertext
    Decipher,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sign => write!(f, "Compute signature"),
            Self::Decipher => write!(f, "Decrypt"),
        }
    }
}

/// Hash algorithm the input digest was produced with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// MD5, 16 byte digests
    Md5,
    /// SHA-1, 20 byte digests
    Sha1,
}

impl HashAlgorithm {
    /// Digest length in bytes
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
        }
    }

    /// Infer the algorithm from a digest length
    pub const fn from_digest_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(Self::Md5),
            20 => Some(Self::Sha1),
            _ => None,
        }
    }
}

/// Padding applied to the input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Padding {
    /// Raw input
    #[default]
    None,
    /// PKCS#1 v1.5
    Pkcs1,
}

/// Algorithm flags of a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CryptoFlags {
    /// Explicit hash algorithm, if any
    pub hash: Option<HashAlgorithm>,
    /// Input padding
    pub padding: Padding,
}

impl CryptoFlags {
    /// Flags with an explicit hash algorithm
    pub const fn with_hash(mut self, hash: HashAlgorithm) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Flags with the given padding
    pub const fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    /// Whether PKCS#1 v1.5 padding is requested
    pub fn is_pkcs1(&self) -> bool {
        self.padding == Padding::Pkcs1
    }
}

/// A sign or decipher request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoRequest {
    /// Operation to perform
    pub operation: Operation,
    /// Input bytes (digest or ciphertext)
    pub input: Vec<u8>,
    /// Algorithm flags
    pub flags: CryptoFlags,
}

impl CryptoRequest {
    /// Create a new request
    pub const fn new(operation: Operation, input: Vec<u8>, flags: CryptoFlags) -> Self {
        Self {
            operation,
            input,
            flags,
        }
    }
}

/// Output of a successful operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoResult(Vec<u8>);

impl CryptoResult {
    /// Wrap output bytes
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Output bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the output bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

//! Error types for the pipeline and the card backends

use std::{io, path::PathBuf};

use crate::types::{Id, IdParseError, Operation};

/// Result type for PKCS#15 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Diagnostics reported by the card abstraction layer
#[derive(Debug, thiserror::Error)]
pub enum CardError {
    /// The key container is protected and no passphrase was given
    #[error("Passphrase required")]
    PassphraseRequired,

    /// The key container could not be decrypted with the given passphrase
    #[error("Incorrect passphrase")]
    IncorrectPassphrase,

    /// The requested object does not exist on the card
    #[error("Requested object not found")]
    ObjectNotFound,

    /// The card or the layer does not support the operation
    #[error("Not supported")]
    NotSupported,

    /// The PIN was rejected by the card
    #[error(
        "PIN code or password incorrect{}",
        .tries_left.map(|n| format!(" ({n} tries left)")).unwrap_or_default()
    )]
    PinIncorrect {
        /// Remaining attempts, when the card reports them
        tries_left: Option<u8>,
    },

    /// The authentication object is blocked
    #[error("Authentication method blocked")]
    AuthenticationBlocked,

    /// Security status not satisfied (e.g. PIN not verified)
    #[error("Security status not satisfied")]
    SecurityStatusNotSatisfied,

    /// Card answered with an unexpected status word
    #[error("Card returned status {sw1:02X}{sw2:02X}")]
    Status {
        /// First status byte
        sw1: u8,
        /// Second status byte
        sw2: u8,
    },

    /// Data read from the card could not be decoded
    #[error("Invalid data on card: {0}")]
    InvalidData(&'static str),

    /// Other error with a message
    #[error("{0}")]
    Message(String),

    /// Error raised by a concrete backend
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Classification of software cryptography failures
///
/// The underlying library error is logged, never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoFailure {
    /// Key material could not be turned into a usable key
    #[error("invalid key material")]
    InvalidKey,

    /// Signature computation failed
    #[error("signature computation failed")]
    Signing,

    /// Decryption failed
    #[error("decryption failed")]
    Decryption,
}

/// Broad error kinds, one per pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing arguments and input
    Usage,
    /// Reader, connect, lock or bind failures
    Session,
    /// Key or PIN object not found
    Resolution,
    /// PIN incorrect or entry cancelled
    Authentication,
    /// Extraction, signing or deciphering failure
    Crypto,
    /// Input unreadable or output unwritable
    Io,
}

/// Error type for the operation pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Key identifier is not valid hex
    #[error("Invalid key identifier '{id}': {reason}")]
    InvalidKeyId {
        /// Identifier as given
        id: String,
        /// Why it was rejected
        reason: IdParseError,
    },

    /// Input length does not match the key length
    #[error("Input has to be exactly {expected} bytes, when using no padding (got {actual})")]
    InvalidInputSize {
        /// Required length in bytes
        expected: usize,
        /// Length of the input
        actual: usize,
    },

    /// Hash algorithm neither given nor inferable from the input length
    #[error("Invalid input size ({0} bytes): use --sha-1 or --md5 to name the hash algorithm")]
    AmbiguousHashLength(usize),

    /// Context could not be established
    #[error("Failed to establish context: {0}")]
    ContextFailed(#[source] CardError),

    /// Reader index out of range
    #[error("Illegal reader number {index}. Only {count} reader(s) configured.")]
    ReaderIndexInvalid {
        /// Requested reader index
        index: usize,
        /// Number of readers known to the context
        count: usize,
    },

    /// No card in the selected reader
    #[error("Card not present in reader {reader}")]
    CardAbsent {
        /// Reader name
        reader: String,
    },

    /// Connecting to the card failed
    #[error("Failed to connect to card: {0}")]
    ConnectFailed(#[source] CardError),

    /// Locking the card failed
    #[error("Unable to lock card: {0}")]
    LockFailed(#[source] CardError),

    /// Binding the PKCS#15 application failed
    #[error("PKCS #15 initialization failed: {0}")]
    BindFailed(#[source] CardError),

    /// No private key on the card
    #[error("Private key enumeration failed: {0}")]
    NoKeysFound(#[source] CardError),

    /// No private key with the requested identifier
    #[error("Unable to find private key '{id}'")]
    KeyNotFound {
        /// Requested identifier
        id: Id,
    },

    /// The PIN object referenced by the key does not exist
    #[error("Unable to find PIN code for private key: {0}")]
    PinNotFound(#[source] CardError),

    /// The user cancelled PIN entry
    #[error("PIN entry cancelled")]
    UserCancelled,

    /// The supplied PIN violates the length constraints of the PIN object
    #[error("PIN must be between {min} and {max} characters long (got {actual})")]
    PinLengthInvalid {
        /// Minimum length
        min: usize,
        /// Maximum length
        max: usize,
        /// Supplied length
        actual: usize,
    },

    /// The card rejected the PIN
    #[error("PIN code verification failed: {0}")]
    PinIncorrect(#[source] CardError),

    /// The DSA public key needed to complete the private key is missing
    #[error("Unable to find public key '{id}' for DSA private key")]
    PublicKeyNotFound {
        /// Identifier shared by the key pair
        id: Id,
    },

    /// The key container needs a passphrase and none was provided
    #[error("A pass phrase is required to unlock the secret key")]
    PassphraseRequired,

    /// Key material could not be read from the card
    #[error("Unable to extract private key: {0}")]
    ExtractionFailed(#[source] CardError),

    /// Operation and key type do not go together
    #[error("{0} is not supported")]
    NotSupported(&'static str),

    /// The card failed to perform a native operation
    #[error("{operation} failed: {source}")]
    CardOperationFailed {
        /// Operation that failed
        operation: Operation,
        /// Card diagnostic
        source: CardError,
    },

    /// Software cryptography failed
    #[error("Cryptographic operation failed: {0}")]
    CryptoOperationFailed(CryptoFailure),

    /// Input file could not be opened
    #[error("Unable to open '{}' for reading: {source}", .path.display())]
    InputUnreadable {
        /// Input path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Input file could not be read
    #[error("Unable to read '{}': {source}", .path.display())]
    InputReadFailed {
        /// Input path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Input file exceeds the input buffer
    #[error("Input file '{}' is larger than {limit} bytes", .path.display())]
    InputTooLarge {
        /// Input path
        path: PathBuf,
        /// Maximum accepted size
        limit: usize,
    },

    /// Output file could not be written
    #[error("Unable to open '{}' for writing: {source}", .path.display())]
    OutputUnwritable {
        /// Output path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Other I/O errors
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Stage the error belongs to
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKeyId { .. }
            | Self::InvalidInputSize { .. }
            | Self::AmbiguousHashLength(_)
            | Self::InputTooLarge { .. } => ErrorKind::Usage,
            Self::ContextFailed(_)
            | Self::ReaderIndexInvalid { .. }
            | Self::CardAbsent { .. }
            | Self::ConnectFailed(_)
            | Self::LockFailed(_)
            | Self::BindFailed(_) => ErrorKind::Session,
            Self::NoKeysFound(_) | Self::KeyNotFound { .. } | Self::PinNotFound(_) => {
                ErrorKind::Resolution
            }
            Self::UserCancelled | Self::PinLengthInvalid { .. } | Self::PinIncorrect(_) => {
                ErrorKind::Authentication
            }
            Self::PublicKeyNotFound { .. }
            | Self::PassphraseRequired
            | Self::ExtractionFailed(_)
            | Self::NotSupported(_)
            | Self::CardOperationFailed { .. }
            | Self::CryptoOperationFailed(_) => ErrorKind::Crypto,
            Self::InputUnreadable { .. }
            | Self::InputReadFailed { .. }
            | Self::OutputUnwritable { .. }
            | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Process exit code for the error
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::CardAbsent { .. } => 3,
            Self::InvalidKeyId { .. }
            | Self::InvalidInputSize { .. }
            | Self::AmbiguousHashLength(_)
            | Self::KeyNotFound { .. }
            | Self::InputUnreadable { .. }
            | Self::InputReadFailed { .. }
            | Self::InputTooLarge { .. } => 2,
            _ => match self.kind() {
                ErrorKind::Authentication => 5,
                ErrorKind::Usage => 2,
                _ => 1,
            },
        }
    }
}

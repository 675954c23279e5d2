//! Error types for the PC/SC PKCS#15 layer

use std::fmt;

use nexum_pkcs15_core::CardError;

/// PC/SC layer errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    Pcsc(#[from] pcsc::Error),

    /// No context established
    NoContext,

    /// Reader index not known to the context
    ReaderNotFound(usize),

    /// No card present in reader
    NoCard(String),

    /// Not connected to a card
    NotConnected,

    /// PKCS#15 application not bound
    NotBound,

    /// Card answered with an error status word
    Status {
        /// First status byte
        sw1: u8,
        /// Second status byte
        sw2: u8,
    },

    /// Response shorter than a status word
    InvalidResponse(usize),

    /// Too many chained GET RESPONSE commands
    ChainLimitExceeded,

    /// Malformed TLV data
    Tlv(String),

    /// Malformed or unexpected data on the card
    InvalidData(&'static str),

    /// Key container could not be decoded or decrypted
    Pkcs8(#[from] pkcs8::Error),

    /// Encrypted key container found but no passphrase given
    PassphraseRequired,

    /// Encrypted key container did not decrypt to a private key
    IncorrectPassphrase,

    /// Other error
    Other(String),
}

impl fmt::Display for PcscError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcsc(e) => write!(f, "PC/SC error: {}", e),
            Self::NoContext => write!(f, "No PC/SC context"),
            Self::ReaderNotFound(index) => write!(f, "Reader not found: #{}", index),
            Self::NoCard(r) => write!(f, "No card present in reader: {}", r),
            Self::NotConnected => write!(f, "Not connected to a card"),
            Self::NotBound => write!(f, "PKCS #15 application not bound"),
            Self::Status { sw1, sw2 } => write!(f, "Card returned status {:02X}{:02X}", sw1, sw2),
            Self::InvalidResponse(len) => write!(f, "Invalid response of {} bytes", len),
            Self::ChainLimitExceeded => write!(f, "GET RESPONSE chain limit exceeded"),
            Self::Tlv(msg) => write!(f, "Invalid TLV data: {}", msg),
            Self::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            Self::Pkcs8(e) => write!(f, "Key container error: {}", e),
            Self::PassphraseRequired => write!(f, "Passphrase required"),
            Self::IncorrectPassphrase => write!(f, "Incorrect passphrase"),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<iso7816_tlv::TlvError> for PcscError {
    fn from(e: iso7816_tlv::TlvError) -> Self {
        Self::Tlv(format!("{:?}", e))
    }
}

impl From<PcscError> for CardError {
    fn from(e: PcscError) -> Self {
        match e {
            PcscError::Status { sw1: 0x63, sw2 } if sw2 & 0xF0 == 0xC0 => Self::PinIncorrect {
                tries_left: Some(sw2 & 0x0F),
            },
            PcscError::Status {
                sw1: 0x69,
                sw2: 0x83,
            } => Self::AuthenticationBlocked,
            PcscError::Status {
                sw1: 0x69,
                sw2: 0x82,
            } => Self::SecurityStatusNotSatisfied,
            PcscError::Status {
                sw1: 0x6A,
                sw2: 0x82 | 0x88,
            } => Self::ObjectNotFound,
            PcscError::Status {
                sw1: 0x6A,
                sw2: 0x81,
            }
            | PcscError::Status { sw1: 0x6D, .. }
            | PcscError::Status { sw1: 0x6E, .. } => Self::NotSupported,
            PcscError::Status { sw1, sw2 } => Self::Status { sw1, sw2 },
            PcscError::InvalidData(msg) => Self::InvalidData(msg),
            PcscError::PassphraseRequired => Self::PassphraseRequired,
            PcscError::IncorrectPassphrase
            | PcscError::Pkcs8(pkcs8::Error::EncryptedPrivateKey(_)) => Self::IncorrectPassphrase,
            other => Self::Backend(Box::new(other)),
        }
    }
}

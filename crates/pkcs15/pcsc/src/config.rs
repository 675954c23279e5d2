//! Configuration options for the PC/SC PKCS#15 layer

use pcsc::{Protocols as PcscProtocols, ShareMode as PcscShareMode};

/// Default path of the PKCS#15 application DF
pub const DEFAULT_APPLICATION_PATH: [u8; 4] = [0x3F, 0x00, 0x50, 0x15];

/// Sharing mode for card connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    /// Exclusive access to the card
    Exclusive,
    /// Shared access to the card (default)
    Shared,
}

impl From<ShareMode> for PcscShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
        }
    }
}

/// Configuration options for the PC/SC PKCS#15 layer
#[derive(Debug, Clone)]
pub struct Pkcs15Config {
    /// Sharing mode used when connecting
    pub share_mode: ShareMode,

    /// Preferred protocols for card communication
    pub protocols: PcscProtocols,

    /// Absolute path of the PKCS#15 application DF
    pub application_path: Vec<u8>,

    /// Maximum bytes requested per READ BINARY
    pub read_chunk_size: u8,

    /// Maximum number of chained GET RESPONSE commands
    pub max_get_response: usize,
}

impl Default for Pkcs15Config {
    fn default() -> Self {
        Self {
            share_mode: ShareMode::Shared,
            protocols: PcscProtocols::ANY,
            application_path: DEFAULT_APPLICATION_PATH.to_vec(),
            read_chunk_size: 0xFF,
            max_get_response: 10,
        }
    }
}

impl Pkcs15Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Set the preferred protocols
    pub const fn with_protocols(mut self, protocols: PcscProtocols) -> Self {
        self.protocols = protocols;
        self
    }

    /// Set the application DF path
    pub fn with_application_path(mut self, path: impl Into<Vec<u8>>) -> Self {
        self.application_path = path.into();
        self
    }

    /// Set the READ BINARY chunk size
    pub const fn with_read_chunk_size(mut self, size: u8) -> Self {
        self.read_chunk_size = size;
        self
    }
}

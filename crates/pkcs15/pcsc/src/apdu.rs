//! ISO 7816-4 command and response APDUs

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::PcscError;

/// Maximum data length of a short APDU
pub(crate) const MAX_SHORT_DATA: usize = 255;

/// Command APDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional), 0 meaning 256
    pub le: Option<u8>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Convert to raw APDU bytes
    ///
    /// Data longer than a short APDU must be split with [`Command::chain`] first.
    pub fn to_bytes(&self) -> Bytes {
        let data_len = self.data.as_ref().map_or(0, Bytes::len);
        let mut buffer = BytesMut::with_capacity(4 + 1 + data_len + 1);

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(data) = &self.data {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Split into a command chain
    ///
    /// Every command but the last carries the chaining bit in CLA and no Le.
    pub fn chain(&self) -> Vec<Self> {
        let Some(data) = self.data.as_ref().filter(|d| d.len() > MAX_SHORT_DATA) else {
            return vec![self.clone()];
        };

        let chunks: Vec<Bytes> = data
            .chunks(MAX_SHORT_DATA)
            .map(Bytes::copy_from_slice)
            .collect();
        let last = chunks.len() - 1;
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                if i == last {
                    Self {
                        data: Some(chunk),
                        ..self.clone()
                    }
                } else {
                    Self {
                        cla: self.cla | 0x10,
                        data: Some(chunk),
                        le: None,
                        ..self.clone()
                    }
                }
            })
            .collect()
    }
}

/// Response APDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data
    pub data: Bytes,
    /// First status byte
    pub sw1: u8,
    /// Second status byte
    pub sw2: u8,
}

impl Response {
    /// Parse a response from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PcscError> {
        let Some(split) = bytes.len().checked_sub(2) else {
            return Err(PcscError::InvalidResponse(bytes.len()));
        };
        Ok(Self {
            data: Bytes::copy_from_slice(&bytes[..split]),
            sw1: bytes[split],
            sw2: bytes[split + 1],
        })
    }

    /// Status word 9000
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// 61xx: more data available through GET RESPONSE
    pub const fn more_data_available(&self) -> bool {
        self.sw1 == 0x61
    }

    /// 6Cxx: wrong Le, the card tells the right one
    pub const fn correct_le(&self) -> Option<u8> {
        if self.sw1 == 0x6C {
            Some(self.sw2)
        } else {
            None
        }
    }

    /// Data on success, the status word as error otherwise
    pub fn into_result(self) -> Result<Bytes, PcscError> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(PcscError::Status {
                sw1: self.sw1,
                sw2: self.sw2,
            })
        }
    }
}

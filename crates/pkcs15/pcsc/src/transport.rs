//! APDU transport: raw exchange with the card and response chaining

use std::fmt;

use bytes::{Bytes, BytesMut};
use pcsc::{Card, Disposition, MAX_BUFFER_SIZE_EXTENDED, Protocols, ShareMode};
use tracing::{debug, trace};

use crate::{
    apdu::{Command, Response},
    error::PcscError,
};

/// Raw APDU exchange with a card
pub trait CardTransport {
    /// Send a raw command APDU and return the raw response
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, PcscError>;

    /// Send a command, following command chaining, 61xx and 6Cxx
    ///
    /// Returns the response of the last command with all response data collected.
    fn exchange(&mut self, command: &Command, max_chain: usize) -> Result<Response, PcscError> {
        let chain = command.chain();
        let mut response = None;
        for link in &chain {
            let mut current = Response::from_bytes(&self.transmit_raw(&link.to_bytes())?)?;
            if let Some(le) = current.correct_le() {
                let retry = link.clone().with_le(le);
                current = Response::from_bytes(&self.transmit_raw(&retry.to_bytes())?)?;
            }
            if !current.is_success() && !current.more_data_available() {
                return Ok(current);
            }
            response = Some(current);
        }
        let mut response = response.ok_or(PcscError::InvalidResponse(0))?;

        let mut chain_count = 0;
        while response.more_data_available() && chain_count < max_chain {
            let get_response = Command::new(command.cla & !0x10, 0xC0, 0x00, 0x00)
                .with_le(response.sw2);
            let next = Response::from_bytes(&self.transmit_raw(&get_response.to_bytes())?)?;

            let mut buffer = BytesMut::with_capacity(response.data.len() + next.data.len());
            buffer.extend_from_slice(&response.data);
            buffer.extend_from_slice(&next.data);
            response = Response {
                data: buffer.freeze(),
                sw1: next.sw1,
                sw2: next.sw2,
            };
            chain_count += 1;
        }

        if response.more_data_available() {
            return Err(PcscError::ChainLimitExceeded);
        }
        Ok(response)
    }
}

/// Transport over a connected PC/SC card
pub struct PcscTransport {
    /// Card connection
    card: Card,
    /// Reader name
    reader_name: String,
    /// Log APDUs at debug level instead of trace
    log_apdus: bool,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("log_apdus", &self.log_apdus)
            .finish()
    }
}

impl PcscTransport {
    /// Wrap a connected card
    pub(crate) fn new(card: Card, reader_name: String, log_apdus: bool) -> Self {
        Self {
            card,
            reader_name,
            log_apdus,
        }
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Reconnect with another share mode, leaving the card powered
    pub(crate) fn reconnect(&mut self, mode: ShareMode) -> Result<(), PcscError> {
        self.card
            .reconnect(mode, Protocols::ANY, Disposition::LeaveCard)
            .map_err(Into::into)
    }

    /// Disconnect, leaving the card powered
    pub(crate) fn disconnect(self) {
        if let Err((_, e)) = self.card.disconnect(Disposition::LeaveCard) {
            debug!("Disconnect from {} failed: {}", self.reader_name, e);
        }
    }
}

impl CardTransport for PcscTransport {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        if self.log_apdus {
            debug!(">> {}", hex::encode_upper(command));
        } else {
            trace!(">> {}", hex::encode_upper(command));
        }

        let mut response_buffer = [0u8; MAX_BUFFER_SIZE_EXTENDED];
        let response = match self.card.transmit(command, &mut response_buffer) {
            Ok(response) => Bytes::copy_from_slice(response),
            Err(pcsc::Error::RemovedCard) => return Err(PcscError::NoCard(self.reader_name.clone())),
            Err(e) => return Err(e.into()),
        };

        if self.log_apdus {
            debug!("<< {}", hex::encode_upper(&response));
        } else {
            trace!("<< {}", hex::encode_upper(&response));
        }
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Transport answering from a queue of canned responses
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedTransport {
        pub(crate) sent: Vec<Vec<u8>>,
        pub(crate) responses: VecDeque<Vec<u8>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(responses: &[&[u8]]) -> Self {
            Self {
                sent: Vec::new(),
                responses: responses.iter().map(|r| r.to_vec()).collect(),
            }
        }
    }

    impl CardTransport for ScriptedTransport {
        fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
            self.sent.push(command.to_vec());
            self.responses
                .pop_front()
                .map(Bytes::from)
                .ok_or(PcscError::NotConnected)
        }
    }

    #[test]
    fn test_get_response_chain() {
        let mut transport =
            ScriptedTransport::new(&[&[0x01, 0x61, 0x02], &[0x02, 0x03, 0x90, 0x00]]);
        let response = transport
            .exchange(&Command::new(0x00, 0xB0, 0x00, 0x00).with_le(0x00), 10)
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.data.as_ref(), &[0x01, 0x02, 0x03]);
        assert_eq!(transport.sent[1], vec![0x00, 0xC0, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_wrong_le_retry() {
        let mut transport = ScriptedTransport::new(&[&[0x6C, 0x04], &[1, 2, 3, 4, 0x90, 0x00]]);
        let response = transport
            .exchange(&Command::new(0x00, 0xB0, 0x00, 0x00).with_le(0xFF), 10)
            .unwrap();
        assert_eq!(response.data.len(), 4);
        assert_eq!(transport.sent[1], vec![0x00, 0xB0, 0x00, 0x00, 0x04]);
    }

    #[test]
    fn test_chain_limit() {
        let mut transport = ScriptedTransport::new(&[&[0x61, 0x01], &[0x00, 0x61, 0x01]]);
        let result = transport.exchange(&Command::new(0x00, 0xCA, 0x00, 0x00).with_le(0x00), 1);
        assert!(matches!(result, Err(PcscError::ChainLimitExceeded)));
    }

    #[test]
    fn test_command_chaining_stops_on_error() {
        let mut transport = ScriptedTransport::new(&[&[0x6A, 0x80]]);
        let command = Command::new(0x00, 0x2A, 0x80, 0x86).with_data(vec![0u8; 300]);
        let response = transport.exchange(&command, 10).unwrap();
        assert_eq!((response.sw1, response.sw2), (0x6A, 0x80));
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.sent[0][0], 0x10);
    }
}

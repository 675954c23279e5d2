//! One complete sign or decipher run

use std::{fmt, path::PathBuf};

use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    authenticator::authenticate,
    credentials::CredentialProvider,
    dispatch::execute,
    error::Result,
    io,
    layer::CardBackend,
    resolver::resolve_key,
    session::{CardSession, SessionConfig},
    types::{CryptoFlags, CryptoRequest, Operation},
};

/// Options of a run
#[derive(Clone)]
pub struct Options {
    /// Operation to perform
    pub operation: Operation,
    /// Reader selection and debug level
    pub session: SessionConfig,
    /// Hex identifier of the key, first key when absent
    pub key_id: Option<String>,
    /// Input file
    pub input: PathBuf,
    /// Output file, standard output when absent
    pub output: Option<PathBuf>,
    /// Hash and padding flags
    pub flags: CryptoFlags,
    /// PIN given up front, prompted for when absent
    pub pin: Option<Zeroizing<String>>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("operation", &self.operation)
            .field("session", &self.session)
            .field("key_id", &self.key_id)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("flags", &self.flags)
            .field("pin", &self.pin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Options {
    /// Options for `operation` on `input`, everything else defaulted
    pub fn new(operation: Operation, input: impl Into<PathBuf>) -> Self {
        Self {
            operation,
            session: SessionConfig::default(),
            key_id: None,
            input: input.into(),
            output: None,
            flags: CryptoFlags::default(),
            pin: None,
        }
    }
}

/// Open the card, resolve and unlock the key, run the operation and write the result
///
/// The session is released on every path, once, after the output is written or the first
/// failure occurred. Nothing is written when the operation fails.
pub fn run<B: CardBackend>(
    backend: B,
    options: &Options,
    credentials: &mut dyn CredentialProvider,
) -> Result<()> {
    let mut session = CardSession::open(backend, &options.session)?;

    let key = resolve_key(&mut session, options.key_id.as_deref())?;
    authenticate(
        &mut session,
        &key,
        options.pin.as_ref().map(|pin| pin.as_str()),
        credentials,
    )?;

    let input = io::read_input(&options.input)?;
    debug!(bytes = input.len(), "Read input");
    let request = CryptoRequest::new(options.operation, input, options.flags);
    let result = execute(&mut session, &key, &request, credentials)?;

    io::write_output(options.output.as_deref(), result.as_bytes())?;
    session.close();
    Ok(())
}

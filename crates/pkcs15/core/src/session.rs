//! Operation session: acquisition and release of the card

use std::fmt;

use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    layer::CardBackend,
};

/// Session settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Reader index
    pub reader: usize,
    /// Debug level handed to the card layer
    pub debug: u8,
}

impl SessionConfig {
    /// Session on the reader at `reader`
    pub const fn new(reader: usize) -> Self {
        Self { reader, debug: 0 }
    }

    /// Set the debug level
    pub const fn with_debug(mut self, debug: u8) -> Self {
        self.debug = debug;
        self
    }
}

/// Resources acquired so far, released in reverse
#[derive(Debug, Default, Clone, Copy)]
struct Acquired {
    context: bool,
    card: bool,
    lock: bool,
    token: bool,
}

/// An open card session
///
/// Opening acquires the context, the card connection, the card lock and the PKCS#15 binding in
/// that order. Whatever was acquired is released exactly once, in reverse order, on
/// [`CardSession::close`] or on drop, including when opening fails halfway.
pub struct CardSession<B: CardBackend> {
    backend: B,
    reader: Option<usize>,
    label: Option<String>,
    acquired: Acquired,
}

impl<B: CardBackend> fmt::Debug for CardSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardSession")
            .field("reader", &self.reader)
            .field("label", &self.label)
            .field("acquired", &self.acquired)
            .finish_non_exhaustive()
    }
}

impl<B: CardBackend> CardSession<B> {
    /// Open a session on the configured reader
    pub fn open(backend: B, config: &SessionConfig) -> Result<Self> {
        let mut session = Self {
            backend,
            reader: None,
            label: None,
            acquired: Acquired::default(),
        };

        let count = session
            .backend
            .establish_context(config.debug)
            .map_err(Error::ContextFailed)?;
        session.acquired.context = true;
        debug!(readers = count, "Context established");

        if config.reader >= count {
            return Err(Error::ReaderIndexInvalid {
                index: config.reader,
                count,
            });
        }
        session.reader = Some(config.reader);

        let reader = session
            .backend
            .reader_name(config.reader)
            .unwrap_or_else(|| format!("#{}", config.reader));
        match session.backend.detect_card_presence(config.reader) {
            Ok(true) => {}
            Ok(false) => return Err(Error::CardAbsent { reader }),
            Err(e) => {
                debug!("Card presence detection failed: {}", e);
                return Err(Error::CardAbsent { reader });
            }
        }

        info!("Connecting to card in reader {}...", reader);
        session
            .backend
            .connect(config.reader)
            .map_err(Error::ConnectFailed)?;
        session.acquired.card = true;

        session.backend.lock().map_err(Error::LockFailed)?;
        session.acquired.lock = true;

        info!("Trying to find a PKCS #15 compatible card...");
        let label = session.backend.bind().map_err(Error::BindFailed)?;
        session.acquired.token = true;
        info!("Found {}!", label);
        session.label = Some(label);

        Ok(session)
    }

    /// Release everything acquired, in reverse order
    ///
    /// Calling this more than once has no further effect.
    pub fn close(&mut self) {
        if std::mem::take(&mut self.acquired.token) {
            self.backend.unbind();
        }
        if std::mem::take(&mut self.acquired.lock) {
            self.backend.unlock();
        }
        if std::mem::take(&mut self.acquired.card) {
            self.backend.disconnect();
        }
        if std::mem::take(&mut self.acquired.context) {
            self.backend.release_context();
            debug!("Session closed");
        }
    }

    /// The bound token
    pub const fn token(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Selected reader index
    pub const fn reader(&self) -> Option<usize> {
        self.reader
    }

    /// Label of the bound token
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether the PKCS#15 application is bound
    pub const fn is_open(&self) -> bool {
        self.acquired.token
    }
}

impl<B: CardBackend> Drop for CardSession<B> {
    fn drop(&mut self) {
        self.close();
    }
}

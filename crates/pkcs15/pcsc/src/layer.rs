//! PC/SC implementation of the card lifecycle and PKCS#15 token traits

use std::{ffi::CString, fmt};

use nexum_pkcs15_core::{
    CardError, CardLayer, CryptoFlags, ExtractedKey, Id, Pin, Pkcs15Token, PrivateKey, PublicKey,
    PublicKeyMaterial,
};
use pcsc::{Context, ReaderState, Scope, State};
use tracing::{debug, warn};

use crate::{
    config::Pkcs15Config, error::PcscError, pkcs15::Pkcs15App, transport::PcscTransport,
};

/// PKCS#15 card layer over a PC/SC reader
pub struct PcscCardLayer {
    /// Layer configuration
    config: Pkcs15Config,
    /// PC/SC context, once established
    context: Option<Context>,
    /// Readers known to the context
    readers: Vec<CString>,
    /// Log APDUs at debug level
    log_apdus: bool,
    /// PKCS#15 application on the connected card
    app: Option<Pkcs15App<PcscTransport>>,
}

impl fmt::Debug for PcscCardLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscCardLayer")
            .field("config", &self.config)
            .field("context", &self.context.is_some())
            .field("readers", &self.readers)
            .field("connected", &self.app.is_some())
            .finish()
    }
}

impl Default for PcscCardLayer {
    fn default() -> Self {
        Self::new(Pkcs15Config::default())
    }
}

impl PcscCardLayer {
    /// Create a layer with the given configuration
    pub const fn new(config: Pkcs15Config) -> Self {
        Self {
            config,
            context: None,
            readers: Vec::new(),
            log_apdus: false,
            app: None,
        }
    }

    /// Get the configuration
    pub const fn config(&self) -> &Pkcs15Config {
        &self.config
    }

    fn context(&self) -> Result<&Context, PcscError> {
        self.context.as_ref().ok_or(PcscError::NoContext)
    }

    fn reader(&self, index: usize) -> Result<&CString, PcscError> {
        self.readers
            .get(index)
            .ok_or(PcscError::ReaderNotFound(index))
    }

    fn app(&mut self) -> Result<&mut Pkcs15App<PcscTransport>, PcscError> {
        self.app.as_mut().ok_or(PcscError::NotConnected)
    }

    fn reconnect(&mut self, mode: pcsc::ShareMode) -> Result<(), PcscError> {
        self.app()?.transport_mut().reconnect(mode)
    }
}

impl CardLayer for PcscCardLayer {
    fn establish_context(&mut self, debug: u8) -> Result<usize, CardError> {
        let context = Context::establish(Scope::User).map_err(PcscError::from)?;
        self.readers = match context.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(e) => return Err(PcscError::from(e).into()),
        };
        debug!("PC/SC context established, {} readers", self.readers.len());

        self.log_apdus = debug > 0;
        self.context = Some(context);
        Ok(self.readers.len())
    }

    fn reader_name(&self, index: usize) -> Option<String> {
        self.readers
            .get(index)
            .map(|name| name.to_string_lossy().into_owned())
    }

    fn detect_card_presence(&mut self, index: usize) -> Result<bool, CardError> {
        let reader = self.reader(index)?;
        let mut states = [ReaderState::new(reader.as_c_str(), State::UNAWARE)];
        self.context()?
            .get_status_change(None, &mut states)
            .map_err(PcscError::from)?;

        let state = states[0].event_state();
        Ok(state.contains(State::PRESENT) && !state.contains(State::EMPTY))
    }

    fn connect(&mut self, index: usize) -> Result<(), CardError> {
        let reader = self.reader(index)?.clone();
        let card = self
            .context()?
            .connect(&reader, self.config.share_mode.into(), self.config.protocols)
            .map_err(|e| match e {
                pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard => {
                    PcscError::NoCard(reader.to_string_lossy().into_owned())
                }
                e => e.into(),
            })?;

        let transport = PcscTransport::new(
            card,
            reader.to_string_lossy().into_owned(),
            self.log_apdus,
        );
        self.app = Some(Pkcs15App::new(transport, self.config.clone()));
        Ok(())
    }

    /// Take exclusive access by reconnecting in exclusive share mode
    ///
    /// A `pcsc::Transaction` borrows the card and cannot outlive this call, so the lock is held
    /// through the share mode instead. The reconnect leaves the card untouched
    /// (`Disposition::LeaveCard`) and runs before `bind`, so no selected file state is lost.
    fn lock(&mut self) -> Result<(), CardError> {
        self.reconnect(pcsc::ShareMode::Exclusive)?;
        debug!("Card locked for exclusive access");
        Ok(())
    }

    fn bind(&mut self) -> Result<String, CardError> {
        Ok(self.app()?.bind()?)
    }

    fn unbind(&mut self) {
        if let Some(app) = self.app.as_mut() {
            app.unbind();
        }
    }

    /// Return to shared mode, again without resetting the card
    fn unlock(&mut self) {
        if let Err(e) = self.reconnect(pcsc::ShareMode::Shared) {
            warn!("Unable to release exclusive access: {}", e);
        }
    }

    fn disconnect(&mut self) {
        if let Some(app) = self.app.take() {
            app.into_transport().disconnect();
        }
    }

    fn release_context(&mut self) {
        self.readers.clear();
        if let Some(context) = self.context.take() {
            if let Err((_, e)) = context.release() {
                debug!("Context release failed: {}", e);
            }
        }
    }
}

impl Pkcs15Token for PcscCardLayer {
    fn private_keys(&mut self, limit: usize) -> Result<Vec<PrivateKey>, CardError> {
        let keys = self.app()?.private_keys()?;
        Ok(keys.iter().take(limit).cloned().collect())
    }

    fn find_pin(&mut self, auth_id: &Id) -> Result<Option<Pin>, CardError> {
        Ok(self.app()?.find_pin(auth_id)?)
    }

    fn find_public_key(&mut self, id: &Id) -> Result<Option<PublicKey>, CardError> {
        Ok(self.app()?.find_public_key(id)?)
    }

    fn read_public_key(&mut self, key: &PublicKey) -> Result<PublicKeyMaterial, CardError> {
        Ok(self.app()?.read_public_key(key)?)
    }

    fn read_private_key(
        &mut self,
        key: &PrivateKey,
        passphrase: Option<&str>,
    ) -> Result<ExtractedKey, CardError> {
        Ok(self.app()?.read_private_key(key, passphrase)?)
    }

    fn verify_pin(&mut self, pin: &Pin, value: &[u8]) -> Result<(), CardError> {
        Ok(self.app()?.verify_pin(pin, value)?)
    }

    fn compute_signature(
        &mut self,
        key: &PrivateKey,
        flags: CryptoFlags,
        input: &[u8],
    ) -> Result<Vec<u8>, CardError> {
        Ok(self.app()?.compute_signature(key, flags, input)?)
    }

    fn decipher(
        &mut self,
        key: &PrivateKey,
        flags: CryptoFlags,
        input: &[u8],
    ) -> Result<Vec<u8>, CardError> {
        Ok(self.app()?.decipher(key, flags, input)?)
    }
}

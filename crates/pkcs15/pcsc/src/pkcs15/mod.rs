//! PKCS#15 application on an ISO 7816-4 file system

mod der;
mod keyfile;
mod objects;
#[cfg(test)]
pub(crate) mod simulator;

use nexum_pkcs15_core::{
    CryptoFlags, ExtractedKey, Id, Pin, PrivateKey, PublicKey, PublicKeyMaterial,
};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use self::objects::Odf;
use crate::{
    apdu::{Command, Response},
    config::Pkcs15Config,
    error::PcscError,
    security::{self, Template},
    transport::CardTransport,
};

/// Master file identifier
const MASTER_FILE: [u8; 2] = [0x3F, 0x00];

/// EF(ODF), relative to the application DF
const ODF_FILE: [u8; 2] = [0x50, 0x31];

/// EF(TokenInfo), relative to the application DF
const TOKEN_INFO_FILE: [u8; 2] = [0x50, 0x32];

/// Largest offset addressable by READ BINARY with P1 bit 8 clear
const MAX_READ_OFFSET: usize = 0x7FFF;

/// PKCS#15 application bound to a card
///
/// Directory files are read lazily and cached until [`Pkcs15App::unbind`].
#[derive(Debug)]
pub struct Pkcs15App<T> {
    transport: T,
    config: Pkcs15Config,
    odf: Option<Odf>,
    label: Option<String>,
    private_keys: Option<Vec<PrivateKey>>,
    public_keys: Option<Vec<PublicKey>>,
    pins: Option<Vec<Pin>>,
}

impl<T: CardTransport> Pkcs15App<T> {
    /// Create an unbound application over a transport
    pub const fn new(transport: T, config: Pkcs15Config) -> Self {
        Self {
            transport,
            config,
            odf: None,
            label: None,
            private_keys: None,
            public_keys: None,
            pins: None,
        }
    }

    /// Get a reference to the transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the application and return the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Whether [`Pkcs15App::bind`] succeeded and has not been undone
    pub const fn is_bound(&self) -> bool {
        self.odf.is_some()
    }

    /// Token label read at bind time
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Select the application and read its ODF and TokenInfo
    ///
    /// Returns the token label. A missing TokenInfo is tolerated; a missing ODF is not.
    pub fn bind(&mut self) -> Result<String, PcscError> {
        self.unbind();
        self.select_application()?;

        let odf = objects::parse_odf(&self.read_file(&ODF_FILE)?)?;
        debug!(
            "ODF lists {} PrKDF, {} PuKDF and {} AODF files",
            odf.private_keys.len(),
            odf.public_keys.len(),
            odf.auth_objects.len()
        );

        let label = match self
            .read_file(&TOKEN_INFO_FILE)
            .and_then(|info| objects::parse_token_label(&info))
        {
            Ok(label) => label,
            Err(e) => {
                warn!("Unable to read TokenInfo: {}", e);
                None
            }
        };

        self.odf = Some(odf);
        self.label = label;
        Ok(self.label.clone().unwrap_or_else(|| "PKCS #15 token".to_string()))
    }

    /// Forget the bound application and cached directories
    pub fn unbind(&mut self) {
        self.odf = None;
        self.label = None;
        self.private_keys = None;
        self.public_keys = None;
        self.pins = None;
    }

    fn odf(&self) -> Result<&Odf, PcscError> {
        self.odf.as_ref().ok_or(PcscError::NotBound)
    }

    /// Private key objects from all PrKDF files
    pub fn private_keys(&mut self) -> Result<&[PrivateKey], PcscError> {
        if self.private_keys.is_none() {
            let paths = self.odf()?.private_keys.clone();
            self.private_keys = Some(self.read_directory(&paths, objects::parse_private_keys)?);
        }
        Ok(self.private_keys.as_deref().unwrap_or_default())
    }

    /// Public key objects from all PuKDF files
    pub fn public_keys(&mut self) -> Result<&[PublicKey], PcscError> {
        if self.public_keys.is_none() {
            let odf = self.odf()?;
            let paths = [odf.public_keys.as_slice(), odf.trusted_public_keys.as_slice()].concat();
            self.public_keys = Some(self.read_directory(&paths, objects::parse_public_keys)?);
        }
        Ok(self.public_keys.as_deref().unwrap_or_default())
    }

    /// PIN objects from all AODF files
    pub fn pins(&mut self) -> Result<&[Pin], PcscError> {
        if self.pins.is_none() {
            let paths = self.odf()?.auth_objects.clone();
            self.pins = Some(self.read_directory(&paths, objects::parse_pins)?);
        }
        Ok(self.pins.as_deref().unwrap_or_default())
    }

    fn read_directory<O>(
        &mut self,
        paths: &[Vec<u8>],
        parse: fn(&[u8]) -> Result<Vec<O>, PcscError>,
    ) -> Result<Vec<O>, PcscError> {
        let mut entries = Vec::new();
        for path in paths {
            entries.extend(parse(&self.read_file(path)?)?);
        }
        Ok(entries)
    }

    /// PIN object with the given authentication id
    pub fn find_pin(&mut self, auth_id: &Id) -> Result<Option<Pin>, PcscError> {
        Ok(self.pins()?.iter().find(|p| &p.auth_id == auth_id).cloned())
    }

    /// Public key object with the given id
    pub fn find_public_key(&mut self, id: &Id) -> Result<Option<PublicKey>, PcscError> {
        Ok(self.public_keys()?.iter().find(|k| &k.id == id).cloned())
    }

    /// Read and decode the value of a public key object
    pub fn read_public_key(&mut self, key: &PublicKey) -> Result<PublicKeyMaterial, PcscError> {
        let data = self.read_file(&key.handle.path)?;
        keyfile::decode_public_key(key.algorithm, &data)
    }

    /// Read and decode the private key file of a key object
    pub fn read_private_key(
        &mut self,
        key: &PrivateKey,
        passphrase: Option<&str>,
    ) -> Result<ExtractedKey, PcscError> {
        let data = Zeroizing::new(self.read_file(&key.handle.path)?);
        keyfile::decode_private_key(&data, passphrase)
    }

    /// Verify a PIN in the DF that holds it
    pub fn verify_pin(&mut self, pin: &Pin, value: &[u8]) -> Result<(), PcscError> {
        if pin.handle.path.is_empty() {
            self.select_application()?;
        } else {
            self.select(&pin.handle.path)?;
        }
        self.transmit(&security::verify(pin, value)?)?.into_result()?;
        Ok(())
    }

    /// Compute a signature with an on-card key
    pub fn compute_signature(
        &mut self,
        key: &PrivateKey,
        flags: CryptoFlags,
        input: &[u8],
    ) -> Result<Vec<u8>, PcscError> {
        let block = security::signature_input(key, flags, input)?;
        self.select_application()?;
        let mse = security::manage_security_environment(Template::Signature, key)?;
        self.transmit(&mse)?.into_result()?;
        let signature = self
            .transmit(&security::compute_digital_signature(block))?
            .into_result()?;
        Ok(signature.to_vec())
    }

    /// Decipher with an on-card key
    pub fn decipher(
        &mut self,
        key: &PrivateKey,
        flags: CryptoFlags,
        input: &[u8],
    ) -> Result<Vec<u8>, PcscError> {
        self.select_application()?;
        let mse = security::manage_security_environment(Template::Decipher, key)?;
        self.transmit(&mse)?.into_result()?;
        let block = self.transmit(&security::decipher(input))?.into_result()?;
        security::decipher_output(flags, block.to_vec())
    }

    fn transmit(&mut self, command: &Command) -> Result<Response, PcscError> {
        self.transport
            .exchange(command, self.config.max_get_response)
    }

    /// Absolute form of a path; relative paths live under the application DF
    fn absolute_path(&self, path: &[u8]) -> Vec<u8> {
        if path.starts_with(&MASTER_FILE) {
            path.to_vec()
        } else {
            [self.config.application_path.as_slice(), path].concat()
        }
    }

    fn select_application(&mut self) -> Result<(), PcscError> {
        let path = self.config.application_path.clone();
        self.select(&path).map(|_| ())
    }

    /// SELECT by path from the MF, returning the file size when the card reports one
    fn select(&mut self, path: &[u8]) -> Result<Option<usize>, PcscError> {
        let path = self.absolute_path(path);
        if path.len() % 2 != 0 {
            return Err(PcscError::InvalidData("odd path length"));
        }
        debug!("Selecting {}", hex::encode_upper(&path));

        let command = match path.strip_prefix(&MASTER_FILE) {
            Some([]) => Command::new(0x00, 0xA4, 0x00, 0x04).with_data(MASTER_FILE.to_vec()),
            Some(rest) => Command::new(0x00, 0xA4, 0x08, 0x04).with_data(rest.to_vec()),
            None => return Err(PcscError::InvalidData("path not absolute")),
        };
        let response = self.transmit(&command.with_le(0x00))?.into_result()?;
        Ok(file_size(&response))
    }

    /// Read a whole transparent file
    fn read_file(&mut self, path: &[u8]) -> Result<Vec<u8>, PcscError> {
        let size = self.select(path)?;
        let chunk = usize::from(self.config.read_chunk_size.max(1));
        let mut content = Vec::with_capacity(size.unwrap_or(chunk));

        loop {
            let offset = content.len();
            let wanted = match size {
                Some(size) if offset >= size => break,
                Some(size) => chunk.min(size - offset),
                None => chunk,
            };
            if offset > MAX_READ_OFFSET {
                warn!("File {} exceeds the READ BINARY offset range", hex::encode_upper(path));
                break;
            }

            let read = Command::new(0x00, 0xB0, (offset >> 8) as u8, offset as u8)
                .with_le(wanted as u8);
            let response = self.transmit(&read)?;
            match (response.sw1, response.sw2) {
                (0x90, 0x00) => {
                    content.extend_from_slice(&response.data);
                    if response.data.len() < wanted {
                        break;
                    }
                }
                // end of file reached before Le bytes
                (0x62, 0x82) => {
                    content.extend_from_slice(&response.data);
                    break;
                }
                // offset beyond end of file
                (0x6B, 0x00) => break,
                (sw1, sw2) => return Err(PcscError::Status { sw1, sw2 }),
            }
        }

        debug!("Read {} bytes from {}", content.len(), hex::encode_upper(path));
        Ok(content)
    }
}

/// File size from the FCP template (`62`) or FCI (`6F`) of a SELECT response
fn file_size(response: &[u8]) -> Option<usize> {
    let template = der::parse_one(response).ok()?;
    let size = der::find(der::children(&template).ok()?, der::context(0))?;
    der::small_integer(size).ok()
}

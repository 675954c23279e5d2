//! Card abstraction layer seams
//!
//! [`CardLayer`] covers the lifecycle of a card connection and [`Pkcs15Token`] the PKCS#15
//! application bound on top of it. The pipeline only ever talks to a [`CardBackend`], which is
//! any type implementing both.

use crate::{
    error::CardError,
    types::{CryptoFlags, ExtractedKey, Id, Pin, PrivateKey, PublicKey, PublicKeyMaterial},
};

/// Lifecycle of a card connection
///
/// Every acquiring method has a releasing counterpart. Releasing methods are best effort and
/// never fail; the session calls each of them at most once and only after the matching acquire
/// succeeded.
pub trait CardLayer {
    /// Establish the context and return the number of configured readers
    fn establish_context(&mut self, debug: u8) -> Result<usize, CardError>;

    /// Name of the reader at `index`, if known
    fn reader_name(&self, index: usize) -> Option<String>;

    /// Whether a card is present in the reader at `index`
    fn detect_card_presence(&mut self, index: usize) -> Result<bool, CardError>;

    /// Connect to the card in the reader at `index`
    fn connect(&mut self, index: usize) -> Result<(), CardError>;

    /// Take exclusive access to the card
    fn lock(&mut self) -> Result<(), CardError>;

    /// Bind the PKCS#15 application and return the token label
    fn bind(&mut self) -> Result<String, CardError>;

    /// Release the PKCS#15 application
    fn unbind(&mut self);

    /// Give up exclusive access
    fn unlock(&mut self);

    /// Disconnect from the card, leaving it powered
    fn disconnect(&mut self);

    /// Release the context
    fn release_context(&mut self);
}

/// Object access and operations on a bound PKCS#15 token
pub trait Pkcs15Token {
    /// Private key objects, in card order, at most `limit` of them
    fn private_keys(&mut self, limit: usize) -> Result<Vec<PrivateKey>, CardError>;

    /// PIN object with the given authentication id
    fn find_pin(&mut self, auth_id: &Id) -> Result<Option<Pin>, CardError>;

    /// Public key object with the given id
    fn find_public_key(&mut self, id: &Id) -> Result<Option<PublicKey>, CardError>;

    /// Read the key material of a public key object
    fn read_public_key(&mut self, key: &PublicKey) -> Result<PublicKeyMaterial, CardError>;

    /// Read the private key file of a key object
    ///
    /// Fails with [`CardError::PassphraseRequired`] when the container is protected and
    /// `passphrase` is `None`.
    fn read_private_key(
        &mut self,
        key: &PrivateKey,
        passphrase: Option<&str>,
    ) -> Result<ExtractedKey, CardError>;

    /// Verify a PIN
    fn verify_pin(&mut self, pin: &Pin, value: &[u8]) -> Result<(), CardError>;

    /// Compute a signature with a native key
    fn compute_signature(
        &mut self,
        key: &PrivateKey,
        flags: CryptoFlags,
        input: &[u8],
    ) -> Result<Vec<u8>, CardError>;

    /// Decipher with a native key
    fn decipher(
        &mut self,
        key: &PrivateKey,
        flags: CryptoFlags,
        input: &[u8],
    ) -> Result<Vec<u8>, CardError>;
}

/// Card layer with a PKCS#15 token on top
pub trait CardBackend: CardLayer + Pkcs15Token {}

impl<T> CardBackend for T where T: CardLayer + Pkcs15Token {}

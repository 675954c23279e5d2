//! Recording card double for pipeline tests

use std::{cell::RefCell, rc::Rc, sync::OnceLock};

use zeroize::Zeroizing;

use crate::{
    credentials::CredentialProvider,
    error::CardError,
    layer::{CardLayer, Pkcs15Token},
    types::{
        CryptoFlags, ExtractedKey, Id, KeyAlgorithm, ObjectHandle, Pin, PrivateKey, PublicKey,
        PublicKeyMaterial,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    EstablishContext,
    DetectCardPresence(usize),
    Connect(usize),
    Lock,
    Bind,
    Unbind,
    Unlock,
    Disconnect,
    ReleaseContext,
    PrivateKeys,
    FindPin,
    FindPublicKey,
    ReadPublicKey,
    ReadPrivateKey(Option<String>),
    VerifyPin(Vec<u8>),
    ComputeSignature(CryptoFlags, Vec<u8>),
    Decipher(CryptoFlags, Vec<u8>),
}

impl Call {
    pub(crate) const fn is_crypto(&self) -> bool {
        matches!(
            self,
            Self::ReadPrivateKey(_) | Self::ComputeSignature(..) | Self::Decipher(..)
        )
    }
}

/// Stage at which the mock fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailAt {
    Context,
    Connect,
    Lock,
    Bind,
    Enumerate,
}

#[derive(Debug)]
pub(crate) struct MockCard {
    pub(crate) calls: Rc<RefCell<Vec<Call>>>,
    pub(crate) readers: usize,
    pub(crate) card_present: bool,
    pub(crate) fail_at: Option<FailAt>,
    pub(crate) keys: Vec<PrivateKey>,
    pub(crate) pins: Vec<Pin>,
    pub(crate) correct_pin: Vec<u8>,
    pub(crate) public_keys: Vec<(PublicKey, PublicKeyMaterial)>,
    pub(crate) private_key: Option<ExtractedKey>,
    pub(crate) passphrase: Option<String>,
    pub(crate) card_output: Vec<u8>,
}

impl MockCard {
    pub(crate) fn new() -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            readers: 1,
            card_present: true,
            fail_at: None,
            keys: Vec::new(),
            pins: Vec::new(),
            correct_pin: b"1234".to_vec(),
            public_keys: Vec::new(),
            private_key: None,
            passphrase: None,
            card_output: vec![0x5A; 128],
        }
    }

    pub(crate) fn with_key(mut self, key: PrivateKey) -> Self {
        self.keys.push(key);
        self
    }

    pub(crate) fn with_pin(mut self, pin: Pin) -> Self {
        self.pins.push(pin);
        self
    }

    pub(crate) fn failing_at(mut self, stage: FailAt) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Handle onto the call log, usable after the mock moved into a session
    pub(crate) fn log(&self) -> Rc<RefCell<Vec<Call>>> {
        Rc::clone(&self.calls)
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn fail(&self, stage: FailAt) -> Result<(), CardError> {
        if self.fail_at == Some(stage) {
            return Err(CardError::Message(format!("{stage:?} failed")));
        }
        Ok(())
    }
}

impl CardLayer for MockCard {
    fn establish_context(&mut self, _debug: u8) -> Result<usize, CardError> {
        self.record(Call::EstablishContext);
        self.fail(FailAt::Context)?;
        Ok(self.readers)
    }

    fn reader_name(&self, index: usize) -> Option<String> {
        (index < self.readers).then(|| format!("Mock Reader {index:02}"))
    }

    fn detect_card_presence(&mut self, index: usize) -> Result<bool, CardError> {
        self.record(Call::DetectCardPresence(index));
        Ok(self.card_present)
    }

    fn connect(&mut self, index: usize) -> Result<(), CardError> {
        self.record(Call::Connect(index));
        self.fail(FailAt::Connect)
    }

    fn lock(&mut self) -> Result<(), CardError> {
        self.record(Call::Lock);
        self.fail(FailAt::Lock)
    }

    fn bind(&mut self) -> Result<String, CardError> {
        self.record(Call::Bind);
        self.fail(FailAt::Bind)?;
        Ok("Mock Token".to_string())
    }

    fn unbind(&mut self) {
        self.record(Call::Unbind);
    }

    fn unlock(&mut self) {
        self.record(Call::Unlock);
    }

    fn disconnect(&mut self) {
        self.record(Call::Disconnect);
    }

    fn release_context(&mut self) {
        self.record(Call::ReleaseContext);
    }
}

impl Pkcs15Token for MockCard {
    fn private_keys(&mut self, limit: usize) -> Result<Vec<PrivateKey>, CardError> {
        self.record(Call::PrivateKeys);
        self.fail(FailAt::Enumerate)?;
        Ok(self.keys.iter().take(limit).cloned().collect())
    }

    fn find_pin(&mut self, auth_id: &Id) -> Result<Option<Pin>, CardError> {
        self.record(Call::FindPin);
        Ok(self.pins.iter().find(|p| &p.auth_id == auth_id).cloned())
    }

    fn find_public_key(&mut self, id: &Id) -> Result<Option<PublicKey>, CardError> {
        self.record(Call::FindPublicKey);
        Ok(self
            .public_keys
            .iter()
            .find(|(key, _)| &key.id == id)
            .map(|(key, _)| key.clone()))
    }

    fn read_public_key(&mut self, key: &PublicKey) -> Result<PublicKeyMaterial, CardError> {
        self.record(Call::ReadPublicKey);
        self.public_keys
            .iter()
            .find(|(candidate, _)| candidate.id == key.id)
            .map(|(_, material)| material.clone())
            .ok_or(CardError::ObjectNotFound)
    }

    fn read_private_key(
        &mut self,
        _key: &PrivateKey,
        passphrase: Option<&str>,
    ) -> Result<ExtractedKey, CardError> {
        self.record(Call::ReadPrivateKey(passphrase.map(str::to_string)));
        match (&self.passphrase, passphrase) {
            (Some(_), None) => return Err(CardError::PassphraseRequired),
            (Some(expected), Some(given)) if expected != given => {
                return Err(CardError::IncorrectPassphrase);
            }
            _ => {}
        }
        self.private_key.clone().ok_or(CardError::ObjectNotFound)
    }

    fn verify_pin(&mut self, _pin: &Pin, value: &[u8]) -> Result<(), CardError> {
        self.record(Call::VerifyPin(value.to_vec()));
        if value == self.correct_pin.as_slice() {
            Ok(())
        } else {
            Err(CardError::PinIncorrect {
                tries_left: Some(2),
            })
        }
    }

    fn compute_signature(
        &mut self,
        _key: &PrivateKey,
        flags: CryptoFlags,
        input: &[u8],
    ) -> Result<Vec<u8>, CardError> {
        self.record(Call::ComputeSignature(flags, input.to_vec()));
        Ok(self.card_output.clone())
    }

    fn decipher(
        &mut self,
        _key: &PrivateKey,
        flags: CryptoFlags,
        input: &[u8],
    ) -> Result<Vec<u8>, CardError> {
        self.record(Call::Decipher(flags, input.to_vec()));
        Ok(self.card_output.clone())
    }
}

/// Credential provider answering from scripted queues
#[derive(Debug, Default)]
pub(crate) struct ScriptedCredentials {
    pub(crate) pins: Vec<String>,
    pub(crate) passphrases: Vec<String>,
    pub(crate) pin_prompts: Vec<String>,
    pub(crate) passphrase_prompts: Vec<String>,
}

impl ScriptedCredentials {
    pub(crate) fn with_pins(pins: &[&str]) -> Self {
        Self {
            pins: pins.iter().rev().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn with_passphrase(passphrase: &str) -> Self {
        Self {
            passphrases: vec![passphrase.to_string()],
            ..Default::default()
        }
    }
}

impl CredentialProvider for ScriptedCredentials {
    fn request_pin(&mut self, prompt: &str) -> Option<Zeroizing<String>> {
        self.pin_prompts.push(prompt.to_string());
        self.pins.pop().map(Zeroizing::new)
    }

    fn request_passphrase(&mut self, prompt: &str) -> Option<Zeroizing<String>> {
        self.passphrase_prompts.push(prompt.to_string());
        self.passphrases.pop().map(Zeroizing::new)
    }
}

pub(crate) fn rsa_key(id: u8, native: bool, modulus_bits: usize) -> PrivateKey {
    PrivateKey {
        label: format!("RSA key {id:02x}"),
        id: Id::new([id]),
        auth_id: Some(Id::new([0x01])),
        algorithm: KeyAlgorithm::Rsa,
        modulus_bits,
        native,
        handle: ObjectHandle::default(),
    }
}

pub(crate) fn dsa_key(id: u8) -> PrivateKey {
    PrivateKey {
        label: format!("DSA key {id:02x}"),
        id: Id::new([id]),
        auth_id: None,
        algorithm: KeyAlgorithm::Dsa,
        modulus_bits: 1024,
        native: false,
        handle: ObjectHandle::default(),
    }
}

pub(crate) fn user_pin(min: usize, max: usize) -> Pin {
    Pin {
        label: "User PIN".to_string(),
        auth_id: Id::new([0x01]),
        min_length: min,
        stored_length: max,
        max_length: max,
        needs_padding: false,
        pad_char: 0xFF,
        handle: ObjectHandle::default(),
    }
}

pub(crate) fn rsa_fixture() -> (&'static rsa::RsaPrivateKey, &'static crate::types::RsaPrivate) {
    use rsa::traits::{PrivateKeyParts, PublicKeyParts};

    static KEY: OnceLock<(rsa::RsaPrivateKey, crate::types::RsaPrivate)> = OnceLock::new();
    let (private, material) = KEY.get_or_init(|| {
        let private = rsa::RsaPrivateKey::new(&mut rand_v8::thread_rng(), 1024)
            .expect("RSA key generation");
        let primes = private.primes();
        let material = crate::types::RsaPrivate {
            modulus: private.n().to_bytes_be(),
            public_exponent: private.e().to_bytes_be(),
            private_exponent: private.d().to_bytes_be(),
            p: primes[0].to_bytes_be(),
            q: primes[1].to_bytes_be(),
        };
        (private, material)
    });
    (private, material)
}

#[allow(deprecated)]
pub(crate) fn dsa_fixture() -> (&'static dsa::SigningKey, &'static crate::types::DsaPrivate) {
    static KEY: OnceLock<(dsa::SigningKey, crate::types::DsaPrivate)> = OnceLock::new();
    let (signing_key, material) = KEY.get_or_init(|| {
        let mut rng = rand_v8::thread_rng();
        let components = dsa::Components::generate(&mut rng, dsa::KeySize::DSA_1024_160);
        let signing_key = dsa::SigningKey::generate(&mut rng, components);
        let verifying_key = signing_key.verifying_key();
        let components = verifying_key.components();
        let material = crate::types::DsaPrivate {
            private_scalar: signing_key.x().to_bytes_be(),
            public_scalar: verifying_key.y().to_bytes_be(),
            p: components.p().to_bytes_be(),
            q: components.q().to_bytes_be(),
            g: components.g().to_bytes_be(),
        };
        (signing_key, material)
    });
    (signing_key, material)
}

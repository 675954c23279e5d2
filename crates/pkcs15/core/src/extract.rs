//! Key extraction for non-native keys

use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    credentials::CredentialProvider,
    error::{CardError, Error, Result},
    layer::{CardBackend, Pkcs15Token},
    session::CardSession,
    types::{DsaPrivate, ExtractedKey, KeyAlgorithm, KeyMaterial, PrivateKey, PublicKeyMaterial},
};

const PASSPHRASE_PROMPT: &str = "Please enter pass phrase to unlock secret key: ";

/// Read the private key material of a non-native key
///
/// A protected container triggers one passphrase prompt and one retry. DSA keys are completed
/// with the public scalar and domain parameters of the public key sharing their id.
pub fn extract_key<B: CardBackend>(
    session: &mut CardSession<B>,
    key: &PrivateKey,
    credentials: &mut dyn CredentialProvider,
) -> Result<KeyMaterial> {
    let token = session.token();
    let extracted = match token.read_private_key(key, None) {
        Err(CardError::PassphraseRequired) => {
            debug!("Key container {} is passphrase protected", key.id);
            let passphrase = credentials
                .request_passphrase(PASSPHRASE_PROMPT)
                .filter(|p| !p.is_empty())
                .ok_or(Error::PassphraseRequired)?;
            token.read_private_key(key, Some(passphrase.as_str()))
        }
        other => other,
    }
    .map_err(Error::ExtractionFailed)?;

    match (key.algorithm, extracted) {
        (KeyAlgorithm::Rsa, ExtractedKey::Rsa(rsa)) => Ok(KeyMaterial::RsaPrivate(rsa)),
        (KeyAlgorithm::Dsa, ExtractedKey::Dsa(private_scalar)) => {
            complete_dsa_key(token, key, private_scalar).map(KeyMaterial::DsaPrivate)
        }
        _ => Err(Error::ExtractionFailed(CardError::InvalidData(
            "key file does not match the key algorithm",
        ))),
    }
}

fn complete_dsa_key<T: Pkcs15Token>(
    token: &mut T,
    key: &PrivateKey,
    mut private_scalar: Zeroizing<Vec<u8>>,
) -> Result<DsaPrivate> {
    let public = token
        .find_public_key(&key.id)
        .map_err(Error::ExtractionFailed)?
        .ok_or_else(|| Error::PublicKeyNotFound { id: key.id.clone() })?;

    match token.read_public_key(&public).map_err(Error::ExtractionFailed)? {
        PublicKeyMaterial::Dsa(public) => Ok(DsaPrivate::from_parts(
            std::mem::take(&mut *private_scalar),
            public,
        )),
        PublicKeyMaterial::Rsa { .. } => Err(Error::ExtractionFailed(CardError::InvalidData(
            "public key for DSA key is not a DSA key",
        ))),
    }
}

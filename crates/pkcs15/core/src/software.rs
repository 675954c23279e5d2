//! Software RSA and DSA operations on extracted key material

use rsa::{BigUint, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey};
use signature::{SignatureEncoding, hazmat::PrehashSigner};
use tracing::debug;

use crate::{
    error::CryptoFailure,
    types::{DsaPrivate, HashAlgorithm, RsaPrivate},
};

fn rsa_key(key: &RsaPrivate) -> Result<RsaPrivateKey, CryptoFailure> {
    RsaPrivateKey::from_components(
        BigUint::from_bytes_be(&key.modulus),
        BigUint::from_bytes_be(&key.public_exponent),
        BigUint::from_bytes_be(&key.private_exponent),
        vec![
            BigUint::from_bytes_be(&key.p),
            BigUint::from_bytes_be(&key.q),
        ],
    )
    .map_err(|e| {
        debug!("Invalid RSA key material: {}", e);
        CryptoFailure::InvalidKey
    })
}

/// PKCS#1 v1.5 signature over a digest, DigestInfo prefix per `hash`
pub(crate) fn rsa_sign(
    key: &RsaPrivate,
    hash: HashAlgorithm,
    digest: &[u8],
) -> Result<Vec<u8>, CryptoFailure> {
    let scheme = match hash {
        HashAlgorithm::Md5 => Pkcs1v15Sign::new::<md5::Md5>(),
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
    };
    rsa_key(key)?.sign(scheme, digest).map_err(|e| {
        debug!("RSA signing failed: {}", e);
        CryptoFailure::Signing
    })
}

/// PKCS#1 v1.5 decryption
pub(crate) fn rsa_decrypt(key: &RsaPrivate, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoFailure> {
    rsa_key(key)?
        .decrypt(Pkcs1v15Encrypt, ciphertext)
        .map_err(|e| {
            debug!("RSA decryption failed: {}", e);
            CryptoFailure::Decryption
        })
}

/// DSA signature over a digest, DER encoded
pub(crate) fn dsa_sign(key: &DsaPrivate, digest: &[u8]) -> Result<Vec<u8>, CryptoFailure> {
    let invalid = |e: signature::Error| {
        debug!("Invalid DSA key material: {}", e);
        CryptoFailure::InvalidKey
    };

    let components = dsa::Components::from_components(
        dsa::BigUint::from_bytes_be(&key.p),
        dsa::BigUint::from_bytes_be(&key.q),
        dsa::BigUint::from_bytes_be(&key.g),
    )
    .map_err(invalid)?;
    let verifying_key = dsa::VerifyingKey::from_components(
        components,
        dsa::BigUint::from_bytes_be(&key.public_scalar),
    )
    .map_err(invalid)?;
    let signing_key = dsa::SigningKey::from_components(
        verifying_key,
        dsa::BigUint::from_bytes_be(&key.private_scalar),
    )
    .map_err(invalid)?;

    let signature: dsa::Signature = signing_key.sign_prehash(digest).map_err(|e| {
        debug!("DSA signing failed: {}", e);
        CryptoFailure::Signing
    })?;
    Ok(signature.to_vec())
}

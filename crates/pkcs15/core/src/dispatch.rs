//! Crypto dispatch: on-card or software execution

use tracing::debug;

use crate::{
    credentials::CredentialProvider,
    error::{CryptoFailure, Error, Result},
    extract::extract_key,
    layer::CardBackend,
    session::CardSession,
    software,
    types::{
        CryptoRequest, CryptoResult, HashAlgorithm, KeyAlgorithm, KeyMaterial, Operation,
        PrivateKey,
    },
};

/// Where an operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    /// On the card, the private key never leaves it
    Native,
    /// In software, with key material read from the card
    Extracted,
}

impl ExecutionPath {
    /// Path for a key, decided by its native flag alone
    pub const fn for_key(key: &PrivateKey) -> Self {
        if key.native {
            Self::Native
        } else {
            Self::Extracted
        }
    }
}

/// Software operation chosen before extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SoftwareOperation {
    RsaSign(HashAlgorithm),
    RsaDecrypt,
    DsaSign,
}

/// Hash algorithm of a digest to sign in software
///
/// An explicit algorithm wins. Otherwise a 16 byte digest is taken as MD5 and a 20 byte digest
/// as SHA-1.
pub fn resolve_hash(explicit: Option<HashAlgorithm>, digest_len: usize) -> Result<HashAlgorithm> {
    explicit
        .or_else(|| HashAlgorithm::from_digest_len(digest_len))
        .ok_or(Error::AmbiguousHashLength(digest_len))
}

/// Run a request with the resolved key
pub fn execute<B: CardBackend>(
    session: &mut CardSession<B>,
    key: &PrivateKey,
    request: &CryptoRequest,
    credentials: &mut dyn CredentialProvider,
) -> Result<CryptoResult> {
    validate_input(key, request)?;

    let path = ExecutionPath::for_key(key);
    debug!(
        ?path,
        operation = ?request.operation,
        input_len = request.input.len(),
        "Dispatching"
    );

    let output = match path {
        ExecutionPath::Native => run_native(session, key, request)?,
        ExecutionPath::Extracted => {
            let operation = plan_software(key, request)?;
            let material = extract_key(session, key, credentials)?;
            run_software(operation, &material, &request.input)?
        }
    };
    Ok(CryptoResult::new(output))
}

/// RSA signatures without padding take exactly one modulus worth of input
fn validate_input(key: &PrivateKey, request: &CryptoRequest) -> Result<()> {
    if request.operation == Operation::Sign
        && key.algorithm == KeyAlgorithm::Rsa
        && !request.flags.is_pkcs1()
        && request.input.len() != key.modulus_len()
    {
        return Err(Error::InvalidInputSize {
            expected: key.modulus_len(),
            actual: request.input.len(),
        });
    }
    Ok(())
}

fn run_native<B: CardBackend>(
    session: &mut CardSession<B>,
    key: &PrivateKey,
    request: &CryptoRequest,
) -> Result<Vec<u8>> {
    let token = session.token();
    let result = match request.operation {
        Operation::Sign => token.compute_signature(key, request.flags, &request.input),
        Operation::Decipher => token.decipher(key, request.flags, &request.input),
    };
    result.map_err(|source| Error::CardOperationFailed {
        operation: request.operation,
        source,
    })
}

fn plan_software(key: &PrivateKey, request: &CryptoRequest) -> Result<SoftwareOperation> {
    match (request.operation, key.algorithm) {
        (Operation::Sign, KeyAlgorithm::Rsa) => {
            resolve_hash(request.flags.hash, request.input.len()).map(SoftwareOperation::RsaSign)
        }
        (Operation::Sign, KeyAlgorithm::Dsa) => Ok(SoftwareOperation::DsaSign),
        (Operation::Decipher, KeyAlgorithm::Rsa) => Ok(SoftwareOperation::RsaDecrypt),
        (Operation::Decipher, KeyAlgorithm::Dsa) => Err(Error::NotSupported("DSA decipher")),
    }
}

fn run_software(
    operation: SoftwareOperation,
    material: &KeyMaterial,
    input: &[u8],
) -> Result<Vec<u8>> {
    let result = match (operation, material) {
        (SoftwareOperation::RsaSign(hash), KeyMaterial::RsaPrivate(key)) => {
            software::rsa_sign(key, hash, input)
        }
        (SoftwareOperation::RsaDecrypt, KeyMaterial::RsaPrivate(key)) => {
            software::rsa_decrypt(key, input)
        }
        (SoftwareOperation::DsaSign, KeyMaterial::DsaPrivate(key)) => {
            software::dsa_sign(key, input)
        }
        _ => Err(CryptoFailure::InvalidKey),
    };
    result.map_err(Error::CryptoOperationFailed)
}

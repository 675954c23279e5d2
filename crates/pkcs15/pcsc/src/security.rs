//! Security operations: PIN verification, security environment and PSO commands
//!
//! PKCS#1 v1.5 encoding for native RSA keys is done here on the host; the card is driven with
//! raw RSA blocks of modulus length.

use nexum_pkcs15_core::{CryptoFlags, HashAlgorithm, KeyAlgorithm, Pin, PrivateKey};
use zeroize::Zeroizing;

use crate::{apdu::Command, error::PcscError};

/// DigestInfo prefix for MD5
const MD5_DIGEST_INFO: [u8; 18] = [
    0x30, 0x20, 0x30, 0x0C, 0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x05, 0x05, 0x00,
    0x04, 0x10,
];

/// DigestInfo prefix for SHA-1
const SHA1_DIGEST_INFO: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x1A, 0x05, 0x00, 0x04, 0x14,
];

/// Minimum PKCS#1 v1.5 padding overhead: 00 BT, 8 padding bytes, 00
const PKCS1_OVERHEAD: usize = 11;

/// Security environment template set by MSE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Template {
    /// Digital signature template
    Signature,
    /// Confidentiality template
    Decipher,
}

impl Template {
    const fn p2(self) -> u8 {
        match self {
            Self::Signature => 0xB6,
            Self::Decipher => 0xB8,
        }
    }
}

/// VERIFY, padding the PIN to its stored length when the card requires it
pub(crate) fn verify(pin: &Pin, value: &[u8]) -> Result<Command, PcscError> {
    let reference = pin
        .handle
        .reference
        .ok_or(PcscError::InvalidData("PIN without reference"))?;

    let mut data = Zeroizing::new(value.to_vec());
    if pin.needs_padding && data.len() < pin.stored_length {
        data.resize(pin.stored_length, pin.pad_char);
    }
    Ok(Command::new(0x00, 0x20, 0x00, reference).with_data(data.to_vec()))
}

/// MANAGE SECURITY ENVIRONMENT SET, selecting the key by reference or by file
pub(crate) fn manage_security_environment(
    template: Template,
    key: &PrivateKey,
) -> Result<Command, PcscError> {
    let data = match key.handle.reference {
        Some(reference) => vec![0x84, 0x01, reference],
        None => {
            let len = u8::try_from(key.handle.path.len())
                .map_err(|_| PcscError::InvalidData("key path too long"))?;
            let mut data = vec![0x81, len];
            data.extend_from_slice(&key.handle.path);
            data
        }
    };
    Ok(Command::new(0x00, 0x22, 0x41, template.p2()).with_data(data))
}

/// PERFORM SECURITY OPERATION: COMPUTE DIGITAL SIGNATURE
pub(crate) fn compute_digital_signature(input: Vec<u8>) -> Command {
    Command::new(0x00, 0x2A, 0x9E, 0x9A)
        .with_data(input)
        .with_le(0x00)
}

/// PERFORM SECURITY OPERATION: DECIPHER, with padding indicator `00`
pub(crate) fn decipher(ciphertext: &[u8]) -> Command {
    let mut data = Vec::with_capacity(ciphertext.len() + 1);
    data.push(0x00);
    data.extend_from_slice(ciphertext);
    Command::new(0x00, 0x2A, 0x80, 0x86)
        .with_data(data)
        .with_le(0x00)
}

/// Block sent to the card for a signature
pub(crate) fn signature_input(
    key: &PrivateKey,
    flags: CryptoFlags,
    input: &[u8],
) -> Result<Vec<u8>, PcscError> {
    if key.algorithm == KeyAlgorithm::Dsa || !flags.is_pkcs1() {
        return Ok(input.to_vec());
    }
    let encoded = digest_info(flags.hash, input)?;
    pkcs1_type1(&encoded, key.modulus_len())
}

/// Plaintext returned to the caller after a decipher
pub(crate) fn decipher_output(flags: CryptoFlags, block: Vec<u8>) -> Result<Vec<u8>, PcscError> {
    if flags.is_pkcs1() {
        strip_pkcs1_type2(&block)
    } else {
        Ok(block)
    }
}

/// Prefix a digest with its DigestInfo header; without a hash the input is used as is
fn digest_info(hash: Option<HashAlgorithm>, digest: &[u8]) -> Result<Vec<u8>, PcscError> {
    let Some(hash) = hash else {
        return Ok(digest.to_vec());
    };
    if digest.len() != hash.digest_len() {
        return Err(PcscError::InvalidData("digest length does not match hash algorithm"));
    }
    let prefix: &[u8] = match hash {
        HashAlgorithm::Md5 => &MD5_DIGEST_INFO,
        HashAlgorithm::Sha1 => &SHA1_DIGEST_INFO,
    };
    Ok([prefix, digest].concat())
}

/// EMSA-PKCS1-v1_5 block: 00 01 FF..FF 00 data
fn pkcs1_type1(data: &[u8], modulus_len: usize) -> Result<Vec<u8>, PcscError> {
    if data.len() + PKCS1_OVERHEAD > modulus_len {
        return Err(PcscError::InvalidData("input too long for key size"));
    }
    let mut block = Vec::with_capacity(modulus_len);
    block.extend_from_slice(&[0x00, 0x01]);
    block.resize(modulus_len - data.len() - 1, 0xFF);
    block.push(0x00);
    block.extend_from_slice(data);
    Ok(block)
}

/// Remove type 2 padding; cards may or may not return the leading zero byte
fn strip_pkcs1_type2(block: &[u8]) -> Result<Vec<u8>, PcscError> {
    let block = block.strip_prefix(&[0x00]).unwrap_or(block);
    let Some(padded) = block.strip_prefix(&[0x02]) else {
        return Err(PcscError::InvalidData("not a PKCS#1 type 2 block"));
    };
    match padded.iter().position(|b| *b == 0x00) {
        Some(separator) if separator >= 8 => Ok(padded[separator + 1..].to_vec()),
        _ => Err(PcscError::InvalidData("invalid PKCS#1 type 2 padding")),
    }
}

//! Decoding of key value files
//!
//! Private key files hold either a bare key (`RSAPrivateKey` or DSA `INTEGER x`), a PKCS#8
//! `PrivateKeyInfo` wrapping one, or a PKCS#8 `EncryptedPrivateKeyInfo` whose plaintext is such a
//! `PrivateKeyInfo`.

use iso7816_tlv::ber::Tlv;
use nexum_pkcs15_core::{DsaPublic, ExtractedKey, KeyAlgorithm, PublicKeyMaterial, RsaPrivate};
use pkcs8::{EncryptedPrivateKeyInfo, PrivateKeyInfo};
use zeroize::Zeroizing;

use super::der::{self, INTEGER, OCTET_STRING, SEQUENCE};
use crate::error::PcscError;

/// Outer shape of a private key file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Encrypted,
    PrivateKeyInfo,
    Bare,
}

fn container(tlv: &Tlv) -> Container {
    if !der::has_tag(tlv, SEQUENCE) {
        return Container::Bare;
    }
    match der::children(tlv) {
        Ok([first, second, ..])
            if der::has_tag(first, SEQUENCE) && der::has_tag(second, OCTET_STRING) =>
        {
            Container::Encrypted
        }
        Ok([first, second, ..])
            if der::has_tag(first, INTEGER) && der::has_tag(second, SEQUENCE) =>
        {
            Container::PrivateKeyInfo
        }
        _ => Container::Bare,
    }
}

/// Decode a private key file, decrypting it with `passphrase` when it is encrypted
pub(crate) fn decode_private_key(
    data: &[u8],
    passphrase: Option<&str>,
) -> Result<ExtractedKey, PcscError> {
    let (tlv, encoding) = der::split_first(data)?;
    match container(&tlv) {
        Container::Encrypted => {
            let passphrase = passphrase.ok_or(PcscError::PassphraseRequired)?;
            let info = EncryptedPrivateKeyInfo::try_from(encoding).map_err(pkcs8::Error::from)?;
            // padding can check out by chance under a wrong passphrase, leaving garbage DER
            let document = info.decrypt(passphrase).map_err(|e| match e {
                pkcs8::Error::EncryptedPrivateKey(_) | pkcs8::Error::Asn1(_) => {
                    PcscError::IncorrectPassphrase
                }
                other => other.into(),
            })?;
            let key = PrivateKeyInfo::try_from(document.as_bytes())
                .map_err(|_| PcscError::IncorrectPassphrase)?;
            decode_bare(&der::parse_one(key.private_key)?)
        }
        Container::PrivateKeyInfo => {
            let key = PrivateKeyInfo::try_from(encoding).map_err(pkcs8::Error::from)?;
            decode_bare(&der::parse_one(key.private_key)?)
        }
        Container::Bare => decode_bare(&tlv),
    }
}

fn decode_bare(tlv: &Tlv) -> Result<ExtractedKey, PcscError> {
    if der::has_tag(tlv, INTEGER) {
        return Ok(ExtractedKey::Dsa(Zeroizing::new(der::unsigned(tlv)?)));
    }
    der::expect(tlv, SEQUENCE, "unrecognised private key encoding")?;

    // RSAPrivateKey: version, n, e, d, p, q, dP, dQ, qInv
    let fields = der::children(tlv)?;
    match fields {
        [version, n, e, d, p, q, ..] if fields.iter().all(|f| der::has_tag(f, INTEGER)) => {
            if der::small_integer(version)? != 0 {
                return Err(PcscError::InvalidData("unsupported RSAPrivateKey version"));
            }
            Ok(ExtractedKey::Rsa(RsaPrivate {
                modulus: der::unsigned(n)?,
                public_exponent: der::unsigned(e)?,
                private_exponent: der::unsigned(d)?,
                p: der::unsigned(p)?,
                q: der::unsigned(q)?,
            }))
        }
        _ => Err(PcscError::InvalidData("unrecognised private key encoding")),
    }
}

/// Decode a public key value file
pub(crate) fn decode_public_key(
    algorithm: KeyAlgorithm,
    data: &[u8],
) -> Result<PublicKeyMaterial, PcscError> {
    let tlv = der::parse_one(data)?;
    der::expect(&tlv, SEQUENCE, "public key is not a SEQUENCE")?;
    let integers = der::children(&tlv)?
        .iter()
        .filter(|f| der::has_tag(f, INTEGER))
        .map(der::unsigned)
        .collect::<Result<Vec<_>, _>>()?;

    match (algorithm, integers.as_slice()) {
        (KeyAlgorithm::Rsa, [modulus, public_exponent, ..]) => Ok(PublicKeyMaterial::Rsa {
            modulus: modulus.clone(),
            public_exponent: public_exponent.clone(),
        }),
        (KeyAlgorithm::Dsa, [y, p, q, g, ..]) => Ok(PublicKeyMaterial::Dsa(DsaPublic {
            public_scalar: y.clone(),
            p: p.clone(),
            q: q.clone(),
            g: g.clone(),
        })),
        _ => Err(PcscError::InvalidData("public key has too few components")),
    }
}

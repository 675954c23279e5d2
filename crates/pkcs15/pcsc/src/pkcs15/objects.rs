//! Decoding of PKCS#15 directory files: ODF, TokenInfo, PrKDF, PuKDF and AODF

use iso7816_tlv::ber::Tlv;
use nexum_pkcs15_core::{Id, KeyAlgorithm, ObjectHandle, Pin, PrivateKey, PublicKey};
use tracing::debug;

use super::der::{
    self, BIT_STRING, BOOLEAN, INTEGER, OCTET_STRING, SEQUENCE, UTF8_STRING, context,
    context_constructed,
};
use crate::error::PcscError;

/// Bit of `pinFlags` requesting padding to the stored length
const PIN_FLAG_NEEDS_PADDING: usize = 5;

/// Directory file paths listed in the ODF
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Odf {
    pub(crate) private_keys: Vec<Vec<u8>>,
    pub(crate) public_keys: Vec<Vec<u8>>,
    pub(crate) trusted_public_keys: Vec<Vec<u8>>,
    pub(crate) auth_objects: Vec<Vec<u8>>,
}

pub(crate) fn parse_odf(data: &[u8]) -> Result<Odf, PcscError> {
    let mut odf = Odf::default();
    for record in der::parse_records(data)? {
        let target = if der::has_tag(&record, context_constructed(0)) {
            &mut odf.private_keys
        } else if der::has_tag(&record, context_constructed(1)) {
            &mut odf.public_keys
        } else if der::has_tag(&record, context_constructed(2)) {
            &mut odf.trusted_public_keys
        } else if der::has_tag(&record, context_constructed(8)) {
            &mut odf.auth_objects
        } else {
            continue;
        };
        let path = der::children(&record)?
            .first()
            .ok_or(PcscError::InvalidData("empty ODF entry"))?;
        target.push(der::path(path)?);
    }
    Ok(odf)
}

/// Token label from TokenInfo, if the card sets one
pub(crate) fn parse_token_label(data: &[u8]) -> Result<Option<String>, PcscError> {
    let info = der::parse_one(data)?;
    der::expect(&info, SEQUENCE, "TokenInfo is not a SEQUENCE")?;
    der::find(der::children(&info)?, context(0))
        .map(der::text)
        .transpose()
}

/// Attributes shared by all PKCS#15 objects
struct CommonObject {
    label: String,
    auth_id: Option<Id>,
}

fn common_object(tlv: Option<&Tlv>) -> Result<CommonObject, PcscError> {
    let Some(tlv) = tlv.filter(|t| der::has_tag(t, SEQUENCE)) else {
        return Err(PcscError::InvalidData("missing common object attributes"));
    };
    let fields = der::children(tlv)?;
    let label = der::find(fields, UTF8_STRING)
        .map(der::text)
        .transpose()?
        .unwrap_or_default();
    let auth_id = der::find(fields, OCTET_STRING)
        .map(der::primitive)
        .transpose()?
        .filter(|id| !id.is_empty())
        .map(Id::from);
    Ok(CommonObject { label, auth_id })
}

/// Attributes shared by key objects
struct CommonKey {
    id: Id,
    native: bool,
    reference: Option<u8>,
}

fn common_key(tlv: Option<&Tlv>) -> Result<CommonKey, PcscError> {
    let Some(tlv) = tlv.filter(|t| der::has_tag(t, SEQUENCE)) else {
        return Err(PcscError::InvalidData("missing common key attributes"));
    };
    let fields = der::children(tlv)?;
    let id = der::find(fields, OCTET_STRING)
        .map(der::primitive)
        .transpose()?
        .map(Id::from)
        .ok_or(PcscError::InvalidData("key without identifier"))?;
    // native defaults to TRUE
    let native = der::find(fields, BOOLEAN)
        .map(der::boolean)
        .transpose()?
        .unwrap_or(true);
    let reference = der::find(fields, INTEGER)
        .map(der::small_integer)
        .transpose()?
        .map(|r| u8::try_from(r).map_err(|_| PcscError::InvalidData("key reference too large")))
        .transpose()?;
    Ok(CommonKey {
        id,
        native,
        reference,
    })
}

/// Fields of the `[1]` type attributes of a key object
fn type_attributes(fields: &[Tlv]) -> Result<&[Tlv], PcscError> {
    let wrapper = der::find(fields, context_constructed(1))
        .ok_or(PcscError::InvalidData("missing type attributes"))?;
    let attributes = der::children(wrapper)?
        .first()
        .ok_or(PcscError::InvalidData("empty type attributes"))?;
    der::children(attributes)
}

/// Key algorithm from the object choice tag
fn key_algorithm(record: &Tlv) -> Option<KeyAlgorithm> {
    if der::has_tag(record, SEQUENCE) {
        Some(KeyAlgorithm::Rsa)
    } else if der::has_tag(record, context_constructed(2)) {
        Some(KeyAlgorithm::Dsa)
    } else {
        None
    }
}

fn object_path(attributes: &[Tlv]) -> Result<Vec<u8>, PcscError> {
    match attributes.first() {
        Some(value) if der::has_tag(value, SEQUENCE) => der::path(value),
        _ => Err(PcscError::InvalidData("key value is not a path")),
    }
}

pub(crate) fn parse_private_keys(data: &[u8]) -> Result<Vec<PrivateKey>, PcscError> {
    let mut keys = Vec::new();
    for record in der::parse_records(data)? {
        let Some(algorithm) = key_algorithm(&record) else {
            debug!("Skipping unsupported private key type");
            continue;
        };
        let fields = der::children(&record)?;
        let common = common_object(fields.first())?;
        let key = common_key(fields.get(1))?;
        let attributes = type_attributes(fields)?;

        let modulus_bits = match algorithm {
            KeyAlgorithm::Rsa => der::find(attributes, INTEGER)
                .map(der::small_integer)
                .transpose()?
                .ok_or(PcscError::InvalidData("RSA key without modulus length"))?,
            KeyAlgorithm::Dsa => 0,
        };

        keys.push(PrivateKey {
            label: common.label,
            id: key.id,
            auth_id: common.auth_id,
            algorithm,
            modulus_bits,
            native: key.native,
            handle: ObjectHandle {
                path: object_path(attributes)?,
                reference: key.reference,
            },
        });
    }
    Ok(keys)
}

pub(crate) fn parse_public_keys(data: &[u8]) -> Result<Vec<PublicKey>, PcscError> {
    let mut keys = Vec::new();
    for record in der::parse_records(data)? {
        let Some(algorithm) = key_algorithm(&record) else {
            debug!("Skipping unsupported public key type");
            continue;
        };
        let fields = der::children(&record)?;
        let common = common_object(fields.first())?;
        let key = common_key(fields.get(1))?;
        let attributes = type_attributes(fields)?;

        keys.push(PublicKey {
            label: common.label,
            id: key.id,
            algorithm,
            handle: ObjectHandle {
                path: object_path(attributes)?,
                reference: key.reference,
            },
        });
    }
    Ok(keys)
}

pub(crate) fn parse_pins(data: &[u8]) -> Result<Vec<Pin>, PcscError> {
    let mut pins = Vec::new();
    for record in der::parse_records(data)? {
        if !der::has_tag(&record, SEQUENCE) {
            debug!("Skipping non-PIN authentication object");
            continue;
        }
        let fields = der::children(&record)?;
        let common = common_object(fields.first())?;

        let auth_id = fields
            .get(1)
            .filter(|t| der::has_tag(t, SEQUENCE))
            .map(der::children)
            .transpose()?
            .and_then(|class| der::find(class, OCTET_STRING))
            .map(der::primitive)
            .transpose()?
            .map(Id::from)
            .ok_or(PcscError::InvalidData("PIN without authentication id"))?;

        let attributes = type_attributes(fields)?;
        let needs_padding = der::find(attributes, BIT_STRING)
            .map(|flags| der::bit(flags, PIN_FLAG_NEEDS_PADDING))
            .transpose()?
            .unwrap_or(false);

        let lengths = attributes
            .iter()
            .filter(|t| der::has_tag(t, INTEGER))
            .map(der::small_integer)
            .collect::<Result<Vec<_>, _>>()?;
        let (min_length, stored_length) = match lengths.as_slice() {
            [min, stored, ..] => (*min, *stored),
            _ => return Err(PcscError::InvalidData("PIN without length attributes")),
        };
        let max_length = lengths.get(2).copied().unwrap_or(stored_length);

        let reference = der::find(attributes, context(0))
            .map(der::small_integer)
            .transpose()?
            .map(|r| u8::try_from(r).map_err(|_| PcscError::InvalidData("PIN reference too large")))
            .transpose()?
            // pinReference DEFAULT 0
            .unwrap_or(0);
        let pad_char = der::find(attributes, OCTET_STRING)
            .map(der::primitive)
            .transpose()?
            .and_then(|pad| pad.first().copied())
            .unwrap_or(0x00);
        let path = der::find(attributes, SEQUENCE)
            .map(der::path)
            .transpose()?
            .unwrap_or_default();

        pins.push(Pin {
            label: common.label,
            auth_id,
            min_length,
            stored_length,
            max_length,
            needs_padding,
            pad_char,
            handle: ObjectHandle {
                path,
                reference: Some(reference),
            },
        });
    }
    Ok(pins)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parse_odf() {
        let mut data = odf_entry(0, &[0x3F, 0x00, 0x50, 0x15, 0x44, 0x02]);
        data.extend(odf_entry(1, &[0x44, 0x03]));
        data.extend(odf_entry(4, &[0x44, 0x04]));
        data.extend(odf_entry(8, &[0x44, 0x01]));
        data.extend([0x00; 16]);
        let odf = parse_odf(&data).unwrap();
        assert_eq!(odf.private_keys, vec![vec![0x3F, 0x00, 0x50, 0x15, 0x44, 0x02]]);
        assert_eq!(odf.public_keys, vec![vec![0x44, 0x03]]);
        assert_eq!(odf.auth_objects, vec![vec![0x44, 0x01]]);
        assert!(odf.trusted_public_keys.is_empty());
    }

    #[test]
    fn test_parse_token_label() {
        assert_eq!(
            parse_token_label(&token_info("Test Token")).unwrap(),
            Some("Test Token".to_string())
        );
    }

    #[test]
    fn test_parse_private_keys() {
        let mut data = key_record(&KeyRecord {
            label: "Signing key",
            id: &[0x45],
            auth_id: Some(&[0x01]),
            native: None,
            reference: Some(0x02),
            path: &[0x3F, 0x00, 0x50, 0x15, 0x30, 0x12],
            modulus_bits: Some(2048),
        });
        data.extend(key_record(&KeyRecord {
            label: "DSA key",
            id: &[0x46],
            auth_id: None,
            native: Some(false),
            reference: None,
            path: &[0x30, 0x13],
            modulus_bits: None,
        }));

        let keys = parse_private_keys(&data).unwrap();
        assert_eq!(keys.len(), 2);

        let rsa = &keys[0];
        assert_eq!(rsa.label, "Signing key");
        assert_eq!(rsa.id, Id::new([0x45]));
        assert_eq!(rsa.auth_id, Some(Id::new([0x01])));
        assert_eq!(rsa.algorithm, KeyAlgorithm::Rsa);
        assert_eq!(rsa.modulus_bits, 2048);
        assert!(rsa.native);
        assert_eq!(rsa.handle.reference, Some(0x02));
        assert_eq!(rsa.handle.path, vec![0x3F, 0x00, 0x50, 0x15, 0x30, 0x12]);

        let dsa = &keys[1];
        assert_eq!(dsa.algorithm, KeyAlgorithm::Dsa);
        assert_eq!(dsa.auth_id, None);
        assert!(!dsa.native);
    }

    #[test]
    fn test_parse_pins() {
        let data = pin_record(&PinRecord {
            label: "User PIN",
            auth_id: &[0x01],
            needs_padding: true,
            lengths: &[4, 8],
            reference: Some(0x81),
            pad_char: Some(0xFF),
        });
        let pins = parse_pins(&data).unwrap();
        assert_eq!(pins.len(), 1);
        let pin = &pins[0];
        assert_eq!(pin.label, "User PIN");
        assert_eq!(pin.auth_id, Id::new([0x01]));
        assert_eq!((pin.min_length, pin.stored_length, pin.max_length), (4, 8, 8));
        assert!(pin.needs_padding);
        assert_eq!(pin.pad_char, 0xFF);
        assert_eq!(pin.handle.reference, Some(0x81));
    }

    #[test]
    fn test_pin_max_length() {
        let data = pin_record(&PinRecord {
            label: "PIN",
            auth_id: &[0x02],
            needs_padding: false,
            lengths: &[4, 8, 12],
            reference: Some(0x01),
            pad_char: None,
        });
        let pin = &parse_pins(&data).unwrap()[0];
        assert_eq!(pin.max_length, 12);
        assert!(!pin.needs_padding);
        assert_eq!(pin.pad_char, 0x00);
    }

    #[test]
    fn test_pin_reference_defaults_to_zero() {
        let data = pin_record(&PinRecord {
            label: "Global PIN",
            auth_id: &[0x03],
            needs_padding: false,
            lengths: &[4, 8],
            reference: None,
            pad_char: None,
        });
        let pin = &parse_pins(&data).unwrap()[0];
        assert_eq!(pin.handle.reference, Some(0x00));

        let command = crate::security::verify(pin, b"1234").unwrap();
        assert_eq!(
            command.to_bytes().as_ref(),
            &[0x00, 0x20, 0x00, 0x00, 0x04, b'1', b'2', b'3', b'4']
        );
    }
}

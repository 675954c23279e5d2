//! DER helpers on top of BER-TLV parsing

use iso7816_tlv::ber::{Tag, Tlv, Value};

use crate::error::PcscError;

pub(crate) const BOOLEAN: u8 = 0x01;
pub(crate) const INTEGER: u8 = 0x02;
pub(crate) const BIT_STRING: u8 = 0x03;
pub(crate) const OCTET_STRING: u8 = 0x04;
pub(crate) const UTF8_STRING: u8 = 0x0C;
pub(crate) const SEQUENCE: u8 = 0x30;

/// Context-specific tags `[n]`, primitive and constructed
pub(crate) const fn context(n: u8) -> u8 {
    0x80 | n
}

pub(crate) const fn context_constructed(n: u8) -> u8 {
    0xA0 | n
}

/// Parse consecutive TLVs, stopping at the 00/FF filler of a partially used file
pub(crate) fn parse_records(mut data: &[u8]) -> Result<Vec<Tlv>, PcscError> {
    let mut records = Vec::new();
    while let Some(&first) = data.first() {
        if first == 0x00 || first == 0xFF {
            break;
        }
        let (tlv, rest) = Tlv::parse(data);
        records.push(tlv?);
        data = rest;
    }
    Ok(records)
}

/// Parse a single TLV, ignoring trailing filler
pub(crate) fn parse_one(data: &[u8]) -> Result<Tlv, PcscError> {
    split_first(data).map(|(tlv, _)| tlv)
}

/// Parse the first TLV and return it with its exact encoding
pub(crate) fn split_first(data: &[u8]) -> Result<(Tlv, &[u8]), PcscError> {
    if data.first().is_none_or(|b| *b == 0x00 || *b == 0xFF) {
        return Err(PcscError::InvalidData("empty file"));
    }
    let (tlv, rest) = Tlv::parse(data);
    Ok((tlv?, &data[..data.len() - rest.len()]))
}

pub(crate) fn has_tag(tlv: &Tlv, tag: u8) -> bool {
    Tag::try_from(tag).is_ok_and(|t| &t == tlv.tag())
}

pub(crate) fn children(tlv: &Tlv) -> Result<&[Tlv], PcscError> {
    match tlv.value() {
        Value::Constructed(tlvs) => Ok(tlvs),
        Value::Primitive(_) => Err(PcscError::InvalidData("expected constructed value")),
    }
}

pub(crate) fn primitive(tlv: &Tlv) -> Result<&[u8], PcscError> {
    match tlv.value() {
        Value::Primitive(bytes) => Ok(bytes),
        Value::Constructed(_) => Err(PcscError::InvalidData("expected primitive value")),
    }
}

pub(crate) fn find(tlvs: &[Tlv], tag: u8) -> Option<&Tlv> {
    tlvs.iter().find(|tlv| has_tag(tlv, tag))
}

pub(crate) fn expect(tlv: &Tlv, tag: u8, what: &'static str) -> Result<(), PcscError> {
    if has_tag(tlv, tag) {
        Ok(())
    } else {
        Err(PcscError::InvalidData(what))
    }
}

/// Unsigned big-endian magnitude of an INTEGER
pub(crate) fn unsigned(tlv: &Tlv) -> Result<Vec<u8>, PcscError> {
    let bytes = primitive(tlv)?;
    let start = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    Ok(bytes[start..].to_vec())
}

pub(crate) fn small_integer(tlv: &Tlv) -> Result<usize, PcscError> {
    let bytes = unsigned(tlv)?;
    if bytes.len() > std::mem::size_of::<u32>() {
        return Err(PcscError::InvalidData("integer too large"));
    }
    Ok(bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize))
}

pub(crate) fn boolean(tlv: &Tlv) -> Result<bool, PcscError> {
    Ok(primitive(tlv)?.first().is_some_and(|b| *b != 0))
}

pub(crate) fn text(tlv: &Tlv) -> Result<String, PcscError> {
    Ok(String::from_utf8_lossy(primitive(tlv)?).into_owned())
}

/// Whether bit `n` of a BIT STRING is set, bit 0 being the leftmost
pub(crate) fn bit(tlv: &Tlv, n: usize) -> Result<bool, PcscError> {
    let bytes = primitive(tlv)?;
    Ok(bytes
        .get(1 + n / 8)
        .is_some_and(|b| b & (0x80 >> (n % 8)) != 0))
}

/// The `path` OCTET STRING of a Path SEQUENCE
pub(crate) fn path(tlv: &Tlv) -> Result<Vec<u8>, PcscError> {
    expect(tlv, SEQUENCE, "expected path")?;
    let inner = find(children(tlv)?, OCTET_STRING).ok_or(PcscError::InvalidData("path missing"))?;
    Ok(primitive(inner)?.to_vec())
}

/// DER encoding of a single TLV
#[cfg(test)]
pub(crate) fn encode(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    match value.len() {
        len @ 0..=0x7F => out.push(len as u8),
        len @ 0x80..=0xFF => out.extend_from_slice(&[0x81, len as u8]),
        len => out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]),
    }
    out.extend_from_slice(value);
    out
}

/// DER INTEGER with a leading zero where the top bit is set
#[cfg(test)]
pub(crate) fn encode_unsigned(value: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(value.len() + 1);
    if value.first().is_none_or(|b| b & 0x80 != 0) {
        content.push(0x00);
    }
    content.extend_from_slice(value);
    encode(INTEGER, &content)
}

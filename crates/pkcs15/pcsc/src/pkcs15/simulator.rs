//! File-system card simulator answering the APDUs of the PKCS#15 application

use std::{collections::HashMap, sync::OnceLock};

use bytes::Bytes;
use pkcs8::PrivateKeyInfo;
use rsa::{RsaPrivateKey, pkcs8::EncodePrivateKey};

use super::{
    der::{SEQUENCE, encode, encode_unsigned},
    objects::fixtures::{self, KeyRecord, PinRecord},
};
use crate::{error::PcscError, transport::CardTransport};

const MF: [u8; 2] = [0x3F, 0x00];
const APP: [u8; 4] = [0x3F, 0x00, 0x50, 0x15];

fn app_file(fid: [u8; 2]) -> Vec<u8> {
    [APP.as_slice(), fid.as_slice()].concat()
}

/// Encrypted PKCS#8 RSA key, generated once per test run
fn encrypted_rsa_key() -> &'static [u8] {
    static KEY: OnceLock<Vec<u8>> = OnceLock::new();
    KEY.get_or_init(|| {
        let key = RsaPrivateKey::new(&mut rand_v8::thread_rng(), 1024).unwrap();
        let plain = key.to_pkcs8_der().unwrap();
        let params = pkcs8::pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(
            1024,
            b"pkcs15-simulator",
            &[0x24; 16],
        )
        .unwrap();
        PrivateKeyInfo::try_from(plain.as_bytes())
            .unwrap()
            .encrypt_with_params(params, SimulatedCard::PASSPHRASE)
            .unwrap()
            .as_bytes()
            .to_vec()
    })
}

/// Card with a transparent-file PKCS#15 structure and a scripted security processor
#[derive(Debug)]
pub(crate) struct SimulatedCard {
    files: HashMap<Vec<u8>, Vec<u8>>,
    directories: Vec<Vec<u8>>,
    current: Option<Vec<u8>>,
    report_size: bool,
    selected: Vec<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    security_environment: Option<(u8, u8)>,
    operation_input: Option<Vec<u8>>,
}

impl SimulatedCard {
    pub(crate) const SIGNATURE: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];
    pub(crate) const PLAINTEXT: &'static [u8] = b"session key";
    pub(crate) const PASSPHRASE: &'static str = "simulated passphrase";
    pub(crate) const DSA_SCALAR: &'static [u8] = &[0x1D, 0x2C, 0x3B];
    const PIN: &'static [u8] = b"1234";

    /// Empty card with only the MF and the application DF
    pub(crate) fn blank() -> Self {
        Self {
            files: HashMap::new(),
            directories: vec![MF.to_vec(), APP.to_vec()],
            current: None,
            report_size: true,
            selected: Vec::new(),
            sent: Vec::new(),
            security_environment: None,
            operation_input: None,
        }
    }

    /// Card with a user PIN, a native and a non-native RSA key and a non-native DSA key
    pub(crate) fn personalised() -> Self {
        let mut card = Self::blank();
        let odf = [
            fixtures::odf_entry(8, &[0x44, 0x01]),
            fixtures::odf_entry(0, &[0x44, 0x02]),
            fixtures::odf_entry(1, &[0x44, 0x03]),
        ]
        .concat();
        card.add_file(&app_file([0x50, 0x31]), odf);
        card.add_file(&app_file([0x50, 0x32]), fixtures::token_info("Test Token"));
        card.add_file(
            &app_file([0x44, 0x01]),
            fixtures::pin_record(&PinRecord {
                label: "User PIN",
                auth_id: &[0x01],
                needs_padding: true,
                lengths: &[4, 8],
                reference: Some(0x81),
                pad_char: Some(0xFF),
            }),
        );

        let mut prkdf = fixtures::key_record(&KeyRecord {
            label: "Signature key",
            id: &[0x45],
            auth_id: Some(&[0x01]),
            native: None,
            reference: Some(0x02),
            path: &[0x3F, 0x00, 0x50, 0x15, 0x4B, 0x01],
            modulus_bits: Some(1024),
        });
        prkdf.extend(fixtures::key_record(&KeyRecord {
            label: "Software RSA key",
            id: &[0x46],
            auth_id: Some(&[0x01]),
            native: Some(false),
            reference: None,
            path: &[0x4B, 0x02],
            modulus_bits: Some(1024),
        }));
        prkdf.extend(fixtures::key_record(&KeyRecord {
            label: "Software DSA key",
            id: &[0x47],
            auth_id: None,
            native: Some(false),
            reference: None,
            path: &[0x4B, 0x03],
            modulus_bits: None,
        }));
        // unused tail of the directory file
        prkdf.extend([0x00; 24]);
        card.add_file(&app_file([0x44, 0x02]), prkdf);

        card.add_file(
            &app_file([0x44, 0x03]),
            fixtures::key_record(&KeyRecord {
                label: "Software DSA key",
                id: &[0x47],
                auth_id: None,
                native: Some(false),
                reference: None,
                path: &[0x55, 0x03],
                modulus_bits: None,
            }),
        );

        card.add_file(&app_file([0x4B, 0x02]), encrypted_rsa_key().to_vec());
        card.add_file(&app_file([0x4B, 0x03]), encode_unsigned(Self::DSA_SCALAR));
        let dsa_public: Vec<u8> = [[0x0Bu8], [0x17], [0x0B], [0x02]]
            .iter()
            .flat_map(|v| encode_unsigned(v))
            .collect();
        card.add_file(&app_file([0x55, 0x03]), encode(SEQUENCE, &dsa_public));
        card
    }

    pub(crate) fn add_file(&mut self, path: &[u8], content: Vec<u8>) {
        self.files.insert(path.to_vec(), content);
    }

    pub(crate) fn remove_file(&mut self, path: &[u8]) {
        self.files.remove(path);
    }

    /// Whether SELECT answers with an FCP carrying the file size
    pub(crate) fn report_size(&mut self, report: bool) {
        self.report_size = report;
    }

    pub(crate) fn selected(&self) -> &[Vec<u8>] {
        &self.selected
    }

    pub(crate) fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Template and key reference of the last MSE SET
    pub(crate) const fn security_environment(&self) -> Option<(u8, u8)> {
        self.security_environment
    }

    /// Data field of the last PSO command
    pub(crate) fn last_operation_input(&self) -> Option<&[u8]> {
        self.operation_input.as_deref()
    }

    fn select(&mut self, p1: u8, data: &[u8]) -> Vec<u8> {
        let path = match p1 {
            0x00 if data == MF.as_slice() => MF.to_vec(),
            0x08 => [MF.as_slice(), data].concat(),
            _ => return vec![0x6A, 0x86],
        };
        self.selected.push(path.clone());

        let fcp = if let Some(content) = self.files.get(&path) {
            let size = content.len() as u16;
            let [hi, lo] = size.to_be_bytes();
            vec![0x62, 0x04, 0x80, 0x02, hi, lo]
        } else if self.directories.contains(&path) {
            vec![0x62, 0x03, 0x82, 0x01, 0x38]
        } else {
            return vec![0x6A, 0x82];
        };
        self.current = Some(path);

        let mut response = if self.report_size { fcp } else { Vec::new() };
        response.extend([0x90, 0x00]);
        response
    }

    fn read_binary(&self, offset: usize, le: usize) -> Vec<u8> {
        let Some(content) = self.current.as_ref().and_then(|p| self.files.get(p)) else {
            return vec![0x69, 0x86];
        };
        if offset >= content.len() {
            return vec![0x6B, 0x00];
        }
        let end = content.len().min(offset + le);
        let mut response = content[offset..end].to_vec();
        if end - offset < le {
            response.extend([0x62, 0x82]);
        } else {
            response.extend([0x90, 0x00]);
        }
        response
    }

    fn verify(&self, reference: u8, data: &[u8]) -> Vec<u8> {
        let mut expected = Self::PIN.to_vec();
        expected.resize(8, 0xFF);
        if reference == 0x81 && data == expected {
            vec![0x90, 0x00]
        } else {
            vec![0x63, 0xC2]
        }
    }

    fn perform_security_operation(&mut self, p1: u8, p2: u8, data: &[u8]) -> Vec<u8> {
        self.operation_input = Some(data.to_vec());
        let mut response = match (p1, p2) {
            (0x9E, 0x9A) => Self::SIGNATURE.to_vec(),
            (0x80, 0x86) => {
                let mut block = vec![0x00, 0x02];
                block.extend([0x5A; 12]);
                block.push(0x00);
                block.extend_from_slice(Self::PLAINTEXT);
                block
            }
            _ => return vec![0x6A, 0x86],
        };
        response.extend([0x90, 0x00]);
        response
    }
}

impl CardTransport for SimulatedCard {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        self.sent.push(command.to_vec());
        let [_cla, ins, p1, p2, rest @ ..] = command else {
            return Err(PcscError::InvalidData("short command"));
        };
        let (data, le) = match rest {
            [] => (&[][..], None),
            [le] => (&[][..], Some(*le)),
            [lc, body @ ..] => {
                let lc = usize::from(*lc);
                (&body[..lc.min(body.len())], body.get(lc).copied())
            }
        };

        let response = match ins {
            0xA4 => self.select(*p1, data),
            0xB0 => {
                let offset = usize::from(u16::from_be_bytes([*p1, *p2]));
                let le = match le {
                    Some(0) | None => 256,
                    Some(le) => usize::from(le),
                };
                self.read_binary(offset, le)
            }
            0x20 => self.verify(*p2, data),
            0x22 => {
                self.security_environment = data.get(2).map(|reference| (*p2, *reference));
                vec![0x90, 0x00]
            }
            0x2A => self.perform_security_operation(*p1, *p2, data),
            _ => vec![0x6D, 0x00],
        };
        Ok(Bytes::from(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_and_read() {
        let mut card = SimulatedCard::blank();
        card.add_file(&app_file([0x44, 0x10]), vec![1, 2, 3]);

        let selected = card
            .transmit_raw(&[0x00, 0xA4, 0x08, 0x04, 0x04, 0x50, 0x15, 0x44, 0x10, 0x00])
            .unwrap();
        assert_eq!(selected.as_ref(), &[0x62, 0x04, 0x80, 0x02, 0x00, 0x03, 0x90, 0x00]);

        let read = card.transmit_raw(&[0x00, 0xB0, 0x00, 0x01, 0x02]).unwrap();
        assert_eq!(read.as_ref(), &[2, 3, 0x90, 0x00]);

        let missing = card
            .transmit_raw(&[0x00, 0xA4, 0x08, 0x04, 0x02, 0x47, 0x11, 0x00])
            .unwrap();
        assert_eq!(missing.as_ref(), &[0x6A, 0x82]);
        assert_eq!(card.selected().len(), 2);
    }
}

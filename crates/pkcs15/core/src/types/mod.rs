//! Card objects, key material and operation requests

mod id;
mod key_material;
mod object;
mod request;

pub use id::{Id, IdParseError, MAX_ID_SIZE};
pub use key_material::{DsaPrivate, DsaPublic, ExtractedKey, KeyMaterial, PublicKeyMaterial, RsaPrivate};
pub use object::{KeyAlgorithm, ObjectHandle, Pin, PrivateKey, PublicKey};
pub use request::{CryptoFlags, CryptoRequest, CryptoResult, HashAlgorithm, Operation, Padding};

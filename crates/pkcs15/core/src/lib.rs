//! Core pipeline for private-key operations on PKCS#15 smart cards
//!
//! This crate performs a single signature or decipher operation with a key held in a PKCS#15
//! structure on a smart card. It owns the operation session and the crypto dispatch:
//!
//! - [`CardSession`] acquires the card (context, reader, connect, lock, bind) and releases
//!   everything it acquired, in reverse order, when it is closed or dropped
//! - [`resolve_key`] picks the private key object to use
//! - [`authenticate`] verifies the PIN bound to the key
//! - [`execute`] runs the operation either on the card (native keys) or in software with key
//!   material extracted from the card (non-native keys)
//! - [`io`] reads the input file and persists the result
//!
//! The card itself is reached through the [`CardLayer`] and [`Pkcs15Token`] traits, and user
//! interaction through [`CredentialProvider`], so the whole pipeline can run against a
//! recording double in tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod authenticator;
mod credentials;
mod dispatch;
mod error;
mod extract;
pub mod io;
mod layer;
mod pipeline;
mod resolver;
mod session;
mod software;
mod types;

#[cfg(test)]
mod mock;

pub use authenticator::authenticate;
pub use credentials::{CredentialProvider, NoCredentials};
pub use dispatch::{ExecutionPath, execute, resolve_hash};
pub use error::{CardError, CryptoFailure, Error, ErrorKind, Result};
pub use extract::extract_key;
pub use layer::{CardBackend, CardLayer, Pkcs15Token};
pub use pipeline::{Options, run};
pub use resolver::{MAX_PRIVATE_KEYS, resolve_key};
pub use session::{CardSession, SessionConfig};
pub use types::{
    CryptoFlags, CryptoRequest, CryptoResult, DsaPrivate, DsaPublic, ExtractedKey, HashAlgorithm,
    Id, IdParseError, KeyAlgorithm, KeyMaterial, MAX_ID_SIZE, ObjectHandle, Operation, Padding,
    Pin, PrivateKey, PublicKey, PublicKeyMaterial, RsaPrivate,
};

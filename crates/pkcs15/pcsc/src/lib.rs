//! PC/SC card layer for PKCS#15 tokens
//!
//! [`PcscCardLayer`] implements the card lifecycle and PKCS#15 token traits of
//! `nexum-pkcs15-core` on top of a PC/SC reader. The PKCS#15 application itself ([`Pkcs15App`])
//! only needs a [`CardTransport`], so it runs the same against a real card or a test double.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

mod apdu;
mod config;
mod error;
mod layer;
mod pkcs15;
mod security;
mod transport;

pub use apdu::{Command, Response};
pub use config::{DEFAULT_APPLICATION_PATH, Pkcs15Config, ShareMode};
pub use error::PcscError;
pub use layer::PcscCardLayer;
pub use pkcs15::Pkcs15App;
pub use transport::{CardTransport, PcscTransport};

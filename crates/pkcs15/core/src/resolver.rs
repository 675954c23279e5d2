//! Selection of the private key to operate with

use tracing::debug;

use crate::{
    error::{CardError, Error, Result},
    layer::CardBackend,
    session::CardSession,
    types::{Id, PrivateKey},
};

/// Maximum number of private key objects enumerated
pub const MAX_PRIVATE_KEYS: usize = 32;

/// Select the private key to use
///
/// With `key_id`, the key whose identifier equals the parsed hex id is returned. Without, the
/// first enumerated key is used.
pub fn resolve_key<B: CardBackend>(
    session: &mut CardSession<B>,
    key_id: Option<&str>,
) -> Result<PrivateKey> {
    let keys = session
        .token()
        .private_keys(MAX_PRIVATE_KEYS)
        .map_err(Error::NoKeysFound)?;
    if keys.is_empty() {
        return Err(Error::NoKeysFound(CardError::ObjectNotFound));
    }
    debug!(count = keys.len(), "Enumerated private keys");

    let key = match key_id {
        Some(text) => {
            let id = Id::from_hex(text).map_err(|reason| Error::InvalidKeyId {
                id: text.to_string(),
                reason,
            })?;
            keys.into_iter()
                .find(|key| key.id == id)
                .ok_or(Error::KeyNotFound { id })?
        }
        None => keys
            .into_iter()
            .next()
            .ok_or(Error::NoKeysFound(CardError::ObjectNotFound))?,
    };

    debug!(
        id = %key.id,
        label = %key.label,
        algorithm = %key.algorithm,
        native = key.native,
        "Using private key"
    );
    Ok(key)
}

//! PIN verification for the selected key

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::{
    credentials::CredentialProvider,
    error::{CardError, Error, Result},
    layer::CardBackend,
    session::CardSession,
    types::{Pin, PrivateKey},
};

/// Verify the PIN protecting `key`
///
/// Keys without an authentication id need no PIN. A PIN supplied by the caller is checked
/// against the length constraints of the PIN object and submitted once. Otherwise the user is
/// prompted until a PIN of acceptable length is entered or the prompt is cancelled; a PIN of
/// the wrong length is never sent to the card.
pub fn authenticate<B: CardBackend>(
    session: &mut CardSession<B>,
    key: &PrivateKey,
    supplied_pin: Option<&str>,
    credentials: &mut dyn CredentialProvider,
) -> Result<()> {
    let Some(auth_id) = key.auth_id.as_ref() else {
        debug!("Key {} is not PIN protected", key.id);
        return Ok(());
    };

    let pin = session
        .token()
        .find_pin(auth_id)
        .map_err(Error::PinNotFound)?
        .ok_or(Error::PinNotFound(CardError::ObjectNotFound))?;

    let value = match supplied_pin {
        Some(value) => {
            validate_pin_length(&pin, value)?;
            Zeroizing::new(value.to_string())
        }
        None => request_valid_pin(&pin, credentials)?,
    };

    session
        .token()
        .verify_pin(&pin, value.as_bytes())
        .map_err(Error::PinIncorrect)?;
    info!("PIN code correct.");
    Ok(())
}

/// Validates a PIN against the length constraints of its PIN object
fn validate_pin_length(pin: &Pin, value: &str) -> Result<()> {
    if pin.accepts_length(value.len()) {
        return Ok(());
    }
    Err(Error::PinLengthInvalid {
        min: pin.min_length,
        max: pin.max_length,
        actual: value.len(),
    })
}

/// Prompts until a PIN of acceptable length is entered
fn request_valid_pin(
    pin: &Pin,
    credentials: &mut dyn CredentialProvider,
) -> Result<Zeroizing<String>> {
    let prompt = format!("Enter PIN [{}]: ", pin.label);
    loop {
        let value = credentials
            .request_pin(&prompt)
            .filter(|value| !value.is_empty())
            .ok_or(Error::UserCancelled)?;

        match validate_pin_length(pin, &value) {
            Ok(()) => return Ok(value),
            Err(e) => warn!("{}", e),
        }
    }
}

//! Interactive credential sources

use zeroize::Zeroizing;

/// Source of secrets entered by the user
///
/// Returning `None` means no input is available (closed terminal, non-interactive use).
pub trait CredentialProvider {
    /// Ask for a PIN
    fn request_pin(&mut self, prompt: &str) -> Option<Zeroizing<String>>;

    /// Ask for the passphrase of an encrypted key container
    fn request_passphrase(&mut self, prompt: &str) -> Option<Zeroizing<String>>;
}

/// Provider for non-interactive use, never yields a secret
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn request_pin(&mut self, _prompt: &str) -> Option<Zeroizing<String>> {
        None
    }

    fn request_passphrase(&mut self, _prompt: &str) -> Option<Zeroizing<String>> {
        None
    }
}

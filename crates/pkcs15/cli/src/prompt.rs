//! Console input for PINs and passphrases

use std::io::{self, BufRead, IsTerminal, Write};

use nexum_pkcs15_core::CredentialProvider;
use zeroize::Zeroizing;

/// Reads secrets from the terminal without echo, or from piped standard input
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ConsoleCredentials;

impl CredentialProvider for ConsoleCredentials {
    fn request_pin(&mut self, prompt: &str) -> Option<Zeroizing<String>> {
        read_secret(prompt)
    }

    fn request_passphrase(&mut self, prompt: &str) -> Option<Zeroizing<String>> {
        read_secret(prompt)
    }
}

/// Prompt and read one secret; `None` at end of input
fn read_secret(prompt: &str) -> Option<Zeroizing<String>> {
    if io::stdin().is_terminal() {
        return rpassword::prompt_password(prompt).ok().map(Zeroizing::new);
    }

    let mut stderr = io::stderr();
    write!(stderr, "{}", prompt).ok()?;
    stderr.flush().ok()?;
    read_line(&mut io::stdin().lock())
}

/// Read one line without its line ending
fn read_line(input: &mut impl BufRead) -> Option<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(Zeroizing::new(
            line.trim_end_matches(['\r', '\n']).to_string(),
        )),
    }
}

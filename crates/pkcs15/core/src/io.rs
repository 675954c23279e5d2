//! Input and output files

use std::{
    fs::File,
    io::{self, Read, Write},
    path::Path,
};

use crate::error::{Error, Result};

/// Maximum size of the input file in bytes
pub const MAX_INPUT_SIZE: usize = 1024;

/// Read the whole input file
///
/// Files larger than [`MAX_INPUT_SIZE`] are rejected rather than truncated.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|source| Error::InputUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut data = Vec::with_capacity(MAX_INPUT_SIZE);
    file.take(MAX_INPUT_SIZE as u64 + 1)
        .read_to_end(&mut data)
        .map_err(|source| Error::InputReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

    if data.len() > MAX_INPUT_SIZE {
        return Err(Error::InputTooLarge {
            path: path.to_path_buf(),
            limit: MAX_INPUT_SIZE,
        });
    }
    Ok(data)
}

/// Persist the operation result
///
/// With a path, the raw bytes are written to the file. Without, they go to standard output as
/// text, see [`write_text`].
pub fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            let unwritable = |source| Error::OutputUnwritable {
                path: path.to_path_buf(),
                source,
            };
            let mut file = File::create(path).map_err(unwritable)?;
            file.write_all(data).map_err(unwritable)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            write_text(&mut stdout, data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Write bytes as text: printable ASCII as is, everything else as `\xNN`
pub fn write_text<W: Write>(out: &mut W, data: &[u8]) -> io::Result<()> {
    for &byte in data {
        if byte == b' ' || byte.is_ascii_graphic() {
            out.write_all(&[byte])?;
        } else {
            write!(out, "\\x{byte:02X}")?;
        }
    }
    Ok(())
}

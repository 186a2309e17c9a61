//! Buffered byte-for-byte file comparison.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

// Use a 1 MiB buffer; full chip dumps should not be loaded whole.
const BUFFER_SIZE: usize = 1024 * 1024;

/// Compares two files byte for byte.
///
/// Lengths are checked first, then contents in chunks, so differing files
/// return early without reading everything.
pub fn files_equal(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }

    let mut file_a = File::open(a)?;
    let mut file_b = File::open(b)?;
    let mut buf_a = vec![0u8; BUFFER_SIZE];
    let mut buf_b = vec![0u8; BUFFER_SIZE];

    loop {
        let n = read_full(&mut file_a, &mut buf_a)?;
        let m = read_full(&mut file_b, &mut buf_b)?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Reads until the buffer is full or the stream ends.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_with(content: &[u8]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), content).unwrap();
        file
    }

    #[test]
    fn identical_files_are_equal() {
        let a = temp_with(b"firmware image contents");
        let b = temp_with(b"firmware image contents");
        assert!(files_equal(a.path(), b.path()).unwrap());
    }

    #[test]
    fn same_length_different_content_differs() {
        let a = temp_with(b"aaaa");
        let b = temp_with(b"aaab");
        assert!(!files_equal(a.path(), b.path()).unwrap());
    }

    #[test]
    fn different_lengths_differ() {
        let a = temp_with(b"short");
        let b = temp_with(b"a longer dump");
        assert!(!files_equal(a.path(), b.path()).unwrap());
    }

    #[test]
    fn empty_files_are_equal() {
        let a = temp_with(b"");
        let b = temp_with(b"");
        assert!(files_equal(a.path(), b.path()).unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        let a = temp_with(b"x");
        assert!(files_equal(a.path(), Path::new("/no/such/dump.bin")).is_err());
    }
}

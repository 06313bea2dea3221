//! Double SHA-256, the BTC-compatible digest family.

use std::io;

use sha2::{Digest, Sha256};

/// An `io::Write` adapter that double-hashes everything written to it, so a
/// structure can be hashed while it is serialized.
#[derive(Default)]
pub struct Writer {
    hash: Sha256,
}

impl Writer {
    /// Consume the writer and return the double SHA-256 of the written bytes.
    pub fn finish(self) -> [u8; 32] {
        let first = self.hash.finalize();
        let second = Sha256::digest(&first);
        let mut output = [0u8; 32];
        output.copy_from_slice(&second);
        output
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hash.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One-shot double SHA-256.
pub fn digest(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(&first);
    let mut output = [0u8; 32];
    output.copy_from_slice(&second);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn writer_matches_one_shot() {
        let mut writer = Writer::default();
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        assert_eq!(writer.finish(), digest(b"hello world"));
    }
}

use std::io::{self, Read};

use crate::error::BundleError;

/// Default flash write block (LittleFS friendly).
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// The single reusable buffer every phase copies through.
pub struct TransferBuffer {
    block: Vec<u8>,
}

impl TransferBuffer {
    /// Allocates the block, reporting failure instead of aborting.
    pub fn try_new(capacity: usize) -> Result<Self, BundleError> {
        let capacity = capacity.max(1);
        let mut block = Vec::new();
        block
            .try_reserve_exact(capacity)
            .map_err(|_| BundleError::Allocation(capacity))?;
        block.resize(capacity, 0);
        Ok(Self { block })
    }

    pub fn capacity(&self) -> usize {
        self.block.len()
    }

    /// Writable window of at most `capacity` bytes.
    pub fn window(&mut self, len: usize) -> &mut [u8] {
        let len = len.min(self.block.len());
        &mut self.block[..len]
    }

    pub fn filled(&self, len: usize) -> &[u8] {
        &self.block[..len.min(self.block.len())]
    }
}

/// Pulls the request body on demand and keeps the byte accounting.
///
/// `remaining` starts at `Content-Length` and never goes below zero: every
/// read is checked against it first and overruns surface as
/// [`BundleError::Sequencing`].
pub struct BundleReader<R> {
    body: R,
    remaining: u64,
    consumed: u64,
}

impl<R: Read> BundleReader<R> {
    pub fn new(body: R, content_length: u64) -> Self {
        Self {
            body,
            remaining: content_length,
            consumed: 0,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn ensure_available(&self, needed: u64) -> Result<(), BundleError> {
        if needed > self.remaining {
            return Err(BundleError::Sequencing {
                needed,
                remaining: self.remaining,
            });
        }
        Ok(())
    }

    /// Fills `dst` completely or fails.
    pub fn read_exact(&mut self, dst: &mut [u8]) -> Result<(), BundleError> {
        self.ensure_available(dst.len() as u64)?;

        let mut filled = 0;
        while filled < dst.len() {
            match self.body.read(&mut dst[filled..]) {
                Ok(0) => {
                    self.advance(filled);
                    return Err(BundleError::ShortRead {
                        expected: dst.len(),
                        received: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.advance(filled);
                    return Err(BundleError::Read(e));
                }
            }
        }
        self.advance(filled);
        Ok(())
    }

    /// One read of up to `dst.len()` bytes. End of body before `dst` sees a
    /// single byte is a short read.
    pub fn read_some(&mut self, dst: &mut [u8]) -> Result<usize, BundleError> {
        if dst.is_empty() {
            return Ok(0);
        }
        self.ensure_available(dst.len() as u64)?;

        loop {
            match self.body.read(dst) {
                Ok(0) => {
                    return Err(BundleError::ShortRead {
                        expected: dst.len(),
                        received: 0,
                    })
                }
                Ok(n) => {
                    self.advance(n);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BundleError::Read(e)),
            }
        }
    }

    fn advance(&mut self, n: usize) {
        let n = n as u64;
        self.remaining = self.remaining.saturating_sub(n);
        self.consumed += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out at most `step` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_read_exact_across_short_reads() {
        let data = b"0123456789";
        let mut reader = BundleReader::new(Trickle { data, step: 3 }, 10);
        let mut dst = [0u8; 10];
        reader.read_exact(&mut dst).unwrap();
        assert_eq!(&dst, data);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.consumed(), 10);
    }

    #[test]
    fn test_read_exact_short_body() {
        let mut reader = BundleReader::new(Cursor::new(vec![1u8, 2, 3]), 8);
        let mut dst = [0u8; 6];
        match reader.read_exact(&mut dst) {
            Err(BundleError::ShortRead { expected, received }) => {
                assert_eq!(expected, 6);
                assert_eq!(received, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_overrun_is_sequencing_error() {
        let mut reader = BundleReader::new(Cursor::new(vec![0u8; 32]), 4);
        let mut dst = [0u8; 6];
        assert!(matches!(
            reader.read_exact(&mut dst),
            Err(BundleError::Sequencing { needed: 6, remaining: 4 })
        ));
        assert_eq!(reader.consumed(), 0);
    }

    #[test]
    fn test_read_some_and_buffer_window() {
        let mut buffer = TransferBuffer::try_new(4).unwrap();
        let mut reader = BundleReader::new(Cursor::new(b"abcdef".to_vec()), 6);

        let n = reader.read_some(buffer.window(16)).unwrap();
        assert_eq!(n, 4);
        assert_eq!(buffer.filled(n), b"abcd");
        assert_eq!(reader.remaining(), 2);
    }
}

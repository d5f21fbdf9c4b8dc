//! A cursor for unpacking variable-length payloads field by field.

use pldm_wire::{PldmWireRead, PldmWireSized, WireError};

/// Sequential reader over a payload slice.
///
/// Fixed-size fields advance the cursor by their packed length; trailing
/// variable fields take what a preceding count field described.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, at: 0 }
    }

    /// Unpack the next fixed-size field.
    pub fn take<T: PldmWireRead + PldmWireSized>(&mut self) -> Result<T, WireError> {
        let value = T::unpack_from_slice(&self.buf[self.at.min(self.buf.len())..])?;

        self.at += T::PACKED_LEN;

        Ok(value)
    }

    /// Take the next `len` raw bytes.
    pub fn take_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let remaining = self.remaining();

        if remaining.len() < len {
            return Err(WireError::ReadBufferTooShort {
                got: remaining.len(),
                expected: len,
            });
        }

        self.at += len;

        Ok(&remaining[..len])
    }

    /// All bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.at.min(self.buf.len())..]
    }

    /// Number of bytes not yet consumed.
    pub fn remaining_len(&self) -> usize {
        self.remaining().len()
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.at
    }
}

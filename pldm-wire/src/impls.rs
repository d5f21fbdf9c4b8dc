//! Builtin implementations for primitive types.

use crate::{PldmWireRead, PldmWireSized, PldmWireWrite, WireError};

macro_rules! impl_primitive_wire_field {
    ($ty:ty, $size:expr) => {
        impl PldmWireWrite for $ty {
            fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
                let chunk = &mut buf[0..$size];

                chunk.copy_from_slice(&self.to_le_bytes());

                chunk
            }

            fn packed_len(&self) -> usize {
                $size
            }
        }

        impl PldmWireRead for $ty {
            fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
                buf.get(0..$size)
                    .ok_or(WireError::ReadBufferTooShort {
                        got: buf.len(),
                        expected: $size,
                    })
                    .and_then(|raw| raw.try_into().map_err(|_| WireError::InvalidValue))
                    .map(Self::from_le_bytes)
            }
        }

        impl PldmWireSized for $ty {
            const PACKED_LEN: usize = $size;

            type Buffer = [u8; $size];

            fn buffer() -> Self::Buffer {
                [0u8; $size]
            }
        }
    };
}

impl_primitive_wire_field!(u8, 1);
impl_primitive_wire_field!(u16, 2);
impl_primitive_wire_field!(u32, 4);
impl_primitive_wire_field!(u64, 8);
impl_primitive_wire_field!(i8, 1);
impl_primitive_wire_field!(i16, 2);
impl_primitive_wire_field!(i32, 4);
impl_primitive_wire_field!(i64, 8);
impl_primitive_wire_field!(f32, 4);

impl PldmWireWrite for bool {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = *self as u8;

        &buf[0..1]
    }

    fn packed_len(&self) -> usize {
        1
    }
}

impl PldmWireRead for bool {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let raw = buf.first().ok_or(WireError::ReadBufferTooShort {
            got: 0,
            expected: 1,
        })?;

        Ok(*raw != 0)
    }
}

impl PldmWireSized for bool {
    const PACKED_LEN: usize = 1;

    type Buffer = [u8; 1];

    fn buffer() -> Self::Buffer {
        [0u8; 1]
    }
}

impl<const N: usize> PldmWireWrite for [u8; N] {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let chunk = &mut buf[0..N];

        chunk.copy_from_slice(self);

        chunk
    }

    fn packed_len(&self) -> usize {
        N
    }
}

impl<const N: usize> PldmWireRead for [u8; N] {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        buf.get(0..N)
            .ok_or(WireError::ReadBufferTooShort {
                got: buf.len(),
                expected: N,
            })
            .and_then(|raw| raw.try_into().map_err(|_| WireError::InvalidValue))
    }
}

impl<const N: usize> PldmWireSized for [u8; N] {
    const PACKED_LEN: usize = N;

    type Buffer = [u8; N];

    fn buffer() -> Self::Buffer {
        [0u8; N]
    }
}

impl PldmWireWrite for () {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        &buf[0..0]
    }

    fn packed_len(&self) -> usize {
        0
    }
}

impl PldmWireRead for () {
    fn unpack_from_slice(_buf: &[u8]) -> Result<Self, WireError> {
        Ok(())
    }
}

impl PldmWireSized for () {
    const PACKED_LEN: usize = 0;

    type Buffer = [u8; 0];

    fn buffer() -> Self::Buffer {
        [0u8; 0]
    }
}

/// Writes all bytes in the slice; the trailing-length convention matches PLDM
/// payloads whose final field runs to the end of the message.
impl PldmWireWrite for &[u8] {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let chunk = &mut buf[0..self.len()];

        chunk.copy_from_slice(self);

        chunk
    }

    fn packed_len(&self) -> usize {
        self.len()
    }
}

impl<const N: usize> PldmWireWrite for heapless::Vec<u8, N> {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let chunk = &mut buf[0..self.len()];

        chunk.copy_from_slice(self);

        chunk
    }

    fn packed_len(&self) -> usize {
        self.len()
    }
}

impl<const N: usize> PldmWireRead for heapless::Vec<u8, N> {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        Self::from_slice(buf).map_err(|_| WireError::ArrayLength {
            described: buf.len(),
            present: N,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PldmWireWriteSized;

    #[test]
    fn primitives_little_endian() {
        assert_eq!(0x1234_5678u32.pack(), [0x78, 0x56, 0x34, 0x12]);
        assert_eq!(0xBEEFu16.pack(), [0xEF, 0xBE]);
        assert_eq!((-2i16).pack(), [0xFE, 0xFF]);
    }

    #[test]
    fn unpack_too_short() {
        assert_eq!(
            u32::unpack_from_slice(&[0xAA, 0xBB]),
            Err(WireError::ReadBufferTooShort {
                got: 2,
                expected: 4
            })
        );
    }

    #[test]
    fn round_trip_array() {
        let raw = [1u8, 2, 3, 4, 5];

        let mut buf = [0u8; 8];

        let packed = raw.pack_to_slice(&mut buf).unwrap();

        assert_eq!(<[u8; 5]>::unpack_from_slice(packed), Ok(raw));
    }

    #[test]
    fn write_buffer_too_short() {
        let mut buf = [0u8; 1];

        assert_eq!(
            0xABCDu16.pack_to_slice(&mut buf),
            Err(WireError::WriteBufferTooShort {
                got: 1,
                expected: 2
            })
        );
    }
}

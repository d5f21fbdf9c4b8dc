//! Traits used to pack/unpack types from PLDM messages on the wire.
//!
//! PLDM (DSP0240) payloads are byte-aligned and little-endian, so these traits
//! deal in whole octets. They are used internally by
//! [`pldm`](https://crates.io/crates/pldm) for command payloads, PDR record
//! bodies and message headers.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
#![deny(unused_import_braces)]
#![deny(unused_qualifications)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

mod error;
mod impls;

pub use error::WireError;

/// A type that can be unpacked from a PLDM payload (packed bytes, little
/// endian).
pub trait PldmWireRead: Sized {
    /// Unpack this type from the beginning of the given buffer.
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError>;
}

/// A type that can be packed into a PLDM payload (packed bytes, little
/// endian).
pub trait PldmWireWrite {
    /// Pack the type and write it into the beginning of `buf`.
    ///
    /// # Panics
    ///
    /// This method must panic if `buf` is too short to hold the packed data.
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8];

    /// Pack the type and write it into the beginning of `buf`.
    ///
    /// The default implementation of this method will return an error if the
    /// buffer is not long enough.
    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        if buf.len() < self.packed_len() {
            return Err(WireError::WriteBufferTooShort {
                got: buf.len(),
                expected: self.packed_len(),
            });
        }

        Ok(self.pack_to_slice_unchecked(buf))
    }

    /// Get the length in bytes of this item when packed.
    fn packed_len(&self) -> usize;
}

/// Implemented for types with a known packed size at compile time.
pub trait PldmWireSized {
    /// Packed size in bytes.
    const PACKED_LEN: usize;

    /// Used to define an array of the correct length. This type should ALWAYS
    /// be of the form `[u8; N]` where `N` is a fixed value or const generic as
    /// per the type this trait is implemented on.
    type Buffer: AsRef<[u8]> + AsMut<[u8]>;

    /// Create a zeroed buffer sized to contain the packed representation of
    /// this item.
    fn buffer() -> Self::Buffer;
}

/// A readable type with a known packed size at compile time.
pub trait PldmWireReadSized: PldmWireRead + PldmWireSized {}

impl<T> PldmWireReadSized for T where T: PldmWireRead + PldmWireSized {}

/// A writeable type with a known packed size at compile time.
pub trait PldmWireWriteSized: PldmWireWrite + PldmWireSized {
    /// Pack this item into a fixed size array.
    fn pack(&self) -> Self::Buffer {
        let mut buf = Self::buffer();

        self.pack_to_slice_unchecked(buf.as_mut());

        buf
    }
}

impl<T> PldmWireWriteSized for T where T: PldmWireWrite + PldmWireSized {}

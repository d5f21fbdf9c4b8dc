//! Typed encoders/decoders for the PLDM commands this stack speaks.
//!
//! Every multi-byte integer is little-endian on the wire. The common message
//! header is 3 bytes; responses carry a completion code as the first payload
//! byte for a 4 byte effective response header. See DSP0240 §8.

pub mod base;
pub mod event_data;
pub mod fru;
pub mod pdr;
pub mod platform;

mod header;
mod reader;

pub use header::{MsgHeader, MsgKind, PLDM_HEADER_LEN, RESPONSE_HEADER_LEN};
pub use reader::Reader;

use crate::InstanceId;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use pldm_wire::{PldmWireRead, PldmWireWrite, WireError};

/// PLDM type numbers, per DSP0245.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PldmType {
    /// Messaging control and discovery (DSP0240).
    Base = 0,
    /// Monitoring and control (DSP0248).
    Platform = 2,
    /// BIOS control and configuration (DSP0247).
    Bios = 3,
    /// FRU data (DSP0257).
    Fru = 4,
    /// Firmware update (DSP0267).
    FwUpdate = 5,
    /// Vendor defined.
    Oem = 63,
}

/// PLDM completion codes, per DSP0240 plus the file I/O extension range.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum CompletionCode {
    /// The command completed normally.
    Success = 0x00,
    /// A generic failure.
    Error = 0x01,
    /// A parameter in the request is invalid.
    InvalidData = 0x02,
    /// The request is the wrong length for the command.
    InvalidLength = 0x03,
    /// The responder cannot service the request right now.
    NotReady = 0x04,
    /// The command is not implemented for this PLDM type.
    UnsupportedCmd = 0x05,
    /// The PLDM type is not implemented by this terminus.
    InvalidPldmType = 0x20,
    /// File I/O: the file handle does not exist.
    InvalidFileHandle = 0x80,
    /// File I/O: offset is beyond the end of the file.
    DataOutOfRange = 0x81,
    /// File I/O: read length is not acceptable.
    InvalidReadLength = 0x82,
    /// File I/O: write length is not acceptable.
    InvalidWriteLength = 0x83,
    /// A code this stack has no name for.
    #[num_enum(catch_all)]
    Other(u8),
}

impl CompletionCode {
    /// Whether this code reports success.
    pub fn is_success(self) -> bool {
        self == CompletionCode::Success
    }
}

impl core::fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CompletionCode::Other(raw) => write!(f, "{:#04x}", raw),
            other => write!(f, "{:?} ({:#04x})", other, u8::from(*other)),
        }
    }
}

impl PldmWireWrite for CompletionCode {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        u8::from(*self).pack_to_slice_unchecked(buf)
    }

    fn packed_len(&self) -> usize {
        1
    }
}

impl PldmWireRead for CompletionCode {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        u8::unpack_from_slice(buf).map(Self::from)
    }
}

impl pldm_wire::PldmWireSized for CompletionCode {
    const PACKED_LEN: usize = 1;

    type Buffer = [u8; 1];

    fn buffer() -> Self::Buffer {
        [0u8; 1]
    }
}

/// A request payload bound to its PLDM type, command number and expected
/// response shape.
pub trait Request: PldmWireWrite {
    /// The PLDM type this command belongs to.
    const PLDM_TYPE: PldmType;

    /// Command number within the type.
    const COMMAND: u8;

    /// The decoded response payload, completion code included.
    type Response: PldmWireRead;
}

/// A borrowed view over a raw PLDM message: header plus payload.
#[derive(Debug, Copy, Clone)]
pub struct Msg<'a> {
    /// The decoded common header.
    pub header: MsgHeader,
    /// Payload bytes after the 3-byte header. For responses this starts with
    /// the completion code.
    pub payload: &'a [u8],
}

impl<'a> Msg<'a> {
    /// Parse a raw PLDM message (MCTP prefix already stripped).
    pub fn parse(bytes: &'a [u8]) -> Result<Self, WireError> {
        let header = MsgHeader::unpack_from_slice(bytes)?;

        Ok(Self {
            header,
            payload: &bytes[PLDM_HEADER_LEN..],
        })
    }

    /// Split a response payload into its completion code and the remaining
    /// command-specific bytes.
    pub fn split_completion(&self) -> Result<(CompletionCode, &'a [u8]), WireError> {
        let cc = CompletionCode::unpack_from_slice(self.payload)?;

        Ok((cc, &self.payload[1..]))
    }
}

fn build(header: MsgHeader, payload: &dyn PldmWireWrite) -> Vec<u8> {
    let mut out = vec![0u8; PLDM_HEADER_LEN + payload.packed_len()];

    header.pack_to_slice_unchecked(&mut out);
    payload.pack_to_slice_unchecked(&mut out[PLDM_HEADER_LEN..]);

    out
}

/// Encode a request message.
pub fn request<R: Request>(instance_id: InstanceId, payload: &R) -> Vec<u8> {
    build(
        MsgHeader::request(instance_id, R::PLDM_TYPE, R::COMMAND),
        payload,
    )
}

/// Encode an async request notify message.
///
/// Used for fire and forget writes whose response is only logged.
pub fn async_request<R: Request>(instance_id: InstanceId, payload: &R) -> Vec<u8> {
    build(
        MsgHeader::async_request(instance_id, R::PLDM_TYPE, R::COMMAND),
        payload,
    )
}

/// Encode a response to `req`, copying its instance id, type and command.
///
/// `payload` carries the completion code as its first packed byte; typed
/// response structs do this themselves.
pub fn response<P: PldmWireWrite>(req: &MsgHeader, payload: &P) -> Vec<u8> {
    build(MsgHeader::response_to(req), payload)
}

/// Encode a response carrying only a completion code.
pub fn cc_only_response(req: &MsgHeader, completion_code: CompletionCode) -> Vec<u8> {
    response(req, &completion_code)
}

/// Decode a typed response message, validating nothing but shape; header
/// matching against the originating request is the engine's job.
pub fn decode_response<R: Request>(bytes: &[u8]) -> Result<R::Response, WireError> {
    let msg = Msg::parse(bytes)?;

    R::Response::unpack_from_slice(msg.payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_code_round_trip() {
        assert_eq!(CompletionCode::from(0x05u8), CompletionCode::UnsupportedCmd);
        assert_eq!(CompletionCode::from(0x20u8), CompletionCode::InvalidPldmType);
        assert_eq!(CompletionCode::from(0x42u8), CompletionCode::Other(0x42));
        assert_eq!(u8::from(CompletionCode::DataOutOfRange), 0x81);
    }

    #[test]
    fn response_header_copies_request_fields() {
        let req = MsgHeader::request(7, PldmType::Platform, 0x51);

        let resp = cc_only_response(&req, CompletionCode::Success);

        assert_eq!(resp, vec![0x07, 0x02, 0x51, 0x00]);
    }
}

//! The common PLDM message header.

use super::PldmType;
use crate::InstanceId;
use pldm_wire::{PldmWireRead, PldmWireSized, PldmWireWrite, WireError};

/// Length in bytes of the common PLDM header.
pub const PLDM_HEADER_LEN: usize = 3;

/// Length in bytes of a response header: common header plus completion code.
pub const RESPONSE_HEADER_LEN: usize = 4;

const RQ_BIT: u8 = 0x80;
const D_BIT: u8 = 0x40;
const IID_MASK: u8 = 0x1F;
const TYPE_MASK: u8 = 0x3F;

/// The direction/class of a message, from the `rq` and `d` header bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MsgKind {
    /// `rq = 1, d = 0`: a request expecting a response.
    Request,
    /// `rq = 1, d = 1`: an async request notify; the sender will not retry on
    /// a missing response.
    AsyncRequestNotify,
    /// `rq = 0`: a response.
    Response,
}

impl MsgKind {
    /// Whether the request bit is set.
    pub fn is_request(self) -> bool {
        !matches!(self, MsgKind::Response)
    }
}

/// The common PLDM message header, per DSP0240 §8.1.
///
/// ```text
/// byte 0: [rq:1 | d:1 | rsvd:1 | iid:5]
/// byte 1: [hdr_ver:2 | type:6]          (hdr_ver = 0)
/// byte 2: [command:8]
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MsgHeader {
    /// Message kind from the `rq`/`d` bits.
    pub kind: MsgKind,
    /// Correlation instance id, 0..=31.
    pub instance_id: InstanceId,
    /// Raw PLDM type octet. Kept raw so that unknown types can be bounced
    /// with the right completion code rather than failing the parse.
    pub pldm_type: u8,
    /// Command number within the type.
    pub command: u8,
}

impl MsgHeader {
    /// Header for a plain request.
    pub fn request(instance_id: InstanceId, ty: PldmType, command: u8) -> Self {
        Self {
            kind: MsgKind::Request,
            instance_id: instance_id & IID_MASK,
            pldm_type: ty.into(),
            command,
        }
    }

    /// Header for an async request notify.
    pub fn async_request(instance_id: InstanceId, ty: PldmType, command: u8) -> Self {
        Self {
            kind: MsgKind::AsyncRequestNotify,
            ..Self::request(instance_id, ty, command)
        }
    }

    /// Header for the response to `req`: request bit cleared, instance id,
    /// type and command copied.
    pub fn response_to(req: &MsgHeader) -> Self {
        Self {
            kind: MsgKind::Response,
            instance_id: req.instance_id,
            pldm_type: req.pldm_type,
            command: req.command,
        }
    }
}

impl PldmWireSized for MsgHeader {
    const PACKED_LEN: usize = PLDM_HEADER_LEN;

    type Buffer = [u8; PLDM_HEADER_LEN];

    fn buffer() -> Self::Buffer {
        [0u8; PLDM_HEADER_LEN]
    }
}

impl PldmWireWrite for MsgHeader {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let bits = match self.kind {
            MsgKind::Request => RQ_BIT,
            MsgKind::AsyncRequestNotify => RQ_BIT | D_BIT,
            MsgKind::Response => 0,
        };

        buf[0] = bits | (self.instance_id & IID_MASK);
        buf[1] = self.pldm_type & TYPE_MASK;
        buf[2] = self.command;

        &buf[0..PLDM_HEADER_LEN]
    }

    fn packed_len(&self) -> usize {
        PLDM_HEADER_LEN
    }
}

impl PldmWireRead for MsgHeader {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < PLDM_HEADER_LEN {
            return Err(WireError::ReadBufferTooShort {
                got: buf.len(),
                expected: PLDM_HEADER_LEN,
            });
        }

        // hdr_ver must be 0
        if buf[1] & !TYPE_MASK != 0 {
            return Err(WireError::InvalidValue);
        }

        let kind = match (buf[0] & RQ_BIT != 0, buf[0] & D_BIT != 0) {
            (true, false) => MsgKind::Request,
            (true, true) => MsgKind::AsyncRequestNotify,
            (false, _) => MsgKind::Response,
        };

        Ok(Self {
            kind,
            instance_id: buf[0] & IID_MASK,
            pldm_type: buf[1] & TYPE_MASK,
            command: buf[2],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pldm_wire::PldmWireWriteSized;

    #[test]
    fn pack_request_lower_range() {
        let header = MsgHeader::request(0, PldmType::Base, 0);

        assert_eq!(header.pack(), [0x80, 0x00, 0x00]);
    }

    #[test]
    fn pack_request_upper_range() {
        let header = MsgHeader {
            kind: MsgKind::Request,
            instance_id: 31,
            pldm_type: 63,
            command: 255,
        };

        assert_eq!(header.pack(), [0x9F, 0x3F, 0xFF]);
    }

    #[test]
    fn pack_async_request_notify() {
        let header = MsgHeader {
            kind: MsgKind::AsyncRequestNotify,
            instance_id: 31,
            pldm_type: 63,
            command: 255,
        };

        assert_eq!(header.pack(), [0xDF, 0x3F, 0xFF]);
    }

    #[test]
    fn pack_response() {
        let req = MsgHeader::request(31, PldmType::Oem, 255);

        assert_eq!(MsgHeader::response_to(&req).pack(), [0x1F, 0x3F, 0xFF]);
    }

    #[test]
    fn unpack_rejects_header_version() {
        assert_eq!(
            MsgHeader::unpack_from_slice(&[0x80, 0x40, 0x00]),
            Err(WireError::InvalidValue)
        );
    }

    #[test]
    fn unpack_round_trip() {
        let header = MsgHeader::async_request(5, PldmType::Platform, 0x39);

        assert_eq!(
            MsgHeader::unpack_from_slice(&header.pack()),
            Ok(header)
        );
    }
}

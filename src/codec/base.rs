//! Messaging control and discovery commands (PLDM type 0, DSP0240).

use super::{CompletionCode, PldmType, Reader, Request};
use crate::Tid;
use pldm_wire::{PldmWireRead, PldmWireSized, PldmWireWrite, WireError};

/// `SetTID` command number.
pub const SET_TID: u8 = 0x01;
/// `GetTID` command number.
pub const GET_TID: u8 = 0x02;
/// `GetPLDMVersion` command number.
pub const GET_PLDM_VERSION: u8 = 0x03;
/// `GetPLDMTypes` command number.
pub const GET_PLDM_TYPES: u8 = 0x04;
/// `GetPLDMCommands` command number.
pub const GET_PLDM_COMMANDS: u8 = 0x05;

/// A ver32 version number, e.g. `1.1.1.0`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Ver32 {
    /// Major version, BCD encoded.
    pub major: u8,
    /// Minor version, BCD encoded.
    pub minor: u8,
    /// Update version, BCD encoded; 0xFF if unused.
    pub update: u8,
    /// Alpha character; 0 if unused.
    pub alpha: u8,
}

impl Ver32 {
    /// Version `1.0.0` as advertised for the base type.
    pub const BASE_1_0: Self = Self {
        major: 0xF1,
        minor: 0xF0,
        update: 0xF0,
        alpha: 0x00,
    };
}

impl PldmWireSized for Ver32 {
    const PACKED_LEN: usize = 4;

    type Buffer = [u8; 4];

    fn buffer() -> Self::Buffer {
        [0u8; 4]
    }
}

impl PldmWireWrite for Ver32 {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = self.major;
        buf[1] = self.minor;
        buf[2] = self.update;
        buf[3] = self.alpha;

        &buf[0..4]
    }

    fn packed_len(&self) -> usize {
        4
    }
}

impl PldmWireRead for Ver32 {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let raw = <[u8; 4]>::unpack_from_slice(buf)?;

        Ok(Self {
            major: raw[0],
            minor: raw[1],
            update: raw[2],
            alpha: raw[3],
        })
    }
}

/// `GetTID` request. Empty payload.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GetTid;

impl PldmWireWrite for GetTid {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        &buf[0..0]
    }

    fn packed_len(&self) -> usize {
        0
    }
}

impl PldmWireRead for GetTid {
    fn unpack_from_slice(_buf: &[u8]) -> Result<Self, WireError> {
        Ok(Self)
    }
}

impl Request for GetTid {
    const PLDM_TYPE: PldmType = PldmType::Base;
    const COMMAND: u8 = GET_TID;

    type Response = GetTidResponse;
}

/// `GetTID` response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetTidResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// The responder's terminus id.
    pub tid: Tid,
}

impl PldmWireRead for GetTidResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        let tid = if completion_code.is_success() {
            reader.take::<u8>()?
        } else {
            0
        };

        Ok(Self {
            completion_code,
            tid,
        })
    }
}

impl PldmWireWrite for GetTidResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = self.completion_code.into();
        buf[1] = self.tid;

        &buf[0..2]
    }

    fn packed_len(&self) -> usize {
        2
    }
}

/// `SetTID` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SetTid {
    /// The terminus id to assign.
    pub tid: Tid,
}

impl PldmWireWrite for SetTid {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        self.tid.pack_to_slice_unchecked(buf)
    }

    fn packed_len(&self) -> usize {
        1
    }
}

impl PldmWireRead for SetTid {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        u8::unpack_from_slice(buf).map(|tid| Self { tid })
    }
}

impl Request for SetTid {
    const PLDM_TYPE: PldmType = PldmType::Base;
    const COMMAND: u8 = SET_TID;

    type Response = CompletionCode;
}

/// `GetPLDMTypes` request. Empty payload.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GetPldmTypes;

impl PldmWireWrite for GetPldmTypes {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        &buf[0..0]
    }

    fn packed_len(&self) -> usize {
        0
    }
}

impl Request for GetPldmTypes {
    const PLDM_TYPE: PldmType = PldmType::Base;
    const COMMAND: u8 = GET_PLDM_TYPES;

    type Response = GetPldmTypesResponse;
}

/// `GetPLDMTypes` response: a 64-wide bitfield of implemented types.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetPldmTypesResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// Bit N set means PLDM type N is implemented.
    pub types: [u8; 8],
}

impl GetPldmTypesResponse {
    /// Whether the responder implements `ty`.
    pub fn supports(&self, ty: PldmType) -> bool {
        let bit = u8::from(ty);

        self.types[usize::from(bit / 8)] & (1 << (bit % 8)) != 0
    }
}

impl PldmWireRead for GetPldmTypesResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        let types = if completion_code.is_success() {
            reader.take::<[u8; 8]>()?
        } else {
            [0u8; 8]
        };

        Ok(Self {
            completion_code,
            types,
        })
    }
}

impl PldmWireWrite for GetPldmTypesResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = self.completion_code.into();
        buf[1..9].copy_from_slice(&self.types);

        &buf[0..9]
    }

    fn packed_len(&self) -> usize {
        9
    }
}

/// `GetPLDMCommands` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetPldmCommands {
    /// The PLDM type to query.
    pub pldm_type: u8,
    /// The version of the type to query.
    pub version: Ver32,
}

impl PldmWireWrite for GetPldmCommands {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = self.pldm_type;
        self.version.pack_to_slice_unchecked(&mut buf[1..]);

        &buf[0..5]
    }

    fn packed_len(&self) -> usize {
        5
    }
}

impl PldmWireRead for GetPldmCommands {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            pldm_type: reader.take::<u8>()?,
            version: reader.take::<Ver32>()?,
        })
    }
}

impl Request for GetPldmCommands {
    const PLDM_TYPE: PldmType = PldmType::Base;
    const COMMAND: u8 = GET_PLDM_COMMANDS;

    type Response = GetPldmCommandsResponse;
}

/// `GetPLDMCommands` response: a 256-wide bitfield of implemented commands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetPldmCommandsResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// Bit N set means command N is implemented.
    pub commands: [u8; 32],
}

impl GetPldmCommandsResponse {
    /// Whether the responder implements `command`.
    pub fn supports(&self, command: u8) -> bool {
        self.commands[usize::from(command / 8)] & (1 << (command % 8)) != 0
    }
}

impl PldmWireRead for GetPldmCommandsResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        let commands = if completion_code.is_success() {
            reader.take::<[u8; 32]>()?
        } else {
            [0u8; 32]
        };

        Ok(Self {
            completion_code,
            commands,
        })
    }
}

impl PldmWireWrite for GetPldmCommandsResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = self.completion_code.into();
        buf[1..33].copy_from_slice(&self.commands);

        &buf[0..33]
    }

    fn packed_len(&self) -> usize {
        33
    }
}

/// Transfer operation flag for multi-part gets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum TransferOpFlag {
    /// Continue an in-progress transfer.
    GetNextPart = 0,
    /// Begin a transfer.
    GetFirstPart = 1,
}

/// Transfer position flag for multi-part responses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum TransferFlag {
    /// First part of several.
    Start = 0x00,
    /// A middle part.
    Middle = 0x01,
    /// Final part of several; a CRC follows the data.
    End = 0x04,
    /// The single and only part.
    StartAndEnd = 0x05,
}

/// `GetPLDMVersion` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetPldmVersion {
    /// Handle to continue a multi-part transfer; 0 to begin.
    pub transfer_handle: u32,
    /// Which part to get.
    pub op_flag: TransferOpFlag,
    /// The PLDM type whose version is queried.
    pub pldm_type: u8,
}

impl GetPldmVersion {
    /// The probe sent to discover whether a terminus is alive: first part of
    /// the base type's version.
    pub fn probe() -> Self {
        Self {
            transfer_handle: 0,
            op_flag: TransferOpFlag::GetFirstPart,
            pldm_type: PldmType::Base.into(),
        }
    }
}

impl PldmWireWrite for GetPldmVersion {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        self.transfer_handle.pack_to_slice_unchecked(buf);
        buf[4] = self.op_flag.into();
        buf[5] = self.pldm_type;

        &buf[0..6]
    }

    fn packed_len(&self) -> usize {
        6
    }
}

impl PldmWireRead for GetPldmVersion {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            transfer_handle: reader.take::<u32>()?,
            op_flag: TransferOpFlag::try_from(reader.take::<u8>()?)
                .map_err(|_| WireError::InvalidValue)?,
            pldm_type: reader.take::<u8>()?,
        })
    }
}

impl Request for GetPldmVersion {
    const PLDM_TYPE: PldmType = PldmType::Base;
    const COMMAND: u8 = GET_PLDM_VERSION;

    type Response = GetPldmVersionResponse;
}

/// `GetPLDMVersion` response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetPldmVersionResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// Handle for the next part; 0 when complete.
    pub next_transfer_handle: u32,
    /// Position of this part.
    pub transfer_flag: TransferFlag,
    /// The version data of this part.
    pub version: Ver32,
}

impl PldmWireRead for GetPldmVersionResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        if !completion_code.is_success() {
            return Ok(Self {
                completion_code,
                next_transfer_handle: 0,
                transfer_flag: TransferFlag::StartAndEnd,
                version: Ver32::default(),
            });
        }

        Ok(Self {
            completion_code,
            next_transfer_handle: reader.take::<u32>()?,
            transfer_flag: TransferFlag::try_from(reader.take::<u8>()?)
                .map_err(|_| WireError::InvalidValue)?,
            version: reader.take::<Ver32>()?,
        })
    }
}

impl PldmWireWrite for GetPldmVersionResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = self.completion_code.into();
        self.next_transfer_handle
            .pack_to_slice_unchecked(&mut buf[1..]);
        buf[5] = self.transfer_flag.into();
        self.version.pack_to_slice_unchecked(&mut buf[6..]);

        &buf[0..10]
    }

    fn packed_len(&self) -> usize {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn get_version_probe_round_trip() {
        let req = GetPldmVersion::probe();

        let mut buf = [0u8; 6];

        req.pack_to_slice(&mut buf).unwrap();

        assert_eq!(buf, [0x00, 0x00, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(GetPldmVersion::unpack_from_slice(&buf), Ok(req));
    }

    #[test]
    fn get_version_resp_round_trip() {
        let resp = GetPldmVersionResponse {
            completion_code: CompletionCode::Success,
            next_transfer_handle: 0,
            transfer_flag: TransferFlag::StartAndEnd,
            version: Ver32::BASE_1_0,
        };

        let mut buf = [0u8; 10];

        resp.pack_to_slice(&mut buf).unwrap();

        assert_eq!(GetPldmVersionResponse::unpack_from_slice(&buf), Ok(resp));
    }

    #[test]
    fn types_bitfield() {
        let mut resp = GetPldmTypesResponse {
            completion_code: CompletionCode::Success,
            types: [0u8; 8],
        };

        resp.types[0] = 0b0000_0101;

        assert!(resp.supports(PldmType::Base));
        assert!(resp.supports(PldmType::Platform));
        assert!(!resp.supports(PldmType::Fru));
    }

    #[test]
    fn error_response_carries_no_fields() {
        let resp = GetTidResponse::unpack_from_slice(&[0x01]).unwrap();

        assert_eq!(resp.completion_code, CompletionCode::Error);
        assert_eq!(resp.tid, 0);
    }
}

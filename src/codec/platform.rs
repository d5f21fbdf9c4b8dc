//! Monitoring and control commands (PLDM type 2, DSP0248).

use super::base::{TransferFlag, TransferOpFlag};
use super::pdr::{EffecterDataSize, EffecterOperState, EffecterValue};
use super::{CompletionCode, PldmType, Reader, Request};
use crate::Tid;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use pldm_wire::{PldmWireRead, PldmWireWrite, WireError};

/// `SetEventReceiver` command number.
pub const SET_EVENT_RECEIVER: u8 = 0x04;
/// `PlatformEventMessage` command number.
pub const PLATFORM_EVENT_MESSAGE: u8 = 0x0A;
/// `GetStateSensorReadings` command number.
pub const GET_STATE_SENSOR_READINGS: u8 = 0x21;
/// `SetNumericEffecterEnable` command number.
pub const SET_NUMERIC_EFFECTER_ENABLE: u8 = 0x30;
/// `SetNumericEffecterValue` command number.
pub const SET_NUMERIC_EFFECTER_VALUE: u8 = 0x31;
/// `GetNumericEffecterValue` command number.
pub const GET_NUMERIC_EFFECTER_VALUE: u8 = 0x32;
/// `SetStateEffecterStates` command number.
pub const SET_STATE_EFFECTER_STATES: u8 = 0x39;
/// `GetPDRRepositoryInfo` command number.
pub const GET_PDR_REPOSITORY_INFO: u8 = 0x50;
/// `GetPDR` command number.
pub const GET_PDR: u8 = 0x51;

/// Largest composite count a state sensor or effecter may carry (DSP0248).
pub const MAX_COMPOSITE_COUNT: usize = 8;

/// `GetPDR` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetPdr {
    /// Record to fetch; 0 means the first record in the repository.
    pub record_handle: u32,
    /// Multi-part continuation handle; 0 to begin.
    pub data_transfer_handle: u32,
    /// Which part to get.
    pub transfer_op_flag: TransferOpFlag,
    /// Maximum record bytes to return; 0xFFFF for no limit.
    pub request_count: u16,
    /// Expected change number when continuing a transfer; 0 otherwise.
    pub record_change_number: u16,
}

impl GetPdr {
    /// A whole-record fetch of `record_handle`.
    pub fn first_part(record_handle: u32) -> Self {
        Self {
            record_handle,
            data_transfer_handle: 0,
            transfer_op_flag: TransferOpFlag::GetFirstPart,
            request_count: 0xFFFF,
            record_change_number: 0,
        }
    }
}

impl PldmWireWrite for GetPdr {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        self.record_handle.pack_to_slice_unchecked(buf);
        self.data_transfer_handle
            .pack_to_slice_unchecked(&mut buf[4..]);
        buf[8] = self.transfer_op_flag.into();
        self.request_count.pack_to_slice_unchecked(&mut buf[9..]);
        self.record_change_number
            .pack_to_slice_unchecked(&mut buf[11..]);

        &buf[0..13]
    }

    fn packed_len(&self) -> usize {
        13
    }
}

impl PldmWireRead for GetPdr {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            record_handle: reader.take::<u32>()?,
            data_transfer_handle: reader.take::<u32>()?,
            transfer_op_flag: TransferOpFlag::try_from(reader.take::<u8>()?)
                .map_err(|_| WireError::InvalidValue)?,
            request_count: reader.take::<u16>()?,
            record_change_number: reader.take::<u16>()?,
        })
    }
}

impl Request for GetPdr {
    const PLDM_TYPE: PldmType = PldmType::Platform;
    const COMMAND: u8 = GET_PDR;

    type Response = GetPdrResponse;
}

/// `GetPDR` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPdrResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// Handle of the record after this one; 0 when this was the tail.
    pub next_record_handle: u32,
    /// Continuation handle for multi-part transfers; 0 when complete.
    pub next_data_transfer_handle: u32,
    /// Position of this part.
    pub transfer_flag: TransferFlag,
    /// The record bytes of this part.
    pub record_data: Vec<u8>,
    /// CRC-8 over the whole record; present on the final part of a
    /// multi-part transfer only.
    pub transfer_crc: Option<u8>,
}

impl GetPdrResponse {
    /// A successful single-part response carrying a whole record.
    pub fn single_part(next_record_handle: u32, record_data: Vec<u8>) -> Self {
        Self {
            completion_code: CompletionCode::Success,
            next_record_handle,
            next_data_transfer_handle: 0,
            transfer_flag: TransferFlag::StartAndEnd,
            record_data,
            transfer_crc: None,
        }
    }

    /// An unsuccessful response.
    pub fn error(completion_code: CompletionCode) -> Self {
        Self {
            completion_code,
            next_record_handle: 0,
            next_data_transfer_handle: 0,
            transfer_flag: TransferFlag::StartAndEnd,
            record_data: Vec::new(),
            transfer_crc: None,
        }
    }
}

impl PldmWireRead for GetPdrResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        if !completion_code.is_success() {
            return Ok(Self::error(completion_code));
        }

        let next_record_handle = reader.take::<u32>()?;
        let next_data_transfer_handle = reader.take::<u32>()?;
        let transfer_flag =
            TransferFlag::try_from(reader.take::<u8>()?).map_err(|_| WireError::InvalidValue)?;
        let response_count = usize::from(reader.take::<u16>()?);
        let record_data = reader.take_bytes(response_count)?.to_vec();

        let transfer_crc = if transfer_flag == TransferFlag::End {
            Some(reader.take::<u8>()?)
        } else {
            None
        };

        Ok(Self {
            completion_code,
            next_record_handle,
            next_data_transfer_handle,
            transfer_flag,
            record_data,
            transfer_crc,
        })
    }
}

impl PldmWireWrite for GetPdrResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        buf[0] = self.completion_code.into();
        self.next_record_handle.pack_to_slice_unchecked(&mut buf[1..]);
        self.next_data_transfer_handle
            .pack_to_slice_unchecked(&mut buf[5..]);
        buf[9] = self.transfer_flag.into();
        (self.record_data.len() as u16).pack_to_slice_unchecked(&mut buf[10..]);
        buf[12..12 + self.record_data.len()].copy_from_slice(&self.record_data);

        if let Some(crc) = self.transfer_crc {
            buf[12 + self.record_data.len()] = crc;
        }

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        12 + self.record_data.len() + usize::from(self.transfer_crc.is_some())
    }
}

/// `GetPDRRepositoryInfo` request. Empty payload.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GetPdrRepositoryInfo;

impl PldmWireWrite for GetPdrRepositoryInfo {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        &buf[0..0]
    }

    fn packed_len(&self) -> usize {
        0
    }
}

impl Request for GetPdrRepositoryInfo {
    const PLDM_TYPE: PldmType = PldmType::Platform;
    const COMMAND: u8 = GET_PDR_REPOSITORY_INFO;

    type Response = GetPdrRepositoryInfoResponse;
}

/// `GetPDRRepositoryInfo` response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetPdrRepositoryInfoResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// 0 = available, 1 = update in progress, 2 = failed.
    pub repository_state: u8,
    /// Time of last update; all zeroes when not tracked.
    pub update_time: [u8; 13],
    /// Time of last OEM update; all zeroes when not tracked.
    pub oem_update_time: [u8; 13],
    /// Number of records in the repository.
    pub record_count: u32,
    /// Total size in bytes of all records.
    pub repository_size: u32,
    /// Size in bytes of the largest record.
    pub largest_record_size: u32,
    /// Seconds a multi-part transfer handle stays valid.
    pub data_transfer_handle_timeout: u8,
}

impl PldmWireRead for GetPdrRepositoryInfoResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        if !completion_code.is_success() {
            return Ok(Self {
                completion_code,
                repository_state: 0,
                update_time: [0; 13],
                oem_update_time: [0; 13],
                record_count: 0,
                repository_size: 0,
                largest_record_size: 0,
                data_transfer_handle_timeout: 0,
            });
        }

        Ok(Self {
            completion_code,
            repository_state: reader.take::<u8>()?,
            update_time: reader.take::<[u8; 13]>()?,
            oem_update_time: reader.take::<[u8; 13]>()?,
            record_count: reader.take::<u32>()?,
            repository_size: reader.take::<u32>()?,
            largest_record_size: reader.take::<u32>()?,
            data_transfer_handle_timeout: reader.take::<u8>()?,
        })
    }
}

impl PldmWireWrite for GetPdrRepositoryInfoResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = self.completion_code.into();
        buf[1] = self.repository_state;
        buf[2..15].copy_from_slice(&self.update_time);
        buf[15..28].copy_from_slice(&self.oem_update_time);
        self.record_count.pack_to_slice_unchecked(&mut buf[28..]);
        self.repository_size.pack_to_slice_unchecked(&mut buf[32..]);
        self.largest_record_size
            .pack_to_slice_unchecked(&mut buf[36..]);
        buf[40] = self.data_transfer_handle_timeout;

        &buf[0..41]
    }

    fn packed_len(&self) -> usize {
        41
    }
}

/// Set-request action for one composite effecter offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SetRequest {
    /// Leave this offset alone.
    NoChange = 0,
    /// Write `effecter_state` to this offset.
    RequestSet = 1,
}

/// One composite offset of a `SetStateEffecterStates` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StateField {
    /// Whether this offset is being written.
    pub set_request: SetRequest,
    /// The state value to write when `set_request` is `RequestSet`.
    pub effecter_state: u8,
}

impl StateField {
    /// An untouched offset.
    pub const NO_CHANGE: Self = Self {
        set_request: SetRequest::NoChange,
        effecter_state: 0,
    };

    /// A written offset.
    pub fn set(state: u8) -> Self {
        Self {
            set_request: SetRequest::RequestSet,
            effecter_state: state,
        }
    }
}

/// `SetStateEffecterStates` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetStateEffecterStates {
    /// The effecter to write.
    pub effecter_id: u16,
    /// One entry per composite offset; length is the composite count.
    pub fields: heapless::Vec<StateField, MAX_COMPOSITE_COUNT>,
}

impl PldmWireWrite for SetStateEffecterStates {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        self.effecter_id.pack_to_slice_unchecked(buf);
        buf[2] = self.fields.len() as u8;

        for (i, field) in self.fields.iter().enumerate() {
            buf[3 + i * 2] = field.set_request.into();
            buf[4 + i * 2] = field.effecter_state;
        }

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        3 + self.fields.len() * 2
    }
}

impl PldmWireRead for SetStateEffecterStates {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let effecter_id = reader.take::<u16>()?;
        let count = usize::from(reader.take::<u8>()?);

        if count > MAX_COMPOSITE_COUNT {
            return Err(WireError::InvalidValue);
        }

        let mut fields = heapless::Vec::new();
        for _ in 0..count {
            let set_request = SetRequest::try_from(reader.take::<u8>()?)
                .map_err(|_| WireError::InvalidValue)?;
            let effecter_state = reader.take::<u8>()?;

            // Cannot overflow; count is bounded above.
            let _ = fields.push(StateField {
                set_request,
                effecter_state,
            });
        }

        Ok(Self {
            effecter_id,
            fields,
        })
    }
}

impl Request for SetStateEffecterStates {
    const PLDM_TYPE: PldmType = PldmType::Platform;
    const COMMAND: u8 = SET_STATE_EFFECTER_STATES;

    type Response = CompletionCode;
}

/// `GetStateSensorReadings` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetStateSensorReadings {
    /// The sensor to read.
    pub sensor_id: u16,
    /// Bit N set re-arms composite offset N.
    pub rearm: u8,
    /// Reserved, must be 0.
    pub reserved: u8,
}

impl GetStateSensorReadings {
    /// Read `sensor_id` without re-arming anything.
    pub fn new(sensor_id: u16) -> Self {
        Self {
            sensor_id,
            rearm: 0,
            reserved: 0,
        }
    }
}

impl PldmWireWrite for GetStateSensorReadings {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        self.sensor_id.pack_to_slice_unchecked(buf);
        buf[2] = self.rearm;
        buf[3] = self.reserved;

        &buf[0..4]
    }

    fn packed_len(&self) -> usize {
        4
    }
}

impl PldmWireRead for GetStateSensorReadings {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            sensor_id: reader.take::<u16>()?,
            rearm: reader.take::<u8>()?,
            reserved: reader.take::<u8>()?,
        })
    }
}

impl Request for GetStateSensorReadings {
    const PLDM_TYPE: PldmType = PldmType::Platform;
    const COMMAND: u8 = GET_STATE_SENSOR_READINGS;

    type Response = GetStateSensorReadingsResponse;
}

/// One composite offset of a `GetStateSensorReadings` response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SensorStateField {
    /// Operational state of this offset.
    pub sensor_op_state: u8,
    /// Current state value.
    pub present_state: u8,
    /// State value before the last change.
    pub previous_state: u8,
    /// State value that caused the last event.
    pub event_state: u8,
}

/// `GetStateSensorReadings` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetStateSensorReadingsResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// One entry per composite offset.
    pub fields: heapless::Vec<SensorStateField, MAX_COMPOSITE_COUNT>,
}

impl PldmWireRead for GetStateSensorReadingsResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        let mut fields = heapless::Vec::new();

        if completion_code.is_success() {
            let count = usize::from(reader.take::<u8>()?);

            if count > MAX_COMPOSITE_COUNT {
                return Err(WireError::InvalidValue);
            }

            for _ in 0..count {
                let _ = fields.push(SensorStateField {
                    sensor_op_state: reader.take::<u8>()?,
                    present_state: reader.take::<u8>()?,
                    previous_state: reader.take::<u8>()?,
                    event_state: reader.take::<u8>()?,
                });
            }
        }

        Ok(Self {
            completion_code,
            fields,
        })
    }
}

impl PldmWireWrite for GetStateSensorReadingsResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        buf[0] = self.completion_code.into();
        buf[1] = self.fields.len() as u8;

        for (i, field) in self.fields.iter().enumerate() {
            let at = 2 + i * 4;
            buf[at] = field.sensor_op_state;
            buf[at + 1] = field.present_state;
            buf[at + 2] = field.previous_state;
            buf[at + 3] = field.event_state;
        }

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        2 + self.fields.len() * 4
    }
}

/// `SetNumericEffecterValue` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SetNumericEffecterValue {
    /// The effecter to write.
    pub effecter_id: u16,
    /// The raw value, sized per the effecter's data size.
    pub value: EffecterValue,
}

impl PldmWireWrite for SetNumericEffecterValue {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        self.effecter_id.pack_to_slice_unchecked(buf);
        buf[2] = self.value.data_size().into();
        self.value.pack_to_slice_unchecked(&mut buf[3..]);

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        3 + self.value.data_size().len()
    }
}

impl PldmWireRead for SetNumericEffecterValue {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let effecter_id = reader.take::<u16>()?;
        let data_size = EffecterDataSize::try_from(reader.take::<u8>()?)
            .map_err(|_| WireError::InvalidValue)?;
        let value = EffecterValue::unpack(data_size, &mut reader)?;

        Ok(Self { effecter_id, value })
    }
}

impl Request for SetNumericEffecterValue {
    const PLDM_TYPE: PldmType = PldmType::Platform;
    const COMMAND: u8 = SET_NUMERIC_EFFECTER_VALUE;

    type Response = CompletionCode;
}

/// `GetNumericEffecterValue` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetNumericEffecterValue {
    /// The effecter to read.
    pub effecter_id: u16,
}

impl PldmWireWrite for GetNumericEffecterValue {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        self.effecter_id.pack_to_slice_unchecked(buf)
    }

    fn packed_len(&self) -> usize {
        2
    }
}

impl PldmWireRead for GetNumericEffecterValue {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        u16::unpack_from_slice(buf).map(|effecter_id| Self { effecter_id })
    }
}

impl Request for GetNumericEffecterValue {
    const PLDM_TYPE: PldmType = PldmType::Platform;
    const COMMAND: u8 = GET_NUMERIC_EFFECTER_VALUE;

    type Response = GetNumericEffecterValueResponse;
}

/// `GetNumericEffecterValue` response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetNumericEffecterValueResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// Operational state of the effecter.
    pub oper_state: EffecterOperState,
    /// Value of the last accepted write.
    pub pending_value: EffecterValue,
    /// Value currently in effect.
    pub present_value: EffecterValue,
}

impl PldmWireRead for GetNumericEffecterValueResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        if !completion_code.is_success() {
            return Ok(Self {
                completion_code,
                oper_state: EffecterOperState::StatusUnknown,
                pending_value: EffecterValue::U8(0),
                present_value: EffecterValue::U8(0),
            });
        }

        let data_size = EffecterDataSize::try_from(reader.take::<u8>()?)
            .map_err(|_| WireError::InvalidValue)?;
        let oper_state = EffecterOperState::try_from(reader.take::<u8>()?)
            .map_err(|_| WireError::InvalidValue)?;
        let pending_value = EffecterValue::unpack(data_size, &mut reader)?;
        let present_value = EffecterValue::unpack(data_size, &mut reader)?;

        Ok(Self {
            completion_code,
            oper_state,
            pending_value,
            present_value,
        })
    }
}

impl PldmWireWrite for GetNumericEffecterValueResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        buf[0] = self.completion_code.into();
        buf[1] = self.pending_value.data_size().into();
        buf[2] = self.oper_state.into();

        let mut at = 3;
        self.pending_value.pack_to_slice_unchecked(&mut buf[at..]);
        at += self.pending_value.packed_len();
        self.present_value.pack_to_slice_unchecked(&mut buf[at..]);

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        3 + self.pending_value.packed_len() + self.present_value.packed_len()
    }
}

/// `SetNumericEffecterEnable` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SetNumericEffecterEnable {
    /// The effecter to enable or disable.
    pub effecter_id: u16,
    /// The operational state to enter.
    pub oper_state: EffecterOperState,
}

impl PldmWireWrite for SetNumericEffecterEnable {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        self.effecter_id.pack_to_slice_unchecked(buf);
        buf[2] = self.oper_state.into();

        &buf[0..3]
    }

    fn packed_len(&self) -> usize {
        3
    }
}

impl PldmWireRead for SetNumericEffecterEnable {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            effecter_id: reader.take::<u16>()?,
            oper_state: EffecterOperState::try_from(reader.take::<u8>()?)
                .map_err(|_| WireError::InvalidValue)?,
        })
    }
}

impl Request for SetNumericEffecterEnable {
    const PLDM_TYPE: PldmType = PldmType::Platform;
    const COMMAND: u8 = SET_NUMERIC_EFFECTER_ENABLE;

    type Response = CompletionCode;
}

/// `SetEventReceiver` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SetEventReceiver {
    /// 0 = disable, 1 = enable async, 2 = enable polling.
    pub event_message_global_enable: u8,
    /// Transport protocol; 0 = MCTP.
    pub transport_protocol_type: u8,
    /// Address of the receiver (an EID for MCTP).
    pub event_receiver_address_info: u8,
    /// Heartbeat period in seconds; 0 when not used.
    pub heartbeat_timer: u16,
}

impl PldmWireWrite for SetEventReceiver {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = self.event_message_global_enable;
        buf[1] = self.transport_protocol_type;
        buf[2] = self.event_receiver_address_info;
        self.heartbeat_timer.pack_to_slice_unchecked(&mut buf[3..]);

        &buf[0..5]
    }

    fn packed_len(&self) -> usize {
        5
    }
}

impl PldmWireRead for SetEventReceiver {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            event_message_global_enable: reader.take::<u8>()?,
            transport_protocol_type: reader.take::<u8>()?,
            event_receiver_address_info: reader.take::<u8>()?,
            heartbeat_timer: reader.take::<u16>()?,
        })
    }
}

impl Request for SetEventReceiver {
    const PLDM_TYPE: PldmType = PldmType::Platform;
    const COMMAND: u8 = SET_EVENT_RECEIVER;

    type Response = CompletionCode;
}

/// Event classes carried by `PlatformEventMessage`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum EventClass {
    /// A sensor event; the data begins with the sensor id and a sensor event
    /// class tag.
    Sensor = 0x00,
    /// An effecter event.
    Effecter = 0x01,
    /// The sender's PDR repository changed.
    PdrRepositoryChg = 0x04,
    /// A class this stack does not interpret.
    #[num_enum(catch_all)]
    Other(u8),
}

/// `PlatformEventMessage` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEventMessage {
    /// Event format version, always 1.
    pub format_version: u8,
    /// Terminus the event originates from.
    pub tid: Tid,
    /// Event class tag.
    pub event_class: EventClass,
    /// Class-specific payload.
    pub event_data: Vec<u8>,
}

impl PlatformEventMessage {
    /// Event format version this stack emits.
    pub const FORMAT_VERSION: u8 = 1;
}

impl PldmWireWrite for PlatformEventMessage {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        buf[0] = self.format_version;
        buf[1] = self.tid;
        buf[2] = self.event_class.into();
        buf[3..3 + self.event_data.len()].copy_from_slice(&self.event_data);

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        3 + self.event_data.len()
    }
}

impl PldmWireRead for PlatformEventMessage {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            format_version: reader.take::<u8>()?,
            tid: reader.take::<u8>()?,
            event_class: EventClass::from(reader.take::<u8>()?),
            event_data: reader.remaining().to_vec(),
        })
    }
}

impl Request for PlatformEventMessage {
    const PLDM_TYPE: PldmType = PldmType::Platform;
    const COMMAND: u8 = PLATFORM_EVENT_MESSAGE;

    type Response = PlatformEventMessageResponse;
}

/// `PlatformEventMessage` response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlatformEventMessageResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// 0 = accepted (no logging), per DSP0248.
    pub platform_event_status: u8,
}

impl PldmWireRead for PlatformEventMessageResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        let platform_event_status = if completion_code.is_success() {
            reader.take::<u8>()?
        } else {
            0
        };

        Ok(Self {
            completion_code,
            platform_event_status,
        })
    }
}

impl PldmWireWrite for PlatformEventMessageResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = self.completion_code.into();
        buf[1] = self.platform_event_status;

        &buf[0..2]
    }

    fn packed_len(&self) -> usize {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, MsgHeader};
    use pldm_wire::PldmWireWriteSized;
    use pretty_assertions::assert_eq;

    #[test]
    fn get_pdr_request_layout() {
        let req = GetPdr::first_part(0x11223344);

        let mut buf = [0u8; 13];

        req.pack_to_slice(&mut buf).unwrap();

        assert_eq!(
            buf,
            [
                0x44, 0x33, 0x22, 0x11, // record handle
                0x00, 0x00, 0x00, 0x00, // data transfer handle
                0x01, // get first part
                0xFF, 0xFF, // request count
                0x00, 0x00, // record change number
            ]
        );
        assert_eq!(GetPdr::unpack_from_slice(&buf), Ok(req));
    }

    #[test]
    fn get_pdr_response_round_trip() {
        let resp = GetPdrResponse::single_part(0x10, vec![1, 2, 3, 4]);

        let mut buf = [0u8; 64];

        let packed = resp.pack_to_slice(&mut buf).unwrap().to_vec();

        assert_eq!(GetPdrResponse::unpack_from_slice(&packed), Ok(resp));
    }

    #[test]
    fn set_state_effecter_states_wire_bytes() {
        // SetStateEffecterStates(instance 5, effecter 0x0004, one field
        // requesting state 2) as sent by the effecter write pipeline.
        let mut fields = heapless::Vec::new();
        fields.push(StateField::set(2)).unwrap();

        let req = SetStateEffecterStates {
            effecter_id: 0x0004,
            fields,
        };

        let msg = codec::async_request(5, &req);

        assert_eq!(msg, b"\xC5\x02\x39\x04\x00\x01\x01\x02");
    }

    #[test]
    fn set_numeric_effecter_value_u16() {
        let req = SetNumericEffecterValue {
            effecter_id: 3,
            value: EffecterValue::U16(300),
        };

        let mut buf = [0u8; 8];

        let packed = req.pack_to_slice(&mut buf).unwrap().to_vec();

        assert_eq!(packed, vec![0x03, 0x00, 0x02, 0x2C, 0x01]);
        assert_eq!(SetNumericEffecterValue::unpack_from_slice(&packed), Ok(req));
    }

    #[test]
    fn get_numeric_effecter_value_response_round_trip() {
        let resp = GetNumericEffecterValueResponse {
            completion_code: CompletionCode::Success,
            oper_state: EffecterOperState::EnabledNoUpdatePending,
            pending_value: EffecterValue::U16(300),
            present_value: EffecterValue::U16(250),
        };

        let packed = {
            let mut buf = [0u8; 16];
            resp.pack_to_slice(&mut buf).unwrap().to_vec()
        };

        assert_eq!(
            GetNumericEffecterValueResponse::unpack_from_slice(&packed),
            Ok(resp)
        );
    }

    #[test]
    fn platform_event_message_round_trip() {
        let req = PlatformEventMessage {
            format_version: 1,
            tid: 2,
            event_class: EventClass::PdrRepositoryChg,
            event_data: vec![0xAA, 0xBB],
        };

        let mut buf = [0u8; 16];

        let packed = req.pack_to_slice(&mut buf).unwrap().to_vec();

        assert_eq!(PlatformEventMessage::unpack_from_slice(&packed), Ok(req));
    }

    #[test]
    fn state_sensor_readings_response_round_trip() {
        let mut fields = heapless::Vec::new();
        fields
            .push(SensorStateField {
                sensor_op_state: 0,
                present_state: 2,
                previous_state: 1,
                event_state: 2,
            })
            .unwrap();

        let resp = GetStateSensorReadingsResponse {
            completion_code: CompletionCode::Success,
            fields,
        };

        let mut buf = [0u8; 16];

        let packed = resp.pack_to_slice(&mut buf).unwrap().to_vec();

        assert_eq!(
            GetStateSensorReadingsResponse::unpack_from_slice(&packed),
            Ok(resp)
        );
    }

    #[test]
    fn response_header_for_request() {
        let req_header = MsgHeader::request(3, PldmType::Platform, GET_PDR);

        assert_eq!(MsgHeader::response_to(&req_header).pack(), [0x03, 0x02, 0x51]);
    }
}

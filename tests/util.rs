//! A scripted host terminus used to replay request/response exchanges
//! through the real engine, without an MCTP socket.

// Each replay test uses its own subset of this harness.
#![allow(dead_code)]

use pldm::codec::base::{GetPldmVersionResponse, TransferFlag, Ver32};
use pldm::codec::fru::{GetFruRecordTableMetadataResponse, GetFruRecordTableResponse};
use pldm::codec::pdr::{EffecterOperState, EffecterValue, PdrHeader};
use pldm::codec::platform::{
    self, GetNumericEffecterValueResponse, GetPdr, GetPdrResponse,
    GetStateSensorReadingsResponse, PlatformEventMessageResponse, SensorStateField,
    SetNumericEffecterValue,
};
use pldm::codec::{self, base, fru, CompletionCode, Msg, MsgHeader, MsgKind, PldmType};
use pldm::error::Error;
use pldm::mctp::MctpTransport;
use pldm::Eid;
use pldm_wire::PldmWireRead;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// Numeric effecter state held by the simulated host.
pub struct SimNumericEffecter {
    pub oper_state: EffecterOperState,
    pub pending: EffecterValue,
    pub present: EffecterValue,
}

/// The simulated host terminus.
#[derive(Default)]
pub struct HostSim {
    /// Complete PDR records, handles already in their headers, in
    /// repository order.
    pub records: RefCell<Vec<Vec<u8>>>,
    /// Readings served for `GetStateSensorReadings`.
    pub sensor_readings: RefCell<HashMap<u16, Vec<SensorStateField>>>,
    /// Numeric effecters served for get/set value.
    pub numeric_effecters: RefCell<HashMap<u16, SimNumericEffecter>>,
    /// FRU record table bytes.
    pub fru_table: RefCell<Vec<u8>>,
    /// Datagrams queued towards the BMC.
    pub inbox: RefCell<VecDeque<(Eid, Vec<u8>)>>,
    /// Every request the BMC sent, in order.
    pub sent: RefCell<Vec<Vec<u8>>>,
    /// When set, `GetPDR` answers with this completion code.
    pub fail_get_pdr: RefCell<Option<CompletionCode>>,
}

impl HostSim {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an unsolicited request towards the BMC.
    pub fn inject(&self, eid: Eid, msg: Vec<u8>) {
        self.inbox.borrow_mut().push_back((eid, msg));
    }

    /// Count of sent requests with the given type and command.
    pub fn sent_count(&self, pldm_type: PldmType, command: u8) -> usize {
        self.sent
            .borrow()
            .iter()
            .filter(|raw| {
                Msg::parse(raw)
                    .map(|m| {
                        m.header.pldm_type == u8::from(pldm_type) && m.header.command == command
                    })
                    .unwrap_or(false)
            })
            .count()
    }

    fn respond(&self, header: &MsgHeader, payload: &[u8]) -> Option<Vec<u8>> {
        let req_header = MsgHeader {
            kind: MsgKind::Request,
            ..*header
        };

        match (PldmType::try_from(header.pldm_type).ok()?, header.command) {
            (PldmType::Base, base::GET_PLDM_VERSION) => Some(codec::response(
                &req_header,
                &GetPldmVersionResponse {
                    completion_code: CompletionCode::Success,
                    next_transfer_handle: 0,
                    transfer_flag: TransferFlag::StartAndEnd,
                    version: Ver32::BASE_1_0,
                },
            )),
            (PldmType::Platform, platform::GET_PDR) => {
                if let Some(cc) = *self.fail_get_pdr.borrow() {
                    return Some(codec::response(&req_header, &GetPdrResponse::error(cc)));
                }

                let req = GetPdr::unpack_from_slice(payload).ok()?;
                let records = self.records.borrow();

                let index = if req.record_handle == 0 {
                    0
                } else {
                    records.iter().position(|record| {
                        PdrHeader::unpack_from_slice(record)
                            .map(|h| h.record_handle == req.record_handle)
                            .unwrap_or(false)
                    })?
                };

                let record = records.get(index)?;

                let next = records
                    .get(index + 1)
                    .and_then(|r| PdrHeader::unpack_from_slice(r).ok())
                    .map(|h| h.record_handle)
                    .unwrap_or(0);

                Some(codec::response(
                    &req_header,
                    &GetPdrResponse::single_part(next, record.clone()),
                ))
            }
            (PldmType::Platform, platform::GET_STATE_SENSOR_READINGS) => {
                let req =
                    platform::GetStateSensorReadings::unpack_from_slice(payload).ok()?;

                let readings = self.sensor_readings.borrow();
                let fields_src = readings.get(&req.sensor_id)?;

                let mut fields = heapless::Vec::new();
                for field in fields_src {
                    fields.push(*field).ok()?;
                }

                Some(codec::response(
                    &req_header,
                    &GetStateSensorReadingsResponse {
                        completion_code: CompletionCode::Success,
                        fields,
                    },
                ))
            }
            (PldmType::Platform, platform::SET_STATE_EFFECTER_STATES) => {
                Some(codec::cc_only_response(&req_header, CompletionCode::Success))
            }
            (PldmType::Platform, platform::SET_NUMERIC_EFFECTER_VALUE) => {
                let req = SetNumericEffecterValue::unpack_from_slice(payload).ok()?;

                let mut effecters = self.numeric_effecters.borrow_mut();
                let effecter = effecters.get_mut(&req.effecter_id)?;

                effecter.pending = req.value;
                effecter.present = req.value;
                effecter.oper_state = EffecterOperState::EnabledNoUpdatePending;

                Some(codec::cc_only_response(&req_header, CompletionCode::Success))
            }
            (PldmType::Platform, platform::SET_NUMERIC_EFFECTER_ENABLE) => {
                let req =
                    platform::SetNumericEffecterEnable::unpack_from_slice(payload).ok()?;

                let mut effecters = self.numeric_effecters.borrow_mut();
                let effecter = effecters.get_mut(&req.effecter_id)?;

                effecter.oper_state = req.oper_state;

                Some(codec::cc_only_response(&req_header, CompletionCode::Success))
            }
            (PldmType::Platform, platform::GET_NUMERIC_EFFECTER_VALUE) => {
                let req =
                    platform::GetNumericEffecterValue::unpack_from_slice(payload).ok()?;

                let effecters = self.numeric_effecters.borrow();
                let effecter = effecters.get(&req.effecter_id)?;

                Some(codec::response(
                    &req_header,
                    &GetNumericEffecterValueResponse {
                        completion_code: CompletionCode::Success,
                        oper_state: effecter.oper_state,
                        pending_value: effecter.pending,
                        present_value: effecter.present,
                    },
                ))
            }
            (PldmType::Platform, platform::PLATFORM_EVENT_MESSAGE) => Some(codec::response(
                &req_header,
                &PlatformEventMessageResponse {
                    completion_code: CompletionCode::Success,
                    platform_event_status: 0,
                },
            )),
            (PldmType::Fru, fru::GET_FRU_RECORD_TABLE_METADATA) => {
                let table = self.fru_table.borrow();

                Some(codec::response(
                    &req_header,
                    &GetFruRecordTableMetadataResponse {
                        completion_code: CompletionCode::Success,
                        major_version: 1,
                        minor_version: 0,
                        maximum_size: u32::MAX,
                        table_length: table.len() as u32,
                        total_record_set_identifiers: 0,
                        total_table_records: 0,
                        checksum: 0,
                    },
                ))
            }
            (PldmType::Fru, fru::GET_FRU_RECORD_TABLE) => Some(codec::response(
                &req_header,
                &GetFruRecordTableResponse {
                    completion_code: CompletionCode::Success,
                    next_data_transfer_handle: 0,
                    transfer_flag: TransferFlag::StartAndEnd,
                    table_data: self.fru_table.borrow().clone(),
                },
            )),
            _ => None,
        }
    }
}

impl MctpTransport for HostSim {
    async fn send(&self, eid: Eid, msg: &[u8]) -> Result<usize, Error> {
        self.sent.borrow_mut().push(msg.to_vec());

        let parsed = Msg::parse(msg).map_err(Error::from)?;

        if parsed.header.kind.is_request() {
            if let Some(resp) = self.respond(&parsed.header, parsed.payload) {
                self.inbox.borrow_mut().push_back((eid, resp));
            }
        }

        Ok(msg.len())
    }

    async fn recv(&self) -> Result<(Eid, Vec<u8>), Error> {
        loop {
            if let Some(item) = self.inbox.borrow_mut().pop_front() {
                return Ok(item);
            }

            futures_lite::future::yield_now().await;
        }
    }
}

/// Drive `executor` until `done` returns true, with a bound so a broken
/// exchange fails the test instead of hanging it.
pub async fn wait_until(done: impl Fn() -> bool) {
    for _ in 0..100_000 {
        if done() {
            return;
        }

        futures_lite::future::yield_now().await;
    }

    panic!("condition not reached while replaying exchange");
}

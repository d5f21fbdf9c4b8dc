//! The responder: inbound request dispatch.
//!
//! Routes `(type, command)` to a handler over the repository, the local
//! effecter registry and the event manager. Unknown types bounce with
//! `ERROR_INVALID_PLDM_TYPE`; unknown commands within a known type with
//! `ERROR_UNSUPPORTED_PLDM_CMD`.

mod base;
mod fru;
mod platform;

use crate::codec::{cc_only_response, CompletionCode, Msg, PldmType};
use crate::effecter::EffecterRegistry;
use crate::events::EventManager;
use crate::pdr::PdrRepo;
use crate::{Eid, Tid};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// The responder state shared by all handlers.
pub struct Responder {
    /// Our terminus id; writable by the host through `SetTID`.
    tid: Cell<Tid>,
    repo: Rc<RefCell<PdrRepo>>,
    registry: Rc<RefCell<EffecterRegistry>>,
    events: Rc<EventManager>,
    /// The BMC's FRU record table, served verbatim.
    fru_table: RefCell<Vec<u8>>,
}

impl Responder {
    /// A responder answering as terminus `tid`.
    pub fn new(
        tid: Tid,
        repo: Rc<RefCell<PdrRepo>>,
        registry: Rc<RefCell<EffecterRegistry>>,
        events: Rc<EventManager>,
    ) -> Rc<Self> {
        Rc::new(Self {
            tid: Cell::new(tid),
            repo,
            registry,
            events,
            fru_table: RefCell::new(Vec::new()),
        })
    }

    /// The terminus id currently assigned to us.
    pub fn tid(&self) -> Tid {
        self.tid.get()
    }

    /// Replace the served FRU record table.
    pub fn set_fru_table(&self, table: Vec<u8>) {
        *self.fru_table.borrow_mut() = table;
    }

    /// Serve the effecter PDR query surface: the raw state effecter PDR for
    /// `(terminus, entity, state set)`.
    pub fn find_state_effecter_pdr(
        &self,
        terminus_handle: Option<u16>,
        entity: crate::pdr::Entity,
        state_set_id: u16,
    ) -> Option<Vec<u8>> {
        self.repo
            .borrow()
            .find_state_effecter_pdr(terminus_handle, entity, state_set_id)
            .map(|record| record.to_vec())
    }

    /// Handle one inbound request, producing the encoded response message.
    pub fn handle(&self, eid: Eid, msg: Msg<'_>) -> Option<Vec<u8>> {
        debug_assert!(msg.header.kind.is_request());

        let response = match PldmType::try_from(msg.header.pldm_type) {
            Ok(PldmType::Base) => base::handle(self, &msg),
            Ok(PldmType::Platform) => platform::handle(self, eid, &msg),
            Ok(PldmType::Fru) => fru::handle(self, &msg),
            Ok(_) => {
                log::debug!(
                    "unimplemented PLDM type {:#04x} from eid {}",
                    msg.header.pldm_type,
                    eid
                );

                cc_only_response(&msg.header, CompletionCode::InvalidPldmType)
            }
            Err(_) => {
                log::debug!(
                    "unknown PLDM type {:#04x} from eid {}",
                    msg.header.pldm_type,
                    eid
                );

                cc_only_response(&msg.header, CompletionCode::InvalidPldmType)
            }
        };

        Some(response)
    }
}

fn unsupported(msg: &Msg<'_>) -> Vec<u8> {
    log::debug!(
        "unsupported command {:#04x} for type {:#04x}",
        msg.header.command,
        msg.header.pldm_type
    );

    cc_only_response(&msg.header, CompletionCode::UnsupportedCmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::codec::base::GetTid;
    use crate::codec::{self, MsgKind};
    use crate::events::StateSensorHandler;
    use crate::host::SensorMap;
    use pretty_assertions::assert_eq;

    pub(crate) fn sample_responder() -> Rc<Responder> {
        let bus = Rc::new(LocalBus::new());
        let sensor_map = Rc::new(RefCell::new(SensorMap::new()));
        let events = Rc::new(EventManager::new(
            bus,
            sensor_map,
            Rc::new(StateSensorHandler::default()),
        ));

        Responder::new(
            1,
            Rc::new(RefCell::new(PdrRepo::new())),
            Rc::new(RefCell::new(EffecterRegistry::new())),
            events,
        )
    }

    #[test]
    fn unknown_type_bounces() {
        let responder = sample_responder();

        // type 63 (OEM) parses but is not implemented
        let req = vec![0x85, 0x3F, 0x01];
        let msg = Msg::parse(&req).unwrap();

        let resp = responder.handle(9, msg).unwrap();

        assert_eq!(resp, vec![0x05, 0x3F, 0x01, 0x20]);
    }

    #[test]
    fn unknown_command_bounces() {
        let responder = sample_responder();

        // base type, command 0x7F
        let req = vec![0x85, 0x00, 0x7F];
        let msg = Msg::parse(&req).unwrap();

        let resp = responder.handle(9, msg).unwrap();

        assert_eq!(resp, vec![0x05, 0x00, 0x7F, 0x05]);
    }

    #[test]
    fn get_tid_answers() {
        let responder = sample_responder();

        let req = codec::request(2, &GetTid);
        let msg = Msg::parse(&req).unwrap();

        let resp = responder.handle(9, msg).unwrap();
        let parsed = Msg::parse(&resp).unwrap();

        assert_eq!(parsed.header.kind, MsgKind::Response);
        assert_eq!(parsed.payload, &[0x00, 0x01]);
    }
}

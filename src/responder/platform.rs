//! Platform (type 2) command handlers.

use super::Responder;
use crate::codec::platform::{
    self, GetNumericEffecterValueResponse, GetPdr, GetPdrRepositoryInfoResponse, GetPdrResponse,
    GetStateSensorReadings, GetStateSensorReadingsResponse, GetNumericEffecterValue,
    PlatformEventMessage, PlatformEventMessageResponse, SetNumericEffecterEnable,
    SetNumericEffecterValue, SetStateEffecterStates,
};
use crate::codec::{self, CompletionCode, Msg};
use crate::Eid;
use pldm_wire::PldmWireRead;

pub(super) fn handle(responder: &Responder, eid: Eid, msg: &Msg<'_>) -> Vec<u8> {
    match msg.header.command {
        platform::GET_PDR => get_pdr(responder, msg),
        platform::GET_PDR_REPOSITORY_INFO => repository_info(responder, msg),
        platform::SET_STATE_EFFECTER_STATES => set_state_effecter(responder, msg),
        platform::GET_STATE_SENSOR_READINGS => state_sensor_readings(responder, msg),
        platform::SET_NUMERIC_EFFECTER_VALUE => set_numeric_value(responder, msg),
        platform::GET_NUMERIC_EFFECTER_VALUE => get_numeric_value(responder, msg),
        platform::SET_NUMERIC_EFFECTER_ENABLE => set_numeric_enable(responder, msg),
        platform::PLATFORM_EVENT_MESSAGE => platform_event(responder, eid, msg),
        platform::SET_EVENT_RECEIVER => set_event_receiver(msg),
        _ => super::unsupported(msg),
    }
}

fn get_pdr(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    let Ok(req) = GetPdr::unpack_from_slice(msg.payload) else {
        return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
    };

    let repo = responder.repo.borrow();

    match repo.find(req.record_handle) {
        Some(found) => codec::response(
            &msg.header,
            &GetPdrResponse::single_part(found.next_handle, found.data.to_vec()),
        ),
        None => codec::response(
            &msg.header,
            &GetPdrResponse::error(CompletionCode::InvalidData),
        ),
    }
}

fn repository_info(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    let info = responder.repo.borrow().info();

    codec::response(
        &msg.header,
        &GetPdrRepositoryInfoResponse {
            completion_code: CompletionCode::Success,
            repository_state: 0,
            // update times are carried but never populated
            update_time: [0; 13],
            oem_update_time: [0; 13],
            record_count: info.record_count,
            repository_size: info.repository_size,
            largest_record_size: info.largest_record_size,
            data_transfer_handle_timeout: 0,
        },
    )
}

fn set_state_effecter(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    let Ok(req) = SetStateEffecterStates::unpack_from_slice(msg.payload) else {
        return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
    };

    let cc = responder
        .registry
        .borrow_mut()
        .set_states(req.effecter_id, &req.fields);

    codec::cc_only_response(&msg.header, cc)
}

fn state_sensor_readings(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    let Ok(req) = GetStateSensorReadings::unpack_from_slice(msg.payload) else {
        return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
    };

    let registry = responder.registry.borrow();

    match registry.sensor_readings(req.sensor_id) {
        Some(readings) => {
            let mut fields = heapless::Vec::new();

            for field in readings {
                if fields.push(*field).is_err() {
                    return codec::cc_only_response(&msg.header, CompletionCode::Error);
                }
            }

            codec::response(
                &msg.header,
                &GetStateSensorReadingsResponse {
                    completion_code: CompletionCode::Success,
                    fields,
                },
            )
        }
        None => codec::cc_only_response(&msg.header, CompletionCode::InvalidData),
    }
}

fn set_numeric_value(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    let Ok(req) = SetNumericEffecterValue::unpack_from_slice(msg.payload) else {
        return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
    };

    let cc = responder
        .registry
        .borrow_mut()
        .set_numeric_value(req.effecter_id, req.value);

    codec::cc_only_response(&msg.header, cc)
}

fn get_numeric_value(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    let Ok(req) = GetNumericEffecterValue::unpack_from_slice(msg.payload) else {
        return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
    };

    let registry = responder.registry.borrow();

    match registry.numeric_value(req.effecter_id) {
        Some(entry) => codec::response(
            &msg.header,
            &GetNumericEffecterValueResponse {
                completion_code: CompletionCode::Success,
                oper_state: entry.oper_state,
                pending_value: entry.pending,
                present_value: entry.present,
            },
        ),
        None => codec::cc_only_response(&msg.header, CompletionCode::InvalidData),
    }
}

fn set_numeric_enable(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    let Ok(req) = SetNumericEffecterEnable::unpack_from_slice(msg.payload) else {
        return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
    };

    let cc = responder
        .registry
        .borrow_mut()
        .set_numeric_enable(req.effecter_id, req.oper_state);

    codec::cc_only_response(&msg.header, cc)
}

fn platform_event(responder: &Responder, eid: Eid, msg: &Msg<'_>) -> Vec<u8> {
    let Ok(event) = PlatformEventMessage::unpack_from_slice(msg.payload) else {
        return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
    };

    if event.format_version != PlatformEventMessage::FORMAT_VERSION {
        return codec::cc_only_response(&msg.header, CompletionCode::InvalidData);
    }

    log::debug!(
        "platform event class {:?} from tid {} via eid {}",
        event.event_class,
        event.tid,
        eid
    );

    // The ack goes out first by construction: the handler only queues
    // deferred work (the repository change fetch kick).
    responder.events.handle(&event);

    codec::response(
        &msg.header,
        &PlatformEventMessageResponse {
            completion_code: CompletionCode::Success,
            platform_event_status: 0,
        },
    )
}

fn set_event_receiver(msg: &Msg<'_>) -> Vec<u8> {
    let Ok(req) = crate::codec::platform::SetEventReceiver::unpack_from_slice(msg.payload) else {
        return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
    };

    log::info!(
        "event receiver set: enable {} address {}",
        req.event_message_global_enable,
        req.event_receiver_address_info
    );

    codec::cc_only_response(&msg.header, CompletionCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pdr::{PdrHeader, PdrType};
    use crate::responder::tests::sample_responder;
    use pldm_wire::PldmWireWrite;
    use pretty_assertions::assert_eq;

    fn blob(len: usize, ty: PdrType) -> Vec<u8> {
        let mut data = vec![0u8; len];

        PdrHeader::new(ty, (len - crate::codec::pdr::PDR_HEADER_LEN) as u16)
            .pack_to_slice_unchecked(&mut data);

        data
    }

    #[test]
    fn get_pdr_serves_record_chain() {
        let responder = sample_responder();

        responder
            .repo
            .borrow_mut()
            .add(blob(14, PdrType::Other(0x70)), false, 1, 0)
            .unwrap();
        responder
            .repo
            .borrow_mut()
            .add(blob(16, PdrType::Other(0x70)), false, 1, 0)
            .unwrap();

        let req = codec::request(1, &GetPdr::first_part(0));
        let resp = responder.handle(9, Msg::parse(&req).unwrap()).unwrap();

        let parsed = codec::decode_response::<GetPdr>(&resp).unwrap();

        assert_eq!(parsed.completion_code, CompletionCode::Success);
        assert_eq!(parsed.next_record_handle, 2);
        assert_eq!(parsed.record_data.len(), 14);

        let req = codec::request(1, &GetPdr::first_part(2));
        let resp = responder.handle(9, Msg::parse(&req).unwrap()).unwrap();

        let parsed = codec::decode_response::<GetPdr>(&resp).unwrap();

        assert_eq!(parsed.next_record_handle, 0);
        assert_eq!(parsed.record_data.len(), 16);
    }

    #[test]
    fn get_pdr_unknown_handle() {
        let responder = sample_responder();

        let req = codec::request(1, &GetPdr::first_part(77));
        let resp = responder.handle(9, Msg::parse(&req).unwrap()).unwrap();

        let parsed = codec::decode_response::<GetPdr>(&resp).unwrap();

        assert_eq!(parsed.completion_code, CompletionCode::InvalidData);
    }

    #[test]
    fn repository_info_counts() {
        let responder = sample_responder();

        responder
            .repo
            .borrow_mut()
            .add(blob(14, PdrType::Other(0x70)), false, 1, 0)
            .unwrap();

        let req = codec::request(1, &crate::codec::platform::GetPdrRepositoryInfo);
        let resp = responder.handle(9, Msg::parse(&req).unwrap()).unwrap();

        let parsed =
            codec::decode_response::<crate::codec::platform::GetPdrRepositoryInfo>(&resp).unwrap();

        assert_eq!(parsed.record_count, 1);
        assert_eq!(parsed.repository_size, 14);
        assert_eq!(parsed.largest_record_size, 14);
        assert_eq!(parsed.update_time, [0u8; 13]);
    }
}

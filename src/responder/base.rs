//! Base (type 0) command handlers.

use super::Responder;
use crate::codec::base::{
    self, GetPldmCommands, GetPldmCommandsResponse, GetPldmTypesResponse, GetPldmVersion,
    GetPldmVersionResponse, GetTidResponse, TransferFlag, Ver32,
};
use crate::codec::{self, fru, platform, CompletionCode, Msg, PldmType};
use pldm_wire::PldmWireRead;

fn set_bit(bits: &mut [u8], n: u8) {
    bits[usize::from(n / 8)] |= 1 << (n % 8);
}

fn implemented_types() -> [u8; 8] {
    let mut types = [0u8; 8];

    for ty in [PldmType::Base, PldmType::Platform, PldmType::Fru] {
        set_bit(&mut types, ty.into());
    }

    types
}

fn implemented_commands(pldm_type: u8) -> Option<[u8; 32]> {
    let mut commands = [0u8; 32];

    match PldmType::try_from(pldm_type) {
        Ok(PldmType::Base) => {
            for cmd in [
                base::SET_TID,
                base::GET_TID,
                base::GET_PLDM_VERSION,
                base::GET_PLDM_TYPES,
                base::GET_PLDM_COMMANDS,
            ] {
                set_bit(&mut commands, cmd);
            }
        }
        Ok(PldmType::Platform) => {
            for cmd in [
                platform::SET_EVENT_RECEIVER,
                platform::PLATFORM_EVENT_MESSAGE,
                platform::GET_STATE_SENSOR_READINGS,
                platform::SET_NUMERIC_EFFECTER_ENABLE,
                platform::SET_NUMERIC_EFFECTER_VALUE,
                platform::GET_NUMERIC_EFFECTER_VALUE,
                platform::SET_STATE_EFFECTER_STATES,
                platform::GET_PDR_REPOSITORY_INFO,
                platform::GET_PDR,
            ] {
                set_bit(&mut commands, cmd);
            }
        }
        Ok(PldmType::Fru) => {
            for cmd in [fru::GET_FRU_RECORD_TABLE_METADATA, fru::GET_FRU_RECORD_TABLE] {
                set_bit(&mut commands, cmd);
            }
        }
        _ => return None,
    }

    Some(commands)
}

fn version_of(pldm_type: u8) -> Option<Ver32> {
    match PldmType::try_from(pldm_type) {
        Ok(PldmType::Base) => Some(Ver32::BASE_1_0),
        // platform 1.2.0, fru 1.0.0, BCD encoded
        Ok(PldmType::Platform) => Some(Ver32 {
            major: 0xF1,
            minor: 0xF2,
            update: 0xF0,
            alpha: 0x00,
        }),
        Ok(PldmType::Fru) => Some(Ver32::BASE_1_0),
        _ => None,
    }
}

pub(super) fn handle(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    match msg.header.command {
        base::GET_TID => codec::response(
            &msg.header,
            &GetTidResponse {
                completion_code: CompletionCode::Success,
                tid: responder.tid(),
            },
        ),
        base::SET_TID => {
            let Ok(req) = crate::codec::base::SetTid::unpack_from_slice(msg.payload) else {
                return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
            };

            responder.tid.set(req.tid);

            codec::cc_only_response(&msg.header, CompletionCode::Success)
        }
        base::GET_PLDM_TYPES => codec::response(
            &msg.header,
            &GetPldmTypesResponse {
                completion_code: CompletionCode::Success,
                types: implemented_types(),
            },
        ),
        base::GET_PLDM_COMMANDS => {
            let Ok(req) = GetPldmCommands::unpack_from_slice(msg.payload) else {
                return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
            };

            match implemented_commands(req.pldm_type) {
                Some(commands) => codec::response(
                    &msg.header,
                    &GetPldmCommandsResponse {
                        completion_code: CompletionCode::Success,
                        commands,
                    },
                ),
                None => codec::cc_only_response(&msg.header, CompletionCode::InvalidPldmType),
            }
        }
        base::GET_PLDM_VERSION => {
            let Ok(req) = GetPldmVersion::unpack_from_slice(msg.payload) else {
                return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
            };

            match version_of(req.pldm_type) {
                Some(version) => codec::response(
                    &msg.header,
                    &GetPldmVersionResponse {
                        completion_code: CompletionCode::Success,
                        next_transfer_handle: 0,
                        transfer_flag: TransferFlag::StartAndEnd,
                        version,
                    },
                ),
                None => codec::cc_only_response(&msg.header, CompletionCode::InvalidPldmType),
            }
        }
        _ => super::unsupported(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::base::GetPldmTypes;
    use crate::responder::tests::sample_responder;
    use pretty_assertions::assert_eq;

    #[test]
    fn implemented_types_bitfield() {
        let responder = sample_responder();

        let req = codec::request(0, &GetPldmTypes);
        let resp = responder.handle(9, Msg::parse(&req).unwrap()).unwrap();

        let parsed: GetPldmTypesResponse =
            codec::decode_response::<GetPldmTypes>(&resp).unwrap();

        assert!(parsed.supports(PldmType::Base));
        assert!(parsed.supports(PldmType::Platform));
        assert!(parsed.supports(PldmType::Fru));
        assert!(!parsed.supports(PldmType::FwUpdate));
    }

    #[test]
    fn set_tid_takes_effect() {
        let responder = sample_responder();

        let req = codec::request(0, &crate::codec::base::SetTid { tid: 7 });
        let resp = responder.handle(9, Msg::parse(&req).unwrap()).unwrap();

        assert_eq!(resp[3], u8::from(CompletionCode::Success));
        assert_eq!(responder.tid(), 7);
    }

    #[test]
    fn version_for_unknown_type_is_rejected() {
        let responder = sample_responder();

        let req = codec::request(
            0,
            &GetPldmVersion {
                transfer_handle: 0,
                op_flag: crate::codec::base::TransferOpFlag::GetFirstPart,
                pldm_type: 9,
            },
        );

        let resp = responder.handle(9, Msg::parse(&req).unwrap()).unwrap();

        assert_eq!(resp[3], u8::from(CompletionCode::InvalidPldmType));
    }
}

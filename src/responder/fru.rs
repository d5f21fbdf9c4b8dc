//! FRU (type 4) command handlers.

use super::Responder;
use crate::codec::base::TransferFlag;
use crate::codec::fru::{
    self, GetFruRecordTable, GetFruRecordTableMetadataResponse, GetFruRecordTableResponse,
};
use crate::codec::{self, CompletionCode, Msg};
use crc::{Crc, CRC_32_ISO_HDLC};
use pldm_wire::PldmWireRead;

const TABLE_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub(super) fn handle(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    match msg.header.command {
        fru::GET_FRU_RECORD_TABLE_METADATA => metadata(responder, msg),
        fru::GET_FRU_RECORD_TABLE => table(responder, msg),
        _ => super::unsupported(msg),
    }
}

fn metadata(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    let table = responder.fru_table.borrow();

    let record_sets = match fru::parse_fru_record_table(&table) {
        Ok(records) => records,
        Err(_) => Vec::new(),
    };

    let mut set_ids: Vec<u16> = record_sets.iter().map(|r| r.record_set_id).collect();
    set_ids.sort_unstable();
    set_ids.dedup();

    codec::response(
        &msg.header,
        &GetFruRecordTableMetadataResponse {
            completion_code: CompletionCode::Success,
            major_version: 1,
            minor_version: 0,
            maximum_size: u32::MAX,
            table_length: table.len() as u32,
            total_record_set_identifiers: set_ids.len() as u16,
            total_table_records: record_sets.len() as u16,
            checksum: TABLE_CRC.checksum(&table),
        },
    )
}

fn table(responder: &Responder, msg: &Msg<'_>) -> Vec<u8> {
    let Ok(_req) = GetFruRecordTable::unpack_from_slice(msg.payload) else {
        return codec::cc_only_response(&msg.header, CompletionCode::InvalidLength);
    };

    let table = responder.fru_table.borrow();

    if table.is_empty() {
        return codec::cc_only_response(&msg.header, CompletionCode::NotReady);
    }

    codec::response(
        &msg.header,
        &GetFruRecordTableResponse {
            completion_code: CompletionCode::Success,
            next_data_transfer_handle: 0,
            transfer_flag: TransferFlag::StartAndEnd,
            table_data: table.clone(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::fru::{
        build_fru_record_table, FruField, FruRecord, GetFruRecordTableMetadata,
        FRU_FIELD_TYPE_NAME, FRU_RECORD_TYPE_GENERAL,
    };
    use crate::responder::tests::sample_responder;
    use pretty_assertions::assert_eq;

    #[test]
    fn metadata_reflects_table() {
        let responder = sample_responder();

        let table = build_fru_record_table(&[FruRecord {
            record_set_id: 1,
            record_type: FRU_RECORD_TYPE_GENERAL,
            encoding: 1,
            fields: vec![FruField {
                field_type: FRU_FIELD_TYPE_NAME,
                value: b"motherboard".to_vec(),
            }],
        }]);

        responder.set_fru_table(table.clone());

        let req = codec::request(1, &GetFruRecordTableMetadata);
        let resp = responder.handle(9, Msg::parse(&req).unwrap()).unwrap();

        let parsed = codec::decode_response::<GetFruRecordTableMetadata>(&resp).unwrap();

        assert_eq!(parsed.completion_code, CompletionCode::Success);
        assert_eq!(parsed.table_length, table.len() as u32);
        assert_eq!(parsed.total_record_set_identifiers, 1);
        assert_eq!(parsed.total_table_records, 1);
        assert_eq!(parsed.checksum, TABLE_CRC.checksum(&table));
    }

    #[test]
    fn empty_table_is_not_ready() {
        let responder = sample_responder();

        let req = codec::request(1, &GetFruRecordTable::first_part());
        let resp = responder.handle(9, Msg::parse(&req).unwrap()).unwrap();

        assert_eq!(resp[3], u8::from(CompletionCode::NotReady));
    }
}

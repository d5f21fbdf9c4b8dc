//! FRU data commands (PLDM type 4, DSP0257).

use super::base::{TransferFlag, TransferOpFlag};
use super::{CompletionCode, PldmType, Reader, Request};
use pldm_wire::{PldmWireRead, PldmWireWrite, WireError};

/// `GetFRURecordTableMetadata` command number.
pub const GET_FRU_RECORD_TABLE_METADATA: u8 = 0x01;
/// `GetFRURecordTable` command number.
pub const GET_FRU_RECORD_TABLE: u8 = 0x02;

/// General FRU record type.
pub const FRU_RECORD_TYPE_GENERAL: u8 = 0x01;
/// OEM FRU record type.
pub const FRU_RECORD_TYPE_OEM: u8 = 0xFE;

/// OEM FRU field type carrying a location code.
pub const FRU_FIELD_TYPE_LOCATION_CODE: u8 = 0x02;

/// General FRU field type carrying a name.
pub const FRU_FIELD_TYPE_NAME: u8 = 0x08;

/// `GetFRURecordTableMetadata` request. Empty payload.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GetFruRecordTableMetadata;

impl PldmWireWrite for GetFruRecordTableMetadata {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        &buf[0..0]
    }

    fn packed_len(&self) -> usize {
        0
    }
}

impl Request for GetFruRecordTableMetadata {
    const PLDM_TYPE: PldmType = PldmType::Fru;
    const COMMAND: u8 = GET_FRU_RECORD_TABLE_METADATA;

    type Response = GetFruRecordTableMetadataResponse;
}

/// `GetFRURecordTableMetadata` response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetFruRecordTableMetadataResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// FRU data format major version.
    pub major_version: u8,
    /// FRU data format minor version.
    pub minor_version: u8,
    /// Largest table the responder can hold.
    pub maximum_size: u32,
    /// Current table length in bytes.
    pub table_length: u32,
    /// Number of distinct record set identifiers.
    pub total_record_set_identifiers: u16,
    /// Number of records in the table.
    pub total_table_records: u16,
    /// CRC-32 over the table.
    pub checksum: u32,
}

impl PldmWireRead for GetFruRecordTableMetadataResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        if !completion_code.is_success() {
            return Ok(Self {
                completion_code,
                major_version: 0,
                minor_version: 0,
                maximum_size: 0,
                table_length: 0,
                total_record_set_identifiers: 0,
                total_table_records: 0,
                checksum: 0,
            });
        }

        Ok(Self {
            completion_code,
            major_version: reader.take::<u8>()?,
            minor_version: reader.take::<u8>()?,
            maximum_size: reader.take::<u32>()?,
            table_length: reader.take::<u32>()?,
            total_record_set_identifiers: reader.take::<u16>()?,
            total_table_records: reader.take::<u16>()?,
            checksum: reader.take::<u32>()?,
        })
    }
}

impl PldmWireWrite for GetFruRecordTableMetadataResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        buf[0] = self.completion_code.into();
        buf[1] = self.major_version;
        buf[2] = self.minor_version;
        self.maximum_size.pack_to_slice_unchecked(&mut buf[3..]);
        self.table_length.pack_to_slice_unchecked(&mut buf[7..]);
        self.total_record_set_identifiers
            .pack_to_slice_unchecked(&mut buf[11..]);
        self.total_table_records
            .pack_to_slice_unchecked(&mut buf[13..]);
        self.checksum.pack_to_slice_unchecked(&mut buf[15..]);

        &buf[0..19]
    }

    fn packed_len(&self) -> usize {
        19
    }
}

/// `GetFRURecordTable` request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetFruRecordTable {
    /// Multi-part continuation handle; 0 to begin.
    pub data_transfer_handle: u32,
    /// Which part to get.
    pub transfer_op_flag: TransferOpFlag,
}

impl GetFruRecordTable {
    /// Fetch the table from the beginning.
    pub fn first_part() -> Self {
        Self {
            data_transfer_handle: 0,
            transfer_op_flag: TransferOpFlag::GetFirstPart,
        }
    }
}

impl PldmWireWrite for GetFruRecordTable {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        self.data_transfer_handle.pack_to_slice_unchecked(buf);
        buf[4] = self.transfer_op_flag.into();

        &buf[0..5]
    }

    fn packed_len(&self) -> usize {
        5
    }
}

impl PldmWireRead for GetFruRecordTable {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            data_transfer_handle: reader.take::<u32>()?,
            transfer_op_flag: TransferOpFlag::try_from(reader.take::<u8>()?)
                .map_err(|_| WireError::InvalidValue)?,
        })
    }
}

impl Request for GetFruRecordTable {
    const PLDM_TYPE: PldmType = PldmType::Fru;
    const COMMAND: u8 = GET_FRU_RECORD_TABLE;

    type Response = GetFruRecordTableResponse;
}

/// `GetFRURecordTable` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFruRecordTableResponse {
    /// Completion code.
    pub completion_code: CompletionCode,
    /// Continuation handle; 0 when complete.
    pub next_data_transfer_handle: u32,
    /// Position of this part.
    pub transfer_flag: TransferFlag,
    /// Table bytes of this part.
    pub table_data: Vec<u8>,
}

impl PldmWireRead for GetFruRecordTableResponse {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let completion_code = reader.take::<CompletionCode>()?;

        if !completion_code.is_success() {
            return Ok(Self {
                completion_code,
                next_data_transfer_handle: 0,
                transfer_flag: TransferFlag::StartAndEnd,
                table_data: Vec::new(),
            });
        }

        Ok(Self {
            completion_code,
            next_data_transfer_handle: reader.take::<u32>()?,
            transfer_flag: TransferFlag::try_from(reader.take::<u8>()?)
                .map_err(|_| WireError::InvalidValue)?,
            table_data: reader.remaining().to_vec(),
        })
    }
}

impl PldmWireWrite for GetFruRecordTableResponse {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        buf[0] = self.completion_code.into();
        self.next_data_transfer_handle
            .pack_to_slice_unchecked(&mut buf[1..]);
        buf[5] = self.transfer_flag.into();
        buf[6..6 + self.table_data.len()].copy_from_slice(&self.table_data);

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        6 + self.table_data.len()
    }
}

/// One field of a FRU table record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FruField {
    /// Field type; meaning depends on the record type.
    pub field_type: u8,
    /// Field value bytes.
    pub value: Vec<u8>,
}

/// One record of a FRU record table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FruRecord {
    /// Record set this record belongs to; ties back to a FRU Record Set PDR.
    pub record_set_id: u16,
    /// General (0x01) or OEM (0xFE).
    pub record_type: u8,
    /// Field value encoding; 1 = ASCII.
    pub encoding: u8,
    /// The record's fields.
    pub fields: Vec<FruField>,
}

impl FruRecord {
    /// The location code carried by an OEM record, if any.
    pub fn location_code(&self) -> Option<String> {
        if self.record_type != FRU_RECORD_TYPE_OEM {
            return None;
        }

        self.fields
            .iter()
            .find(|f| f.field_type == FRU_FIELD_TYPE_LOCATION_CODE)
            .map(|f| String::from_utf8_lossy(&f.value).into_owned())
    }
}

/// Parse a whole FRU record table into records. Trailing pad bytes (zeros up
/// to a 4 byte boundary) are tolerated.
pub fn parse_fru_record_table(table: &[u8]) -> Result<Vec<FruRecord>, WireError> {
    let mut reader = Reader::new(table);
    let mut records = Vec::new();

    while reader.remaining_len() > 0 {
        // A record needs at least its 5 byte fixed part; anything shorter at
        // the tail is padding.
        if reader.remaining_len() < 5 {
            break;
        }

        if reader.remaining().iter().all(|b| *b == 0) {
            break;
        }

        let record_set_id = reader.take::<u16>()?;
        let record_type = reader.take::<u8>()?;
        let num_fields = usize::from(reader.take::<u8>()?);
        let encoding = reader.take::<u8>()?;

        let mut fields = Vec::with_capacity(num_fields);
        for _ in 0..num_fields {
            let field_type = reader.take::<u8>()?;
            let length = usize::from(reader.take::<u8>()?);
            let value = reader.take_bytes(length)?.to_vec();

            fields.push(FruField { field_type, value });
        }

        records.push(FruRecord {
            record_set_id,
            record_type,
            encoding,
            fields,
        });
    }

    Ok(records)
}

/// Pack records into a FRU record table, unpadded.
pub fn build_fru_record_table(records: &[FruRecord]) -> Vec<u8> {
    let mut out = Vec::new();

    for record in records {
        out.extend_from_slice(&record.record_set_id.to_le_bytes());
        out.push(record.record_type);
        out.push(record.fields.len() as u8);
        out.push(record.encoding);

        for field in &record.fields {
            out.push(field.field_type);
            out.push(field.value.len() as u8);
            out.extend_from_slice(&field.value);
        }
    }

    out
}

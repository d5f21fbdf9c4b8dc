//! The PDR repository: an ordered, handle-addressed store of records.
//!
//! A record is the exact header‖body byte sequence returned over the wire by
//! `GetPDR`. Records are immutable after insertion except for the terminus
//! locator validity byte and the container id field rewritten during remote
//! PDR merge.

use crate::codec::pdr::{
    Entity, FruRecordSetPdr, PdrHeader, PdrType, StateEffecterPdr, TerminusLocatorPdr,
    ENTITY_CONTAINER_ID_OFFSET, PDR_HEADER_LEN, TERMINUS_LOCATOR_VALIDITY_OFFSET,
};
use crate::error::RepoError;
use crate::{Eid, Tid, INVALID_EFFECTER_ID};
use pldm_wire::{PldmWireRead, PldmWireWrite};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Record {
    handle: u32,
    remote: bool,
    terminus_handle: u16,
    data: Vec<u8>,
}

/// A record returned by a lookup.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FoundRecord<'a> {
    /// The record handle.
    pub handle: u32,
    /// Header‖body bytes.
    pub data: &'a [u8],
    /// Handle of the successor record; 0 when this is the tail.
    pub next_handle: u32,
    /// Whether the record was pulled from a remote terminus.
    pub remote: bool,
    /// The terminus the record belongs to.
    pub terminus_handle: u16,
}

/// Aggregate numbers served by `GetPDRRepositoryInfo`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// Number of records.
    pub record_count: u32,
    /// Sum of record sizes in bytes.
    pub repository_size: u32,
    /// Size in bytes of the largest record.
    pub largest_record_size: u32,
}

/// The repository proper.
///
/// Iteration order is insertion order. Lookups by handle go through a side
/// index so the successor of a known record is O(1); a cold `find` is a map
/// probe plus a vector index.
#[derive(Debug, Default)]
pub struct PdrRepo {
    records: Vec<Record>,
    index: HashMap<u32, usize>,
    last_handle: u32,
    size: u32,
}

impl PdrRepo {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    ///
    /// With `requested_handle` 0 the next free handle (`last_used + 1`) is
    /// assigned and written into the record's header bytes; a non-zero
    /// requested handle is honoured as-is. Either way the repository is
    /// untouched on error.
    pub fn add(
        &mut self,
        mut data: Vec<u8>,
        remote: bool,
        terminus_handle: u16,
        requested_handle: u32,
    ) -> Result<u32, RepoError> {
        if data.is_empty() {
            return Err(RepoError::EmptyRecord);
        }

        if data.len() < PDR_HEADER_LEN {
            return Err(RepoError::MalformedRecord);
        }

        let handle = if requested_handle == 0 {
            let next = self
                .last_handle
                .checked_add(1)
                .ok_or(RepoError::HandleExhausted)?;

            // The stored bytes are what goes over the wire, so the header
            // must carry the final handle.
            data[0..4].copy_from_slice(&next.to_le_bytes());

            next
        } else {
            requested_handle
        };

        if self.index.contains_key(&handle) {
            return Err(RepoError::HandleInUse(handle));
        }

        self.index.insert(handle, self.records.len());
        self.size += data.len() as u32;
        self.last_handle = handle;
        self.records.push(Record {
            handle,
            remote,
            terminus_handle,
            data,
        });

        Ok(handle)
    }

    /// Number of records.
    pub fn count(&self) -> u32 {
        self.records.len() as u32
    }

    /// Sum of record sizes in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The most recently used record handle.
    pub fn last_handle(&self) -> u32 {
        self.last_handle
    }

    /// The highest handle strictly below `bound`; 0 when there is none.
    ///
    /// Used to continue the BMC's own handle range when remote records with
    /// reserved-range handles sit in the same repository.
    pub fn last_handle_below(&self, bound: u32) -> u32 {
        self.records
            .iter()
            .map(|r| r.handle)
            .filter(|h| *h < bound)
            .max()
            .unwrap_or(0)
    }

    /// Aggregate numbers for `GetPDRRepositoryInfo`.
    pub fn info(&self) -> RepoInfo {
        RepoInfo {
            record_count: self.count(),
            repository_size: self.size,
            largest_record_size: self
                .records
                .iter()
                .map(|r| r.data.len() as u32)
                .max()
                .unwrap_or(0),
        }
    }

    fn found(&self, pos: usize) -> FoundRecord<'_> {
        let record = &self.records[pos];

        FoundRecord {
            handle: record.handle,
            data: &record.data,
            next_handle: self
                .records
                .get(pos + 1)
                .map(|r| r.handle)
                .unwrap_or(0),
            remote: record.remote,
            terminus_handle: record.terminus_handle,
        }
    }

    /// Look up a record by handle. Handle 0 returns the first record.
    pub fn find(&self, handle: u32) -> Option<FoundRecord<'_>> {
        if handle == 0 {
            return (!self.records.is_empty()).then(|| self.found(0));
        }

        self.index.get(&handle).map(|pos| self.found(*pos))
    }

    /// The successor of the record at `handle`.
    pub fn find_next(&self, handle: u32) -> Option<FoundRecord<'_>> {
        let pos = *self.index.get(&handle)?;

        (pos + 1 < self.records.len()).then(|| self.found(pos + 1))
    }

    /// Linear scan for the next record of `pdr_type` strictly after the
    /// record at `cursor`; `None` cursor starts from the head.
    pub fn find_by_type(&self, pdr_type: PdrType, cursor: Option<u32>) -> Option<FoundRecord<'_>> {
        let start = match cursor {
            Some(handle) => *self.index.get(&handle)? + 1,
            None => 0,
        };

        self.records[start..]
            .iter()
            .position(|r| {
                PdrHeader::unpack_from_slice(&r.data)
                    .map(|h| h.pdr_type == pdr_type)
                    .unwrap_or(false)
            })
            .map(|offset| self.found(start + offset))
    }

    /// Iterate every record of `pdr_type` from the head.
    pub fn records_of_type(&self, pdr_type: PdrType) -> Vec<FoundRecord<'_>> {
        let mut out = Vec::new();
        let mut cursor = None;

        while let Some(found) = self.find_by_type(pdr_type, cursor) {
            cursor = Some(found.handle);
            out.push(found);
        }

        out
    }

    /// Whether the record at `handle` is remote.
    pub fn is_remote(&self, handle: u32) -> Option<bool> {
        self.index.get(&handle).map(|pos| self.records[*pos].remote)
    }

    /// Flag the record at `handle` as pulled from a remote terminus.
    pub fn mark_remote(&mut self, handle: u32) -> bool {
        match self.index.get(&handle) {
            Some(pos) => {
                self.records[*pos].remote = true;
                true
            }
            None => false,
        }
    }

    /// Drop every remote record, preserving the relative order of local
    /// records.
    pub fn remove_remote(&mut self) {
        self.records.retain(|r| !r.remote);
        self.reindex();
    }

    /// Drop every record belonging to `terminus_handle`.
    pub fn remove_terminus(&mut self, terminus_handle: u16) {
        self.records.retain(|r| r.terminus_handle != terminus_handle);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index.clear();
        self.size = 0;

        for (pos, record) in self.records.iter().enumerate() {
            self.index.insert(record.handle, pos);
            self.size += record.data.len() as u32;
        }
    }

    /// Overwrite the validity byte of the terminus locator PDR matching
    /// `(terminus_handle, tid, eid)`. Returns whether a record was updated.
    pub fn set_terminus_locator_validity(
        &mut self,
        terminus_handle: u16,
        tid: Tid,
        eid: Eid,
        valid: bool,
    ) -> bool {
        for record in &mut self.records {
            let header = match PdrHeader::unpack_from_slice(&record.data) {
                Ok(h) => h,
                Err(_) => continue,
            };

            if header.pdr_type != PdrType::TerminusLocator {
                continue;
            }

            let parsed = match TerminusLocatorPdr::from_record(&record.data) {
                Ok(p) => p,
                Err(_) => continue,
            };

            if parsed.terminus_handle == terminus_handle
                && parsed.tid == tid
                && parsed.eid() == Some(eid)
            {
                record.data[TERMINUS_LOCATOR_VALIDITY_OFFSET] = valid as u8;

                return true;
            }
        }

        false
    }

    /// Rewrite the container id field of an entity-bearing record body in
    /// place. The caller is responsible for only applying this to the record
    /// types that carry their entity at the common offset (state sensor,
    /// state effecter, numeric effecter, FRU record set).
    pub fn rewrite_container_id(record: &mut [u8], container_id: u16) {
        if record.len() >= ENTITY_CONTAINER_ID_OFFSET + 2 {
            record[ENTITY_CONTAINER_ID_OFFSET..ENTITY_CONTAINER_ID_OFFSET + 2]
                .copy_from_slice(&container_id.to_le_bytes());
        }
    }

    /// Append a FRU Record Set PDR.
    pub fn add_fru_record_set(
        &mut self,
        terminus_handle: u16,
        fru_rsi: u16,
        entity: Entity,
        requested_handle: u32,
    ) -> Result<u32, RepoError> {
        let record = FruRecordSetPdr {
            terminus_handle,
            fru_rsi,
            entity,
        }
        .to_record();

        self.add(record, false, terminus_handle, requested_handle)
    }

    /// Find the FRU Record Set PDR with the given record set identifier.
    pub fn find_fru_record_set_by_rsi(&self, fru_rsi: u16) -> Option<(u16, Entity)> {
        let mut cursor = None;

        while let Some(found) = self.find_by_type(PdrType::FruRecordSet, cursor) {
            cursor = Some(found.handle);

            if let Ok(parsed) = FruRecordSetPdr::from_record(found.data) {
                if parsed.fru_rsi == fru_rsi {
                    return Some((parsed.terminus_handle, parsed.entity));
                }
            }
        }

        None
    }

    /// Find the id of the state effecter controlling `entity` for the given
    /// state set, scanning local or remote records per `remote`.
    pub fn find_state_effecter_id(
        &self,
        entity: Entity,
        state_set_id: u16,
        remote: bool,
    ) -> u16 {
        let mut cursor = None;

        while let Some(found) = self.find_by_type(PdrType::StateEffecter, cursor) {
            cursor = Some(found.handle);

            if found.remote != remote {
                continue;
            }

            let parsed = match StateEffecterPdr::from_record(found.data) {
                Ok(p) => p,
                Err(_) => continue,
            };

            if parsed.entity == entity
                && parsed
                    .effecters
                    .iter()
                    .any(|states| states.state_set_id == state_set_id)
            {
                return parsed.effecter_id;
            }
        }

        INVALID_EFFECTER_ID
    }

    /// Find the raw state effecter PDR for `(terminus, entity, state set)`,
    /// serving the effecter PDR query surface.
    pub fn find_state_effecter_pdr(
        &self,
        terminus_handle: Option<u16>,
        entity: Entity,
        state_set_id: u16,
    ) -> Option<&[u8]> {
        let mut cursor = None;

        while let Some(found) = self.find_by_type(PdrType::StateEffecter, cursor) {
            cursor = Some(found.handle);

            let parsed = match StateEffecterPdr::from_record(found.data) {
                Ok(p) => p,
                Err(_) => continue,
            };

            if terminus_handle.is_some_and(|th| th != parsed.terminus_handle) {
                continue;
            }

            if parsed.entity == entity
                && parsed
                    .effecters
                    .iter()
                    .any(|states| states.state_set_id == state_set_id)
            {
                return Some(found.data);
            }
        }

        None
    }
}

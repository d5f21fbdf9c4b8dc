//! PDR record layouts, on the wire and at rest (DSP0248 §28).
//!
//! A record is the common 10-byte header followed by a type-specific body.
//! The header‖body concatenation stored in the repository is the exact byte
//! sequence returned over the wire by `GetPDR`.

use super::Reader;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use pldm_wire::{PldmWireRead, PldmWireSized, PldmWireWrite, WireError};

/// Length in bytes of the common PDR header.
pub const PDR_HEADER_LEN: usize = 10;

/// Byte offset of the `validity` field within a terminus locator PDR,
/// counted from the start of the record (header included).
pub const TERMINUS_LOCATOR_VALIDITY_OFFSET: usize = PDR_HEADER_LEN + 2;

/// Byte offset of the `container_id` field within the entity-bearing PDR
/// bodies rewritten during host merge (state sensor, state effecter, numeric
/// effecter, FRU record set), counted from the start of the record.
pub const ENTITY_CONTAINER_ID_OFFSET: usize = PDR_HEADER_LEN + 8;

/// PDR type tags.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PdrType {
    /// Terminus Locator PDR.
    TerminusLocator = 1,
    /// Numeric Sensor PDR.
    NumericSensor = 2,
    /// State Sensor PDR.
    StateSensor = 4,
    /// Numeric Effecter PDR.
    NumericEffecter = 9,
    /// State Effecter PDR.
    StateEffecter = 11,
    /// Entity Association PDR.
    EntityAssociation = 15,
    /// FRU Record Set PDR.
    FruRecordSet = 20,
    /// A type this stack does not interpret.
    #[num_enum(catch_all)]
    Other(u8),
}

/// The common PDR header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PdrHeader {
    /// Unique handle within the repository; assigned on insertion.
    pub record_handle: u32,
    /// Header version, always 1.
    pub version: u8,
    /// Record type tag.
    pub pdr_type: PdrType,
    /// Incremented when the record changes.
    pub record_change_number: u16,
    /// Body length in bytes.
    pub length: u16,
}

impl PdrHeader {
    /// Header for a new record of `pdr_type` with `length` body bytes. The
    /// handle is filled in by the repository on insertion.
    pub fn new(pdr_type: PdrType, length: u16) -> Self {
        Self {
            record_handle: 0,
            version: 1,
            pdr_type,
            record_change_number: 0,
            length,
        }
    }
}

impl PldmWireSized for PdrHeader {
    const PACKED_LEN: usize = PDR_HEADER_LEN;

    type Buffer = [u8; PDR_HEADER_LEN];

    fn buffer() -> Self::Buffer {
        [0u8; PDR_HEADER_LEN]
    }
}

impl PldmWireWrite for PdrHeader {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        self.record_handle.pack_to_slice_unchecked(buf);
        buf[4] = self.version;
        buf[5] = self.pdr_type.into();
        self.record_change_number
            .pack_to_slice_unchecked(&mut buf[6..]);
        self.length.pack_to_slice_unchecked(&mut buf[8..]);

        &buf[0..PDR_HEADER_LEN]
    }

    fn packed_len(&self) -> usize {
        PDR_HEADER_LEN
    }
}

impl PldmWireRead for PdrHeader {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            record_handle: reader.take::<u32>()?,
            version: reader.take::<u8>()?,
            pdr_type: PdrType::from(reader.take::<u8>()?),
            record_change_number: reader.take::<u16>()?,
            length: reader.take::<u16>()?,
        })
    }
}

/// A platform entity: `(type, instance, container)`.
///
/// Bit 15 of `entity_type` distinguishes logical entities from physical
/// ones.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Entity {
    /// Entity type; high bit set for logical entities.
    pub entity_type: u16,
    /// Instance number within the container.
    pub entity_instance: u16,
    /// The container this entity lives in; 0 is the system container.
    pub container_id: u16,
}

impl Entity {
    /// Bit distinguishing logical from physical entity types.
    pub const LOGICAL_BIT: u16 = 0x8000;

    /// Instance number requesting auto-assignment on tree insertion.
    pub const AUTO_INSTANCE: u16 = 0xFFFF;

    /// A new physical entity.
    pub fn new(entity_type: u16, entity_instance: u16, container_id: u16) -> Self {
        Self {
            entity_type,
            entity_instance,
            container_id,
        }
    }

    /// Whether this is a logical entity.
    pub fn is_logical(&self) -> bool {
        self.entity_type & Self::LOGICAL_BIT != 0
    }
}

impl PldmWireSized for Entity {
    const PACKED_LEN: usize = 6;

    type Buffer = [u8; 6];

    fn buffer() -> Self::Buffer {
        [0u8; 6]
    }
}

impl PldmWireWrite for Entity {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        self.entity_type.pack_to_slice_unchecked(buf);
        self.entity_instance.pack_to_slice_unchecked(&mut buf[2..]);
        self.container_id.pack_to_slice_unchecked(&mut buf[4..]);

        &buf[0..6]
    }

    fn packed_len(&self) -> usize {
        6
    }
}

impl PldmWireRead for Entity {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            entity_type: reader.take::<u16>()?,
            entity_instance: reader.take::<u16>()?,
            container_id: reader.take::<u16>()?,
        })
    }
}

/// Containment kind of an entity association.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum AssociationKind {
    /// Physical containment.
    Physical = 0,
    /// Logical containment.
    Logical = 1,
}

/// Entity Association PDR body (type 15).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityAssociationPdr {
    /// Container id of the children listed in this record.
    pub container_id: u16,
    /// Containment kind.
    pub association_type: AssociationKind,
    /// The containing entity.
    pub container: Entity,
    /// The contained entities.
    pub children: Vec<Entity>,
}

impl EntityAssociationPdr {
    /// Pack header plus body into a complete record, handle left at 0 for
    /// the repository to assign.
    pub fn to_record(&self) -> Vec<u8> {
        let body_len = self.packed_len();

        let mut out = vec![0u8; PDR_HEADER_LEN + body_len];

        PdrHeader::new(PdrType::EntityAssociation, body_len as u16)
            .pack_to_slice_unchecked(&mut out);
        self.pack_to_slice_unchecked(&mut out[PDR_HEADER_LEN..]);

        out
    }

    /// Extract the entity list from a complete record: the container entity
    /// first, then every child.
    pub fn extract_entities(record: &[u8]) -> Result<(Self, Vec<Entity>), WireError> {
        let body = record
            .get(PDR_HEADER_LEN..)
            .ok_or(WireError::ReadBufferTooShort {
                got: record.len(),
                expected: PDR_HEADER_LEN,
            })?;

        let pdr = Self::unpack_from_slice(body)?;

        let mut entities = Vec::with_capacity(1 + pdr.children.len());
        entities.push(pdr.container);
        entities.extend(pdr.children.iter().copied());

        Ok((pdr, entities))
    }
}

impl PldmWireWrite for EntityAssociationPdr {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        self.container_id.pack_to_slice_unchecked(buf);
        buf[2] = self.association_type.into();
        self.container.pack_to_slice_unchecked(&mut buf[3..]);
        buf[9] = self.children.len() as u8;

        let mut at = 10;
        for child in &self.children {
            child.pack_to_slice_unchecked(&mut buf[at..]);
            at += Entity::PACKED_LEN;
        }

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        10 + self.children.len() * Entity::PACKED_LEN
    }
}

impl PldmWireRead for EntityAssociationPdr {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let container_id = reader.take::<u16>()?;
        let association_type = AssociationKind::try_from(reader.take::<u8>()?)
            .map_err(|_| WireError::InvalidValue)?;
        let container = reader.take::<Entity>()?;
        let num_children = usize::from(reader.take::<u8>()?);

        if reader.remaining_len() < num_children * Entity::PACKED_LEN {
            return Err(WireError::ArrayLength {
                described: num_children,
                present: reader.remaining_len() / Entity::PACKED_LEN,
            });
        }

        let mut children = Vec::with_capacity(num_children);
        for _ in 0..num_children {
            children.push(reader.take::<Entity>()?);
        }

        Ok(Self {
            container_id,
            association_type,
            container,
            children,
        })
    }
}

/// Terminus locator types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TerminusLocatorType {
    /// UID locator.
    Uid = 0,
    /// MCTP endpoint id locator; the value is a single EID octet.
    MctpEid = 1,
    /// SMBus relative locator.
    SmbusRelative = 2,
    /// System software locator.
    SystemSoftware = 3,
}

/// Terminus Locator PDR body (type 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminusLocatorPdr {
    /// Handle other PDRs use to refer to this terminus.
    pub terminus_handle: u16,
    /// 1 when the locator is valid.
    pub validity: u8,
    /// Terminus id.
    pub tid: u8,
    /// Container holding the terminus.
    pub container_id: u16,
    /// How `locator_value` is to be interpreted.
    pub locator_type: TerminusLocatorType,
    /// Locator value bytes.
    pub locator_value: Vec<u8>,
}

impl TerminusLocatorPdr {
    /// A valid MCTP-EID locator record for the given terminus.
    pub fn mctp(terminus_handle: u16, tid: u8, eid: u8) -> Self {
        Self {
            terminus_handle,
            validity: 1,
            tid,
            container_id: 0,
            locator_type: TerminusLocatorType::MctpEid,
            locator_value: vec![eid],
        }
    }

    /// The EID of an MCTP locator, if that is what this record holds.
    pub fn eid(&self) -> Option<u8> {
        if self.locator_type == TerminusLocatorType::MctpEid {
            self.locator_value.first().copied()
        } else {
            None
        }
    }

    /// Pack header plus body into a complete record.
    pub fn to_record(&self) -> Vec<u8> {
        let body_len = self.packed_len();

        let mut out = vec![0u8; PDR_HEADER_LEN + body_len];

        PdrHeader::new(PdrType::TerminusLocator, body_len as u16)
            .pack_to_slice_unchecked(&mut out);
        self.pack_to_slice_unchecked(&mut out[PDR_HEADER_LEN..]);

        out
    }

    /// Parse the body of a complete record.
    pub fn from_record(record: &[u8]) -> Result<Self, WireError> {
        let body = record
            .get(PDR_HEADER_LEN..)
            .ok_or(WireError::ReadBufferTooShort {
                got: record.len(),
                expected: PDR_HEADER_LEN,
            })?;

        Self::unpack_from_slice(body)
    }
}

impl PldmWireWrite for TerminusLocatorPdr {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        self.terminus_handle.pack_to_slice_unchecked(buf);
        buf[2] = self.validity;
        buf[3] = self.tid;
        self.container_id.pack_to_slice_unchecked(&mut buf[4..]);
        buf[6] = self.locator_type.into();
        buf[7] = self.locator_value.len() as u8;
        buf[8..8 + self.locator_value.len()].copy_from_slice(&self.locator_value);

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        8 + self.locator_value.len()
    }
}

impl PldmWireRead for TerminusLocatorPdr {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let terminus_handle = reader.take::<u16>()?;
        let validity = reader.take::<u8>()?;
        let tid = reader.take::<u8>()?;
        let container_id = reader.take::<u16>()?;
        let locator_type = TerminusLocatorType::try_from(reader.take::<u8>()?)
            .map_err(|_| WireError::InvalidValue)?;
        let value_size = usize::from(reader.take::<u8>()?);
        let locator_value = reader.take_bytes(value_size)?.to_vec();

        Ok(Self {
            terminus_handle,
            validity,
            tid,
            container_id,
            locator_type,
            locator_value,
        })
    }
}

/// FRU Record Set PDR body (type 20).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FruRecordSetPdr {
    /// Owning terminus.
    pub terminus_handle: u16,
    /// Record set identifier used in the FRU record table.
    pub fru_rsi: u16,
    /// The entity the record set describes.
    pub entity: Entity,
}

impl FruRecordSetPdr {
    /// Pack header plus body into a complete record.
    pub fn to_record(&self) -> Vec<u8> {
        let mut out = vec![0u8; PDR_HEADER_LEN + Self::PACKED_LEN];

        PdrHeader::new(PdrType::FruRecordSet, Self::PACKED_LEN as u16)
            .pack_to_slice_unchecked(&mut out);
        self.pack_to_slice_unchecked(&mut out[PDR_HEADER_LEN..]);

        out
    }

    /// Parse the body of a complete record.
    pub fn from_record(record: &[u8]) -> Result<Self, WireError> {
        let body = record
            .get(PDR_HEADER_LEN..)
            .ok_or(WireError::ReadBufferTooShort {
                got: record.len(),
                expected: PDR_HEADER_LEN,
            })?;

        Self::unpack_from_slice(body)
    }
}

impl PldmWireSized for FruRecordSetPdr {
    const PACKED_LEN: usize = 10;

    type Buffer = [u8; 10];

    fn buffer() -> Self::Buffer {
        [0u8; 10]
    }
}

impl PldmWireWrite for FruRecordSetPdr {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        self.terminus_handle.pack_to_slice_unchecked(buf);
        self.fru_rsi.pack_to_slice_unchecked(&mut buf[2..]);
        self.entity.pack_to_slice_unchecked(&mut buf[4..]);

        &buf[0..10]
    }

    fn packed_len(&self) -> usize {
        10
    }
}

impl PldmWireRead for FruRecordSetPdr {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        Ok(Self {
            terminus_handle: reader.take::<u16>()?,
            fru_rsi: reader.take::<u16>()?,
            entity: reader.take::<Entity>()?,
        })
    }
}

/// One composite offset of a state sensor or state effecter PDR: the state
/// set it reports and the bitfield of possible state values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PossibleStates {
    /// State set id, per DSP0249.
    pub state_set_id: u16,
    /// Bit N of byte M set means state value `M * 8 + N` can be reported.
    pub states: Vec<u8>,
}

impl PossibleStates {
    /// Enumerate the permissible state values.
    pub fn values(&self) -> Vec<u8> {
        let mut out = Vec::new();

        for (byte_idx, byte) in self.states.iter().enumerate() {
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    out.push((byte_idx * 8 + bit) as u8);
                }
            }
        }

        out
    }
}

fn pack_possible_states(sets: &[PossibleStates], buf: &mut [u8]) -> usize {
    let mut at = 0;

    for set in sets {
        set.state_set_id.pack_to_slice_unchecked(&mut buf[at..]);
        buf[at + 2] = set.states.len() as u8;
        buf[at + 3..at + 3 + set.states.len()].copy_from_slice(&set.states);
        at += 3 + set.states.len();
    }

    at
}

fn unpack_possible_states(reader: &mut Reader<'_>, count: usize) -> Result<Vec<PossibleStates>, WireError> {
    let mut sets = Vec::with_capacity(count);

    for _ in 0..count {
        let state_set_id = reader.take::<u16>()?;
        let size = usize::from(reader.take::<u8>()?);
        let states = reader.take_bytes(size)?.to_vec();

        sets.push(PossibleStates {
            state_set_id,
            states,
        });
    }

    Ok(sets)
}

fn possible_states_len(sets: &[PossibleStates]) -> usize {
    sets.iter().map(|s| 3 + s.states.len()).sum()
}

/// State Sensor PDR body (type 4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSensorPdr {
    /// Owning terminus.
    pub terminus_handle: u16,
    /// Sensor id unique within the terminus.
    pub sensor_id: u16,
    /// The entity the sensor observes.
    pub entity: Entity,
    /// Sensor init semantics.
    pub sensor_init: u8,
    /// Whether an auxiliary names PDR exists for this sensor.
    pub has_aux_names: bool,
    /// One entry per composite sensor offset.
    pub sensors: Vec<PossibleStates>,
}

impl StateSensorPdr {
    /// Pack header plus body into a complete record.
    pub fn to_record(&self) -> Vec<u8> {
        let body_len = self.packed_len();

        let mut out = vec![0u8; PDR_HEADER_LEN + body_len];

        PdrHeader::new(PdrType::StateSensor, body_len as u16).pack_to_slice_unchecked(&mut out);
        self.pack_to_slice_unchecked(&mut out[PDR_HEADER_LEN..]);

        out
    }

    /// Parse the body of a complete record.
    pub fn from_record(record: &[u8]) -> Result<Self, WireError> {
        let body = record
            .get(PDR_HEADER_LEN..)
            .ok_or(WireError::ReadBufferTooShort {
                got: record.len(),
                expected: PDR_HEADER_LEN,
            })?;

        Self::unpack_from_slice(body)
    }
}

impl PldmWireWrite for StateSensorPdr {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        self.terminus_handle.pack_to_slice_unchecked(buf);
        self.sensor_id.pack_to_slice_unchecked(&mut buf[2..]);
        self.entity.pack_to_slice_unchecked(&mut buf[4..]);
        buf[10] = self.sensor_init;
        buf[11] = self.has_aux_names as u8;
        buf[12] = self.sensors.len() as u8;

        pack_possible_states(&self.sensors, &mut buf[13..]);

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        13 + possible_states_len(&self.sensors)
    }
}

impl PldmWireRead for StateSensorPdr {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let terminus_handle = reader.take::<u16>()?;
        let sensor_id = reader.take::<u16>()?;
        let entity = reader.take::<Entity>()?;
        let sensor_init = reader.take::<u8>()?;
        let has_aux_names = reader.take::<u8>()? != 0;
        let count = usize::from(reader.take::<u8>()?);
        let sensors = unpack_possible_states(&mut reader, count)?;

        Ok(Self {
            terminus_handle,
            sensor_id,
            entity,
            sensor_init,
            has_aux_names,
            sensors,
        })
    }
}

/// State Effecter PDR body (type 11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEffecterPdr {
    /// Owning terminus.
    pub terminus_handle: u16,
    /// Effecter id unique within the terminus.
    pub effecter_id: u16,
    /// The entity the effecter controls.
    pub entity: Entity,
    /// Effecter semantic id.
    pub effecter_semantic_id: u16,
    /// Effecter init semantics.
    pub effecter_init: u8,
    /// Whether a description PDR exists for this effecter.
    pub has_description_pdr: bool,
    /// One entry per composite effecter offset.
    pub effecters: Vec<PossibleStates>,
}

impl StateEffecterPdr {
    /// Pack header plus body into a complete record.
    pub fn to_record(&self) -> Vec<u8> {
        let body_len = self.packed_len();

        let mut out = vec![0u8; PDR_HEADER_LEN + body_len];

        PdrHeader::new(PdrType::StateEffecter, body_len as u16).pack_to_slice_unchecked(&mut out);
        self.pack_to_slice_unchecked(&mut out[PDR_HEADER_LEN..]);

        out
    }

    /// Parse the body of a complete record.
    pub fn from_record(record: &[u8]) -> Result<Self, WireError> {
        let body = record
            .get(PDR_HEADER_LEN..)
            .ok_or(WireError::ReadBufferTooShort {
                got: record.len(),
                expected: PDR_HEADER_LEN,
            })?;

        Self::unpack_from_slice(body)
    }
}

impl PldmWireWrite for StateEffecterPdr {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        self.terminus_handle.pack_to_slice_unchecked(buf);
        self.effecter_id.pack_to_slice_unchecked(&mut buf[2..]);
        self.entity.pack_to_slice_unchecked(&mut buf[4..]);
        self.effecter_semantic_id
            .pack_to_slice_unchecked(&mut buf[10..]);
        buf[12] = self.effecter_init;
        buf[13] = self.has_description_pdr as u8;
        buf[14] = self.effecters.len() as u8;

        pack_possible_states(&self.effecters, &mut buf[15..]);

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        15 + possible_states_len(&self.effecters)
    }
}

impl PldmWireRead for StateEffecterPdr {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let terminus_handle = reader.take::<u16>()?;
        let effecter_id = reader.take::<u16>()?;
        let entity = reader.take::<Entity>()?;
        let effecter_semantic_id = reader.take::<u16>()?;
        let effecter_init = reader.take::<u8>()?;
        let has_description_pdr = reader.take::<u8>()? != 0;
        let count = usize::from(reader.take::<u8>()?);
        let effecters = unpack_possible_states(&mut reader, count)?;

        Ok(Self {
            terminus_handle,
            effecter_id,
            entity,
            effecter_semantic_id,
            effecter_init,
            has_description_pdr,
            effecters,
        })
    }
}

/// Raw data width of a numeric effecter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum EffecterDataSize {
    /// Unsigned 8 bit.
    U8 = 0,
    /// Signed 8 bit.
    S8 = 1,
    /// Unsigned 16 bit.
    U16 = 2,
    /// Signed 16 bit.
    S16 = 3,
    /// Unsigned 32 bit.
    U32 = 4,
    /// Signed 32 bit.
    S32 = 5,
}

impl EffecterDataSize {
    /// Width in bytes of a value of this size.
    pub fn len(self) -> usize {
        match self {
            EffecterDataSize::U8 | EffecterDataSize::S8 => 1,
            EffecterDataSize::U16 | EffecterDataSize::S16 => 2,
            EffecterDataSize::U32 | EffecterDataSize::S32 => 4,
        }
    }
}

/// A raw numeric effecter value, sized per the effecter's data size.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EffecterValue {
    /// Unsigned 8 bit.
    U8(u8),
    /// Signed 8 bit.
    S8(i8),
    /// Unsigned 16 bit.
    U16(u16),
    /// Signed 16 bit.
    S16(i16),
    /// Unsigned 32 bit.
    U32(u32),
    /// Signed 32 bit.
    S32(i32),
}

impl EffecterValue {
    /// The data size tag matching this value.
    pub fn data_size(&self) -> EffecterDataSize {
        match self {
            EffecterValue::U8(_) => EffecterDataSize::U8,
            EffecterValue::S8(_) => EffecterDataSize::S8,
            EffecterValue::U16(_) => EffecterDataSize::U16,
            EffecterValue::S16(_) => EffecterDataSize::S16,
            EffecterValue::U32(_) => EffecterDataSize::U32,
            EffecterValue::S32(_) => EffecterDataSize::S32,
        }
    }

    /// Build a raw value of the given size from a wide integer, failing when
    /// it does not fit.
    pub fn from_i64(size: EffecterDataSize, value: i64) -> Option<Self> {
        Some(match size {
            EffecterDataSize::U8 => EffecterValue::U8(u8::try_from(value).ok()?),
            EffecterDataSize::S8 => EffecterValue::S8(i8::try_from(value).ok()?),
            EffecterDataSize::U16 => EffecterValue::U16(u16::try_from(value).ok()?),
            EffecterDataSize::S16 => EffecterValue::S16(i16::try_from(value).ok()?),
            EffecterDataSize::U32 => EffecterValue::U32(u32::try_from(value).ok()?),
            EffecterDataSize::S32 => EffecterValue::S32(i32::try_from(value).ok()?),
        })
    }

    /// Widen to an i64 for arithmetic.
    pub fn as_i64(&self) -> i64 {
        match *self {
            EffecterValue::U8(v) => i64::from(v),
            EffecterValue::S8(v) => i64::from(v),
            EffecterValue::U16(v) => i64::from(v),
            EffecterValue::S16(v) => i64::from(v),
            EffecterValue::U32(v) => i64::from(v),
            EffecterValue::S32(v) => i64::from(v),
        }
    }

    /// Unpack a value of the given size.
    pub fn unpack(size: EffecterDataSize, reader: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(match size {
            EffecterDataSize::U8 => EffecterValue::U8(reader.take::<u8>()?),
            EffecterDataSize::S8 => EffecterValue::S8(reader.take::<i8>()?),
            EffecterDataSize::U16 => EffecterValue::U16(reader.take::<u16>()?),
            EffecterDataSize::S16 => EffecterValue::S16(reader.take::<i16>()?),
            EffecterDataSize::U32 => EffecterValue::U32(reader.take::<u32>()?),
            EffecterDataSize::S32 => EffecterValue::S32(reader.take::<i32>()?),
        })
    }
}

impl PldmWireWrite for EffecterValue {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        match *self {
            EffecterValue::U8(v) => v.pack_to_slice_unchecked(buf),
            EffecterValue::S8(v) => v.pack_to_slice_unchecked(buf),
            EffecterValue::U16(v) => v.pack_to_slice_unchecked(buf),
            EffecterValue::S16(v) => v.pack_to_slice_unchecked(buf),
            EffecterValue::U32(v) => v.pack_to_slice_unchecked(buf),
            EffecterValue::S32(v) => v.pack_to_slice_unchecked(buf),
        }
    }

    fn packed_len(&self) -> usize {
        self.data_size().len()
    }
}

/// Operational state of an effecter, per DSP0248 Table 37.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum EffecterOperState {
    /// Enabled with a write in flight.
    EnabledUpdatePending = 0,
    /// Enabled, idle.
    EnabledNoUpdatePending = 1,
    /// Disabled.
    Disabled = 2,
    /// Unavailable.
    Unavailable = 3,
    /// Status unknown.
    StatusUnknown = 4,
    /// Failed.
    Failed = 5,
    /// Initializing.
    Initializing = 6,
    /// Shutting down.
    ShuttingDown = 7,
    /// In test.
    InTest = 8,
}

/// Sensor/effecter base units, per DSP0248 Table 50. Only the units this
/// stack interprets are named.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum BaseUnit {
    /// Unitless.
    None = 0,
    /// Degrees Celsius.
    DegreesC = 2,
    /// Volts.
    Volts = 5,
    /// Amps.
    Amps = 6,
    /// Watts.
    Watts = 7,
    /// Joules.
    Joules = 8,
    /// Revolutions per minute.
    Rpm = 19,
    /// A unit this stack has no name for.
    #[num_enum(catch_all)]
    Other(u8),
}

/// Numeric Effecter PDR body (type 9).
///
/// Carries the scaling triplet `(resolution, offset, unit_modifier)` used to
/// convert between base units and raw effecter counts, and the settable
/// range.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericEffecterPdr {
    /// Owning terminus.
    pub terminus_handle: u16,
    /// Effecter id unique within the terminus.
    pub effecter_id: u16,
    /// The entity the effecter controls.
    pub entity: Entity,
    /// Effecter semantic id.
    pub effecter_semantic_id: u16,
    /// Effecter init semantics.
    pub effecter_init: u8,
    /// Whether an auxiliary names PDR exists for this effecter.
    pub has_aux_names: bool,
    /// Base unit of the converted value.
    pub base_unit: BaseUnit,
    /// Power-of-ten modifier applied after scaling.
    pub unit_modifier: i8,
    /// Rate unit tag.
    pub rate_unit: u8,
    /// OEM unit handle for the base unit.
    pub base_oem_unit_handle: u8,
    /// Auxiliary unit tag.
    pub aux_unit: u8,
    /// Power-of-ten modifier for the auxiliary unit.
    pub aux_unit_modifier: i8,
    /// Auxiliary rate unit tag.
    pub aux_rate_unit: u8,
    /// OEM unit handle for the auxiliary unit.
    pub aux_oem_unit_handle: u8,
    /// Whether the conversion is linear.
    pub is_linear: bool,
    /// Raw data width.
    pub data_size: EffecterDataSize,
    /// Scaling factor `m`.
    pub resolution: f32,
    /// Scaling offset `B`.
    pub offset: f32,
    /// Accuracy in hundredths of a percent.
    pub accuracy: u16,
    /// Plus tolerance in counts.
    pub plus_tolerance: u8,
    /// Minus tolerance in counts.
    pub minus_tolerance: u8,
    /// Delay between a state transition and effect, seconds.
    pub state_transition_interval: f32,
    /// Delay between a write and effect, seconds.
    pub transition_interval: f32,
    /// Largest settable raw value.
    pub max_settable: EffecterValue,
    /// Smallest settable raw value.
    pub min_settable: EffecterValue,
}

impl NumericEffecterPdr {
    /// Pack header plus body into a complete record.
    ///
    /// The range field format is emitted matching `data_size` with no range
    /// fields beyond the settable bounds.
    pub fn to_record(&self) -> Vec<u8> {
        let body_len = self.packed_len();

        let mut out = vec![0u8; PDR_HEADER_LEN + body_len];

        PdrHeader::new(PdrType::NumericEffecter, body_len as u16)
            .pack_to_slice_unchecked(&mut out);
        self.pack_to_slice_unchecked(&mut out[PDR_HEADER_LEN..]);

        out
    }

    /// Parse the body of a complete record.
    pub fn from_record(record: &[u8]) -> Result<Self, WireError> {
        let body = record
            .get(PDR_HEADER_LEN..)
            .ok_or(WireError::ReadBufferTooShort {
                got: record.len(),
                expected: PDR_HEADER_LEN,
            })?;

        Self::unpack_from_slice(body)
    }
}

impl PldmWireWrite for NumericEffecterPdr {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        self.terminus_handle.pack_to_slice_unchecked(buf);
        self.effecter_id.pack_to_slice_unchecked(&mut buf[2..]);
        self.entity.pack_to_slice_unchecked(&mut buf[4..]);
        self.effecter_semantic_id
            .pack_to_slice_unchecked(&mut buf[10..]);
        buf[12] = self.effecter_init;
        buf[13] = self.has_aux_names as u8;
        buf[14] = self.base_unit.into();
        buf[15] = self.unit_modifier as u8;
        buf[16] = self.rate_unit;
        buf[17] = self.base_oem_unit_handle;
        buf[18] = self.aux_unit;
        buf[19] = self.aux_unit_modifier as u8;
        buf[20] = self.aux_rate_unit;
        buf[21] = self.aux_oem_unit_handle;
        buf[22] = self.is_linear as u8;
        buf[23] = self.data_size.into();
        self.resolution.pack_to_slice_unchecked(&mut buf[24..]);
        self.offset.pack_to_slice_unchecked(&mut buf[28..]);
        self.accuracy.pack_to_slice_unchecked(&mut buf[32..]);
        buf[34] = self.plus_tolerance;
        buf[35] = self.minus_tolerance;
        self.state_transition_interval
            .pack_to_slice_unchecked(&mut buf[36..]);
        self.transition_interval
            .pack_to_slice_unchecked(&mut buf[40..]);

        let mut at = 44;
        self.max_settable.pack_to_slice_unchecked(&mut buf[at..]);
        at += self.max_settable.packed_len();
        self.min_settable.pack_to_slice_unchecked(&mut buf[at..]);
        at += self.min_settable.packed_len();

        // Range field format mirrors the data size; no optional range fields
        // are emitted (range_field_support = 0).
        buf[at] = u8::from(self.data_size);
        buf[at + 1] = 0;

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        44 + 2 * self.data_size.len() + 2
    }
}

impl PldmWireRead for NumericEffecterPdr {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let terminus_handle = reader.take::<u16>()?;
        let effecter_id = reader.take::<u16>()?;
        let entity = reader.take::<Entity>()?;
        let effecter_semantic_id = reader.take::<u16>()?;
        let effecter_init = reader.take::<u8>()?;
        let has_aux_names = reader.take::<u8>()? != 0;
        let base_unit = BaseUnit::from(reader.take::<u8>()?);
        let unit_modifier = reader.take::<i8>()?;
        let rate_unit = reader.take::<u8>()?;
        let base_oem_unit_handle = reader.take::<u8>()?;
        let aux_unit = reader.take::<u8>()?;
        let aux_unit_modifier = reader.take::<i8>()?;
        let aux_rate_unit = reader.take::<u8>()?;
        let aux_oem_unit_handle = reader.take::<u8>()?;
        let is_linear = reader.take::<u8>()? != 0;
        let data_size = EffecterDataSize::try_from(reader.take::<u8>()?)
            .map_err(|_| WireError::InvalidValue)?;
        let resolution = reader.take::<f32>()?;
        let offset = reader.take::<f32>()?;
        let accuracy = reader.take::<u16>()?;
        let plus_tolerance = reader.take::<u8>()?;
        let minus_tolerance = reader.take::<u8>()?;
        let state_transition_interval = reader.take::<f32>()?;
        let transition_interval = reader.take::<f32>()?;
        let max_settable = EffecterValue::unpack(data_size, &mut reader)?;
        let min_settable = EffecterValue::unpack(data_size, &mut reader)?;

        Ok(Self {
            terminus_handle,
            effecter_id,
            entity,
            effecter_semantic_id,
            effecter_init,
            has_aux_names,
            base_unit,
            unit_modifier,
            rate_unit,
            base_oem_unit_handle,
            aux_unit,
            aux_unit_modifier,
            aux_rate_unit,
            aux_oem_unit_handle,
            is_linear,
            data_size,
            resolution,
            offset,
            accuracy,
            plus_tolerance,
            minus_tolerance,
            state_transition_interval,
            transition_interval,
            max_settable,
            min_settable,
        })
    }
}

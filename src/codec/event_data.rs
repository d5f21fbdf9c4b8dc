//! Event data payloads carried inside `PlatformEventMessage` (DSP0248 §16).

use super::Reader;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use pldm_wire::{PldmWireRead, PldmWireWrite, WireError};

/// Sensor event class tag, the first byte after the sensor id in a sensor
/// event payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SensorEventClass {
    /// Sensor operational state changed.
    SensorOpState = 0x00,
    /// A state sensor crossed into a new state.
    StateSensorState = 0x01,
    /// A numeric sensor crossed a threshold.
    NumericSensorState = 0x02,
}

/// A parsed sensor event payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SensorEvent {
    /// A state sensor reported a new state at one composite offset.
    StateSensorState {
        /// The reporting sensor.
        sensor_id: u16,
        /// Composite offset within the sensor.
        sensor_offset: u8,
        /// The state entered.
        event_state: u8,
        /// The state left.
        previous_event_state: u8,
    },
    /// An event class this stack receives but does not act on.
    Unsupported {
        /// The reporting sensor.
        sensor_id: u16,
        /// The raw class tag.
        class: u8,
    },
}

impl SensorEvent {
    /// A state sensor event.
    pub fn state(sensor_id: u16, sensor_offset: u8, event_state: u8, previous: u8) -> Self {
        Self::StateSensorState {
            sensor_id,
            sensor_offset,
            event_state,
            previous_event_state: previous,
        }
    }
}

impl PldmWireRead for SensorEvent {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let sensor_id = reader.take::<u16>()?;
        let class = reader.take::<u8>()?;

        match SensorEventClass::try_from(class) {
            Ok(SensorEventClass::StateSensorState) => Ok(Self::StateSensorState {
                sensor_id,
                sensor_offset: reader.take::<u8>()?,
                event_state: reader.take::<u8>()?,
                previous_event_state: reader.take::<u8>()?,
            }),
            _ => Ok(Self::Unsupported { sensor_id, class }),
        }
    }
}

impl PldmWireWrite for SensorEvent {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        match *self {
            SensorEvent::StateSensorState {
                sensor_id,
                sensor_offset,
                event_state,
                previous_event_state,
            } => {
                sensor_id.pack_to_slice_unchecked(buf);
                buf[2] = SensorEventClass::StateSensorState.into();
                buf[3] = sensor_offset;
                buf[4] = event_state;
                buf[5] = previous_event_state;

                &buf[0..6]
            }
            SensorEvent::Unsupported { sensor_id, class } => {
                sensor_id.pack_to_slice_unchecked(buf);
                buf[2] = class;

                &buf[0..3]
            }
        }
    }

    fn packed_len(&self) -> usize {
        match self {
            SensorEvent::StateSensorState { .. } => 6,
            SensorEvent::Unsupported { .. } => 3,
        }
    }
}

/// Data format tag of a PDR repository change event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ChgEventDataFormat {
    /// The whole repository should be re-read.
    RefreshEntireRepository = 0,
    /// Change records list PDR types.
    IsPdrTypes = 1,
    /// Change records list record handles.
    IsPdrHandles = 2,
}

/// Operation of one change record within a repository change event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ChgEventOperation {
    /// Referenced records should be re-read.
    Refresh = 0,
    /// Referenced records were added.
    RecordsAdded = 1,
    /// Referenced records were modified.
    RecordsModified = 2,
    /// Referenced records were deleted.
    RecordsDeleted = 3,
}

/// One change record: an operation and the handles (or types) it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChgEventRecord {
    /// What happened to the referenced records.
    pub operation: ChgEventOperation,
    /// Record handles, or PDR types when the event format says so.
    pub entries: Vec<u32>,
}

/// `PDRRepositoryChgEvent` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdrRepositoryChgEvent {
    /// How the change record entries are to be interpreted.
    pub data_format: ChgEventDataFormat,
    /// The change records.
    pub records: Vec<ChgEventRecord>,
}

impl PdrRepositoryChgEvent {
    /// An event announcing freshly added records by handle.
    pub fn records_added(handles: Vec<u32>) -> Self {
        Self {
            data_format: ChgEventDataFormat::IsPdrHandles,
            records: vec![ChgEventRecord {
                operation: ChgEventOperation::RecordsAdded,
                entries: handles,
            }],
        }
    }
}

impl PldmWireRead for PdrRepositoryChgEvent {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(buf);

        let data_format = ChgEventDataFormat::try_from(reader.take::<u8>()?)
            .map_err(|_| WireError::InvalidValue)?;
        let record_count = usize::from(reader.take::<u8>()?);

        let mut records = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            let operation = ChgEventOperation::try_from(reader.take::<u8>()?)
                .map_err(|_| WireError::InvalidValue)?;
            let entry_count = usize::from(reader.take::<u8>()?);

            if reader.remaining_len() < entry_count * 4 {
                return Err(WireError::ArrayLength {
                    described: entry_count,
                    present: reader.remaining_len() / 4,
                });
            }

            let mut entries = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                entries.push(reader.take::<u32>()?);
            }

            records.push(ChgEventRecord { operation, entries });
        }

        Ok(Self {
            data_format,
            records,
        })
    }
}

impl PldmWireWrite for PdrRepositoryChgEvent {
    fn pack_to_slice_unchecked<'buf>(&self, buf: &'buf mut [u8]) -> &'buf [u8] {
        let len = self.packed_len();

        buf[0] = self.data_format.into();
        buf[1] = self.records.len() as u8;

        let mut at = 2;
        for record in &self.records {
            buf[at] = record.operation.into();
            buf[at + 1] = record.entries.len() as u8;
            at += 2;

            for entry in &record.entries {
                entry.pack_to_slice_unchecked(&mut buf[at..]);
                at += 4;
            }
        }

        &buf[0..len]
    }

    fn packed_len(&self) -> usize {
        2 + self
            .records
            .iter()
            .map(|r| 2 + r.entries.len() * 4)
            .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn state_sensor_event_round_trip() {
        let event = SensorEvent::state(0x00A1, 1, 2, 1);

        let mut buf = [0u8; 8];

        let packed = event.pack_to_slice(&mut buf).unwrap().to_vec();

        assert_eq!(packed, vec![0xA1, 0x00, 0x01, 0x01, 0x02, 0x01]);
        assert_eq!(SensorEvent::unpack_from_slice(&packed), Ok(event));
    }

    #[test]
    fn repo_chg_event_round_trip() {
        let event = PdrRepositoryChgEvent::records_added(vec![0x10, 0x11, 0x12]);

        let mut buf = [0u8; 32];

        let packed = event.pack_to_slice(&mut buf).unwrap().to_vec();

        assert_eq!(packed[0], 0x02); // handles format
        assert_eq!(packed[2], 0x01); // records added
        assert_eq!(packed[3], 0x03); // three entries
        assert_eq!(PdrRepositoryChgEvent::unpack_from_slice(&packed), Ok(event));
    }

    #[test]
    fn unknown_sensor_event_class_is_kept() {
        let raw = [0x05u8, 0x00, 0x02, 0xFF, 0xFF];

        assert_eq!(
            SensorEvent::unpack_from_slice(&raw),
            Ok(SensorEvent::Unsupported {
                sensor_id: 5,
                class: 2
            })
        );
    }
}

//! The state sensor map: `(tid, sensor id)` → entity and permitted states.
//!
//! Populated while remote state sensor PDRs are ingested; consulted when a
//! `StateSensorEvent` arrives to find the entity a reading belongs to and to
//! validate the reported state.

use crate::codec::pdr::{Entity, StateSensorPdr};
use crate::Tid;
use std::collections::{BTreeSet, HashMap};

/// One composite offset: the state set it reports and the states it may
/// legally report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorStateSet {
    /// State set id, per DSP0249.
    pub state_set_id: u16,
    /// Permissible present-state values.
    pub possible_states: BTreeSet<u8>,
}

/// Everything remembered about one remote state sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorEntry {
    /// The entity the sensor observes, local container assignment included.
    pub entity: Entity,
    /// One entry per composite offset.
    pub state_sets: Vec<SensorStateSet>,
}

/// The sensor map proper.
#[derive(Debug, Default)]
pub struct SensorMap {
    entries: HashMap<(Tid, u16), SensorEntry>,
}

impl SensorMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a parsed state sensor PDR for the terminus `tid`.
    pub fn insert_pdr(&mut self, tid: Tid, pdr: &StateSensorPdr) {
        let state_sets = pdr
            .sensors
            .iter()
            .map(|states| SensorStateSet {
                state_set_id: states.state_set_id,
                possible_states: states.values().into_iter().collect(),
            })
            .collect();

        self.entries.insert(
            (tid, pdr.sensor_id),
            SensorEntry {
                entity: pdr.entity,
                state_sets,
            },
        );
    }

    /// Look up a sensor.
    pub fn get(&self, tid: Tid, sensor_id: u16) -> Option<&SensorEntry> {
        self.entries.get(&(tid, sensor_id))
    }

    /// Iterate every `(tid, sensor id)` pair.
    pub fn sensor_ids(&self) -> Vec<(Tid, u16)> {
        self.entries.keys().copied().collect()
    }

    /// Number of sensors known.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything, e.g. when the host goes down.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pdr::PossibleStates;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_and_lookup() {
        let mut map = SensorMap::new();

        map.insert_pdr(
            2,
            &StateSensorPdr {
                terminus_handle: 2,
                sensor_id: 0x00A1,
                entity: Entity::new(135, 1, 1),
                sensor_init: 0,
                has_aux_names: false,
                sensors: vec![PossibleStates {
                    state_set_id: 196,
                    states: vec![0b0110],
                }],
            },
        );

        let entry = map.get(2, 0x00A1).unwrap();

        assert_eq!(entry.entity, Entity::new(135, 1, 1));
        assert_eq!(entry.state_sets.len(), 1);
        assert_eq!(
            entry.state_sets[0].possible_states,
            BTreeSet::from([1u8, 2])
        );

        assert!(map.get(2, 0x00A2).is_none());

        map.clear();

        assert!(map.is_empty());
    }
}

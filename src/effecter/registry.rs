//! The local effecter and sensor registry backing the responder.
//!
//! Holds the current values and operational state of everything the BMC's
//! own terminus exposes, keyed by effecter/sensor id. The responder reads
//! and writes it when the host issues platform commands against us.

use crate::codec::pdr::{
    EffecterOperState, EffecterValue, NumericEffecterPdr, PossibleStates, StateEffecterPdr,
};
use crate::codec::platform::{SensorStateField, SetRequest, StateField};
use crate::codec::CompletionCode;
use std::collections::HashMap;

/// One local state effecter: what it may be set to and what it is set to.
#[derive(Debug, Clone)]
pub struct StateEffecterEntry {
    /// Per-offset permitted states, from the PDR.
    pub possible: Vec<PossibleStates>,
    /// Per-offset current states.
    pub current: Vec<u8>,
}

/// One local numeric effecter.
#[derive(Debug, Clone)]
pub struct NumericEffecterEntry {
    /// The defining PDR.
    pub pdr: NumericEffecterPdr,
    /// Operational state.
    pub oper_state: EffecterOperState,
    /// Last accepted write.
    pub pending: EffecterValue,
    /// Value in effect.
    pub present: EffecterValue,
}

/// The registry proper.
#[derive(Debug, Default)]
pub struct EffecterRegistry {
    state_effecters: HashMap<u16, StateEffecterEntry>,
    numeric_effecters: HashMap<u16, NumericEffecterEntry>,
    state_sensors: HashMap<u16, Vec<SensorStateField>>,
}

impl EffecterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a state effecter from its PDR; all offsets start at state 0.
    pub fn add_state_effecter(&mut self, pdr: &StateEffecterPdr) {
        self.state_effecters.insert(
            pdr.effecter_id,
            StateEffecterEntry {
                current: vec![0; pdr.effecters.len()],
                possible: pdr.effecters.clone(),
            },
        );
    }

    /// Register a numeric effecter from its PDR, disabled at zero.
    pub fn add_numeric_effecter(&mut self, pdr: &NumericEffecterPdr) {
        let zero = EffecterValue::from_i64(pdr.data_size, 0).unwrap_or(EffecterValue::U8(0));

        self.numeric_effecters.insert(
            pdr.effecter_id,
            NumericEffecterEntry {
                pdr: pdr.clone(),
                oper_state: EffecterOperState::Disabled,
                pending: zero,
                present: zero,
            },
        );
    }

    /// Register a local state sensor with its current readings.
    pub fn add_state_sensor(&mut self, sensor_id: u16, fields: Vec<SensorStateField>) {
        self.state_sensors.insert(sensor_id, fields);
    }

    /// Serve `GetStateSensorReadings`.
    pub fn sensor_readings(&self, sensor_id: u16) -> Option<&[SensorStateField]> {
        self.state_sensors.get(&sensor_id).map(|f| f.as_slice())
    }

    /// Apply a `SetStateEffecterStates` request.
    pub fn set_states(&mut self, effecter_id: u16, fields: &[StateField]) -> CompletionCode {
        let Some(entry) = self.state_effecters.get_mut(&effecter_id) else {
            return CompletionCode::InvalidData;
        };

        if fields.len() != entry.current.len() {
            return CompletionCode::InvalidData;
        }

        // Validate the whole request before applying any of it.
        for (offset, field) in fields.iter().enumerate() {
            if field.set_request == SetRequest::NoChange {
                continue;
            }

            if !entry.possible[offset]
                .values()
                .contains(&field.effecter_state)
            {
                return CompletionCode::InvalidData;
            }
        }

        for (offset, field) in fields.iter().enumerate() {
            if field.set_request == SetRequest::RequestSet {
                entry.current[offset] = field.effecter_state;
            }
        }

        CompletionCode::Success
    }

    /// Current states of a state effecter.
    pub fn states(&self, effecter_id: u16) -> Option<&[u8]> {
        self.state_effecters
            .get(&effecter_id)
            .map(|e| e.current.as_slice())
    }

    /// Apply a `SetNumericEffecterValue` request.
    pub fn set_numeric_value(&mut self, effecter_id: u16, value: EffecterValue) -> CompletionCode {
        let Some(entry) = self.numeric_effecters.get_mut(&effecter_id) else {
            return CompletionCode::InvalidData;
        };

        if value.data_size() != entry.pdr.data_size {
            return CompletionCode::InvalidData;
        }

        let raw = value.as_i64();

        if raw < entry.pdr.min_settable.as_i64() || raw > entry.pdr.max_settable.as_i64() {
            return CompletionCode::InvalidData;
        }

        if entry.oper_state == EffecterOperState::Disabled {
            return CompletionCode::NotReady;
        }

        entry.pending = value;
        entry.present = value;
        entry.oper_state = EffecterOperState::EnabledNoUpdatePending;

        CompletionCode::Success
    }

    /// Serve `GetNumericEffecterValue`.
    pub fn numeric_value(&self, effecter_id: u16) -> Option<&NumericEffecterEntry> {
        self.numeric_effecters.get(&effecter_id)
    }

    /// Apply a `SetNumericEffecterEnable` request.
    pub fn set_numeric_enable(
        &mut self,
        effecter_id: u16,
        oper_state: EffecterOperState,
    ) -> CompletionCode {
        match self.numeric_effecters.get_mut(&effecter_id) {
            Some(entry) => {
                entry.oper_state = oper_state;

                CompletionCode::Success
            }
            None => CompletionCode::InvalidData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pdr::{BaseUnit, EffecterDataSize, Entity};
    use pretty_assertions::assert_eq;

    fn state_pdr() -> StateEffecterPdr {
        StateEffecterPdr {
            terminus_handle: 1,
            effecter_id: 4,
            entity: Entity::new(33, 1, 0),
            effecter_semantic_id: 0,
            effecter_init: 0,
            has_description_pdr: false,
            effecters: vec![PossibleStates {
                state_set_id: 196,
                states: vec![0b0110],
            }],
        }
    }

    fn numeric_pdr() -> NumericEffecterPdr {
        NumericEffecterPdr {
            terminus_handle: 1,
            effecter_id: 5,
            entity: Entity::new(135, 1, 1),
            effecter_semantic_id: 0,
            effecter_init: 0,
            has_aux_names: false,
            base_unit: BaseUnit::Watts,
            unit_modifier: 0,
            rate_unit: 0,
            base_oem_unit_handle: 0,
            aux_unit: 0,
            aux_unit_modifier: 0,
            aux_rate_unit: 0,
            aux_oem_unit_handle: 0,
            is_linear: true,
            data_size: EffecterDataSize::U16,
            resolution: 1.0,
            offset: 0.0,
            accuracy: 0,
            plus_tolerance: 0,
            minus_tolerance: 0,
            state_transition_interval: 0.0,
            transition_interval: 0.0,
            max_settable: EffecterValue::U16(400),
            min_settable: EffecterValue::U16(50),
        }
    }

    #[test]
    fn state_effecter_set_and_read() {
        let mut registry = EffecterRegistry::new();
        registry.add_state_effecter(&state_pdr());

        assert_eq!(
            registry.set_states(4, &[StateField::set(2)]),
            CompletionCode::Success
        );
        assert_eq!(registry.states(4), Some(&[2u8][..]));

        // state 5 is not in the possible set
        assert_eq!(
            registry.set_states(4, &[StateField::set(5)]),
            CompletionCode::InvalidData
        );
        assert_eq!(registry.states(4), Some(&[2u8][..]));

        assert_eq!(
            registry.set_states(9, &[StateField::set(1)]),
            CompletionCode::InvalidData
        );
    }

    #[test]
    fn numeric_effecter_lifecycle() {
        let mut registry = EffecterRegistry::new();
        registry.add_numeric_effecter(&numeric_pdr());

        // disabled effecters reject writes
        assert_eq!(
            registry.set_numeric_value(5, EffecterValue::U16(300)),
            CompletionCode::NotReady
        );

        registry.set_numeric_enable(5, EffecterOperState::EnabledNoUpdatePending);

        assert_eq!(
            registry.set_numeric_value(5, EffecterValue::U16(300)),
            CompletionCode::Success
        );
        assert_eq!(
            registry.set_numeric_value(5, EffecterValue::U16(500)),
            CompletionCode::InvalidData
        );

        let entry = registry.numeric_value(5).unwrap();

        assert_eq!(entry.present, EffecterValue::U16(300));
    }
}

//! JSON-driven state sensor event actions.
//!
//! Each entry binds `(containerId, entityType, entityInstance, sensorOffset,
//! stateSetId)` to a property setter: when the matching sensor reports one
//! of the listed event states, the mapped value is written to the bus.

use crate::bus::{InventoryBus, PlatformBus, PropertyValue};
use crate::codec::pdr::Entity;
use crate::error::{ConfigError, Error};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct SensorEntry {
    #[serde(rename = "containerID")]
    container_id: u16,
    #[serde(rename = "entityType")]
    entity_type: u16,
    #[serde(rename = "entityInstance")]
    entity_instance: u16,
    #[serde(rename = "sensorOffset")]
    sensor_offset: u8,
    #[serde(rename = "stateSetId", default)]
    state_set_id: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
struct DbusInfo {
    object_path: String,
    interface: String,
    property_name: String,
    property_type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EventEntryJson {
    sensor_entry: SensorEntry,
    dbus: DbusInfo,
    event_states: Vec<u8>,
    property_values: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct EventFileJson {
    entries: Vec<EventEntryJson>,
}

#[derive(Debug, Clone)]
struct EventAction {
    sensor: SensorEntry,
    dbus: DbusInfo,
    event_states: Vec<u8>,
    property_values: Vec<PropertyValue>,
}

/// The loaded event-action table.
#[derive(Default)]
pub struct StateSensorHandler {
    actions: Vec<EventAction>,
}

impl StateSensorHandler {
    /// Load every `*.json` file in `dir`. A missing directory yields an
    /// empty table; a malformed file is an error.
    pub fn load_dir(dir: &Path) -> Result<Self, Error> {
        let mut handler = Self::default();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(handler),
            Err(e) => return Err(ConfigError::Read(e.kind()).into()),
        };

        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::Read(e.kind()))?;

            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let raw = std::fs::read_to_string(entry.path())
                .map_err(|e| ConfigError::Read(e.kind()))?;

            handler.load_str(&raw)?;
        }

        Ok(handler)
    }

    /// Load one JSON document.
    pub fn load_str(&mut self, raw: &str) -> Result<(), Error> {
        let parsed: EventFileJson = serde_json::from_str(raw).map_err(|_| ConfigError::Parse)?;

        for entry in parsed.entries {
            if entry.event_states.len() != entry.property_values.len() {
                return Err(ConfigError::StateCountMismatch {
                    object_path: entry.dbus.object_path,
                }
                .into());
            }

            let property_values = entry
                .property_values
                .iter()
                .map(|v| PropertyValue::from_json(&entry.dbus.property_type, v))
                .collect::<Result<Vec<_>, _>>()?;

            self.actions.push(EventAction {
                sensor: entry.sensor_entry,
                dbus: entry.dbus,
                event_states: entry.event_states,
                property_values,
            });
        }

        Ok(())
    }

    /// Number of loaded actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// React to a state sensor reading: find the action for
    /// `(entity, offset)` (and state set, when the entry names one) and
    /// write the mapped property value. Unmatched tuples are ignored.
    pub fn event_action(
        &self,
        bus: &dyn PlatformBus,
        entity: Entity,
        state_set_id: u16,
        sensor_offset: u8,
        event_state: u8,
    ) {
        for action in &self.actions {
            if action.sensor.container_id != entity.container_id
                || action.sensor.entity_type != entity.entity_type
                || action.sensor.entity_instance != entity.entity_instance
                || action.sensor.sensor_offset != sensor_offset
            {
                continue;
            }

            if action
                .sensor
                .state_set_id
                .is_some_and(|wanted| wanted != state_set_id)
            {
                continue;
            }

            let Some(index) = action
                .event_states
                .iter()
                .position(|state| *state == event_state)
            else {
                log::debug!(
                    "event state {} not mapped for sensor offset {} of entity {:?}",
                    event_state,
                    sensor_offset,
                    entity
                );

                continue;
            };

            bus.set_property(
                &action.dbus.object_path,
                &action.dbus.interface,
                &action.dbus.property_name,
                action.property_values[index].clone(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "entries": [
            {
                "sensor_entry": {
                    "containerID": 1,
                    "entityType": 135,
                    "entityInstance": 1,
                    "sensorOffset": 0,
                    "stateSetId": 196
                },
                "dbus": {
                    "object_path": "/xyz/openbmc_project/state/cpu1",
                    "interface": "xyz.openbmc_project.State.Processor",
                    "property_name": "CurrentState",
                    "property_type": "string"
                },
                "event_states": [1, 2],
                "property_values": ["Off", "On"]
            }
        ]
    }"#;

    #[test]
    fn action_writes_mapped_value() {
        let mut handler = StateSensorHandler::default();
        handler.load_str(SAMPLE).unwrap();

        assert_eq!(handler.len(), 1);

        let bus = LocalBus::new();

        handler.event_action(&bus, Entity::new(135, 1, 1), 196, 0, 2);

        assert_eq!(
            bus.get_property(
                "/xyz/openbmc_project/state/cpu1",
                "xyz.openbmc_project.State.Processor",
                "CurrentState"
            ),
            Some(PropertyValue::Str("On".to_owned()))
        );
    }

    #[test]
    fn unmapped_state_is_ignored() {
        let mut handler = StateSensorHandler::default();
        handler.load_str(SAMPLE).unwrap();

        let bus = LocalBus::new();

        handler.event_action(&bus, Entity::new(135, 1, 1), 196, 0, 9);

        assert!(bus
            .get_property(
                "/xyz/openbmc_project/state/cpu1",
                "xyz.openbmc_project.State.Processor",
                "CurrentState"
            )
            .is_none());
    }

    #[test]
    fn state_count_mismatch_rejected() {
        let mut handler = StateSensorHandler::default();

        let bad = SAMPLE.replace("[1, 2]", "[1]");

        assert!(matches!(
            handler.load_str(&bad),
            Err(Error::Config(ConfigError::StateCountMismatch { .. }))
        ));
    }
}

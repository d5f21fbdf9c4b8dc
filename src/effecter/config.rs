//! `dbus_to_host_effecter.json` parsing.
//!
//! Static configuration binding watched bus properties to state effecters
//! on a remote terminus. Each entry describes one composite effecter; each
//! of its property mappings carries the recognised property values and the
//! effecter states they translate to, position for position.

use crate::bus::PropertyValue;
use crate::error::{ConfigError, Error};
use crate::{Eid, INVALID_EFFECTER_ID};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct EffecterInfoJson {
    #[serde(rename = "effecterID", default)]
    effecter_id: Option<u16>,
    #[serde(rename = "containerID")]
    container_id: u16,
    #[serde(rename = "entityType")]
    entity_type: u16,
    #[serde(rename = "entityInstance")]
    entity_instance: u16,
    #[serde(rename = "compositeEffecterCount")]
    composite_effecter_count: u8,
}

#[derive(Debug, Clone, Deserialize)]
struct DbusInfoJson {
    object_path: String,
    interface: String,
    property_name: String,
    property_type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct StateInfoJson {
    id: u16,
    state_values: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
struct EffecterJson {
    dbus_info: DbusInfoJson,
    property_values: Vec<serde_json::Value>,
    state: StateInfoJson,
}

#[derive(Debug, Clone, Deserialize)]
struct EntryJson {
    mctp_eid: Eid,
    effecter_info: EffecterInfoJson,
    effecters: Vec<EffecterJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileJson {
    entries: Vec<EntryJson>,
}

/// The bus location of one watched property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbusMap {
    /// Object path.
    pub object_path: String,
    /// Interface name.
    pub interface: String,
    /// Property name.
    pub property_name: String,
    /// Property type tag, e.g. `string` or `uint8_t`.
    pub property_type: String,
}

/// One property → effecter-state mapping of a composite effecter.
#[derive(Debug, Clone)]
pub struct PropertyMapping {
    /// Where the property lives.
    pub dbus: DbusMap,
    /// Recognised property values.
    pub property_values: Vec<PropertyValue>,
    /// The state set this offset reports.
    pub state_set_id: u16,
    /// Effecter states, position for position with `property_values`.
    pub state_values: Vec<u8>,
}

impl PropertyMapping {
    /// The effecter state a new property value maps to.
    pub fn state_for(&self, value: &PropertyValue) -> Option<u8> {
        self.property_values
            .iter()
            .position(|candidate| candidate == value)
            .map(|index| self.state_values[index])
    }
}

/// One configured composite effecter on a remote terminus.
#[derive(Debug, Clone)]
pub struct HostEffecterEntry {
    /// Endpoint of the owning terminus.
    pub mctp_eid: Eid,
    /// Effecter id; [`INVALID_EFFECTER_ID`] until resolved against the
    /// repository.
    pub effecter_id: u16,
    /// Container of the controlled entity.
    pub container_id: u16,
    /// Type of the controlled entity.
    pub entity_type: u16,
    /// Instance of the controlled entity.
    pub entity_instance: u16,
    /// One mapping per composite offset.
    pub mappings: Vec<PropertyMapping>,
}

/// Parse the whole config document.
pub fn parse(raw: &str) -> Result<Vec<HostEffecterEntry>, Error> {
    let parsed: FileJson = serde_json::from_str(raw).map_err(|_| ConfigError::Parse)?;

    let mut entries = Vec::with_capacity(parsed.entries.len());

    for entry in parsed.entries {
        // `dbusInfoIndex` indexes the JSON list, which therefore must be
        // exactly the composite dimension of the wire request.
        if entry.effecters.len() != usize::from(entry.effecter_info.composite_effecter_count) {
            return Err(ConfigError::CompositeCountMismatch {
                declared: usize::from(entry.effecter_info.composite_effecter_count),
                present: entry.effecters.len(),
            }
            .into());
        }

        let mut mappings = Vec::with_capacity(entry.effecters.len());

        for effecter in entry.effecters {
            if effecter.property_values.len() != effecter.state.state_values.len() {
                return Err(ConfigError::StateCountMismatch {
                    object_path: effecter.dbus_info.object_path,
                }
                .into());
            }

            let property_values = effecter
                .property_values
                .iter()
                .map(|v| PropertyValue::from_json(&effecter.dbus_info.property_type, v))
                .collect::<Result<Vec<_>, _>>()?;

            mappings.push(PropertyMapping {
                dbus: DbusMap {
                    object_path: effecter.dbus_info.object_path,
                    interface: effecter.dbus_info.interface,
                    property_name: effecter.dbus_info.property_name,
                    property_type: effecter.dbus_info.property_type,
                },
                property_values,
                state_set_id: effecter.state.id,
                state_values: effecter.state.state_values,
            });
        }

        entries.push(HostEffecterEntry {
            mctp_eid: entry.mctp_eid,
            effecter_id: entry.effecter_info.effecter_id.unwrap_or(INVALID_EFFECTER_ID),
            container_id: entry.effecter_info.container_id,
            entity_type: entry.effecter_info.entity_type,
            entity_instance: entry.effecter_info.entity_instance,
            mappings,
        });
    }

    Ok(entries)
}

/// Load `dbus_to_host_effecter.json` from disk.
pub fn load(path: &Path) -> Result<Vec<HostEffecterEntry>, Error> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.kind()))?;

    parse(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) const SAMPLE: &str = r#"{
        "entries": [
            {
                "mctp_eid": 9,
                "effecter_info": {
                    "containerID": 0,
                    "entityType": 33,
                    "entityInstance": 1,
                    "compositeEffecterCount": 1
                },
                "effecters": [
                    {
                        "dbus_info": {
                            "object_path": "/xyz/openbmc_project/control/host0/boot",
                            "interface": "xyz.openbmc_project.Control.Boot.Mode",
                            "property_name": "BootMode",
                            "property_type": "string"
                        },
                        "property_values": [
                            "xyz.openbmc_project.Control.Boot.Mode.Modes.Regular",
                            "xyz.openbmc_project.Control.Boot.Mode.Modes.Setup"
                        ],
                        "state": {
                            "id": 196,
                            "state_values": [1, 2]
                        }
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn parse_sample() {
        let entries = parse(SAMPLE).unwrap();

        assert_eq!(entries.len(), 1);

        let entry = &entries[0];

        assert_eq!(entry.mctp_eid, 9);
        assert_eq!(entry.effecter_id, INVALID_EFFECTER_ID);
        assert_eq!(entry.mappings.len(), 1);
        assert_eq!(
            entry.mappings[0].state_for(&PropertyValue::Str(
                "xyz.openbmc_project.Control.Boot.Mode.Modes.Setup".to_owned()
            )),
            Some(2)
        );
        assert_eq!(
            entry.mappings[0].state_for(&PropertyValue::Str("unknown".to_owned())),
            None
        );
    }

    #[test]
    fn composite_count_mismatch_rejected() {
        let bad = SAMPLE.replace("\"compositeEffecterCount\": 1", "\"compositeEffecterCount\": 2");

        assert!(matches!(
            parse(&bad),
            Err(Error::Config(ConfigError::CompositeCountMismatch {
                declared: 2,
                present: 1
            }))
        ));
    }

    #[test]
    fn state_count_mismatch_rejected() {
        let bad = SAMPLE.replace("[1, 2]", "[1]");

        assert!(matches!(
            parse(&bad),
            Err(Error::Config(ConfigError::StateCountMismatch { .. }))
        ));
    }
}

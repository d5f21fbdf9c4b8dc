//! BMC inventory seeding and entity naming.
//!
//! At start-up the BMC builds its own entity association tree from static
//! configuration; the working tree starts as a copy of it and is mutated by
//! the remote PDR merge. Entity type codes map to the name fragments used to
//! synthesise inventory object paths, e.g. `64 → motherboard`, `135 → cpu`.

use crate::codec::pdr::{AssociationKind, Entity};
use crate::error::{ConfigError, Error};
use crate::pdr::{EntityTree, NodeId};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Entity type code → path name fragment.
pub type EntityMaps = HashMap<u16, String>;

/// The built-in name map, used when no `entity_map.json` overrides it.
pub fn default_entity_maps() -> EntityMaps {
    [
        (45u16, "chassis"),
        (60, "io_board"),
        (64, "motherboard"),
        (66, "dimm"),
        (120, "powersupply"),
        (135, "cpu"),
    ]
    .into_iter()
    .map(|(ty, name)| (ty, name.to_owned()))
    .collect()
}

/// The name fragment for an entity type; logical bit ignored, unknown types
/// fall back to a numeric name.
pub fn entity_name(maps: &EntityMaps, entity_type: u16) -> String {
    let ty = entity_type & !Entity::LOGICAL_BIT;

    maps.get(&ty)
        .cloned()
        .unwrap_or_else(|| format!("entity{}", ty))
}

/// Load `entity_map.json`: an object of type code strings to names.
pub fn parse_entity_map(path: &Path) -> Result<EntityMaps, Error> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Read(e.kind()))?;

    let parsed: HashMap<String, String> =
        serde_json::from_str(&raw).map_err(|_| ConfigError::Parse)?;

    let mut maps = EntityMaps::new();
    for (key, name) in parsed {
        let ty: u16 = key.parse().map_err(|_| ConfigError::Parse)?;
        maps.insert(ty, name);
    }

    Ok(maps)
}

/// One entry of the static inventory description.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryEntry {
    /// Entity type code.
    pub entity_type: u16,
    /// How many instances to create.
    #[serde(default = "one")]
    pub count: u16,
    /// Entity type of the parent; absent for roots.
    #[serde(default)]
    pub parent_type: Option<u16>,
    /// Containment kind; physical unless stated.
    #[serde(default)]
    pub logical: bool,
}

fn one() -> u16 {
    1
}

/// The static inventory description the BMC tree is seeded from.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    /// Entries in insertion order; parents must precede children.
    pub entities: Vec<InventoryEntry>,
}

impl InventoryConfig {
    /// Load from a `host_frus.json` style file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(e.kind()))?;

        serde_json::from_str(&raw).map_err(|_| ConfigError::Parse.into())
    }

    /// Build the BMC entity tree this config describes.
    pub fn build_tree(&self) -> Result<EntityTree, Error> {
        let mut tree = EntityTree::new();
        let mut first_of_type: HashMap<u16, NodeId> = HashMap::new();

        for entry in &self.entities {
            let parent = match entry.parent_type {
                Some(ty) => Some(
                    *first_of_type
                        .get(&ty)
                        .ok_or(Error::Config(ConfigError::Missing("parent_type")))?,
                ),
                None => None,
            };

            let kind = if entry.logical {
                AssociationKind::Logical
            } else {
                AssociationKind::Physical
            };

            for _ in 0..entry.count {
                let node = tree.add(
                    Entity::new(entry.entity_type, Entity::AUTO_INSTANCE, 0),
                    Entity::AUTO_INSTANCE,
                    parent,
                    kind,
                    true,
                )?;

                first_of_type.entry(entry.entity_type).or_insert(node);
            }
        }

        Ok(tree)
    }
}

/// Synthesise an inventory object path for every node: the parent chain's
/// name fragments joined under the system root, instance numbers appended.
pub fn entity_object_paths(tree: &EntityTree, maps: &EntityMaps) -> Vec<(String, Entity)> {
    const ROOT: &str = "/xyz/openbmc_project/inventory/system";

    let mut out = Vec::with_capacity(tree.len());

    for node in tree.visit_nodes() {
        let mut segments = Vec::new();
        let mut at = Some(node);

        while let Some(id) = at {
            let entity = tree.entity_at(id);

            segments.push(format!(
                "{}{}",
                entity_name(maps, entity.entity_type),
                entity.entity_instance
            ));
            at = tree.parent(id);
        }

        segments.reverse();

        out.push((
            format!("{}/{}", ROOT, segments.join("/")),
            tree.entity_at(node),
        ));
    }

    out
}

/// Seed the repository from the BMC's own tree: a terminus locator PDR for
/// ourselves, one entity association PDR per non-leaf node and kind, and a
/// FRU record set PDR per entity. Returns the matching FRU record table.
pub fn seed_bmc_repo(
    repo: &mut crate::pdr::PdrRepo,
    tree: &EntityTree,
    maps: &EntityMaps,
    terminus_handle: u16,
    tid: crate::Tid,
    eid: crate::Eid,
) -> Result<Vec<u8>, Error> {
    use crate::codec::fru::{
        build_fru_record_table, FruField, FruRecord, FRU_FIELD_TYPE_NAME, FRU_RECORD_TYPE_GENERAL,
    };
    use crate::codec::pdr::TerminusLocatorPdr;

    repo.add(
        TerminusLocatorPdr::mctp(terminus_handle, tid, eid).to_record(),
        false,
        terminus_handle,
        0,
    )?;

    tree.emit_association_pdrs(repo, terminus_handle, false)?;

    let mut fru_records = Vec::new();

    for (rsi, node) in tree.visit_nodes().into_iter().enumerate() {
        let rsi = (rsi + 1) as u16;
        let entity = tree.entity_at(node);

        repo.add_fru_record_set(terminus_handle, rsi, entity, 0)?;

        fru_records.push(FruRecord {
            record_set_id: rsi,
            record_type: FRU_RECORD_TYPE_GENERAL,
            encoding: 1,
            fields: vec![FruField {
                field_type: FRU_FIELD_TYPE_NAME,
                value: format!(
                    "{}{}",
                    entity_name(maps, entity.entity_type),
                    entity.entity_instance
                )
                .into_bytes(),
            }],
        });
    }

    Ok(build_fru_record_table(&fru_records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> InventoryConfig {
        serde_json::from_str(
            r#"{
                "entities": [
                    { "entity_type": 64 },
                    { "entity_type": 135, "count": 2, "parent_type": 64 },
                    { "entity_type": 66, "count": 2, "parent_type": 64 }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_tree_with_auto_instances() {
        let tree = sample().build_tree().unwrap();

        assert_eq!(
            tree.visit(),
            vec![
                Entity::new(64, 1, 0),
                Entity::new(135, 1, 1),
                Entity::new(135, 2, 1),
                Entity::new(66, 1, 1),
                Entity::new(66, 2, 1),
            ]
        );
    }

    #[test]
    fn object_paths_follow_parent_chain() {
        let tree = sample().build_tree().unwrap();
        let maps = default_entity_maps();

        let paths = entity_object_paths(&tree, &maps);

        assert_eq!(
            paths[0].0,
            "/xyz/openbmc_project/inventory/system/motherboard1"
        );
        assert_eq!(
            paths[1].0,
            "/xyz/openbmc_project/inventory/system/motherboard1/cpu1"
        );
        assert_eq!(paths[1].1, Entity::new(135, 1, 1));
    }

    #[test]
    fn unknown_entity_type_gets_numeric_name() {
        let maps = default_entity_maps();

        assert_eq!(entity_name(&maps, 135), "cpu");
        assert_eq!(entity_name(&maps, 0x8000 | 304), "entity304");
    }

    #[test]
    fn seeding_produces_locator_associations_and_fru_sets() {
        let tree = sample().build_tree().unwrap();
        let maps = default_entity_maps();

        let mut repo = crate::pdr::PdrRepo::new();

        let table = seed_bmc_repo(&mut repo, &tree, &maps, 1, 1, 8).unwrap();

        use crate::codec::pdr::PdrType;

        assert_eq!(repo.records_of_type(PdrType::TerminusLocator).len(), 1);
        assert_eq!(repo.records_of_type(PdrType::EntityAssociation).len(), 1);
        assert_eq!(repo.records_of_type(PdrType::FruRecordSet).len(), 5);

        let records = crate::codec::fru::parse_fru_record_table(&table).unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(records[0].fields[0].value, b"motherboard1".to_vec());
    }

    #[test]
    fn missing_parent_is_a_config_error() {
        let config: InventoryConfig = serde_json::from_str(
            r#"{ "entities": [ { "entity_type": 135, "parent_type": 64 } ] }"#,
        )
        .unwrap();

        assert!(matches!(
            config.build_tree(),
            Err(Error::Config(ConfigError::Missing("parent_type")))
        ));
    }
}

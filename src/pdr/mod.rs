//! The PDR repository and the entity association tree.

mod inventory;
mod repo;
mod tree;

pub use inventory::{
    default_entity_maps, entity_name, entity_object_paths, parse_entity_map, seed_bmc_repo,
    EntityMaps, InventoryConfig, InventoryEntry,
};
pub use repo::{FoundRecord, PdrRepo, RepoInfo};
pub use tree::{EntityTree, NodeId};

pub use crate::codec::pdr::{AssociationKind, Entity};

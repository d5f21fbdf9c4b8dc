//! The effecter write pipeline.
//!
//! Property changes on the bus resolve to PLDM state or numeric effecter
//! writes on the remote terminus; numeric effecters additionally carry a
//! user-facing control surface with validated ranges.

pub mod config;
mod host_effecters;
mod numeric;
mod plugin;
mod power_cap;
mod registry;

pub use host_effecters::HostEffecterManager;
pub use numeric::{availability, NumericEffecter, ValueObserver};
pub use plugin::{OemPlatformPlugin, PluginRegistry, PowerCapPlugin};
pub use power_cap::PowerCapInterface;
pub use registry::{EffecterRegistry, NumericEffecterEntry, StateEffecterEntry};

use crate::bus::PlatformBus;
use crate::codec::pdr::{NumericEffecterPdr, PdrType};
use crate::engine::Engine;
use crate::mctp::MctpTransport;
use crate::pdr::PdrRepo;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Builds [`NumericEffecter`]s for the remote numeric effecter PDRs in the
/// repository and offers each to the plugin registry. Idempotent per
/// effecter id.
pub struct NumericEffecterManager<T: MctpTransport + 'static> {
    engine: Rc<Engine<T>>,
    bus: Rc<dyn PlatformBus>,
    repo: Rc<RefCell<PdrRepo>>,
    plugins: Rc<PluginRegistry<T>>,
    effecters: RefCell<HashMap<u16, Rc<NumericEffecter<T>>>>,
}

impl<T: MctpTransport + 'static> NumericEffecterManager<T> {
    /// A manager creating effecters through `plugins`.
    pub fn new(
        engine: Rc<Engine<T>>,
        bus: Rc<dyn PlatformBus>,
        repo: Rc<RefCell<PdrRepo>>,
        plugins: Rc<PluginRegistry<T>>,
    ) -> Self {
        Self {
            engine,
            bus,
            repo,
            plugins,
            effecters: RefCell::new(HashMap::new()),
        }
    }

    /// Scan the repository for remote numeric effecter PDRs and create an
    /// effecter for each new one. `path_for` resolves the controlled
    /// entity's inventory path.
    pub fn rescan(&self, eid: crate::Eid, path_for: impl Fn(crate::pdr::Entity) -> Option<String>) {
        let pdrs: Vec<NumericEffecterPdr> = {
            let repo = self.repo.borrow();

            repo.records_of_type(PdrType::NumericEffecter)
                .into_iter()
                .filter(|found| found.remote)
                .filter_map(|found| NumericEffecterPdr::from_record(found.data).ok())
                .collect()
        };

        for pdr in pdrs {
            if self.effecters.borrow().contains_key(&pdr.effecter_id) {
                continue;
            }

            let Some(path) = path_for(pdr.entity) else {
                log::debug!(
                    "no inventory path for numeric effecter {} entity {:?}",
                    pdr.effecter_id,
                    pdr.entity
                );

                continue;
            };

            let effecter = NumericEffecter::new(
                Rc::clone(&self.engine),
                Rc::clone(&self.bus),
                eid,
                path,
                pdr,
            );

            self.plugins.offer(&effecter);
            self.effecters
                .borrow_mut()
                .insert(effecter.effecter_id(), effecter);
        }
    }

    /// The effecter created for `effecter_id`, if any.
    pub fn get(&self, effecter_id: u16) -> Option<Rc<NumericEffecter<T>>> {
        self.effecters.borrow().get(&effecter_id).cloned()
    }

    /// Drop every created effecter, e.g. on host power-off.
    pub fn clear(&self) {
        self.effecters.borrow_mut().clear();
    }
}

//! The property-driven state effecter write path.
//!
//! Watches the configured bus properties; when one changes, maps the new
//! value to an effecter state, gates on host boot progress, and fires a
//! `SetStateEffecterStates` at the owning terminus. The write is an async
//! request notify; the response is only logged.

use super::config::HostEffecterEntry;
use crate::bus::{self, PlatformBus, PropertySource, PropertyValue};
use crate::codec::pdr::Entity;
use crate::codec::platform::{SetStateEffecterStates, StateField};
use crate::codec::{self, Msg};
use crate::engine::Engine;
use crate::mctp::MctpTransport;
use crate::pdr::PdrRepo;
use crate::INVALID_EFFECTER_ID;
use smol::LocalExecutor;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// The manager owning every configured host effecter mapping.
pub struct HostEffecterManager<T: MctpTransport + 'static> {
    engine: Rc<Engine<T>>,
    executor: Rc<LocalExecutor<'static>>,
    bus: Rc<dyn PlatformBus>,
    repo: Rc<RefCell<PdrRepo>>,
    entries: RefCell<Vec<HostEffecterEntry>>,
    weak_self: Weak<Self>,
}

impl<T: MctpTransport + 'static> HostEffecterManager<T> {
    /// A manager over the parsed config entries.
    pub fn new(
        engine: Rc<Engine<T>>,
        executor: Rc<LocalExecutor<'static>>,
        bus: Rc<dyn PlatformBus>,
        repo: Rc<RefCell<PdrRepo>>,
        entries: Vec<HostEffecterEntry>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            engine,
            executor,
            bus,
            repo,
            entries: RefCell::new(entries),
            weak_self: weak_self.clone(),
        })
    }

    fn strong(&self) -> Rc<Self> {
        self.weak_self
            .upgrade()
            .expect("self reference outlives the manager")
    }

    /// Number of configured entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether any entries are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Install a properties-changed subscription per configured mapping.
    pub fn subscribe(&self) {
        let entries = self.entries.borrow();

        for (entry_index, entry) in entries.iter().enumerate() {
            for (mapping_index, mapping) in entry.mappings.iter().enumerate() {
                let manager = self.strong();
                let property_name = mapping.dbus.property_name.clone();

                self.bus.watch(
                    &mapping.dbus.object_path,
                    &mapping.dbus.interface,
                    Box::new(move |name, value| {
                        if name == property_name {
                            manager.on_property_changed(entry_index, mapping_index, value);
                        }
                    }),
                );
            }
        }
    }

    /// Whether the host has booted far enough for effecter writes.
    fn host_accepts_writes(&self) -> bool {
        let Some(progress) = self.bus.get_property(
            bus::HOST_STATE_PATH,
            bus::BOOT_PROGRESS_IFACE,
            bus::PROP_BOOT_PROGRESS,
        ) else {
            // Progress unknown: log and carry on with the write, matching
            // the tolerant treatment of a missing boot progress host.
            log::error!("boot progress unavailable; attempting effecter write anyway");

            return true;
        };

        progress
            .as_str()
            .map(|stage| bus::BOOT_PROGRESS_WRITABLE_STAGES.contains(&stage))
            .unwrap_or(false)
    }

    fn on_property_changed(
        &self,
        entry_index: usize,
        mapping_index: usize,
        value: &PropertyValue,
    ) {
        let (eid, effecter_id, composite_count, new_state) = {
            let mut entries = self.entries.borrow_mut();
            let entry = &mut entries[entry_index];

            let Some(new_state) = entry.mappings[mapping_index].state_for(value) else {
                log::error!(
                    "value {:?} for {} not in configured set",
                    value,
                    entry.mappings[mapping_index].dbus.property_name
                );

                return;
            };

            if entry.effecter_id == INVALID_EFFECTER_ID {
                entry.effecter_id = self.repo.borrow().find_state_effecter_id(
                    Entity {
                        entity_type: entry.entity_type,
                        entity_instance: entry.entity_instance,
                        container_id: entry.container_id,
                    },
                    entry.mappings[mapping_index].state_set_id,
                    true,
                );

                if entry.effecter_id == INVALID_EFFECTER_ID {
                    log::error!(
                        "no state effecter for entity type {} instance {} container {} state set {}",
                        entry.entity_type,
                        entry.entity_instance,
                        entry.container_id,
                        entry.mappings[mapping_index].state_set_id
                    );

                    return;
                }
            }

            (
                entry.mctp_eid,
                entry.effecter_id,
                entry.mappings.len(),
                new_state,
            )
        };

        if !self.host_accepts_writes() {
            log::info!("host not ready; skipping state effecter write");

            return;
        }

        // Composite request: only the changed offset carries a set-request.
        let mut fields = heapless::Vec::new();

        for index in 0..composite_count {
            let field = if index == mapping_index {
                StateField::set(new_state)
            } else {
                StateField::NO_CHANGE
            };

            if fields.push(field).is_err() {
                log::error!("composite effecter count exceeds the wire limit");

                return;
            }
        }

        let manager = self.strong();

        self.executor
            .spawn(async move {
                manager
                    .send_set_state_effecter(eid, effecter_id, fields)
                    .await;
            })
            .detach();
    }

    async fn send_set_state_effecter(
        &self,
        eid: crate::Eid,
        effecter_id: u16,
        fields: heapless::Vec<StateField, { crate::codec::platform::MAX_COMPOSITE_COUNT }>,
    ) {
        let instance_id = match self.engine.next_instance_id(eid) {
            Ok(id) => id,
            Err(e) => {
                log::error!("no instance id for effecter write to eid {}: {}", eid, e);

                return;
            }
        };

        let req = codec::async_request(
            instance_id,
            &SetStateEffecterStates {
                effecter_id,
                fields,
            },
        );

        let result = self
            .engine
            .register_request(
                eid,
                &req,
                Box::new(move |eid, resp| match resp {
                    Some(resp) => match Msg::parse(resp).and_then(|m| m.split_completion()) {
                        Ok((cc, _)) if cc.is_success() => {}
                        Ok((cc, _)) => log::error!(
                            "SetStateEffecterStates({}) rejected by eid {}: {}",
                            effecter_id,
                            eid,
                            cc
                        ),
                        Err(e) => log::error!("undecodable effecter write response: {}", e),
                    },
                    None => log::error!(
                        "SetStateEffecterStates({}) to eid {} got no response",
                        effecter_id,
                        eid
                    ),
                }),
            )
            .await;

        if let Err(e) = result {
            log::error!("failed to send effecter write to eid {}: {}", eid, e);
        }
    }
}

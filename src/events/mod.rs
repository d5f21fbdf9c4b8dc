//! `PlatformEventMessage` ingest and emission.

mod config;

pub use config::StateSensorHandler;

use crate::bus::PlatformBus;
use crate::codec::event_data::{
    ChgEventOperation, PdrRepositoryChgEvent, SensorEvent,
};
use crate::codec::platform::{EventClass, PlatformEventMessage};
use crate::host::SensorMap;
use pldm_wire::PldmWireRead;
use std::cell::RefCell;
use std::rc::Rc;

/// Sink for PDR repository change deltas; the host synchronizer installs
/// itself here so the responder path needs no direct reference to it.
pub type RepoChgSink = Box<dyn Fn(Vec<u32>)>;

/// Routes received platform events to their handlers.
pub struct EventManager {
    bus: Rc<dyn PlatformBus>,
    sensor_map: Rc<RefCell<SensorMap>>,
    actions: Rc<StateSensorHandler>,
    repo_chg_sink: RefCell<Option<RepoChgSink>>,
}

impl EventManager {
    /// A manager reacting through `bus` per the loaded `actions`.
    pub fn new(
        bus: Rc<dyn PlatformBus>,
        sensor_map: Rc<RefCell<SensorMap>>,
        actions: Rc<StateSensorHandler>,
    ) -> Self {
        Self {
            bus,
            sensor_map,
            actions,
            repo_chg_sink: RefCell::new(None),
        }
    }

    /// Install the sink invoked with added/modified record handles whenever
    /// a `PDRRepositoryChgEvent` arrives.
    pub fn set_repo_chg_sink(&self, sink: RepoChgSink) {
        *self.repo_chg_sink.borrow_mut() = Some(sink);
    }

    /// Handle a received `PlatformEventMessage`. Unsupported classes are
    /// acknowledged and otherwise ignored.
    pub fn handle(&self, event: &PlatformEventMessage) {
        match event.event_class {
            EventClass::Sensor => match SensorEvent::unpack_from_slice(&event.event_data) {
                Ok(sensor_event) => self.handle_sensor_event(event.tid, &sensor_event),
                Err(e) => log::error!("undecodable sensor event from tid {}: {}", event.tid, e),
            },
            EventClass::PdrRepositoryChg => {
                match PdrRepositoryChgEvent::unpack_from_slice(&event.event_data) {
                    Ok(chg) => self.handle_repo_chg(&chg),
                    Err(e) => {
                        log::error!("undecodable repository change event: {}", e)
                    }
                }
            }
            EventClass::Effecter => {
                log::debug!("effecter event from tid {} ignored", event.tid)
            }
            EventClass::Other(class) => {
                log::debug!("event class {:#04x} from tid {} ignored", class, event.tid)
            }
        }
    }

    fn handle_sensor_event(&self, tid: crate::Tid, event: &SensorEvent) {
        let SensorEvent::StateSensorState {
            sensor_id,
            sensor_offset,
            event_state,
            ..
        } = *event
        else {
            log::debug!("non-state sensor event from tid {} ignored", tid);

            return;
        };

        // The map borrow must not be held while actions run; an action may
        // write a property whose watcher reaches back into this state.
        let (entity, state_set_id) = {
            let sensor_map = self.sensor_map.borrow();

            let Some(entry) = sensor_map.get(tid, sensor_id) else {
                log::error!("event for unknown sensor {} of tid {}", sensor_id, tid);

                return;
            };

            // A reading whose offset is outside the PDR's composite array
            // is logged and skipped, never grown.
            let Some(state_set) = entry.state_sets.get(usize::from(sensor_offset)) else {
                log::error!(
                    "sensor {} of tid {} has no composite offset {}",
                    sensor_id,
                    tid,
                    sensor_offset
                );

                return;
            };

            if !state_set.possible_states.contains(&event_state) {
                log::debug!(
                    "sensor {} of tid {} reported out-of-set state {}",
                    sensor_id,
                    tid,
                    event_state
                );
            }

            (entry.entity, state_set.state_set_id)
        };

        self.actions
            .event_action(self.bus.as_ref(), entity, state_set_id, sensor_offset, event_state);
    }

    fn handle_repo_chg(&self, event: &PdrRepositoryChgEvent) {
        let mut handles = Vec::new();

        for record in &event.records {
            match record.operation {
                ChgEventOperation::RecordsAdded | ChgEventOperation::RecordsModified => {
                    handles.extend_from_slice(&record.entries)
                }
                ChgEventOperation::RecordsDeleted => {
                    log::debug!("deleted records {:?} ignored", record.entries)
                }
                ChgEventOperation::Refresh => handles.push(0),
            }
        }

        if handles.is_empty() {
            return;
        }

        match &*self.repo_chg_sink.borrow() {
            Some(sink) => sink(handles),
            None => log::warn!("repository change event with no synchronizer attached"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{LocalBus, PropertyValue};
    use crate::codec::pdr::{Entity, PossibleStates, StateSensorPdr};
    use pretty_assertions::assert_eq;

    fn sample_manager() -> (EventManager, Rc<LocalBus>) {
        let bus = Rc::new(LocalBus::new());
        let sensor_map = Rc::new(RefCell::new(SensorMap::new()));

        sensor_map.borrow_mut().insert_pdr(
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

        let mut actions = StateSensorHandler::default();
        actions
            .load_str(
                r#"{
                    "entries": [{
                        "sensor_entry": {
                            "containerID": 1,
                            "entityType": 135,
                            "entityInstance": 1,
                            "sensorOffset": 0
                        },
                        "dbus": {
                            "object_path": "/xyz/openbmc_project/state/cpu1",
                            "interface": "xyz.openbmc_project.State.Processor",
                            "property_name": "CurrentState",
                            "property_type": "string"
                        },
                        "event_states": [1, 2],
                        "property_values": ["Off", "On"]
                    }]
                }"#,
            )
            .unwrap();

        (
            EventManager::new(Rc::clone(&bus), sensor_map, Rc::new(actions)),
            bus,
        )
    }

    #[test]
    fn state_sensor_event_drives_action() {
        let (manager, bus) = sample_manager();

        let mut data = [0u8; 6];
        let event = SensorEvent::state(0x00A1, 0, 2, 1);
        pldm_wire::PldmWireWrite::pack_to_slice(&event, &mut data).unwrap();

        manager.handle(&PlatformEventMessage {
            format_version: 1,
            tid: 2,
            event_class: EventClass::Sensor,
            event_data: data.to_vec(),
        });

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
    fn out_of_range_offset_is_dropped() {
        let (manager, bus) = sample_manager();

        let mut data = [0u8; 6];
        let event = SensorEvent::state(0x00A1, 3, 2, 1);
        pldm_wire::PldmWireWrite::pack_to_slice(&event, &mut data).unwrap();

        manager.handle(&PlatformEventMessage {
            format_version: 1,
            tid: 2,
            event_class: EventClass::Sensor,
            event_data: data.to_vec(),
        });

        assert!(bus
            .get_property(
                "/xyz/openbmc_project/state/cpu1",
                "xyz.openbmc_project.State.Processor",
                "CurrentState"
            )
            .is_none());
    }

    #[test]
    fn repo_chg_event_feeds_sink() {
        let (manager, _) = sample_manager();

        let received = Rc::new(RefCell::new(Vec::new()));

        {
            let received = Rc::clone(&received);
            manager.set_repo_chg_sink(Box::new(move |handles| {
                received.borrow_mut().extend(handles);
            }));
        }

        let chg = PdrRepositoryChgEvent::records_added(vec![0x20, 0x21]);

        let mut data = vec![0u8; 32];
        let packed = pldm_wire::PldmWireWrite::pack_to_slice(&chg, &mut data)
            .unwrap()
            .to_vec();

        manager.handle(&PlatformEventMessage {
            format_version: 1,
            tid: 2,
            event_class: EventClass::PdrRepositoryChg,
            event_data: packed,
        });

        assert_eq!(*received.borrow(), vec![0x20, 0x21]);
    }
}

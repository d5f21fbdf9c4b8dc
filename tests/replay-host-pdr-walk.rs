//! Replays a full host PDR walk against a scripted terminus: probe, GetPDR
//! chain, entity association merge, sensor map hydration, FRU location
//! codes, the repository change event, the sensor read sweep, delta
//! fetches, and the host-off teardown.

mod util;

use pldm::bus::{self, LocalBus, PlatformBus, PropertyValue};
use pldm::codec::event_data::PdrRepositoryChgEvent;
use pldm::codec::pdr::{
    AssociationKind, BaseUnit, EffecterDataSize, EffecterOperState, EffecterValue, Entity,
    EntityAssociationPdr, FruRecordSetPdr, NumericEffecterPdr, PdrType, PossibleStates,
    StateSensorPdr, TerminusLocatorPdr,
};
use pldm::codec::platform::{
    self, EventClass, PlatformEventMessage, SensorStateField,
};
use pldm::codec::{self, PldmType};
use pldm::engine::{Engine, Timeouts};
use pldm::events::{EventManager, StateSensorHandler};
use pldm::host::{HostPdrSync, SensorMap};
use pldm::pdr::{default_entity_maps, seed_bmc_repo, EntityTree, InventoryConfig, PdrRepo};
use pldm::responder::Responder;
use pldm_wire::PldmWireWrite;
use smol::LocalExecutor;
use std::cell::RefCell;
use std::rc::Rc;
use util::{wait_until, HostSim, SimNumericEffecter};

const HOST_EID: u8 = 9;
const HOST_TERMINUS: u16 = 2;
const HOST_TID: u8 = 2;
const HOST_CONTAINER: u16 = 0x20;

// Contiguous handles in the host's reserved range: the walk derives each
// record's handle from the successor the response names.
const TL_HANDLE: u32 = 0x0100_0001;
const EA_HANDLE: u32 = 0x0100_0002;
const SENSOR_HANDLE: u32 = 0x0100_0003;
const FRU_RS_HANDLE: u32 = 0x0100_0004;
const NUMERIC_HANDLE: u32 = 0x0100_0005;

const CPU: Entity = Entity {
    entity_type: 135,
    entity_instance: 1,
    container_id: HOST_CONTAINER,
};

const LOCATION_CODE: &str = "U78DA.ND0.1234567-P0-C15";

fn with_handle(mut record: Vec<u8>, handle: u32) -> Vec<u8> {
    record[0..4].copy_from_slice(&handle.to_le_bytes());

    record
}

fn host_records() -> Vec<Vec<u8>> {
    let locator = TerminusLocatorPdr::mctp(HOST_TERMINUS, HOST_TID, HOST_EID);

    let association = EntityAssociationPdr {
        container_id: HOST_CONTAINER,
        association_type: AssociationKind::Physical,
        container: Entity::new(64, 1, 0),
        children: vec![CPU],
    };

    let sensor = StateSensorPdr {
        terminus_handle: HOST_TERMINUS,
        sensor_id: 0x00A1,
        entity: CPU,
        sensor_init: 0,
        has_aux_names: false,
        sensors: vec![PossibleStates {
            state_set_id: 196,
            states: vec![0b0110],
        }],
    };

    let fru_record_set = FruRecordSetPdr {
        terminus_handle: HOST_TERMINUS,
        fru_rsi: 100,
        entity: CPU,
    };

    let numeric = NumericEffecterPdr {
        terminus_handle: HOST_TERMINUS,
        effecter_id: 3,
        entity: CPU,
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
    };

    vec![
        with_handle(locator.to_record(), TL_HANDLE),
        with_handle(association.to_record(), EA_HANDLE),
        with_handle(sensor.to_record(), SENSOR_HANDLE),
        with_handle(fru_record_set.to_record(), FRU_RS_HANDLE),
        with_handle(numeric.to_record(), NUMERIC_HANDLE),
    ]
}

const EVENT_ACTIONS: &str = r#"{
    "entries": [{
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
    }]
}"#;

struct Stack {
    sim: Rc<HostSim>,
    executor: Rc<LocalExecutor<'static>>,
    bus: Rc<LocalBus>,
    repo: Rc<RefCell<PdrRepo>>,
    tree: Rc<RefCell<EntityTree>>,
    bmc_tree: Rc<RefCell<EntityTree>>,
    sensor_map: Rc<RefCell<SensorMap>>,
    sync: Rc<HostPdrSync<Rc<HostSim>>>,
    responder: Rc<Responder>,
}

fn build_stack() -> Stack {
    let _ = env_logger::builder().is_test(true).try_init();

    let sim = Rc::new(HostSim::new());

    *sim.records.borrow_mut() = host_records();

    sim.sensor_readings.borrow_mut().insert(
        0x00A1,
        vec![SensorStateField {
            sensor_op_state: 0,
            present_state: 2,
            previous_state: 1,
            event_state: 2,
        }],
    );

    sim.numeric_effecters.borrow_mut().insert(
        3,
        SimNumericEffecter {
            oper_state: EffecterOperState::EnabledNoUpdatePending,
            pending: EffecterValue::U16(250),
            present: EffecterValue::U16(250),
        },
    );

    *sim.fru_table.borrow_mut() = pldm::codec::fru::build_fru_record_table(&[
        pldm::codec::fru::FruRecord {
            record_set_id: 100,
            record_type: pldm::codec::fru::FRU_RECORD_TYPE_OEM,
            encoding: 1,
            fields: vec![pldm::codec::fru::FruField {
                field_type: pldm::codec::fru::FRU_FIELD_TYPE_LOCATION_CODE,
                value: LOCATION_CODE.as_bytes().to_vec(),
            }],
        },
    ]);

    let bus = Rc::new(LocalBus::new());
    let bus_dyn: Rc<dyn PlatformBus> = Rc::clone(&bus);

    let config: InventoryConfig =
        serde_json::from_str(r#"{ "entities": [ { "entity_type": 64 } ] }"#).unwrap();

    let bmc_tree_inner = config.build_tree().unwrap();

    let mut repo_inner = PdrRepo::new();

    seed_bmc_repo(
        &mut repo_inner,
        &bmc_tree_inner,
        &default_entity_maps(),
        pldm::BMC_TERMINUS_HANDLE,
        pldm::host::BMC_TID,
        8,
    )
    .unwrap();

    let local_count = repo_inner.count();
    assert_eq!(local_count, 2); // locator + motherboard FRU record set

    let repo = Rc::new(RefCell::new(repo_inner));

    let mut tree_inner = EntityTree::new();
    tree_inner.copy_from(&bmc_tree_inner);

    let tree = Rc::new(RefCell::new(tree_inner));
    let bmc_tree = Rc::new(RefCell::new(bmc_tree_inner));
    let sensor_map = Rc::new(RefCell::new(SensorMap::new()));

    let mut actions = StateSensorHandler::default();
    actions.load_str(EVENT_ACTIONS).unwrap();
    let actions = Rc::new(actions);

    let events = Rc::new(EventManager::new(
        Rc::clone(&bus_dyn),
        Rc::clone(&sensor_map),
        Rc::clone(&actions),
    ));

    let responder = Responder::new(
        pldm::host::BMC_TID,
        Rc::clone(&repo),
        Rc::new(RefCell::new(pldm::effecter::EffecterRegistry::new())),
        Rc::clone(&events),
    );

    let engine = Rc::new(Engine::new(Rc::clone(&sim), Timeouts::default()));
    let executor = Rc::new(LocalExecutor::new());

    let sync = HostPdrSync::new(
        Rc::clone(&engine),
        Rc::clone(&executor),
        Rc::clone(&bus_dyn),
        Rc::clone(&repo),
        Rc::clone(&tree),
        Rc::clone(&bmc_tree),
        Rc::clone(&sensor_map),
        actions,
        default_entity_maps(),
        HOST_EID,
    );

    sync.attach(&events);

    {
        let engine = Rc::clone(&engine);
        let responder = Rc::clone(&responder);

        executor
            .spawn(async move {
                let _ = engine.run(move |eid, msg| responder.handle(eid, msg)).await;
            })
            .detach();
    }

    Stack {
        sim,
        executor,
        bus,
        repo,
        tree,
        bmc_tree,
        sensor_map,
        sync,
        responder,
    }
}

fn run_initial_walk(stack: &Stack) {
    let executor = Rc::clone(&stack.executor);
    let sync = Rc::clone(&stack.sync);
    let repo = Rc::clone(&stack.repo);

    smol::block_on(executor.run(async move {
        assert!(sync.probe().await);

        sync.fetch_pdrs(Vec::new(), false);

        wait_until(|| repo.borrow().find(NUMERIC_HANDLE).is_some()).await;
        wait_until(|| sync.is_idle()).await;
    }));
}

#[test]
fn full_walk_merges_and_publishes() {
    let stack = build_stack();

    run_initial_walk(&stack);

    // One GetPDR per host record.
    assert_eq!(
        stack.sim.sent_count(PldmType::Platform, platform::GET_PDR),
        5
    );

    // The cpu was merged under the motherboard: local container assigned,
    // host container remembered.
    {
        let tree = stack.tree.borrow();

        let node = tree.find(CPU, true).expect("merged cpu node");

        assert_eq!(tree.entity_at(node).container_id, 1);
        assert_eq!(tree.host_container_at(node), HOST_CONTAINER);
    }

    {
        let repo = stack.repo.borrow();

        // The reserved-range association record kept its host handle.
        assert_eq!(repo.is_remote(EA_HANDLE), Some(true));

        // The merged association PDR was re-emitted with a fresh handle.
        let merged = repo
            .records_of_type(PdrType::EntityAssociation)
            .into_iter()
            .find(|r| r.handle != EA_HANDLE)
            .expect("merged association record");

        assert!(merged.remote);

        // Sensor and effecter records carry the local container id now.
        let sensor = repo.find(SENSOR_HANDLE).unwrap();
        let parsed = StateSensorPdr::from_record(sensor.data).unwrap();

        assert_eq!(parsed.entity.container_id, 1);
    }

    // Sensor map hydrated with the host tid.
    assert_eq!(
        stack
            .sensor_map
            .borrow()
            .get(HOST_TID, 0x00A1)
            .unwrap()
            .entity
            .container_id,
        1
    );

    // The change event for the merged associations went to the host.
    assert_eq!(
        stack
            .sim
            .sent_count(PldmType::Platform, platform::PLATFORM_EVENT_MESSAGE),
        1
    );

    // The sensor sweep drove the configured action with the present state.
    assert_eq!(
        stack.bus.get_property(
            "/xyz/openbmc_project/state/cpu1",
            "xyz.openbmc_project.State.Processor",
            "CurrentState"
        ),
        Some(PropertyValue::Str("On".to_owned()))
    );

    // Inventory and the OEM location code were published.
    let cpu_path = "/xyz/openbmc_project/inventory/system/motherboard1/cpu1";

    assert!(stack.bus.has_object(cpu_path));
    assert_eq!(
        stack
            .bus
            .get_property(cpu_path, bus::LOCATION_CODE_IFACE, bus::PROP_LOCATION_CODE),
        Some(PropertyValue::Str(LOCATION_CODE.to_owned()))
    );
    assert_eq!(
        stack
            .bus
            .get_property(cpu_path, bus::OPERATIONAL_STATUS_IFACE, bus::PROP_FUNCTIONAL),
        Some(PropertyValue::Bool(true))
    );
}

#[test]
fn second_full_walk_stops_at_known_terminus_locator() {
    let stack = build_stack();

    run_initial_walk(&stack);

    let walked = stack.sim.sent_count(PldmType::Platform, platform::GET_PDR);

    let executor = Rc::clone(&stack.executor);
    let sync = Rc::clone(&stack.sync);

    smol::block_on(executor.run(async move {
        sync.fetch_pdrs(Vec::new(), false);

        wait_until(|| sync.is_idle()).await;
    }));

    // The locator was already known with the same validity: the walk
    // stopped after one request.
    assert_eq!(
        stack.sim.sent_count(PldmType::Platform, platform::GET_PDR),
        walked + 1
    );
}

#[test]
fn repository_change_event_triggers_delta_fetch() {
    let stack = build_stack();

    run_initial_walk(&stack);

    const NEW_SENSOR_HANDLE: u32 = 0x0100_0006;

    // The host grows a second sensor and announces it.
    stack.sim.records.borrow_mut().push(with_handle(
        StateSensorPdr {
            terminus_handle: HOST_TERMINUS,
            sensor_id: 0x00A2,
            entity: CPU,
            sensor_init: 0,
            has_aux_names: false,
            sensors: vec![PossibleStates {
                state_set_id: 196,
                states: vec![0b0110],
            }],
        }
        .to_record(),
        NEW_SENSOR_HANDLE,
    ));

    stack.sim.sensor_readings.borrow_mut().insert(
        0x00A2,
        vec![SensorStateField {
            sensor_op_state: 0,
            present_state: 1,
            previous_state: 1,
            event_state: 1,
        }],
    );

    let chg = PdrRepositoryChgEvent::records_added(vec![NEW_SENSOR_HANDLE]);

    let mut data = vec![0u8; chg.packed_len()];
    chg.pack_to_slice_unchecked(&mut data);

    let event = codec::request(
        7,
        &PlatformEventMessage {
            format_version: 1,
            tid: HOST_TID,
            event_class: EventClass::PdrRepositoryChg,
            event_data: data,
        },
    );

    stack.sim.inject(HOST_EID, event);

    let executor = Rc::clone(&stack.executor);
    let repo = Rc::clone(&stack.repo);
    let sensor_map = Rc::clone(&stack.sensor_map);
    let sync = Rc::clone(&stack.sync);

    smol::block_on(executor.run(async move {
        wait_until(|| repo.borrow().find(NEW_SENSOR_HANDLE).is_some()).await;
        wait_until(|| sensor_map.borrow().get(HOST_TID, 0x00A2).is_some()).await;
        wait_until(|| sync.is_idle()).await;
    }));

    // The event itself was acknowledged before the fetch ran.
    let acked = stack
        .sim
        .inbox
        .borrow()
        .is_empty();

    assert!(acked);
}

#[test]
fn host_off_resets_everything_remote() {
    let stack = build_stack();

    run_initial_walk(&stack);

    assert!(stack.sync.is_host_up());

    stack.bus.set_property(
        bus::HOST_STATE_PATH,
        bus::HOST_STATE_IFACE,
        bus::PROP_CURRENT_HOST_STATE,
        PropertyValue::Str(bus::HOST_STATE_OFF.to_owned()),
    );

    // Only the BMC's own records survive.
    assert_eq!(stack.repo.borrow().count(), 2);
    assert!(stack.repo.borrow().find(SENSOR_HANDLE).is_none());

    // The working tree equals the BMC tree again.
    assert_eq!(
        stack.tree.borrow().visit(),
        stack.bmc_tree.borrow().visit()
    );

    assert!(stack.sensor_map.borrow().is_empty());
    assert!(!stack.sync.is_host_up());

    // The responder keeps serving local records.
    let req = codec::request(1, &pldm::codec::platform::GetPdr::first_part(0));
    let resp = stack
        .responder
        .handle(HOST_EID, pldm::codec::Msg::parse(&req).unwrap())
        .unwrap();

    let parsed = codec::decode_response::<pldm::codec::platform::GetPdr>(&resp).unwrap();

    assert!(parsed.completion_code.is_success());
}

#[test]
fn failed_get_pdr_aborts_but_recovers() {
    let stack = build_stack();

    let executor = Rc::clone(&stack.executor);
    let sync = Rc::clone(&stack.sync);
    let repo = Rc::clone(&stack.repo);
    let sim = Rc::clone(&stack.sim);

    smol::block_on(executor.run(async move {
        assert!(sync.probe().await);

        *sim.fail_get_pdr.borrow_mut() = Some(codec::CompletionCode::Error);

        sync.fetch_pdrs(Vec::new(), false);

        wait_until(|| sync.is_idle()).await;

        // nothing remote landed
        assert_eq!(repo.borrow().count(), 2);

        *sim.fail_get_pdr.borrow_mut() = None;

        sync.fetch_pdrs(Vec::new(), false);

        wait_until(|| repo.borrow().find(NUMERIC_HANDLE).is_some()).await;
    }));
}

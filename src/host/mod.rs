//! The remote-terminus PDR synchronisation state machine.
//!
//! A pull engine that walks the host's PDR repository with `GetPDR`, merges
//! entity association PDRs into the local tree, rebinds container ids,
//! hydrates the sensor map, fans out into FRU record retrieval and state
//! sensor re-reads, and tears everything down again when the host powers
//! off.

mod sensors;

pub use sensors::{SensorEntry, SensorMap, SensorStateSet};

use crate::bus::{self, InventoryBus, PlatformBus, PropertySource};
use crate::codec::event_data::PdrRepositoryChgEvent;
use crate::codec::fru::{self, GetFruRecordTable, GetFruRecordTableMetadata};
use crate::codec::pdr::{
    Entity, EntityAssociationPdr, FruRecordSetPdr, PdrHeader, PdrType, StateSensorPdr,
    TerminusLocatorPdr, ENTITY_CONTAINER_ID_OFFSET, PDR_HEADER_LEN,
};
use crate::codec::platform::{
    EventClass, GetPdr, GetStateSensorReadings, PlatformEventMessage,
};
use crate::codec::base::GetPldmVersion;
use crate::codec::{self, Msg};
use crate::engine::Engine;
use crate::error::Error;
use crate::events::{EventManager, StateSensorHandler};
use crate::mctp::MctpTransport;
use crate::pdr::{entity_object_paths, EntityMaps, EntityTree, PdrRepo};
use crate::{Eid, Tid, BMC_TERMINUS_HANDLE, UNKNOWN_TID};
use pldm_wire::{PldmWireRead, PldmWireWrite};
use smol::LocalExecutor;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::ops::RangeInclusive;
use std::rc::{Rc, Weak};

/// TID the BMC reports for itself in emitted events.
pub const BMC_TID: Tid = 1;

/// Remote record handles in this range keep their host-assigned handle when
/// inserted into the local repository.
pub const REMOTE_HANDLE_RANGE: RangeInclusive<u32> = 0x0100_0000..=0x01FF_FFFF;

/// What is known about one remote terminus, from its locator PDR.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TerminusInfo {
    /// Terminus id.
    pub tid: Tid,
    /// MCTP endpoint the terminus answers on.
    pub eid: Eid,
    /// Locator validity byte.
    pub validity: u8,
}

#[derive(Default)]
struct SyncState {
    /// Full-scan queue, seeded with `[0]`.
    pending: VecDeque<u32>,
    /// Delta queue fed by `PDRRepositoryChgEvent`.
    modified: VecDeque<u32>,
    host_pdr_modified: bool,
    merged_host_parents: bool,
    response_received: bool,
    walk_active: bool,
    tl_info: HashMap<u16, TerminusInfo>,
    /// Inventory paths published for tree entities; values nulled on host
    /// off so nothing dangles.
    obj_paths: HashMap<String, Option<Entity>>,
    /// Accumulators for the end-of-walk fan-out.
    state_sensor_pdrs: Vec<Vec<u8>>,
    fru_record_set_pdrs: Vec<Vec<u8>>,
    merged_handles: Vec<u32>,
    merged: bool,
}

/// The synchronizer proper.
pub struct HostPdrSync<T: MctpTransport + 'static> {
    engine: Rc<Engine<T>>,
    executor: Rc<LocalExecutor<'static>>,
    bus: Rc<dyn PlatformBus>,
    repo: Rc<RefCell<PdrRepo>>,
    tree: Rc<RefCell<EntityTree>>,
    bmc_tree: Rc<RefCell<EntityTree>>,
    sensor_map: Rc<RefCell<SensorMap>>,
    actions: Rc<StateSensorHandler>,
    entity_maps: EntityMaps,
    host_eid: Eid,
    state: RefCell<SyncState>,
    /// Set while a fetch kick is queued so event handlers can reply before
    /// the walk mutates anything.
    kick_queued: Cell<bool>,
    /// Invoked after every completed walk, once the fan-out has run.
    walk_complete: RefCell<Option<Box<dyn Fn()>>>,
    /// Back-reference for handing clones of ourselves to spawned tasks and
    /// subscriptions.
    weak_self: Weak<Self>,
}

impl<T: MctpTransport + 'static> HostPdrSync<T> {
    /// A synchronizer for the terminus at `host_eid`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Rc<Engine<T>>,
        executor: Rc<LocalExecutor<'static>>,
        bus: Rc<dyn PlatformBus>,
        repo: Rc<RefCell<PdrRepo>>,
        tree: Rc<RefCell<EntityTree>>,
        bmc_tree: Rc<RefCell<EntityTree>>,
        sensor_map: Rc<RefCell<SensorMap>>,
        actions: Rc<StateSensorHandler>,
        entity_maps: EntityMaps,
        host_eid: Eid,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            engine,
            executor,
            bus,
            repo,
            tree,
            bmc_tree,
            sensor_map,
            actions,
            entity_maps,
            host_eid,
            state: RefCell::new(SyncState::default()),
            kick_queued: Cell::new(false),
            walk_complete: RefCell::new(None),
            weak_self: weak_self.clone(),
        })
    }

    fn strong(&self) -> Rc<Self> {
        self.weak_self
            .upgrade()
            .expect("self reference outlives the synchronizer")
    }

    /// Install a hook run after every completed walk, e.g. to create
    /// effecters for freshly learnt PDRs.
    pub fn set_walk_complete_hook(&self, hook: Box<dyn Fn()>) {
        *self.walk_complete.borrow_mut() = Some(hook);
    }

    /// Whether the start-up probe has seen the host answer.
    pub fn is_host_up(&self) -> bool {
        self.state.borrow().response_received
    }

    /// Terminus locator info accumulated so far.
    pub fn terminus_info(&self, terminus_handle: u16) -> Option<TerminusInfo> {
        self.state.borrow().tl_info.get(&terminus_handle).copied()
    }

    /// Published inventory path for `entity`, if any.
    pub fn path_of(&self, entity: Entity) -> Option<String> {
        self.state
            .borrow()
            .obj_paths
            .iter()
            .find(|(_, e)| **e == Some(entity))
            .map(|(path, _)| path.clone())
    }

    /// Install the host-off watch and the repository change sink.
    pub fn attach(&self, events: &EventManager) {
        {
            let sync = self.strong();
            events.set_repo_chg_sink(Box::new(move |handles| {
                sync.fetch_pdrs(handles, true);
            }));
        }

        let sync = self.strong();
        self.bus.watch(
            bus::HOST_STATE_PATH,
            bus::HOST_STATE_IFACE,
            Box::new(move |name, value| {
                if name == bus::PROP_CURRENT_HOST_STATE
                    && value.as_str() == Some(bus::HOST_STATE_OFF)
                {
                    sync.host_off_teardown();
                }
            }),
        );
    }

    /// Probe the host with `GetPLDMVersion(type = base)`. Any valid
    /// response marks the host up; the reply itself is discarded.
    pub async fn probe(&self) -> bool {
        match self
            .engine
            .send_recv_typed(self.host_eid, &GetPldmVersion::probe())
            .await
        {
            Ok(_) => {
                self.state.borrow_mut().response_received = true;

                true
            }
            Err(e) => {
                log::info!("host terminus not responding: {}", e);

                false
            }
        }
    }

    /// Deposit record handles to fetch and schedule a deferred walk kick.
    ///
    /// An empty `handles` (or an explicit 0) seeds a full scan; a delta from
    /// a repository change event lands in the modified queue.
    pub fn fetch_pdrs(&self, handles: Vec<u32>, modified: bool) {
        {
            let mut state = self.state.borrow_mut();

            if handles.is_empty() || handles == [0] {
                state.pending.clear();
                state.pending.push_back(0);
            } else if modified {
                state.host_pdr_modified = true;
                state.modified.extend(handles);
            } else {
                state.pending.extend(handles);
            }
        }

        if self.kick_queued.replace(true) {
            return;
        }

        // Deferred so the triggering event handler can unwind (and its
        // response go out) before the walk starts talking to the host.
        let sync = self.strong();
        self.executor
            .spawn(async move {
                sync.kick_queued.set(false);
                sync.run_walk().await;
            })
            .detach();
    }

    async fn run_walk(self: Rc<Self>) {
        {
            let mut state = self.state.borrow_mut();

            if state.walk_active {
                return;
            }

            state.walk_active = true;
        }

        loop {
            let seed = {
                let mut state = self.state.borrow_mut();

                match state.modified.pop_front() {
                    Some(handle) => Some(handle),
                    None => state.pending.pop_front(),
                }
            };

            let Some(seed) = seed else {
                break;
            };

            if let Err(e) = self.walk_from(seed).await {
                log::error!("PDR walk from handle {:#x} aborted: {}", seed, e);

                break;
            }
        }

        let mut state = self.state.borrow_mut();

        state.walk_active = false;

        if state.modified.is_empty() {
            state.host_pdr_modified = false;
        }
    }

    /// One chain of `GetPDR` calls from `seed` until the host reports no
    /// successor. Each step's response is fully processed before the next
    /// request is issued.
    async fn walk_from(&self, seed: u32) -> Result<(), Error> {
        let mut handle = seed;

        loop {
            let resp = self
                .engine
                .send_recv_typed(self.host_eid, &GetPdr::first_part(handle))
                .await?;

            if !resp.completion_code.is_success() {
                return Err(crate::error::ProtocolError::Completion(resp.completion_code).into());
            }

            let next = resp.next_record_handle;

            let outcome = self.process_record(&resp.record_data, next)?;

            match outcome {
                RecordOutcome::Continue => {}
                RecordOutcome::StopWalk => return Ok(()),
                RecordOutcome::FinishNow => break,
            }

            if next == 0 {
                break;
            }

            handle = next;
        }

        self.finalize().await;

        Ok(())
    }

    fn effective_handle(header: &PdrHeader, next: u32) -> u32 {
        let rh = if next != 0 { next - 1 } else { header.record_handle };

        if rh == 0 {
            header.record_handle
        } else {
            rh
        }
    }

    fn process_record(&self, record: &[u8], next: u32) -> Result<RecordOutcome, Error> {
        let header = match PdrHeader::unpack_from_slice(record) {
            Ok(header) => header,
            Err(e) => {
                // A record this stack cannot even frame is skipped; the walk
                // itself survives.
                log::error!("skipping undecodable remote record: {}", e);

                return Ok(RecordOutcome::Continue);
            }
        };

        let rh = Self::effective_handle(&header, next);

        match header.pdr_type {
            PdrType::EntityAssociation => {
                self.merge_entity_associations(record, rh)?;

                Ok(RecordOutcome::Continue)
            }
            PdrType::TerminusLocator => self.ingest_terminus_locator(record, rh),
            PdrType::StateSensor => {
                let mut owned = record.to_vec();

                self.rewrite_container(&mut owned);
                self.state.borrow_mut().state_sensor_pdrs.push(owned.clone());
                self.add_remote(owned, rh)?;

                Ok(RecordOutcome::Continue)
            }
            PdrType::FruRecordSet => {
                let mut owned = record.to_vec();

                self.rewrite_container(&mut owned);
                self.state
                    .borrow_mut()
                    .fru_record_set_pdrs
                    .push(owned.clone());
                self.add_remote(owned, rh)?;

                Ok(RecordOutcome::Continue)
            }
            PdrType::StateEffecter | PdrType::NumericEffecter => {
                let mut owned = record.to_vec();

                self.rewrite_container(&mut owned);
                self.add_remote(owned, rh)?;

                Ok(RecordOutcome::Continue)
            }
            _ => {
                self.add_remote(record.to_vec(), rh)?;

                Ok(RecordOutcome::Continue)
            }
        }
    }

    fn add_remote(&self, record: Vec<u8>, handle: u32) -> Result<(), Error> {
        let terminus_handle = record
            .get(PDR_HEADER_LEN..PDR_HEADER_LEN + 2)
            .map(|raw| u16::from_le_bytes([raw[0], raw[1]]))
            .unwrap_or(BMC_TERMINUS_HANDLE);

        // A failure to store a remote record leaves the repository in an
        // unknown relation to the host's; unrecoverable for this walk.
        self.repo
            .borrow_mut()
            .add(record, true, terminus_handle, handle)?;

        Ok(())
    }

    fn ingest_terminus_locator(&self, record: &[u8], rh: u32) -> Result<RecordOutcome, Error> {
        let parsed = match TerminusLocatorPdr::from_record(record) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::error!("skipping undecodable terminus locator PDR: {}", e);

                return Ok(RecordOutcome::Continue);
            }
        };

        let eid = parsed.eid().unwrap_or(0);

        {
            let state = self.state.borrow();

            if let Some(existing) = state.tl_info.get(&parsed.terminus_handle) {
                if existing.eid == eid && existing.validity == parsed.validity {
                    // Locator already known with the same validity: nothing
                    // newer to learn from this repository, stop here.
                    return Ok(RecordOutcome::StopWalk);
                }
            }
        }

        self.state.borrow_mut().tl_info.insert(
            parsed.terminus_handle,
            TerminusInfo {
                tid: parsed.tid,
                eid,
                validity: parsed.validity,
            },
        );

        if parsed.validity == 0 {
            self.repo.borrow_mut().set_terminus_locator_validity(
                parsed.terminus_handle,
                parsed.tid,
                eid,
                false,
            );

            if !self.is_host_up() {
                // The terminus is down; no point walking its repository.
                return Ok(RecordOutcome::FinishNow);
            }

            return Ok(RecordOutcome::Continue);
        }

        self.add_remote(record.to_vec(), rh)?;

        Ok(RecordOutcome::Continue)
    }

    /// Merge the entities of a host entity association PDR into the local
    /// tree and re-emit the merged associations as local records.
    fn merge_entity_associations(&self, record: &[u8], rh: u32) -> Result<(), Error> {
        if REMOTE_HANDLE_RANGE.contains(&rh) {
            // Reserved-range records keep their host handle alongside the
            // merged copies.
            self.add_remote(record.to_vec(), rh)?;
        }

        let (pdr, entities) = match EntityAssociationPdr::extract_entities(record) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::error!("skipping undecodable entity association PDR: {}", e);

                return Ok(());
            }
        };

        let prefer_remote = self.state.borrow().merged_host_parents;

        let parent = {
            let tree = self.tree.borrow();

            match tree.find(entities[0], prefer_remote) {
                Some(node) => node,
                None => {
                    log::error!(
                        "container entity {:?} not found in local tree",
                        entities[0]
                    );

                    return Ok(());
                }
            }
        };

        let mut merged_children = Vec::new();

        {
            let mut tree = self.tree.borrow_mut();

            for child in &entities[1..] {
                match tree.add(
                    *child,
                    child.entity_instance,
                    Some(parent),
                    pdr.association_type,
                    true,
                ) {
                    Ok(node) => merged_children.push(tree.entity_at(node)),
                    Err(crate::error::TreeError::Duplicate) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        self.state.borrow_mut().merged_host_parents = true;

        if merged_children.is_empty() {
            return Ok(());
        }

        let association_pdr = self
            .tree
            .borrow()
            .association_pdr_at(parent, pdr.association_type, Some(&merged_children));

        if let Some(association_pdr) = association_pdr {
            let mut repo = self.repo.borrow_mut();

            // Merged records continue the BMC's own handle range so they
            // never land inside the host's reserved range.
            let requested = repo
                .last_handle_below(*REMOTE_HANDLE_RANGE.start())
                .checked_add(1)
                .ok_or(crate::error::RepoError::HandleExhausted)?;

            let handle = repo.add(
                association_pdr.to_record(),
                true,
                BMC_TERMINUS_HANDLE,
                requested,
            )?;

            drop(repo);

            let mut state = self.state.borrow_mut();

            state.merged_handles.push(handle);
            state.merged = true;
        }

        Ok(())
    }

    /// Rewrite the container id of an entity-bearing record to the local
    /// tree's assignment. The tree remembers the host's container id, so
    /// the node is found by remote locality.
    fn rewrite_container(&self, record: &mut [u8]) {
        let Some(raw) = record.get(PDR_HEADER_LEN + 4..PDR_HEADER_LEN + 10) else {
            return;
        };

        let entity = match Entity::unpack_from_slice(raw) {
            Ok(entity) => entity,
            Err(_) => return,
        };

        let tree = self.tree.borrow();

        if let Some(node) = tree.find(entity, true) {
            let local = tree.entity_at(node).container_id;

            record[ENTITY_CONTAINER_ID_OFFSET..ENTITY_CONTAINER_ID_OFFSET + 2]
                .copy_from_slice(&local.to_le_bytes());
        }
    }

    /// End-of-walk fan-out: inventory publication, sensor map hydration,
    /// FRU retrieval, change event emission and the sensor read sweep.
    async fn finalize(&self) {
        self.publish_inventory();

        let (state_sensor_pdrs, fru_record_set_pdrs, merged, merged_handles) = {
            let mut state = self.state.borrow_mut();

            (
                std::mem::take(&mut state.state_sensor_pdrs),
                std::mem::take(&mut state.fru_record_set_pdrs),
                std::mem::replace(&mut state.merged, false),
                std::mem::take(&mut state.merged_handles),
            )
        };

        self.parse_state_sensor_pdrs(&state_sensor_pdrs);

        self.fetch_fru_tables(&fru_record_set_pdrs).await;

        if merged {
            self.send_repo_chg_event(merged_handles).await;
        }

        if self.is_host_up() {
            self.read_host_sensor_states().await;
        }

        if let Some(hook) = &*self.walk_complete.borrow() {
            hook();
        }
    }

    fn publish_inventory(&self) {
        let paths = entity_object_paths(&self.tree.borrow(), &self.entity_maps);

        {
            let mut state = self.state.borrow_mut();

            for (path, entity) in &paths {
                state.obj_paths.insert(path.clone(), Some(*entity));
            }
        }

        // Publication happens with no state borrowed; a watcher may re-enter.
        for (path, _) in paths {
            self.bus.publish_inventory_object(&path);
        }
    }

    fn parse_state_sensor_pdrs(&self, records: &[Vec<u8>]) {
        for record in records {
            let parsed = match StateSensorPdr::from_record(record) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::error!("skipping undecodable state sensor PDR: {}", e);

                    continue;
                }
            };

            let tid = self
                .state
                .borrow()
                .tl_info
                .get(&parsed.terminus_handle)
                .map(|info| info.tid)
                .unwrap_or(UNKNOWN_TID);

            self.sensor_map.borrow_mut().insert_pdr(tid, &parsed);
        }
    }

    async fn fetch_fru_tables(&self, fru_record_set_pdrs: &[Vec<u8>]) {
        if fru_record_set_pdrs.is_empty() {
            return;
        }

        let metadata = match self
            .engine
            .send_recv_typed(self.host_eid, &GetFruRecordTableMetadata)
            .await
        {
            Ok(resp) if resp.completion_code.is_success() => resp,
            Ok(resp) => {
                log::error!(
                    "GetFRURecordTableMetadata failed with {}",
                    resp.completion_code
                );

                return;
            }
            Err(e) => {
                log::error!("GetFRURecordTableMetadata failed: {}", e);

                return;
            }
        };

        if metadata.table_length == 0 {
            return;
        }

        let table = match self
            .engine
            .send_recv_typed(self.host_eid, &GetFruRecordTable::first_part())
            .await
        {
            Ok(resp) if resp.completion_code.is_success() => resp.table_data,
            Ok(resp) => {
                log::error!("GetFRURecordTable failed with {}", resp.completion_code);

                return;
            }
            Err(e) => {
                log::error!("GetFRURecordTable failed: {}", e);

                return;
            }
        };

        let records = match fru::parse_fru_record_table(&table) {
            Ok(records) => records,
            Err(e) => {
                log::error!("undecodable FRU record table: {}", e);

                return;
            }
        };

        for fru_record in &records {
            let Some(location_code) = fru_record.location_code() else {
                continue;
            };

            let Some(entity) = fru_record_set_pdrs.iter().find_map(|record| {
                FruRecordSetPdr::from_record(record)
                    .ok()
                    .filter(|pdr| pdr.fru_rsi == fru_record.record_set_id)
                    .map(|pdr| pdr.entity)
            }) else {
                log::debug!(
                    "no FRU record set PDR for record set {}",
                    fru_record.record_set_id
                );

                continue;
            };

            if let Some(path) = self.path_of(entity) {
                self.bus.set_location_code(&path, &location_code);
            }
        }
    }

    async fn send_repo_chg_event(&self, handles: Vec<u32>) {
        let payload = PdrRepositoryChgEvent::records_added(handles);

        let mut data = vec![0u8; payload.packed_len()];
        payload.pack_to_slice_unchecked(&mut data);

        let event = PlatformEventMessage {
            format_version: PlatformEventMessage::FORMAT_VERSION,
            tid: BMC_TID,
            event_class: EventClass::PdrRepositoryChg,
            event_data: data,
        };

        let instance_id = match self.engine.next_instance_id(self.host_eid) {
            Ok(id) => id,
            Err(e) => {
                log::error!("no instance id for repository change event: {}", e);

                return;
            }
        };

        let req = codec::request(instance_id, &event);

        let result = self
            .engine
            .register_request(
                self.host_eid,
                &req,
                Box::new(|eid, resp| match resp {
                    Some(resp) => match Msg::parse(resp).and_then(|m| m.split_completion()) {
                        Ok((cc, _)) if cc.is_success() => {}
                        Ok((cc, _)) => log::error!(
                            "PDR repository change event rejected by eid {}: {}",
                            eid,
                            cc
                        ),
                        Err(e) => log::error!("undecodable change event response: {}", e),
                    },
                    None => log::error!("PDR repository change event to eid {} timed out", eid),
                }),
            )
            .await;

        if let Err(e) = result {
            log::error!("failed to send repository change event: {}", e);
        }
    }

    /// Read every known state sensor and drive the configured actions with
    /// the current readings. One sensor failing does not stop the sweep.
    async fn read_host_sensor_states(&self) {
        let sensor_ids = self.sensor_map.borrow().sensor_ids();

        for (tid, sensor_id) in sensor_ids {
            let resp = match self
                .engine
                .send_recv_typed(self.host_eid, &GetStateSensorReadings::new(sensor_id))
                .await
            {
                Ok(resp) if resp.completion_code.is_success() => resp,
                Ok(resp) => {
                    log::error!(
                        "GetStateSensorReadings({}) failed with {}",
                        sensor_id,
                        resp.completion_code
                    );

                    continue;
                }
                Err(e) => {
                    log::error!("GetStateSensorReadings({}) failed: {}", sensor_id, e);

                    continue;
                }
            };

            let Some(entry) = self.sensor_map.borrow().get(tid, sensor_id).cloned() else {
                continue;
            };

            for (offset, field) in resp.fields.iter().enumerate() {
                let Some(state_set) = entry.state_sets.get(offset) else {
                    log::error!(
                        "sensor {} reading has more offsets than its PDR",
                        sensor_id
                    );

                    break;
                };

                self.actions.event_action(
                    self.bus.as_ref(),
                    entry.entity,
                    state_set.state_set_id,
                    offset as u8,
                    field.present_state,
                );
            }

            // Sensor operational state maps onto the entity's decorators.
            if let Some(path) = self.path_of(entry.entity) {
                let op_state = resp.fields.first().map(|f| f.sensor_op_state).unwrap_or(2);

                self.bus
                    .set_operational(&path, op_state == 0, matches!(op_state, 0 | 1));
            }
        }
    }

    /// Host power-off teardown: drop remote state and rebuild the working
    /// tree from the BMC's own.
    pub fn host_off_teardown(&self) {
        log::info!("host is off; discarding remote terminus state");

        self.repo.borrow_mut().remove_remote();

        {
            let mut tree = self.tree.borrow_mut();

            tree.destroy();
            tree.copy_from(&self.bmc_tree.borrow());
        }

        self.sensor_map.borrow_mut().clear();

        let mut state = self.state.borrow_mut();

        state.response_received = false;
        state.merged_host_parents = false;
        state.pending.clear();
        state.modified.clear();
        state.host_pdr_modified = false;
        state.state_sensor_pdrs.clear();
        state.fru_record_set_pdrs.clear();
        state.merged = false;
        state.merged_handles.clear();

        for entity in state.obj_paths.values_mut() {
            *entity = None;
        }

        state
            .tl_info
            .retain(|terminus_handle, _| *terminus_handle == BMC_TERMINUS_HANDLE);
    }

    /// Queue state for tests and the daemon's status surface.
    pub fn queue_depths(&self) -> (usize, usize) {
        let state = self.state.borrow();

        (state.pending.len(), state.modified.len())
    }

    /// Whether no walk is active, queued or kicked.
    pub fn is_idle(&self) -> bool {
        let state = self.state.borrow();

        !self.kick_queued.get()
            && !state.walk_active
            && state.pending.is_empty()
            && state.modified.is_empty()
    }
}

enum RecordOutcome {
    /// Keep walking.
    Continue,
    /// Abandon the walk, queues preserved.
    StopWalk,
    /// Treat this record as the end of the repository and finalize.
    FinishNow,
}

// Tests for the synchronizer live in `tests/replay-host-pdr-walk.rs`; the
// pieces it is built from are unit tested in their own modules.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_handle_rules() {
        let header = PdrHeader {
            record_handle: 7,
            version: 1,
            pdr_type: PdrType::StateSensor,
            record_change_number: 0,
            length: 0,
        };

        // mid-walk: the fetched record sits just before the successor
        assert_eq!(HostPdrSync::<Never>::effective_handle(&header, 11), 10);
        // tail: fall back to the header's own handle
        assert_eq!(HostPdrSync::<Never>::effective_handle(&header, 0), 7);
        // next == 1 would compute handle 0, which is not addressable
        assert_eq!(HostPdrSync::<Never>::effective_handle(&header, 1), 7);
    }

    #[test]
    fn remote_handle_range_bounds() {
        assert!(!REMOTE_HANDLE_RANGE.contains(&0x00FF_FFFF));
        assert!(REMOTE_HANDLE_RANGE.contains(&0x0100_0000));
        assert!(REMOTE_HANDLE_RANGE.contains(&0x01FF_FFFF));
        assert!(!REMOTE_HANDLE_RANGE.contains(&0x0200_0000));
    }

    /// Uninhabited transport so the associated functions above can be named.
    enum Never {}

    impl MctpTransport for Never {
        async fn send(&self, _eid: Eid, _msg: &[u8]) -> Result<usize, Error> {
            unreachable!()
        }

        async fn recv(&self) -> Result<(Eid, Vec<u8>), Error> {
            unreachable!()
        }
    }
}

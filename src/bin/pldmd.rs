//! The PLDM terminus daemon.
//!
//! Opens the MCTP mux socket, seeds the PDR repository from the BMC's
//! static inventory, and runs the responder, the host PDR synchronizer and
//! the effecter pipeline on one single-threaded executor.
//!
//! ```text
//! pldmd [--config DIR] [--host-eid N] [--self-eid N]
//! ```

use pldm::bus::{LocalBus, PlatformBus};
use pldm::codec::pdr::{PdrType, StateEffecterPdr};
use pldm::effecter::{
    self, EffecterRegistry, HostEffecterManager, NumericEffecterManager, PluginRegistry,
    PowerCapPlugin,
};
use pldm::engine::{Engine, Timeouts};
use pldm::events::{EventManager, StateSensorHandler};
use pldm::host::{HostPdrSync, SensorMap, BMC_TID};
use pldm::mctp::MctpSocket;
use pldm::pdr::{
    default_entity_maps, parse_entity_map, seed_bmc_repo, EntityTree, InventoryConfig, PdrRepo,
};
use pldm::responder::Responder;
use pldm::{Eid, BMC_TERMINUS_HANDLE};
use smol::LocalExecutor;
use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

struct Args {
    config_dir: PathBuf,
    host_eid: Eid,
    self_eid: Eid,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config_dir: PathBuf::from("/usr/share/pldm"),
        host_eid: 9,
        self_eid: 8,
    };

    let mut it = std::env::args().skip(1);

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                args.config_dir = it
                    .next()
                    .map(PathBuf::from)
                    .ok_or("--config needs a directory")?;
            }
            "--host-eid" => {
                args.host_eid = it
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or("--host-eid needs a number")?;
            }
            "--self-eid" => {
                args.self_eid = it
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or("--self-eid needs a number")?;
            }
            other => return Err(format!("unknown argument {}", other)),
        }
    }

    Ok(args)
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("pldmd: {}", e);

            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("fatal: {}", e);

            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), pldm::error::Error> {
    let bus: Rc<dyn PlatformBus> = Rc::new(LocalBus::new());

    // Static configuration; every file is optional.
    let entity_maps = parse_entity_map(&args.config_dir.join("entity_map.json"))
        .unwrap_or_else(|_| default_entity_maps());

    let bmc_tree = match InventoryConfig::load(&args.config_dir.join("host_frus.json")) {
        Ok(config) => config.build_tree()?,
        Err(e) => {
            log::warn!("no usable host_frus.json ({}); starting with an empty tree", e);

            EntityTree::new()
        }
    };

    let actions = Rc::new(StateSensorHandler::load_dir(
        &args.config_dir.join("events"),
    )?);

    // Seed the repository from our own inventory.
    let mut repo = PdrRepo::new();

    let fru_table = seed_bmc_repo(
        &mut repo,
        &bmc_tree,
        &entity_maps,
        BMC_TERMINUS_HANDLE,
        BMC_TID,
        args.self_eid,
    )?;

    let registry = Rc::new(RefCell::new(EffecterRegistry::new()));

    for found in repo.records_of_type(PdrType::StateEffecter) {
        if let Ok(pdr) = StateEffecterPdr::from_record(found.data) {
            registry.borrow_mut().add_state_effecter(&pdr);
        }
    }

    let repo = Rc::new(RefCell::new(repo));

    let mut tree = EntityTree::new();
    tree.copy_from(&bmc_tree);

    let tree = Rc::new(RefCell::new(tree));
    let bmc_tree = Rc::new(RefCell::new(bmc_tree));
    let sensor_map = Rc::new(RefCell::new(SensorMap::new()));

    let events = Rc::new(EventManager::new(
        Rc::clone(&bus),
        Rc::clone(&sensor_map),
        Rc::clone(&actions),
    ));

    let responder = Responder::new(
        BMC_TID,
        Rc::clone(&repo),
        Rc::clone(&registry),
        Rc::clone(&events),
    );
    responder.set_fru_table(fru_table);

    let engine = Rc::new(Engine::new(MctpSocket::open()?, Timeouts::default()));
    let executor = Rc::new(LocalExecutor::new());

    let sync = HostPdrSync::new(
        Rc::clone(&engine),
        Rc::clone(&executor),
        Rc::clone(&bus),
        Rc::clone(&repo),
        Rc::clone(&tree),
        Rc::clone(&bmc_tree),
        Rc::clone(&sensor_map),
        Rc::clone(&actions),
        entity_maps,
        args.host_eid,
    );

    sync.attach(&events);

    // Property-driven state effecter writes.
    match effecter::config::load(&args.config_dir.join("dbus_to_host_effecter.json")) {
        Ok(entries) => {
            let manager = HostEffecterManager::new(
                Rc::clone(&engine),
                Rc::clone(&executor),
                Rc::clone(&bus),
                Rc::clone(&repo),
                entries,
            );

            manager.subscribe();

            log::info!("watching {} host effecter entries", manager.len());
        }
        Err(e) => log::warn!("no usable dbus_to_host_effecter.json: {}", e),
    }

    // Numeric effecters materialise after each walk; plugins may decorate
    // them (the power cap interface attaches to processor watts effecters).
    let mut plugins = PluginRegistry::new();
    plugins.register(Box::new(PowerCapPlugin::new(
        Rc::clone(&executor),
        Rc::clone(&bus),
    )));

    let numeric_manager = Rc::new(NumericEffecterManager::new(
        Rc::clone(&engine),
        Rc::clone(&bus),
        Rc::clone(&repo),
        Rc::new(plugins),
    ));

    {
        let numeric_manager = Rc::clone(&numeric_manager);
        // Weak: the hook lives inside the synchronizer it refers to.
        let sync_for_hook = Rc::downgrade(&sync);
        let host_eid = args.host_eid;

        sync.set_walk_complete_hook(Box::new(move || {
            let Some(sync) = sync_for_hook.upgrade() else {
                return;
            };

            numeric_manager.rescan(host_eid, move |entity| sync.path_of(entity));
        }));
    }

    log::info!(
        "pldmd up; host eid {}, self eid {}",
        args.host_eid,
        args.self_eid
    );

    smol::block_on(executor.run(async {
        {
            let engine = Rc::clone(&engine);
            let responder = Rc::clone(&responder);

            executor
                .spawn(async move {
                    if let Err(e) = engine.run(move |eid, msg| responder.handle(eid, msg)).await {
                        log::error!("engine stopped: {}", e);
                    }
                })
                .detach();
        }

        if sync.probe().await {
            sync.fetch_pdrs(Vec::new(), false);
        }

        std::future::pending::<()>().await
    }));

    Ok(())
}

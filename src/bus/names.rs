//! Well-known object paths, interfaces and property names.

/// Host state object path.
pub const HOST_STATE_PATH: &str = "/xyz/openbmc_project/state/host0";
/// Host state interface.
pub const HOST_STATE_IFACE: &str = "xyz.openbmc_project.State.Host";
/// Current host state property.
pub const PROP_CURRENT_HOST_STATE: &str = "CurrentHostState";
/// The host-off state value.
pub const HOST_STATE_OFF: &str = "xyz.openbmc_project.State.Host.HostState.Off";
/// The host-running state value.
pub const HOST_STATE_RUNNING: &str = "xyz.openbmc_project.State.Host.HostState.Running";

/// Boot progress interface.
pub const BOOT_PROGRESS_IFACE: &str = "xyz.openbmc_project.State.Boot.Progress";
/// Boot progress property.
pub const PROP_BOOT_PROGRESS: &str = "BootProgress";

/// Boot progress stages during which effecter writes are allowed.
pub const BOOT_PROGRESS_WRITABLE_STAGES: [&str; 3] = [
    "xyz.openbmc_project.State.Boot.Progress.ProgressStages.SystemInitComplete",
    "xyz.openbmc_project.State.Boot.Progress.ProgressStages.OSRunning",
    "xyz.openbmc_project.State.Boot.Progress.ProgressStages.SystemSetup",
];

/// Inventory item interface.
pub const INVENTORY_ITEM_IFACE: &str = "xyz.openbmc_project.Inventory.Item";
/// Present property.
pub const PROP_PRESENT: &str = "Present";

/// Location code decorator interface.
pub const LOCATION_CODE_IFACE: &str = "xyz.openbmc_project.Inventory.Decorator.LocationCode";
/// Location code property.
pub const PROP_LOCATION_CODE: &str = "LocationCode";

/// Operational status decorator interface.
pub const OPERATIONAL_STATUS_IFACE: &str = "xyz.openbmc_project.State.Decorator.OperationalStatus";
/// Functional property.
pub const PROP_FUNCTIONAL: &str = "Functional";

/// Availability decorator interface.
pub const AVAILABILITY_IFACE: &str = "xyz.openbmc_project.State.Decorator.Availability";
/// Available property.
pub const PROP_AVAILABLE: &str = "Available";

/// Power cap control interface.
pub const POWER_CAP_IFACE: &str = "xyz.openbmc_project.Control.Power.Cap";
/// Requested power cap property.
pub const PROP_POWER_CAP: &str = "PowerCap";
/// Power cap enable property.
pub const PROP_POWER_CAP_ENABLE: &str = "PowerCapEnable";
/// Smallest settable power cap property.
pub const PROP_MIN_POWER_CAP: &str = "MinPowerCapValue";
/// Largest settable power cap property.
pub const PROP_MAX_POWER_CAP: &str = "MaxPowerCapValue";

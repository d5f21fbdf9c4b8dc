//! The platform bus seam.
//!
//! The D-Bus object model and its manager daemon are external collaborators;
//! this module carries only the contract shape the stack consumes and
//! produces: [`PropertySource`] for property reads and properties-changed
//! subscriptions, [`InventoryBus`] for published objects and property-set
//! hooks, and the handful of well-known interface names. The stack holds the
//! seam as `Rc<dyn PlatformBus>`; [`LocalBus`] is the in-process
//! implementation wired into the daemon and the tests.

mod names;

pub use names::*;

use crate::error::ConfigError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A D-Bus-shaped property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// `b`
    Bool(bool),
    /// `y`
    U8(u8),
    /// `q`
    U16(u16),
    /// `u`
    U32(u32),
    /// `t`
    U64(u64),
    /// `n`
    I16(i16),
    /// `i`
    I32(i32),
    /// `x`
    I64(i64),
    /// `d`
    Double(f64),
    /// `s`
    Str(String),
}

impl PropertyValue {
    /// Convert a JSON config value per the declared property type, the way
    /// the effecter JSON expresses enumerated values.
    pub fn from_json(property_type: &str, value: &serde_json::Value) -> Result<Self, ConfigError> {
        let wrong = || ConfigError::Parse;

        Ok(match property_type {
            "bool" => PropertyValue::Bool(value.as_bool().ok_or_else(wrong)?),
            "uint8_t" => PropertyValue::U8(value.as_u64().ok_or_else(wrong)? as u8),
            "uint16_t" => PropertyValue::U16(value.as_u64().ok_or_else(wrong)? as u16),
            "uint32_t" => PropertyValue::U32(value.as_u64().ok_or_else(wrong)? as u32),
            "uint64_t" => PropertyValue::U64(value.as_u64().ok_or_else(wrong)?),
            "int16_t" => PropertyValue::I16(value.as_i64().ok_or_else(wrong)? as i16),
            "int32_t" => PropertyValue::I32(value.as_i64().ok_or_else(wrong)? as i32),
            "int64_t" => PropertyValue::I64(value.as_i64().ok_or_else(wrong)?),
            "double" => PropertyValue::Double(value.as_f64().ok_or_else(wrong)?),
            "string" => PropertyValue::Str(value.as_str().ok_or_else(wrong)?.to_owned()),
            _ => return Err(ConfigError::Parse),
        })
    }

    /// The string inside, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Widen an integral value to u64.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            PropertyValue::U8(v) => Some(u64::from(v)),
            PropertyValue::U16(v) => Some(u64::from(v)),
            PropertyValue::U32(v) => Some(u64::from(v)),
            PropertyValue::U64(v) => Some(v),
            _ => None,
        }
    }

    /// The bool inside, if this is a bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            PropertyValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

/// A property-set hook rejection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SetError {
    /// The value is outside the acceptable range.
    InvalidArgument,
    /// The write could not be carried out.
    Failed,
}

impl core::fmt::Display for SetError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SetError::InvalidArgument => f.write_str("invalid argument"),
            SetError::Failed => f.write_str("operation failed"),
        }
    }
}

/// A properties-changed subscription callback: `(property name, new value)`.
pub type PropertyChangedCallback = Box<dyn Fn(&str, &PropertyValue)>;

/// A property-set hook: given the requested value, returns the value to
/// publish.
pub type PropertySetHook = Box<dyn Fn(PropertyValue) -> Result<PropertyValue, SetError>>;

/// The property surface the stack consumes (§6.6 shapes): reads and
/// properties-changed subscriptions.
pub trait PropertySource {
    /// Read a property.
    fn get_property(&self, path: &str, interface: &str, name: &str) -> Option<PropertyValue>;

    /// Subscribe to properties-changed on `(path, interface)`.
    fn watch(&self, path: &str, interface: &str, callback: PropertyChangedCallback);
}

/// The property surface the stack produces (§6.7 shapes): published objects,
/// decorators and set hooks.
pub trait InventoryBus {
    /// Write a property, notifying whoever watches `(path, interface)`.
    fn set_property(&self, path: &str, interface: &str, name: &str, value: PropertyValue);

    /// Install a hook consulted when an external client sets a property.
    /// The hook returns the value to publish, which for slow writes is the
    /// previously cached one.
    fn register_setter(&self, path: &str, interface: &str, name: &str, hook: PropertySetHook);

    /// Publish an inventory item object.
    fn publish_inventory_object(&self, path: &str) {
        self.set_property(
            path,
            INVENTORY_ITEM_IFACE,
            PROP_PRESENT,
            PropertyValue::Bool(true),
        );
    }

    /// Publish a location code decorator.
    fn set_location_code(&self, path: &str, code: &str) {
        self.set_property(
            path,
            LOCATION_CODE_IFACE,
            PROP_LOCATION_CODE,
            PropertyValue::Str(code.to_owned()),
        );
    }

    /// Publish operational status and availability decorators.
    fn set_operational(&self, path: &str, functional: bool, available: bool) {
        self.set_property(
            path,
            OPERATIONAL_STATUS_IFACE,
            PROP_FUNCTIONAL,
            PropertyValue::Bool(functional),
        );
        self.set_property(
            path,
            AVAILABILITY_IFACE,
            PROP_AVAILABLE,
            PropertyValue::Bool(available),
        );
    }
}

/// The full bus surface a component may hold in one handle.
pub trait PlatformBus: PropertySource + InventoryBus {}

impl<T: PropertySource + InventoryBus> PlatformBus for T {}

type WatchCallback = Rc<dyn Fn(&str, &PropertyValue)>;
type SetHook = Rc<dyn Fn(PropertyValue) -> Result<PropertyValue, SetError>>;

#[derive(Default)]
struct BusState {
    properties: HashMap<(String, String), HashMap<String, PropertyValue>>,
    watchers: Vec<(String, String, WatchCallback)>,
    setters: HashMap<(String, String, String), SetHook>,
}

/// The in-process property bus.
///
/// Properties are stored per `(path, interface)`; writers notify watchers
/// synchronously, so callbacks observe changes in emission order.
#[derive(Default)]
pub struct LocalBus {
    state: RefCell<BusState>,
}

impl LocalBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a property.
    pub fn get_property(&self, path: &str, interface: &str, name: &str) -> Option<PropertyValue> {
        self.state
            .borrow()
            .properties
            .get(&(path.to_owned(), interface.to_owned()))
            .and_then(|props| props.get(name))
            .cloned()
    }

    /// Write a property and notify watchers of `(path, interface)`.
    pub fn set_property(
        &self,
        path: &str,
        interface: &str,
        name: &str,
        value: PropertyValue,
    ) {
        let callbacks: Vec<WatchCallback> = {
            let mut state = self.state.borrow_mut();

            state
                .properties
                .entry((path.to_owned(), interface.to_owned()))
                .or_default()
                .insert(name.to_owned(), value.clone());

            state
                .watchers
                .iter()
                .filter(|(p, i, _)| p == path && i == interface)
                .map(|(_, _, cb)| Rc::clone(cb))
                .collect()
        };

        for cb in callbacks {
            cb(name, &value);
        }
    }

    /// Subscribe to properties-changed on `(path, interface)`.
    pub fn watch(
        &self,
        path: &str,
        interface: &str,
        callback: impl Fn(&str, &PropertyValue) + 'static,
    ) {
        self.state.borrow_mut().watchers.push((
            path.to_owned(),
            interface.to_owned(),
            Rc::new(callback),
        ));
    }

    /// Install a hook consulted when an external client sets a property.
    /// The hook returns the value to publish, which for slow writes is the
    /// previously cached one.
    pub fn register_setter(
        &self,
        path: &str,
        interface: &str,
        name: &str,
        hook: impl Fn(PropertyValue) -> Result<PropertyValue, SetError> + 'static,
    ) {
        self.state.borrow_mut().setters.insert(
            (path.to_owned(), interface.to_owned(), name.to_owned()),
            Rc::new(hook),
        );
    }

    /// An external client setting a property: routed through the registered
    /// hook when one exists, published directly otherwise. Returns the
    /// published value.
    pub fn request_set(
        &self,
        path: &str,
        interface: &str,
        name: &str,
        value: PropertyValue,
    ) -> Result<PropertyValue, SetError> {
        let hook = self
            .state
            .borrow()
            .setters
            .get(&(path.to_owned(), interface.to_owned(), name.to_owned()))
            .cloned();

        let published = match hook {
            Some(hook) => hook(value)?,
            None => value,
        };

        self.set_property(path, interface, name, published.clone());

        Ok(published)
    }

    /// Whether an object has been published at `path` on any interface.
    pub fn has_object(&self, path: &str) -> bool {
        self.state
            .borrow()
            .properties
            .keys()
            .any(|(p, _)| p == path)
    }
}

impl PropertySource for LocalBus {
    fn get_property(&self, path: &str, interface: &str, name: &str) -> Option<PropertyValue> {
        LocalBus::get_property(self, path, interface, name)
    }

    fn watch(&self, path: &str, interface: &str, callback: PropertyChangedCallback) {
        LocalBus::watch(self, path, interface, callback)
    }
}

impl InventoryBus for LocalBus {
    fn set_property(&self, path: &str, interface: &str, name: &str, value: PropertyValue) {
        LocalBus::set_property(self, path, interface, name, value)
    }

    fn register_setter(&self, path: &str, interface: &str, name: &str, hook: PropertySetHook) {
        LocalBus::register_setter(self, path, interface, name, hook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_notifies_watchers_in_order() {
        let bus = LocalBus::new();

        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            bus.watch("/obj", "com.example.Iface", move |name, _| {
                seen.borrow_mut().push(format!("{}:{}", tag, name));
            });
        }

        bus.set_property(
            "/obj",
            "com.example.Iface",
            "Speed",
            PropertyValue::U32(9000),
        );

        assert_eq!(
            *seen.borrow(),
            vec!["first:Speed".to_owned(), "second:Speed".to_owned()]
        );
        assert_eq!(
            bus.get_property("/obj", "com.example.Iface", "Speed"),
            Some(PropertyValue::U32(9000))
        );
    }

    #[test]
    fn setter_hook_controls_published_value() {
        let bus = LocalBus::new();

        bus.register_setter("/cap", POWER_CAP_IFACE, PROP_POWER_CAP, |requested| {
            match requested.as_u64() {
                Some(v) if v <= 400 => Ok(PropertyValue::U32(250)),
                _ => Err(SetError::InvalidArgument),
            }
        });

        assert_eq!(
            bus.request_set("/cap", POWER_CAP_IFACE, PROP_POWER_CAP, PropertyValue::U32(300)),
            Ok(PropertyValue::U32(250))
        );
        assert_eq!(
            bus.request_set("/cap", POWER_CAP_IFACE, PROP_POWER_CAP, PropertyValue::U32(425)),
            Err(SetError::InvalidArgument)
        );
        // rejected set leaves the published value alone
        assert_eq!(
            bus.get_property("/cap", POWER_CAP_IFACE, PROP_POWER_CAP),
            Some(PropertyValue::U32(250))
        );
    }

    #[test]
    fn json_value_conversion() {
        assert_eq!(
            PropertyValue::from_json("string", &serde_json::json!("On")),
            Ok(PropertyValue::Str("On".to_owned()))
        );
        assert_eq!(
            PropertyValue::from_json("uint8_t", &serde_json::json!(3)),
            Ok(PropertyValue::U8(3))
        );
        assert!(PropertyValue::from_json("bool", &serde_json::json!("no")).is_err());
    }

    #[test]
    fn usable_through_the_trait_handle() {
        let bus: Rc<dyn PlatformBus> = Rc::new(LocalBus::new());

        let seen = Rc::new(RefCell::new(0usize));

        {
            let seen = Rc::clone(&seen);
            bus.watch(
                "/obj",
                "com.example.Iface",
                Box::new(move |_, _| *seen.borrow_mut() += 1),
            );
        }

        bus.set_property("/obj", "com.example.Iface", "Speed", PropertyValue::U32(1));
        bus.publish_inventory_object("/obj2");

        assert_eq!(*seen.borrow(), 1);
        assert_eq!(
            bus.get_property("/obj", "com.example.Iface", "Speed"),
            Some(PropertyValue::U32(1))
        );
        assert_eq!(
            bus.get_property("/obj2", INVENTORY_ITEM_IFACE, PROP_PRESENT),
            Some(PropertyValue::Bool(true))
        );
    }

    #[test]
    fn inventory_helpers() {
        let bus = LocalBus::new();

        bus.publish_inventory_object("/xyz/openbmc_project/inventory/system/motherboard1");
        bus.set_operational("/xyz/openbmc_project/inventory/system/motherboard1", true, true);

        assert!(bus.has_object("/xyz/openbmc_project/inventory/system/motherboard1"));
        assert_eq!(
            bus.get_property(
                "/xyz/openbmc_project/inventory/system/motherboard1",
                OPERATIONAL_STATUS_IFACE,
                PROP_FUNCTIONAL
            ),
            Some(PropertyValue::Bool(true))
        );
    }
}

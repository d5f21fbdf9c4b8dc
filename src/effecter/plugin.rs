//! OEM platform plugins.
//!
//! Each newly created numeric effecter is offered to every registered
//! plugin, which may attach additional handlers. Plugins keep at most weak
//! references to effecters; anything they attach is owned by the effecter
//! itself.

use super::numeric::NumericEffecter;
use super::power_cap::PowerCapInterface;
use crate::bus::PlatformBus;
use crate::codec::pdr::{BaseUnit, Entity};
use crate::mctp::MctpTransport;
use smol::LocalExecutor;
use std::rc::Rc;

/// Entity type code for processors, whose watts effecters get a power cap
/// interface.
const ENTITY_TYPE_PROCESSOR: u16 = 135;

/// An OEM extension point.
pub trait OemPlatformPlugin<T: MctpTransport + 'static> {
    /// Offered once per numeric effecter after creation.
    fn numeric_effecter_created(&self, effecter: &Rc<NumericEffecter<T>>);
}

/// The registered plugins, offered effecters in registration order.
pub struct PluginRegistry<T: MctpTransport + 'static> {
    plugins: Vec<Box<dyn OemPlatformPlugin<T>>>,
}

impl<T: MctpTransport + 'static> Default for PluginRegistry<T> {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }
}

impl<T: MctpTransport + 'static> PluginRegistry<T> {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin.
    pub fn register(&mut self, plugin: Box<dyn OemPlatformPlugin<T>>) {
        self.plugins.push(plugin);
    }

    /// Offer a freshly created effecter to every plugin.
    pub fn offer(&self, effecter: &Rc<NumericEffecter<T>>) {
        for plugin in &self.plugins {
            plugin.numeric_effecter_created(effecter);
        }
    }
}

/// Attaches the power cap bus interface to processor watts effecters.
pub struct PowerCapPlugin {
    executor: Rc<LocalExecutor<'static>>,
    bus: Rc<dyn PlatformBus>,
}

impl PowerCapPlugin {
    /// A plugin publishing through `bus`.
    pub fn new(executor: Rc<LocalExecutor<'static>>, bus: Rc<dyn PlatformBus>) -> Self {
        Self { executor, bus }
    }

    fn wants(pdr_entity: Entity, base_unit: BaseUnit) -> bool {
        base_unit == BaseUnit::Watts
            && pdr_entity.entity_type & !Entity::LOGICAL_BIT == ENTITY_TYPE_PROCESSOR
    }
}

impl<T: MctpTransport + 'static> OemPlatformPlugin<T> for PowerCapPlugin {
    fn numeric_effecter_created(&self, effecter: &Rc<NumericEffecter<T>>) {
        if !Self::wants(effecter.pdr().entity, effecter.base_unit()) {
            return;
        }

        log::info!(
            "attaching power cap interface to effecter {} at {}",
            effecter.effecter_id(),
            effecter.path()
        );

        let interface = PowerCapInterface::attach(&self.executor, Rc::clone(&self.bus), effecter);

        effecter.add_observer(interface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_cap_plugin_filter() {
        assert!(PowerCapPlugin::wants(Entity::new(135, 1, 1), BaseUnit::Watts));
        assert!(!PowerCapPlugin::wants(Entity::new(135, 1, 1), BaseUnit::DegreesC));
        assert!(!PowerCapPlugin::wants(Entity::new(66, 1, 1), BaseUnit::Watts));
        // logical processors count too
        assert!(PowerCapPlugin::wants(
            Entity::new(0x8000 | 135, 1, 1),
            BaseUnit::Watts
        ));
    }
}

//! The power cap control interface over a watts numeric effecter.
//!
//! Publishes `xyz.openbmc_project.Control.Power.Cap` for the effecter's
//! entity. Setters validate against the PDR range and dispatch the write as
//! a detached task; the published value stays at the previous cache until
//! the read-back lands, at which point [`ValueObserver::value_changed`]
//! republishes.

use super::numeric::{NumericEffecter, ValueObserver};
use crate::bus::{self, InventoryBus, PlatformBus, PropertySource, PropertyValue, SetError};
use crate::codec::pdr::EffecterOperState;
use crate::mctp::MctpTransport;
use smol::LocalExecutor;
use std::rc::{Rc, Weak};

/// The interface object. The effecter owns it (as an observer); it borrows
/// the effecter back weakly for the duration of each call.
pub struct PowerCapInterface<T: MctpTransport + 'static> {
    bus: Rc<dyn PlatformBus>,
    path: String,
    effecter: Weak<NumericEffecter<T>>,
}

impl<T: MctpTransport + 'static> PowerCapInterface<T> {
    /// Publish the interface for `effecter` and hook its setters up.
    pub fn attach(
        executor: &Rc<LocalExecutor<'static>>,
        bus: Rc<dyn PlatformBus>,
        effecter: &Rc<NumericEffecter<T>>,
    ) -> Rc<Self> {
        let path = effecter.path().to_owned();

        let interface = Rc::new(Self {
            bus: Rc::clone(&bus),
            path: path.clone(),
            effecter: Rc::downgrade(effecter),
        });

        bus.set_property(
            &path,
            bus::POWER_CAP_IFACE,
            bus::PROP_MIN_POWER_CAP,
            PropertyValue::U32(effecter.min_settable() as u32),
        );
        bus.set_property(
            &path,
            bus::POWER_CAP_IFACE,
            bus::PROP_MAX_POWER_CAP,
            PropertyValue::U32(effecter.max_settable() as u32),
        );
        bus.set_property(
            &path,
            bus::POWER_CAP_IFACE,
            bus::PROP_POWER_CAP,
            PropertyValue::U32(0),
        );
        bus.set_property(
            &path,
            bus::POWER_CAP_IFACE,
            bus::PROP_POWER_CAP_ENABLE,
            PropertyValue::Bool(false),
        );

        {
            let interface = Rc::clone(&interface);
            let executor = Rc::clone(executor);

            bus.register_setter(
                &path,
                bus::POWER_CAP_IFACE,
                bus::PROP_POWER_CAP,
                Box::new(move |requested| interface.set_power_cap(&executor, requested)),
            );
        }

        {
            let interface = Rc::clone(&interface);
            let executor = Rc::clone(executor);

            bus.register_setter(
                &path,
                bus::POWER_CAP_IFACE,
                bus::PROP_POWER_CAP_ENABLE,
                Box::new(move |requested| interface.set_power_cap_enable(&executor, requested)),
            );
        }

        interface
    }

    /// The currently published cap, i.e. the value the setter reports while
    /// a write is in flight.
    fn cached_cap(&self) -> u32 {
        self.bus
            .get_property(&self.path, bus::POWER_CAP_IFACE, bus::PROP_POWER_CAP)
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32
    }

    fn set_power_cap(
        &self,
        executor: &Rc<LocalExecutor<'static>>,
        requested: PropertyValue,
    ) -> Result<PropertyValue, SetError> {
        let Some(effecter) = self.effecter.upgrade() else {
            return Err(SetError::Failed);
        };

        let value = requested.as_u64().ok_or(SetError::InvalidArgument)? as f64;

        // Out-of-range requests are rejected up front; nothing goes on the
        // wire.
        if !effecter.in_range(value) {
            return Err(SetError::InvalidArgument);
        }

        executor
            .spawn(async move {
                if let Err(e) = effecter.set_value(value).await {
                    log::error!(
                        "power cap write of {}W to effecter {} failed: {}",
                        value,
                        effecter.effecter_id(),
                        e
                    );
                }
            })
            .detach();

        // The new value is reflected once the read-back lands.
        Ok(PropertyValue::U32(self.cached_cap()))
    }

    fn set_power_cap_enable(
        &self,
        executor: &Rc<LocalExecutor<'static>>,
        requested: PropertyValue,
    ) -> Result<PropertyValue, SetError> {
        let Some(effecter) = self.effecter.upgrade() else {
            return Err(SetError::Failed);
        };

        let enable = requested.as_bool().ok_or(SetError::InvalidArgument)?;

        executor
            .spawn(async move {
                if let Err(e) = effecter.set_enable(enable).await {
                    log::error!(
                        "power cap enable={} on effecter {} failed: {}",
                        enable,
                        effecter.effecter_id(),
                        e
                    );
                }
            })
            .detach();

        Ok(PropertyValue::Bool(enable))
    }
}

impl<T: MctpTransport + 'static> ValueObserver for PowerCapInterface<T> {
    fn value_changed(&self, oper_state: EffecterOperState, pending: f64, present: f64) {
        let (value, enabled) = match oper_state {
            EffecterOperState::EnabledUpdatePending => (pending, true),
            EffecterOperState::EnabledNoUpdatePending => (present, true),
            _ => (present, false),
        };

        self.bus.set_property(
            &self.path,
            bus::POWER_CAP_IFACE,
            bus::PROP_POWER_CAP,
            PropertyValue::U32(value as u32),
        );
        self.bus.set_property(
            &self.path,
            bus::POWER_CAP_IFACE,
            bus::PROP_POWER_CAP_ENABLE,
            PropertyValue::Bool(enabled),
        );
    }
}

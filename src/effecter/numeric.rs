//! A numeric effecter on a remote terminus.
//!
//! Wraps the scaling arithmetic of DSP0248 §27.1 (`Y = (m·X + B) · 10^E`)
//! and the write/read-back cycle. Writes go out converted to raw effecter
//! counts; the cached converted values are refreshed from
//! `GetNumericEffecterValue` responses, and the operational state is
//! mirrored onto the entity's availability decorators.

use crate::bus::{InventoryBus, PlatformBus};
use crate::codec::pdr::{
    BaseUnit, EffecterOperState, EffecterValue, NumericEffecterPdr,
};
use crate::codec::platform::{
    GetNumericEffecterValue, SetNumericEffecterEnable, SetNumericEffecterValue,
};
use crate::engine::Engine;
use crate::error::{Error, ProtocolError};
use crate::mctp::MctpTransport;
use crate::Eid;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Something interested in the effecter's value changing, typically a bus
/// interface. The effecter owns its observers.
pub trait ValueObserver {
    /// Called after a refresh with the new operational state and the
    /// converted pending and present values.
    fn value_changed(&self, oper_state: EffecterOperState, pending: f64, present: f64);
}

/// A remote numeric effecter with cached state.
pub struct NumericEffecter<T: MctpTransport + 'static> {
    engine: Rc<Engine<T>>,
    bus: Rc<dyn PlatformBus>,
    eid: Eid,
    /// Inventory path of the controlled entity; decorators land here.
    path: String,
    pdr: NumericEffecterPdr,
    oper_state: Cell<EffecterOperState>,
    pending: Cell<f64>,
    present: Cell<f64>,
    observers: RefCell<Vec<Rc<dyn ValueObserver>>>,
}

impl<T: MctpTransport + 'static> NumericEffecter<T> {
    /// An effecter described by `pdr`, living at `eid`.
    pub fn new(
        engine: Rc<Engine<T>>,
        bus: Rc<dyn PlatformBus>,
        eid: Eid,
        path: String,
        pdr: NumericEffecterPdr,
    ) -> Rc<Self> {
        Rc::new(Self {
            engine,
            bus,
            eid,
            path,
            pdr,
            oper_state: Cell::new(EffecterOperState::StatusUnknown),
            pending: Cell::new(0.0),
            present: Cell::new(0.0),
            observers: RefCell::new(Vec::new()),
        })
    }

    /// The effecter id on the remote terminus.
    pub fn effecter_id(&self) -> u16 {
        self.pdr.effecter_id
    }

    /// The unit of the converted value.
    pub fn base_unit(&self) -> BaseUnit {
        self.pdr.base_unit
    }

    /// The defining PDR.
    pub fn pdr(&self) -> &NumericEffecterPdr {
        &self.pdr
    }

    /// Inventory path of the controlled entity.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current operational state as last read back.
    pub fn oper_state(&self) -> EffecterOperState {
        self.oper_state.get()
    }

    /// Cached present value, in base units.
    pub fn present(&self) -> f64 {
        self.present.get()
    }

    /// Cached pending value, in base units.
    pub fn pending(&self) -> f64 {
        self.pending.get()
    }

    /// Attach an observer; it is notified on every refresh.
    pub fn add_observer(&self, observer: Rc<dyn ValueObserver>) {
        self.observers.borrow_mut().push(observer);
    }

    /// Convert raw effecter counts to base units.
    pub fn raw_to_unit(&self, raw: i64) -> f64 {
        (raw as f64 * f64::from(self.pdr.resolution) + f64::from(self.pdr.offset))
            * 10f64.powi(i32::from(self.pdr.unit_modifier))
    }

    /// Convert base units to raw effecter counts.
    pub fn unit_to_raw(&self, value: f64) -> f64 {
        (value * 10f64.powi(-i32::from(self.pdr.unit_modifier)) - f64::from(self.pdr.offset))
            / f64::from(self.pdr.resolution)
    }

    /// Smallest settable value, in base units.
    pub fn min_settable(&self) -> f64 {
        self.raw_to_unit(self.pdr.min_settable.as_i64())
    }

    /// Largest settable value, in base units.
    pub fn max_settable(&self) -> f64 {
        self.raw_to_unit(self.pdr.max_settable.as_i64())
    }

    /// Whether `value` (in base units) is inside the settable range.
    pub fn in_range(&self, value: f64) -> bool {
        value >= self.min_settable() && value <= self.max_settable()
    }

    /// Write `value` (in base units) to the effecter and read the result
    /// back.
    pub async fn set_value(&self, value: f64) -> Result<(), Error> {
        if !self.in_range(value) {
            return Err(Error::OutOfRange);
        }

        let raw = self.unit_to_raw(value).round() as i64;

        let raw_value = EffecterValue::from_i64(self.pdr.data_size, raw)
            .ok_or(Error::OutOfRange)?;

        let cc = self
            .engine
            .send_recv_typed(
                self.eid,
                &SetNumericEffecterValue {
                    effecter_id: self.pdr.effecter_id,
                    value: raw_value,
                },
            )
            .await?;

        if !cc.is_success() {
            log::error!(
                "SetNumericEffecterValue({}) rejected: {}",
                self.pdr.effecter_id,
                cc
            );

            return Err(ProtocolError::Completion(cc).into());
        }

        self.refresh().await
    }

    /// Enable or disable the effecter.
    pub async fn set_enable(&self, enable: bool) -> Result<(), Error> {
        let oper_state = if enable {
            EffecterOperState::EnabledUpdatePending
        } else {
            EffecterOperState::Disabled
        };

        let cc = self
            .engine
            .send_recv_typed(
                self.eid,
                &SetNumericEffecterEnable {
                    effecter_id: self.pdr.effecter_id,
                    oper_state,
                },
            )
            .await?;

        if !cc.is_success() {
            log::error!(
                "SetNumericEffecterEnable({}) rejected: {}",
                self.pdr.effecter_id,
                cc
            );

            return Err(ProtocolError::Completion(cc).into());
        }

        self.refresh().await
    }

    /// Read the effecter and update the cached state, the availability
    /// decorators and every observer.
    pub async fn refresh(&self) -> Result<(), Error> {
        let resp = self
            .engine
            .send_recv_typed(
                self.eid,
                &GetNumericEffecterValue {
                    effecter_id: self.pdr.effecter_id,
                },
            )
            .await?;

        if !resp.completion_code.is_success() {
            return Err(ProtocolError::Completion(resp.completion_code).into());
        }

        let pending = self.raw_to_unit(resp.pending_value.as_i64());
        let present = self.raw_to_unit(resp.present_value.as_i64());

        self.oper_state.set(resp.oper_state);
        self.pending.set(pending);
        self.present.set(present);

        let (available, functional) = availability(resp.oper_state);

        self.bus.set_operational(&self.path, functional, available);

        let observers: Vec<Rc<dyn ValueObserver>> = self.observers.borrow().clone();

        for observer in observers {
            observer.value_changed(resp.oper_state, pending, present);
        }

        Ok(())
    }
}

/// Map an effecter operational state to `(available, functional)`.
pub fn availability(oper_state: EffecterOperState) -> (bool, bool) {
    match oper_state {
        EffecterOperState::EnabledUpdatePending | EffecterOperState::EnabledNoUpdatePending => {
            (true, true)
        }
        EffecterOperState::Disabled => (true, false),
        _ => (false, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::codec::pdr::EffecterDataSize;
    use pretty_assertions::assert_eq;

    fn pdr(resolution: f32, offset: f32, modifier: i8) -> NumericEffecterPdr {
        NumericEffecterPdr {
            terminus_handle: 2,
            effecter_id: 3,
            entity: crate::codec::pdr::Entity::new(135, 1, 1),
            effecter_semantic_id: 0,
            effecter_init: 0,
            has_aux_names: false,
            base_unit: BaseUnit::Watts,
            unit_modifier: modifier,
            rate_unit: 0,
            base_oem_unit_handle: 0,
            aux_unit: 0,
            aux_unit_modifier: 0,
            aux_rate_unit: 0,
            aux_oem_unit_handle: 0,
            is_linear: true,
            data_size: EffecterDataSize::U16,
            resolution,
            offset,
            accuracy: 0,
            plus_tolerance: 0,
            minus_tolerance: 0,
            state_transition_interval: 0.0,
            transition_interval: 0.0,
            max_settable: EffecterValue::U16(400),
            min_settable: EffecterValue::U16(50),
        }
    }

    struct NoTransport;

    impl MctpTransport for NoTransport {
        async fn send(&self, _eid: Eid, _msg: &[u8]) -> Result<usize, Error> {
            Err(Error::Io(std::io::ErrorKind::NotConnected))
        }

        async fn recv(&self) -> Result<(Eid, Vec<u8>), Error> {
            Err(Error::Io(std::io::ErrorKind::NotConnected))
        }
    }

    fn effecter(resolution: f32, offset: f32, modifier: i8) -> Rc<NumericEffecter<NoTransport>> {
        NumericEffecter::new(
            Rc::new(Engine::new(NoTransport, crate::engine::Timeouts::default())),
            Rc::new(LocalBus::new()),
            9,
            "/xyz/openbmc_project/inventory/system/motherboard1/cpu1".to_owned(),
            pdr(resolution, offset, modifier),
        )
    }

    #[test]
    fn unit_conversion_identity() {
        let effecter = effecter(1.0, 0.0, 0);

        assert_eq!(effecter.unit_to_raw(300.0), 300.0);
        assert_eq!(effecter.raw_to_unit(300), 300.0);
        assert_eq!(effecter.min_settable(), 50.0);
        assert_eq!(effecter.max_settable(), 400.0);
    }

    #[test]
    fn unit_conversion_scaled() {
        // milliwatt counts: resolution 1, modifier -3
        let effecter = effecter(1.0, 0.0, -3);

        assert_eq!(effecter.raw_to_unit(250_000), 250.0);
        assert_eq!(effecter.unit_to_raw(250.0), 250_000.0);
    }

    #[test]
    fn range_validation() {
        let effecter = effecter(1.0, 0.0, 0);

        assert!(effecter.in_range(50.0));
        assert!(effecter.in_range(400.0));
        assert!(!effecter.in_range(425.0));
        assert!(!effecter.in_range(49.9));
    }

    #[test]
    fn availability_mapping() {
        assert_eq!(availability(EffecterOperState::EnabledUpdatePending), (true, true));
        assert_eq!(
            availability(EffecterOperState::EnabledNoUpdatePending),
            (true, true)
        );
        assert_eq!(availability(EffecterOperState::Disabled), (true, false));
        assert_eq!(availability(EffecterOperState::Failed), (false, false));
        assert_eq!(availability(EffecterOperState::StatusUnknown), (false, false));
    }
}

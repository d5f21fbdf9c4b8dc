//! Per-command-class response timeouts.

use crate::codec::{platform, PldmType};
use std::time::Duration;

/// `RequestFirmwareData` command number within the firmware update type.
const REQUEST_FIRMWARE_DATA: u8 = 0x15;

/// Response timeouts by command class.
///
/// Most commands answer within the DSP0240 PT2 window; firmware data
/// transfers (`UA_T2`) and host state changes (`UA_T3`) are allowed far
/// longer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Default per-command timeout.
    pub default: Duration,
    /// `RequestFirmwareData` class timeout (`UA_T2`).
    pub firmware_data: Duration,
    /// State-change command class timeout (`UA_T3`).
    pub state_change: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(2),
            firmware_data: Duration::from_secs(90),
            state_change: Duration::from_secs(1800),
        }
    }
}

impl Timeouts {
    /// The timeout for a given `(type, command)` pair.
    pub fn for_command(&self, pldm_type: u8, command: u8) -> Duration {
        if pldm_type == u8::from(PldmType::FwUpdate) && command == REQUEST_FIRMWARE_DATA {
            return self.firmware_data;
        }

        if pldm_type == u8::from(PldmType::Platform)
            && matches!(
                command,
                platform::SET_STATE_EFFECTER_STATES | platform::SET_NUMERIC_EFFECTER_VALUE
            )
        {
            return self.state_change;
        }

        self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        let timeouts = Timeouts::default();

        assert_eq!(
            timeouts.for_command(2, platform::GET_PDR),
            Duration::from_secs(2)
        );
        assert_eq!(
            timeouts.for_command(5, REQUEST_FIRMWARE_DATA),
            Duration::from_secs(90)
        );
        assert_eq!(
            timeouts.for_command(2, platform::SET_STATE_EFFECTER_STATES),
            Duration::from_secs(1800)
        );
    }
}

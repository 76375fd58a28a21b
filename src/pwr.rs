//! Supply voltage
//!
//! Only the supply level matters to this crate: it decides whether the
//! flash wait-state table applies. Voltage scaling and over-drive are
//! not configured here.

/// Supply voltage (VDD) of the device
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Voltage {
    millivolts: u16,
}

/// Above this supply the flash wait-state table is applied
const FLASH_GATE_MV: u16 = 2_700;

impl Voltage {
    /// The usual 3.3 V board supply
    pub const VDD_3V3: Voltage = Voltage::from_millivolts(3_300);

    pub const fn from_millivolts(millivolts: u16) -> Self {
        Voltage { millivolts }
    }

    pub const fn millivolts(self) -> u16 {
        self.millivolts
    }

    /// Whether the flash wait-state table is applied at this supply
    pub const fn gates_flash_latency(self) -> bool {
        self.millivolts > FLASH_GATE_MV
    }
}

impl Default for Voltage {
    fn default() -> Self {
        Voltage::VDD_3V3
    }
}

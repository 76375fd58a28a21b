//! Flash wait-states
//!
//! The number of wait-states must be raised before the system clock is,
//! since the flash cannot be read at a higher clock with fewer wait
//! states. See Table 5 "Number of wait states according to CPU clock
//! (HCLK) frequency" in RM0390.

use crate::pwr::Voltage;
use crate::regs::{acr, read_masked, write_masked, Reg, RegisterBlock};
use crate::time::Hertz;

/// Value of the FLASH_ACR.LATENCY field
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashLatency {
    Ws0 = 0,
    Ws1 = 1,
    Ws2 = 2,
    Ws3 = 3,
    Ws4 = 4,
    Ws5 = 5,
    Ws6 = 6,
    Ws7 = 7,
    Ws8 = 8,
    Ws9 = 9,
    Ws10 = 10,
    Ws11 = 11,
    Ws12 = 12,
    Ws13 = 13,
    Ws14 = 14,
    Ws15 = 15,
}

impl FlashLatency {
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Decode the 4-bit LATENCY field. Upper bits are ignored.
    pub const fn from_bits(bits: u32) -> Self {
        use FlashLatency::*;
        match bits & 0xf {
            0 => Ws0,
            1 => Ws1,
            2 => Ws2,
            3 => Ws3,
            4 => Ws4,
            5 => Ws5,
            6 => Ws6,
            7 => Ws7,
            8 => Ws8,
            9 => Ws9,
            10 => Ws10,
            11 => Ws11,
            12 => Ws12,
            13 => Ws13,
            14 => Ws14,
            _ => Ws15,
        }
    }
}

/// Wait-states needed to run the core at `sys_ck`
///
/// The table only applies above 2.7 V; at or below that supply no
/// wait-states are added.
pub const fn wait_states(sys_ck: Hertz, supply: Voltage) -> FlashLatency {
    if !supply.gates_flash_latency() {
        return FlashLatency::Ws0;
    }

    match sys_ck.0 {
        0..=30_000_000 => FlashLatency::Ws0,
        30_000_001..=60_000_000 => FlashLatency::Ws1,
        60_000_001..=90_000_000 => FlashLatency::Ws2,
        90_000_001..=120_000_000 => FlashLatency::Ws3,
        120_000_001..=150_000_000 => FlashLatency::Ws4,
        _ => FlashLatency::Ws5,
    }
}

/// Currently programmed wait-states
pub fn latency<R: RegisterBlock + ?Sized>(rb: &R) -> FlashLatency {
    FlashLatency::from_bits(read_masked(rb, Reg::FlashAcr, acr::LATENCY))
}

/// Program the wait-states and wait until the flash interface reports
/// them back
pub fn set_latency<R: RegisterBlock + ?Sized>(
    rb: &mut R,
    latency: FlashLatency,
) {
    write_masked(rb, Reg::FlashAcr, acr::LATENCY, latency.bits());
    while self::latency(rb) != latency {
        core::hint::spin_loop();
    }
}

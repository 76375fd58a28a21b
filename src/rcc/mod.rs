//! Reset and Clock Control
//!
//! This module brings up the system clock `sys_ck` of the STM32F4:
//! it starts the root oscillator (HSE or HSI), programs and locks the
//! main PLL when the root oscillator is not already at the target, and
//! switches the system clock multiplexer. The flash wait-states and the
//! APB prescalers are raised first, and lowered to their final values
//! only after the last switch.
//!
//! See Figure 13 "Clock tree" in Reference Manual RM0390.
//!
//! HSI is 16 MHz.
//!
//! # Usage
//!
//! The clock tree is fixed at build time. A [`Config`] builder
//! describes the board; [`Config::checked`] validates it and solves the
//! PLL coefficients. Evaluated in a `const` item, an impossible clock
//! tree is a compile error rather than a hang or a crash at boot.
//!
//! ```rust,ignore
//!     const CLOCKS: ClockPlan = Config::new(mhz(100))
//!         .use_hse(OscillatorSpec::external_clock(mhz(8)))
//!         .checked();
//!
//!     let dp = pac::Peripherals::take().unwrap();
//!
//!     let rcc = dp.RCC.constrain(dp.FLASH);
//!     let ccdr = rcc.freeze(&CLOCKS);
//! ```
//!
//! Without an external oscillator the HSI is used. When the target
//! equals the root oscillator frequency the PLL stays off:
//!
//! ```rust,ignore
//!     const CLOCKS: ClockPlan = Config::new(mhz(16)).checked();
//! ```
//!
//! # Sequencing
//!
//! `freeze` (or [`init`], for any [`RegisterBlock`]) runs the bring-up
//! exactly once and blocks on every ready flag. There is no timeout: an
//! oscillator that never starts is a hardware fault, and an external
//! watchdog is the place to bound start-up time.
//!
//! The PLL P output is selected as the system clock. The PLL R output
//! of the STM32F446 is never used.
//!
//! ```rust,ignore
//! let ccdr = ...; // Returned by `freeze()`, see examples above
//!
//! // Runtime confirmation that sys_ck really is 100MHz
//! assert_eq!(ccdr.clocks.sys_ck().0, 100_000_000);
//! assert_eq!(ccdr.current_system_clock(), Some(ccdr.clocks.sys_ck()));
//! ```
#![deny(missing_docs)]

#[cfg(feature = "device-selected")]
use crate::stm32::{FLASH, RCC};

use crate::flash::FlashLatency;
#[cfg(feature = "device-selected")]
use crate::regs::{Reg, RegisterBlock};
use crate::time::Hertz;

mod config;
pub mod hse;
pub mod hsi;
pub mod pll;
mod sequence;

pub use config::{
    ApbPrescaler, ClockPlan, ClockSource, Config, ConfigError,
    OscillatorSpec, RootSource, SystemClockSource, PCLK1_MAX, PCLK2_MAX,
    SYS_CK_MAX,
};
pub use pll::PllCoefficients;
pub use sequence::{current_system_clock, init, sysclk_source};

/// Frequency of the internal RC oscillator
pub const HSI: Hertz = Hertz(16_000_000);

/// Frozen core clock frequencies
///
/// Describes what [`init`] configured. Use [`current_system_clock`] to
/// read back what the hardware currently runs from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoreClocks {
    sys_ck: Hertz,
    root: RootSource,
    root_ck: Hertz,
    pll_p_ck: Option<Hertz>,
    hclk: Hertz,
    pclk1: Hertz,
    pclk2: Hertz,
    latency: FlashLatency,
}

impl CoreClocks {
    pub(crate) const fn from_plan(plan: &ClockPlan) -> Self {
        let root_ck = plan.root_frequency();
        let pll_p_ck = match plan.pll() {
            Some(pll) => Some(pll.output(root_ck)),
            None => None,
        };

        CoreClocks {
            sys_ck: plan.sys_ck(),
            root: plan.root_source(),
            root_ck,
            pll_p_ck,
            hclk: plan.hclk(),
            pclk1: plan.pclk1(),
            pclk2: plan.pclk2(),
            latency: plan.flash_latency(),
        }
    }

    /// Returns the frequency of the system clock
    pub fn sys_ck(&self) -> Hertz {
        self.sys_ck
    }

    /// Returns the oscillator feeding the system clock or the PLL
    pub fn root_source(&self) -> RootSource {
        self.root
    }

    /// Returns the frequency of the root oscillator
    pub fn root_frequency(&self) -> Hertz {
        self.root_ck
    }

    /// Returns the frequency of the HSE if it is the root oscillator
    pub fn hse_ck(&self) -> Option<Hertz> {
        match self.root {
            RootSource::Hse => Some(self.root_ck),
            RootSource::Hsi => None,
        }
    }

    /// Returns the frequency of the PLL P output if the PLL is running
    pub fn pll_p_ck(&self) -> Option<Hertz> {
        self.pll_p_ck
    }

    /// Returns the frequency of the AHB
    pub fn hclk(&self) -> Hertz {
        self.hclk
    }

    /// Returns the frequency of the APB1
    pub fn pclk1(&self) -> Hertz {
        self.pclk1
    }

    /// Returns the frequency of the APB2
    pub fn pclk2(&self) -> Hertz {
        self.pclk2
    }

    /// Returns the programmed flash wait-states
    pub fn flash_latency(&self) -> FlashLatency {
        self.latency
    }
}

/// Extension trait that constrains the `RCC` peripheral
#[cfg(feature = "device-selected")]
pub trait RccExt {
    /// Constrains the `RCC` peripheral so it plays nicely with the other
    /// abstractions. The flash interface is needed for its wait-states.
    fn constrain(self, flash: FLASH) -> Rcc;
}

#[cfg(feature = "device-selected")]
impl RccExt for RCC {
    fn constrain(self, flash: FLASH) -> Rcc {
        Rcc { rb: self, flash }
    }
}

/// Constrained RCC peripheral
///
/// Generated by calling `constrain` on the PAC's RCC peripheral.
///
/// ```rust,ignore
/// let dp = stm32::Peripherals::take().unwrap();
/// let rcc = dp.RCC.constrain(dp.FLASH);
/// ```
#[cfg(feature = "device-selected")]
pub struct Rcc {
    pub(crate) rb: RCC,
    flash: FLASH,
}

#[cfg(feature = "device-selected")]
impl RegisterBlock for Rcc {
    fn read(&self, reg: Reg) -> u32 {
        match reg {
            Reg::RccCr => self.rb.cr.read().bits(),
            Reg::RccPllcfgr => self.rb.pllcfgr.read().bits(),
            Reg::RccCfgr => self.rb.cfgr.read().bits(),
            Reg::FlashAcr => self.flash.acr.read().bits(),
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        // Only ever written with values derived from a read of the same
        // register, with fields set through `regs::Field`
        unsafe {
            match reg {
                Reg::RccCr => self.rb.cr.write(|w| w.bits(value)),
                Reg::RccPllcfgr => self.rb.pllcfgr.write(|w| w.bits(value)),
                Reg::RccCfgr => self.rb.cfgr.write(|w| w.bits(value)),
                Reg::FlashAcr => self.flash.acr.write(|w| w.bits(value)),
            }
        }
    }
}

#[cfg(feature = "device-selected")]
impl Rcc {
    /// Apply `plan` to the hardware
    ///
    /// Returns only once the system clock runs at `plan.sys_ck()`.
    pub fn freeze(mut self, plan: &ClockPlan) -> Ccdr {
        let clocks = init(&mut self, plan);

        Ccdr {
            clocks,
            rb: self,
        }
    }
}

/// Core Clock Distribution and Reset (CCDR)
///
/// Generated when the RCC is frozen. The configuration of the system
/// clock, the root oscillator and the PLL is frozen.
#[cfg(feature = "device-selected")]
pub struct Ccdr {
    /// Frozen core clocks
    pub clocks: CoreClocks,
    pub(crate) rb: Rcc,
}

#[cfg(feature = "device-selected")]
impl Ccdr {
    /// Current system clock multiplexer setting, read from the hardware
    pub fn sysclk_source(&self) -> SystemClockSource {
        sysclk_source(&self.rb)
    }

    /// Frequency the core currently runs at, read from the hardware
    pub fn current_system_clock(&self) -> Option<Hertz> {
        current_system_clock(&self.rb, &self.clocks)
    }

    /// Releases the RCC and FLASH peripherals. The clock tree keeps
    /// running as configured.
    pub fn release(self) -> (RCC, FLASH) {
        (self.rb.rb, self.rb.flash)
    }
}

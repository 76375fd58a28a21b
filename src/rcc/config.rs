//! Build-time clock configuration
//!
//! A [`Config`] only describes the board. It becomes a [`ClockPlan`]
//! once validated, and validation is a `const fn`: placed in a `const`
//! item, every rejected configuration is a compile error.
//!
//! ```rust,ignore
//! const CLOCKS: ClockPlan = Config::new(mhz(180))
//!     .use_hse(OscillatorSpec::crystal(mhz(8)))
//!     .checked();
//! ```
//!
//! ```compile_fail
//! use stm32f4xx_clocktree::rcc::{ClockPlan, Config};
//! use stm32f4xx_clocktree::time::hz;
//!
//! // No PLL setting produces 1 Hz
//! const CLOCKS: ClockPlan = Config::new(hz(1)).checked();
//! ```

use core::fmt;

use super::pll::{self, PllCoefficients};
use super::HSI;
use crate::flash::{self, FlashLatency};
use crate::pwr::Voltage;
use crate::time::Hertz;

/// Highest rated system clock of the 180 MHz parts
pub const SYS_CK_MAX: Hertz = Hertz(180_000_000);
/// Highest APB1 (low speed) bus clock
pub const PCLK1_MAX: Hertz = Hertz(45_000_000);
/// Highest APB2 (high speed) bus clock
pub const PCLK2_MAX: Hertz = Hertz(90_000_000);

const HSE_CRYSTAL_MIN: u32 = 4_000_000;
const HSE_CRYSTAL_MAX: u32 = 26_000_000;
const HSE_BYPASS_MIN: u32 = 1_000_000;
const HSE_BYPASS_MAX: u32 = 50_000_000;

/// What is connected to the HSE pins
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Nothing, the HSE is not used
    None,
    /// A crystal or ceramic resonator, driven by the HSE oscillator
    Crystal,
    /// An external clock signal, the HSE oscillator is bypassed
    ExternalClock,
}

/// External oscillator wired to the device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OscillatorSpec {
    /// Kind of oscillator
    pub source: ClockSource,
    /// Its frequency
    pub frequency: Hertz,
}

impl OscillatorSpec {
    /// No external oscillator
    pub const NONE: OscillatorSpec = OscillatorSpec {
        source: ClockSource::None,
        frequency: Hertz(0),
    };

    /// A crystal of `frequency`
    pub const fn crystal(frequency: Hertz) -> Self {
        OscillatorSpec {
            source: ClockSource::Crystal,
            frequency,
        }
    }

    /// An external clock signal of `frequency`
    pub const fn external_clock(frequency: Hertz) -> Self {
        OscillatorSpec {
            source: ClockSource::ExternalClock,
            frequency,
        }
    }

    /// Whether the HSE must run in bypass mode
    pub const fn bypass(&self) -> bool {
        matches!(self.source, ClockSource::ExternalClock)
    }
}

/// Oscillator feeding either the system clock or the PLL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RootSource {
    /// External oscillator
    Hse,
    /// Internal 16 MHz RC oscillator
    Hsi,
}

impl RootSource {
    /// System clock multiplexer setting that selects this oscillator
    pub const fn sysclk_source(self) -> SystemClockSource {
        match self {
            RootSource::Hse => SystemClockSource::Hse,
            RootSource::Hsi => SystemClockSource::Hsi,
        }
    }
}

/// System clock multiplexer, RCC_CFGR SW / SWS encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemClockSource {
    /// HSI oscillator
    Hsi = 0b00,
    /// HSE oscillator
    Hse = 0b01,
    /// PLL P output
    PllP = 0b10,
    /// PLL R output. Only exists on parts with a PLL R divider
    /// (STM32F446); never selected by this crate.
    PllR = 0b11,
}

impl SystemClockSource {
    /// Field value for SW / SWS
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Decode an SW / SWS field value
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => SystemClockSource::Hsi,
            0b01 => SystemClockSource::Hse,
            0b10 => SystemClockSource::PllP,
            _ => SystemClockSource::PllR,
        }
    }
}

/// APB prescaler, RCC_CFGR PPRE1 / PPRE2 encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbPrescaler {
    /// HCLK not divided
    Div1 = 0b000,
    /// HCLK divided by 2
    Div2 = 0b100,
    /// HCLK divided by 4
    Div4 = 0b101,
    /// HCLK divided by 8
    Div8 = 0b110,
    /// HCLK divided by 16
    Div16 = 0b111,
}

impl ApbPrescaler {
    /// Field value for PPRE1 / PPRE2
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Decode a PPRE1 / PPRE2 field value. Every value below 0b100 is
    /// an undivided clock.
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0b100 => ApbPrescaler::Div2,
            0b101 => ApbPrescaler::Div4,
            0b110 => ApbPrescaler::Div8,
            0b111 => ApbPrescaler::Div16,
            _ => ApbPrescaler::Div1,
        }
    }

    /// Division factor
    pub const fn divisor(self) -> u32 {
        match self {
            ApbPrescaler::Div1 => 1,
            ApbPrescaler::Div2 => 2,
            ApbPrescaler::Div4 => 4,
            ApbPrescaler::Div8 => 8,
            ApbPrescaler::Div16 => 16,
        }
    }

    /// Smallest division keeping `hclk` at or below `max`
    pub const fn for_limit(hclk: Hertz, max: Hertz) -> Self {
        let ratio = (hclk.0 + max.0 - 1) / max.0;
        match ratio {
            0 | 1 => ApbPrescaler::Div1,
            2 => ApbPrescaler::Div2,
            3 | 4 => ApbPrescaler::Div4,
            5..=8 => ApbPrescaler::Div8,
            _ => ApbPrescaler::Div16,
        }
    }
}

/// Reasons a configuration is rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The target system clock is 0 Hz
    TargetZero,
    /// The target system clock is above 180 MHz
    TargetTooHigh,
    /// An external oscillator is declared with a frequency of 0 Hz
    HseFrequencyZero,
    /// The external oscillator frequency is outside the range the HSE
    /// accepts in the declared mode
    HseOutOfRange,
    /// The PLL is needed, but no M, N, P reaches the target exactly
    NoPllSolution,
}

impl ConfigError {
    /// Human readable description
    pub const fn message(self) -> &'static str {
        match self {
            ConfigError::TargetZero => "System clock must not be 0 Hz",
            ConfigError::TargetTooHigh => {
                "System clock must not exceed 180 MHz"
            }
            ConfigError::HseFrequencyZero => {
                "External clock source given, but frequency is 0"
            }
            ConfigError::HseOutOfRange => {
                "External clock frequency out of range (crystal 4-26 MHz, bypass 1-50 MHz)"
            }
            ConfigError::NoPllSolution => {
                "No PLL setting produces the system clock exactly"
            }
        }
    }

    const fn panic(self) -> ! {
        panic!("{}", self.message())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Description of the clock tree wanted by a board
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    sys_ck: Hertz,
    hse: OscillatorSpec,
    supply: Voltage,
}

impl Config {
    /// Run the core at `sys_ck`, from the HSI, at 3.3 V
    pub const fn new(sys_ck: Hertz) -> Self {
        Config {
            sys_ck,
            hse: OscillatorSpec::NONE,
            supply: Voltage::VDD_3V3,
        }
    }

    /// Use the external oscillator described by `hse`
    pub const fn use_hse(mut self, hse: OscillatorSpec) -> Self {
        self.hse = hse;
        self
    }

    /// Supply voltage of the board
    pub const fn supply(mut self, supply: Voltage) -> Self {
        self.supply = supply;
        self
    }

    /// HSE if an external oscillator with a frequency is declared,
    /// otherwise HSI
    pub const fn root_source(&self) -> RootSource {
        match self.hse.source {
            ClockSource::None => RootSource::Hsi,
            ClockSource::Crystal | ClockSource::ExternalClock => {
                if self.hse.frequency.0 > 0 {
                    RootSource::Hse
                } else {
                    RootSource::Hsi
                }
            }
        }
    }

    /// Frequency of the root oscillator
    pub const fn root_frequency(&self) -> Hertz {
        match self.root_source() {
            RootSource::Hse => self.hse.frequency,
            RootSource::Hsi => HSI,
        }
    }

    /// Validate the configuration and solve the PLL coefficients
    pub const fn validate(&self) -> Result<ClockPlan, ConfigError> {
        if self.sys_ck.0 == 0 {
            return Err(ConfigError::TargetZero);
        }
        if self.sys_ck.0 > SYS_CK_MAX.0 {
            return Err(ConfigError::TargetTooHigh);
        }

        let hse_ck = self.hse.frequency.0;
        let (hse_min, hse_max) = match self.hse.source {
            ClockSource::None => (0, u32::MAX),
            ClockSource::Crystal => (HSE_CRYSTAL_MIN, HSE_CRYSTAL_MAX),
            ClockSource::ExternalClock => (HSE_BYPASS_MIN, HSE_BYPASS_MAX),
        };
        if !matches!(self.hse.source, ClockSource::None) {
            if hse_ck == 0 {
                return Err(ConfigError::HseFrequencyZero);
            }
            if hse_ck < hse_min || hse_ck > hse_max {
                return Err(ConfigError::HseOutOfRange);
            }
        }

        let root = self.root_source();
        let root_ck = self.root_frequency();

        // The root oscillator runs the core directly when it already
        // has the right frequency
        let pll = if root_ck.0 == self.sys_ck.0 {
            None
        } else {
            match pll::solve(self.sys_ck, root_ck) {
                Some(coefficients) => Some(coefficients),
                None => return Err(ConfigError::NoPllSolution),
            }
        };

        // The core briefly runs from the root oscillator before the PLL
        // is selected, so the latency must cover both
        let peak = self.sys_ck.max(root_ck);
        let latency = flash::wait_states(peak, self.supply);

        Ok(ClockPlan {
            config: *self,
            root,
            root_ck,
            pll,
            latency,
            ppre1: ApbPrescaler::for_limit(self.sys_ck, PCLK1_MAX),
            ppre2: ApbPrescaler::for_limit(self.sys_ck, PCLK2_MAX),
            bring_up_ppre1: ApbPrescaler::for_limit(peak, PCLK1_MAX),
            bring_up_ppre2: ApbPrescaler::for_limit(peak, PCLK2_MAX),
        })
    }

    /// Validate the configuration, panicking with a descriptive message
    /// if it is rejected. In a `const` context the panic is a compile
    /// error.
    pub const fn check(&self) {
        if let Err(e) = self.validate() {
            e.panic()
        }
    }

    /// Validate and return the [`ClockPlan`]. Use in a `const` item to
    /// get compile-time checking.
    pub const fn checked(self) -> ClockPlan {
        match self.validate() {
            Ok(plan) => plan,
            Err(e) => e.panic(),
        }
    }
}

/// A validated clock tree, ready to be applied by
/// [`init`](super::init) or [`Rcc::freeze`](super::Rcc::freeze)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockPlan {
    config: Config,
    root: RootSource,
    root_ck: Hertz,
    pll: Option<PllCoefficients>,
    latency: FlashLatency,
    ppre1: ApbPrescaler,
    ppre2: ApbPrescaler,
    bring_up_ppre1: ApbPrescaler,
    bring_up_ppre2: ApbPrescaler,
}

impl ClockPlan {
    /// Target system clock
    pub const fn sys_ck(&self) -> Hertz {
        self.config.sys_ck
    }

    /// External oscillator as declared
    pub const fn oscillator(&self) -> OscillatorSpec {
        self.config.hse
    }

    /// Supply voltage as declared
    pub const fn supply(&self) -> Voltage {
        self.config.supply
    }

    /// Oscillator feeding the system clock or the PLL
    pub const fn root_source(&self) -> RootSource {
        self.root
    }

    /// Frequency of the root oscillator
    pub const fn root_frequency(&self) -> Hertz {
        self.root_ck
    }

    /// PLL coefficients, `None` when the root oscillator runs the core
    pub const fn pll(&self) -> Option<PllCoefficients> {
        self.pll
    }

    /// Final system clock multiplexer setting
    pub const fn sysclk_source(&self) -> SystemClockSource {
        match self.pll {
            Some(_) => SystemClockSource::PllP,
            None => self.root.sysclk_source(),
        }
    }

    /// Flash wait-states programmed before any clock change
    pub const fn flash_latency(&self) -> FlashLatency {
        self.latency
    }

    /// APB1 prescaler
    pub const fn ppre1(&self) -> ApbPrescaler {
        self.ppre1
    }

    /// APB2 prescaler
    pub const fn ppre2(&self) -> ApbPrescaler {
        self.ppre2
    }

    /// APB1 and APB2 prescalers that keep both busses within their
    /// limits while the root oscillator drives the core
    pub const fn bring_up_prescalers(&self) -> (ApbPrescaler, ApbPrescaler) {
        (self.bring_up_ppre1, self.bring_up_ppre2)
    }

    /// AHB clock. The AHB prescaler is left at 1.
    pub const fn hclk(&self) -> Hertz {
        self.config.sys_ck
    }

    /// APB1 clock
    pub const fn pclk1(&self) -> Hertz {
        Hertz(self.hclk().0 / self.ppre1.divisor())
    }

    /// APB2 clock
    pub const fn pclk2(&self) -> Hertz {
        Hertz(self.hclk().0 / self.ppre2.divisor())
    }
}

//! Clock tree bring-up for STM32F4 microcontrollers
//!
//! The system clock configuration is fixed at build time. A
//! [`Config`](rcc::Config) is validated in a `const` context, which
//! runs the PLL coefficient search during compilation: a clock tree
//! that the hardware cannot produce never becomes a firmware image.
//!
//! ```rust,ignore
//! use stm32f4xx_clocktree::{pac, prelude::*};
//! use stm32f4xx_clocktree::rcc::{ClockPlan, Config, OscillatorSpec};
//! use stm32f4xx_clocktree::time::mhz;
//!
//! const CLOCKS: ClockPlan = Config::new(mhz(100))
//!     .use_hse(OscillatorSpec::external_clock(mhz(8)))
//!     .checked();
//!
//! let dp = pac::Peripherals::take().unwrap();
//! let ccdr = dp.RCC.constrain(dp.FLASH).freeze(&CLOCKS);
//! assert_eq!(ccdr.clocks.sys_ck(), mhz(100));
//! ```
#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "stm32f429", feature = "stm32f446"))]
compile_error!("Select only one device feature");
#[cfg(all(feature = "stm32f429", feature = "stm32f469"))]
compile_error!("Select only one device feature");
#[cfg(all(feature = "stm32f446", feature = "stm32f469"))]
compile_error!("Select only one device feature");

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

#[cfg(feature = "stm32f429")]
pub use stm32f4::stm32f429 as stm32;
#[cfg(feature = "stm32f446")]
pub use stm32f4::stm32f446 as stm32;
#[cfg(feature = "stm32f469")]
pub use stm32f4::stm32f469 as stm32;

#[cfg(feature = "device-selected")]
pub use crate::stm32 as pac;

pub mod flash;
pub mod pwr;
pub mod rcc;
pub mod regs;
pub mod time;

pub mod prelude {
    //! Extension traits, glob import with `use stm32f4xx_clocktree::prelude::*`
    #[cfg(feature = "device-selected")]
    pub use crate::rcc::RccExt as _stm32f4xx_clocktree_rcc_RccExt;
    pub use crate::time::U32Ext as _stm32f4xx_clocktree_time_U32Ext;
}

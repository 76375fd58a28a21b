#![deny(warnings)]
#![no_main]
#![no_std]

use panic_halt as _;

use cortex_m_rt::entry;
use rtt_target::{rprintln, rtt_init_print};
use stm32f4xx_clocktree::rcc::{ClockPlan, Config, OscillatorSpec, HSI};
use stm32f4xx_clocktree::time::mhz;
use stm32f4xx_clocktree::{pac, prelude::*};

// 8 MHz clock from the ST-LINK MCO, PLL up to 100 MHz
const CLOCKS: ClockPlan = Config::new(mhz(100))
    .use_hse(OscillatorSpec::external_clock(mhz(8)))
    .checked();

#[entry]
fn main() -> ! {
    rtt_init_print!();
    let dp = pac::Peripherals::take().unwrap();

    rprintln!("");
    rprintln!("stm32f4xx-clocktree example - sysclk");
    rprintln!("");

    // Constrain and Freeze clock
    let rcc = dp.RCC.constrain(dp.FLASH);
    let ccdr = rcc.freeze(&CLOCKS);

    rprintln!("hsi:     {}", HSI);
    rprintln!(
        "root:    {:?} {}",
        ccdr.clocks.root_source(),
        ccdr.clocks.root_frequency()
    );
    rprintln!("sys_ck:  {}", ccdr.clocks.sys_ck());
    rprintln!("pclk1:   {}", ccdr.clocks.pclk1());
    rprintln!("pclk2:   {}", ccdr.clocks.pclk2());
    rprintln!("latency: {:?}", ccdr.clocks.flash_latency());

    match ccdr.current_system_clock() {
        Some(f) => rprintln!("current: {} ({:?})", f, ccdr.sysclk_source()),
        None => rprintln!("current: unknown ({:?})", ccdr.sysclk_source()),
    }

    loop {
        cortex_m::asm::wfi();
    }
}

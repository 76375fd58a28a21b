//! Clock tree bring-up
//!
//! Runs once, before anything else, and only moves forward:
//!
//! ```text
//! Reset -> RootEnabled -> RootSelected -+-> PllConfigured -> PllEnabled -> PllSelected
//!                                       +-> Done
//! ```
//!
//! While still in `Reset` the flash wait-states and APB prescalers are
//! raised to cover both the clock the core may already run from and
//! every clock it runs from during bring-up. They are only lowered to
//! their final values once the last switch is done.

use super::config::{ApbPrescaler, ClockPlan, RootSource, SystemClockSource};
use super::pll::{self, PllCoefficients};
use super::{hse, hsi, CoreClocks};
use crate::flash;
use crate::regs::{cfgr, read_masked, write_masked, Field, Reg, RegisterBlock};
use crate::time::Hertz;

/// Progress of the bring-up
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Stage {
    /// Nothing done yet, or only flash and busses prepared
    Reset,
    /// Root oscillator running
    RootEnabled,
    /// Root oscillator drives the core, the other one is off
    RootSelected,
    /// PLL stopped and reprogrammed
    PllConfigured,
    /// PLL locked
    PllEnabled,
    /// PLL P output drives the core
    PllSelected,
    /// Root oscillator drives the core, PLL left off
    Done,
}

struct Sequencer<'a, R: ?Sized> {
    rb: &'a mut R,
    stage: Stage,
}

impl<'a, R: RegisterBlock + ?Sized> Sequencer<'a, R> {
    fn new(rb: &'a mut R) -> Self {
        Sequencer {
            rb,
            stage: Stage::Reset,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "{:?} -> {:?}", self.stage, next);
        trace!("rcc: {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    /// Raise flash wait-states and bus prescalers so that they hold for
    /// the current clock and every clock of the bring-up. Never lowers.
    fn prepare(&mut self, plan: &ClockPlan) {
        let latency = flash::latency(&*self.rb).max(plan.flash_latency());
        flash::set_latency(self.rb, latency);

        let (ppre1, ppre2) = plan.bring_up_prescalers();
        let ppre1 = self.prescaler(cfgr::PPRE1).max(ppre1);
        let ppre2 = self.prescaler(cfgr::PPRE2).max(ppre2);
        write_masked(self.rb, Reg::RccCfgr, cfgr::PPRE1, ppre1.bits());
        write_masked(self.rb, Reg::RccCfgr, cfgr::PPRE2, ppre2.bits());
    }

    /// Final flash wait-states and bus prescalers, once the core runs
    /// from its final clock
    fn finish(&mut self, plan: &ClockPlan) {
        flash::set_latency(self.rb, plan.flash_latency());
        write_masked(self.rb, Reg::RccCfgr, cfgr::PPRE1, plan.ppre1().bits());
        write_masked(self.rb, Reg::RccCfgr, cfgr::PPRE2, plan.ppre2().bits());
    }

    fn prescaler(&self, field: Field) -> ApbPrescaler {
        ApbPrescaler::from_bits(read_masked(&*self.rb, Reg::RccCfgr, field))
    }

    /// Switch the system clock multiplexer and wait until the hardware
    /// reports the switch
    fn select(&mut self, source: SystemClockSource) {
        write_masked(self.rb, Reg::RccCfgr, cfgr::SW, source.bits());
        while read_masked(self.rb, Reg::RccCfgr, cfgr::SWS) != source.bits() {
            core::hint::spin_loop();
        }
    }

    fn root(&mut self, plan: &ClockPlan) {
        match plan.root_source() {
            RootSource::Hse => {
                hse::enable(self.rb, plan.oscillator().bypass());
                self.advance(Stage::RootEnabled);
                self.select(SystemClockSource::Hse);
                hsi::disable(self.rb);
            }
            RootSource::Hsi => {
                hsi::enable(self.rb);
                self.advance(Stage::RootEnabled);
                self.select(SystemClockSource::Hsi);
                hse::disable(self.rb);
            }
        }
        self.advance(Stage::RootSelected);
    }

    fn pll(&mut self, coefficients: &PllCoefficients, source: RootSource) {
        pll::disable(self.rb);
        pll::configure(self.rb, coefficients, source);
        self.advance(Stage::PllConfigured);

        pll::enable(self.rb);
        self.advance(Stage::PllEnabled);

        self.select(SystemClockSource::PllP);
        self.advance(Stage::PllSelected);
    }

    fn run(mut self, plan: &ClockPlan) -> Stage {
        self.prepare(plan);
        self.root(plan);

        match plan.pll() {
            Some(coefficients) => self.pll(&coefficients, plan.root_source()),
            None => {
                pll::disable(self.rb);
                self.advance(Stage::Done);
            }
        }
        self.finish(plan);

        self.stage
    }
}

/// Bring the clock tree up as described by `plan`
///
/// Blocks until every oscillator and the PLL report ready. Never fails:
/// all checks happened when `plan` was built.
pub fn init<R: RegisterBlock + ?Sized>(rb: &mut R, plan: &ClockPlan) -> CoreClocks {
    let stage = Sequencer::new(rb).run(plan);
    let clocks = CoreClocks::from_plan(plan);

    debug!(
        "rcc: {:?}, sys_ck {} from {:?} {}, {:?}",
        stage,
        clocks.sys_ck(),
        clocks.root_source(),
        clocks.root_frequency(),
        clocks.flash_latency()
    );

    clocks
}

/// Current setting of the system clock multiplexer, as reported by
/// CFGR.SWS
pub fn sysclk_source<R: RegisterBlock + ?Sized>(rb: &R) -> SystemClockSource {
    SystemClockSource::from_bits(read_masked(rb, Reg::RccCfgr, cfgr::SWS))
}

/// Frequency of the oscillator currently driving the core
///
/// `None` if the multiplexer selects a clock that `clocks` does not
/// describe.
pub fn current_system_clock<R: RegisterBlock + ?Sized>(
    rb: &R,
    clocks: &CoreClocks,
) -> Option<Hertz> {
    match sysclk_source(rb) {
        SystemClockSource::Hsi => Some(super::HSI),
        SystemClockSource::Hse => clocks.hse_ck(),
        SystemClockSource::PllP => clocks.pll_p_ck(),
        SystemClockSource::PllR => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::FlashLatency;
    use crate::pwr::Voltage;
    use crate::rcc::config::{Config, OscillatorSpec, PCLK1_MAX};
    use crate::regs::sim::{SimRegisters, Write};
    use crate::regs::{acr, cr, pllcfgr};
    use crate::time::mhz;

    fn bring_up(plan: &ClockPlan, rb: &mut SimRegisters) -> Stage {
        Sequencer::new(rb).run(plan)
    }

    fn sw_changed(w: &Write) -> bool {
        w.reg == Reg::RccCfgr && cfgr::SW.extract(w.old) != cfgr::SW.extract(w.new)
    }

    fn latency_written(w: &Write) -> bool {
        w.reg == Reg::FlashAcr
    }

    fn prescaler(field: Field, cfgr_value: u32) -> ApbPrescaler {
        ApbPrescaler::from_bits(field.extract(cfgr_value))
    }

    fn ppre1_changed(w: &Write) -> bool {
        w.reg == Reg::RccCfgr
            && cfgr::PPRE1.extract(w.old) != cfgr::PPRE1.extract(w.new)
    }

    #[test]
    fn external_clock_to_100mhz() {
        let plan = Config::new(mhz(100))
            .use_hse(OscillatorSpec::external_clock(mhz(8)))
            .checked();
        let mut rb = SimRegisters::reset();

        assert_eq!(bring_up(&plan, &mut rb), Stage::PllSelected);

        let cr_value = rb.value(Reg::RccCr);
        assert_eq!(cr_value & cr::HSEBYP, cr::HSEBYP);
        assert_eq!(cr_value & cr::HSEON, cr::HSEON);
        assert_eq!(cr_value & cr::HSION, 0);
        assert_eq!(cr_value & cr::PLLRDY, cr::PLLRDY);

        let pllcfgr_value = rb.value(Reg::RccPllcfgr);
        assert_eq!(pllcfgr::PLLM.extract(pllcfgr_value), 4);
        assert_eq!(pllcfgr::PLLN.extract(pllcfgr_value), 100);
        assert_eq!(pllcfgr::PLLP.extract(pllcfgr_value), 0b00);
        assert_eq!(pllcfgr_value & pllcfgr::PLLSRC, pllcfgr::PLLSRC);

        assert_eq!(sysclk_source(&rb), SystemClockSource::PllP);
        assert_eq!(
            acr::LATENCY.extract(rb.value(Reg::FlashAcr)),
            FlashLatency::Ws3.bits()
        );
        assert_eq!(
            cfgr::PPRE1.extract(rb.value(Reg::RccCfgr)),
            ApbPrescaler::Div4.bits()
        );
        assert_eq!(
            cfgr::PPRE2.extract(rb.value(Reg::RccCfgr)),
            ApbPrescaler::Div2.bits()
        );

        // HSE selected before the PLL
        let switches: Vec<u32> = rb
            .writes_to(Reg::RccCfgr)
            .filter(|w| sw_changed(w))
            .map(|w| cfgr::SW.extract(w.new))
            .collect();
        assert_eq!(
            switches,
            [SystemClockSource::Hse.bits(), SystemClockSource::PllP.bits()]
        );
    }

    #[test]
    fn hsi_identity_leaves_pll_alone() {
        let plan = Config::new(mhz(16)).checked();
        let mut rb = SimRegisters::reset();

        assert_eq!(bring_up(&plan, &mut rb), Stage::Done);

        assert_eq!(rb.first(|w| w.reg == Reg::RccPllcfgr), None);
        assert_eq!(rb.first(|w| w.rising(cr::PLLON)), None);
        assert_eq!(rb.value(Reg::RccCr) & (cr::PLLON | cr::HSEON), 0);
        assert_eq!(sysclk_source(&rb), SystemClockSource::Hsi);
        assert_eq!(
            acr::LATENCY.extract(rb.value(Reg::FlashAcr)),
            FlashLatency::Ws0.bits()
        );
    }

    #[test]
    fn crystal_identity_runs_from_hse() {
        let plan = Config::new(mhz(25))
            .use_hse(OscillatorSpec::crystal(mhz(25)))
            .checked();
        let mut rb = SimRegisters::reset();

        assert_eq!(bring_up(&plan, &mut rb), Stage::Done);

        let cr_value = rb.value(Reg::RccCr);
        assert_eq!(cr_value & cr::HSEBYP, 0);
        assert_eq!(cr_value & cr::HSION, 0);
        assert_eq!(cr_value & cr::PLLON, 0);
        assert_eq!(sysclk_source(&rb), SystemClockSource::Hse);
    }

    #[test]
    fn latency_precedes_every_switch() {
        let plans = [
            Config::new(mhz(16)).checked(),
            Config::new(mhz(180)).checked(),
            Config::new(mhz(84))
                .use_hse(OscillatorSpec::crystal(mhz(25)))
                .checked(),
            Config::new(mhz(168))
                .use_hse(OscillatorSpec::external_clock(mhz(8)))
                .checked(),
        ];

        for plan in plans.iter() {
            let mut rb = SimRegisters::reset();
            bring_up(plan, &mut rb);

            let latency = rb.first(latency_written).unwrap();
            if let Some(switch) = rb.first(sw_changed) {
                assert!(latency < switch, "{:?}", plan);

                // Busses are slowed down before the switch, too
                if let Some(prescaler) = rb.first(ppre1_changed) {
                    assert!(prescaler < switch, "{:?}", plan);
                }
            }
        }
    }

    #[test]
    fn running_pll_is_stopped_before_reprogramming() {
        // Left running at 96 MHz from HSI by a bootloader, but not
        // selected
        let mut rb = SimRegisters::reset()
            .preload(Reg::RccCr, 0x0000_0083 | cr::PLLON | cr::PLLRDY);
        let plan = Config::new(mhz(180)).checked();

        assert_eq!(bring_up(&plan, &mut rb), Stage::PllSelected);

        let off = rb.first(|w| w.falling(cr::PLLON)).unwrap();
        let first_cfg = rb.first(|w| w.reg == Reg::RccPllcfgr).unwrap();
        let last_cfg = rb
            .trace
            .iter()
            .rposition(|w| w.reg == Reg::RccPllcfgr)
            .unwrap();
        let on = rb.first(|w| w.rising(cr::PLLON)).unwrap();

        let to_pll = rb
            .first(|w| sw_changed(w) && cfgr::SW.extract(w.new) == 0b10)
            .unwrap();

        assert!(off < first_cfg);
        assert!(last_cfg < on);
        assert!(on < to_pll);
    }

    #[test]
    fn switches_back_from_pll_before_stopping_it() {
        // PLL already drives the core when the sequence starts
        let mut rb = SimRegisters::reset()
            .preload(Reg::RccCr, 0x0000_0083 | cr::PLLON | cr::PLLRDY)
            .preload(Reg::RccCfgr, SystemClockSource::PllP.bits());
        let plan = Config::new(mhz(16)).checked();

        assert_eq!(bring_up(&plan, &mut rb), Stage::Done);

        let to_hsi = rb.first(sw_changed).unwrap();
        let off = rb.first(|w| w.falling(cr::PLLON)).unwrap();
        assert!(to_hsi < off);
        assert_eq!(sysclk_source(&rb), SystemClockSource::Hsi);
    }

    #[test]
    fn limits_held_until_running_pll_is_left() {
        // PLL drives the core at its highest rate with 5 wait-states and
        // divided busses when the sequence starts
        let cfgr_value = SystemClockSource::PllP.bits()
            | cfgr::PPRE1.bits(ApbPrescaler::Div4.bits())
            | cfgr::PPRE2.bits(ApbPrescaler::Div2.bits());
        let mut rb = SimRegisters::reset()
            .preload(Reg::RccCr, 0x0000_0083 | cr::PLLON | cr::PLLRDY)
            .preload(Reg::RccCfgr, cfgr_value)
            .preload(Reg::FlashAcr, FlashLatency::Ws5.bits());
        let plan = Config::new(mhz(16)).checked();

        assert_eq!(bring_up(&plan, &mut rb), Stage::Done);

        let to_hsi = rb.first(sw_changed).unwrap();
        for (i, w) in rb.trace.iter().enumerate().take(to_hsi) {
            match w.reg {
                Reg::FlashAcr => assert!(
                    acr::LATENCY.extract(w.new) >= FlashLatency::Ws5.bits(),
                    "latency lowered at write #{} while on the PLL",
                    i
                ),
                Reg::RccCfgr => {
                    assert!(prescaler(cfgr::PPRE1, w.new) >= ApbPrescaler::Div4);
                    assert!(prescaler(cfgr::PPRE2, w.new) >= ApbPrescaler::Div2);
                }
                _ => {}
            }
        }

        // Lowered once the HSI drives the core
        let lowered = rb
            .first(|w| {
                latency_written(w) && acr::LATENCY.extract(w.new) == 0
            })
            .unwrap();
        assert!(to_hsi < lowered);
        assert_eq!(flash::latency(&rb), FlashLatency::Ws0);
        assert_eq!(
            prescaler(cfgr::PPRE1, rb.value(Reg::RccCfgr)),
            ApbPrescaler::Div1
        );
        assert_eq!(
            prescaler(cfgr::PPRE2, rb.value(Reg::RccCfgr)),
            ApbPrescaler::Div1
        );
    }

    #[test]
    fn higher_latency_is_raised_before_switch() {
        // Left at 1 wait-state by a bootloader, 180 MHz needs 5
        let mut rb = SimRegisters::reset()
            .preload(Reg::FlashAcr, FlashLatency::Ws1.bits());
        let plan = Config::new(mhz(180)).checked();

        bring_up(&plan, &mut rb);

        let raised = rb
            .first(|w| {
                latency_written(w)
                    && acr::LATENCY.extract(w.new) == FlashLatency::Ws5.bits()
            })
            .unwrap();
        let switch = rb.first(sw_changed).unwrap();
        assert!(raised < switch);
        assert_eq!(flash::latency(&rb), FlashLatency::Ws5);
    }

    #[test]
    fn apb1_stays_in_range_while_root_drives_core() {
        let plan = Config::new(mhz(24))
            .use_hse(OscillatorSpec::external_clock(mhz(48)))
            .checked();
        let mut rb = SimRegisters::reset();

        assert_eq!(bring_up(&plan, &mut rb), Stage::PllSelected);

        // Every switch happens with APB1 divided for 48 MHz
        for w in rb.writes_to(Reg::RccCfgr).filter(|w| sw_changed(w)) {
            let div = prescaler(cfgr::PPRE1, w.new).divisor();
            assert!(mhz(48).raw() / div <= PCLK1_MAX.raw(), "{:?}", w);
        }

        // Undivided once the PLL runs the core at 24 MHz
        assert_eq!(
            prescaler(cfgr::PPRE1, rb.value(Reg::RccCfgr)),
            ApbPrescaler::Div1
        );
        assert_eq!(sysclk_source(&rb), SystemClockSource::PllP);
    }

    #[test]
    fn low_supply_skips_wait_states() {
        let plan = Config::new(mhz(168))
            .supply(Voltage::from_millivolts(2_500))
            .checked();
        let mut rb = SimRegisters::reset();
        bring_up(&plan, &mut rb);

        assert_eq!(flash::latency(&rb), FlashLatency::Ws0);
    }

    #[test]
    fn init_reports_clocks() {
        let plan = Config::new(mhz(100))
            .use_hse(OscillatorSpec::external_clock(mhz(8)))
            .checked();
        let mut rb = SimRegisters::reset();

        let clocks = init(&mut rb, &plan);

        assert_eq!(clocks.sys_ck(), mhz(100));
        assert_eq!(clocks.root_frequency(), mhz(8));
        assert_eq!(clocks.pll_p_ck(), Some(mhz(100)));
        assert_eq!(current_system_clock(&rb, &clocks), Some(mhz(100)));
    }

    #[test]
    fn current_clock_before_init_is_hsi() {
        let plan = Config::new(mhz(180)).checked();
        let rb = SimRegisters::reset();
        let clocks = CoreClocks::from_plan(&plan);

        assert_eq!(current_system_clock(&rb, &clocks), Some(mhz(16)));
    }
}

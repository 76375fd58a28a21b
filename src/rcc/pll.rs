//! Phase Locked Loop Configuration
//!
//! The main PLL produces `sys_ck` from the root oscillator:
//!
//! ```text
//! vco_input  = source / M        1 ..= 2 MHz
//! vco_output = vco_input * N   100 ..= 432 MHz
//! pll_p_ck   = vco_output / P    exactly the target
//! ```
//!
//! with M in 2..=63, N in 50..=432 and P one of 2, 4, 6, 8. See 6.3.2
//! "RCC PLL configuration register" in RM0390.
//!
//! Only exact solutions are accepted. There is no best-effort
//! approximation: a target that cannot be reached exactly is a
//! configuration error.

use super::config::RootSource;
use crate::regs::{
    clear_bits, cr, pllcfgr, set_bits, wait_for_bits, write_masked, Reg,
    RegisterBlock,
};
use crate::time::Hertz;

const PLLM_MIN: u32 = 2;
const PLLM_MAX: u32 = 63;
const PLLN_MIN: u32 = 50;
const PLLN_MAX: u32 = 432;
const PLLP: [u32; 4] = [2, 4, 6, 8];

const VCO_INPUT_MIN: u32 = 1_000_000;
const VCO_INPUT_MAX: u32 = 2_000_000;
const VCO_OUTPUT_MIN: u32 = 100_000_000;
const VCO_OUTPUT_MAX: u32 = 432_000_000;

/// Divider and multiplier settings of the main PLL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllCoefficients {
    /// Input divider, 2..=63
    pub m: u32,
    /// VCO multiplier, 50..=432
    pub n: u32,
    /// Output divider for the system clock, 2, 4, 6 or 8
    pub p: u32,
}

impl PllCoefficients {
    /// VCO input frequency for `source`. 0 Hz if M is 0.
    pub const fn vco_input(&self, source: Hertz) -> Hertz {
        match source.0.checked_div(self.m) {
            Some(f) => Hertz(f),
            None => Hertz(0),
        }
    }

    /// VCO output frequency for `source`, saturating at `u32::MAX` Hz
    pub const fn vco_output(&self, source: Hertz) -> Hertz {
        Hertz(self.vco_input(source).0.saturating_mul(self.n))
    }

    /// P output frequency for `source`. 0 Hz if P is 0.
    pub const fn output(&self, source: Hertz) -> Hertz {
        match self.vco_output(source).0.checked_div(self.p) {
            Some(f) => Hertz(f),
            None => Hertz(0),
        }
    }

    /// Whether these coefficients are within the hardware limits for
    /// `source` and produce exactly `target`
    pub const fn is_valid(&self, source: Hertz, target: Hertz) -> bool {
        if self.m < PLLM_MIN || self.m > PLLM_MAX {
            return false;
        }
        if self.n < PLLN_MIN || self.n > PLLN_MAX {
            return false;
        }
        if !matches!(self.p, 2 | 4 | 6 | 8) {
            return false;
        }

        let vco_input = self.vco_input(source).0;
        if vco_input < VCO_INPUT_MIN || vco_input > VCO_INPUT_MAX {
            return false;
        }

        // At most 2 MHz * 432 from here on, no overflow
        let vco_output = vco_input * self.n;
        vco_output >= VCO_OUTPUT_MIN
            && vco_output <= VCO_OUTPUT_MAX
            && vco_output / self.p == target.0
    }

    /// PLLP field value. 2 -> 0b00, 4 -> 0b01, 6 -> 0b10, 8 -> 0b11
    const fn pllp_bits(&self) -> u32 {
        self.p / 2 - 1
    }
}

/// Find PLL coefficients that produce `target` from `source`
///
/// M, then N, then P are walked in ascending order and the first exact
/// match is returned. As M grows the VCO input only decreases, so the
/// walk stops at the first M that takes it under 1 MHz.
///
/// Usable in `const` items, so the search normally runs at compile
/// time.
pub const fn solve(target: Hertz, source: Hertz) -> Option<PllCoefficients> {
    let mut m = PLLM_MIN;
    while m <= PLLM_MAX {
        let vco_input = source.0 / m;
        if vco_input > VCO_INPUT_MAX {
            m += 1;
            continue;
        }
        if vco_input < VCO_INPUT_MIN {
            break;
        }

        let mut n = PLLN_MIN;
        while n <= PLLN_MAX {
            let vco_output = vco_input * n;
            if vco_output >= VCO_OUTPUT_MIN && vco_output <= VCO_OUTPUT_MAX {
                let mut i = 0;
                while i < PLLP.len() {
                    let p = PLLP[i];
                    if vco_output / p == target.0 {
                        return Some(PllCoefficients { m, n, p });
                    }
                    i += 1;
                }
            }
            n += 1;
        }
        m += 1;
    }

    None
}

/// Whether the PLL reports lock
pub fn is_ready<R: RegisterBlock + ?Sized>(rb: &R) -> bool {
    rb.read(Reg::RccCr) & cr::PLLRDY != 0
}

/// Stop the PLL if it is running and wait until it has stopped
///
/// The configuration register is ignored by the hardware while the PLL
/// is on.
pub fn disable<R: RegisterBlock + ?Sized>(rb: &mut R) {
    if rb.read(Reg::RccCr) & (cr::PLLON | cr::PLLRDY) == 0 {
        return;
    }

    clear_bits(rb, Reg::RccCr, cr::PLLON);
    wait_for_bits(rb, Reg::RccCr, cr::PLLRDY, false);
}

/// Program the coefficients and the input source. PLLQ is left alone.
///
/// The PLL must be disabled.
pub fn configure<R: RegisterBlock + ?Sized>(
    rb: &mut R,
    coefficients: &PllCoefficients,
    source: RootSource,
) {
    debug_assert!(rb.read(Reg::RccCr) & cr::PLLON == 0);

    write_masked(rb, Reg::RccPllcfgr, pllcfgr::PLLM, coefficients.m);
    write_masked(rb, Reg::RccPllcfgr, pllcfgr::PLLN, coefficients.n);
    write_masked(
        rb,
        Reg::RccPllcfgr,
        pllcfgr::PLLP,
        coefficients.pllp_bits(),
    );

    match source {
        RootSource::Hse => set_bits(rb, Reg::RccPllcfgr, pllcfgr::PLLSRC),
        RootSource::Hsi => clear_bits(rb, Reg::RccPllcfgr, pllcfgr::PLLSRC),
    }
}

/// Start the PLL and wait for lock
pub fn enable<R: RegisterBlock + ?Sized>(rb: &mut R) {
    set_bits(rb, Reg::RccCr, cr::PLLON);
    wait_for_bits(rb, Reg::RccCr, cr::PLLRDY, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::sim::SimRegisters;
    use crate::time::{hz, mhz};

    const TARGETS_MHZ: [u32; 8] = [16, 48, 72, 84, 100, 120, 168, 180];

    /// Plain exhaustive walk of the whole coefficient space
    fn brute_force(target: Hertz, source: Hertz) -> Option<PllCoefficients> {
        for m in PLLM_MIN..=PLLM_MAX {
            for n in PLLN_MIN..=PLLN_MAX {
                for p in PLLP {
                    let c = PllCoefficients { m, n, p };
                    if c.is_valid(source, target) {
                        return Some(c);
                    }
                }
            }
        }
        None
    }

    #[test]
    fn known_settings() {
        // 8 MHz external clock to 100 MHz: 2 MHz VCO input, 200 MHz VCO
        assert_eq!(
            solve(mhz(100), mhz(8)),
            Some(PllCoefficients { m: 4, n: 100, p: 2 })
        );
        assert_eq!(
            solve(mhz(180), mhz(16)),
            Some(PllCoefficients { m: 8, n: 180, p: 2 })
        );
        assert_eq!(
            solve(mhz(168), mhz(8)),
            Some(PllCoefficients { m: 4, n: 168, p: 2 })
        );
        // Below 50 MHz only the larger P dividers keep the VCO in range
        assert_eq!(
            solve(mhz(16), mhz(16)),
            Some(PllCoefficients { m: 8, n: 64, p: 8 })
        );
    }

    #[test]
    fn crystal_range_targets_are_solved_within_limits() {
        for source in (4..=26).map(mhz) {
            for target in TARGETS_MHZ.iter().copied().map(mhz) {
                let c = solve(target, source).unwrap_or_else(|| {
                    panic!("no setting for {} from {}", target, source)
                });

                assert!((PLLM_MIN..=PLLM_MAX).contains(&c.m));
                assert!((PLLN_MIN..=PLLN_MAX).contains(&c.n));
                assert!(PLLP.contains(&c.p));

                let vco_input = c.vco_input(source).raw();
                assert!((1_000_000..=2_000_000).contains(&vco_input));
                let vco_output = c.vco_output(source).raw();
                assert!((100_000_000..=432_000_000).contains(&vco_output));
                assert_eq!(c.output(source), target);
            }
        }
    }

    #[test]
    fn first_match_in_lexicographic_order() {
        // Odd sources exercise the truncating VCO input division
        for source in [
            mhz(8),
            mhz(12),
            mhz(25),
            hz(8_192_000),
            hz(14_745_600),
        ] {
            for target in TARGETS_MHZ.iter().copied().map(mhz) {
                assert_eq!(solve(target, source), brute_force(target, source));
            }
        }
    }

    #[test]
    fn deterministic() {
        let first = solve(mhz(84), mhz(25));
        for _ in 0..10 {
            assert_eq!(solve(mhz(84), mhz(25)), first);
        }
    }

    #[test]
    fn unreachable_targets() {
        assert_eq!(solve(hz(1), mhz(8)), None);
        assert_eq!(solve(hz(1), mhz(16)), None);
        // VCO output tops out at 432 MHz, so P_CK at 216 MHz
        assert_eq!(solve(mhz(217), mhz(8)), None);
        // Source too slow for a 1 MHz VCO input
        assert_eq!(solve(mhz(100), hz(1_500_000)), None);
    }

    #[test]
    fn oversized_vco_is_rejected_without_overflow() {
        // 12.5 MHz * 432 does not fit in 32 bits
        let c = PllCoefficients { m: 2, n: 432, p: 2 };
        assert!(!c.is_valid(mhz(25), mhz(100)));
        assert_eq!(c.vco_output(mhz(25)), Hertz(u32::MAX));

        // VCO input in range, output above 432 MHz
        let c = PllCoefficients { m: 13, n: 432, p: 2 };
        assert!(!c.is_valid(mhz(26), mhz(216)));
    }

    #[test]
    fn zero_dividers_do_not_panic() {
        let c = PllCoefficients { m: 0, n: 100, p: 0 };
        assert_eq!(c.vco_input(mhz(8)), Hertz(0));
        assert_eq!(c.output(mhz(8)), Hertz(0));
        assert!(!c.is_valid(mhz(8), mhz(100)));

        let c = PllCoefficients { m: 4, n: 100, p: 0 };
        assert_eq!(c.output(mhz(8)), Hertz(0));
    }

    #[test]
    fn solved_in_const_context() {
        const C: Option<PllCoefficients> = solve(mhz(72), mhz(8));
        assert_eq!(C.unwrap().output(mhz(8)), mhz(72));
    }

    #[test]
    fn pllp_encoding() {
        let bits: Vec<u32> = PLLP
            .iter()
            .map(|&p| PllCoefficients { m: 2, n: 50, p }.pllp_bits())
            .collect();
        assert_eq!(bits, [0b00, 0b01, 0b10, 0b11]);
    }

    #[test]
    fn configure_writes_fields_and_source() {
        let mut rb = SimRegisters::reset();
        let c = PllCoefficients { m: 4, n: 100, p: 4 };

        configure(&mut rb, &c, RootSource::Hse);

        let value = rb.value(Reg::RccPllcfgr);
        assert_eq!(pllcfgr::PLLM.extract(value), 4);
        assert_eq!(pllcfgr::PLLN.extract(value), 100);
        assert_eq!(pllcfgr::PLLP.extract(value), 0b01);
        assert_eq!(value & pllcfgr::PLLSRC, pllcfgr::PLLSRC);
        // PLLQ keeps its reset value of 4
        assert_eq!((value >> 24) & 0xf, 4);

        configure(&mut rb, &c, RootSource::Hsi);
        assert_eq!(rb.value(Reg::RccPllcfgr) & pllcfgr::PLLSRC, 0);
    }

    #[test]
    fn disable_is_a_no_op_when_stopped() {
        let mut rb = SimRegisters::reset();
        disable(&mut rb);
        assert!(rb.trace.is_empty());
    }

    #[test]
    fn enable_then_disable() {
        let mut rb = SimRegisters::reset();

        enable(&mut rb);
        assert!(is_ready(&rb));

        disable(&mut rb);
        assert!(!is_ready(&rb));
        assert_eq!(rb.value(Reg::RccCr) & cr::PLLON, 0);
    }
}

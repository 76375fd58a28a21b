//! High Speed External oscillator
//!
//! A crystal is driven by the HSE oscillator. An external clock signal
//! bypasses it, which must be selected before the HSE is switched on:
//! HSEBYP is read-only while HSEON is set.

use crate::regs::{clear_bits, cr, set_bits, wait_for_bits, Reg, RegisterBlock};

/// Whether the HSE reports a stable output
pub fn is_ready<R: RegisterBlock + ?Sized>(rb: &R) -> bool {
    rb.read(Reg::RccCr) & cr::HSERDY != 0
}

/// Start the HSE, in bypass mode if `bypass`, and wait until it is
/// stable
pub fn enable<R: RegisterBlock + ?Sized>(rb: &mut R, bypass: bool) {
    if bypass {
        set_bits(rb, Reg::RccCr, cr::HSEBYP);
    } else {
        clear_bits(rb, Reg::RccCr, cr::HSEBYP);
    }

    set_bits(rb, Reg::RccCr, cr::HSEON);
    wait_for_bits(rb, Reg::RccCr, cr::HSERDY, true);
}

/// Stop the HSE
///
/// The hardware keeps the HSE running while it drives the system clock.
pub fn disable<R: RegisterBlock + ?Sized>(rb: &mut R) {
    clear_bits(rb, Reg::RccCr, cr::HSEON);
}

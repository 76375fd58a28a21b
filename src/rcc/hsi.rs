//! High Speed Internal oscillator, 16 MHz RC

use crate::regs::{clear_bits, cr, set_bits, wait_for_bits, Reg, RegisterBlock};

/// Whether the HSI reports a stable output
pub fn is_ready<R: RegisterBlock + ?Sized>(rb: &R) -> bool {
    rb.read(Reg::RccCr) & cr::HSIRDY != 0
}

/// Start the HSI and wait until it is stable
pub fn enable<R: RegisterBlock + ?Sized>(rb: &mut R) {
    set_bits(rb, Reg::RccCr, cr::HSION);
    wait_for_bits(rb, Reg::RccCr, cr::HSIRDY, true);
}

/// Stop the HSI
///
/// The hardware keeps the HSI running while it drives the system clock.
pub fn disable<R: RegisterBlock + ?Sized>(rb: &mut R) {
    clear_bits(rb, Reg::RccCr, cr::HSION);
}

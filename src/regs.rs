//! Register read/modify/write primitives
//!
//! The clock tree touches four registers. Access goes through the
//! [`RegisterBlock`] trait so that the bring-up sequence is the same
//! code on silicon (volatile accesses through the PAC) and in host
//! tests (a simulated block that records every write).
//!
//! See RM0390 section 6.3 (RCC registers) and 3.8 (FLASH_ACR).

/// Registers used by the clock tree
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reg {
    /// RCC clock control register
    RccCr = 0,
    /// RCC PLL configuration register
    RccPllcfgr = 1,
    /// RCC clock configuration register
    RccCfgr = 2,
    /// Flash access control register
    FlashAcr = 3,
}

/// Word-wide access to the clock tree registers
pub trait RegisterBlock {
    /// Read the current value of `reg`
    fn read(&self, reg: Reg) -> u32;

    /// Overwrite `reg` with `value`
    fn write(&mut self, reg: Reg, value: u32);
}

/// A bit field within a register
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    mask: u32,
    shift: u8,
}

impl Field {
    /// Field of `mask` (right aligned) located at bit `shift`
    pub const fn new(mask: u32, shift: u8) -> Self {
        Field { mask, shift }
    }

    /// Mask of the field in register position
    pub const fn mask(self) -> u32 {
        self.mask << self.shift
    }

    /// Shift `value` into register position
    ///
    /// Panics if `value` does not fit the field. In a `const` context
    /// this is a compile error.
    pub const fn bits(self, value: u32) -> u32 {
        assert!(value <= self.mask, "value does not fit register field");
        value << self.shift
    }

    /// Extract the field from a register value
    pub const fn extract(self, register: u32) -> u32 {
        (register >> self.shift) & self.mask
    }
}

/// Set `bits` in `reg`, leaving the others untouched
pub fn set_bits<R: RegisterBlock + ?Sized>(rb: &mut R, reg: Reg, bits: u32) {
    let value = rb.read(reg);
    rb.write(reg, value | bits);
}

/// Clear `bits` in `reg`, leaving the others untouched
pub fn clear_bits<R: RegisterBlock + ?Sized>(rb: &mut R, reg: Reg, bits: u32) {
    let value = rb.read(reg);
    rb.write(reg, value & !bits);
}

/// Replace `field` of `reg` with `value`
///
/// Panics if `value` is wider than the field, rather than spilling into
/// the neighbouring fields.
pub fn write_masked<R: RegisterBlock + ?Sized>(
    rb: &mut R,
    reg: Reg,
    field: Field,
    value: u32,
) {
    let bits = field.bits(value);
    let current = rb.read(reg);
    rb.write(reg, (current & !field.mask()) | bits);
}

/// Read `field` of `reg`, right aligned
pub fn read_masked<R: RegisterBlock + ?Sized>(
    rb: &R,
    reg: Reg,
    field: Field,
) -> u32 {
    field.extract(rb.read(reg))
}

/// Busy-wait until all of `bits` in `reg` are set (`set`) or clear
///
/// There is no timeout: the clock tree is brought up before anything
/// else runs, and a source that never settles is a wiring fault.
pub fn wait_for_bits<R: RegisterBlock + ?Sized>(
    rb: &R,
    reg: Reg,
    bits: u32,
    set: bool,
) {
    let expected = if set { bits } else { 0 };
    while rb.read(reg) & bits != expected {
        core::hint::spin_loop();
    }
}

/// RCC_CR bits
pub mod cr {
    pub const HSION: u32 = 1 << 0;
    pub const HSIRDY: u32 = 1 << 1;
    pub const HSEON: u32 = 1 << 16;
    pub const HSERDY: u32 = 1 << 17;
    pub const HSEBYP: u32 = 1 << 18;
    pub const PLLON: u32 = 1 << 24;
    pub const PLLRDY: u32 = 1 << 25;
}

/// RCC_PLLCFGR fields
pub mod pllcfgr {
    use super::Field;

    pub const PLLM: Field = Field::new(0x3f, 0);
    pub const PLLN: Field = Field::new(0x1ff, 6);
    pub const PLLP: Field = Field::new(0x3, 16);
    pub const PLLSRC: u32 = 1 << 22;
}

/// RCC_CFGR fields
pub mod cfgr {
    use super::Field;

    pub const SW: Field = Field::new(0x3, 0);
    pub const SWS: Field = Field::new(0x3, 2);
    pub const PPRE1: Field = Field::new(0x7, 10);
    pub const PPRE2: Field = Field::new(0x7, 13);
}

/// FLASH_ACR fields
pub mod acr {
    use super::Field;

    pub const LATENCY: Field = Field::new(0xf, 0);
}

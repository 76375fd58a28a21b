//! Time units

use core::fmt;

/// Hertz
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hertz(pub u32);

/// Extension trait that adds convenience methods to the `u32` type
pub trait U32Ext {
    /// Wrap in `Hertz`
    fn hz(self) -> Hertz;

    /// Wrap in `Hertz`
    fn khz(self) -> Hertz;

    /// Wrap in `Hertz`
    fn mhz(self) -> Hertz;
}

impl U32Ext for u32 {
    fn hz(self) -> Hertz {
        hz(self)
    }

    fn khz(self) -> Hertz {
        khz(self)
    }

    fn mhz(self) -> Hertz {
        mhz(self)
    }
}

/// `Hertz` from a value in Hz, usable in `const` items
pub const fn hz(hz: u32) -> Hertz {
    Hertz(hz)
}

/// `Hertz` from a value in kHz, usable in `const` items
pub const fn khz(khz: u32) -> Hertz {
    Hertz(khz * 1_000)
}

/// `Hertz` from a value in MHz, usable in `const` items
pub const fn mhz(mhz: u32) -> Hertz {
    Hertz(mhz * 1_000_000)
}

impl Hertz {
    /// Raw frequency in Hz
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Frequency truncated to whole MHz
    pub const fn to_mhz(self) -> u32 {
        self.0 / 1_000_000
    }

    pub(crate) const fn max(self, other: Hertz) -> Hertz {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Hertz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

//! Transmit-side configuration.

use crate::timing::{BIT0_NORM, BIT1_NORM};

/// Minimum legal preamble length, in bits, per RCN-210.
pub const MIN_PREAMBLE_BITS: u8 = 17;
/// Norm preamble length used by [`Config::default`].
pub const NORM_PREAMBLE_BITS: u8 = 17;

/// Flags controlling optional transmit behavior.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Flags {
    /// Reserve the post-packet cut-out for BiDi responses.
    pub bidi: bool,
    /// Swap the track output polarity pair.
    pub invert: bool,
    /// Emit an extra 0-bit before the preamble (compatibility with
    /// decoders that need a longer pre-preamble settle time).
    pub zimo0: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Flags {
            bidi: true,
            invert: false,
            zimo0: false,
        }
    }
}

/// Transmit pipeline configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Number of preamble half-bit pairs, 17-30.
    pub num_preamble: u8,
    /// Duration of half a 1-bit, in microseconds, 52-64.
    pub bit1_duration: u16,
    /// Duration of half a 0-bit, in microseconds, 90-119.
    pub bit0_duration: u16,
    pub flags: Flags,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            num_preamble: NORM_PREAMBLE_BITS,
            bit1_duration: BIT1_NORM,
            bit0_duration: BIT0_NORM,
            flags: Flags::default(),
        }
    }
}

impl Config {
    /// Validate that every field is within its legal range.
    pub fn is_valid(&self) -> bool {
        use crate::timing::{BIT0_MAX, BIT0_MIN, BIT1_MAX, BIT1_MIN};
        (MIN_PREAMBLE_BITS..=30).contains(&self.num_preamble)
            && (BIT1_MIN..=BIT1_MAX).contains(&self.bit1_duration)
            && (BIT0_MIN..=BIT0_MAX).contains(&self.bit0_duration)
    }
}

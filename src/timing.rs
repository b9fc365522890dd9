//! Half-bit timing constants and the raw-time-to-bit classifier.
//!
//! All times are in microseconds, measured as the duration of *half* a bit
//! cell (the interval between two consecutive track polarity flips), which
//! is what a capture-compare timer actually measures.

use fugit::MicrosDurationU32;

/// Minimal timing for half a 1-bit.
pub const BIT1_MIN: u16 = 52;
/// Norm timing for half a 1-bit.
pub const BIT1_NORM: u16 = 58;
/// Maximal timing for half a 1-bit.
pub const BIT1_MAX: u16 = 64;
/// Minimal timing for half a 0-bit.
pub const BIT0_MIN: u16 = 90;
/// Norm timing for half a 0-bit.
pub const BIT0_NORM: u16 = 100;
/// Maximal timing for half a 0-bit.
pub const BIT0_MAX: u16 = 119;
/// Maximal timing for half a 0-bit in DC (analog) stretching mode.
pub const BIT0_MAX_ANALOG: u16 = 10000;

/// Minimal timing for the BiDi cutout start.
pub const BIDI_TCS_MIN: u16 = 26;
/// Norm timing for the BiDi cutout start.
pub const BIDI_TCS: u16 = 29;
/// Maximal timing for the BiDi cutout start.
pub const BIDI_TCS_MAX: u16 = 32;
/// Minimal timing for the BiDi cutout end.
pub const BIDI_TCE_MIN: u16 = 454;
/// Norm timing for the BiDi cutout end.
pub const BIDI_TCE: u16 = 471;
/// Maximal timing for the BiDi cutout end.
pub const BIDI_TCE_MAX: u16 = 488;
/// Start of BiDi channel 1.
pub const BIDI_TTS1: u16 = 80;
/// End of BiDi channel 1.
pub const BIDI_TTC1: u16 = 177;
/// Start of BiDi channel 2.
pub const BIDI_TTS2: u16 = 193;
/// End of BiDi channel 2.
pub const BIDI_TTC2: u16 = 454;

static_assertions::const_assert!(BIT1_MIN < BIT1_NORM && BIT1_NORM < BIT1_MAX);
static_assertions::const_assert!(BIT0_MIN < BIT0_NORM && BIT0_NORM < BIT0_MAX);
static_assertions::const_assert!(BIT1_MAX < BIT0_MIN);

/// The outcome of classifying one half-bit-cell duration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bit {
    _0,
    _1,
    Invalid,
}

/// Classify a half-bit duration, given in microseconds.
pub const fn time2bit(time: u32) -> Bit {
    if time >= BIT1_MIN as u32 && time <= BIT1_MAX as u32 {
        Bit::_1
    } else if time >= BIT0_MIN as u32 && time <= BIT0_MAX_ANALOG as u32 {
        Bit::_0
    } else {
        Bit::Invalid
    }
}

/// Typed equivalent of [`BIDI_TCS`] for configuration and test boundaries.
pub const fn bidi_tcs() -> MicrosDurationU32 {
    MicrosDurationU32::micros(BIDI_TCS as u32)
}

/// Typed equivalent of [`BIDI_TCE`] for configuration and test boundaries.
pub const fn bidi_tce() -> MicrosDurationU32 {
    MicrosDurationU32::micros(BIDI_TCE as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_one_bits() {
        assert_eq!(time2bit(BIT1_MIN as u32), Bit::_1);
        assert_eq!(time2bit(BIT1_NORM as u32), Bit::_1);
        assert_eq!(time2bit(BIT1_MAX as u32), Bit::_1);
    }

    #[test]
    fn classifies_zero_bits_including_analog_stretch() {
        assert_eq!(time2bit(BIT0_MIN as u32), Bit::_0);
        assert_eq!(time2bit(BIT0_NORM as u32), Bit::_0);
        assert_eq!(time2bit(BIT0_MAX_ANALOG as u32), Bit::_0);
    }

    #[test]
    fn classifies_gap_between_one_and_zero_as_invalid() {
        assert_eq!(time2bit(BIT1_MAX as u32 + 1), Bit::Invalid);
        assert_eq!(time2bit(BIT0_MIN as u32 - 1), Bit::Invalid);
    }

    #[test]
    fn classifies_below_one_min_as_invalid() {
        assert_eq!(time2bit(0), Bit::Invalid);
        assert_eq!(time2bit(BIT1_MIN as u32 - 1), Bit::Invalid);
    }
}

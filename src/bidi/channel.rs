//! BiDi channel byte-count constants.

use super::datagram::{datagram_size, Bits, Datagram};

/// Channel 1 occupies a 12-bit (2-byte) slot.
pub const CHANNEL1_SIZE: usize = datagram_size(Bits::_12);
pub type Channel1 = Datagram<CHANNEL1_SIZE>;

/// Channel 2 occupies a 36-bit (6-byte) slot.
pub const CHANNEL2_SIZE: usize = datagram_size(Bits::_36);
pub type Channel2 = Datagram<CHANNEL2_SIZE>;

/// The two channels back to back, as transmitted across one cut-out.
pub const BUNDLED_CHANNELS_SIZE: usize = CHANNEL1_SIZE + CHANNEL2_SIZE;
pub type BundledChannels = Datagram<BUNDLED_CHANNELS_SIZE>;

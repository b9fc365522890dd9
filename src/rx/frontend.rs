//! Half-bit-to-packet recovery: feed capture-compare half-bit durations in
//! one at a time, drain completed packets out the other side.
//!
//! Two half-bits of matching classification make one bit; a mismatch (e.g.
//! a short half-bit followed by a long one) is a framing glitch and resets
//! the search for a fresh preamble. Minimum-length preamble, then
//! alternating start-bit-plus-byte groups, then the single `1` end bit that
//! a valid checksum must close out.

use crate::packet::{exor, Packet};
use crate::timing::{time2bit, Bit};
use crate::tx::config::MIN_PREAMBLE_BITS;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Preamble,
    Byte,
    StartOrEnd,
}

/// Recovers framed [`Packet`]s from a stream of half-bit durations.
///
/// `N` bounds the number of fully-received packets buffered between
/// [`Frontend::half_bit`] calls and [`Frontend::take_packet`] calls; when
/// full, the oldest buffered packet is dropped to make room rather than
/// stalling the receiver.
pub struct Frontend<const N: usize = 4> {
    state: State,
    first_half: Option<Bit>,
    preamble_count: u16,
    current_byte: u8,
    bit_count: u8,
    byte_count: usize,
    packet: Packet,
    queue: heapless::Deque<Packet, N>,
    preambles_seen: u32,
    packets_seen: u32,
}

impl<const N: usize> Default for Frontend<N> {
    fn default() -> Self {
        Frontend {
            state: State::Preamble,
            first_half: None,
            preamble_count: 0,
            current_byte: 0,
            bit_count: 0,
            byte_count: 0,
            packet: Packet::new(),
            queue: heapless::Deque::new(),
            preambles_seen: 0,
            packets_seen: 0,
        }
    }
}

impl<const N: usize> Frontend<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one half-bit's duration, in microseconds, as measured between
    /// two consecutive track polarity flips.
    pub fn half_bit(&mut self, duration_us: u32) {
        let half = time2bit(duration_us);
        match self.first_half.take() {
            None => self.first_half = Some(half),
            Some(first) => {
                let bit = if first == half { first } else { Bit::Invalid };
                self.on_bit(bit);
            }
        }
    }

    /// Pop the oldest fully-received, checksum-valid packet, if any.
    pub fn take_packet(&mut self) -> Option<Packet> {
        self.queue.pop_front()
    }

    /// Number of valid preambles seen since the last [`Frontend::reset_counts`].
    pub fn preambles_seen(&self) -> u32 {
        self.preambles_seen
    }

    /// Number of complete, checksum-valid packets seen since the last
    /// [`Frontend::reset_counts`].
    pub fn packets_seen(&self) -> u32 {
        self.packets_seen
    }

    pub fn reset_counts(&mut self) {
        self.preambles_seen = 0;
        self.packets_seen = 0;
    }

    fn on_bit(&mut self, bit: Bit) {
        match self.state {
            State::Preamble => match bit {
                Bit::_1 => self.preamble_count = self.preamble_count.saturating_add(1),
                Bit::_0 if self.preamble_count >= MIN_PREAMBLE_BITS as u16 => {
                    self.preambles_seen = self.preambles_seen.saturating_add(1);
                    self.begin_byte();
                }
                _ => self.reset_to_preamble(),
            },
            State::Byte => {
                match bit {
                    Bit::Invalid => {
                        self.reset_to_preamble();
                        return;
                    }
                    _ => {
                        self.current_byte = (self.current_byte << 1) | (bit == Bit::_1) as u8;
                        self.bit_count += 1;
                    }
                }
                if self.bit_count == 8 {
                    if self.packet.push(self.current_byte).is_err() {
                        self.reset_to_preamble();
                        return;
                    }
                    self.byte_count += 1;
                    self.current_byte = 0;
                    self.bit_count = 0;
                    self.state = State::StartOrEnd;
                }
            }
            State::StartOrEnd => match bit {
                Bit::_0 if self.byte_count < crate::packet::MAX_PACKET_SIZE => self.begin_byte(),
                Bit::_1 => self.finish_packet(),
                _ => self.reset_to_preamble(),
            },
        }
    }

    fn begin_byte(&mut self) {
        self.state = State::Byte;
        self.bit_count = 0;
        self.current_byte = 0;
    }

    fn finish_packet(&mut self) {
        if self.byte_count >= 3 && exor(&self.packet) == 0 {
            self.packets_seen = self.packets_seen.saturating_add(1);
            if self.queue.is_full() {
                self.queue.pop_front();
            }
            let _ = self.queue.push_back(core::mem::take(&mut self.packet));
        }
        self.reset_to_preamble();
    }

    fn reset_to_preamble(&mut self) {
        self.state = State::Preamble;
        self.preamble_count = 0;
        self.byte_count = 0;
        self.bit_count = 0;
        self.current_byte = 0;
        self.packet.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{BIT0_NORM, BIT1_NORM};

    fn feed_bit(f: &mut Frontend, one: bool) {
        let d = if one { BIT1_NORM } else { BIT0_NORM } as u32;
        f.half_bit(d);
        f.half_bit(d);
    }

    fn feed_byte(f: &mut Frontend, byte: u8) {
        feed_bit(f, false); // start bit
        for i in (0..8).rev() {
            feed_bit(f, (byte >> i) & 1 != 0);
        }
    }

    fn feed_preamble(f: &mut Frontend, bits: u32) {
        for _ in 0..bits {
            feed_bit(f, true);
        }
    }

    #[test]
    fn recovers_idle_packet_from_a_well_formed_stream() {
        let mut f: Frontend<4> = Frontend::new();
        feed_preamble(&mut f, 20);
        feed_byte(&mut f, 0xFF);
        feed_byte(&mut f, 0x00);
        feed_byte(&mut f, 0xFF);
        feed_bit(&mut f, true); // end bit

        let p = f.take_packet().expect("packet recovered");
        assert_eq!(&p[..], &[0xFF, 0x00, 0xFF]);
        assert_eq!(f.packets_seen(), 1);
    }

    #[test]
    fn short_preamble_never_produces_a_packet() {
        let mut f: Frontend<4> = Frontend::new();
        feed_preamble(&mut f, 5);
        feed_byte(&mut f, 0xFF);
        feed_byte(&mut f, 0x00);
        feed_byte(&mut f, 0xFF);
        feed_bit(&mut f, true);
        assert!(f.take_packet().is_none());
    }

    #[test]
    fn bad_checksum_is_discarded() {
        let mut f: Frontend<4> = Frontend::new();
        feed_preamble(&mut f, 20);
        feed_byte(&mut f, 0xFF);
        feed_byte(&mut f, 0x00);
        feed_byte(&mut f, 0x12); // wrong checksum
        feed_bit(&mut f, true);
        assert!(f.take_packet().is_none());
    }

    #[test]
    fn mismatched_half_bits_reset_the_search() {
        let mut f: Frontend<4> = Frontend::new();
        feed_preamble(&mut f, 20);
        f.half_bit(BIT1_NORM as u32);
        f.half_bit(BIT0_NORM as u32); // glitch: halves disagree
        feed_byte(&mut f, 0xFF);
        feed_byte(&mut f, 0x00);
        feed_byte(&mut f, 0xFF);
        feed_bit(&mut f, true);
        // the glitch reset the preamble count, so this packet is lost too
        assert!(f.take_packet().is_none());
    }

    #[test]
    fn full_queue_drops_the_oldest_packet() {
        let mut f: Frontend<2> = Frontend::new();
        for _ in 0..3 {
            feed_preamble(&mut f, 20);
            feed_byte(&mut f, 0xFF);
            feed_byte(&mut f, 0x00);
            feed_byte(&mut f, 0xFF);
            feed_bit(&mut f, true);
        }
        assert!(f.take_packet().is_some());
        assert!(f.take_packet().is_some());
        assert!(f.take_packet().is_none());
    }
}

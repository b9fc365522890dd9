//! Lazy alternative to [`super::timings::Timings`]: computes each half-bit
//! on demand instead of expanding the whole packet up front. Used by
//! transmit paths that would rather pay the per-half-bit cost inside the
//! ISR than hold a full [`super::timings::MAX_TIMINGS`]-sized buffer.

use super::config::Config;

/// Which part of the packet a [`TimingsAdapter`] is currently emitting.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Stage {
    Preamble,
    Zimo0,
    Byte,
    EndBit,
    Done,
}

/// Streams the half-bit timings of one packet without pre-expanding them.
pub struct TimingsAdapter<'a> {
    cfg: Config,
    packet: &'a [u8],
    stage: Stage,
    preamble_left: u8,
    byte_index: usize,
    /// bit position within the current byte's 9-bit frame: 0 = start bit,
    /// 1..=8 = data bit 7..=0.
    bit_index: u8,
    /// second half-bit of the current cell still pending.
    half_pending: Option<u16>,
}

impl<'a> TimingsAdapter<'a> {
    pub fn new(cfg: Config, packet: &'a [u8]) -> Self {
        TimingsAdapter {
            cfg,
            packet,
            stage: Stage::Preamble,
            preamble_left: cfg.num_preamble,
            byte_index: 0,
            bit_index: 0,
            half_pending: None,
        }
    }

    fn current_byte_bit(&self) -> bool {
        let byte = self.packet[self.byte_index];
        if self.bit_index == 0 {
            false // start bit
        } else {
            let shift = 8 - self.bit_index;
            (byte >> shift) & 1 != 0
        }
    }

    fn advance_stage(&mut self) {
        match self.stage {
            Stage::Preamble => {
                self.stage = if self.cfg.flags.zimo0 {
                    Stage::Zimo0
                } else if self.packet.is_empty() {
                    Stage::EndBit
                } else {
                    Stage::Byte
                };
            }
            Stage::Zimo0 => {
                self.stage = if self.packet.is_empty() {
                    Stage::EndBit
                } else {
                    Stage::Byte
                };
            }
            Stage::Byte => {
                self.bit_index += 1;
                if self.bit_index > 8 {
                    self.bit_index = 0;
                    self.byte_index += 1;
                    if self.byte_index >= self.packet.len() {
                        self.stage = Stage::EndBit;
                    }
                }
            }
            Stage::EndBit => {
                self.stage = Stage::Done;
            }
            Stage::Done => {}
        }
    }

    fn bit_duration(&self, one: bool) -> u16 {
        if one {
            self.cfg.bit1_duration
        } else {
            self.cfg.bit0_duration
        }
    }
}

impl<'a> Iterator for TimingsAdapter<'a> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if let Some(half) = self.half_pending.take() {
            return Some(half);
        }

        let one = match self.stage {
            Stage::Preamble => {
                if self.preamble_left == 0 {
                    self.advance_stage();
                    return self.next();
                }
                self.preamble_left -= 1;
                true
            }
            Stage::Zimo0 => {
                self.advance_stage();
                false
            }
            Stage::Byte => {
                if self.byte_index >= self.packet.len() {
                    self.advance_stage();
                    return self.next();
                }
                let bit = self.current_byte_bit();
                self.advance_stage();
                bit
            }
            Stage::EndBit => {
                self.advance_stage();
                true
            }
            Stage::Done => return None,
        };

        let half = self.bit_duration(one);
        self.half_pending = Some(half);
        Some(half)
    }
}

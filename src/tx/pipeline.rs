//! ISR-facing half-bit generator: a bounded packet queue feeding a timing
//! expander, with an interleaved BiDi cut-out state machine.

use super::config::Config;
use super::timings::{packet2timings, raw2timings, Timings};
use crate::error::{Error, Result};
use crate::packet::{make_idle_packet, Packet};
use crate::timing;

/// Host hooks a track-output driver implements so [`Pipeline::transmit`]
/// can toggle rail polarity and gate the BiDi cut-out without owning any
/// hardware itself.
pub trait TrackOutputs {
    /// Drive the N/P track output pair for the current half-bit.
    fn set_track_outputs(&mut self, n: bool, p: bool);
    /// Cut the booster output for the BiDi cut-out.
    fn bidi_start(&mut self);
    /// Cut-out channel 1 window has begun.
    fn bidi_channel1(&mut self);
    /// Cut-out channel 2 window has begun.
    fn bidi_channel2(&mut self);
    /// Resume normal track output after the cut-out.
    fn bidi_end(&mut self);
}

const D_HALF_BIT: u16 = timing::BIDI_TCS;
const D_CUTOUT_START: u16 = timing::BIDI_TTS1 - timing::BIDI_TCS;
const D_CHANNEL1: u16 = timing::BIDI_TTS2 - timing::BIDI_TTS1;
const D_CHANNEL2: u16 = timing::BIDI_TTC2 - timing::BIDI_TTS2;
const D_CUTOUT_END: u16 = timing::BIDI_TCE - timing::BIDI_TTC2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum BidiState {
    Idle,
    HalfBit,
    CutoutStart,
    Channel1,
    Channel2,
    CutoutEnd,
}

enum QueueItem {
    Packet(Packet),
    Raw { bits: u32, num: u8 },
}

/// Bounded FIFO of pending packets/raw-bit sequences, with a BiDi cut-out
/// generator run between packets when enabled.
pub struct Pipeline<const N: usize = 4> {
    cfg: Config,
    queue: heapless::Deque<QueueItem, N>,
    current: Timings,
    pos: usize,
    parity: bool,
    bidi: BidiState,
}

impl<const N: usize> Default for Pipeline<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Pipeline<N> {
    pub fn new() -> Self {
        Pipeline {
            cfg: Config::default(),
            queue: heapless::Deque::new(),
            current: Timings::default(),
            pos: 0,
            parity: false,
            bidi: BidiState::Idle,
        }
    }

    /// Reset the pipeline to idle-packet output under a fresh configuration.
    pub fn init(&mut self, cfg: Config) {
        self.cfg = cfg;
        self.queue.clear();
        self.pos = 0;
        self.parity = false;
        self.bidi = BidiState::Idle;
        self.refill();
    }

    /// Enqueue a framed packet. Drops and returns `false` when the queue has
    /// no free slot or `bytes` cannot fit a [`Packet`] — the pipeline never
    /// blocks the caller.
    pub fn packet(&mut self, bytes: &[u8]) -> bool {
        let Ok(p) = Packet::from_slice(bytes) else {
            return false;
        };
        self.queue.push_back(QueueItem::Packet(p)).is_ok()
    }

    /// [`Pipeline::packet`], but returning a [`Result`] for callers that
    /// prefer `?` over checking a `bool`.
    pub fn try_packet(&mut self, bytes: &[u8]) -> Result<()> {
        if self.packet(bytes) {
            Ok(())
        } else {
            Err(Error::QueueFull)
        }
    }

    /// Enqueue `num` raw, unframed bits (MSB first in `bits`), bypassing
    /// packet byte-framing. Used for preamble-only or service-mode pulses.
    /// Drops and returns `false` when the queue has no free slot.
    pub fn raw(&mut self, bits: u32, num: u8) -> bool {
        self.queue.push_back(QueueItem::Raw { bits, num }).is_ok()
    }

    /// ISR entry point: returns the duration, in microseconds, of the next
    /// half-bit to hold the track outputs for, after toggling them (or
    /// running one step of the BiDi cut-out) via `host`.
    pub fn transmit(&mut self, host: &mut impl TrackOutputs) -> u16 {
        if self.pos >= self.current.len() {
            if self.cfg.flags.bidi {
                if let Some(half) = self.bidi_step(host) {
                    return half;
                }
            }
            self.refill();
        }
        self.packet_half(host)
    }

    fn packet_half(&mut self, host: &mut impl TrackOutputs) -> u16 {
        let half = self.current.as_slice()[self.pos];
        self.pos += 1;
        self.parity = !self.parity;
        host.set_track_outputs(self.parity, !self.parity);
        half
    }

    fn bidi_step(&mut self, host: &mut impl TrackOutputs) -> Option<u16> {
        match self.bidi {
            BidiState::Idle => {
                self.bidi = BidiState::HalfBit;
                Some(D_HALF_BIT)
            }
            BidiState::HalfBit => {
                host.bidi_start();
                self.bidi = BidiState::CutoutStart;
                Some(D_CUTOUT_START)
            }
            BidiState::CutoutStart => {
                host.bidi_channel1();
                self.bidi = BidiState::Channel1;
                Some(D_CHANNEL1)
            }
            BidiState::Channel1 => {
                host.bidi_channel2();
                self.bidi = BidiState::Channel2;
                Some(D_CHANNEL2)
            }
            BidiState::Channel2 => {
                host.bidi_end();
                self.bidi = BidiState::CutoutEnd;
                Some(D_CUTOUT_END)
            }
            BidiState::CutoutEnd => {
                self.bidi = BidiState::Idle;
                None
            }
        }
    }

    fn refill(&mut self) {
        match self.queue.pop_front() {
            Some(QueueItem::Packet(packet)) => {
                packet2timings(&self.cfg, &packet, &mut self.current);
            }
            Some(QueueItem::Raw { bits, num }) => {
                self.current = Timings::default();
                raw2timings(&self.cfg, bits, num, &mut self.current);
            }
            None => {
                packet2timings(&self.cfg, &make_idle_packet(), &mut self.current);
            }
        }
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeHost {
        toggles: u32,
        cutout_calls: heapless::Vec<&'static str, 8>,
    }

    impl TrackOutputs for FakeHost {
        fn set_track_outputs(&mut self, _n: bool, _p: bool) {
            self.toggles += 1;
        }
        fn bidi_start(&mut self) {
            let _ = self.cutout_calls.push("start");
        }
        fn bidi_channel1(&mut self) {
            let _ = self.cutout_calls.push("channel1");
        }
        fn bidi_channel2(&mut self) {
            let _ = self.cutout_calls.push("channel2");
        }
        fn bidi_end(&mut self) {
            let _ = self.cutout_calls.push("end");
        }
    }

    #[test]
    fn runs_idle_packet_when_queue_is_empty() {
        let mut p: Pipeline<4> = Pipeline::new();
        p.init(Config {
            flags: super::super::config::Flags {
                bidi: false,
                ..Default::default()
            },
            ..Default::default()
        });
        let mut host = FakeHost::default();
        for _ in 0..200 {
            p.transmit(&mut host);
        }
        assert!(host.toggles > 0);
    }

    #[test]
    fn packet_queue_rejects_past_capacity() {
        let mut p: Pipeline<2> = Pipeline::new();
        p.init(Config::default());
        assert!(p.packet(&[0x03, 0x03]));
        assert!(p.packet(&[0x03, 0x03]));
        assert!(!p.packet(&[0x03, 0x03]));
        assert_eq!(p.try_packet(&[0x03, 0x03]), Err(Error::QueueFull));
    }

    #[test]
    fn bidi_cutout_fires_all_four_hooks_in_order_after_a_packet() {
        let mut p: Pipeline<4> = Pipeline::new();
        p.init(Config::default());
        let mut host = FakeHost::default();
        // drain the initial idle-packet timings.
        let mut n = 0;
        while p.pos < p.current.len() && n < 1000 {
            p.transmit(&mut host);
            n += 1;
        }
        // now in the BiDi cut-out.
        let mut durations = heapless::Vec::<u16, 8>::new();
        for _ in 0..5 {
            let _ = durations.push(p.transmit(&mut host));
        }
        assert_eq!(
            durations.as_slice(),
            &[D_HALF_BIT, D_CUTOUT_START, D_CHANNEL1, D_CHANNEL2, D_CUTOUT_END]
        );
        assert_eq!(
            host.cutout_calls.as_slice(),
            &["start", "channel1", "channel2", "end"]
        );
    }
}

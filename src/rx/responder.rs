//! BiDi/RailCom response assembly: decides what, if anything, a decoder
//! answers in channel 1 and channel 2 of the cut-out that follows a packet
//! addressed to it, and queues up automatic-logon self-selection replies.

use super::backoff::LogonBackoff;
use crate::address::{Address, AddressType};
use crate::addresses::Addresses;
use crate::bidi::builder::{make_app_adr_high_datagram, make_app_adr_low_datagram};
use crate::bidi::channel::{
    BundledChannels, Channel1, Channel2, BUNDLED_CHANNELS_SIZE, CHANNEL1_SIZE, CHANNEL2_SIZE,
};
use crate::bidi::datagram::{encode_datagram, make_datagram};
use crate::crc8::crc8;
use rand_core::RngCore;

/// Depth of the pom/dyn response queues; the tip-off-search and logon
/// queues only ever need to hold one in-flight reply plus one pending.
pub const QUEUE_SIZE: usize = 4;

/// ZIMO manufacturer ID, used as the high byte of a logon-enable reply's
/// decoder-class identifier.
const ZIMO_ID: u64 = 145;

/// One queued `app:dyn` datagram (always a `Bits::_18`, 3-byte, payload).
type DynSlot = [u8; 3];

/// Assembles BiDi channel-1/channel-2 replies from CV-derived configuration
/// and whatever the dispatcher has queued (POM echoes, dynamic CVs,
/// tip-off-search, automatic-logon replies).
pub struct Responder {
    ch1_enabled: bool,
    ch2_enabled: bool,
    ch2_consist_enabled: bool,
    did: [u8; 4],
    cid: u16,
    session_id: u8,
    ch1_last: Channel1,
    dyn_queue: heapless::Deque<DynSlot, QUEUE_SIZE>,
    pom_queue: heapless::Deque<Channel1, QUEUE_SIZE>,
    tos_queue: heapless::Deque<Channel2, 2>,
    logon_queue: heapless::Deque<BundledChannels, 2>,
    logon_backoff: LogonBackoff,
    logon_selected: bool,
    logon_assigned: bool,
    logon_store_pending: bool,
}

/// What [`Responder::take_logon_store`] asks the host to persist to CVs
/// after a successful logon-assign (CV writes are too slow to do inline
/// with the cut-out, so they're deferred to thread-mode).
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogonStore {
    pub assigned_addr: u16,
    pub cid: u16,
    pub session_id: u8,
}

impl Responder {
    pub fn new(rng: &mut impl RngCore) -> Self {
        Responder {
            ch1_enabled: false,
            ch2_enabled: false,
            ch2_consist_enabled: false,
            did: [0; 4],
            cid: 0,
            session_id: 0,
            ch1_last: [0; CHANNEL1_SIZE],
            dyn_queue: heapless::Deque::new(),
            pom_queue: heapless::Deque::new(),
            tos_queue: heapless::Deque::new(),
            logon_queue: heapless::Deque::new(),
            logon_backoff: LogonBackoff::new(rng),
            logon_selected: false,
            logon_assigned: false,
            logon_store_pending: false,
        }
    }

    /// Reset per-session logon gating (e.g. on a digital reset/idle burst).
    pub fn init(&mut self, rng: &mut impl RngCore) {
        self.logon_backoff.reset(rng);
    }

    /// Rebuild from CV29/CV28 and the logon identity CVs (250-253, 65297-65301).
    pub fn configure(
        &mut self,
        enabled: bool,
        ch2_consist_enabled: bool,
        cv28: u8,
        did: [u8; 4],
        cid: u16,
        session_id: u8,
    ) {
        self.ch1_enabled = enabled && cv28 & 0b01 != 0;
        self.ch2_enabled = enabled && cv28 & 0b10 != 0;
        self.ch2_consist_enabled = ch2_consist_enabled;
        self.did = did;
        self.cid = cid;
        self.session_id = session_id;
    }

    /// Queue a programming-on-main CV echo. Returns `false` if the queue is
    /// full; the caller drops the echo rather than blocking.
    pub fn pom(&mut self, value: u8) -> bool {
        if self.pom_queue.is_full() {
            return false;
        }
        self.pom_queue
            .push_back(encode_datagram(make_datagram(0, value as u32)))
            .is_ok()
    }

    /// Queue an `app:dyn` datagram (speed, temperature, track voltage, any
    /// other RCN-218 dynamic CV). Returns `false` if the queue is full.
    pub fn dyn_value(&mut self, d: u8, x: u8) -> bool {
        if self.dyn_queue.is_full() {
            return false;
        }
        let dg = encode_datagram(make_datagram::<3>(7, ((d as u32) << 6) | (x as u32 & 0x3F)));
        self.dyn_queue.push_back(dg).is_ok()
    }

    /// Armed by the dispatcher after a binary-state-F2 "off" broadcast asks
    /// decoders lost off-track to identify themselves once rerailed.
    /// `idle_s` is how long the bus has been silent since the decoder was
    /// last addressed; RCN-218 requires giving up after 30s.
    pub fn tip_off_search(&mut self, addrs: &Addresses, idle_s: u32, rng: &mut impl RngCore) {
        const SIX_PERCENT_OF_U32_MAX: u32 = (u32::MAX as u64 * 6 / 100) as u32;
        if !self.tos_queue.is_empty() || rng.next_u32() > SIX_PERCENT_OF_U32_MAX {
            return;
        }
        if idle_s >= 30 {
            return;
        }
        let adr_high = make_app_adr_high_datagram(addrs.primary.value, addrs.consist.value as u8);
        let adr_low = make_app_adr_low_datagram(addrs.primary.value, addrs.consist.value as u8);
        let time = encode_datagram(make_datagram::<2>(14, idle_s.min(255)));
        let mut packet: Channel2 = [0; CHANNEL2_SIZE];
        packet[0..2].copy_from_slice(&adr_high);
        packet[2..4].copy_from_slice(&adr_low);
        packet[4..6].copy_from_slice(&time);
        let _ = self.tos_queue.push_back(packet);
    }

    /// Automatic-logon enable: `gg` is the 2-bit address-group field, `cid`
    /// and `session_id` the command station's current session identifiers.
    pub fn logon_enable(&mut self, gg: u8, cid: u16, session_id: u8, rng: &mut impl RngCore) {
        let cid_equal = cid == self.cid;
        let session_id_equal = session_id == self.session_id;

        if cid_equal && !session_id_equal {
            self.logon_selected = session_id.wrapping_sub(self.session_id) <= 4;
            self.logon_assigned = self.logon_selected;
            self.logon_backoff.reset(rng);
        }

        self.cid = cid;
        self.session_id = session_id;

        if self.logon_selected || self.logon_assigned {
            return;
        }
        match gg & 0b11 {
            0b00 | 0b01 => {}      // all decoders / multi-function decoders
            0b10 => return,        // accessory decoders only
            _ => self.logon_backoff.now(), // "now" group: no backoff
        }

        if !self.logon_backoff.tick(rng) {
            return;
        }
        // Only the low 28 bits of the manufacturer-ID/unique-ID payload
        // survive `make_datagram`'s u32 data parameter; see the datagram
        // module docs for this encoder's payload-width limitation.
        let payload = ZIMO_ID << 32
            | (self.did[0] as u64) << 24
            | (self.did[1] as u64) << 16
            | (self.did[2] as u64) << 8
            | self.did[3] as u64;
        let dg = encode_datagram(make_datagram::<BUNDLED_CHANNELS_SIZE>(15, payload as u32));
        let _ = self.logon_queue.push_back(dg);
    }

    /// Automatic-logon select: a command station asks the decoder owning
    /// `did` to report its currently-active address.
    pub fn logon_select(&mut self, did: [u8; 4], primary_addr: u16) {
        if self.logon_assigned || did != self.did {
            return;
        }
        self.logon_selected = true;
        let data = [
            0b1000_0000 | (primary_addr >> 8) as u8,
            primary_addr as u8,
            0,
            0,
            0,
        ];
        let crc = crc8(&data);
        let payload = (data[0] as u64) << 40
            | (data[1] as u64) << 32
            | (data[2] as u64) << 24
            | (data[3] as u64) << 16
            | (data[4] as u64) << 8
            | crc as u64;
        let dg = encode_datagram(make_datagram::<BUNDLED_CHANNELS_SIZE>(0, payload as u32));
        let _ = self.logon_queue.push_back(dg);
    }

    /// Automatic-logon assign: a command station assigns `addr` to the
    /// decoder owning `did`. Always updates `addrs.logon`; additionally
    /// overwrites `addrs.primary` when `overwrite_primary` is set (the
    /// vendor-specific `LOGON_ASSIGN` variant). Arms
    /// [`Responder::take_logon_store`] so the dispatcher persists the new
    /// address to CVs out of band.
    pub fn logon_assign(
        &mut self,
        did: [u8; 4],
        addr: Address,
        overwrite_primary: bool,
        addrs: &mut Addresses,
    ) {
        if did != self.did {
            return;
        }
        self.logon_assigned = true;
        self.logon_store_pending = true;
        addrs.logon = addr;
        if overwrite_primary {
            addrs.primary = addr;
        }
        let data = [13u8 << 4, 0, 0, 0, 0];
        let crc = crc8(&data);
        let payload = (data[0] as u64) << 40 | crc as u64;
        let dg = encode_datagram(make_datagram::<BUNDLED_CHANNELS_SIZE>(0, payload as u32));
        let _ = self.logon_queue.push_back(dg);
    }

    /// Pop the pending CV-write batch armed by a successful `logon_assign`.
    pub fn take_logon_store(&mut self, addr: u16) -> Option<LogonStore> {
        if !self.logon_store_pending {
            return None;
        }
        self.logon_store_pending = false;
        Some(LogonStore {
            assigned_addr: addr,
            cid: self.cid,
            session_id: self.session_id,
        })
    }

    /// Assemble channel 1 (12-bit payload) for the packet just addressed to
    /// `received`, if any.
    pub fn cutout_channel1(&mut self, received: Address) -> Option<Channel1> {
        if !self.ch1_enabled {
            return None;
        }
        match received.r#type {
            AddressType::Broadcast | AddressType::Short | AddressType::Long => {
                let adr_high = make_app_adr_high_datagram(received.value, 0);
                self.ch1_last = if self.ch1_last == adr_high {
                    make_app_adr_low_datagram(received.value, 0)
                } else {
                    adr_high
                };
                Some(self.ch1_last)
            }
            AddressType::AutomaticLogon => self.app_logon(1),
            _ => None,
        }
    }

    /// Assemble channel 2 (36-bit payload) for the packet just addressed to
    /// `received`, given the decoder's full address bundle.
    pub fn cutout_channel2(&mut self, received: Address, addrs: &Addresses) -> Option<Channel2> {
        if !self.ch2_enabled {
            return None;
        }
        if received == addrs.primary || (self.logon_assigned && received == addrs.logon) {
            self.app_pom_ext_dyn()
        } else if self.ch2_consist_enabled && received == addrs.consist {
            self.app_ext_dyn()
        } else if received.r#type == AddressType::TipOffSearch {
            self.tos_queue.pop_front()
        } else if received.r#type == AddressType::AutomaticLogon {
            self.app_logon(2)
        } else {
            None
        }
    }

    fn app_pom_ext_dyn(&mut self) -> Option<Channel2> {
        if let Some(pom) = self.pom_queue.pop_front() {
            let mut ch2: Channel2 = [0; CHANNEL2_SIZE];
            ch2[0..CHANNEL1_SIZE].copy_from_slice(&pom);
            Some(ch2)
        } else {
            self.app_ext_dyn()
        }
    }

    fn app_ext_dyn(&mut self) -> Option<Channel2> {
        if self.dyn_queue.is_empty() {
            return None;
        }
        let mut ch2: Channel2 = [0; CHANNEL2_SIZE];
        let mut pos = 0;
        while pos + 3 <= CHANNEL2_SIZE {
            let Some(slot) = self.dyn_queue.pop_front() else {
                break;
            };
            ch2[pos..pos + 3].copy_from_slice(&slot);
            pos += 3;
        }
        Some(ch2)
    }

    fn app_logon(&mut self, ch: u8) -> Option<Channel1> {
        // Both channels draw from the same 8-byte logon datagram; channel 1
        // gets its leading 2 bytes, channel 2 its trailing 6 (and only then
        // pops the queue).
        let packet = *self.logon_queue.front()?;
        if ch == 1 {
            let mut out: Channel1 = [0; CHANNEL1_SIZE];
            out.copy_from_slice(&packet[0..CHANNEL1_SIZE]);
            Some(out)
        } else {
            let mut out: Channel2 = [0; CHANNEL2_SIZE];
            out.copy_from_slice(&packet[CHANNEL1_SIZE..BUNDLED_CHANNELS_SIZE]);
            self.logon_queue.pop_front();
            Some(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(1)
    }

    #[test]
    fn channel1_disabled_yields_nothing() {
        let mut r = Responder::new(&mut rng());
        let addr = Address::new(3, AddressType::Short);
        assert!(r.cutout_channel1(addr).is_none());
    }

    #[test]
    fn channel1_alternates_adr_high_and_low_for_loco_addresses() {
        let mut r = Responder::new(&mut rng());
        r.configure(true, false, 0b11, [0; 4], 0, 0);
        let addr = Address::new(3, AddressType::Short);
        let first = r.cutout_channel1(addr).unwrap();
        let second = r.cutout_channel1(addr).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn pom_echo_takes_priority_over_dyn_in_channel2() {
        let mut r = Responder::new(&mut rng());
        r.configure(true, false, 0b11, [0; 4], 0, 0);
        assert!(r.pom(0x42));
        assert!(r.dyn_value(7, 7));
        let addrs = Addresses::default();
        let reply = r.cutout_channel2(addrs.primary, &addrs).unwrap();
        assert_ne!(reply, [0u8; CHANNEL2_SIZE]); // pom datagram occupies the first slot
    }

    #[test]
    fn logon_select_is_ignored_for_a_foreign_unique_id() {
        let mut r = Responder::new(&mut rng());
        r.configure(true, true, 0b11, [1, 2, 3, 4], 0, 0);
        r.logon_select([9, 9, 9, 9], 3);
        assert!(!r.logon_selected);
    }

    #[test]
    fn logon_assign_arms_a_cv_store_for_a_matching_unique_id() {
        let mut r = Responder::new(&mut rng());
        r.configure(true, true, 0b11, [1, 2, 3, 4], 0, 0);
        let mut addrs = Addresses::default();
        r.logon_assign(
            [1, 2, 3, 4],
            Address::new(500, AddressType::Long),
            true,
            &mut addrs,
        );
        assert_eq!(addrs.primary.value, 500);
        assert!(r.take_logon_store(500).is_some());
        assert!(r.take_logon_store(500).is_none());
    }
}

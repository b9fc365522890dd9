//! Decoder-side packet dispatch: walks a framed packet through address
//! resolution, instruction decoding and CV access, driving a host
//! [`Decoder`] implementation and the BiDi [`Responder`].

use super::config::{Config, CvSource};
use super::frontend::Frontend;
use super::responder::Responder;
use crate::address::{decode_address, Address, AddressType};
use crate::addresses::Addresses;
use crate::crc8::crc8;
use crate::direction::Direction;
use crate::instruction::{decode_instruction, Instruction};
use crate::packet::Packet;
use crate::speed::{self, decode_rggggg, decode_rggggggg, scale_speed};
use rand_core::RngCore;

/// Result of a CV-access request: either the (possibly unchanged) value is
/// known right away, or the host needs another `execute()` call to produce
/// it (e.g. a flash-backed CV store).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CvReply<T> {
    Ready(T),
    Pending,
}

/// Operations-mode long-form CV writes commit on the second identical
/// packet; further repeats read back as a verify/POM echo.
const OPERATIONS_WRITE_THRESHOLD: usize = 2;
/// Service-mode long-form CV writes commit on the fifth identical packet.
const SERVICE_WRITE_THRESHOLD: usize = 5;

/// Host hooks a decoder application implements so [`Dispatcher::execute`]
/// can apply decoded commands and access CVs.
///
/// Supertrait of [`CvSource`]: CV reads used purely to rebuild
/// [`Config`]/[`Addresses`] go through `read_cv`, while CV reads/writes
/// that originate from a command on the bus (service mode, POM, long/short
/// form CV access) go through `verify_cv`/`write_cv` and friends, which can
/// defer by returning [`CvReply::Pending`].
pub trait Decoder: CvSource {
    /// Whether this decoder answers `0x3E` (MAN/east-west), the RCN-218
    /// compass-direction command occasionally used in tandem with
    /// automatic logon. Re-expresses the original's compile-time
    /// `EastWestMan<T>` concept as a capability flag.
    const SUPPORTS_EAST_WEST_MAN: bool = false;

    fn direction(&mut self, addr: u16, dir: Direction);
    fn speed(&mut self, addr: u16, speed: i32);
    fn function(&mut self, addr: u16, mask: u32, state: u32);

    /// Entering or leaving service mode.
    fn service_mode_hook(&mut self, entering: bool);
    /// A service-mode verify/write matched the expected value.
    fn service_ack(&mut self);

    /// `0x3E`, only called when [`Decoder::SUPPORTS_EAST_WEST_MAN`] is set.
    fn east_west_man(&mut self, _addr: u16, _dir: Option<Direction>) {}

    /// Emergency stop. Default forwards to [`Decoder::speed`] with
    /// [`speed::ESTOP`].
    fn emergency_stop(&mut self, addr: u16) {
        self.speed(addr, speed::ESTOP);
    }

    /// NMRA manufacturer ID (CV8). Default is
    /// [`crate::manufacturer::DEFAULT_MANUFACTURER_ID`].
    fn manufacturer_id(&mut self) -> u8 {
        crate::manufacturer::DEFAULT_MANUFACTURER_ID
    }

    fn verify_cv(&mut self, cv_addr: u32, byte: u8) -> CvReply<u8>;
    fn write_cv(&mut self, cv_addr: u32, byte: u8) -> CvReply<u8>;
    fn verify_cv_bit(&mut self, cv_addr: u32, pos: u8, bit: bool) -> CvReply<bool>;
    fn write_cv_bit(&mut self, cv_addr: u32, pos: u8, bit: bool) -> CvReply<bool>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mode {
    Operations,
    Service,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Operations
    }
}

/// Decodes framed packets from a [`Frontend`] and drives a [`Decoder`]
/// host, maintaining the address/CV configuration snapshot and the BiDi
/// responder across calls.
pub struct Dispatcher {
    addrs: Addresses,
    config: Config,
    responder: Responder,
    mode: Mode,
    index_reg: u8,
    own_equal_packets_count: usize,
    last_own_packet: Packet,
    pending: Option<Packet>,
    busy: bool,
    last_packet_us: u32,
    tos_window_start_us: u32,
}

impl Dispatcher {
    pub fn new(rng: &mut impl RngCore) -> Self {
        Dispatcher {
            addrs: Addresses::default(),
            config: Config::default(),
            responder: Responder::new(rng),
            mode: Mode::Operations,
            index_reg: 1,
            own_equal_packets_count: 1,
            last_own_packet: Packet::new(),
            pending: None,
            busy: false,
            last_packet_us: 0,
            tos_window_start_us: 0,
        }
    }

    /// (Re)build the address/CV snapshot and BiDi configuration. Call once
    /// at startup and whenever a CV in [`super::config::RELOAD_ON_CV_WRITE`]
    /// is written.
    pub fn reload_config<D: Decoder>(&mut self, host: &mut D) {
        self.config.reload(&mut self.addrs, host);

        let cv28 = host.read_cv(28 - 1);
        let did = [
            host.read_cv(250 - 1),
            host.read_cv(251 - 1),
            host.read_cv(252 - 1),
            host.read_cv(253 - 1),
        ];
        let logon_bytes = [host.read_cv(65297 - 1), host.read_cv(65298 - 1)];
        self.addrs.logon = decode_address(&logon_bytes).0;
        let cid = ((host.read_cv(65299 - 1) as u16) << 8) | host.read_cv(65300 - 1) as u16;
        let session_id = host.read_cv(65301 - 1);

        self.responder.configure(
            self.config.bidi_enabled,
            self.config.consist_answers_channel2,
            cv28,
            did,
            cid,
            session_id,
        );
    }

    /// Drive one `execute()` tick: flushes a pending logon-store, updates
    /// the tip-off-search timestamps, then pops and dispatches one packet
    /// (the one left over from a [`CvReply::Pending`] retry, if any, else
    /// the oldest one `frontend` has framed).
    ///
    /// Returns whether the packet (if any) was addressed to this decoder.
    pub fn execute<D: Decoder, const N: usize>(
        &mut self,
        frontend: &mut Frontend<N>,
        host: &mut D,
        now_us: u32,
        rng: &mut impl RngCore,
    ) -> bool {
        if let Some(store) = self.responder.take_logon_store(self.addrs.primary.value) {
            let _ = host.write_cv(17 - 1, 0b1100_0000 | (store.assigned_addr >> 8) as u8);
            let _ = host.write_cv(18 - 1, store.assigned_addr as u8);
            let _ = host.write_cv_bit(29 - 1, 5, true);
            let _ = host.write_cv(65297 - 1, (self.addrs.logon.value >> 8) as u8);
            let _ = host.write_cv(65298 - 1, self.addrs.logon.value as u8);
            let _ = host.write_cv(65299 - 1, (store.cid >> 8) as u8);
            let _ = host.write_cv(65300 - 1, store.cid as u8);
            let _ = host.write_cv(65301 - 1, store.session_id);
        }

        if now_us.wrapping_sub(self.last_packet_us) >= 2_000_000 {
            self.tos_window_start_us = now_us;
        }
        self.last_packet_us = now_us;

        let Some(packet) = self.pending.take().or_else(|| frontend.take_packet()) else {
            return false;
        };

        self.busy = false;
        let retval = match self.mode {
            Mode::Operations => self.execute_operations(&packet, host, frontend, rng),
            Mode::Service => {
                self.execute_service(&packet, host);
                true
            }
        };

        if self.busy {
            self.pending = Some(packet);
        }
        retval
    }

    fn count_own_equal_packets(&mut self, packet: &Packet) {
        if packet.as_slice() == self.last_own_packet.as_slice() {
            self.own_equal_packets_count += 1;
        } else {
            self.own_equal_packets_count = 1;
            self.last_own_packet = packet.clone();
        }
    }

    // ---- operations mode -------------------------------------------------

    fn execute_operations<D: Decoder, const N: usize>(
        &mut self,
        packet: &Packet,
        host: &mut D,
        frontend: &mut Frontend<N>,
        rng: &mut impl RngCore,
    ) -> bool {
        let (addr, consumed) = decode_address(packet);
        self.addrs.received = addr;

        let retval = match addr.r#type {
            AddressType::IdleSystem => {
                self.execute_operations_system(&packet[consumed..], host);
                false
            }
            AddressType::Broadcast | AddressType::Short | AddressType::Long => {
                self.execute_operations_addressed(addr, packet, consumed, host, rng)
            }
            AddressType::AutomaticLogon => self.execute_automatic_logon(packet, host, rng),
            _ => false,
        };

        self.qos(frontend);
        retval
    }

    fn execute_operations_system<D: Decoder>(&mut self, bytes: &[u8], host: &mut D) {
        match bytes[0] {
            0x01 => {
                let _ = bytes[1] == host.manufacturer_id();
            }
            0x02..=0x04 => {} // decoder search / direct access / set address: not supported
            _ => {}
        }
    }

    fn execute_operations_addressed<D: Decoder>(
        &mut self,
        mut addr: Address,
        packet: &Packet,
        consumed: usize,
        host: &mut D,
        rng: &mut impl RngCore,
    ) -> bool {
        if addr.r#type == AddressType::Broadcast {
            // proceed, addr stays the broadcast sentinel
        } else if (addr == self.addrs.primary || addr == self.addrs.consist)
            && self.addrs.logon.r#type == AddressType::UnknownService
        {
            // proceed unchanged
        } else if addr == self.addrs.logon && self.addrs.logon.r#type != AddressType::UnknownService {
            addr = self.addrs.primary;
        } else {
            return false;
        }

        self.count_own_equal_packets(packet);
        let bytes = &packet[consumed..];

        match decode_instruction(bytes) {
            Instruction::UnknownService => {}
            Instruction::DecoderControl => {
                if addr.r#type == AddressType::Broadcast && bytes[0] == 0 {
                    self.service_mode(true, host);
                } else {
                    self.decoder_control(bytes, host);
                }
            }
            Instruction::ConsistControl => self.consist_control(bytes, host),
            Instruction::AdvancedOperations => self.advanced_operations(addr, bytes, host, rng),
            Instruction::SpeedDirection => self.speed_and_direction(addr, bytes, host),
            Instruction::FunctionGroup => self.function_group(addr, bytes, host),
            Instruction::FeatureExpansion => self.feature_expansion(addr, bytes, host, rng),
            Instruction::CvAccess => {
                if (0xE4..=0xEF).contains(&bytes[0]) {
                    self.cv_long(bytes, OPERATIONS_WRITE_THRESHOLD, host);
                } else {
                    self.cv_short(bytes, host);
                }
            }
            Instruction::Logon => {}
        }

        true
    }

    fn execute_automatic_logon<D: Decoder>(
        &mut self,
        packet: &Packet,
        host: &mut D,
        rng: &mut impl RngCore,
    ) -> bool {
        // Short automatic-logon packets (LOGON_ENABLE) carry no CRC-8 trailer;
        // longer ones (SELECT/ASSIGN) do, and a bad residue means garbage.
        if packet.len() > 7 && crc8(packet) != 0 {
            return true;
        }

        let bytes = &packet[1..];
        if bytes.is_empty() {
            return true;
        }
        match bytes[0] & 0xF0 {
            0b1101_0000 => {
                // SELECT
                if bytes.len() >= 6 {
                    let did = [bytes[2], bytes[3], bytes[4], bytes[5]];
                    self.responder.logon_select(did, self.addrs.primary.value);
                }
            }
            0b1110_0000 => {
                // ASSIGN
                if bytes.len() >= 8 {
                    let did = [bytes[2], bytes[3], bytes[4], bytes[5]];
                    let overwrite_primary = crate::factory::logon::assign_overwrites_primary(bytes[6]);
                    let a13_8 = bytes[6] & 0x3F;
                    let addr = if a13_8 < 0x28 {
                        Some(decode_address(&bytes[6..]).0)
                    } else if a13_8 < 0x38 {
                        None // accessory decoder: not supported
                    } else if a13_8 < 0x39 {
                        Some(decode_address(&bytes[7..]).0)
                    } else {
                        None // reserved / firmware update
                    };
                    if let Some(addr) = addr {
                        self.responder
                            .logon_assign(did, addr, overwrite_primary, &mut self.addrs);
                    }
                }
            }
            0b1111_0000 => {
                // ENABLE
                if bytes.len() >= 4 {
                    let gg = bytes[0] & 0b11;
                    let cid = ((bytes[1] as u16) << 8) | bytes[2] as u16;
                    let session_id = bytes[3];
                    self.responder.logon_enable(gg, cid, session_id, rng);
                }
            }
            _ => {}
        }
        let _ = host;
        true
    }

    fn decoder_control<D: Decoder>(&mut self, _bytes: &[u8], _host: &mut D) {
        // TODO: decoder-control sub-commands (factory reset, hard reset,
        // decoder-ack request) are not implemented, matching upstream.
    }

    fn consist_control<D: Decoder>(&mut self, bytes: &[u8], host: &mut D) {
        self.write(host, 19 - 1, ((bytes[0] & 1) << 7) | (bytes[1] & 0x7F));
    }

    fn advanced_operations<D: Decoder>(
        &mut self,
        addr: Address,
        bytes: &[u8],
        host: &mut D,
        rng: &mut impl RngCore,
    ) {
        match bytes[0] {
            0x3F => {
                let dir = Direction::from(bytes[1] & 0x80 != 0);
                let raw = decode_rggggggg(bytes[1]);
                if raw == speed::ESTOP {
                    host.emergency_stop(addr.value);
                    return;
                }
                let speed = scale_speed::<126>(raw);
                self.direction_speed(addr, dir, speed, host);
            }
            0x3E => {
                if D::SUPPORTS_EAST_WEST_MAN {
                    let dir = match bytes[1] & 0b0110_0000 {
                        0b0100_0000 => Some(Direction::WEST),
                        0b0010_0000 => Some(Direction::EAST),
                        _ => None,
                    };
                    host.east_west_man(addr.value, dir);
                }
            }
            0x3C | 0x3D => {} // analog function group / 0x3D: not supported
            _ => {}
        }
        let _ = rng;
    }

    fn speed_and_direction<D: Decoder>(&mut self, addr: Address, bytes: &[u8], host: &mut D) {
        let dir = Direction::from(bytes[0] & 0x20 != 0);
        let raw = decode_rggggg(bytes[0], !self.config.f0_exception);
        if raw == speed::ESTOP {
            host.emergency_stop(addr.value);
            return;
        }
        let speed = if self.config.f0_exception {
            let f0 = bytes[0] & 0x10 != 0;
            host.function(addr.value, 0x1, f0 as u32);
            scale_speed::<14>(raw)
        } else {
            scale_speed::<28>(raw)
        };
        self.direction_speed(addr, dir, speed, host);
    }

    fn function_group<D: Decoder>(&mut self, addr: Address, bytes: &[u8], host: &mut D) {
        let (mask, state) = match bytes[0] & 0xF0 {
            0b1000_0000 | 0b1001_0000 => {
                let mask = if self.config.f0_exception {
                    0b0001_1110
                } else {
                    0b0001_1111
                };
                let state = ((bytes[0] & 0xF) as u32) << 1 | ((bytes[0] & 0x10) as u32) >> 4;
                (mask, state)
            }
            0b1011_0000 => (0b0001_1110_0000u32, ((bytes[0] & 0x0F) as u32) << 5),
            0b1010_0000 => (0b0001_1110_0000_0000u32, ((bytes[0] & 0x0F) as u32) << 9),
            _ => (0, 0),
        };
        host.function(addr.value, mask, state);
    }

    fn feature_expansion<D: Decoder>(
        &mut self,
        addr: Address,
        bytes: &[u8],
        host: &mut D,
        rng: &mut impl RngCore,
    ) {
        match bytes[0] {
            0b1100_0000 => {
                let xf = (bytes[2] as u32) << 7 | (bytes[1] & 0x7F) as u32;
                self.binary_state(xf, bytes[1] & 0x80 != 0, rng);
            }
            0b1101_1101 => {
                let xf = (bytes[1] & 0x7F) as u32;
                self.binary_state(xf, bytes[1] & 0x80 != 0, rng);
            }
            0b1100_0001 | 0b1100_0010 | 0b1100_0011 => {} // time / system time / cs properties
            0b1101_1110 => {
                host.function(addr.value, 0x001F_E000, (bytes[1] as u32) << 13);
            }
            0b1101_1111 => {
                host.function(addr.value, 0x1FE0_0000, (bytes[1] as u32) << 21);
            }
            0b1101_1000..=0b1101_1100 => {} // F29-F68: not supported
            _ => {}
        }
    }

    fn binary_state(&mut self, xf: u32, state: bool, rng: &mut impl RngCore) {
        if xf == 2 && !state {
            self.addrs.received.r#type = AddressType::TipOffSearch;
            let idle_s = self.last_packet_us.wrapping_sub(self.tos_window_start_us) / 1_000_000;
            self.responder.tip_off_search(&self.addrs, idle_s, rng);
        }
        // xf == 4/5: track-voltage/high-current announcements, not modeled
        // as inbound commands; no-op, matching upstream.
    }

    fn cv_long<D: Decoder>(&mut self, bytes: &[u8], write_threshold: usize, host: &mut D) {
        let cv_addr = ((bytes[0] & 0b11) as u32) << 8 | bytes[1] as u32;
        match (bytes[0] >> 2) & 0b11 {
            0b01 => {
                self.verify(host, cv_addr, bytes[2]);
            }
            0b11 => {
                if self.own_equal_packets_count < write_threshold {
                    return;
                } else if self.own_equal_packets_count == write_threshold {
                    self.write(host, cv_addr, bytes[2]);
                } else {
                    self.verify(host, cv_addr, bytes[2]);
                }
            }
            0b10 => {
                let pos = bytes[2] & 0b111;
                let bit = bytes[2] & 0b1000 != 0;
                if bytes[2] & 0b1_0000 == 0 {
                    self.verify_bit(host, cv_addr, pos, bit);
                } else if self.own_equal_packets_count == write_threshold {
                    self.write_bit(host, cv_addr, pos, bit);
                }
            }
            _ => {}
        }
    }

    fn cv_short<D: Decoder>(&mut self, bytes: &[u8], host: &mut D) {
        match bytes[0] & 0x0F {
            0b0010 => self.write(host, 22, bytes[1]), // CV23
            0b0011 => self.write(host, 23, bytes[1]), // CV24
            0b0100 => {
                if self.own_equal_packets_count == 2 {
                    self.write(host, 16, 0b1100_0000 | bytes[1]); // CV17
                    self.write(host, 17, bytes[2]); // CV18
                    self.write_bit(host, 28, 5, true); // CV29 bit 5
                }
            }
            0b0101 => {
                if self.own_equal_packets_count == 2 {
                    self.write(host, 30, bytes[1]); // CV31
                    self.write(host, 31, bytes[2]); // CV32
                }
            }
            _ => {}
        }
    }

    fn verify<D: Decoder>(&mut self, host: &mut D, cv_addr: u32, byte: u8) {
        if self.config.cvs_locked {
            return;
        }
        if let CvReply::Ready(red) = host.verify_cv(cv_addr, byte) {
            self.on_cv_ready(host, cv_addr, red, byte, false);
        } else {
            self.busy = true;
        }
    }

    fn write<D: Decoder>(&mut self, host: &mut D, cv_addr: u32, byte: u8) {
        if self.config.cvs_locked && cv_addr != 14 {
            return;
        }
        if let CvReply::Ready(red) = host.write_cv(cv_addr, byte) {
            self.on_cv_ready(host, cv_addr, red, byte, true);
        } else {
            self.busy = true;
        }
    }

    fn verify_bit<D: Decoder>(&mut self, host: &mut D, cv_addr: u32, pos: u8, bit: bool) {
        if self.config.cvs_locked {
            return;
        }
        if let CvReply::Ready(red) = host.verify_cv_bit(cv_addr, pos, bit) {
            self.on_cv_bit_ready(host, cv_addr, red, bit, false);
        } else {
            self.busy = true;
        }
    }

    fn write_bit<D: Decoder>(&mut self, host: &mut D, cv_addr: u32, pos: u8, bit: bool) {
        if self.config.cvs_locked && cv_addr != 14 {
            return;
        }
        if let CvReply::Ready(red) = host.write_cv_bit(cv_addr, pos, bit) {
            self.on_cv_bit_ready(host, cv_addr, red, bit, true);
        } else {
            self.busy = true;
        }
    }

    fn on_cv_ready<D: Decoder>(
        &mut self,
        host: &mut D,
        cv_addr: u32,
        red: u8,
        expected: u8,
        was_write: bool,
    ) {
        if self.mode == Mode::Operations {
            self.responder.pom(red);
        } else if red == expected {
            host.service_ack();
        }
        if was_write && crate::rx::config::triggers_reload(cv_addr + 1) {
            self.reload_config(host);
        }
    }

    fn on_cv_bit_ready<D: Decoder>(
        &mut self,
        host: &mut D,
        cv_addr: u32,
        red: bool,
        expected: bool,
        was_write: bool,
    ) {
        if self.mode == Mode::Operations {
            self.responder.pom(red as u8);
        } else if red == expected {
            host.service_ack();
        }
        if was_write && crate::rx::config::triggers_reload(cv_addr + 1) {
            self.reload_config(host);
        }
    }

    fn register_mode<D: Decoder>(&mut self, bytes: &[u8], host: &mut D) {
        let w = bytes[0] & 0b1000 != 0;
        let reg = bytes[0] & 0b111;
        match reg {
            0..=3 => {
                let cv_addr = (self.index_reg as u32 - 1) * 4 + reg as u32;
                if w {
                    self.write(host, cv_addr, bytes[1]);
                } else {
                    self.verify(host, cv_addr, bytes[1]);
                }
            }
            4 => {
                if w {
                    self.write(host, 28, bytes[1]);
                } else {
                    self.verify(host, 28, bytes[1]);
                }
            }
            5 => {
                if w {
                    self.index_reg = bytes[1];
                } else if self.index_reg == bytes[1] {
                    host.service_ack();
                }
            }
            6 | 7 => {
                let cv_addr = reg as u32;
                if w {
                    self.write(host, cv_addr, bytes[1]);
                } else {
                    self.verify(host, cv_addr, bytes[1]);
                }
            }
            _ => {}
        }
    }

    // ---- service mode ------------------------------------------------

    fn execute_service<D: Decoder>(&mut self, packet: &Packet, host: &mut D) {
        self.count_own_equal_packets(packet);

        if packet[0] == 0 {
            // reset: ignored
        } else if packet[0] & 0xF0 != 0b0111_0000 {
            self.service_mode(false, host);
        } else if packet.len() == 3 {
            self.register_mode(packet, host);
        } else if packet.len() == 4 {
            self.cv_long(packet, SERVICE_WRITE_THRESHOLD, host);
        }
    }

    fn service_mode<D: Decoder>(&mut self, enter: bool, host: &mut D) {
        host.service_mode_hook(enter);
        self.mode = if enter { Mode::Service } else { Mode::Operations };
    }

    // ---- shared helpers -----------------------------------------------

    fn direction_speed<D: Decoder>(&mut self, addr: Address, mut dir: Direction, speed: i32, host: &mut D) {
        let reversed = if addr == self.addrs.primary {
            self.addrs.primary.reversed
        } else {
            self.addrs.consist.reversed
        };
        if reversed {
            dir = match dir {
                Direction::Forward => Direction::Backward,
                Direction::Backward => Direction::Forward,
            };
        }
        host.direction(addr.value, dir);
        host.speed(addr.value, speed);
    }

    fn qos<const N: usize>(&mut self, frontend: &mut Frontend<N>) {
        let preambles = frontend.preambles_seen();
        if preambles < 100 {
            return;
        }
        let packets = frontend.packets_seen();
        let q = 100 - (packets * 100 / preambles).min(100);
        self.responder.dyn_value(q as u8, 7);
        frontend.reset_counts();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressType;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    #[derive(Default)]
    struct FakeHost {
        cvs: [u8; 1024],
        speeds: heapless::Vec<(u16, i32), 8>,
        dirs: heapless::Vec<(u16, Direction), 8>,
        functions: heapless::Vec<(u16, u32, u32), 8>,
        service_acks: usize,
        service_mode_calls: heapless::Vec<bool, 4>,
    }

    impl CvSource for FakeHost {
        fn read_cv(&mut self, cv_addr_0_indexed: u32) -> u8 {
            self.cvs[cv_addr_0_indexed as usize]
        }
    }

    impl Decoder for FakeHost {
        fn direction(&mut self, addr: u16, dir: Direction) {
            let _ = self.dirs.push((addr, dir));
        }
        fn speed(&mut self, addr: u16, speed: i32) {
            let _ = self.speeds.push((addr, speed));
        }
        fn function(&mut self, addr: u16, mask: u32, state: u32) {
            let _ = self.functions.push((addr, mask, state));
        }
        fn service_mode_hook(&mut self, entering: bool) {
            let _ = self.service_mode_calls.push(entering);
        }
        fn service_ack(&mut self) {
            self.service_acks += 1;
        }
        fn verify_cv(&mut self, cv_addr: u32, _byte: u8) -> CvReply<u8> {
            CvReply::Ready(self.cvs[cv_addr as usize])
        }
        fn write_cv(&mut self, cv_addr: u32, byte: u8) -> CvReply<u8> {
            self.cvs[cv_addr as usize] = byte;
            CvReply::Ready(byte)
        }
        fn verify_cv_bit(&mut self, cv_addr: u32, pos: u8, bit: bool) -> CvReply<bool> {
            let _ = bit;
            CvReply::Ready(self.cvs[cv_addr as usize] & (1 << pos) != 0)
        }
        fn write_cv_bit(&mut self, cv_addr: u32, pos: u8, bit: bool) -> CvReply<bool> {
            if bit {
                self.cvs[cv_addr as usize] |= 1 << pos;
            } else {
                self.cvs[cv_addr as usize] &= !(1 << pos);
            }
            CvReply::Ready(bit)
        }
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(1)
    }

    fn packet(bytes: &[u8]) -> Packet {
        let mut p = Packet::new();
        p.extend_from_slice(bytes).unwrap();
        p
    }

    #[test]
    fn speed_and_direction_28_step_forward_half_speed() {
        let mut rng = rng();
        let mut d = Dispatcher::new(&mut rng);
        let mut host = FakeHost::default();
        host.cvs[0] = 3; // CV1, short address 3
        host.cvs[28] = 0b10; // CV29 bit 1: 28-step mode (no F0 exception)
        d.reload_config(&mut host);

        let mut frontend: Frontend<4> = Frontend::new();

        // address 3, speed-and-direction byte: forward, speed step 15/28
        let speed_byte = 0x40 | 0x20 | 0b0_1111;
        let pkt = packet(&[3, speed_byte, 3 ^ speed_byte]);
        d.execute_operations(&pkt, &mut host, &mut frontend, &mut rng);

        assert_eq!(host.dirs.last(), Some(&(3, Direction::Forward)));
        assert!(host.speeds.last().unwrap().1 > 0);
    }

    #[test]
    fn function_group_f0_f4_sets_expected_mask_and_state() {
        let mut rng = rng();
        let mut d = Dispatcher::new(&mut rng);
        let mut host = FakeHost::default();
        host.cvs[0] = 3;
        host.cvs[28] = 0b10; // CV29 bit 1: no F0 exception, F0 rides along in this group
        d.reload_config(&mut host);
        let mut frontend: Frontend<4> = Frontend::new();

        // group 0x80-0x8F: F0,F4-F1 packed as (bits4..1)<<1 | bit4>>4? use
        // instruction byte 0b1001_0101 -> F1 and F4 and F0 set per encoding
        let instr = 0b1001_0101u8;
        let pkt = packet(&[3, instr, 3 ^ instr]);
        d.execute_operations(&pkt, &mut host, &mut frontend, &mut rng);

        let (addr, mask, state) = *host.functions.last().unwrap();
        assert_eq!(addr, 3);
        assert_eq!(mask, 0b0001_1111);
        assert_eq!(state, ((instr & 0xF) as u32) << 1 | ((instr & 0x10) as u32) >> 4);
    }

    #[test]
    fn cv_long_form_write_commits_on_second_identical_packet() {
        let mut rng = rng();
        let mut d = Dispatcher::new(&mut rng);
        let mut host = FakeHost::default();
        host.cvs[0] = 3;
        d.reload_config(&mut host);
        let mut frontend: Frontend<4> = Frontend::new();

        // CV long form write: 0b1110_11cc, cv_addr high 2 bits = 0, cv 29 (0-indexed 28)
        let instr = 0b1110_1100u8;
        let cv_hi = 0u8; // cv_addr bits 9-8
        let cv_lo = 28u8; // CV29, 0-indexed
        let value = 0x12u8;
        let bytes = [instr | cv_hi, cv_lo, value];
        let xor = 3 ^ bytes[0] ^ bytes[1] ^ bytes[2];
        let pkt = packet(&[3, bytes[0], bytes[1], bytes[2], xor]);

        // first packet: count goes to 1 (fresh), no write yet
        d.execute_operations(&pkt, &mut host, &mut frontend, &mut rng);
        assert_eq!(host.cvs[28], 0);

        // second identical packet: count reaches 2, write commits
        d.execute_operations(&pkt, &mut host, &mut frontend, &mut rng);
        assert_eq!(host.cvs[28], value);
    }

    #[test]
    fn service_mode_long_form_write_commits_on_fifth_packet() {
        let mut rng = rng();
        let mut d = Dispatcher::new(&mut rng);
        let mut host = FakeHost::default();
        d.reload_config(&mut host);
        d.service_mode(true, &mut host);

        let instr = 0b1110_1100u8; // write, cv_addr high bits 0
        let cv_lo = 0u8; // CV1
        let value = 42u8;
        let bytes = [instr, cv_lo, value];
        let xor = bytes[0] ^ bytes[1] ^ bytes[2];
        let pkt = packet(&[bytes[0], bytes[1], bytes[2], xor]);

        // first four packets: count climbs to 4, no write yet
        for _ in 0..4 {
            d.execute_service(&pkt, &mut host);
            assert_eq!(host.cvs[0], 0);
        }

        // fifth identical packet: count reaches 5, write commits
        d.execute_service(&pkt, &mut host);
        assert_eq!(host.cvs[0], value);
    }

    /// Builds an automatic-logon SELECT packet (address 254, did all zero,
    /// matching `FakeHost`'s default DID) with a correct or corrupted
    /// trailing CRC-8 residue.
    fn logon_select_packet(valid_crc: bool) -> Packet {
        let head = [254u8, 0b1101_0000, 0, 0, 0, 0, 0]; // addr, cmd, resv, did x4
        let crc = crate::crc8::crc8(&head);
        let trailer = if valid_crc { crc } else { crc ^ 0xFF };
        packet(&[head[0], head[1], head[2], head[3], head[4], head[5], head[6], trailer])
    }

    #[test]
    fn automatic_logon_select_with_bad_crc_is_ignored() {
        let mut rng = rng();
        let mut d = Dispatcher::new(&mut rng);
        let mut host = FakeHost::default();
        d.reload_config(&mut host); // default DID [0,0,0,0] matches the packet's did
        let mut frontend: Frontend<4> = Frontend::new();

        let pkt = logon_select_packet(false);
        d.execute_operations(&pkt, &mut host, &mut frontend, &mut rng);

        let reply = d
            .responder
            .cutout_channel1(Address::new(254, AddressType::AutomaticLogon));
        assert!(reply.is_none());
    }

    #[test]
    fn automatic_logon_select_with_good_crc_is_answered() {
        let mut rng = rng();
        let mut d = Dispatcher::new(&mut rng);
        let mut host = FakeHost::default();
        d.reload_config(&mut host);
        let mut frontend: Frontend<4> = Frontend::new();

        let pkt = logon_select_packet(true);
        d.execute_operations(&pkt, &mut host, &mut frontend, &mut rng);

        let reply = d
            .responder
            .cutout_channel1(Address::new(254, AddressType::AutomaticLogon));
        assert!(reply.is_some());
    }

    #[test]
    fn idle_system_manufacturer_id_broadcast_is_recognized() {
        let mut rng = rng();
        let mut d = Dispatcher::new(&mut rng);
        let mut host = FakeHost::default();
        d.reload_config(&mut host);
        let mut frontend: Frontend<4> = Frontend::new();

        let bytes = [255u8, 0x01, 13u8];
        let xor = bytes[0] ^ bytes[1] ^ bytes[2];
        let pkt = packet(&[bytes[0], bytes[1], bytes[2], xor]);
        let handled = d.execute_operations(&pkt, &mut host, &mut frontend, &mut rng);
        assert!(!handled); // IdleSystem never counts as "addressed to us"
    }

    #[test]
    fn broadcast_zero_address_with_decoder_control_zero_enters_service_mode() {
        let mut rng = rng();
        let mut d = Dispatcher::new(&mut rng);
        let mut host = FakeHost::default();
        d.reload_config(&mut host);
        let mut frontend: Frontend<4> = Frontend::new();

        let bytes = [0u8, 0x00, 0x00];
        let pkt = packet(&bytes);
        d.execute_operations(&pkt, &mut host, &mut frontend, &mut rng);
        assert_eq!(d.mode, Mode::Service);
        assert_eq!(host.service_mode_calls.last(), Some(&true));
    }
}

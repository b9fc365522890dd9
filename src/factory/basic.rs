//! Idle/reset, decoder-control, and advanced-operations 128-step speed
//! packets.

use super::push_loco_address;
use crate::direction::Direction;
use crate::packet::{self, Packet};
use crate::Result;

/// `{0xFF, 0x00, 0xFF}`, the fixed idle packet.
pub fn make_idle_packet() -> Packet {
    packet::make_idle_packet()
}

/// `{0x00, 0x00, 0x00}`, the fixed digital reset packet.
pub fn make_reset_packet() -> Packet {
    packet::make_reset_packet()
}

/// Hard reset: decoder control instruction `0b0000_0000` with the hard
/// reset bit set, broadcast address.
pub fn make_hard_reset_packet() -> Result<Packet> {
    let mut p = Packet::new();
    p.extend_from_slice(&[0x00, 0b0000_1000])
        .map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Factory test instruction, decoder control family.
pub fn make_factory_test_packet(addr: u16) -> Result<Packet> {
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.push(0b0000_0111).map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Set advanced addressing: writes CV29 bit 5 via the decoder-control
/// instruction's data bit.
pub fn make_set_advanced_addressing_packet(addr: u16, on: bool) -> Result<Packet> {
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.push(0b1010_1110 | (on as u8))
        .map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Decoder acknowledgement request, decoder control family.
pub fn make_ack_request_packet(addr: u16) -> Result<Packet> {
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.push(0b0000_1111).map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Advanced-operations 128-speed-step packet: instruction byte
/// `0b0011_1111`, data byte `(dir << 7) | speed` with `speed` the raw
/// 0..127 RGGGGGGG field. Callers wanting CV2/CV23/CV24-scaled speeds
/// should run [`crate::speed::scale_speed`] before calling this.
pub fn make_advanced_operations_speed_packet(
    addr: u16,
    dir: Direction,
    speed: u8,
) -> Result<Packet> {
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.push(0b0011_1111).map_err(|_| crate::Error::InvalidArgument)?;
    let r = (bool::from(dir) as u8) << 7;
    p.push(r | (speed & 0x7F))
        .map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_and_reset_packets_are_fixed() {
        assert_eq!(make_idle_packet().as_slice(), &[0xFF, 0x00, 0xFF]);
        assert_eq!(make_reset_packet().as_slice(), &[0x00, 0x00, 0x00]);
    }

    #[test]
    fn advanced_operations_speed_packet_has_valid_checksum() {
        let p = make_advanced_operations_speed_packet(3, Direction::Forward, 100).unwrap();
        assert_eq!(packet::exor_packet(&p), *p.last().unwrap());
        assert_eq!(p[1], 0b0011_1111);
        assert_eq!(p[2], 0b1000_0000 | 100);
    }

    #[test]
    fn ack_request_addresses_a_long_loco() {
        let p = make_ack_request_packet(500).unwrap();
        assert_eq!(p.len(), 4);
        assert_eq!(packet::exor_packet(&p), *p.last().unwrap());
    }
}

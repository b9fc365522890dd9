//! Automatic-logon packets (RCN-218): logon-enable, logon-select and
//! logon-assign, each addressed `0xFE` and carrying a CRC-8 over their own
//! payload in addition to the ordinary packet checksum.
//!
//! Unlike every other instruction family, these are never routed through
//! [`crate::instruction::decode_instruction`] — a decoder recognizes them by
//! address type ([`crate::address::AddressType::AutomaticLogon`]) and reads
//! the sub-command nibble directly out of the first payload byte.

use crate::address_group::AddressGroup;
use crate::crc8::crc8;
use crate::packet::{self, Packet};
use crate::Result;

const ADDR: u8 = 0xFE;
const SELECT: u8 = 0b1101_0000;
const ASSIGN: u8 = 0b1110_0000;
const ENABLE: u8 = 0b1111_0000;

fn finish_with_payload_crc8(p: &mut Packet, payload_start: usize) -> Result<()> {
    let crc = crc8(&p[payload_start..]);
    p.push(crc).map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(p)
}

/// Logon-enable: invites decoders in address group `group` to self-select
/// using `cid`/`session_id` as the command station's session identifiers.
pub fn make_logon_enable_packet(group: AddressGroup, cid: u16, session_id: u8) -> Result<Packet> {
    let mut p = Packet::new();
    p.push(ADDR).map_err(|_| crate::Error::InvalidArgument)?;
    let payload_start = p.len();
    p.push(ENABLE | (group as u8 & 0b11))
        .map_err(|_| crate::Error::InvalidArgument)?;
    p.extend_from_slice(&cid.to_be_bytes())
        .map_err(|_| crate::Error::InvalidArgument)?;
    p.push(session_id).map_err(|_| crate::Error::InvalidArgument)?;
    finish_with_payload_crc8(&mut p, payload_start)?;
    Ok(p)
}

/// Logon-select: addresses one decoder by its 32-bit unique/session ID and
/// asks it to report in.
pub fn make_logon_select_packet(unique_id: u32) -> Result<Packet> {
    let mut p = Packet::new();
    p.push(ADDR).map_err(|_| crate::Error::InvalidArgument)?;
    let payload_start = p.len();
    p.push(SELECT).map_err(|_| crate::Error::InvalidArgument)?;
    p.extend_from_slice(&unique_id.to_be_bytes())
        .map_err(|_| crate::Error::InvalidArgument)?;
    finish_with_payload_crc8(&mut p, payload_start)?;
    Ok(p)
}

/// Logon-assign: addresses one decoder by its 32-bit unique ID and assigns
/// it `addr` (long-address encoding only). When `overwrite_primary` is set,
/// the address is written to CV1/CV17/CV18 (the primary address) in
/// addition to the logon address; this is encoded in the top two bits of
/// the address-high byte, mirroring the long-address escape prefix used by
/// [`crate::address::encode_address`].
pub fn make_logon_assign_packet(
    unique_id: u32,
    addr: u16,
    overwrite_primary: bool,
) -> Result<Packet> {
    let mut p = Packet::new();
    p.push(ADDR).map_err(|_| crate::Error::InvalidArgument)?;
    let payload_start = p.len();
    p.push(ASSIGN).map_err(|_| crate::Error::InvalidArgument)?;
    p.extend_from_slice(&unique_id.to_be_bytes())
        .map_err(|_| crate::Error::InvalidArgument)?;
    let addr_high_prefix = if overwrite_primary {
        0b0100_0000
    } else {
        0b1100_0000
    };
    p.push(addr_high_prefix | ((addr >> 8) & 0x3F) as u8)
        .map_err(|_| crate::Error::InvalidArgument)?;
    p.push((addr & 0xFF) as u8)
        .map_err(|_| crate::Error::InvalidArgument)?;
    finish_with_payload_crc8(&mut p, payload_start)?;
    Ok(p)
}

/// Whether a decoded `LOGON_ASSIGN` payload's address-high byte requests a
/// primary-address overwrite, per the flag encoding [`make_logon_assign_packet`]
/// uses.
pub fn assign_overwrites_primary(addr_high_byte: u8) -> bool {
    addr_high_byte & 0b1100_0000 != 0b1100_0000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_packet_is_addressed_to_0xfe() {
        let p = make_logon_enable_packet(AddressGroup::Loco, 0xABCD, 0x42).unwrap();
        assert_eq!(p[0], 0xFE);
        assert_eq!(p[1] & 0xF0, ENABLE);
        assert_eq!(packet::exor_packet(&p), *p.last().unwrap());
    }

    #[test]
    fn assign_overwrite_flag_round_trips() {
        let p = make_logon_assign_packet(0x11223344, 500, true).unwrap();
        assert!(assign_overwrites_primary(p[6]));

        let p = make_logon_assign_packet(0x11223344, 500, false).unwrap();
        assert!(!assign_overwrites_primary(p[6]));
    }

    #[test]
    fn select_packet_has_a_valid_outer_checksum() {
        let p = make_logon_select_packet(0xDEADBEEF).unwrap();
        assert_eq!(p[1], SELECT);
        assert_eq!(packet::exor_packet(&p), *p.last().unwrap());
    }
}

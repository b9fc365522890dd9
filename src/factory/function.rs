//! Function-group and feature-expansion packets.

use super::push_loco_address;
use crate::packet::{self, Packet};
use crate::Result;

/// F0-F4 function group.
pub fn make_function_group_f4_f0_packet(addr: u16, state: u8) -> Result<Packet> {
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.push(0b1000_0000 | ((state & 0b1) << 4) | ((state & 0x1F) >> 1))
        .map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// F5-F8 function group.
pub fn make_function_group_f8_f5_packet(addr: u16, state: u8) -> Result<Packet> {
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.push(0b1011_0000 | (state & 0xF))
        .map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// F9-F12 function group.
pub fn make_function_group_f12_f9_packet(addr: u16, state: u8) -> Result<Packet> {
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.push(0b1010_0000 | (state & 0xF))
        .map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// F13-F20 feature expansion.
pub fn make_feature_expansion_f20_f13_packet(addr: u16, state: u8) -> Result<Packet> {
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.extend_from_slice(&[0b1101_1110, state])
        .map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// F21-F28 feature expansion.
pub fn make_feature_expansion_f28_f21_packet(addr: u16, state: u8) -> Result<Packet> {
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.extend_from_slice(&[0b1101_1111, state])
        .map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

//! Consist control: set/clear a locomotive's consist address (CV19).

use super::push_loco_address;
use crate::direction::Direction;
use crate::packet::{self, Packet};
use crate::Result;

/// Set the consist address, instruction `0b0001_0010`.
pub fn make_consist_control_set_packet(
    addr: u16,
    consist_addr: u8,
    reversed: Direction,
) -> Result<Packet> {
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.extend_from_slice(&[
        0b0001_0010,
        ((bool::from(reversed) as u8) << 7) | (consist_addr & 0x7F),
    ])
    .map_err(|_| crate::Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Clear the consist address, instruction `0b0001_0010` with a zero payload.
pub fn make_consist_control_clear_packet(addr: u16) -> Result<Packet> {
    make_consist_control_set_packet(addr, 0, Direction::Forward)
}

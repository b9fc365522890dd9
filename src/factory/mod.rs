//! Packet constructors, one module per instruction family.
//!
//! Every `make_*` function is a pure, non-failing constructor over its
//! fixed-width fields (unused high bits of a caller-supplied `state`/`byte`
//! are packed as-is, not masked) except the CV-address family, whose 10-bit
//! addresses are range-checked; see [`cv`].

pub mod accessory;
pub mod basic;
pub mod consist;
pub mod cv;
pub mod function;
pub mod logon;

use crate::address::{Address, AddressType};
use crate::packet::Packet;

/// Encode `addr`'s short/long address bytes into the front of `packet`,
/// shared by every factory function that addresses a locomotive decoder.
fn push_loco_address(addr: u16, packet: &mut Packet) -> crate::Result<()> {
    let r#type = if addr < 128 {
        AddressType::Short
    } else {
        AddressType::Long
    };
    let address = Address::new(addr, r#type);
    let mut buf = heapless::Vec::<u8, 4>::new();
    crate::address::encode_address(address, &mut buf)?;
    packet
        .extend_from_slice(&buf)
        .map_err(|_| crate::Error::InvalidArgument)
}

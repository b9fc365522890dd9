//! CV access long form packets, operations-mode and service-mode.

use super::push_loco_address;
use crate::packet::{self, Packet};
use crate::{Error, Result};

const CV_ADDR_MAX: u32 = 0x3FF;

fn check_cv_addr(cv_addr: u32) -> Result<()> {
    if cv_addr > CV_ADDR_MAX {
        Err(Error::InvalidArgument)
    } else {
        Ok(())
    }
}

/// Verify CV, operations mode.
pub fn make_cv_access_long_verify_packet(addr: u16, cv_addr: u32, byte: u8) -> Result<Packet> {
    check_cv_addr(cv_addr)?;
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.extend_from_slice(&[
        0b1110_0100 | ((cv_addr & CV_ADDR_MAX) >> 8) as u8,
        cv_addr as u8,
        byte,
    ])
    .map_err(|_| Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Write CV, operations mode.
pub fn make_cv_access_long_write_packet(addr: u16, cv_addr: u32, byte: u8) -> Result<Packet> {
    check_cv_addr(cv_addr)?;
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    p.extend_from_slice(&[
        0b1110_1100 | ((cv_addr & CV_ADDR_MAX) >> 8) as u8,
        cv_addr as u8,
        byte,
    ])
    .map_err(|_| Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Verify one CV bit, operations mode.
pub fn make_cv_access_long_verify_bit_packet(
    addr: u16,
    cv_addr: u32,
    bit: bool,
    pos: u8,
) -> Result<Packet> {
    check_cv_addr(cv_addr)?;
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    let d = (bit as u8) << 3;
    p.extend_from_slice(&[
        0b1110_1000 | ((cv_addr & CV_ADDR_MAX) >> 8) as u8,
        cv_addr as u8,
        0b1110_0000 | d | (pos & 0b111),
    ])
    .map_err(|_| Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Write one CV bit, operations mode.
pub fn make_cv_access_long_write_bit_packet(
    addr: u16,
    cv_addr: u32,
    bit: bool,
    pos: u8,
) -> Result<Packet> {
    check_cv_addr(cv_addr)?;
    let mut p = Packet::new();
    push_loco_address(addr, &mut p)?;
    let d = (bit as u8) << 3;
    p.extend_from_slice(&[
        0b1110_1000 | ((cv_addr & CV_ADDR_MAX) >> 8) as u8,
        cv_addr as u8,
        0b1111_0000 | d | (pos & 0b111),
    ])
    .map_err(|_| Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Verify CV, service mode (no address on the wire).
pub fn make_cv_access_long_verify_service_packet(cv_addr: u32, byte: u8) -> Result<Packet> {
    check_cv_addr(cv_addr)?;
    let mut p = Packet::new();
    p.extend_from_slice(&[
        0b0111_0100 | ((cv_addr & CV_ADDR_MAX) >> 8) as u8,
        cv_addr as u8,
        byte,
    ])
    .map_err(|_| Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Write CV, service mode.
pub fn make_cv_access_long_write_service_packet(cv_addr: u32, byte: u8) -> Result<Packet> {
    check_cv_addr(cv_addr)?;
    let mut p = Packet::new();
    p.extend_from_slice(&[
        0b0111_1100 | ((cv_addr & CV_ADDR_MAX) >> 8) as u8,
        cv_addr as u8,
        byte,
    ])
    .map_err(|_| Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Verify one CV bit, service mode.
pub fn make_cv_access_long_verify_bit_service_packet(
    cv_addr: u32,
    bit: bool,
    pos: u8,
) -> Result<Packet> {
    check_cv_addr(cv_addr)?;
    let mut p = Packet::new();
    let d = (bit as u8) << 3;
    p.extend_from_slice(&[
        0b0111_1000 | ((cv_addr & CV_ADDR_MAX) >> 8) as u8,
        cv_addr as u8,
        0b1110_0000 | d | (pos & 0b111),
    ])
    .map_err(|_| Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

/// Write one CV bit, service mode.
pub fn make_cv_access_long_write_bit_service_packet(
    cv_addr: u32,
    bit: bool,
    pos: u8,
) -> Result<Packet> {
    check_cv_addr(cv_addr)?;
    let mut p = Packet::new();
    let d = (bit as u8) << 3;
    p.extend_from_slice(&[
        0b0111_1000 | ((cv_addr & CV_ADDR_MAX) >> 8) as u8,
        cv_addr as u8,
        0b1111_0000 | d | (pos & 0b111),
    ])
    .map_err(|_| Error::InvalidArgument)?;
    packet::finish(&mut p)?;
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_packet_carries_the_cv_address_split_across_two_bytes() {
        let p = make_cv_access_long_verify_packet(3, 0x0200, 7).unwrap();
        assert_eq!(p[1] & 0x03, 0x02);
        assert_eq!(p[2], 0x00);
        assert_eq!(p[3], 7);
        assert_eq!(packet::exor_packet(&p), *p.last().unwrap());
    }

    #[test]
    fn out_of_range_cv_address_is_rejected() {
        assert_eq!(
            make_cv_access_long_write_service_packet(CV_ADDR_MAX + 1, 0),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn service_mode_packets_carry_no_address_byte() {
        let p = make_cv_access_long_verify_service_packet(17, 0).unwrap();
        assert_eq!(p.len(), 4);
    }
}

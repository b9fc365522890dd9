//! `make_app_*_datagram` helpers: build one app-ID's datagram, already
//! 4b6b-encoded and ready to copy into a channel slot.

use super::app::{self, ErrorCode, Ext, ExtType};
use super::datagram::{encode_datagram, make_datagram, Datagram};
use crate::address::Address;

pub fn make_app_pom_datagram(byte: u8) -> Datagram<2> {
    encode_datagram(make_datagram(app::Pom::ID, byte as u32))
}

/// `cv19` selects whether the consist address is reported instead of the
/// primary address (nonzero CV19 means a consist is active).
pub fn make_app_adr_high_datagram(addr: u16, cv19: u8) -> Datagram<2> {
    let data = if addr < 128 {
        if cv19 != 0 { 0b0110_0000 } else { 0 }
    } else {
        0x80 | ((addr & 0x3F00) >> 8) as u8
    };
    encode_datagram(make_datagram(app::AdrHigh::ID, data as u32))
}

pub fn make_app_adr_low_datagram(addr: u16, cv19: u8) -> Datagram<2> {
    let data = if addr < 128 {
        (cv19 & 0x80) | (addr & 0x7F) as u8
    } else {
        (addr & 0xFF) as u8
    };
    encode_datagram(make_datagram(app::AdrLow::ID, data as u32))
}

pub fn make_app_ext_datagram(ext: Ext) -> Datagram<3> {
    let p = if matches!(ext.t, ExtType::Reserved8 | ExtType::Reserved9 | ExtType::GasStation
        | ExtType::CoalDepot | ExtType::WaterCrane | ExtType::SandStore
        | ExtType::ChargingStation | ExtType::FillingStation)
    {
        ext.p & 0xFF
    } else {
        ext.p & 0x7FF
    };
    let data = ((ext.t as u32) << 8) | p as u32;
    encode_datagram(make_datagram(Ext::ID, data))
}

pub fn make_app_dyn_datagram(d: u8, x: u8) -> Datagram<3> {
    let data = ((d as u32) << 6) | (x & 0x3F) as u32;
    encode_datagram(make_datagram(app::Dyn::ID, data))
}

pub fn make_app_xpom_datagram(ss: usize, bytes: [u8; 4]) -> Datagram<6> {
    let id = app::Xpom::IDS[ss];
    let data = u32::from_be_bytes(bytes);
    encode_datagram(make_datagram(id, data))
}

pub fn make_app_cv_auto_datagram(cv_addr: u32, byte: u8) -> Datagram<6> {
    let data = (cv_addr << 8) | byte as u32;
    encode_datagram(make_datagram(app::CvAuto::ID, data))
}

/// A three-datagram channel-2 tip-off-search reply: `adr_high`, `adr_low`
/// and the elapsed-seconds-since-rerail field, concatenated.
pub fn make_app_search_datagram(addr: u16, cv19: u8, elapsed_s: u8) -> Datagram<6> {
    let mut out = [0u8; 6];
    out[0..2].copy_from_slice(&make_app_adr_high_datagram(addr, cv19));
    out[2..4].copy_from_slice(&make_app_adr_low_datagram(addr, cv19));
    out[4..6].copy_from_slice(&encode_datagram::<2>(make_datagram(
        app::Search::ID,
        elapsed_s as u32,
    )));
    out
}

pub fn make_app_srq_datagram(addr: Address) -> Datagram<2> {
    use crate::address::AddressType;
    debug_assert!(matches!(
        addr.r#type,
        AddressType::BasicAccessory | AddressType::ExtendedAccessory
    ));
    let high = (if matches!(addr.r#type, AddressType::BasicAccessory) {
        0b0000
    } else {
        0b1000
    }) | ((addr.value >> 8) & 0xFF) as u8;
    encode_datagram(make_datagram(high, (addr.value & 0xFF) as u32))
}

pub fn make_app_stat4_datagram(cv33: u8) -> Datagram<2> {
    encode_datagram(make_datagram(app::Stat4::ID, cv33 as u32))
}

pub fn make_app_stat1_datagram(d: u8) -> Datagram<2> {
    encode_datagram(make_datagram(app::Stat1::ID, d as u32))
}

pub fn make_app_time_datagram(resolution_seconds: bool, time: u8) -> Datagram<2> {
    let data = ((resolution_seconds as u32) << 7) | time as u32;
    encode_datagram(make_datagram(app::Time::ID, data))
}

pub fn make_app_error_datagram(code: ErrorCode) -> Datagram<2> {
    encode_datagram(make_datagram(app::AppError::ID, code as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidi::datagram::{decode_datagram, is_valid_datagram};

    #[test]
    fn pom_datagram_is_valid_and_round_trips() {
        let dg = make_app_pom_datagram(0x42);
        assert!(is_valid_datagram(&dg));
        let raw = decode_datagram(dg);
        assert_eq!(raw[0], app::Pom::ID);
    }

    #[test]
    fn search_datagram_concatenates_three_sub_datagrams() {
        let dg = make_app_search_datagram(3, 0, 12);
        assert!(is_valid_datagram(&dg));
    }

    #[test]
    fn srq_datagram_encodes_basic_accessory_flag() {
        use crate::address::{Address, AddressType};
        let addr = Address::new(100, AddressType::BasicAccessory);
        let dg = make_app_srq_datagram(addr);
        assert!(is_valid_datagram(&dg));
    }
}

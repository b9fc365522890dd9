//! Address group and address assignment kind (RCN-218 automatic logon).

/// Which address group a `LOGON_SELECT`/`LOGON_ASSIGN` command targets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AddressGroup {
    All = 0b00,
    Loco = 0b01,
    Acc = 0b10,
    Now = 0b11,
}

impl AddressGroup {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => AddressGroup::All,
            0b01 => AddressGroup::Loco,
            0b10 => AddressGroup::Acc,
            _ => AddressGroup::Now,
        }
    }
}

/// Whether a `LOGON_ASSIGN` address assignment is permanent or temporary.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AddressAssign {
    Reserved = 0b00,
    Permanent = 0b10,
    Temporary = 0b11,
}

impl AddressAssign {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b10 => AddressAssign::Permanent,
            0b11 => AddressAssign::Temporary,
            _ => AddressAssign::Reserved,
        }
    }
}

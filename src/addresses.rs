//! Bundle of the addresses a decoder answers to.

use crate::address::Address;

/// The full set of addresses a decoder keeps track of.
///
/// `received` is written by the dispatcher on every accepted packet and read
/// by the BiDi responder to decide what, if anything, to answer in the
/// cut-out that follows.
#[derive(Debug, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Addresses {
    /// Primary address (CV1/CV17+CV18).
    pub primary: Address,
    /// Consist address (CV19), if any.
    pub consist: Address,
    /// Logon-assigned address (RCN-218 automatic logon).
    pub logon: Address,
    /// Address of the most recently accepted packet.
    pub received: Address,
}

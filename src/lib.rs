//! DCC packet codec, transmit pipeline, receive state machine and
//! decoder/BiDi dispatcher for model-railway command stations and
//! decoders.
//!
//! This crate is a passive protocol core: it owns no timer, no track
//! driver and no CV store. The host drives [`tx::Pipeline`] from a
//! capture-compare ISR to produce half-bit toggle times, feeds raw
//! half-bit times into [`rx::frontend::Frontend`] from the same kind of
//! ISR to recover packets, and implements the [`rx::dispatcher::Decoder`]
//! trait to answer CV access and run the BiDi/RailCom responder.
#![no_std]

pub mod address;
pub mod address_group;
pub mod addresses;
pub mod bidi;
pub mod crc8;
pub mod direction;
pub mod error;
pub mod factory;
pub mod instruction;
pub mod manufacturer;
pub mod packet;
pub mod rx;
pub mod speed;
pub mod timing;
pub mod tx;

pub use address::{Address, AddressType};
pub use addresses::Addresses;
pub use error::{Error, Result};
pub use instruction::Instruction;
pub use packet::{Packet, MAX_PACKET_SIZE};

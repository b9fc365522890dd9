//! BiDi/RailCom back-channel: the 4b6b datagram codec, per-app-ID payload
//! types, and the dissector that recovers them from a received channel
//! blob.

pub mod acks;
pub mod app;
pub mod builder;
pub mod channel;
pub mod datagram;
pub mod dissector;

pub use datagram::{decode_datagram, encode_datagram, is_valid_datagram, make_datagram, Bits, Datagram};

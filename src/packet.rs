//! Packet storage, the XOR checksum and the two fixed system packets.

use heapless::Vec;

/// Maximum number of bytes a packet can hold, including the checksum byte.
pub const MAX_PACKET_SIZE: usize = 18;

/// A DCC packet: an ordered, bounded byte sequence whose last byte is the
/// XOR of all the bytes before it.
///
/// Packets never allocate; `MAX_PACKET_SIZE` bounds every packet that can
/// ever be constructed, enqueued or received.
pub type Packet = Vec<u8, MAX_PACKET_SIZE>;

/// Exclusive disjunction over `bytes`.
pub fn exor(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |a, &b| a ^ b)
}

/// Exclusive disjunction over a packet's bytes, excluding its own checksum
/// byte (the last one).
pub fn exor_packet(packet: &[u8]) -> u8 {
    exor(&packet[..packet.len().saturating_sub(1)])
}

/// The idle packet: address `0xFF`, no instruction, checksummed.
pub fn make_idle_packet() -> Packet {
    Packet::from_slice(&[0xFF, 0x00, 0xFF]).unwrap()
}

/// The digital reset packet: broadcast address, no instruction, zero data.
pub fn make_reset_packet() -> Packet {
    Packet::from_slice(&[0x00, 0x00, 0x00]).unwrap()
}

/// Append a packet's checksum byte, computed over the bytes already present.
pub fn finish(packet: &mut Packet) -> crate::Result<()> {
    let checksum = exor(packet);
    packet.push(checksum).map_err(|_| crate::Error::QueueFull)
}

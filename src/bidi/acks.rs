//! BiDi ACK/NAK sentinel bytes.

/// Instruction understood and will be executed.
///
/// Two distinct byte patterns both mean ACK; which one a decoder emits is
/// implementation-defined (RCN-218 never reconciled the two historical
/// variants), so callers dissecting a channel must accept either.
pub const ACKS: [u8; 2] = [0b0000_1111, 0b1111_0000];

/// Instruction received correctly but not supported.
pub const NAK: u8 = 0b0011_1100;

/// Is `byte` one of the two ACK patterns?
pub const fn is_ack(byte: u8) -> bool {
    byte == ACKS[0] || byte == ACKS[1]
}

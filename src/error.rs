//! Error taxonomy shared by the packet factory, transmit pipeline and
//! receive dispatcher.

/// Crate-wide error type.
///
/// Most of the receive path recovers silently from malformed input (a
/// dropped packet is simply not acted on) and never constructs this type;
/// see the module docs of [`crate::rx`] for which paths are silent on
/// purpose. This enum is reserved for the places a caller can and should
/// observe a failure: fallible packet-factory constructors, pipeline
/// enqueue calls and CV access deferred by a busy decoder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An argument was outside the range the wire format can represent.
    #[error("argument out of range")]
    InvalidArgument,
    /// A bounded queue (TX packet queue, BiDi response queue) had no room.
    #[error("queue is full")]
    QueueFull,
    /// The addressed CV is presently locked against access (e.g. service
    /// mode long-form write mid-sequence, or a decoder-specific lock).
    #[error("CV is locked")]
    CvLocked,
    /// The requested operation is recognized but intentionally not
    /// implemented by this decoder.
    #[error("operation not supported")]
    NotSupported,
    /// The decoder could not service the request on this call and the
    /// dispatcher should retry on a later `execute()` rather than block.
    #[error("decoder busy, retry later")]
    DecoderBusy,
}

pub type Result<T> = core::result::Result<T, Error>;

//! Packet recovery, decoder-side CV configuration, and the BiDi/RailCom
//! responder and dispatcher that sit behind it.

pub mod backoff;
pub mod config;
pub mod dispatcher;
pub mod frontend;
pub mod responder;

pub use backoff::{Backoff, LogonBackoff};
pub use config::Config;
pub use dispatcher::{CvReply, Decoder, Dispatcher};
pub use frontend::Frontend;
pub use responder::Responder;

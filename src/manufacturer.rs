//! NMRA manufacturer ID used for CV8 and automatic-logon decoder IDs.

/// NMRA-assigned manufacturer ID, read back from CV8 and embedded in the
/// decoder ID broadcast on automatic logon. A concrete [`crate::rx::dispatcher::Decoder`]
/// implementation overrides this through its own CV8 value; this constant is
/// only the library's compiled-in default for decoders that never change
/// CV8 from its factory value.
pub const DEFAULT_MANUFACTURER_ID: u8 = 13;

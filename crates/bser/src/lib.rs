//! # BSER
//!
//! Binary serialization for the file-watching daemon's control protocol.
//!
//! Every value on the wire is a self-describing tagged encoding of a
//! [`Value`]: null, boolean, 64-bit integer, double, UTF-8 string,
//! array, or string-keyed object. Integers (including all lengths) are
//! written in the smallest signed width that holds them. A dedicated
//! "template" form compacts arrays of objects that share a key set;
//! decoders expand templates back into plain objects.
//!
//! Messages exchanged with the daemon are wrapped in a PDU envelope:
//! two magic bytes, an integer payload length, then one encoded value.

#[macro_use]
mod macros;

pub mod decoder;
pub mod encoder;
pub mod types;
pub mod value;

pub use decoder::Decoder;
pub use decoder::decode;
pub use decoder::decode_pdu;
pub use encoder::Encoder;
pub use encoder::encode;
pub use encoder::encode_pdu;
pub use types::Error;
pub use types::PDU_HEADER;
pub use types::Result;
pub use types::Tag;
pub use value::Value;

#[cfg(test)]
mod tests;

//! Codec module - record encoding for queue payloads.
//!
//! The server treats payloads as opaque bytes; only clients encode and
//! decode records:
//!
//! - [`XmlCodec`] - reference encoding, the `<ITstudent>` document
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`)
//!
//! # Design
//!
//! Codecs are marker structs implementing [`RecordCodec`] with associated
//! functions rather than trait objects, so clients pick a codec at compile
//! time (`ProducerClient::send_record::<XmlCodec>(..)`).
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use bufferd::codec::{RecordCodec, XmlCodec};
//! use bufferd::record::Record;
//!
//! let record = Record::new("Julia Davis", 10000001, "Data Science", BTreeMap::new());
//! let bytes = XmlCodec::encode(&record).unwrap();
//! assert_eq!(XmlCodec::decode(&bytes).unwrap(), record);
//! ```

mod msgpack;
mod xml;

pub use msgpack::MsgPackCodec;
pub use xml::XmlCodec;

use crate::error::Result;
use crate::record::Record;

/// Encode a record to a self-describing payload of known length and back.
pub trait RecordCodec {
    /// Short name used in logs and on the command line.
    const NAME: &'static str;

    /// Encode a record into payload bytes.
    fn encode(record: &Record) -> Result<Vec<u8>>;

    /// Decode payload bytes into a record.
    fn decode(bytes: &[u8]) -> Result<Record>;
}

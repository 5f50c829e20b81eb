//! MsgPack record codec using `rmp-serde`.
//!
//! Always `to_vec_named`, never `to_vec`: named fields keep the payload
//! self-describing, so a decoder does not depend on field order.

use super::RecordCodec;
use crate::error::Result;
use crate::record::Record;

/// MessagePack codec for records.
pub struct MsgPackCodec;

impl RecordCodec for MsgPackCodec {
    const NAME: &'static str = "msgpack";

    #[inline]
    fn encode(record: &Record) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(record)?)
    }

    #[inline]
    fn decode(bytes: &[u8]) -> Result<Record> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

//! # wikidb codec
//!
//! Property values and record encoding for wikidb.
//!
//! Every record the core writes to its journal (documents, lock rows,
//! link rows, table snapshots) is a `serde` type encoded as CBOR through
//! `ciborium`. This crate owns that boundary so the core never touches
//! `ciborium` directly.
//!
//! ## Usage
//!
//! ```
//! use wikidb_codec::{from_cbor, to_cbor, Value};
//!
//! let value = Value::List(vec![Value::from("tag"), Value::Integer(3)]);
//! let bytes = to_cbor(&value).unwrap();
//! let decoded: Value = from_cbor(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod value;

pub use error::{CodecError, CodecResult};
pub use value::Value;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes any serializable record as CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::EncodingFailed`] if serialization fails.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(out)
}

/// Decodes a record from CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::DecodingFailed`] if the bytes are not a valid
/// encoding of `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    if bytes.is_empty() {
        return Err(CodecError::UnexpectedEof);
    }
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

/// Types that can be encoded to CBOR.
pub trait Encode {
    /// Encode this value to CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode a value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl<T: Serialize> Encode for T {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }
}

impl<T: DeserializeOwned> Decode for T {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
        tags: Vec<Value>,
    }

    #[test]
    fn record_roundtrip() {
        let row = Row {
            name: "Main.WebHome".into(),
            tags: vec![Value::from("home"), Value::Bool(true), Value::Float(1.5)],
        };
        let bytes = row.encode().unwrap();
        assert_eq!(Row::decode(&bytes).unwrap(), row);
    }

    #[test]
    fn empty_input_is_eof() {
        assert_eq!(from_cbor::<Value>(&[]), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn garbage_is_rejected() {
        let result = from_cbor::<Row>(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }
}

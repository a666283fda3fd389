use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{SofaError, SofaResult};
use crate::response::MetadataTarget;

// Document bodies use `_id`/`_rev`; write acknowledgements use `id`/`rev`.
const ID_FIELDS: [&str; 2] = ["_id", "id"];
const REV_FIELDS: [&str; 2] = ["_rev", "rev"];
const DELETED_FIELDS: [&str; 2] = ["_deleted", "deleted"];

/// Encode/decode capability shared by every materialization.
///
/// Implementations are stateless and safe to call from concurrent requests.
pub trait Serializer: Send + Sync {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> SofaResult<Vec<u8>>;

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> SofaResult<T>;

    /// Copies recognized document metadata (identity, revision, deletion
    /// marker) from a JSON object onto `target`. Slots the body does not
    /// mention are left untouched.
    fn populate<M: MetadataTarget + ?Sized>(&self, target: &mut M, bytes: &[u8]) -> SofaResult<()>;
}

impl<S: Serializer> Serializer for std::sync::Arc<S> {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> SofaResult<Vec<u8>> {
        (**self).serialize(value)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> SofaResult<T> {
        (**self).deserialize(bytes)
    }

    fn populate<M: MetadataTarget + ?Sized>(&self, target: &mut M, bytes: &[u8]) -> SofaResult<()> {
        (**self).populate(target, bytes)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> SofaResult<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|error| SofaError::Serialization(format!("json encode failed: {error}")))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> SofaResult<T> {
        serde_json::from_slice(bytes)
            .map_err(|error| SofaError::Decode(format!("json decode failed: {error}")))
    }

    fn populate<M: MetadataTarget + ?Sized>(&self, target: &mut M, bytes: &[u8]) -> SofaResult<()> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let value: Value = serde_json::from_slice(bytes)
            .map_err(|error| SofaError::Decode(format!("json decode failed: {error}")))?;
        let Value::Object(object) = value else {
            return Err(SofaError::Decode(
                "expected a json object when reading document metadata".to_string(),
            ));
        };

        if let Some(id) = first_string(&object, &ID_FIELDS) {
            target.set_id(id.to_string());
        }
        if let Some(rev) = first_string(&object, &REV_FIELDS) {
            target.set_rev(rev.to_string());
        }
        if let Some(deleted) = DELETED_FIELDS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_bool))
        {
            target.set_deleted(deleted);
        }
        Ok(())
    }
}

// A user entity may declare its own non-string `id`; only string values count.
fn first_string<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
}

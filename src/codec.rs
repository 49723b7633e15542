use serde_json::Value;

use crate::error::CodecDirection;
use crate::error::Error;
use crate::error::Result;

/// Converts application values to the backend's string representation and back.
///
/// With JSON enabled every value goes through `serde_json`. Without it the backend is expected to store plain strings,
/// so only [`Value::String`] can be written and everything read back is a string.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    json: bool,
}

impl Codec {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn encode(&self, key: &str, value: &Value) -> Result<String> {
        if self.json {
            serde_json::to_string(value).map_err(|err| Error::codec(key, CodecDirection::Encode, err))
        }
        else {
            match value {
                Value::String(s) => Ok(s.clone()),
                other => Err(Error::codec(
                    key,
                    CodecDirection::Encode,
                    format!("JSON is disabled and a {} value is not a string", kind_of(other)),
                )),
            }
        }
    }

    /// A stored JSON `null` decodes to `None`, same as a missing record.
    pub fn decode(&self, key: &str, raw: String) -> Result<Option<Value>> {
        if self.json {
            let value: Value =
                serde_json::from_str(&raw).map_err(|err| Error::codec(key, CodecDirection::Decode, err))?;
            Ok((!value.is_null()).then_some(value))
        }
        else {
            Ok(Some(Value::String(raw)))
        }
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_round_trip() {
        let codec = Codec::new(true);
        let value = json!({"a": 1, "b": [true, null, "x"]});
        let raw = codec.encode("k", &value).unwrap();
        assert_eq!(codec.decode("k", raw).unwrap(), Some(value));
    }

    #[test]
    fn json_null_reads_as_absent() {
        let codec = Codec::new(true);
        assert_eq!(codec.decode("k", "null".into()).unwrap(), None);
    }

    #[test]
    fn malformed_json_is_a_codec_error() {
        let err = Codec::new(true).decode("broken", "{not json".into()).unwrap_err();
        assert!(err.is_codec());
        assert!(err.to_string().contains("'broken'"), "{err}");
        assert!(err.to_string().starts_with("cannot decode"), "{err}");
    }

    #[test]
    fn raw_mode_only_accepts_strings() {
        let codec = Codec::new(false);
        assert_eq!(codec.encode("k", &json!("plain")).unwrap(), "plain");
        assert_eq!(codec.decode("k", "{\"a\":1}".into()).unwrap(), Some(json!("{\"a\":1}")));

        let err = codec.encode("k", &json!({"a": 1})).unwrap_err();
        assert!(err.is_codec());
        assert!(err.to_string().contains("object"), "{err}");
    }
}

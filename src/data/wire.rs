//! Wire-format conversion for the value union
//!
//! The backend exchanges values as JSON objects bearing a `type`
//! discriminator: `IntData`, `FloatData`, `StringData`, `BoolData`,
//! `ListData`, `ImageData`, `SvgData`, or any other tag accompanied by a
//! `"record": true` marker for structured aggregates. Conversion either
//! produces exactly one [`Value`] variant or fails with a
//! [`FlowError::SchemaViolation`] naming the offending discriminator.

use super::value::{DataClass, MediaEncoding, MediaPayload, Metadata, Payload, Value};
use crate::error::FlowError;
use serde_json::{json, Map, Value as Json};

const SCALAR_TAGS: [&str; 4] = ["IntData", "FloatData", "StringData", "BoolData"];
const MEDIA_TAGS: [&str; 2] = ["ImageData", "SvgData"];

/// Classify a wire object without fully parsing it. Unrecognized
/// discriminators classify as `Unknown` rather than failing.
pub fn classify_wire(wire: &Json) -> DataClass {
    let obj = match wire.as_object() {
        Some(obj) => obj,
        None => return DataClass::Unknown,
    };
    let tag = match obj.get("type").and_then(Json::as_str) {
        Some(tag) => tag,
        None => return DataClass::Unknown,
    };
    if SCALAR_TAGS.contains(&tag) {
        DataClass::Scalar
    } else if tag == "ListData" {
        DataClass::List
    } else if MEDIA_TAGS.contains(&tag) {
        DataClass::Media
    } else if obj.get("record").and_then(Json::as_bool) == Some(true) {
        DataClass::Record
    } else {
        DataClass::Unknown
    }
}

/// Validate and coerce a wire object into a [`Value`].
pub fn from_wire(wire: &Json) -> Result<Value, FlowError> {
    let obj = wire
        .as_object()
        .ok_or_else(|| FlowError::schema("<none>", "expected a JSON object"))?;
    let tag = obj
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| FlowError::schema("<missing>", "missing 'type' discriminator"))?;

    let payload = match tag {
        "IntData" => Payload::Int(require_i64(obj, tag)?),
        "FloatData" => Payload::Float(require_f64(obj, tag)?),
        "StringData" => Payload::Text(require_str(obj, tag)?.to_string()),
        "BoolData" => Payload::Bool(
            obj.get("payload")
                .and_then(Json::as_bool)
                .ok_or_else(|| FlowError::schema(tag, "expected a boolean payload"))?,
        ),
        "ListData" => {
            let items = obj
                .get("payload")
                .and_then(Json::as_array)
                .ok_or_else(|| FlowError::schema(tag, "expected an array payload"))?;
            let children = items
                .iter()
                .map(from_wire)
                .collect::<Result<Vec<_>, _>>()?;
            Payload::List(children.into_iter().map(std::sync::Arc::new).collect())
        }
        "ImageData" | "SvgData" => Payload::Media(media_from_wire(obj, tag)?),
        other => {
            if obj.get("record").and_then(Json::as_bool) == Some(true) {
                let entries = obj
                    .get("payload")
                    .and_then(Json::as_object)
                    .ok_or_else(|| FlowError::schema(other, "expected an object payload"))?;
                let mut children = Vec::with_capacity(entries.len());
                for (name, child) in entries {
                    children.push((name.clone(), std::sync::Arc::new(from_wire(child)?)));
                }
                Payload::Record {
                    kind: other.to_string(),
                    entries: children,
                }
            } else {
                return Err(FlowError::schema(
                    other,
                    "unrecognized discriminator without record marker",
                ));
            }
        }
    };

    let mut value = Value::new(payload);
    if let Some(id) = obj.get("id").and_then(Json::as_str) {
        value.id = id.to_string();
    }
    if let Some(meta) = obj.get("metadata").and_then(Json::as_object) {
        value.metadata = meta
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Metadata>();
    }
    Ok(value)
}

/// Serialize a value back into its wire object.
pub fn to_wire(value: &Value) -> Json {
    let mut obj = Map::new();
    match &value.payload {
        Payload::Int(v) => {
            obj.insert("type".into(), json!("IntData"));
            obj.insert("payload".into(), json!(v));
        }
        Payload::Float(v) => {
            obj.insert("type".into(), json!("FloatData"));
            obj.insert("payload".into(), json!(v));
        }
        Payload::Text(v) => {
            obj.insert("type".into(), json!("StringData"));
            obj.insert("payload".into(), json!(v));
        }
        Payload::Bool(v) => {
            obj.insert("type".into(), json!("BoolData"));
            obj.insert("payload".into(), json!(v));
        }
        Payload::List(items) => {
            obj.insert("type".into(), json!("ListData"));
            obj.insert(
                "payload".into(),
                Json::Array(items.iter().map(|v| to_wire(v)).collect()),
            );
        }
        Payload::Record { kind, entries } => {
            obj.insert("type".into(), json!(kind));
            obj.insert("record".into(), json!(true));
            let mut payload = Map::new();
            for (name, child) in entries {
                payload.insert(name.clone(), to_wire(child));
            }
            obj.insert("payload".into(), Json::Object(payload));
        }
        Payload::Media(media) => {
            let tag = if media.encoding == MediaEncoding::Svg {
                "SvgData"
            } else {
                "ImageData"
            };
            obj.insert("type".into(), json!(tag));
            obj.insert(
                "payload".into(),
                media.data.as_ref().map_or(Json::Null, |d| json!(d)),
            );
            if let Some(preview) = &media.preview {
                obj.insert("preview".into(), json!(preview));
            }
            if let Some(width) = media.width {
                obj.insert("width".into(), json!(width));
            }
            if let Some(height) = media.height {
                obj.insert("height".into(), json!(height));
            }
            obj.insert("encoding".into(), json!(media.encoding.as_str()));
            obj.insert("cached".into(), json!(media.cached));
            if let Some(filename) = &media.filename {
                obj.insert("filename".into(), json!(filename));
            }
        }
    }
    obj.insert("id".into(), json!(value.id));
    if !value.metadata.is_empty() {
        let meta: Map<String, Json> = value
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        obj.insert("metadata".into(), Json::Object(meta));
    }
    Json::Object(obj)
}

fn media_from_wire(obj: &Map<String, Json>, tag: &str) -> Result<MediaPayload, FlowError> {
    let data = match obj.get("payload") {
        None | Some(Json::Null) => None,
        Some(Json::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(FlowError::schema(tag, "expected a string or null payload"));
        }
    };
    let encoding = obj
        .get("encoding")
        .and_then(Json::as_str)
        .map(MediaEncoding::from_str)
        .unwrap_or(if tag == "SvgData" {
            MediaEncoding::Svg
        } else {
            MediaEncoding::Png
        });
    Ok(MediaPayload {
        encoding,
        data,
        preview: obj.get("preview").and_then(Json::as_str).map(String::from),
        width: obj.get("width").and_then(Json::as_u64).map(|v| v as u32),
        height: obj.get("height").and_then(Json::as_u64).map(|v| v as u32),
        cached: obj.get("cached").and_then(Json::as_bool).unwrap_or(false),
        filename: obj
            .get("filename")
            .and_then(Json::as_str)
            .map(String::from),
    })
}

fn require_i64(obj: &Map<String, Json>, tag: &str) -> Result<i64, FlowError> {
    obj.get("payload")
        .and_then(Json::as_i64)
        .ok_or_else(|| FlowError::schema(tag, "expected an integer payload"))
}

fn require_f64(obj: &Map<String, Json>, tag: &str) -> Result<f64, FlowError> {
    obj.get("payload")
        .and_then(Json::as_f64)
        .ok_or_else(|| FlowError::schema(tag, "expected a numeric payload"))
}

fn require_str<'a>(obj: &'a Map<String, Json>, tag: &str) -> Result<&'a str, FlowError> {
    obj.get("payload")
        .and_then(Json::as_str)
        .ok_or_else(|| FlowError::schema(tag, "expected a string payload"))
}

// Serde passes through the wire shape so derived containers round-trip.
impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        to_wire(self).serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = Json::deserialize(deserializer)?;
        from_wire(&wire).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: &Value) -> Value {
        from_wire(&to_wire(value)).expect("round-trip parse")
    }

    #[test]
    fn roundtrip_preserves_classification() {
        let nested = Value::record(
            "UnitsData",
            vec![
                ("value".to_string(), Value::float(2.5)),
                ("unit".to_string(), Value::text("mm")),
            ],
        );
        let values = vec![
            Value::int(4),
            Value::float(4.5),
            Value::text("hello"),
            Value::boolean(false),
            Value::list(vec![Value::int(1), Value::text("x")]),
            nested,
            Value::media(MediaPayload {
                encoding: MediaEncoding::Png,
                data: Some("aGVsbG8=".to_string()),
                preview: Some("cHJldg==".to_string()),
                width: Some(64),
                height: Some(48),
                cached: true,
                filename: Some("photo.png".to_string()),
            }),
        ];
        for v in &values {
            let back = roundtrip(v);
            assert_eq!(back.classify(), v.classify());
            assert!(back.same_payload(v), "{:?}", v.payload);
            assert_eq!(back.id, v.id);
        }
    }

    #[test]
    fn record_preserves_entry_order() {
        let v = Value::record(
            "ZetaData",
            vec![
                ("zulu".to_string(), Value::int(1)),
                ("alpha".to_string(), Value::int(2)),
            ],
        );
        match roundtrip(&v).payload {
            Payload::Record { entries, .. } => {
                assert_eq!(entries[0].0, "zulu");
                assert_eq!(entries[1].0, "alpha");
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn unknown_discriminator_classifies_but_fails_parse() {
        let wire = json!({"type": "MysteryData", "payload": 1});
        assert_eq!(classify_wire(&wire), DataClass::Unknown);
        let err = from_wire(&wire).unwrap_err();
        match err {
            FlowError::SchemaViolation { discriminator, .. } => {
                assert_eq!(discriminator, "MysteryData");
            }
            other => panic!("expected schema violation, got {other}"),
        }
    }

    #[test]
    fn record_marker_allows_custom_kinds() {
        let wire = json!({
            "type": "OpticalFlowData",
            "record": true,
            "payload": {"strength": {"type": "FloatData", "payload": 0.5}}
        });
        assert_eq!(classify_wire(&wire), DataClass::Record);
        let v = from_wire(&wire).unwrap();
        assert!(v.is_record());
        assert!(v.child("strength").is_some());
    }

    #[test]
    fn metadata_round_trips() {
        let mut v = Value::int(4);
        v.set_expanded(true);
        v.metadata.insert("min".to_string(), json!(0.0));
        let back = roundtrip(&v);
        assert!(back.expanded());
        assert_eq!(back.metadata_f64("min", -1.0), 0.0);
    }

    #[test]
    fn malformed_scalar_payload_is_schema_violation() {
        let wire = json!({"type": "IntData", "payload": "not a number"});
        assert!(from_wire(&wire).is_err());
    }
}

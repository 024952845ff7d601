//! Core value union and classification predicates

use std::collections::BTreeMap;
use std::sync::Arc;

/// Identity token for a value. Regenerated whenever the payload changes:
/// this is a change-token, not a stable handle.
pub type ValueId = String;

/// Open key-value bag attached to every value. Recognized keys include
/// `expanded` (UI collapse state) and `min`/`max`/`display_format` for
/// numeric fields, but any key round-trips through the wire format.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// The content of a value, one variant per data family.
///
/// List and record children sit behind `Arc` so a copy-on-write spine
/// update can reuse untouched siblings by reference.
#[derive(Debug, Clone)]
pub enum Payload {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    List(Vec<Arc<Value>>),
    Record {
        /// Concrete record kind, e.g. "UnitsData"
        kind: String,
        /// Named children in template order
        entries: Vec<(String, Arc<Value>)>,
    },
    Media(MediaPayload),
}

// Structural equality: container children compare by payload alone,
// ignoring their identity tokens and metadata bags.
impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Int(a), Payload::Int(b)) => a == b,
            (Payload::Float(a), Payload::Float(b)) => a == b,
            (Payload::Text(a), Payload::Text(b)) => a == b,
            (Payload::Bool(a), Payload::Bool(b)) => a == b,
            (Payload::List(a), Payload::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_payload(y))
            }
            (
                Payload::Record {
                    kind: ka,
                    entries: ea,
                },
                Payload::Record {
                    kind: kb,
                    entries: eb,
                },
            ) => {
                ka == kb
                    && ea.len() == eb.len()
                    && ea
                        .iter()
                        .zip(eb.iter())
                        .all(|((na, va), (nb, vb))| na == nb && va.same_payload(vb))
            }
            (Payload::Media(a), Payload::Media(b)) => a == b,
            _ => false,
        }
    }
}

/// Media payload: image or vector graphic, possibly externalized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaPayload {
    pub encoding: MediaEncoding,
    /// Primary payload (base64 or textual). None when `cached` and only a
    /// server-side reference is resident client-side.
    pub data: Option<String>,
    /// Optional lower-resolution preview
    pub preview: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Payload bytes live server-side; only id + preview are local
    pub cached: bool,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum MediaEncoding {
    #[default]
    Png,
    Jpeg,
    Svg,
    Other(String),
}

impl MediaEncoding {
    pub fn as_str(&self) -> &str {
        match self {
            MediaEncoding::Png => "png",
            MediaEncoding::Jpeg => "jpeg",
            MediaEncoding::Svg => "svg",
            MediaEncoding::Other(s) => s,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "png" => MediaEncoding::Png,
            "jpeg" | "jpg" => MediaEncoding::Jpeg,
            "svg" => MediaEncoding::Svg,
            other => MediaEncoding::Other(other.to_string()),
        }
    }
}

/// Classification of a value or wire discriminator. Total and mutually
/// exclusive: exactly one class holds for any valid value, and an
/// unrecognized discriminator is `Unknown`, never a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataClass {
    Scalar,
    List,
    Record,
    Media,
    Unknown,
}

/// A field's content: payload plus identity token and metadata bag.
#[derive(Debug, Clone)]
pub struct Value {
    pub id: ValueId,
    pub metadata: Metadata,
    pub payload: Payload,
}

impl Value {
    /// Build a value with a fresh identity token.
    pub fn new(payload: Payload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: Metadata::new(),
            payload,
        }
    }

    pub fn int(v: i64) -> Self {
        Self::new(Payload::Int(v))
    }

    pub fn float(v: f64) -> Self {
        Self::new(Payload::Float(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        Self::new(Payload::Text(v.into()))
    }

    pub fn boolean(v: bool) -> Self {
        Self::new(Payload::Bool(v))
    }

    pub fn list(children: Vec<Value>) -> Self {
        Self::new(Payload::List(children.into_iter().map(Arc::new).collect()))
    }

    pub fn record(kind: impl Into<String>, entries: Vec<(String, Value)>) -> Self {
        Self::new(Payload::Record {
            kind: kind.into(),
            entries: entries
                .into_iter()
                .map(|(k, v)| (k, Arc::new(v)))
                .collect(),
        })
    }

    pub fn media(media: MediaPayload) -> Self {
        Self::new(Payload::Media(media))
    }

    /// Empty kind-less record, used when the store materializes a missing
    /// path parent.
    pub fn empty_record() -> Self {
        Self::new(Payload::Record {
            kind: String::new(),
            entries: Vec::new(),
        })
    }

    /// Numeric constructor: the variant is derived from the fractional
    /// part, so `4.0` becomes `Int(4)` and `4.5` becomes `Float(4.5)`.
    pub fn number(v: f64) -> Self {
        if v.fract() == 0.0 {
            Self::int(v as i64)
        } else {
            Self::float(v)
        }
    }

    /// Replace the payload, keeping metadata but regenerating the identity
    /// token (the payload changed).
    pub fn with_payload(&self, payload: Payload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: self.metadata.clone(),
            payload,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn classify(&self) -> DataClass {
        match self.payload {
            Payload::Int(_) | Payload::Float(_) | Payload::Text(_) | Payload::Bool(_) => {
                DataClass::Scalar
            }
            Payload::List(_) => DataClass::List,
            Payload::Record { .. } => DataClass::Record,
            Payload::Media(_) => DataClass::Media,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.classify() == DataClass::Scalar
    }

    pub fn is_list(&self) -> bool {
        self.classify() == DataClass::List
    }

    pub fn is_record(&self) -> bool {
        self.classify() == DataClass::Record
    }

    pub fn is_media(&self) -> bool {
        self.classify() == DataClass::Media
    }

    /// Structural payload comparison, ignoring identity and metadata.
    pub fn same_payload(&self, other: &Value) -> bool {
        self.payload == other.payload
    }

    /// Numeric payload as f64, if this is a numeric scalar.
    pub fn as_number(&self) -> Option<f64> {
        match self.payload {
            Payload::Int(v) => Some(v as f64),
            Payload::Float(v) => Some(v),
            _ => None,
        }
    }

    /// UI collapse state stored in the metadata bag. Defaults to false.
    pub fn expanded(&self) -> bool {
        self.metadata
            .get("expanded")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Set the collapse state without touching the identity token:
    /// metadata is not payload.
    pub fn set_expanded(&mut self, expanded: bool) {
        self.metadata
            .insert("expanded".to_string(), serde_json::Value::Bool(expanded));
    }

    /// Numeric display hint read from metadata, with a fallback.
    pub fn metadata_f64(&self, key: &str, fallback: f64) -> f64 {
        self.metadata
            .get(key)
            .and_then(|v| v.as_f64())
            .unwrap_or(fallback)
    }

    /// Record child by name.
    pub fn child(&self, name: &str) -> Option<&Arc<Value>> {
        match &self.payload {
            Payload::Record { entries, .. } => {
                entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// List child by index.
    pub fn item(&self, index: usize) -> Option<&Arc<Value>> {
        match &self.payload {
            Payload::List(items) => items.get(index),
            _ => None,
        }
    }
}

//! Node, field, and status types

use crate::data::{Metadata, Value};
use egui::Pos2;
use serde::{Deserialize, Serialize};

/// Unique identifier for a node
pub type NodeId = String;

/// Declared data kind of a field, drawn from the backend vocabulary.
/// Unrecognized kinds deserialize as `Any` rather than failing the
/// surrounding document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Number,
    Text,
    Boolean,
    Image,
    Units,
    List,
    Record,
    Any,
}

impl DataKind {
    /// Whether an unconnected input of this kind accepts direct edits.
    /// Units and untyped slots are connection-fed only.
    pub fn directly_editable(&self) -> bool {
        !matches!(self, DataKind::Units | DataKind::Any)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Number => "number",
            DataKind::Text => "string",
            DataKind::Boolean => "boolean",
            DataKind::Image => "image",
            DataKind::Units => "units",
            DataKind::List => "list",
            DataKind::Record => "record",
            DataKind::Any => "any",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "number" => DataKind::Number,
            "string" => DataKind::Text,
            "boolean" => DataKind::Boolean,
            "image" => DataKind::Image,
            "units" => DataKind::Units,
            "list" => DataKind::List,
            "record" => DataKind::Record,
            _ => DataKind::Any,
        }
    }
}

impl Serialize for DataKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(DataKind::parse(&s))
    }
}

/// Execution status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    NotEvaluated,
    Pending,
    Executing,
    Streaming,
    Evaluated,
    Error,
}

/// An input or output slot on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// Programmatic label, stable across re-renders (handle ids derive
    /// from it)
    pub label: String,
    /// User-facing label
    pub user_label: String,
    pub dtype: DataKind,
    pub value: Option<Value>,
    /// True for outputs and for inputs whose dtype forbids direct editing
    pub disabled: bool,
    /// Derived from the edge set; never authoritative on its own
    #[serde(default)]
    pub is_edge_connected: bool,
    /// Expand state on the canvas node
    #[serde(default)]
    pub node_expanded: bool,
    /// Expand state in the side inspector, independent of the node's
    #[serde(default)]
    pub inspector_expanded: bool,
    /// Field-level display hints, distinct from the nested value's bag
    #[serde(default)]
    pub metadata: Metadata,
}

impl Field {
    pub fn input(label: impl Into<String>, dtype: DataKind) -> Self {
        let label = label.into();
        Self {
            user_label: label.clone(),
            label,
            dtype,
            value: None,
            disabled: !dtype.directly_editable(),
            is_edge_connected: false,
            node_expanded: false,
            inspector_expanded: false,
            metadata: Metadata::new(),
        }
    }

    pub fn output(label: impl Into<String>, dtype: DataKind) -> Self {
        let mut field = Self::input(label, dtype);
        field.disabled = true;
        field
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Whether the user may edit this field right now: outputs never,
    /// inputs only while no edge feeds them and the dtype allows it.
    pub fn editable(&self) -> bool {
        !self.disabled && !self.is_edge_connected
    }
}

/// Payload of a node: everything the backend knows about it plus the
/// field lists shown in the editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub display_name: String,
    pub class_name: String,
    pub namespace: String,
    #[serde(default)]
    pub status: NodeStatus,
    pub inputs: Vec<Field>,
    pub outputs: Vec<Field>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub terminal_output: String,
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub source_ref: Option<String>,
}

impl NodeData {
    /// Copy UI-only state (field expand flags and nested
    /// `metadata.expanded`) from a previous incarnation of this node.
    /// Inbound execution updates replace `data` wholesale and know
    /// nothing about client UI state.
    pub fn adopt_ui_state(&mut self, previous: &NodeData) {
        adopt_fields(&mut self.inputs, &previous.inputs);
        adopt_fields(&mut self.outputs, &previous.outputs);
    }
}

fn adopt_fields(fields: &mut [Field], previous: &[Field]) {
    for field in fields.iter_mut() {
        if let Some(old) = previous.iter().find(|f| f.label == field.label) {
            field.node_expanded = old.node_expanded;
            field.inspector_expanded = old.inspector_expanded;
            if let (Some(value), Some(old_value)) = (field.value.as_mut(), old.value.as_ref()) {
                adopt_expanded(value, old_value);
            }
        }
    }
}

/// Recursively re-attach `expanded` metadata by matching structure.
fn adopt_expanded(value: &mut Value, old: &Value) {
    if old.expanded() {
        value.set_expanded(true);
    }
    use crate::data::Payload;
    match (&mut value.payload, &old.payload) {
        (Payload::List(items), Payload::List(old_items)) => {
            for (item, old_item) in items.iter_mut().zip(old_items.iter()) {
                let mut child = (**item).clone();
                adopt_expanded(&mut child, old_item);
                *item = std::sync::Arc::new(child);
            }
        }
        (Payload::Record { entries, .. }, Payload::Record { entries: old_entries, .. }) => {
            for (name, child) in entries.iter_mut() {
                if let Some((_, old_child)) = old_entries.iter().find(|(n, _)| n == name) {
                    let mut copy = (**child).clone();
                    adopt_expanded(&mut copy, old_child);
                    *child = std::sync::Arc::new(copy);
                }
            }
        }
        _ => {}
    }
}

/// A node on the canvas: identity, position, and backend payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: NodeId,
    #[serde(with = "pos2_serde")]
    pub position: Pos2,
    pub data: NodeData,
}

impl FlowNode {
    pub fn new(position: Pos2, data: NodeData) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            position,
            data,
        }
    }

    pub fn input(&self, label: &str) -> Option<&Field> {
        self.data.inputs.iter().find(|f| f.label == label)
    }

    pub fn input_mut(&mut self, label: &str) -> Option<&mut Field> {
        self.data.inputs.iter_mut().find(|f| f.label == label)
    }

    pub fn output(&self, label: &str) -> Option<&Field> {
        self.data.outputs.iter().find(|f| f.label == label)
    }

    /// Field lookup across inputs then outputs, the order paths resolve in.
    pub fn field(&self, label: &str) -> Option<&Field> {
        self.input(label).or_else(|| self.output(label))
    }

    pub fn field_mut(&mut self, label: &str) -> Option<&mut Field> {
        if self.data.inputs.iter().any(|f| f.label == label) {
            self.input_mut(label)
        } else {
            self.data.outputs.iter_mut().find(|f| f.label == label)
        }
    }
}

// Serde helper module for egui positions
mod pos2_serde {
    use egui::Pos2;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(pos: &Pos2, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        [pos.x, pos.y].serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Pos2, D::Error>
    where
        D: Deserializer<'de>,
    {
        let [x, y] = <[f32; 2]>::deserialize(deserializer)?;
        Ok(Pos2::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> NodeData {
        NodeData {
            display_name: "Blur".to_string(),
            class_name: "Blur".to_string(),
            namespace: "filters".to_string(),
            status: NodeStatus::NotEvaluated,
            inputs: vec![
                Field::input("image", DataKind::Image),
                Field::input("radius", DataKind::Number).with_value(Value::float(1.5)),
            ],
            outputs: vec![Field::output("result", DataKind::Image)],
            streaming: false,
            terminal_output: String::new(),
            progress: 0.0,
            source_ref: None,
        }
    }

    #[test]
    fn outputs_are_never_editable() {
        let node = FlowNode::new(Pos2::ZERO, sample_data());
        assert!(!node.output("result").unwrap().editable());
        assert!(node.input("radius").unwrap().editable());
    }

    #[test]
    fn units_inputs_are_disabled() {
        let field = Field::input("scale", DataKind::Units);
        assert!(!field.editable());
    }

    #[test]
    fn adopt_ui_state_restores_expand_flags() {
        let mut old = sample_data();
        old.inputs[1].node_expanded = true;
        if let Some(v) = old.inputs[1].value.as_mut() {
            v.set_expanded(true);
        }

        let mut fresh = sample_data();
        fresh.adopt_ui_state(&old);
        assert!(fresh.inputs[1].node_expanded);
        assert!(fresh.inputs[1].value.as_ref().unwrap().expanded());
        assert!(!fresh.inputs[0].node_expanded);
    }

    #[test]
    fn node_serde_round_trip() {
        let node = FlowNode::new(Pos2::new(10.0, 20.0), sample_data());
        let json = serde_json::to_string(&node).unwrap();
        let back: FlowNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, node.id);
        assert_eq!(back.position, node.position);
        assert_eq!(back.data.inputs.len(), 2);
        assert!(back.data.inputs[1]
            .value
            .as_ref()
            .unwrap()
            .same_payload(node.data.inputs[1].value.as_ref().unwrap()));
    }
}

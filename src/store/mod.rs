//! Path-addressed store
//!
//! One process-wide table of nodes and edges. Arbitrary nested locations
//! inside a node's field data are read and written through [`Path`]
//! addresses with copy-on-write semantics: only the spine from the field
//! root to the target is cloned, sibling subtrees are reused by `Arc`
//! reference, which is what downstream change-detection keys off.
//!
//! All mutation happens on the UI thread; I/O callbacks interleave with
//! user edits but each write reads the latest snapshot and publishes a
//! whole new spine, so a concurrent read observes either the pre- or the
//! post-update tree, never a torn one.

pub mod binding;

use crate::data::{Payload, Value};
use crate::error::FlowError;
use crate::graph::{
    DataKind, EdgeChange, Field, FlowGraph, NodeChange, Path, PathSegment,
};
use std::sync::Arc;

/// What a path write does at its target.
enum WriteOp {
    /// Replace the value (fresh identity for the target and the spine)
    Replace(Value),
    /// Set one metadata key, preserving the target's identity
    Metadata(String, serde_json::Value),
}

/// Explicit injected state container for the whole editor.
#[derive(Debug, Default)]
pub struct FlowStore {
    pub graph: FlowGraph,
}

impl FlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(graph: FlowGraph) -> Self {
        Self { graph }
    }

    /// Resolve a path to the value it addresses.
    pub fn get(&self, path: &Path) -> Option<&Value> {
        let node = self.graph.nodes.get(&path.node)?;
        let label = path.field_label()?;
        let field = node.field(label)?;
        let mut current = field.value.as_ref()?;
        for seg in &path.segments[1..] {
            current = match seg {
                PathSegment::Field(name) => current.child(name)?.as_ref(),
                PathSegment::Index(i) => current.item(*i)?.as_ref(),
            };
        }
        Some(current)
    }

    /// Replace the value at a path. Missing parents are materialized as
    /// empty containers with a warning; an unresolvable node id is a
    /// logged no-op.
    pub fn set(&mut self, path: &Path, value: Value) -> Result<(), FlowError> {
        self.write(path, WriteOp::Replace(value))
    }

    /// Set one metadata key on the value at a path without changing its
    /// payload or identity.
    pub fn set_metadata(
        &mut self,
        path: &Path,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), FlowError> {
        self.write(path, WriteOp::Metadata(key.into(), value))
    }

    /// Flip the `expanded` metadata flag at a path. Idempotent in pairs
    /// and payload-preserving.
    pub fn toggle_expanded(&mut self, path: &Path) -> Result<(), FlowError> {
        let current = self.get(path).map(|v| v.expanded()).unwrap_or(false);
        self.set_metadata(path, "expanded", serde_json::Value::Bool(!current))
    }

    /// Install a server-provided value descriptor at a path, re-attaching
    /// the previously-held `expanded` flag. Server responses know nothing
    /// about client UI state and must not clobber it.
    pub fn adopt_descriptor(&mut self, path: &Path, mut value: Value) -> Result<(), FlowError> {
        if self.get(path).map(|v| v.expanded()).unwrap_or(false) {
            value.set_expanded(true);
        }
        self.set(path, value)
    }

    fn write(&mut self, path: &Path, op: WriteOp) -> Result<(), FlowError> {
        let Some(node) = self.graph.nodes.get_mut(&path.node) else {
            // Unresolvable node ids are skipped, not fatal
            log::error!("store write to unknown node '{}' skipped", path.node);
            return Ok(());
        };
        let Some(label) = path.field_label() else {
            return Err(FlowError::PathNotFound {
                path: path.to_string(),
            });
        };
        let label = label.to_string();
        if node.field(&label).is_none() {
            // Missing labels always materialize as Any-typed inputs. Output
            // slots are declared by the node's descriptor and filled from
            // execution results addressed at existing labels, so they are
            // never created lazily here.
            log::warn!(
                "store write materialized missing field '{}' on node '{}'",
                label,
                path.node
            );
            node.data.inputs.push(Field::input(label.clone(), DataKind::Any));
        }
        let Some(field) = node.field_mut(&label) else {
            return Err(FlowError::PathNotFound {
                path: path.to_string(),
            });
        };

        let mut materialized = false;
        let new_value = apply_op(
            field.value.as_ref(),
            &path.segments[1..],
            &op,
            &mut materialized,
        );
        if materialized {
            log::warn!("store write materialized missing parents under '{path}'");
        }
        field.value = Some(new_value);
        Ok(())
    }

    /// Reducer for canvas node events.
    pub fn apply_node_change(&mut self, change: NodeChange) {
        match change {
            NodeChange::Added(node) => {
                log::debug!("node '{}' ({}) added", node.id, node.data.class_name);
                self.graph.add_node(node);
                binding::sync_connectivity(&mut self.graph);
            }
            NodeChange::Removed(id) => {
                if self.graph.remove_node(&id).is_some() {
                    log::debug!("node '{id}' removed");
                    binding::sync_connectivity(&mut self.graph);
                }
            }
            NodeChange::Moved { id, position } => {
                if let Some(node) = self.graph.nodes.get_mut(&id) {
                    node.position = position;
                }
            }
        }
    }

    /// Reducer for canvas edge events. Every edge-set mutation re-derives
    /// field connectivity.
    pub fn apply_edge_change(&mut self, change: EdgeChange) {
        match change {
            EdgeChange::Added(edge) => match self.graph.add_edge(edge) {
                Ok(()) => binding::sync_connectivity(&mut self.graph),
                Err(reason) => log::warn!("edge rejected: {reason}"),
            },
            EdgeChange::Removed(id) => {
                if self.graph.remove_edge(&id).is_some() {
                    binding::sync_connectivity(&mut self.graph);
                }
            }
        }
    }
}

/// Rebuild the spine from `current` down the remaining segments, applying
/// `op` at the target. Untouched siblings keep their `Arc`s.
fn apply_op(
    current: Option<&Value>,
    segments: &[PathSegment],
    op: &WriteOp,
    materialized: &mut bool,
) -> Value {
    if segments.is_empty() {
        return match op {
            WriteOp::Replace(value) => value.clone(),
            WriteOp::Metadata(key, json) => match current {
                Some(value) => {
                    let mut updated = value.clone();
                    updated.metadata.insert(key.clone(), json.clone());
                    updated
                }
                None => {
                    *materialized = true;
                    let mut value = Value::empty_record();
                    value.metadata.insert(key.clone(), json.clone());
                    value
                }
            },
        };
    }

    match &segments[0] {
        PathSegment::Field(name) => {
            let (kind, mut entries, metadata) = match current {
                Some(Value {
                    payload: Payload::Record { kind, entries },
                    metadata,
                    ..
                }) => (kind.clone(), entries.clone(), metadata.clone()),
                _ => {
                    *materialized = true;
                    (String::new(), Vec::new(), Default::default())
                }
            };
            let child = entries
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_ref());
            if child.is_none() {
                *materialized = true;
            }
            let new_child = apply_op(child, &segments[1..], op, materialized);
            match entries.iter_mut().find(|(n, _)| n == name) {
                Some((_, slot)) => *slot = Arc::new(new_child),
                None => entries.push((name.clone(), Arc::new(new_child))),
            }
            Value::new(Payload::Record { kind, entries }).with_metadata(metadata)
        }
        PathSegment::Index(i) => {
            let (mut items, metadata) = match current {
                Some(Value {
                    payload: Payload::List(items),
                    metadata,
                    ..
                }) => (items.clone(), metadata.clone()),
                _ => {
                    *materialized = true;
                    (Vec::new(), Default::default())
                }
            };
            while items.len() <= *i {
                *materialized = true;
                items.push(Arc::new(Value::empty_record()));
            }
            let new_child = apply_op(Some(items[*i].as_ref()), &segments[1..], op, materialized);
            items[*i] = Arc::new(new_child);
            Value::new(Payload::List(items)).with_metadata(metadata)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FlowNode, NodeData, NodeStatus};
    use egui::Pos2;

    fn store_with_node(fields: Vec<Field>) -> (FlowStore, String) {
        let node = FlowNode::new(
            Pos2::ZERO,
            NodeData {
                display_name: "Test".to_string(),
                class_name: "Test".to_string(),
                namespace: "test".to_string(),
                status: NodeStatus::NotEvaluated,
                inputs: fields,
                outputs: vec![],
                streaming: false,
                terminal_output: String::new(),
                progress: 0.0,
                source_ref: None,
            },
        );
        let id = node.id.clone();
        let mut store = FlowStore::new();
        store.graph.add_node(node);
        (store, id)
    }

    fn record_field() -> Field {
        Field::input("settings", DataKind::Record).with_value(Value::record(
            "FilterSettings",
            vec![
                ("radius".to_string(), Value::float(1.5)),
                (
                    "taps".to_string(),
                    Value::list(vec![Value::int(1), Value::int(2)]),
                ),
            ],
        ))
    }

    #[test]
    fn set_then_get_round_trips() {
        let (mut store, id) = store_with_node(vec![record_field()]);
        let path = Path::field(id, "settings").key("radius");
        store.set(&path, Value::float(3.0)).unwrap();
        let value = store.get(&path).unwrap();
        assert!(value.same_payload(&Value::float(3.0)));
    }

    #[test]
    fn copy_on_write_reuses_siblings_by_reference() {
        let (mut store, id) = store_with_node(vec![record_field()]);
        let root = Path::field(id.clone(), "settings");
        let before = store.get(&root).unwrap();
        let sibling_before = before.child("taps").unwrap().clone();

        store.set(&root.key("radius"), Value::float(9.0)).unwrap();

        let after = store.get(&root).unwrap();
        let sibling_after = after.child("taps").unwrap();
        assert!(Arc::ptr_eq(&sibling_before, sibling_after));
        assert!(after
            .child("radius")
            .unwrap()
            .same_payload(&Value::float(9.0)));
    }

    #[test]
    fn spine_gets_fresh_identity_siblings_keep_theirs() {
        let (mut store, id) = store_with_node(vec![record_field()]);
        let root = Path::field(id.clone(), "settings");
        let root_id_before = store.get(&root).unwrap().id.clone();

        store.set(&root.key("radius"), Value::float(9.0)).unwrap();
        assert_ne!(store.get(&root).unwrap().id, root_id_before);
    }

    #[test]
    fn missing_parents_are_materialized() {
        let (mut store, id) = store_with_node(vec![record_field()]);
        let path = Path::field(id, "settings").key("extras").index(1).key("gain");
        store.set(&path, Value::float(0.5)).unwrap();
        let value = store.get(&path).unwrap();
        assert!(value.same_payload(&Value::float(0.5)));
    }

    #[test]
    fn missing_field_materializes_as_input_never_output() {
        let (mut store, id) = store_with_node(vec![record_field()]);
        let path = Path::field(id.clone(), "gain");
        store.set(&path, Value::float(0.5)).unwrap();

        let node = store.graph.nodes.get(&id).unwrap();
        assert!(node.data.inputs.iter().any(|f| f.label == "gain"));
        assert!(node.data.outputs.is_empty());
    }

    #[test]
    fn unknown_node_is_a_noop() {
        let (mut store, _) = store_with_node(vec![record_field()]);
        let path = Path::field("no-such-node", "settings");
        assert!(store.set(&path, Value::int(1)).is_ok());
    }

    #[test]
    fn toggle_expanded_twice_restores_state_and_payload() {
        let (mut store, id) = store_with_node(vec![record_field()]);
        let path = Path::field(id, "settings").key("taps");
        let id_before = store.get(&path).unwrap().id.clone();
        let payload_before = store.get(&path).unwrap().payload.clone();

        store.toggle_expanded(&path).unwrap();
        assert!(store.get(&path).unwrap().expanded());
        store.toggle_expanded(&path).unwrap();

        let after = store.get(&path).unwrap();
        assert!(!after.expanded());
        assert_eq!(after.payload, payload_before);
        // metadata-only writes keep the target's identity token
        assert_eq!(after.id, id_before);
    }

    #[test]
    fn adopt_descriptor_keeps_the_expanded_flag() {
        use crate::data::{MediaEncoding, MediaPayload};
        let mut expanded_media = Value::media(MediaPayload {
            encoding: MediaEncoding::Png,
            filename: Some("old.png".to_string()),
            ..MediaPayload::default()
        });
        expanded_media.set_expanded(true);
        let (mut store, id) =
            store_with_node(vec![
                Field::input("image", DataKind::Image).with_value(expanded_media)
            ]);
        let path = Path::field(id, "image");

        // fresh server descriptor, no client UI state on it
        let descriptor = Value::media(MediaPayload {
            encoding: MediaEncoding::Png,
            filename: Some("new.png".to_string()),
            cached: true,
            ..MediaPayload::default()
        });
        store.adopt_descriptor(&path, descriptor).unwrap();

        let after = store.get(&path).unwrap();
        assert!(after.expanded());
        match &after.payload {
            Payload::Media(media) => {
                assert_eq!(media.filename.as_deref(), Some("new.png"));
                assert!(media.cached);
            }
            other => panic!("expected media, got {other:?}"),
        }
    }

    #[test]
    fn metadata_write_preserves_sibling_metadata() {
        let (mut store, id) = store_with_node(vec![record_field()]);
        let root = Path::field(id.clone(), "settings");
        store
            .set_metadata(&root.key("radius"), "min", serde_json::json!(0.0))
            .unwrap();
        store
            .set_metadata(&root.key("radius"), "max", serde_json::json!(10.0))
            .unwrap();
        let radius = store.get(&root.key("radius")).unwrap();
        assert_eq!(radius.metadata_f64("min", -1.0), 0.0);
        assert_eq!(radius.metadata_f64("max", -1.0), 10.0);
    }
}

//! Flow document persistence
//!
//! Converts the in-memory graph to and from the portable `.json`
//! document format. Cached media payloads are inlined on save so the
//! document is self-contained offline, and re-uploaded on load to obtain
//! fresh server-side handles; the format never embeds a directly-usable
//! server reference.

use crate::api::PayloadStore;
use crate::data::Payload;
use crate::error::FlowError;
use crate::graph::{Edge, FlowGraph, FlowNode, NodeStatus, Viewport};
use crate::store::binding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Document-level metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: Option<String>,
    /// RFC 3339 save timestamp
    #[serde(default)]
    pub saved_at: Option<String>,
}

/// The persisted/exported form of an entire graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDocument {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub viewport: Viewport,
    /// Externalized payloads inlined at save time, keyed by the owning
    /// value's identity
    #[serde(default)]
    pub embedded_data: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Serialize the graph into a self-contained document. Every unconnected
/// input field holding a cached media value gets its full payload fetched
/// from the collaborator and inlined into `embedded_data`.
pub fn to_document(
    graph: &FlowGraph,
    payloads: &dyn PayloadStore,
) -> Result<FlowDocument, FlowError> {
    let mut embedded_data = BTreeMap::new();
    let mut nodes = Vec::with_capacity(graph.nodes.len());

    for id in graph.sorted_node_ids() {
        let node = &graph.nodes[&id];
        for field in &node.data.inputs {
            if field.is_edge_connected {
                continue;
            }
            let Some(value) = &field.value else { continue };
            if let Payload::Media(media) = &value.payload {
                if media.cached {
                    let full = payloads.fetch_full(&value.id, field.dtype)?;
                    embedded_data.insert(value.id.clone(), full);
                }
            }
        }
        nodes.push(node.clone());
    }

    Ok(FlowDocument {
        nodes,
        edges: graph.edges.clone(),
        viewport: graph.viewport,
        embedded_data,
        metadata: DocumentMetadata {
            filename: graph.filename.clone(),
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
        },
    })
}

/// Rebuild a graph from a document. Fields referencing `embedded_data`
/// entries are re-uploaded to obtain fresh server-side descriptors
/// (re-hydration is mandatory); statuses are forced to not-evaluated and
/// connectivity is re-derived from the edge set rather than trusted.
pub fn from_document(
    document: FlowDocument,
    payloads: &dyn PayloadStore,
) -> Result<FlowGraph, FlowError> {
    let mut graph = FlowGraph {
        viewport: document.viewport,
        filename: document.metadata.filename.clone(),
        ..FlowGraph::default()
    };

    for mut node in document.nodes {
        // persisted execution state is never trusted as current
        node.data.status = NodeStatus::NotEvaluated;
        node.data.progress = 0.0;
        for field in node.data.inputs.iter_mut() {
            let Some(value) = &field.value else { continue };
            let Some(blob) = document.embedded_data.get(&value.id) else {
                continue;
            };
            let filename = match &value.payload {
                Payload::Media(media) => media
                    .filename
                    .clone()
                    .unwrap_or_else(|| format!("{}.json", value.id)),
                _ => format!("{}.json", value.id),
            };
            let expanded = value.expanded();
            match payloads.upload(blob, &filename, "json") {
                Ok(mut fresh) => {
                    // server responses know nothing about client UI state
                    fresh.set_expanded(expanded);
                    field.value = Some(fresh);
                }
                Err(err) => {
                    log::warn!(
                        "re-hydration failed for field '{}' on node '{}': {err}",
                        field.label,
                        node.id
                    );
                }
            }
        }
        graph.add_node(node);
    }

    graph.edges = document.edges;
    binding::sync_connectivity(&mut graph);
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MediaEncoding, MediaPayload, Value};
    use crate::graph::{DataKind, Field, NodeData};
    use egui::Pos2;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory stand-in for the large-object collaborator.
    struct MemoryPayloadStore {
        blobs: RefCell<HashMap<String, String>>,
    }

    impl MemoryPayloadStore {
        fn new() -> Self {
            Self {
                blobs: RefCell::new(HashMap::new()),
            }
        }

        fn seed(&self, id: &str, blob: &str) {
            self.blobs
                .borrow_mut()
                .insert(id.to_string(), blob.to_string());
        }
    }

    impl PayloadStore for MemoryPayloadStore {
        fn fetch_full(&self, id: &str, _dtype: DataKind) -> Result<String, FlowError> {
            self.blobs
                .borrow()
                .get(id)
                .cloned()
                .ok_or_else(|| FlowError::Transport(format!("no blob for {id}")))
        }

        fn upload(
            &self,
            blob: &str,
            original_filename: &str,
            _file_extension: &str,
        ) -> Result<Value, FlowError> {
            let value = Value::media(MediaPayload {
                encoding: MediaEncoding::Png,
                data: None,
                preview: Some("prev".to_string()),
                width: Some(32),
                height: Some(32),
                cached: true,
                filename: Some(original_filename.to_string()),
            });
            self.blobs
                .borrow_mut()
                .insert(value.id.clone(), blob.to_string());
            Ok(value)
        }
    }

    fn media_node() -> FlowNode {
        let mut media_value = Value::media(MediaPayload {
            encoding: MediaEncoding::Png,
            data: None,
            preview: Some("prev".to_string()),
            width: Some(32),
            height: Some(32),
            cached: true,
            filename: Some("photo.png".to_string()),
        });
        media_value.set_expanded(true);
        FlowNode::new(
            Pos2::new(5.0, 6.0),
            NodeData {
                display_name: "Load".to_string(),
                class_name: "LoadImage".to_string(),
                namespace: "io".to_string(),
                status: NodeStatus::Evaluated,
                inputs: vec![
                    Field::input("image", DataKind::Image).with_value(media_value),
                    Field::input("radius", DataKind::Number).with_value(Value::float(2.5)),
                ],
                outputs: vec![Field::output("result", DataKind::Image)],
                streaming: false,
                terminal_output: String::new(),
                progress: 1.0,
                source_ref: None,
            },
        )
    }

    #[test]
    fn round_trip_embeds_and_rehydrates_cached_media() {
        let store = MemoryPayloadStore::new();
        let mut graph = FlowGraph::new();
        let node_id = graph.add_node(media_node());
        let value_id = graph.nodes[&node_id].input("image").unwrap().value.as_ref().unwrap().id.clone();
        store.seed(&value_id, "{\"full\":\"payload\"}");

        let document = to_document(&graph, &store).unwrap();
        assert_eq!(document.nodes.len(), 1);
        assert_eq!(
            document.embedded_data.get(&value_id).map(String::as_str),
            Some("{\"full\":\"payload\"}")
        );

        let restored = from_document(document, &store).unwrap();
        assert_eq!(restored.nodes.len(), graph.nodes.len());
        assert_eq!(restored.edges.len(), graph.edges.len());

        let node = &restored.nodes[&node_id];
        // status is never trusted from the file
        assert_eq!(node.data.status, NodeStatus::NotEvaluated);
        // the media field got a fresh server-assigned identity
        let image = node.input("image").unwrap().value.as_ref().unwrap();
        assert_ne!(image.id, value_id);
        // but the client-side expand state survived re-hydration
        assert!(image.expanded());
        // non-media payloads round-trip verbatim
        let radius = node.input("radius").unwrap().value.as_ref().unwrap();
        assert!(radius.same_payload(&Value::float(2.5)));
    }

    #[test]
    fn connected_inputs_are_not_embedded() {
        let store = MemoryPayloadStore::new();
        let mut graph = FlowGraph::new();
        let node_id = graph.add_node(media_node());
        graph
            .nodes
            .get_mut(&node_id)
            .unwrap()
            .input_mut("image")
            .unwrap()
            .is_edge_connected = true;

        let document = to_document(&graph, &store).unwrap();
        assert!(document.embedded_data.is_empty());
    }

    #[test]
    fn document_json_round_trips() {
        let store = MemoryPayloadStore::new();
        let mut graph = FlowGraph::new();
        let node_id = graph.add_node(media_node());
        let value_id = graph.nodes[&node_id].input("image").unwrap().value.as_ref().unwrap().id.clone();
        store.seed(&value_id, "blob");

        let document = to_document(&graph, &store).unwrap();
        let json = serde_json::to_string_pretty(&document).unwrap();
        let back: FlowDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.nodes.len(), 1);
        assert_eq!(back.embedded_data.len(), 1);
        assert_eq!(back.viewport, document.viewport);
    }
}

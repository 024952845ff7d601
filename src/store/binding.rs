//! Field/handle binding
//!
//! Maps node fields to canvas connection points and derives per-field
//! connectivity from the edge set. Connectivity gates editability: an
//! input fed by an edge is not directly editable, and on any
//! connected⇄unconnected transition the field's locally-held value is
//! discarded. The edge, or its removal, is authoritative.

use crate::graph::{DataKind, Field, FlowGraph, NodeId};

/// Canvas handle id for a field. Deterministic in node id and field
/// label so edges stay attached to the same logical slot across
/// re-renders and unrelated edits.
pub fn handle_id(node_id: &NodeId, field_label: &str) -> String {
    format!("{node_id}-{field_label}")
}

/// Whether an output field may connect to an input field. `Any` bridges
/// everything; numbers pair with units; otherwise like pairs with like.
pub fn can_connect(source: &Field, target: &Field) -> bool {
    match (source.dtype, target.dtype) {
        (DataKind::Any, _) | (_, DataKind::Any) => true,
        (DataKind::Number, DataKind::Units) | (DataKind::Units, DataKind::Number) => true,
        (a, b) => a == b,
    }
}

/// Recompute `is_edge_connected` for every input field from the current
/// edge set. Must run after every edge-set change; the flag is derived,
/// never cached independently.
pub fn sync_connectivity(graph: &mut FlowGraph) {
    let FlowGraph { nodes, edges, .. } = graph;
    for node in nodes.values_mut() {
        for field in node.data.inputs.iter_mut() {
            let handle = handle_id(&node.id, &field.label);
            let connected = edges
                .iter()
                .any(|edge| edge.target == node.id && edge.target_handle == handle);
            if connected != field.is_edge_connected {
                log::debug!(
                    "field '{}' on node '{}' {}",
                    field.label,
                    node.id,
                    if connected { "connected" } else { "disconnected" }
                );
                field.is_edge_connected = connected;
                // Rising/falling-edge reset: the local value is no longer
                // authoritative and is dropped, not merged.
                field.value = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use crate::graph::{Edge, FlowNode, NodeData, NodeStatus};
    use egui::Pos2;

    fn node_with_input() -> FlowNode {
        FlowNode::new(
            Pos2::ZERO,
            NodeData {
                display_name: "Blur".to_string(),
                class_name: "Blur".to_string(),
                namespace: "filters".to_string(),
                status: NodeStatus::NotEvaluated,
                inputs: vec![Field::input("radius", DataKind::Number)
                    .with_value(Value::float(2.0))],
                outputs: vec![Field::output("result", DataKind::Number)],
                streaming: false,
                terminal_output: String::new(),
                progress: 0.0,
                source_ref: None,
            },
        )
    }

    #[test]
    fn handle_ids_are_stable() {
        let id = "node-1".to_string();
        assert_eq!(handle_id(&id, "radius"), handle_id(&id, "radius"));
        assert_ne!(handle_id(&id, "radius"), handle_id(&id, "image"));
    }

    #[test]
    fn connect_and_disconnect_clear_the_value() {
        let mut graph = FlowGraph::new();
        let source = graph.add_node(node_with_input());
        let target = graph.add_node(node_with_input());

        // connect: value cleared, flag set
        let edge = Edge::new(
            source.clone(),
            handle_id(&source, "result"),
            target.clone(),
            handle_id(&target, "radius"),
        );
        let edge_id = edge.id.clone();
        graph.add_edge(edge).unwrap();
        sync_connectivity(&mut graph);
        let field = graph.nodes[&target].input("radius").unwrap();
        assert!(field.is_edge_connected);
        assert!(field.value.is_none());
        assert!(!field.editable());

        // a user edit while connected would be rejected upstream; simulate
        // a value arriving from execution, then disconnect
        graph
            .nodes
            .get_mut(&target)
            .unwrap()
            .input_mut("radius")
            .unwrap()
            .value = Some(Value::float(7.0));
        graph.remove_edge(&edge_id);
        sync_connectivity(&mut graph);
        let field = graph.nodes[&target].input("radius").unwrap();
        assert!(!field.is_edge_connected);
        assert!(field.value.is_none());
        assert!(field.editable());
    }

    #[test]
    fn connectivity_matches_edge_set_membership() {
        let mut graph = FlowGraph::new();
        let source = graph.add_node(node_with_input());
        let target = graph.add_node(node_with_input());
        sync_connectivity(&mut graph);
        assert!(!graph.nodes[&target].input("radius").unwrap().is_edge_connected);

        let edge = Edge::new(
            source.clone(),
            handle_id(&source, "result"),
            target.clone(),
            handle_id(&target, "radius"),
        );
        graph.add_edge(edge).unwrap();
        sync_connectivity(&mut graph);
        assert!(graph.nodes[&target].input("radius").unwrap().is_edge_connected);
    }

    #[test]
    fn dtype_compatibility() {
        let number_out = Field::output("out", DataKind::Number);
        let units_in = Field::input("in", DataKind::Units);
        let image_in = Field::input("in", DataKind::Image);
        let any_in = Field::input("in", DataKind::Any);
        assert!(can_connect(&number_out, &units_in));
        assert!(!can_connect(&number_out, &image_in));
        assert!(can_connect(&number_out, &any_in));
    }
}

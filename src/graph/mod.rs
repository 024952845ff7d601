//! Flow graph data structures
//!
//! The graph is the unit of persistence and of execution-session
//! serialization: node set, edge set, viewport, and filename.

pub mod node;
pub mod path;

pub use node::{DataKind, Field, FlowNode, NodeData, NodeId, NodeStatus};
pub use path::{Path, PathSegment};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for an edge
pub type EdgeId = String;

/// A connection from one node's output handle to another node's input
/// handle. Existence of an edge targeting an input handle is the sole
/// source of truth for that field's `is_edge_connected` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
}

impl Edge {
    pub fn new(
        source: NodeId,
        source_handle: impl Into<String>,
        target: NodeId,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            source_handle: source_handle.into(),
            target,
            target_handle: target_handle.into(),
        }
    }
}

/// Pan/zoom state of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// Canvas-originated node events, applied through the store reducers.
#[derive(Debug, Clone)]
pub enum NodeChange {
    Added(FlowNode),
    Removed(NodeId),
    Moved { id: NodeId, position: egui::Pos2 },
}

/// Canvas-originated edge events.
#[derive(Debug, Clone)]
pub enum EdgeChange {
    Added(Edge),
    Removed(EdgeId),
}

/// The full graph: nodes, edges, viewport, filename.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: HashMap<NodeId, FlowNode>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub filename: Option<String>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the graph and returns its id.
    pub fn add_node(&mut self, node: FlowNode) -> NodeId {
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<FlowNode> {
        self.edges
            .retain(|edge| &edge.source != node_id && &edge.target != node_id);
        self.nodes.remove(node_id)
    }

    /// Adds an edge after basic validation. Handle-level dtype checks
    /// happen at the binding layer before the change is emitted.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), &'static str> {
        if edge.source == edge.target {
            return Err("Cannot connect a node to itself");
        }
        if !self.nodes.contains_key(&edge.source) {
            return Err("Source node does not exist");
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err("Target node does not exist");
        }
        self.edges.push(edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, edge_id: &EdgeId) -> Option<Edge> {
        let index = self.edges.iter().position(|e| &e.id == edge_id)?;
        Some(self.edges.remove(index))
    }

    /// Node ids in sorted order, for deterministic serialization.
    pub fn sorted_node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::node::{DataKind, Field, NodeData, NodeStatus};
    use super::*;
    use egui::Pos2;

    fn node(class: &str) -> FlowNode {
        FlowNode::new(
            Pos2::ZERO,
            NodeData {
                display_name: class.to_string(),
                class_name: class.to_string(),
                namespace: "test".to_string(),
                status: NodeStatus::NotEvaluated,
                inputs: vec![Field::input("in", DataKind::Number)],
                outputs: vec![Field::output("out", DataKind::Number)],
                streaming: false,
                terminal_output: String::new(),
                progress: 0.0,
                source_ref: None,
            },
        )
    }

    #[test]
    fn remove_node_drops_touching_edges() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(node("A"));
        let b = graph.add_node(node("B"));
        let edge = Edge::new(a.clone(), "out", b.clone(), "in");
        graph.add_edge(edge).unwrap();
        assert_eq!(graph.edges.len(), 1);

        graph.remove_node(&a);
        assert!(graph.edges.is_empty());
        assert!(graph.nodes.contains_key(&b));
    }

    #[test]
    fn self_connection_is_rejected() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(node("A"));
        let edge = Edge::new(a.clone(), "out", a, "in");
        assert!(graph.add_edge(edge).is_err());
    }
}

//! Execution channel wire protocol
//!
//! The client sends action-tagged commands; the server streams
//! event-tagged updates back until the run finishes or is cancelled.

use crate::document::FlowDocument;
use crate::graph::{NodeData, NodeId};
use serde::{Deserialize, Serialize};

/// Commands sent over the open channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    Execute {
        flow_file: FlowDocument,
        quiet: bool,
    },
    Cancel,
}

/// One node's replacement payload inside a sparse graph update.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphNodeUpdate {
    pub node_id: NodeId,
    pub data: NodeData,
}

/// Events received over the open channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Incremental update: shallow-merge the named keys into one node's
    /// data; everything else on that node is untouched.
    FieldUpdate {
        node_id: NodeId,
        updates: serde_json::Map<String, serde_json::Value>,
    },
    /// Full single-node replacement.
    NodeUpdate { node_id: NodeId, data: NodeData },
    /// Sparse overlay over the whole graph: only nodes mentioned are
    /// spliced, the rest are left untouched.
    GraphUpdate { nodes: Vec<GraphNodeUpdate> },
    ExecutionFinished,
    ExecutionCancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_parse_from_tagged_json() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"event": "field_update", "node_id": "n1",
                "updates": {"status": "executing", "progress": 0.25}}"#,
        )
        .unwrap();
        match event {
            ServerEvent::FieldUpdate { node_id, updates } => {
                assert_eq!(node_id, "n1");
                assert_eq!(updates["status"], "executing");
            }
            other => panic!("unexpected event {other:?}"),
        }

        let event: ServerEvent =
            serde_json::from_str(r#"{"event": "execution_finished"}"#).unwrap();
        assert!(matches!(event, ServerEvent::ExecutionFinished));
    }

    #[test]
    fn cancel_serializes_with_action_tag() {
        let json = serde_json::to_string(&ClientCommand::Cancel).unwrap();
        assert_eq!(json, r#"{"action":"cancel"}"#);
    }
}

//! Execution session
//!
//! Owns the streaming channel to the backend and the
//! `Idle → Connecting → Running → (Cancelling) → Idle` state machine.
//! Inbound events are merged into the store while preserving UI-only
//! state; any path back to `Idle` reconciles node statuses so no node is
//! left stuck in `Pending`.

pub mod channel;
pub mod protocol;

use crate::api::PayloadStore;
use crate::document;
use crate::graph::{NodeData, NodeId, NodeStatus};
use crate::store::FlowStore;
use channel::{ChannelEvent, ExecutionChannel};
use chrono::{DateTime, Utc};
use protocol::{ClientCommand, ServerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Running,
    Cancelling,
}

/// Streaming execution session against the backend.
#[derive(Default)]
pub struct ExecutionSession {
    state: SessionState,
    channel: Option<ExecutionChannel>,
    quiet: bool,
    last_synchronized: Option<DateTime<Utc>>,
}

impl ExecutionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_synchronized(&self) -> Option<DateTime<Utc>> {
        self.last_synchronized
    }

    pub fn is_busy(&self) -> bool {
        self.state != SessionState::Idle
    }

    /// Start a run. No-op unless idle, no channel is open, and the graph
    /// has at least one node (executing an empty graph is not an error).
    pub fn execute(&mut self, store: &FlowStore, url: &str, quiet: bool) {
        if self.state != SessionState::Idle || self.channel.is_some() {
            log::debug!("execute ignored: session is {:?}", self.state);
            return;
        }
        if store.graph.is_empty() {
            log::debug!("execute ignored: graph is empty");
            return;
        }
        self.quiet = quiet;
        self.channel = Some(ExecutionChannel::connect(url.to_string()));
        self.state = SessionState::Connecting;
    }

    /// Request cancellation. The channel stays open: the server's
    /// `execution_cancelled` confirmation settles the state, not us.
    pub fn cancel(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        if let Some(channel) = &self.channel {
            channel.send(ClientCommand::Cancel);
            self.state = SessionState::Cancelling;
        }
    }

    /// Drain channel events into the store. Called once per UI frame.
    pub fn poll(&mut self, store: &mut FlowStore, payloads: &dyn PayloadStore) {
        let mut events = Vec::new();
        if let Some(channel) = &self.channel {
            while let Some(event) = channel.try_recv() {
                events.push(event);
            }
        }
        for event in events {
            match event {
                ChannelEvent::Opened => self.on_open(store, payloads),
                ChannelEvent::Server(event) => self.apply_event(store, event),
                ChannelEvent::Closed => {
                    log::warn!("execution channel closed by server");
                    self.settle(store);
                }
                ChannelEvent::Failed(reason) => {
                    log::error!("execution channel failed: {reason}");
                    self.settle(store);
                }
            }
        }
    }

    fn on_open(&mut self, store: &mut FlowStore, payloads: &dyn PayloadStore) {
        if self.state != SessionState::Connecting {
            return;
        }
        self.state = SessionState::Running;
        // optimistic: the UI reflects "work submitted" before any ack
        mark_all_pending(store);
        let document = match document::to_document(&store.graph, payloads) {
            Ok(document) => document,
            Err(err) => {
                log::error!("could not serialize graph for execution: {err}");
                self.settle(store);
                return;
            }
        };
        if let Some(channel) = &self.channel {
            channel.send(ClientCommand::Execute {
                flow_file: document,
                quiet: self.quiet,
            });
        }
    }

    fn apply_event(&mut self, store: &mut FlowStore, event: ServerEvent) {
        match event {
            ServerEvent::FieldUpdate { node_id, updates } => {
                merge_node_updates(store, &node_id, updates);
            }
            ServerEvent::NodeUpdate { node_id, data } => {
                splice_node_data(store, &node_id, data);
            }
            ServerEvent::GraphUpdate { nodes } => {
                // sparse overlay: unmentioned nodes stay untouched
                for update in nodes {
                    if store.graph.nodes.contains_key(&update.node_id) {
                        splice_node_data(store, &update.node_id, update.data);
                    } else {
                        log::debug!(
                            "graph update for unknown node '{}' skipped",
                            update.node_id
                        );
                    }
                }
            }
            ServerEvent::ExecutionFinished => {
                self.settle(store);
                self.last_synchronized = Some(Utc::now());
            }
            ServerEvent::ExecutionCancelled => {
                // clears the cancelling flag too
                self.settle(store);
            }
        }
    }

    /// Any transition back to `Idle` reconciles statuses: nodes the
    /// server never reached revert from `Pending` to `NotEvaluated`.
    fn settle(&mut self, store: &mut FlowStore) {
        reset_pending(store);
        self.state = SessionState::Idle;
        self.channel = None;
    }
}

fn mark_all_pending(store: &mut FlowStore) {
    for node in store.graph.nodes.values_mut() {
        node.data.status = NodeStatus::Pending;
        if node.data.streaming {
            node.data.progress = 0.0;
        }
    }
}

fn reset_pending(store: &mut FlowStore) {
    for node in store.graph.nodes.values_mut() {
        if node.data.status == NodeStatus::Pending {
            node.data.status = NodeStatus::NotEvaluated;
        }
    }
}

/// Replace one node's data wholesale, re-attaching client UI state the
/// server knows nothing about.
fn splice_node_data(store: &mut FlowStore, node_id: &NodeId, mut data: NodeData) {
    let Some(node) = store.graph.nodes.get_mut(node_id) else {
        log::debug!("update for unknown node '{node_id}' skipped");
        return;
    };
    data.adopt_ui_state(&node.data);
    node.data = data;
}

/// Shallow-merge named keys into one node's data via its JSON form; keys
/// not named are untouched.
fn merge_node_updates(
    store: &mut FlowStore,
    node_id: &NodeId,
    updates: serde_json::Map<String, serde_json::Value>,
) {
    let Some(node) = store.graph.nodes.get(node_id) else {
        log::debug!("field update for unknown node '{node_id}' skipped");
        return;
    };
    let mut merged = match serde_json::to_value(&node.data) {
        Ok(serde_json::Value::Object(obj)) => obj,
        _ => {
            log::error!("node '{node_id}' data did not serialize to an object");
            return;
        }
    };
    for (key, value) in updates {
        merged.insert(key, value);
    }
    match serde_json::from_value::<NodeData>(serde_json::Value::Object(merged)) {
        Ok(data) => splice_node_data(store, node_id, data),
        Err(err) => log::warn!("field update for node '{node_id}' rejected: {err}"),
    }
}

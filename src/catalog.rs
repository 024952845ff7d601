//! Node-template catalog
//!
//! The backend's `/all_nodes` endpoint serves node templates grouped by
//! category and sub-group. Dropping a template on the canvas seeds a new
//! node from it, and after every catalog refresh the graph is reconciled
//! against the templates still on offer.

use crate::data::{wire, Metadata, Value};
use crate::graph::{DataKind, Field, FlowGraph, FlowNode, NodeData, NodeStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared slot on a node template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTemplate {
    pub label: String,
    #[serde(default)]
    pub user_label: Option<String>,
    pub dtype: DataKind,
    /// Default value in wire form; invalid defaults are dropped with a
    /// warning rather than failing the whole catalog
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Descriptor used to seed a new node's data on drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTemplate {
    pub class_name: String,
    pub namespace: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<FieldTemplate>,
    #[serde(default)]
    pub outputs: Vec<FieldTemplate>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub source_ref: Option<String>,
}

/// Catalog as served: category -> sub-group -> templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pub groups: BTreeMap<String, BTreeMap<String, Vec<NodeTemplate>>>,
}

impl Catalog {
    /// Flat view over every template.
    pub fn templates(&self) -> impl Iterator<Item = &NodeTemplate> {
        self.groups
            .values()
            .flat_map(|sub| sub.values())
            .flatten()
    }

    pub fn contains_class(&self, class_name: &str) -> bool {
        self.templates().any(|t| t.class_name == class_name)
    }

    pub fn find(&self, class_name: &str) -> Option<&NodeTemplate> {
        self.templates().find(|t| t.class_name == class_name)
    }
}

fn field_from_template(template: &FieldTemplate, is_output: bool) -> Field {
    let mut field = if is_output {
        Field::output(template.label.clone(), template.dtype)
    } else {
        Field::input(template.label.clone(), template.dtype)
    };
    if let Some(user_label) = &template.user_label {
        field.user_label = user_label.clone();
    }
    field.metadata = template.metadata.clone();
    if let Some(default) = &template.default {
        match wire::from_wire(default) {
            // fresh identity per instantiation, no reuse across nodes
            Ok(value) => {
                field.value = Some(Value::new(value.payload).with_metadata(value.metadata));
            }
            Err(err) => {
                log::warn!(
                    "ignoring bad default for '{}' on template: {err}",
                    template.label
                );
            }
        }
    }
    field
}

/// Seed a fresh node from a template at the given canvas position.
pub fn instantiate(template: &NodeTemplate, position: egui::Pos2) -> FlowNode {
    FlowNode::new(
        position,
        NodeData {
            display_name: template
                .display_name
                .clone()
                .unwrap_or_else(|| template.class_name.clone()),
            class_name: template.class_name.clone(),
            namespace: template.namespace.clone(),
            status: NodeStatus::NotEvaluated,
            inputs: template
                .inputs
                .iter()
                .map(|t| field_from_template(t, false))
                .collect(),
            outputs: template
                .outputs
                .iter()
                .map(|t| field_from_template(t, true))
                .collect(),
            streaming: template.streaming,
            terminal_output: String::new(),
            progress: 0.0,
            source_ref: template.source_ref.clone(),
        },
    )
}

/// Drop nodes whose template type the catalog no longer offers, along
/// with every edge touching them. Runs after each catalog refresh.
pub fn reconcile(graph: &mut FlowGraph, catalog: &Catalog) {
    let stale: Vec<_> = graph
        .nodes
        .values()
        .filter(|node| !catalog.contains_class(&node.data.class_name))
        .map(|node| node.id.clone())
        .collect();
    for id in stale {
        let class = graph.nodes[&id].data.class_name.clone();
        graph.remove_node(&id);
        log::warn!("node '{id}' removed: template '{class}' no longer in catalog");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::store::binding::handle_id;
    use egui::Pos2;

    fn catalog_with(classes: &[&str]) -> Catalog {
        let mut groups = BTreeMap::new();
        let mut sub = BTreeMap::new();
        sub.insert(
            "basic".to_string(),
            classes
                .iter()
                .map(|class| NodeTemplate {
                    class_name: class.to_string(),
                    namespace: "filters".to_string(),
                    display_name: None,
                    inputs: vec![FieldTemplate {
                        label: "amount".to_string(),
                        user_label: None,
                        dtype: DataKind::Number,
                        default: Some(serde_json::json!({"type": "IntData", "payload": 3})),
                        metadata: Metadata::new(),
                    }],
                    outputs: vec![FieldTemplate {
                        label: "result".to_string(),
                        user_label: None,
                        dtype: DataKind::Image,
                        default: None,
                        metadata: Metadata::new(),
                    }],
                    streaming: false,
                    source_ref: None,
                })
                .collect(),
        );
        groups.insert("Filters".to_string(), sub);
        Catalog { groups }
    }

    #[test]
    fn instantiation_seeds_defaults_with_fresh_identity() {
        let catalog = catalog_with(&["Blur"]);
        let template = catalog.find("Blur").unwrap();
        let a = instantiate(template, Pos2::ZERO);
        let b = instantiate(template, Pos2::ZERO);
        let va = a.input("amount").unwrap().value.as_ref().unwrap();
        let vb = b.input("amount").unwrap().value.as_ref().unwrap();
        assert!(va.same_payload(vb));
        assert_ne!(va.id, vb.id);
        assert!(!a.output("result").unwrap().editable());
    }

    #[test]
    fn reconcile_removes_withdrawn_templates_and_their_edges() {
        let catalog = catalog_with(&["Blur", "Sharpen"]);
        let mut graph = FlowGraph::new();
        let blur = graph.add_node(instantiate(catalog.find("Blur").unwrap(), Pos2::ZERO));
        let sharpen =
            graph.add_node(instantiate(catalog.find("Sharpen").unwrap(), Pos2::ZERO));
        graph
            .add_edge(Edge::new(
                blur.clone(),
                handle_id(&blur, "result"),
                sharpen.clone(),
                handle_id(&sharpen, "amount"),
            ))
            .unwrap();

        // refreshed catalog no longer lists Blur
        reconcile(&mut graph, &catalog_with(&["Sharpen"]));
        assert!(!graph.nodes.contains_key(&blur));
        assert!(graph.nodes.contains_key(&sharpen));
        assert!(graph.edges.is_empty());
    }
}

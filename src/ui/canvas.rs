//! Node canvas
//!
//! Painter-based rendering of nodes, ports, and edges with pan/zoom.
//! The canvas never mutates the graph; interactions come back as
//! [`NodeChange`]/[`EdgeChange`] events applied through the store
//! reducers after layout.

use crate::constants::{NODE_HEADER_HEIGHT, NODE_ROW_HEIGHT, NODE_WIDTH, PORT_RADIUS};
use crate::graph::{
    DataKind, Edge, EdgeChange, Field, FlowGraph, FlowNode, NodeChange, NodeId, NodeStatus,
    Viewport,
};
use crate::store::binding;
use egui::{Color32, Pos2, Rect, Sense, Stroke, Ui, Vec2};

/// In-progress connection drag, anchored at an output port.
#[derive(Debug, Clone)]
struct PendingConnection {
    node: NodeId,
    label: String,
    dtype: DataKind,
    anchor: Pos2,
}

/// Interaction state that survives between frames.
#[derive(Default)]
pub struct Canvas {
    pub selected: Option<NodeId>,
    drag_offset: Option<Vec2>,
    pending: Option<PendingConnection>,
}

/// Everything one frame of canvas interaction produced.
#[derive(Default)]
pub struct CanvasOutput {
    pub node_changes: Vec<NodeChange>,
    pub edge_changes: Vec<EdgeChange>,
    pub viewport: Option<Viewport>,
    /// Node that was double-clicked; opens its parameter window
    pub open_parameters: Option<NodeId>,
}

fn status_color(status: NodeStatus) -> Color32 {
    match status {
        NodeStatus::NotEvaluated => Color32::from_rgb(100, 100, 100),
        NodeStatus::Pending => Color32::from_rgb(180, 160, 60),
        NodeStatus::Executing => Color32::from_rgb(220, 140, 50),
        NodeStatus::Streaming => Color32::from_rgb(80, 140, 220),
        NodeStatus::Evaluated => Color32::from_rgb(90, 180, 90),
        NodeStatus::Error => Color32::from_rgb(200, 70, 70),
    }
}

fn node_height(node: &FlowNode) -> f32 {
    let rows = node.data.inputs.len().max(node.data.outputs.len()) as f32;
    NODE_HEADER_HEIGHT + rows * NODE_ROW_HEIGHT + 6.0
}

fn node_rect(node: &FlowNode) -> Rect {
    Rect::from_min_size(node.position, Vec2::new(NODE_WIDTH, node_height(node)))
}

fn input_port_pos(node: &FlowNode, row: usize) -> Pos2 {
    node.position + Vec2::new(0.0, NODE_HEADER_HEIGHT + (row as f32 + 0.5) * NODE_ROW_HEIGHT)
}

fn output_port_pos(node: &FlowNode, row: usize) -> Pos2 {
    node.position
        + Vec2::new(
            NODE_WIDTH,
            NODE_HEADER_HEIGHT + (row as f32 + 0.5) * NODE_ROW_HEIGHT,
        )
}

/// Graph-space position of a handle, scanning inputs then outputs.
fn handle_pos(node: &FlowNode, handle: &str) -> Option<Pos2> {
    for (i, field) in node.data.inputs.iter().enumerate() {
        if binding::handle_id(&node.id, &field.label) == handle {
            return Some(input_port_pos(node, i));
        }
    }
    for (i, field) in node.data.outputs.iter().enumerate() {
        if binding::handle_id(&node.id, &field.label) == handle {
            return Some(output_port_pos(node, i));
        }
    }
    None
}

impl Canvas {
    pub fn show(&mut self, ui: &mut Ui, graph: &FlowGraph) -> CanvasOutput {
        let mut output = CanvasOutput::default();
        let mut viewport = graph.viewport;

        let (response, painter) =
            ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        painter.rect_filled(response.rect, 0.0, Color32::from_rgb(28, 28, 28));

        // Pan with the primary drag on empty canvas, zoom with the wheel.
        if response.dragged() && self.drag_offset.is_none() && self.pending.is_none() {
            viewport.x += response.drag_delta().x / viewport.zoom;
            viewport.y += response.drag_delta().y / viewport.zoom;
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                viewport.zoom = (viewport.zoom * (1.0 + scroll * 0.001)).clamp(0.2, 3.0);
            }
        }

        let origin = response.rect.min;
        let zoom = viewport.zoom;
        let to_screen =
            move |p: Pos2| origin + (p.to_vec2() + Vec2::new(viewport.x, viewport.y)) * zoom;
        let to_graph =
            move |p: Pos2| (((p - origin) / zoom) - Vec2::new(viewport.x, viewport.y)).to_pos2();

        // Edges under nodes
        for edge in &graph.edges {
            let from = graph
                .nodes
                .get(&edge.source)
                .and_then(|n| handle_pos(n, &edge.source_handle));
            let to = graph
                .nodes
                .get(&edge.target)
                .and_then(|n| handle_pos(n, &edge.target_handle));
            if let (Some(from), Some(to)) = (from, to) {
                draw_link(
                    &painter,
                    to_screen(from),
                    to_screen(to),
                    zoom,
                    Color32::from_rgb(150, 150, 150),
                );
            }
        }
        if let Some(pending) = &self.pending {
            if let Some(pointer) = response.hover_pos() {
                draw_link(
                    &painter,
                    to_screen(pending.anchor),
                    pointer,
                    zoom,
                    Color32::from_rgb(90, 140, 220),
                );
            }
        }

        let mut clicked_port = false;
        for id in graph.sorted_node_ids() {
            let node = &graph.nodes[&id];
            let rect = node_rect(node);
            let screen_rect = Rect::from_two_pos(to_screen(rect.min), to_screen(rect.max));
            let selected = self.selected.as_ref() == Some(&id);

            // border, body, header strip
            let border = if selected {
                Color32::from_rgb(90, 140, 220)
            } else {
                Color32::from_rgb(64, 64, 64)
            };
            painter.rect_filled(screen_rect.expand(1.5 * zoom), 4.0 * zoom, border);
            painter.rect_filled(screen_rect, 4.0 * zoom, Color32::from_rgb(50, 50, 50));
            let header = Rect::from_min_size(
                screen_rect.min,
                Vec2::new(screen_rect.width(), NODE_HEADER_HEIGHT * zoom),
            );
            painter.rect_filled(header, 4.0 * zoom, status_color(node.data.status));
            painter.text(
                header.center(),
                egui::Align2::CENTER_CENTER,
                &node.data.display_name,
                egui::FontId::proportional(12.0 * zoom),
                Color32::WHITE,
            );
            if node.data.progress > 0.0 && node.data.progress < 1.0 {
                let bar = Rect::from_min_size(
                    header.left_bottom(),
                    Vec2::new(header.width() * node.data.progress, 2.0 * zoom),
                );
                painter.rect_filled(bar, 0.0, Color32::WHITE);
            }

            // ports and row labels
            for (i, field) in node.data.inputs.iter().enumerate() {
                let pos = to_screen(input_port_pos(node, i));
                if self.port_interaction(ui, pos, zoom, node, &field.label, true, graph, &mut output)
                {
                    clicked_port = true;
                }
                draw_port(&painter, pos, zoom, true, field.is_edge_connected);
                painter.text(
                    pos + Vec2::new(PORT_RADIUS * 2.0 * zoom, 0.0),
                    egui::Align2::LEFT_CENTER,
                    &field.user_label,
                    egui::FontId::proportional(10.0 * zoom),
                    Color32::from_rgb(200, 200, 200),
                );
            }
            for (i, field) in node.data.outputs.iter().enumerate() {
                let pos = to_screen(output_port_pos(node, i));
                if self.port_interaction(ui, pos, zoom, node, &field.label, false, graph, &mut output)
                {
                    clicked_port = true;
                }
                draw_port(&painter, pos, zoom, false, false);
                painter.text(
                    pos - Vec2::new(PORT_RADIUS * 2.0 * zoom, 0.0),
                    egui::Align2::RIGHT_CENTER,
                    &field.user_label,
                    egui::FontId::proportional(10.0 * zoom),
                    Color32::from_rgb(200, 200, 200),
                );
            }

            // body interaction: select, drag, open parameters
            let body = ui.interact(
                screen_rect,
                ui.id().with(&id),
                Sense::click_and_drag(),
            );
            if body.clicked() || body.drag_started() {
                self.selected = Some(id.clone());
            }
            if body.double_clicked() {
                output.open_parameters = Some(id.clone());
            }
            if body.drag_started() {
                if let Some(pointer) = body.interact_pointer_pos() {
                    self.drag_offset = Some(node.position - to_graph(pointer));
                }
            }
            if body.dragged() && selected {
                if let (Some(offset), Some(pointer)) =
                    (self.drag_offset, body.interact_pointer_pos())
                {
                    output.node_changes.push(NodeChange::Moved {
                        id: id.clone(),
                        position: to_graph(pointer) + offset,
                    });
                }
            }
            if body.drag_stopped() {
                self.drag_offset = None;
            }
        }

        // click on empty canvas: drop selection and any pending connection
        if response.clicked() && !clicked_port {
            self.selected = None;
            self.pending = None;
        }
        if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.pending = None;
        }
        if ui.input(|i| i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace)) {
            if let Some(id) = self.selected.take() {
                output.node_changes.push(NodeChange::Removed(id));
            }
        }

        if viewport != graph.viewport {
            output.viewport = Some(viewport);
        }
        output
    }

    /// Port click handling: outputs start a pending connection, inputs
    /// complete one (dtype-checked) or disconnect an existing edge.
    #[allow(clippy::too_many_arguments)]
    fn port_interaction(
        &mut self,
        ui: &mut Ui,
        screen_pos: Pos2,
        zoom: f32,
        node: &FlowNode,
        label: &str,
        is_input: bool,
        graph: &FlowGraph,
        output: &mut CanvasOutput,
    ) -> bool {
        let hit = Rect::from_center_size(screen_pos, Vec2::splat(PORT_RADIUS * 3.0 * zoom));
        let response = ui.interact(
            hit,
            ui.id().with((&node.id, label, is_input)),
            Sense::click(),
        );
        if !response.clicked() {
            return false;
        }

        let handle = binding::handle_id(&node.id, label);
        if is_input {
            if let Some(pending) = self.pending.take() {
                let target = match node.input(label) {
                    Some(field) => field,
                    None => return true,
                };
                let source = Field::output(pending.label.clone(), pending.dtype);
                if pending.node != node.id && binding::can_connect(&source, target) {
                    let source_handle = binding::handle_id(&pending.node, &pending.label);
                    output.edge_changes.push(EdgeChange::Added(Edge::new(
                        pending.node,
                        source_handle,
                        node.id.clone(),
                        handle,
                    )));
                } else {
                    log::debug!("rejected connection onto '{label}'");
                }
            } else if let Some(edge) = graph
                .edges
                .iter()
                .find(|e| e.target == node.id && e.target_handle == handle)
            {
                output.edge_changes.push(EdgeChange::Removed(edge.id.clone()));
            }
        } else if let Some(field) = node.output(label) {
            self.pending = Some(PendingConnection {
                node: node.id.clone(),
                label: label.to_string(),
                dtype: field.dtype,
                anchor: output_port_pos(
                    node,
                    node.data
                        .outputs
                        .iter()
                        .position(|f| f.label == label)
                        .unwrap_or(0),
                ),
            });
        }
        true
    }
}

fn draw_port(painter: &egui::Painter, pos: Pos2, zoom: f32, is_input: bool, connected: bool) {
    let radius = PORT_RADIUS * zoom;
    painter.circle_filled(pos, radius + 1.5 * zoom, Color32::from_rgb(64, 64, 64));
    let fill = if connected {
        Color32::from_rgb(90, 140, 220)
    } else if is_input {
        Color32::from_rgb(70, 130, 70)
    } else {
        Color32::from_rgb(140, 70, 70)
    };
    painter.circle_filled(pos, radius, fill);
}

fn draw_link(painter: &egui::Painter, from: Pos2, to: Pos2, zoom: f32, color: Color32) {
    let reach = ((to.x - from.x).abs() * 0.5).max(30.0 * zoom);
    let shape = egui::epaint::CubicBezierShape::from_points_stroke(
        [
            from,
            from + Vec2::new(reach, 0.0),
            to - Vec2::new(reach, 0.0),
            to,
        ],
        false,
        Color32::TRANSPARENT,
        Stroke::new(2.0 * zoom, color),
    );
    painter.add(shape);
}

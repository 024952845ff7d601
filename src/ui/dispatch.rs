//! Recursive display/edit dispatcher
//!
//! Given a value and its address path, selects the matching editor or
//! viewer and recurses into children. Expand state for nested values
//! lives in the value's own `metadata.expanded` (written through the
//! store) so it survives node re-creation from inbound execution
//! updates; the root of a field uses the field's context flag instead.

use super::editors;
use super::{ExpandContext, UiAction};
use crate::data::{MediaEncoding, Payload, Value};
use crate::graph::{Field, NodeId, Path};
use egui::Ui;

/// Concrete rendering mode picked for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// Null/empty: minimal placeholder, no recursion
    Empty,
    NumberCompact,
    NumberExpanded,
    BoolToggle,
    TextSingle,
    TextMulti,
    MediaSummary,
    MediaExpanded,
    ListCollapsed,
    ListExpanded,
    RecordCollapsed,
    RecordExpanded,
    /// No compatible display; rendered inert, never a crash
    Unsupported,
}

/// Pure dispatch decision, tested without a UI harness.
pub fn display_kind(value: Option<&Value>, expanded: bool) -> DisplayKind {
    let Some(value) = value else {
        return DisplayKind::Empty;
    };
    match &value.payload {
        Payload::Int(_) | Payload::Float(_) => {
            if expanded {
                DisplayKind::NumberExpanded
            } else {
                DisplayKind::NumberCompact
            }
        }
        Payload::Bool(_) => DisplayKind::BoolToggle,
        Payload::Text(_) => {
            if expanded {
                DisplayKind::TextMulti
            } else {
                DisplayKind::TextSingle
            }
        }
        Payload::Media(media) => match media.encoding {
            MediaEncoding::Other(_) => DisplayKind::Unsupported,
            _ => {
                if expanded {
                    DisplayKind::MediaExpanded
                } else {
                    DisplayKind::MediaSummary
                }
            }
        },
        Payload::List(_) => {
            if expanded {
                DisplayKind::ListExpanded
            } else {
                DisplayKind::ListCollapsed
            }
        }
        Payload::Record { .. } => {
            if expanded {
                DisplayKind::RecordExpanded
            } else {
                DisplayKind::RecordCollapsed
            }
        }
    }
}

/// What a collapse toggle on a given row should flip.
enum ToggleTarget {
    Field {
        node: NodeId,
        label: String,
        context: ExpandContext,
    },
    Value(Path),
}

impl ToggleTarget {
    fn action(&self) -> UiAction {
        match self {
            ToggleTarget::Field {
                node,
                label,
                context,
            } => UiAction::ToggleFieldExpanded {
                node: node.clone(),
                label: label.clone(),
                context: *context,
            },
            ToggleTarget::Value(path) => UiAction::ToggleExpanded { path: path.clone() },
        }
    }
}

/// Render one field: label row with its expand toggle, then the value
/// editor dispatched below it.
pub fn render_field(
    ui: &mut Ui,
    node_id: &NodeId,
    field: &Field,
    context: ExpandContext,
    buffers: &mut editors::EditBuffers,
    actions: &mut Vec<UiAction>,
) {
    let path = Path::field(node_id.clone(), field.label.clone());
    let expanded = match context {
        ExpandContext::Node => field.node_expanded,
        ExpandContext::Inspector => field.inspector_expanded,
    };
    let toggle = ToggleTarget::Field {
        node: node_id.clone(),
        label: field.label.clone(),
        context,
    };

    ui.horizontal(|ui| {
        if ui
            .small_button(if expanded { "⏷" } else { "⏵" })
            .clicked()
        {
            actions.push(toggle.action());
        }
        ui.label(&field.user_label);
        if field.is_edge_connected {
            ui.weak("(connected)");
        }
        if field.editable() && field.value.is_some() && ui.small_button("✕").clicked() {
            actions.push(UiAction::ClearValue {
                node: node_id.clone(),
                label: field.label.clone(),
            });
        }
    });
    render_value(
        ui,
        field.value.as_ref(),
        &path,
        expanded,
        field.editable(),
        buffers,
        actions,
    );
}

/// Recursive value renderer. `expanded` is the resolved state for this
/// level: the field flag at the root, `metadata.expanded` below.
pub fn render_value(
    ui: &mut Ui,
    value: Option<&Value>,
    path: &Path,
    expanded: bool,
    editable: bool,
    buffers: &mut editors::EditBuffers,
    actions: &mut Vec<UiAction>,
) {
    let Some(value) = value else {
        ui.weak("no data");
        return;
    };
    match display_kind(Some(value), expanded) {
        DisplayKind::Empty => {
            ui.weak("no data");
        }
        DisplayKind::NumberCompact => {
            editors::numeric_compact(ui, value, path, editable, buffers, actions);
        }
        DisplayKind::NumberExpanded => {
            editors::numeric_expanded(ui, value, path, editable, buffers, actions);
        }
        DisplayKind::BoolToggle => {
            editors::boolean(ui, value, path, editable, actions);
        }
        DisplayKind::TextSingle => {
            editors::text(ui, value, path, editable, false, buffers, actions);
        }
        DisplayKind::TextMulti => {
            editors::text(ui, value, path, editable, true, buffers, actions);
        }
        DisplayKind::MediaSummary => {
            editors::media_summary(ui, value);
        }
        DisplayKind::MediaExpanded => {
            editors::media_expanded(ui, value, path, editable, actions);
        }
        DisplayKind::ListCollapsed | DisplayKind::ListExpanded => {
            let items = match &value.payload {
                Payload::List(items) => items,
                _ => return,
            };
            ui.horizontal(|ui| {
                if ui
                    .small_button(if expanded { "⏷" } else { "⏵" })
                    .clicked()
                {
                    actions.push(ToggleTarget::Value(path.clone()).action());
                }
                ui.weak(format!("{} items", items.len()));
            });
            if expanded {
                ui.indent(path.to_string(), |ui| {
                    for (i, item) in items.iter().enumerate() {
                        let child_path = path.index(i);
                        render_value(
                            ui,
                            Some(item),
                            &child_path,
                            item.expanded(),
                            editable,
                            buffers,
                            actions,
                        );
                    }
                });
            }
        }
        DisplayKind::RecordCollapsed | DisplayKind::RecordExpanded => {
            let (kind, entries) = match &value.payload {
                Payload::Record { kind, entries } => (kind, entries),
                _ => return,
            };
            ui.horizontal(|ui| {
                if ui
                    .small_button(if expanded { "⏷" } else { "⏵" })
                    .clicked()
                {
                    actions.push(ToggleTarget::Value(path.clone()).action());
                }
                ui.weak(if kind.is_empty() { "record" } else { kind.as_str() });
            });
            if expanded {
                ui.indent(path.to_string(), |ui| {
                    for (name, child) in entries.iter().filter(|(n, _)| n != "metadata") {
                        let child_path = path.key(name.clone());
                        ui.label(name);
                        render_value(
                            ui,
                            Some(child),
                            &child_path,
                            child.expanded(),
                            editable,
                            buffers,
                            actions,
                        );
                    }
                });
            }
        }
        DisplayKind::Unsupported => {
            ui.weak("no compatible display");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MediaPayload;

    #[test]
    fn null_dispatches_to_placeholder() {
        assert_eq!(display_kind(None, false), DisplayKind::Empty);
        assert_eq!(display_kind(None, true), DisplayKind::Empty);
    }

    #[test]
    fn numbers_follow_expand_state() {
        let v = Value::int(4);
        assert_eq!(display_kind(Some(&v), false), DisplayKind::NumberCompact);
        assert_eq!(display_kind(Some(&v), true), DisplayKind::NumberExpanded);
        let v = Value::float(4.5);
        assert_eq!(display_kind(Some(&v), false), DisplayKind::NumberCompact);
    }

    #[test]
    fn containers_collapse_and_expand() {
        let list = Value::list(vec![Value::int(1)]);
        assert_eq!(display_kind(Some(&list), false), DisplayKind::ListCollapsed);
        assert_eq!(display_kind(Some(&list), true), DisplayKind::ListExpanded);
        let rec = Value::record("UnitsData", vec![]);
        assert_eq!(display_kind(Some(&rec), false), DisplayKind::RecordCollapsed);
    }

    #[test]
    fn unknown_media_encoding_has_no_display() {
        let v = Value::media(MediaPayload {
            encoding: MediaEncoding::Other("exr".to_string()),
            ..MediaPayload::default()
        });
        assert_eq!(display_kind(Some(&v), true), DisplayKind::Unsupported);
    }
}

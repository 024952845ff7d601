//! Type-specific field editors
//!
//! Each editor renders one value variant and pushes deferred writes.
//! Numeric display is rounded to three decimal places without touching
//! stored precision, and the integer/float variant is re-derived from
//! the fractional part on every edit.

use super::UiAction;
use base64::Engine;
use crate::constants::NUMERIC_DISPLAY_PRECISION;
use crate::data::{MediaEncoding, Payload, Value};
use crate::graph::{NodeId, Path};
use egui::Ui;
use std::collections::HashMap;

/// Per-path text buffers for in-progress edits, owned by the panel.
pub type EditBuffers = HashMap<String, String>;

/// Drop every buffered edit addressing a node. Called when a node leaves
/// the graph so stale text cannot resurface on a later node with a
/// colliding path.
pub fn prune_node(buffers: &mut EditBuffers, node: &NodeId) {
    let prefix = format!("{node}/");
    buffers.retain(|key, _| !key.starts_with(&prefix));
}

fn format_number(value: &Value) -> String {
    match value.payload {
        Payload::Int(v) => v.to_string(),
        Payload::Float(v) => format!("{:.*}", NUMERIC_DISPLAY_PRECISION, v),
        _ => String::new(),
    }
}

/// Parse a numeric edit and derive the variant from the fractional part.
/// Empty or unparseable input resets to integer zero (written through).
pub fn parse_numeric(input: &str) -> Payload {
    let number = input.trim().parse::<f64>().unwrap_or(0.0);
    if number.fract() == 0.0 {
        Payload::Int(number as i64)
    } else {
        Payload::Float(number)
    }
}

/// Turn a committed numeric edit into a replacement value, or `None` when
/// the parsed payload matches what is stored. A no-op commit must not mint
/// a fresh identity token: downstream consumers treat identity changes as
/// payload changes.
pub fn numeric_commit(value: &Value, input: &str) -> Option<Value> {
    let payload = parse_numeric(input);
    if payload == value.payload {
        None
    } else {
        Some(value.with_payload(payload))
    }
}

/// Compact single-input numeric editor.
pub fn numeric_compact(
    ui: &mut Ui,
    value: &Value,
    path: &Path,
    editable: bool,
    buffers: &mut EditBuffers,
    actions: &mut Vec<UiAction>,
) {
    let key = path.to_string();
    let buffer = buffers
        .entry(key)
        .or_insert_with(|| format_number(value));
    let response = ui.add_enabled(
        editable,
        egui::TextEdit::singleline(buffer).desired_width(80.0),
    );
    if response.lost_focus() {
        match numeric_commit(value, buffer) {
            Some(next) => {
                *buffer = format_number(&next);
                actions.push(UiAction::Write {
                    path: path.clone(),
                    value: next,
                });
            }
            None => *buffer = format_number(value),
        }
    } else if !response.has_focus() {
        // follow the store while not being edited
        *buffer = format_number(value);
    }
}

/// Expanded numeric editor: slider with min/max plus a display-format
/// selector, writing through the same path as the compact mode.
pub fn numeric_expanded(
    ui: &mut Ui,
    value: &Value,
    path: &Path,
    editable: bool,
    buffers: &mut EditBuffers,
    actions: &mut Vec<UiAction>,
) {
    let min = value.metadata_f64("min", 0.0);
    let max = value.metadata_f64("max", 100.0);
    let mut current = value.as_number().unwrap_or(0.0);

    let response = ui.add_enabled(editable, egui::Slider::new(&mut current, min..=max));
    if response.changed() {
        let payload = if current.fract() == 0.0 {
            Payload::Int(current as i64)
        } else {
            Payload::Float(current)
        };
        actions.push(UiAction::Write {
            path: path.clone(),
            value: value.with_payload(payload),
        });
    }
    numeric_compact(ui, value, path, editable, buffers, actions);

    let format = value
        .metadata
        .get("display_format")
        .and_then(|v| v.as_str())
        .unwrap_or("default")
        .to_string();
    egui::ComboBox::from_id_salt(path.to_string())
        .selected_text(&format)
        .show_ui(ui, |ui| {
            for option in ["default", "fraction", "percent"] {
                if ui
                    .selectable_label(format == option, option)
                    .clicked()
                {
                    actions.push(UiAction::SetMetadata {
                        path: path.clone(),
                        key: "display_format".to_string(),
                        value: serde_json::Value::String(option.to_string()),
                    });
                }
            }
        });
}

pub fn boolean(
    ui: &mut Ui,
    value: &Value,
    path: &Path,
    editable: bool,
    actions: &mut Vec<UiAction>,
) {
    let mut current = matches!(value.payload, Payload::Bool(true));
    let response = ui.add_enabled(editable, egui::Checkbox::without_text(&mut current));
    if response.changed() {
        actions.push(UiAction::Write {
            path: path.clone(),
            value: value.with_payload(Payload::Bool(current)),
        });
    }
}

/// Single- or multi-line text editor depending on expand state. Commits
/// on focus loss.
pub fn text(
    ui: &mut Ui,
    value: &Value,
    path: &Path,
    editable: bool,
    multiline: bool,
    buffers: &mut EditBuffers,
    actions: &mut Vec<UiAction>,
) {
    let stored = match &value.payload {
        Payload::Text(s) => s.clone(),
        _ => String::new(),
    };
    let key = path.to_string();
    let buffer = buffers.entry(key).or_insert_with(|| stored.clone());
    let response = if multiline {
        ui.add_enabled(editable, egui::TextEdit::multiline(buffer).desired_rows(4))
    } else {
        ui.add_enabled(editable, egui::TextEdit::singleline(buffer))
    };
    if response.lost_focus() {
        if *buffer != stored {
            actions.push(UiAction::Write {
                path: path.clone(),
                value: value.with_payload(Payload::Text(buffer.clone())),
            });
        }
    } else if !response.has_focus() {
        *buffer = stored;
    }
}

/// Compact media view: metadata summary only.
pub fn media_summary(ui: &mut Ui, value: &Value) {
    let Payload::Media(media) = &value.payload else {
        return;
    };
    ui.horizontal(|ui| {
        ui.label(media.filename.as_deref().unwrap_or("(unnamed)"));
        if let (Some(w), Some(h)) = (media.width, media.height) {
            ui.weak(format!("{w}×{h}"));
        }
        ui.weak(media.encoding.as_str());
        if media.cached {
            ui.weak("cached");
        }
    });
}

/// Expanded media view: preview plus upload dropzone.
pub fn media_expanded(
    ui: &mut Ui,
    value: &Value,
    path: &Path,
    editable: bool,
    actions: &mut Vec<UiAction>,
) {
    media_summary(ui, value);
    let Payload::Media(media) = &value.payload else {
        return;
    };
    let image = media.preview.as_ref().or(media.data.as_ref());
    match image {
        Some(b64) if media.encoding != MediaEncoding::Svg => {
            match base64::engine::general_purpose::STANDARD.decode(b64) {
                Ok(bytes) => {
                    // uri doubles as the texture cache key
                    let uri = format!("bytes://{}.{}", value.id, media.encoding.as_str());
                    ui.add(egui::Image::from_bytes(uri, bytes).max_width(220.0));
                }
                Err(err) => {
                    log::warn!("undecodable media payload: {err}");
                    ui.weak("preview unavailable");
                }
            }
        }
        Some(_) => {
            ui.weak("vector preview not shown");
        }
        None => {
            ui.weak("no preview");
        }
    }
    if editable && ui.button("Upload…").clicked() {
        actions.push(UiAction::PickMedia { path: path.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_variant_rederived_from_fraction() {
        assert_eq!(parse_numeric("4.5"), Payload::Float(4.5));
        assert_eq!(parse_numeric("4"), Payload::Int(4));
        assert_eq!(parse_numeric("4.0"), Payload::Int(4));
    }

    #[test]
    fn empty_or_garbage_input_resets_to_integer_zero() {
        assert_eq!(parse_numeric(""), Payload::Int(0));
        assert_eq!(parse_numeric("   "), Payload::Int(0));
        assert_eq!(parse_numeric("not a number"), Payload::Int(0));
    }

    #[test]
    fn unchanged_commit_writes_nothing() {
        let value = Value::float(2.5);
        assert!(numeric_commit(&value, "2.5").is_none());
        // same number, different spelling
        assert!(numeric_commit(&value, " 2.50 ").is_none());
    }

    #[test]
    fn changed_commit_replaces_value_and_identity() {
        let value = Value::float(2.5);
        let next = match numeric_commit(&value, "3") {
            Some(next) => next,
            None => panic!("edit should produce a write"),
        };
        assert_eq!(next.payload, Payload::Int(3));
        assert_ne!(next.id, value.id);
    }

    #[test]
    fn display_rounds_to_three_places_without_mutating() {
        let value = Value::float(1.23456789);
        assert_eq!(format_number(&value), "1.235");
        // stored precision untouched
        assert_eq!(value.payload, Payload::Float(1.23456789));
    }

    #[test]
    fn integer_display_has_no_decimals() {
        assert_eq!(format_number(&Value::int(4)), "4");
    }

    #[test]
    fn pruning_drops_only_the_removed_nodes_buffers() {
        let mut buffers = EditBuffers::new();
        buffers.insert("node-a/radius".to_string(), "1.5".to_string());
        buffers.insert("node-a/settings/taps/0".to_string(), "2".to_string());
        buffers.insert("node-ab/radius".to_string(), "7".to_string());
        buffers.insert("node-b/label".to_string(), "hello".to_string());

        prune_node(&mut buffers, &"node-a".to_string());

        assert!(!buffers.contains_key("node-a/radius"));
        assert!(!buffers.contains_key("node-a/settings/taps/0"));
        // a longer id sharing the prefix text is a different node
        assert!(buffers.contains_key("node-ab/radius"));
        assert!(buffers.contains_key("node-b/label"));
    }
}

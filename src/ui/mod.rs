//! Editor UI: recursive display/edit dispatch and the canvas surface
//!
//! Widgets never mutate the store while rendering; they emit [`UiAction`]s
//! that the application applies after layout, so a frame always renders
//! from one consistent snapshot.

pub mod canvas;
pub mod dispatch;
pub mod editors;

use crate::data::Value;
use crate::graph::{NodeId, Path};

/// Where a field is being shown. The same field keeps independent expand
/// state on the canvas node and in the side inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandContext {
    Node,
    Inspector,
}

/// Deferred store writes produced by the widgets.
#[derive(Debug)]
pub enum UiAction {
    /// Replace the value at a path
    Write { path: Path, value: Value },
    /// Set one metadata key at a path (display hints)
    SetMetadata {
        path: Path,
        key: String,
        value: serde_json::Value,
    },
    /// Flip `metadata.expanded` on a nested value
    ToggleExpanded { path: Path },
    /// Flip a field's context-specific expand flag
    ToggleFieldExpanded {
        node: NodeId,
        label: String,
        context: ExpandContext,
    },
    /// Drop a field's locally-held value entirely
    ClearValue { node: NodeId, label: String },
    /// Open a file picker and upload the chosen media file to this path
    PickMedia { path: Path },
}

//! Typed address paths into node field data
//!
//! A path locates a value inside the store as a node id followed by a
//! sequence of record keys and list indices. The sum type keeps dynamic
//! traversal honest: a missing segment is a typed miss, not a silent
//! `undefined` walk.

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step into a value tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    /// Named child: a field label at the root, a record key below
    Field(String),
    /// List index
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "{name}"),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Full address of a value: node id plus nested segments. The first
/// segment names the field; the rest descend into its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub node: NodeId,
    pub segments: Vec<PathSegment>,
}

impl Path {
    pub fn field(node: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            segments: vec![PathSegment::Field(label.into())],
        }
    }

    /// Extend with a record key.
    pub fn key(&self, name: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.segments.push(PathSegment::Field(name.into()));
        path
    }

    /// Extend with a list index.
    pub fn index(&self, i: usize) -> Self {
        let mut path = self.clone();
        path.segments.push(PathSegment::Index(i));
        path
    }

    /// Field label addressed by this path (the first segment).
    pub fn field_label(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)?;
        for seg in &self.segments {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_form() {
        let path = Path::field("n1", "image").key("strength").index(2);
        assert_eq!(path.to_string(), "n1/image/strength/2");
        assert_eq!(path.field_label(), Some("image"));
    }
}

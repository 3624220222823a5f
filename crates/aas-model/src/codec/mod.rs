//! Encoding and decoding of elements, trees and submodels.
//!
//! JSON supports four projections of the same element:
//!
//! - **Full**: metadata and value, recursively
//! - **Metadata**: metadata and per-variant type fields, no values or children
//! - **Value**: the bare value, keyed by idShort or positioned in arrays
//! - **Path**: the element's path followed by its descendants' paths
//!
//! XML carries the Full and Metadata projections.

pub mod json;
pub mod path_only;
pub mod primitives;
pub mod value_only;
pub mod xml;

use serde_json::Value;

use crate::error::EncodeError;
use crate::limits::MAX_DECODE_DEPTH;
use crate::model::ChildLayout;

pub use json::{
    decode_element, decode_element_with_options, decode_submodel, decode_submodel_with_options,
    decode_tree, element_from_json, element_to_json, encode_element, encode_element_with_options,
    encode_node, encode_submodel, encode_submodel_with_options, encode_tree,
};
pub use path_only::{element_paths, node_paths, submodel_paths, tree_paths};
pub use value_only::{decode_value_only, element_value, scope_from_json, scope_to_json};
pub use xml::{decode_element_xml, decode_submodel_xml, encode_element_xml, encode_submodel_xml};

/// Which part of an element is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Projection {
    #[default]
    Full,
    Metadata,
    Value,
    Path,
}

impl Projection {
    pub fn name(self) -> &'static str {
        match self {
            Projection::Full => "Full",
            Projection::Metadata => "Metadata",
            Projection::Value => "Value",
            Projection::Path => "Path",
        }
    }
}

/// How far the Value and Path projections descend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Depth {
    /// The element and its immediate children.
    Core,
    /// The whole subtree.
    #[default]
    Deep,
}

impl Depth {
    /// Number of container levels below the root that are expanded.
    pub(crate) fn levels(self) -> usize {
        match self {
            Depth::Core => 1,
            Depth::Deep => usize::MAX,
        }
    }
}

/// Options for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOptions {
    pub projection: Projection,
    /// Ignored by the Full and Metadata projections.
    pub depth: Depth,
    /// Indent the output.
    pub pretty: bool,
}

impl EncodeOptions {
    /// Creates default options: Full projection, Deep, compact.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata() -> Self {
        Self::new().with_projection(Projection::Metadata)
    }

    pub fn value_only() -> Self {
        Self::new().with_projection(Projection::Value)
    }

    pub fn path_only() -> Self {
        Self::new().with_projection(Projection::Path)
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

/// Options for decoding Full and Metadata documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// `Metadata` tolerates missing value fields and ignores present ones.
    pub projection: Projection,
    /// Maximum element nesting depth.
    pub max_depth: usize,
    /// Top-level layout of trees built by `decode_tree`.
    pub root_layout: ChildLayout,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            projection: Projection::Full,
            max_depth: MAX_DECODE_DEPTH,
            root_layout: ChildLayout::Keyed,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata() -> Self {
        Self {
            projection: Projection::Metadata,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Decode trees with an ordered top level, as written for
    /// [`ElementTree::ordered`](crate::ElementTree::ordered) trees.
    pub fn ordered(mut self) -> Self {
        self.root_layout = ChildLayout::Ordered;
        self
    }

    pub(crate) fn is_metadata(&self) -> bool {
        self.projection == Projection::Metadata
    }
}

pub(crate) fn write_json(value: &Value, pretty: bool) -> Result<String, EncodeError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    text.map_err(|e| EncodeError::Json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_builders() {
        let options = EncodeOptions::value_only().with_depth(Depth::Core).pretty();
        assert_eq!(options.projection, Projection::Value);
        assert_eq!(options.depth, Depth::Core);
        assert!(options.pretty);

        assert_eq!(EncodeOptions::new().projection, Projection::Full);
        assert_eq!(EncodeOptions::new().depth, Depth::Deep);
        assert_eq!(DecodeOptions::new().max_depth, MAX_DECODE_DEPTH);
        assert!(DecodeOptions::metadata().with_max_depth(3).is_metadata());
        assert_eq!(DecodeOptions::new().root_layout, ChildLayout::Keyed);
        assert_eq!(DecodeOptions::new().ordered().root_layout, ChildLayout::Ordered);
    }
}

//! Submodel element trees for asset administration shells.
//!
//! This crate holds the element tree of a digital-twin submodel, addresses
//! its nodes by path, and encodes elements in four projections.
//!
//! # Overview
//!
//! - **Closed variant set**: every element is one of fourteen kinds
//!   (Property, Range, SubmodelElementCollection, SubmodelElementList, ...)
//! - **Path addressing**: `Motor.Phases[2].Voltage` walks keyed containers
//!   by idShort and Lists by position
//! - **Projections**: Full, Metadata, Value-only and Path-only JSON, plus
//!   Full and Metadata XML
//! - **Live values**: a node can be bound to a `ValueSource` that is read and
//!   written whenever its value is accessed
//!
//! # Quick Start
//!
//! ```rust
//! use aas_model::{ElementTree, SubmodelElement};
//! use aas_model::codec::{encode_node, EncodeOptions};
//!
//! let mut tree = ElementTree::new();
//! tree.create(SubmodelElement::collection("Coordinates", |c| {
//!     c.property("x", 1.0).property("y", 2.0)
//! }))
//! .unwrap();
//!
//! let node = tree.retrieve("Coordinates").unwrap();
//! let json = encode_node(node, &EncodeOptions::value_only()).unwrap();
//! assert_eq!(json, r#"{"x":1.0,"y":2.0}"#);
//!
//! assert!(tree.has_child_path("Coordinates.x"));
//! ```
//!
//! # Modules
//!
//! - [`model`]: Element variants, metadata, references and value scopes
//! - [`container`]: The mutable element tree, paths and change events
//! - [`codec`]: JSON and XML encoding and decoding
//! - [`validate`]: Structural validation of detached elements
//! - [`error`]: Error types
//! - [`limits`]: Decoder and path limits
//!
//! # Decoding untrusted input
//!
//! Nesting depth is bounded by `DecodeOptions::max_depth`, numbers are parsed
//! from their exact source text, and unknown `modelType` tags are rejected
//! rather than defaulted.

pub mod codec;
pub mod container;
pub mod error;
pub mod limits;
pub mod model;
pub mod util;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{
    decode_element, decode_submodel, decode_value_only, encode_element, encode_submodel, Depth,
    DecodeOptions, EncodeOptions, Projection,
};
pub use container::{
    ChangeEvent, ChangeKind, ChangeListener, ElementPath, ElementTree, ListenerId, NodeId, NodeRef,
    PathSegment,
};
pub use error::{
    ContainerError, DecodeError, DecodeErrorKind, EncodeError, ErrorKind, PathError,
    ValidationError, ValueError,
};
pub use model::{
    DataType, ElementKind, ElementMeta, ModelType, PrimitiveValue, Reference, Submodel,
    SubmodelElement, ValueScope, ValueSource,
};
pub use validate::{validate_element, validate_submodel};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

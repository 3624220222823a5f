//! Error types for the element tree, value conversion, paths and codecs.

use thiserror::Error;

use crate::model::{DataType, ModelType};

/// Classification of tree operation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An element with the same idShort already exists at the target level.
    Conflict,
    /// The path (or a typed lookup) did not resolve.
    NotFound,
    /// Caller bug: malformed path, missing idShort, unusable argument.
    InvalidArgument,
    /// A value is incompatible with the declared type or element shape.
    TypeMismatch,
    /// A bound value source failed.
    Source,
}

impl ErrorKind {
    /// Returns a short, stable identifier for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not-found",
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::TypeMismatch => "type-mismatch",
            ErrorKind::Source => "source",
        }
    }
}

/// Error parsing an element path such as `a.b[2].c`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("empty segment at offset {offset}")]
    EmptySegment { offset: usize },

    #[error("invalid list index {token:?} at offset {offset}")]
    InvalidIndex { token: String, offset: usize },

    #[error("unclosed '[' at offset {offset}")]
    UnclosedBracket { offset: usize },

    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedCharacter { ch: char, offset: usize },

    #[error("path has more than {max} segments")]
    TooManySegments { max: usize },
}

/// Error converting or assigning a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("{text:?} is not a valid {data_type} value")]
    TypeMismatch { data_type: DataType, text: String },

    #[error("{found} value does not fit valueType {expected}")]
    DataTypeMismatch { expected: DataType, found: DataType },

    #[error("{found} value scope does not fit a {expected} element")]
    ShapeMismatch {
        expected: ModelType,
        found: &'static str,
    },

    #[error("{model_type} elements carry no value")]
    NoValue { model_type: ModelType },

    #[error("no member {key:?} in value scope target")]
    UnknownMember { key: String },

    #[error("list value has {found} items, element has {expected}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("language {language:?} appears more than once")]
    DuplicateLanguage { language: String },

    #[error("value source failed: {0}")]
    Source(String),
}

/// Error during structural validation of an element.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("idShort {id_short:?} is invalid: {reason}")]
    InvalidIdShort {
        id_short: String,
        reason: &'static str,
    },

    #[error("{model_type} inside {scope:?} needs an idShort")]
    MissingIdShort { scope: String, model_type: ModelType },

    #[error("duplicate idShort {id_short:?} inside {scope:?}")]
    DuplicateIdShort { scope: String, id_short: String },

    #[error("{id_short:?}: {source}")]
    Value {
        id_short: String,
        #[source]
        source: ValueError,
    },

    #[error("list {id_short:?} holds {expected} elements, found {found}")]
    ListElementMismatch {
        id_short: String,
        expected: ModelType,
        found: ModelType,
    },

    #[error("duplicate language {language:?} in {id_short:?}")]
    DuplicateLanguage { id_short: String, language: String },

    #[error("annotation {annotation:?} of {owner:?} is a {found}, not a data element")]
    AnnotationNotDataElement {
        owner: String,
        annotation: String,
        found: ModelType,
    },
}

impl ValidationError {
    /// Maps the validation failure onto the tree error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::DuplicateIdShort { .. } => ErrorKind::Conflict,
            ValidationError::InvalidIdShort { .. }
            | ValidationError::MissingIdShort { .. }
            | ValidationError::DuplicateLanguage { .. } => ErrorKind::InvalidArgument,
            ValidationError::Value { .. }
            | ValidationError::ListElementMismatch { .. }
            | ValidationError::AnnotationNotDataElement { .. } => ErrorKind::TypeMismatch,
        }
    }
}

/// Failure of an element tree operation.
///
/// Business outcomes (conflict, missing path, type mismatch) and caller bugs
/// (malformed path, missing idShort) share one type; [`ContainerError::kind`]
/// tells them apart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContainerError {
    #[error("element {id_short:?} already exists in {scope:?}")]
    Conflict { scope: String, id_short: String },

    #[error("no element at path {path:?}")]
    NotFound { path: String },

    #[error("element at {path:?} is a {found}, not a {expected}")]
    VariantNotFound {
        path: String,
        expected: ModelType,
        found: ModelType,
    },

    #[error("element at {path:?} is a {found}, which holds no child elements")]
    NotAContainer { path: String, found: ModelType },

    #[error("invalid path {path:?}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: PathError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("value at {path:?} rejected: {source}")]
    Value {
        path: String,
        #[source]
        source: ValueError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("value source at {path:?} failed: {message}")]
    Source { path: String, message: String },
}

impl ContainerError {
    /// Maps the error onto the tree error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContainerError::Conflict { .. } => ErrorKind::Conflict,
            ContainerError::NotFound { .. }
            | ContainerError::VariantNotFound { .. }
            | ContainerError::NotAContainer { .. } => ErrorKind::NotFound,
            ContainerError::InvalidPath { .. } | ContainerError::InvalidArgument(_) => {
                ErrorKind::InvalidArgument
            }
            ContainerError::Value { source, .. } => match source {
                ValueError::Source(_) => ErrorKind::Source,
                _ => ErrorKind::TypeMismatch,
            },
            ContainerError::Validation(e) => e.kind(),
            ContainerError::Source { .. } => ErrorKind::Source,
        }
    }

    /// Returns true for caller bugs rather than business outcomes.
    pub fn is_programmer_error(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }
}

/// Classification of decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    MissingField,
    UnknownVariant,
    MalformedStructure,
    TypeMismatch,
    /// The input is not well-formed JSON or XML.
    Syntax,
}

/// Error while decoding JSON or XML into elements.
///
/// `field` is the location of the offending field, e.g. `$.value[1].modelType`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("missing required field {field}")]
    MissingField { field: String },

    #[error("unknown modelType {tag:?} at {field}")]
    UnknownVariant { field: String, tag: String },

    #[error("malformed structure at {field}: {reason}")]
    MalformedStructure { field: String, reason: String },

    #[error("{field} expects {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("nesting at {field} exceeds maximum depth {max}")]
    DepthExceeded { field: String, max: usize },

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("invalid XML: {0}")]
    Xml(String),
}

impl DecodeError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::MissingField { .. } => DecodeErrorKind::MissingField,
            DecodeError::UnknownVariant { .. } => DecodeErrorKind::UnknownVariant,
            DecodeError::MalformedStructure { .. } | DecodeError::DepthExceeded { .. } => {
                DecodeErrorKind::MalformedStructure
            }
            DecodeError::TypeMismatch { .. } => DecodeErrorKind::TypeMismatch,
            DecodeError::Json(_) | DecodeError::Xml(_) => DecodeErrorKind::Syntax,
        }
    }

    /// Returns the offending field location, if the error has one.
    pub fn field(&self) -> Option<&str> {
        match self {
            DecodeError::MissingField { field }
            | DecodeError::UnknownVariant { field, .. }
            | DecodeError::MalformedStructure { field, .. }
            | DecodeError::TypeMismatch { field, .. }
            | DecodeError::DepthExceeded { field, .. } => Some(field),
            DecodeError::Json(_) | DecodeError::Xml(_) => None,
        }
    }
}

/// Error during encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("the {projection} projection has no XML form")]
    UnsupportedProjection { projection: &'static str },

    #[error("XML writer failed: {0}")]
    Xml(String),

    #[error("JSON serialization failed: {0}")]
    Json(String),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

//! Data model for submodel element trees.
//!
//! - Primitive data types and their native values
//! - References and keys
//! - Element metadata (descriptions, qualifiers, semantic ids)
//! - The closed set of element variants
//! - Value scopes and live value sources
//! - Builders for ergonomic construction

/// Declares a closed enum with a fixed wire name per variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the wire name.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            /// Parses a wire name.
            pub fn from_name(name: &str) -> Option<$name> {
                match name {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

pub mod builder;
pub mod data_type;
pub mod element;
pub mod meta;
pub mod reference;
pub mod scope;
pub mod source;
pub mod submodel;

pub use builder::{CollectionBuilder, ListBuilder};
pub use data_type::{DataType, PrimitiveValue};
pub use element::{
    AnnotatedRelationshipElement, BasicEventElement, Blob, Capability, ChildLayout, Direction, ElementKind,
    ElementVariant, Entity, EntityType, File, ModelType, MultiLanguageProperty, Operation,
    OperationVariable, Property, Range, ReferenceElement, RelationshipElement, SpecificAssetId,
    StateOfEvent, SubmodelElement, SubmodelElementCollection, SubmodelElementList,
};
pub use meta::{ElementMeta, LangString, LangStringSet, ModellingKind, Qualifier, QualifierKind};
pub use reference::{Key, KeyType, Reference, ReferenceType};
pub use scope::ValueScope;
pub use source::{ComputedValue, MemoryValue, ValueSource};
pub use submodel::Submodel;

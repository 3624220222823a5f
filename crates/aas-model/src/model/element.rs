//! The closed set of submodel element variants.
//!
//! Every element is a [`SubmodelElement`]: shared [`ElementMeta`] plus one
//! [`ElementKind`] payload. Container variants (Collection, List, Entity and
//! AnnotatedRelationshipElement) own their children inline; once an element
//! is inserted into an [`ElementTree`](crate::container::ElementTree) the
//! children move into the arena and the inline vector is left empty.

use chrono::{DateTime, FixedOffset};

use crate::model::data_type::{DataType, PrimitiveValue};
use crate::model::meta::{ElementMeta, LangStringSet};
use crate::model::reference::{KeyType, Reference};
use crate::util::XsdDuration;

wire_enum! {
    /// Variant tag, written as `modelType` in JSON.
    pub enum ModelType {
        Property => "Property",
        Range => "Range",
        MultiLanguageProperty => "MultiLanguageProperty",
        File => "File",
        Blob => "Blob",
        ReferenceElement => "ReferenceElement",
        RelationshipElement => "RelationshipElement",
        AnnotatedRelationshipElement => "AnnotatedRelationshipElement",
        SubmodelElementCollection => "SubmodelElementCollection",
        SubmodelElementList => "SubmodelElementList",
        Operation => "Operation",
        Entity => "Entity",
        BasicEventElement => "BasicEventElement",
        Capability => "Capability",
    }
}

impl ModelType {
    /// Returns the XML element name (`submodelElementCollection`).
    pub fn xml_tag(self) -> &'static str {
        match self {
            ModelType::Property => "property",
            ModelType::Range => "range",
            ModelType::MultiLanguageProperty => "multiLanguageProperty",
            ModelType::File => "file",
            ModelType::Blob => "blob",
            ModelType::ReferenceElement => "referenceElement",
            ModelType::RelationshipElement => "relationshipElement",
            ModelType::AnnotatedRelationshipElement => "annotatedRelationshipElement",
            ModelType::SubmodelElementCollection => "submodelElementCollection",
            ModelType::SubmodelElementList => "submodelElementList",
            ModelType::Operation => "operation",
            ModelType::Entity => "entity",
            ModelType::BasicEventElement => "basicEventElement",
            ModelType::Capability => "capability",
        }
    }

    pub fn from_xml_tag(tag: &str) -> Option<ModelType> {
        ModelType::ALL.iter().copied().find(|t| t.xml_tag() == tag)
    }

    /// Data elements carry a single value and may appear as annotations.
    pub fn is_data_element(self) -> bool {
        matches!(
            self,
            ModelType::Property
                | ModelType::Range
                | ModelType::MultiLanguageProperty
                | ModelType::File
                | ModelType::Blob
                | ModelType::ReferenceElement
        )
    }

    /// Returns the key type used when this element appears in a reference.
    pub fn key_type(self) -> KeyType {
        match self {
            ModelType::Property => KeyType::Property,
            ModelType::Range => KeyType::Range,
            ModelType::MultiLanguageProperty => KeyType::MultiLanguageProperty,
            ModelType::File => KeyType::File,
            ModelType::Blob => KeyType::Blob,
            ModelType::ReferenceElement => KeyType::ReferenceElement,
            ModelType::RelationshipElement => KeyType::RelationshipElement,
            ModelType::AnnotatedRelationshipElement => KeyType::AnnotatedRelationshipElement,
            ModelType::SubmodelElementCollection => KeyType::SubmodelElementCollection,
            ModelType::SubmodelElementList => KeyType::SubmodelElementList,
            ModelType::Operation => KeyType::Operation,
            ModelType::Entity => KeyType::Entity,
            ModelType::BasicEventElement => KeyType::BasicEventElement,
            ModelType::Capability => KeyType::Capability,
        }
    }
}

/// How a container addresses its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildLayout {
    /// Addressed by idShort.
    Keyed,
    /// Addressed by zero-based position.
    Ordered,
}

// =============================================================================
// DATA ELEMENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub value_type: DataType,
    pub value: Option<PrimitiveValue>,
    pub value_id: Option<Reference>,
}

impl Default for Property {
    fn default() -> Self {
        Self {
            value_type: DataType::String,
            value: None,
            value_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub value_type: DataType,
    pub min: Option<PrimitiveValue>,
    pub max: Option<PrimitiveValue>,
}

impl Default for Range {
    fn default() -> Self {
        Self {
            value_type: DataType::Double,
            min: None,
            max: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiLanguageProperty {
    pub value: LangStringSet,
    pub value_id: Option<Reference>,
}

/// A file reference: a path or URI plus its MIME type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct File {
    pub content_type: String,
    pub value: Option<String>,
}

/// Inline binary content. Base64 on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Blob {
    pub content_type: String,
    pub value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceElement {
    pub value: Option<Reference>,
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationshipElement {
    pub first: Reference,
    pub second: Reference,
}

/// A relationship carrying data element annotations, keyed by idShort.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotatedRelationshipElement {
    pub first: Reference,
    pub second: Reference,
    pub annotations: Vec<SubmodelElement>,
}

// =============================================================================
// CONTAINERS
// =============================================================================

/// Keyed container: children addressed by idShort.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmodelElementCollection {
    pub value: Vec<SubmodelElement>,
}

/// Ordered container: children addressed by position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmodelElementList {
    /// Variant every child must have. None accepts any variant.
    pub type_value_list_element: Option<ModelType>,
    /// Value type every Property/Range child must declare.
    pub value_type_list_element: Option<DataType>,
    pub order_relevant: Option<bool>,
    pub semantic_id_list_element: Option<Reference>,
    pub value: Vec<SubmodelElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationVariable {
    pub value: SubmodelElement,
}

/// An invocable operation. Holds variable declarations, never a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Operation {
    pub input_variables: Vec<OperationVariable>,
    pub output_variables: Vec<OperationVariable>,
    pub inoutput_variables: Vec<OperationVariable>,
}

wire_enum! {
    pub enum EntityType {
        CoManagedEntity => "CoManagedEntity",
        SelfManagedEntity => "SelfManagedEntity",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecificAssetId {
    pub name: String,
    pub value: String,
    pub external_subject_id: Option<Reference>,
}

impl SpecificAssetId {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            external_subject_id: None,
        }
    }
}

/// An asset with keyed statements about it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    pub entity_type: Option<EntityType>,
    pub global_asset_id: Option<String>,
    pub specific_asset_ids: Vec<SpecificAssetId>,
    pub statements: Vec<SubmodelElement>,
}

// =============================================================================
// EVENTS AND CAPABILITIES
// =============================================================================

wire_enum! {
    pub enum Direction {
        Input => "input",
        Output => "output",
    }
}

wire_enum! {
    pub enum StateOfEvent {
        On => "on",
        Off => "off",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicEventElement {
    pub observed: Reference,
    pub direction: Direction,
    pub state: StateOfEvent,
    pub message_topic: Option<String>,
    pub message_broker: Option<Reference>,
    pub last_update: Option<DateTime<FixedOffset>>,
    pub min_interval: Option<XsdDuration>,
    pub max_interval: Option<XsdDuration>,
}

impl Default for BasicEventElement {
    fn default() -> Self {
        Self {
            observed: Reference::default(),
            direction: Direction::Output,
            state: StateOfEvent::Off,
            message_topic: None,
            message_broker: None,
            last_update: None,
            min_interval: None,
            max_interval: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capability;

// =============================================================================
// ELEMENT
// =============================================================================

/// Variant payload of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Property(Property),
    Range(Range),
    MultiLanguageProperty(MultiLanguageProperty),
    File(File),
    Blob(Blob),
    ReferenceElement(ReferenceElement),
    RelationshipElement(RelationshipElement),
    AnnotatedRelationshipElement(AnnotatedRelationshipElement),
    SubmodelElementCollection(SubmodelElementCollection),
    SubmodelElementList(SubmodelElementList),
    Operation(Operation),
    Entity(Entity),
    BasicEventElement(BasicEventElement),
    Capability(Capability),
}

impl ElementKind {
    pub fn model_type(&self) -> ModelType {
        match self {
            ElementKind::Property(_) => ModelType::Property,
            ElementKind::Range(_) => ModelType::Range,
            ElementKind::MultiLanguageProperty(_) => ModelType::MultiLanguageProperty,
            ElementKind::File(_) => ModelType::File,
            ElementKind::Blob(_) => ModelType::Blob,
            ElementKind::ReferenceElement(_) => ModelType::ReferenceElement,
            ElementKind::RelationshipElement(_) => ModelType::RelationshipElement,
            ElementKind::AnnotatedRelationshipElement(_) => {
                ModelType::AnnotatedRelationshipElement
            }
            ElementKind::SubmodelElementCollection(_) => ModelType::SubmodelElementCollection,
            ElementKind::SubmodelElementList(_) => ModelType::SubmodelElementList,
            ElementKind::Operation(_) => ModelType::Operation,
            ElementKind::Entity(_) => ModelType::Entity,
            ElementKind::BasicEventElement(_) => ModelType::BasicEventElement,
            ElementKind::Capability(_) => ModelType::Capability,
        }
    }

    /// Returns the child layout for container variants, None for leaves.
    pub fn child_layout(&self) -> Option<ChildLayout> {
        match self {
            ElementKind::SubmodelElementCollection(_)
            | ElementKind::Entity(_)
            | ElementKind::AnnotatedRelationshipElement(_) => Some(ChildLayout::Keyed),
            ElementKind::SubmodelElementList(_) => Some(ChildLayout::Ordered),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&Vec<SubmodelElement>> {
        match self {
            ElementKind::SubmodelElementCollection(c) => Some(&c.value),
            ElementKind::SubmodelElementList(l) => Some(&l.value),
            ElementKind::Entity(e) => Some(&e.statements),
            ElementKind::AnnotatedRelationshipElement(a) => Some(&a.annotations),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<SubmodelElement>> {
        match self {
            ElementKind::SubmodelElementCollection(c) => Some(&mut c.value),
            ElementKind::SubmodelElementList(l) => Some(&mut l.value),
            ElementKind::Entity(e) => Some(&mut e.statements),
            ElementKind::AnnotatedRelationshipElement(a) => Some(&mut a.annotations),
            _ => None,
        }
    }

    /// Moves the inline children out, leaving an empty vector.
    pub fn take_children(&mut self) -> Option<Vec<SubmodelElement>> {
        self.children_mut().map(std::mem::take)
    }
}

/// A submodel element: metadata plus variant payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmodelElement {
    pub meta: ElementMeta,
    pub kind: ElementKind,
}

impl SubmodelElement {
    pub fn new(id_short: impl Into<String>, kind: impl Into<ElementKind>) -> Self {
        Self {
            meta: ElementMeta::with_id_short(id_short),
            kind: kind.into(),
        }
    }

    /// Creates an element without idShort, as used for List children.
    pub fn unnamed(kind: impl Into<ElementKind>) -> Self {
        Self {
            meta: ElementMeta::default(),
            kind: kind.into(),
        }
    }

    pub fn id_short(&self) -> Option<&str> {
        self.meta.id_short.as_deref()
    }

    pub fn model_type(&self) -> ModelType {
        self.kind.model_type()
    }

    pub fn children(&self) -> Option<&Vec<SubmodelElement>> {
        self.kind.children()
    }

    /// Returns the payload if it is variant `T`.
    pub fn as_variant<T: ElementVariant>(&self) -> Option<&T> {
        T::from_kind(&self.kind)
    }

    pub fn as_variant_mut<T: ElementVariant>(&mut self) -> Option<&mut T> {
        T::from_kind_mut(&mut self.kind)
    }

    /// Number of elements in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children()
            .map(|c| c.iter().map(SubmodelElement::subtree_len).sum())
            .unwrap_or(0)
    }
}

/// Typed access to one variant payload.
pub trait ElementVariant: Sized + Into<ElementKind> {
    const MODEL_TYPE: ModelType;

    fn from_kind(kind: &ElementKind) -> Option<&Self>;

    fn from_kind_mut(kind: &mut ElementKind) -> Option<&mut Self>;

    /// Unwraps the payload, handing the kind back on mismatch.
    fn from_kind_owned(kind: ElementKind) -> Result<Self, ElementKind>;
}

macro_rules! element_variants {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl ElementVariant for $variant {
                const MODEL_TYPE: ModelType = ModelType::$variant;

                fn from_kind(kind: &ElementKind) -> Option<&Self> {
                    match kind {
                        ElementKind::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn from_kind_mut(kind: &mut ElementKind) -> Option<&mut Self> {
                    match kind {
                        ElementKind::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn from_kind_owned(kind: ElementKind) -> Result<Self, ElementKind> {
                    match kind {
                        ElementKind::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }

            impl From<$variant> for ElementKind {
                fn from(v: $variant) -> Self {
                    ElementKind::$variant(v)
                }
            }
        )+
    };
}

element_variants!(
    Property,
    Range,
    MultiLanguageProperty,
    File,
    Blob,
    ReferenceElement,
    RelationshipElement,
    AnnotatedRelationshipElement,
    SubmodelElementCollection,
    SubmodelElementList,
    Operation,
    Entity,
    BasicEventElement,
    Capability,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_names() {
        for t in ModelType::ALL {
            assert_eq!(ModelType::from_name(t.name()), Some(*t));
            assert_eq!(ModelType::from_xml_tag(t.xml_tag()), Some(*t));
            assert_eq!(t.key_type().name(), t.name());
        }
        assert_eq!(ModelType::ALL.len(), 14);
        assert_eq!(ModelType::from_name("Submodel"), None);
    }

    #[test]
    fn test_child_layout() {
        let list: ElementKind = SubmodelElementList::default().into();
        assert_eq!(list.child_layout(), Some(ChildLayout::Ordered));
        let entity: ElementKind = Entity::default().into();
        assert_eq!(entity.child_layout(), Some(ChildLayout::Keyed));
        let op: ElementKind = Operation::default().into();
        assert_eq!(op.child_layout(), None);
        assert!(op.children().is_none());
    }

    #[test]
    fn test_typed_access() {
        let mut e = SubmodelElement::new("Speed", Property::default());
        assert!(e.as_variant::<Property>().is_some());
        assert!(e.as_variant::<Range>().is_none());
        e.as_variant_mut::<Property>().unwrap().value = Some(1.5.into());
        assert_eq!(
            e.as_variant::<Property>().unwrap().value,
            Some(PrimitiveValue::Double(1.5))
        );

        let kind = e.kind.clone();
        assert!(Range::from_kind_owned(kind.clone()).is_err());
        assert!(Property::from_kind_owned(kind).is_ok());
    }

    #[test]
    fn test_take_children_leaves_empty() {
        let mut c = SubmodelElement::new(
            "C",
            SubmodelElementCollection {
                value: vec![
                    SubmodelElement::new("a", Property::default()),
                    SubmodelElement::new("b", Capability),
                ],
            },
        );
        assert_eq!(c.subtree_len(), 3);
        let taken = c.kind.take_children().unwrap();
        assert_eq!(taken.len(), 2);
        assert!(c.children().unwrap().is_empty());
    }
}

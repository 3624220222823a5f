//! Builder API for ergonomic element construction.
//!
//! # Example
//!
//! ```rust
//! use aas_model::model::SubmodelElement;
//!
//! let coordinates = SubmodelElement::collection("Coordinates", |c| c
//!     .property("x", 1.0)
//!     .property("y", 2.0)
//! );
//! let readings = SubmodelElement::list("Readings", |l| l
//!     .value(20.5)
//!     .value(21.0)
//! );
//! assert_eq!(coordinates.children().unwrap().len(), 2);
//! assert_eq!(readings.children().unwrap().len(), 2);
//! ```

use crate::model::data_type::{DataType, PrimitiveValue};
use crate::model::element::{
    Blob, Capability, Entity, EntityType, File, ModelType, MultiLanguageProperty, Operation,
    Property, Range, ReferenceElement, RelationshipElement, SubmodelElement,
    SubmodelElementCollection, SubmodelElementList,
};
use crate::model::meta::{LangStringSet, ModellingKind, Qualifier};
use crate::model::reference::Reference;

impl SubmodelElement {
    // =========================================================================
    // Leaf constructors
    // =========================================================================

    /// A Property whose valueType follows the value.
    pub fn property(id_short: impl Into<String>, value: impl Into<PrimitiveValue>) -> Self {
        let value = value.into();
        Self::new(
            id_short,
            Property {
                value_type: value.data_type(),
                value: Some(value),
                value_id: None,
            },
        )
    }

    /// A Property with a declared type and no value yet.
    pub fn typed_property(id_short: impl Into<String>, value_type: DataType) -> Self {
        Self::new(
            id_short,
            Property {
                value_type,
                value: None,
                value_id: None,
            },
        )
    }

    pub fn range(
        id_short: impl Into<String>,
        value_type: DataType,
        min: Option<PrimitiveValue>,
        max: Option<PrimitiveValue>,
    ) -> Self {
        Self::new(id_short, Range { value_type, min, max })
    }

    pub fn multi_language(id_short: impl Into<String>, value: LangStringSet) -> Self {
        Self::new(
            id_short,
            MultiLanguageProperty {
                value,
                value_id: None,
            },
        )
    }

    pub fn file(
        id_short: impl Into<String>,
        content_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(
            id_short,
            File {
                content_type: content_type.into(),
                value: Some(value.into()),
            },
        )
    }

    pub fn blob(id_short: impl Into<String>, content_type: impl Into<String>, value: Vec<u8>) -> Self {
        Self::new(
            id_short,
            Blob {
                content_type: content_type.into(),
                value: Some(value),
            },
        )
    }

    pub fn reference_element(id_short: impl Into<String>, value: Reference) -> Self {
        Self::new(id_short, ReferenceElement { value: Some(value) })
    }

    pub fn relationship(id_short: impl Into<String>, first: Reference, second: Reference) -> Self {
        Self::new(id_short, RelationshipElement { first, second })
    }

    pub fn operation(id_short: impl Into<String>) -> Self {
        Self::new(id_short, Operation::default())
    }

    pub fn capability(id_short: impl Into<String>) -> Self {
        Self::new(id_short, Capability)
    }

    // =========================================================================
    // Container constructors
    // =========================================================================

    /// A Collection whose children are added by a builder function.
    pub fn collection<F>(id_short: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(CollectionBuilder) -> CollectionBuilder,
    {
        let builder = f(CollectionBuilder::new());
        Self::new(
            id_short,
            SubmodelElementCollection {
                value: builder.elements,
            },
        )
    }

    /// A List whose children are added by a builder function.
    pub fn list<F>(id_short: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(ListBuilder) -> ListBuilder,
    {
        Self::new(id_short, f(ListBuilder::new()).build())
    }

    /// An Entity whose statements are added by a builder function.
    pub fn entity<F>(id_short: impl Into<String>, entity_type: EntityType, f: F) -> Self
    where
        F: FnOnce(CollectionBuilder) -> CollectionBuilder,
    {
        let builder = f(CollectionBuilder::new());
        Self::new(
            id_short,
            Entity {
                entity_type: Some(entity_type),
                statements: builder.elements,
                ..Entity::default()
            },
        )
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.meta.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        self.meta.description.insert(language, text);
        self
    }

    pub fn with_display_name(
        mut self,
        language: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.meta.display_name.insert(language, text);
        self
    }

    pub fn with_semantic_id(mut self, semantic_id: Reference) -> Self {
        self.meta.semantic_id = Some(semantic_id);
        self
    }

    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.meta.qualifiers.push(qualifier);
        self
    }

    pub fn with_kind(mut self, kind: ModellingKind) -> Self {
        self.meta.kind = Some(kind);
        self
    }
}

/// Builder for the children of a keyed container.
#[derive(Debug, Clone, Default)]
pub struct CollectionBuilder {
    elements: Vec<SubmodelElement>,
}

impl CollectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(mut self, element: SubmodelElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn property(self, id_short: impl Into<String>, value: impl Into<PrimitiveValue>) -> Self {
        self.element(SubmodelElement::property(id_short, value))
    }

    pub fn collection<F>(self, id_short: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(CollectionBuilder) -> CollectionBuilder,
    {
        self.element(SubmodelElement::collection(id_short, f))
    }

    pub fn list<F>(self, id_short: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(ListBuilder) -> ListBuilder,
    {
        self.element(SubmodelElement::list(id_short, f))
    }

    pub fn build(self) -> Vec<SubmodelElement> {
        self.elements
    }
}

/// Builder for a List and its positional children.
#[derive(Debug, Clone, Default)]
pub struct ListBuilder {
    list: SubmodelElementList,
}

impl ListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts children to one variant.
    pub fn type_value(mut self, model_type: ModelType) -> Self {
        self.list.type_value_list_element = Some(model_type);
        self
    }

    /// Restricts Property/Range children to one value type.
    pub fn value_type(mut self, data_type: DataType) -> Self {
        self.list.value_type_list_element = Some(data_type);
        self
    }

    pub fn order_relevant(mut self, order_relevant: bool) -> Self {
        self.list.order_relevant = Some(order_relevant);
        self
    }

    pub fn element(mut self, element: SubmodelElement) -> Self {
        self.list.value.push(element);
        self
    }

    /// Appends an unnamed Property.
    pub fn value(self, value: impl Into<PrimitiveValue>) -> Self {
        let value = value.into();
        self.element(SubmodelElement::unnamed(Property {
            value_type: value.data_type(),
            value: Some(value),
            value_id: None,
        }))
    }

    /// Appends an unnamed Collection.
    pub fn collection<F>(self, f: F) -> Self
    where
        F: FnOnce(CollectionBuilder) -> CollectionBuilder,
    {
        let builder = f(CollectionBuilder::new());
        self.element(SubmodelElement::unnamed(SubmodelElementCollection {
            value: builder.elements,
        }))
    }

    pub fn build(self) -> SubmodelElementList {
        self.list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_builders() {
        let e = SubmodelElement::collection("Motor", |c| {
            c.property("Speed", 1500_i32)
                .collection("Coordinates", |c| c.property("x", 1.0).property("y", 2.0))
                .list("Readings", |l| l.type_value(ModelType::Property).value(1.5).value(2.5))
        })
        .with_description("en", "Main drive")
        .with_kind(ModellingKind::Instance);

        assert_eq!(e.subtree_len(), 1 + 1 + 3 + 3);
        assert_eq!(e.meta.description.get("en"), Some("Main drive"));
        let speed = e.children().unwrap()[0].as_variant::<Property>().unwrap();
        assert_eq!(speed.value_type, DataType::Int);
        let readings = e.children().unwrap()[2]
            .as_variant::<SubmodelElementList>()
            .unwrap();
        assert_eq!(readings.type_value_list_element, Some(ModelType::Property));
        assert!(readings.value.iter().all(|c| c.id_short().is_none()));
    }

    #[test]
    fn test_typed_property_has_no_value() {
        let e = SubmodelElement::typed_property("Temp", DataType::Double);
        let p = e.as_variant::<Property>().unwrap();
        assert_eq!(p.value_type, DataType::Double);
        assert!(p.value.is_none());
    }
}

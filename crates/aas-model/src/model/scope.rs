//! Value scopes: the runtime value of an element without its metadata.
//!
//! A scope mirrors the element's shape. Containers hold their children's
//! scopes keyed by idShort (Collection, Entity statements, annotations) or by
//! position (List). Operation and Capability have no value and never appear.

use crate::error::ValueError;
use crate::model::data_type::PrimitiveValue;
use crate::model::element::{ChildLayout, ElementKind, EntityType, SpecificAssetId, SubmodelElement};
use crate::model::meta::LangStringSet;
use crate::model::reference::Reference;

/// The value of one element.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueScope {
    Property(Option<PrimitiveValue>),
    Range {
        min: Option<PrimitiveValue>,
        max: Option<PrimitiveValue>,
    },
    MultiLanguage(LangStringSet),
    File {
        content_type: String,
        value: Option<String>,
    },
    Blob {
        content_type: String,
        value: Option<Vec<u8>>,
    },
    Reference(Option<Reference>),
    Relationship {
        first: Reference,
        second: Reference,
    },
    AnnotatedRelationship {
        first: Reference,
        second: Reference,
        annotations: Vec<(String, ValueScope)>,
    },
    Collection(Vec<(String, ValueScope)>),
    List(Vec<ValueScope>),
    Entity {
        entity_type: Option<EntityType>,
        global_asset_id: Option<String>,
        specific_asset_ids: Vec<SpecificAssetId>,
        statements: Vec<(String, ValueScope)>,
    },
    BasicEvent {
        observed: Reference,
    },
}

impl ValueScope {
    /// Short name of the scope shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ValueScope::Property(_) => "Property",
            ValueScope::Range { .. } => "Range",
            ValueScope::MultiLanguage(_) => "MultiLanguage",
            ValueScope::File { .. } => "File",
            ValueScope::Blob { .. } => "Blob",
            ValueScope::Reference(_) => "Reference",
            ValueScope::Relationship { .. } => "Relationship",
            ValueScope::AnnotatedRelationship { .. } => "AnnotatedRelationship",
            ValueScope::Collection(_) => "Collection",
            ValueScope::List(_) => "List",
            ValueScope::Entity { .. } => "Entity",
            ValueScope::BasicEvent { .. } => "BasicEvent",
        }
    }

    /// Looks up a keyed child scope.
    pub fn member(&self, key: &str) -> Option<&ValueScope> {
        let members = match self {
            ValueScope::Collection(m) => m,
            ValueScope::Entity { statements, .. } => statements,
            ValueScope::AnnotatedRelationship { annotations, .. } => annotations,
            _ => return None,
        };
        members.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Looks up a positional child scope.
    pub fn item(&self, index: usize) -> Option<&ValueScope> {
        match self {
            ValueScope::List(items) => items.get(index),
            _ => None,
        }
    }
}

impl From<PrimitiveValue> for ValueScope {
    fn from(v: PrimitiveValue) -> Self {
        ValueScope::Property(Some(v))
    }
}

/// Child scopes split off a container scope.
#[derive(Debug)]
pub(crate) enum ChildScopes {
    None,
    Keyed(Vec<(String, ValueScope)>),
    Ordered(Vec<ValueScope>),
}

impl ChildScopes {
    fn into_keyed(self) -> Vec<(String, ValueScope)> {
        match self {
            ChildScopes::Keyed(v) => v,
            _ => Vec::new(),
        }
    }

    fn into_ordered(self) -> Vec<ValueScope> {
        match self {
            ChildScopes::Ordered(v) => v,
            _ => Vec::new(),
        }
    }
}

impl SubmodelElement {
    /// Returns false for Operation and Capability.
    pub fn has_value(&self) -> bool {
        !matches!(
            self.kind,
            ElementKind::Operation(_) | ElementKind::Capability(_)
        )
    }

    /// Computes the value scope from the inline payload and children.
    pub fn value_scope(&self) -> Option<ValueScope> {
        let children = match (self.kind.child_layout(), self.children()) {
            (Some(ChildLayout::Keyed), Some(children)) => ChildScopes::Keyed(
                children
                    .iter()
                    .filter_map(|c| {
                        let scope = c.value_scope()?;
                        Some((c.id_short().unwrap_or_default().to_string(), scope))
                    })
                    .collect(),
            ),
            (Some(ChildLayout::Ordered), Some(children)) => {
                ChildScopes::Ordered(children.iter().filter_map(|c| c.value_scope()).collect())
            }
            _ => ChildScopes::None,
        };
        self.compose_value_scope(children)
    }

    /// Builds this element's scope around already computed child scopes.
    pub(crate) fn compose_value_scope(&self, children: ChildScopes) -> Option<ValueScope> {
        let scope = match &self.kind {
            ElementKind::Property(p) => ValueScope::Property(p.value.clone()),
            ElementKind::Range(r) => ValueScope::Range {
                min: r.min.clone(),
                max: r.max.clone(),
            },
            ElementKind::MultiLanguageProperty(m) => ValueScope::MultiLanguage(m.value.clone()),
            ElementKind::File(f) => ValueScope::File {
                content_type: f.content_type.clone(),
                value: f.value.clone(),
            },
            ElementKind::Blob(b) => ValueScope::Blob {
                content_type: b.content_type.clone(),
                value: b.value.clone(),
            },
            ElementKind::ReferenceElement(r) => ValueScope::Reference(r.value.clone()),
            ElementKind::RelationshipElement(r) => ValueScope::Relationship {
                first: r.first.clone(),
                second: r.second.clone(),
            },
            ElementKind::AnnotatedRelationshipElement(a) => ValueScope::AnnotatedRelationship {
                first: a.first.clone(),
                second: a.second.clone(),
                annotations: children.into_keyed(),
            },
            ElementKind::SubmodelElementCollection(_) => {
                ValueScope::Collection(children.into_keyed())
            }
            ElementKind::SubmodelElementList(_) => ValueScope::List(children.into_ordered()),
            ElementKind::Entity(e) => ValueScope::Entity {
                entity_type: e.entity_type,
                global_asset_id: e.global_asset_id.clone(),
                specific_asset_ids: e.specific_asset_ids.clone(),
                statements: children.into_keyed(),
            },
            ElementKind::BasicEventElement(b) => ValueScope::BasicEvent {
                observed: b.observed.clone(),
            },
            ElementKind::Operation(_) | ElementKind::Capability(_) => return None,
        };
        Some(scope)
    }

    /// Checks that `scope` fits this element without writing anything.
    pub fn check_value_scope(&self, scope: &ValueScope) -> Result<(), ValueError> {
        let shape_mismatch = || ValueError::ShapeMismatch {
            expected: self.model_type(),
            found: scope.kind_name(),
        };
        match (&self.kind, scope) {
            (ElementKind::Property(p), ValueScope::Property(value)) => {
                check_data_type(p.value_type, value.as_ref())
            }
            (ElementKind::Range(r), ValueScope::Range { min, max }) => {
                check_data_type(r.value_type, min.as_ref())?;
                check_data_type(r.value_type, max.as_ref())
            }
            (ElementKind::MultiLanguageProperty(_), ValueScope::MultiLanguage(set)) => {
                match set.duplicate_language() {
                    Some(language) => Err(ValueError::DuplicateLanguage {
                        language: language.to_string(),
                    }),
                    None => Ok(()),
                }
            }
            (ElementKind::File(_), ValueScope::File { .. })
            | (ElementKind::Blob(_), ValueScope::Blob { .. })
            | (ElementKind::ReferenceElement(_), ValueScope::Reference(_))
            | (ElementKind::RelationshipElement(_), ValueScope::Relationship { .. })
            | (ElementKind::BasicEventElement(_), ValueScope::BasicEvent { .. }) => Ok(()),
            (
                ElementKind::AnnotatedRelationshipElement(a),
                ValueScope::AnnotatedRelationship { annotations, .. },
            ) => check_keyed(&a.annotations, annotations),
            (ElementKind::SubmodelElementCollection(c), ValueScope::Collection(members)) => {
                check_keyed(&c.value, members)
            }
            (ElementKind::Entity(e), ValueScope::Entity { statements, .. }) => {
                check_keyed(&e.statements, statements)
            }
            (ElementKind::SubmodelElementList(l), ValueScope::List(items)) => {
                let valued: Vec<&SubmodelElement> = l.value.iter().filter(|c| c.has_value()).collect();
                if valued.len() != items.len() {
                    return Err(ValueError::LengthMismatch {
                        expected: valued.len(),
                        found: items.len(),
                    });
                }
                for (child, item) in valued.into_iter().zip(items) {
                    child.check_value_scope(item)?;
                }
                Ok(())
            }
            (ElementKind::Operation(_) | ElementKind::Capability(_), _) => {
                Err(ValueError::NoValue {
                    model_type: self.model_type(),
                })
            }
            _ => Err(shape_mismatch()),
        }
    }

    /// Writes the node-local part of `scope` and hands back the child scopes.
    pub(crate) fn apply_local_scope(&mut self, scope: ValueScope) -> Result<ChildScopes, ValueError> {
        let expected = self.model_type();
        let found = scope.kind_name();
        let children = match (&mut self.kind, scope) {
            (ElementKind::Property(p), ValueScope::Property(value)) => {
                p.value = value;
                ChildScopes::None
            }
            (ElementKind::Range(r), ValueScope::Range { min, max }) => {
                r.min = min;
                r.max = max;
                ChildScopes::None
            }
            (ElementKind::MultiLanguageProperty(m), ValueScope::MultiLanguage(value)) => {
                m.value = value;
                ChildScopes::None
            }
            (ElementKind::File(f), ValueScope::File { content_type, value }) => {
                f.content_type = content_type;
                f.value = value;
                ChildScopes::None
            }
            (ElementKind::Blob(b), ValueScope::Blob { content_type, value }) => {
                b.content_type = content_type;
                b.value = value;
                ChildScopes::None
            }
            (ElementKind::ReferenceElement(r), ValueScope::Reference(value)) => {
                r.value = value;
                ChildScopes::None
            }
            (ElementKind::RelationshipElement(r), ValueScope::Relationship { first, second }) => {
                r.first = first;
                r.second = second;
                ChildScopes::None
            }
            (
                ElementKind::AnnotatedRelationshipElement(a),
                ValueScope::AnnotatedRelationship {
                    first,
                    second,
                    annotations,
                },
            ) => {
                a.first = first;
                a.second = second;
                ChildScopes::Keyed(annotations)
            }
            (ElementKind::SubmodelElementCollection(_), ValueScope::Collection(members)) => {
                ChildScopes::Keyed(members)
            }
            (ElementKind::SubmodelElementList(_), ValueScope::List(items)) => {
                ChildScopes::Ordered(items)
            }
            (
                ElementKind::Entity(e),
                ValueScope::Entity {
                    entity_type,
                    global_asset_id,
                    specific_asset_ids,
                    statements,
                },
            ) => {
                e.entity_type = entity_type;
                e.global_asset_id = global_asset_id;
                e.specific_asset_ids = specific_asset_ids;
                ChildScopes::Keyed(statements)
            }
            (ElementKind::BasicEventElement(b), ValueScope::BasicEvent { observed }) => {
                b.observed = observed;
                ChildScopes::None
            }
            (ElementKind::Operation(_) | ElementKind::Capability(_), _) => {
                return Err(ValueError::NoValue { model_type: expected });
            }
            _ => return Err(ValueError::ShapeMismatch { expected, found }),
        };
        Ok(children)
    }

    /// Checks `scope` and then writes it into this element and its inline
    /// children. Nothing is written if the check fails.
    pub fn apply_value_scope(&mut self, scope: ValueScope) -> Result<(), ValueError> {
        self.check_value_scope(&scope)?;
        self.write_value_scope(scope)
    }

    fn write_value_scope(&mut self, scope: ValueScope) -> Result<(), ValueError> {
        let child_scopes = self.apply_local_scope(scope)?;
        let Some(children) = self.kind.children_mut() else {
            return Ok(());
        };
        match child_scopes {
            ChildScopes::None => {}
            ChildScopes::Keyed(members) => {
                for (key, member) in members {
                    let child = children
                        .iter_mut()
                        .find(|c| c.id_short() == Some(key.as_str()))
                        .ok_or(ValueError::UnknownMember { key })?;
                    child.write_value_scope(member)?;
                }
            }
            ChildScopes::Ordered(items) => {
                for (child, item) in children.iter_mut().filter(|c| c.has_value()).zip(items) {
                    child.write_value_scope(item)?;
                }
            }
        }
        Ok(())
    }
}

fn check_data_type(
    expected: crate::model::DataType,
    value: Option<&PrimitiveValue>,
) -> Result<(), ValueError> {
    match value {
        Some(v) if v.data_type() != expected => Err(ValueError::DataTypeMismatch {
            expected,
            found: v.data_type(),
        }),
        _ => Ok(()),
    }
}

fn check_keyed(children: &[SubmodelElement], members: &[(String, ValueScope)]) -> Result<(), ValueError> {
    for (key, member) in members {
        let child = children
            .iter()
            .find(|c| c.id_short() == Some(key.as_str()))
            .ok_or_else(|| ValueError::UnknownMember { key: key.clone() })?;
        child.check_value_scope(member)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DataType, Operation, Property, SubmodelElementCollection, SubmodelElementList,
    };

    fn d(v: f64) -> ValueScope {
        ValueScope::Property(Some(PrimitiveValue::Double(v)))
    }

    fn double(id: &str, v: f64) -> SubmodelElement {
        SubmodelElement::new(
            id,
            Property {
                value_type: DataType::Double,
                value: Some(v.into()),
                value_id: None,
            },
        )
    }

    fn coordinates() -> SubmodelElement {
        SubmodelElement::new(
            "Coordinates",
            SubmodelElementCollection {
                value: vec![double("x", 1.0), double("y", 2.0)],
            },
        )
    }

    #[test]
    fn test_collection_scope_is_keyed() {
        let scope = coordinates().value_scope().unwrap();
        assert_eq!(
            scope.member("x"),
            Some(&ValueScope::Property(Some(PrimitiveValue::Double(1.0))))
        );
        assert!(scope.member("z").is_none());
    }

    #[test]
    fn test_operation_has_no_scope_and_is_skipped() {
        let mut c = coordinates();
        c.kind
            .children_mut()
            .unwrap()
            .push(SubmodelElement::new("Run", Operation::default()));
        match c.value_scope().unwrap() {
            ValueScope::Collection(members) => assert_eq!(members.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        let op = SubmodelElement::new("Run", Operation::default());
        assert!(op.value_scope().is_none());
        assert!(matches!(
            op.check_value_scope(&ValueScope::Property(None)),
            Err(ValueError::NoValue { .. })
        ));
    }

    #[test]
    fn test_apply_writes_nested_values() {
        let mut c = coordinates();
        let scope = ValueScope::Collection(vec![("y".to_string(), d(5.0))]);
        c.apply_value_scope(scope).unwrap();
        let y = c.children().unwrap()[1].as_variant::<Property>().unwrap();
        assert_eq!(y.value, Some(PrimitiveValue::Double(5.0)));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut c = coordinates();
        let before = c.clone();
        let scope = ValueScope::Collection(vec![
            ("x".to_string(), d(9.0)),
            ("y".to_string(), ValueScope::Property(Some(PrimitiveValue::Int(3)))),
        ]);
        assert!(matches!(
            c.apply_value_scope(scope),
            Err(ValueError::DataTypeMismatch { .. })
        ));
        assert_eq!(c, before);

        let unknown = ValueScope::Collection(vec![("z".to_string(), d(1.0))]);
        assert!(matches!(
            c.apply_value_scope(unknown),
            Err(ValueError::UnknownMember { .. })
        ));
    }

    #[test]
    fn test_list_length_must_match() {
        let mut list = SubmodelElement::new(
            "Readings",
            SubmodelElementList {
                value: vec![
                    SubmodelElement::unnamed(Property {
                        value_type: DataType::Double,
                        ..Property::default()
                    }),
                ],
                ..SubmodelElementList::default()
            },
        );
        let err = list
            .apply_value_scope(ValueScope::List(vec![d(1.0), d(2.0)]))
            .unwrap_err();
        assert_eq!(err, ValueError::LengthMismatch { expected: 1, found: 2 });
        list.apply_value_scope(ValueScope::List(vec![d(4.0)])).unwrap();
        assert_eq!(
            list.value_scope(),
            Some(ValueScope::List(vec![d(4.0)]))
        );
    }

    #[test]
    fn test_multi_language_scope_needs_distinct_languages() {
        let mut m = SubmodelElement::multi_language("m", LangStringSet::new().with("en", "x"));
        let repeated = LangStringSet(vec![
            crate::model::LangString::new("en", "a"),
            crate::model::LangString::new("en", "b"),
        ]);
        let err = m
            .apply_value_scope(ValueScope::MultiLanguage(repeated))
            .unwrap_err();
        assert_eq!(
            err,
            ValueError::DuplicateLanguage {
                language: "en".to_string()
            }
        );
        assert_eq!(
            m.value_scope(),
            Some(ValueScope::MultiLanguage(LangStringSet::new().with("en", "x")))
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let p = double("x", 1.0);
        let err = p.check_value_scope(&ValueScope::List(vec![])).unwrap_err();
        assert!(matches!(err, ValueError::ShapeMismatch { found: "List", .. }));
    }
}

//! Structural validation for elements and submodels.
//!
//! Decoding and tree insertion already reject malformed structure; this
//! module covers the rules that need a whole element in view: idShort
//! syntax, sibling uniqueness, declared value types and List constraints.

use rustc_hash::FxHashSet;

use crate::error::{ValidationError, ValueError};
use crate::limits::MAX_ID_SHORT_LEN;
use crate::model::{
    ChildLayout, DataType, ElementKind, OperationVariable, PrimitiveValue, Submodel,
    SubmodelElement, SubmodelElementList,
};

/// Checks idShort syntax: a leading ASCII letter followed by letters,
/// digits, `_` or `-`, not ending in `-`.
pub fn validate_id_short(id_short: &str) -> Result<(), &'static str> {
    let mut chars = id_short.chars();
    match chars.next() {
        None => return Err("must not be empty"),
        Some(c) if !c.is_ascii_alphabetic() => return Err("must start with a letter"),
        Some(_) => {}
    }
    if id_short.chars().count() > MAX_ID_SHORT_LEN {
        return Err("too long");
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err("may only contain letters, digits, '_' and '-'");
    }
    if id_short.ends_with('-') {
        return Err("must not end with '-'");
    }
    Ok(())
}

/// Validates every element of a submodel.
pub fn validate_submodel(submodel: &Submodel) -> Result<(), ValidationError> {
    let scope = submodel
        .meta
        .id_short
        .clone()
        .unwrap_or_else(|| submodel.id.clone());
    validate_keyed_children(&scope, &submodel.submodel_elements)?;
    for element in &submodel.submodel_elements {
        validate_element(element)?;
    }
    Ok(())
}

/// Validates an element and its subtree.
pub fn validate_element(element: &SubmodelElement) -> Result<(), ValidationError> {
    let name = display_name(element);
    if let Some(id_short) = element.id_short() {
        validate_id_short(id_short).map_err(|reason| ValidationError::InvalidIdShort {
            id_short: id_short.to_string(),
            reason,
        })?;
    }

    match &element.kind {
        ElementKind::Property(p) => {
            check_value_type(&name, p.value_type, p.value.as_ref())?;
        }
        ElementKind::Range(r) => {
            check_value_type(&name, r.value_type, r.min.as_ref())?;
            check_value_type(&name, r.value_type, r.max.as_ref())?;
        }
        ElementKind::MultiLanguageProperty(m) => {
            let mut seen = FxHashSet::default();
            for s in m.value.iter() {
                if !seen.insert(s.language.as_str()) {
                    return Err(ValidationError::DuplicateLanguage {
                        id_short: name,
                        language: s.language.clone(),
                    });
                }
            }
        }
        ElementKind::AnnotatedRelationshipElement(a) => {
            for annotation in &a.annotations {
                if !annotation.model_type().is_data_element() {
                    return Err(ValidationError::AnnotationNotDataElement {
                        owner: name,
                        annotation: display_name(annotation),
                        found: annotation.model_type(),
                    });
                }
            }
        }
        ElementKind::SubmodelElementList(l) => {
            for child in &l.value {
                validate_list_member(&name, l, child)?;
            }
        }
        ElementKind::Operation(op) => {
            let variables = op
                .input_variables
                .iter()
                .chain(&op.output_variables)
                .chain(&op.inoutput_variables);
            let values: Vec<SubmodelElement> =
                variables.map(|v: &OperationVariable| v.value.clone()).collect();
            validate_keyed_children(&name, &values)?;
            for value in &values {
                validate_element(value)?;
            }
        }
        _ => {}
    }

    if let Some(children) = element.children() {
        if element.kind.child_layout() == Some(ChildLayout::Keyed) {
            validate_keyed_children(&name, children)?;
        }
        for child in children {
            validate_element(child)?;
        }
    }
    Ok(())
}

/// Checks that `child` satisfies the List's declared element type and value type.
pub(crate) fn validate_list_member(
    list_name: &str,
    list: &SubmodelElementList,
    child: &SubmodelElement,
) -> Result<(), ValidationError> {
    if let Some(expected) = list.type_value_list_element {
        if child.model_type() != expected {
            return Err(ValidationError::ListElementMismatch {
                id_short: list_name.to_string(),
                expected,
                found: child.model_type(),
            });
        }
    }
    if let Some(expected) = list.value_type_list_element {
        let declared = match &child.kind {
            ElementKind::Property(p) => Some(p.value_type),
            ElementKind::Range(r) => Some(r.value_type),
            _ => None,
        };
        if let Some(found) = declared.filter(|found| *found != expected) {
            return Err(ValidationError::Value {
                id_short: list_name.to_string(),
                source: ValueError::DataTypeMismatch { expected, found },
            });
        }
    }
    Ok(())
}

/// Every child needs an idShort, unique among its siblings.
pub(crate) fn validate_keyed_children(
    scope: &str,
    children: &[SubmodelElement],
) -> Result<(), ValidationError> {
    let mut seen = FxHashSet::default();
    for child in children {
        let Some(id_short) = child.id_short() else {
            return Err(ValidationError::MissingIdShort {
                scope: scope.to_string(),
                model_type: child.model_type(),
            });
        };
        if !seen.insert(id_short) {
            return Err(ValidationError::DuplicateIdShort {
                scope: scope.to_string(),
                id_short: id_short.to_string(),
            });
        }
    }
    Ok(())
}

fn check_value_type(
    name: &str,
    expected: DataType,
    value: Option<&PrimitiveValue>,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.data_type() != expected => Err(ValidationError::Value {
            id_short: name.to_string(),
            source: ValueError::DataTypeMismatch {
                expected,
                found: v.data_type(),
            },
        }),
        _ => Ok(()),
    }
}

fn display_name(element: &SubmodelElement) -> String {
    element
        .id_short()
        .map(str::to_string)
        .unwrap_or_else(|| format!("<{}>", element.model_type()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnnotatedRelationshipElement, LangString, LangStringSet, ModelType, Property,
        SubmodelElementCollection,
    };

    #[test]
    fn test_id_short_syntax() {
        assert!(validate_id_short("Speed").is_ok());
        assert!(validate_id_short("max_rpm-2").is_ok());
        assert!(validate_id_short("").is_err());
        assert!(validate_id_short("2fast").is_err());
        assert!(validate_id_short("_hidden").is_err());
        assert!(validate_id_short("trailing-").is_err());
        assert!(validate_id_short("has space").is_err());
        assert!(validate_id_short("a.b").is_err());
        assert!(validate_id_short(&"a".repeat(MAX_ID_SHORT_LEN)).is_ok());
        assert!(validate_id_short(&"a".repeat(MAX_ID_SHORT_LEN + 1)).is_err());
    }

    #[test]
    fn test_duplicate_children_rejected() {
        let c = SubmodelElement::new(
            "C",
            SubmodelElementCollection {
                value: vec![
                    SubmodelElement::property("x", 1.0),
                    SubmodelElement::property("x", 2.0),
                ],
            },
        );
        assert!(matches!(
            validate_element(&c),
            Err(ValidationError::DuplicateIdShort { .. })
        ));
    }

    #[test]
    fn test_unnamed_collection_child_rejected() {
        let c = SubmodelElement::new(
            "C",
            SubmodelElementCollection {
                value: vec![SubmodelElement::unnamed(Property::default())],
            },
        );
        let err = validate_element(&c).unwrap_err();
        assert!(matches!(err, ValidationError::MissingIdShort { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_property_value_must_match_value_type() {
        let p = SubmodelElement::new(
            "Temp",
            Property {
                value_type: DataType::Double,
                value: Some(PrimitiveValue::String("hot".into())),
                value_id: None,
            },
        );
        assert!(matches!(
            validate_element(&p),
            Err(ValidationError::Value { .. })
        ));
    }

    #[test]
    fn test_list_constraints() {
        let ok = SubmodelElement::list("L", |l| {
            l.type_value(ModelType::Property)
                .value_type(DataType::Double)
                .value(1.0)
        });
        assert!(validate_element(&ok).is_ok());

        let wrong_type = SubmodelElement::list("L", |l| {
            l.type_value(ModelType::Range).value(1.0)
        });
        assert!(matches!(
            validate_element(&wrong_type),
            Err(ValidationError::ListElementMismatch { .. })
        ));

        let wrong_value_type = SubmodelElement::list("L", |l| {
            l.value_type(DataType::Int).value(1.0)
        });
        assert!(matches!(
            validate_element(&wrong_value_type),
            Err(ValidationError::Value { .. })
        ));
    }

    #[test]
    fn test_annotations_must_be_data_elements() {
        let a = SubmodelElement::new(
            "Link",
            AnnotatedRelationshipElement {
                annotations: vec![SubmodelElement::capability("Cap")],
                ..AnnotatedRelationshipElement::default()
            },
        );
        assert!(matches!(
            validate_element(&a),
            Err(ValidationError::AnnotationNotDataElement { .. })
        ));
    }

    #[test]
    fn test_duplicate_languages_rejected() {
        let m = SubmodelElement::multi_language(
            "Name",
            LangStringSet(vec![LangString::new("en", "a"), LangString::new("en", "b")]),
        );
        assert!(matches!(
            validate_element(&m),
            Err(ValidationError::DuplicateLanguage { .. })
        ));
    }

    #[test]
    fn test_submodel_top_level_must_be_keyed() {
        let sm = Submodel::new("urn:x")
            .with_element(SubmodelElement::property("a", 1.0))
            .with_element(SubmodelElement::property("a", 2.0));
        assert!(validate_submodel(&sm).is_err());
    }
}

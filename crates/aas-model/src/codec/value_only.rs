//! Value-only projection.
//!
//! Only values are written: a Collection becomes an object keyed by idShort,
//! a List an array, a Property its bare value. Operation and Capability carry
//! no value and are skipped. Decoding needs a template element to recover
//! data types and child shapes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{Map, Value};
use tracing::debug;

use crate::codec::json::{parse_document, specific_asset_id_from_json, specific_asset_id_to_json};
use crate::codec::primitives::{
    item_location, json_type_name, primitive_from_json, primitive_to_json, reference_from_json,
    reference_to_json, repeated_language, ObjectReader,
};
use crate::codec::Depth;
use crate::error::DecodeError;
use crate::model::{
    ElementKind, EntityType, LangString, LangStringSet, Reference, SubmodelElement, ValueScope,
};

/// Encodes the element's inline value.
///
/// Returns `null` for elements without a value.
pub fn element_value(element: &SubmodelElement, depth: Depth) -> Value {
    match element.value_scope() {
        Some(scope) => scope_to_json(&scope, depth),
        None => Value::Null,
    }
}

/// Encodes a value scope. At `Depth::Core` containers below the first level
/// are written empty.
pub fn scope_to_json(scope: &ValueScope, depth: Depth) -> Value {
    encode_scope(scope, depth.levels())
}

fn encode_scope(scope: &ValueScope, levels: usize) -> Value {
    let below = levels.saturating_sub(1);
    match scope {
        ValueScope::Property(value) => value.as_ref().map_or(Value::Null, primitive_to_json),
        ValueScope::Range { min, max } => {
            let mut obj = Map::new();
            if let Some(min) = min {
                obj.insert("min".to_string(), primitive_to_json(min));
            }
            if let Some(max) = max {
                obj.insert("max".to_string(), primitive_to_json(max));
            }
            Value::Object(obj)
        }
        ValueScope::MultiLanguage(set) => Value::Array(
            set.iter()
                .map(|s| {
                    let mut obj = Map::new();
                    obj.insert(s.language.clone(), Value::from(s.text.as_str()));
                    Value::Object(obj)
                })
                .collect(),
        ),
        ValueScope::File { content_type, value } => {
            let mut obj = Map::new();
            obj.insert("contentType".to_string(), Value::from(content_type.as_str()));
            if let Some(v) = value {
                obj.insert("value".to_string(), Value::from(v.as_str()));
            }
            Value::Object(obj)
        }
        ValueScope::Blob { content_type, value } => {
            let mut obj = Map::new();
            obj.insert("contentType".to_string(), Value::from(content_type.as_str()));
            if let Some(bytes) = value {
                obj.insert("value".to_string(), Value::from(BASE64.encode(bytes)));
            }
            Value::Object(obj)
        }
        ValueScope::Reference(reference) => reference.as_ref().map_or(Value::Null, reference_to_json),
        ValueScope::Relationship { first, second } => relationship(first, second),
        ValueScope::AnnotatedRelationship {
            first,
            second,
            annotations,
        } => {
            let mut value = relationship(first, second);
            if let Value::Object(obj) = &mut value {
                let items = match levels {
                    0 => Vec::new(),
                    _ => annotations
                        .iter()
                        .map(|(key, scope)| {
                            let mut item = Map::new();
                            item.insert(key.clone(), encode_scope(scope, below));
                            Value::Object(item)
                        })
                        .collect(),
                };
                obj.insert("annotations".to_string(), Value::Array(items));
            }
            value
        }
        ValueScope::Collection(members) => keyed(members, levels),
        ValueScope::List(items) => match levels {
            0 => Value::Array(Vec::new()),
            _ => Value::Array(items.iter().map(|s| encode_scope(s, below)).collect()),
        },
        ValueScope::Entity {
            entity_type,
            global_asset_id,
            specific_asset_ids,
            statements,
        } => {
            let mut obj = Map::new();
            obj.insert("statements".to_string(), keyed(statements, levels));
            if let Some(t) = entity_type {
                obj.insert("entityType".to_string(), Value::from(t.name()));
            }
            if let Some(id) = global_asset_id {
                obj.insert("globalAssetId".to_string(), Value::from(id.as_str()));
            }
            if !specific_asset_ids.is_empty() {
                obj.insert(
                    "specificAssetIds".to_string(),
                    Value::Array(specific_asset_ids.iter().map(specific_asset_id_to_json).collect()),
                );
            }
            Value::Object(obj)
        }
        ValueScope::BasicEvent { observed } => {
            let mut obj = Map::new();
            obj.insert("observed".to_string(), reference_to_json(observed));
            Value::Object(obj)
        }
    }
}

fn keyed(members: &[(String, ValueScope)], levels: usize) -> Value {
    if levels == 0 {
        return Value::Object(Map::new());
    }
    Value::Object(
        members
            .iter()
            .map(|(key, scope)| (key.clone(), encode_scope(scope, levels - 1)))
            .collect(),
    )
}

fn relationship(first: &Reference, second: &Reference) -> Value {
    let mut obj = Map::new();
    obj.insert("first".to_string(), reference_to_json(first));
    obj.insert("second".to_string(), reference_to_json(second));
    Value::Object(obj)
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes a value-only document shaped like `template`.
///
/// The result can be handed to `ElementTree::set_value`.
pub fn decode_value_only(input: &str, template: &SubmodelElement) -> Result<ValueScope, DecodeError> {
    let value = parse_document(input)?;
    scope_from_json(&value, template, "$").inspect_err(|e| debug!(error = %e, "value decode failed"))
}

/// Decodes a value scope from an already parsed document.
pub fn scope_from_json(
    value: &Value,
    template: &SubmodelElement,
    location: &str,
) -> Result<ValueScope, DecodeError> {
    let scope = match &template.kind {
        ElementKind::Property(p) => match value {
            Value::Null => ValueScope::Property(None),
            v => ValueScope::Property(Some(primitive_from_json(v, p.value_type, location)?)),
        },
        ElementKind::Range(r) => {
            let obj = ObjectReader::new(value, location)?;
            let bound = |name: &str| match obj.optional(name) {
                Some(v) => primitive_from_json(v, r.value_type, &obj.field(name)).map(Some),
                None => Ok(None),
            };
            ValueScope::Range {
                min: bound("min")?,
                max: bound("max")?,
            }
        }
        ElementKind::MultiLanguageProperty(_) => ValueScope::MultiLanguage(lang_map(value, location)?),
        ElementKind::File(f) => {
            let obj = ObjectReader::new(value, location)?;
            ValueScope::File {
                content_type: obj.opt_string("contentType")?.unwrap_or(&f.content_type).to_string(),
                value: obj.opt_string("value")?.map(str::to_string),
            }
        }
        ElementKind::Blob(b) => {
            let obj = ObjectReader::new(value, location)?;
            let bytes = match obj.opt_string("value")? {
                Some(text) => Some(BASE64.decode(text).map_err(|_| DecodeError::TypeMismatch {
                    field: obj.field("value"),
                    expected: "base64".to_string(),
                    found: format!("{:?}", text),
                })?),
                None => None,
            };
            ValueScope::Blob {
                content_type: obj.opt_string("contentType")?.unwrap_or(&b.content_type).to_string(),
                value: bytes,
            }
        }
        ElementKind::ReferenceElement(_) => match value {
            Value::Null => ValueScope::Reference(None),
            v => ValueScope::Reference(Some(reference_from_json(v, location)?)),
        },
        ElementKind::RelationshipElement(_) => {
            let obj = ObjectReader::new(value, location)?;
            ValueScope::Relationship {
                first: reference_from_json(obj.required("first")?, &obj.field("first"))?,
                second: reference_from_json(obj.required("second")?, &obj.field("second"))?,
            }
        }
        ElementKind::AnnotatedRelationshipElement(a) => {
            let obj = ObjectReader::new(value, location)?;
            let annotations_location = obj.field("annotations");
            let mut annotations = Vec::new();
            for (i, item) in obj.array("annotations")?.iter().enumerate() {
                let item_loc = item_location(&annotations_location, i);
                annotations.extend(keyed_members(item, &a.annotations, &item_loc)?);
            }
            ValueScope::AnnotatedRelationship {
                first: reference_from_json(obj.required("first")?, &obj.field("first"))?,
                second: reference_from_json(obj.required("second")?, &obj.field("second"))?,
                annotations,
            }
        }
        ElementKind::SubmodelElementCollection(c) => {
            ValueScope::Collection(keyed_members(value, &c.value, location)?)
        }
        ElementKind::SubmodelElementList(l) => {
            let Value::Array(items) = value else {
                return Err(mismatch(location, "array", value));
            };
            let valued: Vec<&SubmodelElement> = l.value.iter().filter(|c| c.has_value()).collect();
            if valued.len() != items.len() {
                return Err(DecodeError::MalformedStructure {
                    field: location.to_string(),
                    reason: format!("expected {} items, found {}", valued.len(), items.len()),
                });
            }
            let mut scopes = Vec::with_capacity(items.len());
            for (i, (child, item)) in valued.into_iter().zip(items).enumerate() {
                scopes.push(scope_from_json(item, child, &item_location(location, i))?);
            }
            ValueScope::List(scopes)
        }
        ElementKind::Entity(e) => {
            let obj = ObjectReader::new(value, location)?;
            let statements = match obj.optional("statements") {
                Some(v) => keyed_members(v, &e.statements, &obj.field("statements"))?,
                None => Vec::new(),
            };
            let ids_location = obj.field("specificAssetIds");
            let mut specific_asset_ids = Vec::new();
            for (i, item) in obj.array("specificAssetIds")?.iter().enumerate() {
                specific_asset_ids.push(specific_asset_id_from_json(
                    item,
                    &item_location(&ids_location, i),
                )?);
            }
            ValueScope::Entity {
                entity_type: obj
                    .enum_field("entityType", EntityType::from_name)?
                    .or(e.entity_type),
                global_asset_id: obj.opt_string("globalAssetId")?.map(str::to_string),
                specific_asset_ids,
                statements,
            }
        }
        ElementKind::BasicEventElement(_) => {
            let obj = ObjectReader::new(value, location)?;
            ValueScope::BasicEvent {
                observed: reference_from_json(obj.required("observed")?, &obj.field("observed"))?,
            }
        }
        ElementKind::Operation(_) | ElementKind::Capability(_) => {
            return Err(DecodeError::MalformedStructure {
                field: location.to_string(),
                reason: format!("{} carries no value", template.model_type()),
            });
        }
    };
    Ok(scope)
}

/// Decodes an object keyed by child idShorts. Members may be omitted.
fn keyed_members(
    value: &Value,
    children: &[SubmodelElement],
    location: &str,
) -> Result<Vec<(String, ValueScope)>, DecodeError> {
    let obj = ObjectReader::new(value, location)?;
    let mut members = Vec::new();
    for (key, member) in obj.entries() {
        let field = obj.field(key);
        let child = children
            .iter()
            .find(|c| c.id_short() == Some(key.as_str()) && c.has_value())
            .ok_or_else(|| DecodeError::MalformedStructure {
                field: field.clone(),
                reason: format!("no valued child named {:?}", key),
            })?;
        members.push((key.clone(), scope_from_json(member, child, &field)?));
    }
    Ok(members)
}

/// Decodes `[{"en": "text"}, ...]`.
fn lang_map(value: &Value, location: &str) -> Result<LangStringSet, DecodeError> {
    let Value::Array(items) = value else {
        return Err(mismatch(location, "array", value));
    };
    let mut set = LangStringSet::new();
    for (i, item) in items.iter().enumerate() {
        let item_loc = item_location(location, i);
        let obj = ObjectReader::new(item, &item_loc)?;
        for (language, text) in obj.entries() {
            let text = text
                .as_str()
                .ok_or_else(|| obj.mismatch(language, "string", text))?;
            set.try_push(LangString::new(language.as_str(), text))
                .map_err(|_| repeated_language(&obj.field(language), language))?;
        }
    }
    Ok(set)
}

fn mismatch(location: &str, expected: &str, found: &Value) -> DecodeError {
    DecodeError::TypeMismatch {
        field: location.to_string(),
        expected: expected.to_string(),
        found: json_type_name(found).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeErrorKind;
    use crate::model::{DataType, PrimitiveValue};
    use serde_json::json;

    fn coordinates() -> SubmodelElement {
        SubmodelElement::collection("Coordinates", |c| c.property("x", 1.0).property("y", 2.0))
    }

    #[test]
    fn test_collection_value() {
        let value = element_value(&coordinates(), Depth::Deep);
        assert_eq!(value.to_string(), r#"{"x":1.0,"y":2.0}"#);
    }

    #[test]
    fn test_core_depth_empties_nested_containers() {
        let element = SubmodelElement::collection("Root", |c| {
            c.property("a", 1_i32)
                .collection("Inner", |i| i.property("b", 2_i32))
                .list("Items", |l| l.value(3_i32))
        });
        assert_eq!(
            element_value(&element, Depth::Core),
            json!({"a": 1, "Inner": {}, "Items": []})
        );
        assert_eq!(
            element_value(&element, Depth::Deep),
            json!({"a": 1, "Inner": {"b": 2}, "Items": [3]})
        );
    }

    #[test]
    fn test_multi_language_value_rejects_repeated_language() {
        let template = SubmodelElement::multi_language("m", LangStringSet::new().with("en", "x"));
        let err = decode_value_only(r#"[{"en":"a"},{"en":"b"}]"#, &template).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedStructure);
        assert_eq!(err.field(), Some("$[1].en"));

        let scope = decode_value_only(r#"[{"en":"a"},{"de":"b"}]"#, &template).unwrap();
        assert_eq!(
            scope,
            ValueScope::MultiLanguage(LangStringSet::new().with("en", "a").with("de", "b"))
        );
    }

    #[test]
    fn test_operation_skipped() {
        let element = SubmodelElement::collection("Root", |c| {
            c.property("a", true)
                .element(SubmodelElement::operation("Start"))
                .element(SubmodelElement::capability("Weld"))
        });
        assert_eq!(element_value(&element, Depth::Deep), json!({"a": true}));
        assert_eq!(element_value(&SubmodelElement::operation("Start"), Depth::Deep), Value::Null);
    }

    #[test]
    fn test_leaf_shapes() {
        let range = SubmodelElement::range("Limits", DataType::Int, Some(0_i32.into()), Some(9_i32.into()));
        assert_eq!(element_value(&range, Depth::Deep), json!({"min": 0, "max": 9}));

        let mlp = SubmodelElement::multi_language(
            "Name",
            LangStringSet::new().with("en", "Pump").with("de", "Pumpe"),
        );
        assert_eq!(
            element_value(&mlp, Depth::Deep),
            json!([{"en": "Pump"}, {"de": "Pumpe"}])
        );

        let blob = SubmodelElement::blob("Data", "application/octet-stream", vec![0, 1, 2]);
        assert_eq!(
            element_value(&blob, Depth::Deep),
            json!({"contentType": "application/octet-stream", "value": "AAEC"})
        );
    }

    #[test]
    fn test_decode_against_template() {
        let template = coordinates();
        let scope = decode_value_only(r#"{"x": 3.5, "y": "4"}"#, &template).unwrap();
        assert_eq!(
            scope,
            ValueScope::Collection(vec![
                ("x".to_string(), ValueScope::Property(Some(PrimitiveValue::Double(3.5)))),
                ("y".to_string(), ValueScope::Property(Some(PrimitiveValue::Double(4.0)))),
            ])
        );
        let mut element = template.clone();
        element.apply_value_scope(scope).unwrap();
        assert_eq!(element_value(&element, Depth::Deep), json!({"x": 3.5, "y": 4.0}));
    }

    #[test]
    fn test_decode_errors() {
        let template = coordinates();
        let err = decode_value_only(r#"{"z": 1.0}"#, &template).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedStructure);
        assert_eq!(err.field(), Some("$.z"));

        let err = decode_value_only(r#"{"x": true}"#, &template).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::TypeMismatch);

        let list = SubmodelElement::list("L", |l| l.value(1_i32).value(2_i32));
        let err = decode_value_only("[1]", &list).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedStructure);
        assert!(decode_value_only("[1, 2]", &list).is_ok());

        let err = decode_value_only("null", &SubmodelElement::capability("C")).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedStructure);
    }

    #[test]
    fn test_relationship_round_trip() {
        let rel = SubmodelElement::relationship(
            "Feeds",
            Reference::global("urn:a"),
            Reference::global("urn:b"),
        );
        let text = element_value(&rel, Depth::Deep).to_string();
        let scope = decode_value_only(&text, &rel).unwrap();
        assert_eq!(Some(scope), rel.value_scope());
    }
}

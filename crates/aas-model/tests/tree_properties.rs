//! Cross-module properties of the element tree and its codecs.

use std::cell::RefCell;
use std::rc::Rc;

use aas_model::codec::{
    decode_tree, decode_value_only, element_to_json, encode_node, encode_tree, DecodeOptions,
    EncodeOptions,
};
use aas_model::model::{EntityType, LangString, LangStringSet, MemoryValue, Property};
use aas_model::{
    ChangeEvent, ChangeKind, DataType, DecodeError, ElementTree, ErrorKind, PrimitiveValue,
    SubmodelElement, ValueScope,
};
use serde_json::json;

fn coordinates() -> SubmodelElement {
    SubmodelElement::collection("Coordinates", |c| c.property("x", 1.0).property("y", 2.0))
}

fn plant() -> ElementTree {
    ElementTree::from_elements([
        coordinates(),
        SubmodelElement::list("Readings", |l| l.value(10_i32).value(20_i32).value(30_i32)),
        SubmodelElement::entity("Pump", EntityType::SelfManagedEntity, |s| {
            s.property("Serial", "P-100")
                .collection("Nameplate", |n| n.property("Vendor", "ACME"))
        }),
    ])
    .unwrap()
}

#[test]
fn test_create_then_retrieve_returns_equal_element() {
    let mut tree = ElementTree::new();
    let element = coordinates();
    tree.create(element.clone()).unwrap();
    assert_eq!(tree.retrieve("Coordinates").unwrap().to_element(), element);
}

#[test]
fn test_duplicate_create_conflicts_and_leaves_tree_unchanged() {
    let mut tree = plant();
    let before = tree.to_elements();
    let err = tree.create(SubmodelElement::property("Coordinates", 5_i32)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(tree.to_elements(), before);
}

#[test]
fn test_path_resolution_and_delete() {
    let mut tree = plant();
    for path in ["Coordinates.x", "Readings[1]", "Pump.Nameplate.Vendor"] {
        let node = tree.get_child(path).unwrap();
        assert_eq!(node.path(), path);
        assert_eq!(tree.retrieve(path).unwrap(), node);
        assert!(tree.has_child_path(path));
    }
    assert_eq!(tree.retrieve("Coordinates.x").unwrap().id_short(), Some("x"));
    assert_eq!(
        tree.retrieve_as::<Property>("Readings[1]").unwrap().value,
        Some(PrimitiveValue::Int(20))
    );

    tree.delete("Coordinates.x").unwrap();
    assert!(!tree.has_child_path("Coordinates.x"));
    assert!(tree.has_child_path("Coordinates.y"));
}

#[test]
fn test_list_removal_renumbers() {
    let mut tree = plant();
    tree.delete("Readings[0]").unwrap();
    assert_eq!(
        tree.retrieve_as::<Property>("Readings[0]").unwrap().value,
        Some(PrimitiveValue::Int(20))
    );
    assert!(!tree.has_child_path("Readings[2]"));
}

#[test]
fn test_ordered_tree_paths() {
    let mut tree = ElementTree::ordered();
    for v in [1_i32, 2, 3] {
        let property = Property {
            value_type: DataType::Int,
            value: Some(PrimitiveValue::Int(v)),
            value_id: None,
        };
        tree.create(SubmodelElement::unnamed(property)).unwrap();
    }
    let paths: Vec<String> = tree.flatten().map(|n| n.path()).collect();
    assert_eq!(paths, vec!["[0]", "[1]", "[2]"]);
}

#[test]
fn test_full_round_trip_nested_tree() {
    let tree = plant();
    let text = encode_tree(&tree, &EncodeOptions::new()).unwrap();
    let decoded = decode_tree(&text, &DecodeOptions::new()).unwrap();
    assert_eq!(decoded.to_elements(), tree.to_elements());
}

#[test]
fn test_coordinates_projections() {
    let tree = plant();
    let node = tree.retrieve("Coordinates").unwrap();
    assert_eq!(
        encode_node(node, &EncodeOptions::value_only()).unwrap(),
        r#"{"x":1.0,"y":2.0}"#
    );

    let full = element_to_json(&node.to_element(), &EncodeOptions::new());
    assert_eq!(full["modelType"], json!("SubmodelElementCollection"));
    let children = full["value"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    for child in children {
        assert_eq!(child["modelType"], json!("Property"));
        assert_eq!(child["valueType"], json!("Double"));
    }

    assert_eq!(
        encode_node(node, &EncodeOptions::path_only()).unwrap(),
        r#"["Coordinates","Coordinates.x","Coordinates.y"]"#
    );
}

#[test]
fn test_property_without_model_type_is_rejected() {
    let err = aas_model::decode_element(r#"{"idShort":"x","valueType":"Double","value":1.0}"#)
        .unwrap_err();
    assert!(matches!(err, DecodeError::MissingField { .. }));
}

#[test]
fn test_value_only_decode_feeds_set_value() {
    let mut tree = plant();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    tree.subscribe(move |e: &ChangeEvent| sink.borrow_mut().push(e.clone()));

    let template = tree.retrieve("Coordinates").unwrap().to_element();
    let scope = decode_value_only(r#"{"x": 7.5}"#, &template).unwrap();
    tree.set_value("Coordinates", scope).unwrap();

    assert_eq!(
        tree.get_value("Coordinates.x").unwrap(),
        ValueScope::Property(Some(PrimitiveValue::Double(7.5)))
    );
    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::ValueChanged);
    assert_eq!(events[0].path, "Coordinates");
}

#[test]
fn test_bound_source_reaches_encoder() {
    let mut tree = plant();
    let source = MemoryValue::new(ValueScope::Property(Some(PrimitiveValue::Double(42.0))));
    tree.bind_source("Coordinates.y", Box::new(source)).unwrap();
    let node = tree.retrieve("Coordinates").unwrap();
    assert_eq!(
        encode_node(node, &EncodeOptions::value_only()).unwrap(),
        r#"{"x":1.0,"y":42.0}"#
    );
}

#[test]
fn test_repeated_language_never_reaches_the_tree() {
    let mut tree = ElementTree::from_elements([SubmodelElement::multi_language(
        "Label",
        LangStringSet::new().with("en", "pump"),
    )])
    .unwrap();
    let template = tree.retrieve("Label").unwrap().to_element();
    let err = decode_value_only(r#"[{"en":"a"},{"en":"b"}]"#, &template).unwrap_err();
    assert!(matches!(err, DecodeError::MalformedStructure { .. }));

    let repeated = LangStringSet(vec![LangString::new("en", "a"), LangString::new("en", "b")]);
    let err = tree
        .set_value("Label", ValueScope::MultiLanguage(repeated))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(
        tree.get_value("Label").unwrap(),
        ValueScope::MultiLanguage(LangStringSet::new().with("en", "pump"))
    );
}

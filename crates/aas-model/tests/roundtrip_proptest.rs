//! Property-based round trips for the Full JSON and XML codecs and for
//! path addressing.

use aas_model::codec::{
    decode_element_with_options, decode_element_xml, element_paths, encode_element_with_options,
    encode_element_xml, DecodeOptions, EncodeOptions,
};
use aas_model::model::{EntityType, LangStringSet, Reference};
use aas_model::{Depth, ElementTree, PrimitiveValue, SubmodelElement};
use proptest::prelude::*;

// -- Strategy helpers --

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9 _-]{0,10}[a-zA-Z0-9]"
}

fn arb_primitive() -> impl Strategy<Value = PrimitiveValue> {
    prop_oneof![
        any::<i32>().prop_map(PrimitiveValue::Int),
        any::<i64>().prop_map(PrimitiveValue::Long),
        any::<bool>().prop_map(PrimitiveValue::Boolean),
        (-1_000_000i64..1_000_000).prop_map(|v| PrimitiveValue::Double(v as f64 / 8.0)),
        arb_text().prop_map(PrimitiveValue::String),
    ]
}

fn arb_leaf() -> impl Strategy<Value = SubmodelElement> {
    prop_oneof![
        arb_primitive().prop_map(|v| SubmodelElement::property("p", v)),
        (arb_text(), arb_text()).prop_map(|(en, de)| {
            SubmodelElement::multi_language("m", LangStringSet::new().with("en", en).with("de", de))
        }),
        arb_text().prop_map(|v| SubmodelElement::reference_element("r", Reference::global(v))),
        prop::collection::vec(any::<u8>(), 1..16)
            .prop_map(|bytes| SubmodelElement::blob("b", "application/octet-stream", bytes)),
        Just(SubmodelElement::capability("c")),
    ]
}

/// Gives children unique idShorts so keyed containers accept them.
fn rename(children: Vec<SubmodelElement>) -> Vec<SubmodelElement> {
    children
        .into_iter()
        .enumerate()
        .map(|(i, mut child)| {
            child.meta.id_short = Some(format!("e{}", i));
            child
        })
        .collect()
}

/// Clears idShorts so children are addressed by position only.
fn unname(children: Vec<SubmodelElement>) -> Vec<SubmodelElement> {
    children
        .into_iter()
        .map(|mut child| {
            child.meta.id_short = None;
            child
        })
        .collect()
}

fn arb_element() -> impl Strategy<Value = SubmodelElement> {
    arb_leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(|children| {
                let children = rename(children);
                SubmodelElement::collection("coll", |mut c| {
                    for child in children {
                        c = c.element(child);
                    }
                    c
                })
            }),
            prop::collection::vec(inner.clone(), 0..4).prop_map(|children| {
                let children = rename(children);
                SubmodelElement::entity("ent", EntityType::CoManagedEntity, |mut s| {
                    for child in children {
                        s = s.element(child);
                    }
                    s
                })
            }),
            prop::collection::vec(any::<i32>(), 0..5).prop_map(|values| {
                SubmodelElement::list("lst", |mut l| {
                    for v in values {
                        l = l.value(v);
                    }
                    l
                })
            }),
            prop::collection::vec(inner, 0..4).prop_map(|children| {
                SubmodelElement::list("mixed", |mut l| {
                    for child in unname(children) {
                        l = l.element(child);
                    }
                    l
                })
            }),
        ]
    })
}

proptest! {
    #[test]
    fn json_full_round_trip(element in arb_element()) {
        let text = encode_element_with_options(&element, &EncodeOptions::new()).unwrap();
        let decoded = decode_element_with_options(&text, &DecodeOptions::new()).unwrap();
        prop_assert_eq!(decoded, element);
    }

    #[test]
    fn xml_full_round_trip(element in arb_element()) {
        let text = encode_element_xml(&element, &EncodeOptions::new()).unwrap();
        let decoded = decode_element_xml(&text, &DecodeOptions::new()).unwrap();
        prop_assert_eq!(decoded, element);
    }

    /// Every encoded path resolves to a node reporting the same path.
    #[test]
    fn encoded_paths_resolve(element in arb_element()) {
        let paths = element_paths(&element, Depth::Deep);
        prop_assert_eq!(paths.len(), element.subtree_len());

        let mut tree = ElementTree::new();
        tree.create(element).unwrap();
        for path in &paths {
            let node = tree.retrieve(path).unwrap();
            prop_assert_eq!(&node.path(), path);
        }
    }

    /// Deleting a top-level element leaves none of its paths behind.
    #[test]
    fn delete_removes_subtree(element in arb_element()) {
        let paths = element_paths(&element, Depth::Deep);
        let mut tree = ElementTree::new();
        tree.create(element.clone()).unwrap();
        let removed = tree.delete(&paths[0]).unwrap();
        prop_assert_eq!(removed, element);
        prop_assert!(tree.is_empty());
        for path in &paths {
            prop_assert!(!tree.has_child_path(path));
        }
    }
}

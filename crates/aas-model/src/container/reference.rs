//! Model references to tree nodes.
//!
//! A model reference is the key chain from the submodel down to an element:
//! one key per ancestor, typed by the element's variant. List children are
//! keyed by their position.

use crate::container::{Children, ElementTree, NodeId, NodeRef, PathSegment};
use crate::error::ContainerError;
use crate::model::{ChildLayout, Key, KeyType, ModelType, Reference, ReferenceType};

impl ElementTree {
    /// Builds a model reference to the element at `path`.
    ///
    /// The chain starts with a `Submodel` key when the tree was built from a
    /// submodel.
    pub fn reference_to(&self, path: &str) -> Result<Reference, ContainerError> {
        let id = self.resolve_str(path)?;
        let mut keys = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id).ok_or_else(|| ContainerError::NotFound {
                path: path.to_string(),
            })?;
            let parent = node.parent().map(|p| p.id());
            let in_list = match node.parent() {
                Some(p) => p.layout() == Some(ChildLayout::Ordered),
                None => self.root_layout() == ChildLayout::Ordered,
            };
            let value = match node.id_short() {
                Some(id_short) if !in_list => id_short.to_string(),
                _ => self
                    .children_of(parent)
                    .and_then(|c| c.position(node_id))
                    .map(|i| i.to_string())
                    .unwrap_or_default(),
            };
            keys.push(Key::new(node.model_type().key_type(), value));
            current = parent;
        }
        if let Some(submodel_id) = &self.submodel_id {
            keys.push(Key::new(KeyType::Submodel, submodel_id.clone()));
        }
        keys.reverse();
        Ok(Reference::model(keys))
    }

    /// Walks a model reference back to the element it points at.
    pub fn resolve_reference(&self, reference: &Reference) -> Result<NodeRef<'_>, ContainerError> {
        if reference.reference_type != ReferenceType::ModelReference {
            return Err(ContainerError::InvalidArgument(
                "only model references resolve to elements".to_string(),
            ));
        }
        let display = describe(reference);
        let not_found = || ContainerError::NotFound {
            path: display.clone(),
        };

        let mut keys = reference.keys.iter().peekable();
        if let Some(first) = keys.peek() {
            if first.key_type == KeyType::Submodel {
                if let Some(own) = &self.submodel_id {
                    if *own != first.value {
                        return Err(not_found());
                    }
                }
                keys.next();
            }
        }

        let mut current: Option<NodeId> = None;
        for key in keys {
            let children = self.children_of(current).ok_or_else(not_found)?;
            let segment = match (children, key.value.parse::<usize>()) {
                (Children::Ordered(_), Ok(index)) => PathSegment::Index(index),
                _ => PathSegment::Key(key.value.clone()),
            };
            let child = self.find_child(children, &segment).ok_or_else(not_found)?;
            let model_type = self
                .node(child)
                .map(|n| n.model_type())
                .ok_or_else(not_found)?;
            if !key_type_accepts(key.key_type, model_type) {
                return Err(not_found());
            }
            current = Some(child);
        }
        let id = current.ok_or_else(|| {
            ContainerError::InvalidArgument("reference has no element keys".to_string())
        })?;
        self.node(id).ok_or_else(not_found)
    }
}

/// Exact variant keys must match; generic keys accept their whole family.
fn key_type_accepts(key_type: KeyType, model_type: ModelType) -> bool {
    match key_type {
        KeyType::SubmodelElement | KeyType::Referable => true,
        KeyType::DataElement => model_type.is_data_element(),
        KeyType::EventElement => model_type == ModelType::BasicEventElement,
        other => other == model_type.key_type(),
    }
}

fn describe(reference: &Reference) -> String {
    reference
        .keys
        .iter()
        .map(|k| format!("({}){}", k.key_type, k.value))
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Submodel, SubmodelElement};

    fn tree() -> ElementTree {
        let sm = Submodel::new("urn:example:sm").with_element(SubmodelElement::collection(
            "Motor",
            |c| {
                c.property("Speed", 1500_i32)
                    .list("Phases", |l| l.value(1.0).value(2.0))
            },
        ));
        ElementTree::from_submodel(sm).unwrap()
    }

    #[test]
    fn test_reference_to_nested_element() {
        let tree = tree();
        let r = tree.reference_to("Motor.Phases[1]").unwrap();
        assert_eq!(r.reference_type, ReferenceType::ModelReference);
        let keys: Vec<(KeyType, &str)> =
            r.keys.iter().map(|k| (k.key_type, k.value.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                (KeyType::Submodel, "urn:example:sm"),
                (KeyType::SubmodelElementCollection, "Motor"),
                (KeyType::SubmodelElementList, "Phases"),
                (KeyType::Property, "1"),
            ]
        );
    }

    #[test]
    fn test_resolve_round_trip() {
        let tree = tree();
        for path in ["Motor", "Motor.Speed", "Motor.Phases", "Motor.Phases[0]"] {
            let r = tree.reference_to(path).unwrap();
            assert_eq!(tree.resolve_reference(&r).unwrap().path(), path);
        }
    }

    #[test]
    fn test_resolve_rejects_mismatches() {
        let tree = tree();
        let wrong_type = Reference::model(vec![
            Key::new(KeyType::Submodel, "urn:example:sm"),
            Key::new(KeyType::Property, "Motor"),
        ]);
        assert!(tree.resolve_reference(&wrong_type).is_err());

        let generic = Reference::model(vec![
            Key::new(KeyType::SubmodelElement, "Motor"),
            Key::new(KeyType::DataElement, "Speed"),
        ]);
        assert_eq!(tree.resolve_reference(&generic).unwrap().path(), "Motor.Speed");

        let other_submodel = Reference::model(vec![
            Key::new(KeyType::Submodel, "urn:other"),
            Key::new(KeyType::SubmodelElementCollection, "Motor"),
        ]);
        assert!(tree.resolve_reference(&other_submodel).is_err());

        let external = Reference::global("urn:example:sm");
        assert!(tree.resolve_reference(&external).unwrap_err().is_programmer_error());
    }
}

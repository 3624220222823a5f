//! References: ordered key chains pointing at model elements or external
//! resources.

wire_enum! {
    /// Whether a reference points into the model or outside it.
    pub enum ReferenceType {
        ExternalReference => "ExternalReference",
        ModelReference => "ModelReference",
    }
}

wire_enum! {
    /// The kind of thing a single key addresses.
    pub enum KeyType {
        AnnotatedRelationshipElement => "AnnotatedRelationshipElement",
        AssetAdministrationShell => "AssetAdministrationShell",
        BasicEventElement => "BasicEventElement",
        Blob => "Blob",
        Capability => "Capability",
        ConceptDescription => "ConceptDescription",
        DataElement => "DataElement",
        Entity => "Entity",
        EventElement => "EventElement",
        File => "File",
        FragmentReference => "FragmentReference",
        GlobalReference => "GlobalReference",
        Identifiable => "Identifiable",
        MultiLanguageProperty => "MultiLanguageProperty",
        Operation => "Operation",
        Property => "Property",
        Range => "Range",
        Referable => "Referable",
        ReferenceElement => "ReferenceElement",
        RelationshipElement => "RelationshipElement",
        Submodel => "Submodel",
        SubmodelElement => "SubmodelElement",
        SubmodelElementCollection => "SubmodelElementCollection",
        SubmodelElementList => "SubmodelElementList",
    }
}

/// One step of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub key_type: KeyType,
    pub value: String,
}

impl Key {
    pub fn new(key_type: KeyType, value: impl Into<String>) -> Self {
        Self {
            key_type,
            value: value.into(),
        }
    }
}

/// A reference to a model element or an external resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub reference_type: ReferenceType,
    pub keys: Vec<Key>,
    pub referred_semantic_id: Option<Box<Reference>>,
}

impl Reference {
    /// An external reference with a single `GlobalReference` key.
    pub fn global(value: impl Into<String>) -> Self {
        Self::external(vec![Key::new(KeyType::GlobalReference, value)])
    }

    pub fn external(keys: Vec<Key>) -> Self {
        Self {
            reference_type: ReferenceType::ExternalReference,
            keys,
            referred_semantic_id: None,
        }
    }

    pub fn model(keys: Vec<Key>) -> Self {
        Self {
            reference_type: ReferenceType::ModelReference,
            keys,
            referred_semantic_id: None,
        }
    }

    /// Returns true if the reference has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the value of the last key, if any.
    pub fn last_value(&self) -> Option<&str> {
        self.keys.last().map(|k| k.value.as_str())
    }
}

impl Default for Reference {
    /// An empty external reference.
    fn default() -> Self {
        Self::external(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_reference() {
        let r = Reference::global("urn:example:temperature");
        assert_eq!(r.reference_type, ReferenceType::ExternalReference);
        assert_eq!(r.keys.len(), 1);
        assert_eq!(r.keys[0].key_type, KeyType::GlobalReference);
        assert_eq!(r.last_value(), Some("urn:example:temperature"));
    }

    #[test]
    fn test_wire_names_round_trip() {
        for kt in KeyType::ALL {
            assert_eq!(KeyType::from_name(kt.name()), Some(*kt));
        }
        assert_eq!(KeyType::from_name("Blobs"), None);
        assert!(Reference::default().is_empty());
    }
}

//! The identifiable root that owns a top-level element collection.

use uuid::Uuid;

use crate::limits::GENERATED_ID_PREFIX;
use crate::model::element::SubmodelElement;
use crate::model::meta::ElementMeta;

/// A submodel: a globally identified, keyed set of top-level elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Submodel {
    pub id: String,
    pub meta: ElementMeta,
    pub submodel_elements: Vec<SubmodelElement>,
}

impl Submodel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Creates a submodel with a random `urn:uuid:` identifier.
    pub fn with_generated_id() -> Self {
        Self::new(format!("{}{}", GENERATED_ID_PREFIX, Uuid::new_v4()))
    }

    pub fn with_id_short(mut self, id_short: impl Into<String>) -> Self {
        self.meta.id_short = Some(id_short.into());
        self
    }

    pub fn with_element(mut self, element: SubmodelElement) -> Self {
        self.submodel_elements.push(element);
        self
    }

    /// Finds a top-level element by idShort.
    pub fn element(&self, id_short: &str) -> Option<&SubmodelElement> {
        self.submodel_elements
            .iter()
            .find(|e| e.id_short() == Some(id_short))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Capability;

    #[test]
    fn test_generated_ids_are_unique_urns() {
        let a = Submodel::with_generated_id();
        let b = Submodel::with_generated_id();
        assert!(a.id.starts_with("urn:uuid:"));
        assert_eq!(a.id.len(), "urn:uuid:".len() + 36);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_element_lookup() {
        let sm = Submodel::new("urn:example:sm:1")
            .with_id_short("Nameplate")
            .with_element(SubmodelElement::new("Welding", Capability));
        assert!(sm.element("Welding").is_some());
        assert!(sm.element("Drilling").is_none());
    }
}

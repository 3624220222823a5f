//! Metadata shared by every submodel element.

use crate::model::data_type::{DataType, PrimitiveValue};
use crate::model::reference::Reference;

/// A text in one language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LangString {
    pub language: String,
    pub text: String,
}

impl LangString {
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            text: text.into(),
        }
    }
}

/// An ordered set of texts with at most one entry per language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LangStringSet(pub Vec<LangString>);

impl LangStringSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a text, replacing any existing entry for the same language.
    pub fn insert(&mut self, language: impl Into<String>, text: impl Into<String>) {
        let entry = LangString::new(language, text);
        match self.0.iter_mut().find(|s| s.language == entry.language) {
            Some(existing) => existing.text = entry.text,
            None => self.0.push(entry),
        }
    }

    /// Appends a text. Returns the entry back if its language is already present.
    pub fn try_push(&mut self, entry: LangString) -> Result<(), LangString> {
        if self.get(&entry.language).is_some() {
            return Err(entry);
        }
        self.0.push(entry);
        Ok(())
    }

    /// First language that appears more than once.
    pub fn duplicate_language(&self) -> Option<&str> {
        self.0.iter().enumerate().find_map(|(i, s)| {
            self.0[..i]
                .iter()
                .any(|earlier| earlier.language == s.language)
                .then_some(s.language.as_str())
        })
    }

    pub fn with(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(language, text);
        self
    }

    pub fn get(&self, language: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|s| s.language == language)
            .map(|s| s.text.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LangString> {
        self.0.iter()
    }
}

impl FromIterator<LangString> for LangStringSet {
    fn from_iter<I: IntoIterator<Item = LangString>>(iter: I) -> Self {
        let mut set = LangStringSet::new();
        for s in iter {
            set.insert(s.language, s.text);
        }
        set
    }
}

wire_enum! {
    /// Template or instance.
    pub enum ModellingKind {
        Template => "Template",
        Instance => "Instance",
    }
}

wire_enum! {
    pub enum QualifierKind {
        ValueQualifier => "ValueQualifier",
        ConceptQualifier => "ConceptQualifier",
        TemplateQualifier => "TemplateQualifier",
    }
}

/// A typed annotation attached to an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Qualifier {
    pub qualifier_type: String,
    pub value_type: DataType,
    pub value: Option<PrimitiveValue>,
    pub kind: Option<QualifierKind>,
    pub value_id: Option<Reference>,
    pub semantic_id: Option<Reference>,
}

impl Qualifier {
    pub fn new(qualifier_type: impl Into<String>, value: PrimitiveValue) -> Self {
        Self {
            qualifier_type: qualifier_type.into(),
            value_type: value.data_type(),
            value: Some(value),
            kind: None,
            value_id: None,
            semantic_id: None,
        }
    }
}

/// Identity, semantics and documentation of an element.
///
/// `id_short` is optional only for direct children of a List; everywhere
/// else it is required and unique among siblings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementMeta {
    pub id_short: Option<String>,
    pub category: Option<String>,
    pub description: LangStringSet,
    pub display_name: LangStringSet,
    pub semantic_id: Option<Reference>,
    pub supplemental_semantic_ids: Vec<Reference>,
    pub qualifiers: Vec<Qualifier>,
    pub kind: Option<ModellingKind>,
}

impl ElementMeta {
    pub fn with_id_short(id_short: impl Into<String>) -> Self {
        Self {
            id_short: Some(id_short.into()),
            ..Self::default()
        }
    }

    /// Returns the first qualifier of the given type.
    pub fn qualifier(&self, qualifier_type: &str) -> Option<&Qualifier> {
        self.qualifiers
            .iter()
            .find(|q| q.qualifier_type == qualifier_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lang_string_set_replaces_by_language() {
        let mut set = LangStringSet::new().with("en", "Speed").with("de", "Drehzahl");
        set.insert("en", "Rotation speed");
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("en"), Some("Rotation speed"));
        assert_eq!(set.get("fr"), None);
    }

    #[test]
    fn test_lang_string_set_rejects_repeated_language() {
        let mut set = LangStringSet::new();
        set.try_push(LangString::new("en", "a")).unwrap();
        let rejected = set.try_push(LangString::new("en", "b")).unwrap_err();
        assert_eq!(rejected.text, "b");
        assert_eq!(set.get("en"), Some("a"));
        assert_eq!(set.duplicate_language(), None);

        let raw = LangStringSet(vec![
            LangString::new("en", "a"),
            LangString::new("de", "b"),
            LangString::new("en", "c"),
        ]);
        assert_eq!(raw.duplicate_language(), Some("en"));
    }

    #[test]
    fn test_qualifier_lookup() {
        let mut meta = ElementMeta::with_id_short("Speed");
        meta.qualifiers.push(Qualifier::new("Cardinality", "One".into()));
        let q = meta.qualifier("Cardinality").unwrap();
        assert_eq!(q.value_type, DataType::String);
        assert!(meta.qualifier("Multiplicity").is_none());
    }
}

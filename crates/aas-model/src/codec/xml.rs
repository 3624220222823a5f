//! XML codec for the Full and Metadata projections.
//!
//! The variant is the element name (`property`, `submodelElementCollection`)
//! and fields are child elements named like their JSON counterparts. Data
//! types are written in their `xs:` spelling. Decoding first reads the
//! document into a small element tree, then maps it like the JSON decoder.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::codec::{DecodeOptions, EncodeOptions, Projection};
use crate::error::{DecodeError, EncodeError};
use crate::limits::XML_NAMESPACE;
use crate::model::{
    AnnotatedRelationshipElement, BasicEventElement, Blob, Capability, DataType, Direction,
    ElementKind, ElementMeta, Entity, EntityType, File, Key, KeyType, LangString, LangStringSet,
    ModelType, ModellingKind, MultiLanguageProperty, Operation, OperationVariable, PrimitiveValue,
    Property, Qualifier, QualifierKind, Range, Reference, ReferenceElement, ReferenceType,
    RelationshipElement, SpecificAssetId, StateOfEvent, Submodel, SubmodelElement,
    SubmodelElementCollection, SubmodelElementList,
};
use crate::util::XsdDuration;
use crate::validate::validate_list_member;

const SUBMODEL_TAG: &str = "submodel";

// =============================================================================
// PUBLIC API
// =============================================================================

/// Encodes an element as an XML document.
pub fn encode_element_xml(
    element: &SubmodelElement,
    options: &EncodeOptions,
) -> Result<String, EncodeError> {
    let mut w = XmlWriter::new(options)?;
    w.element(element, true)?;
    w.finish()
}

/// Encodes a submodel as an XML document.
pub fn encode_submodel_xml(submodel: &Submodel, options: &EncodeOptions) -> Result<String, EncodeError> {
    let mut w = XmlWriter::new(options)?;
    w.start_root(SUBMODEL_TAG)?;
    w.meta(&submodel.meta)?;
    w.text("id", &submodel.id)?;
    if !w.metadata {
        w.start("submodelElements")?;
        for element in &submodel.submodel_elements {
            w.element(element, false)?;
        }
        w.end("submodelElements")?;
    }
    w.end(SUBMODEL_TAG)?;
    w.finish()
}

/// Decodes an element from an XML document.
pub fn decode_element_xml(input: &str, options: &DecodeOptions) -> Result<SubmodelElement, DecodeError> {
    let root = parse_dom(input, options.max_depth)?;
    XmlDecoder::new(options)
        .element(&root, &root.name, 0)
        .inspect_err(|e| debug!(error = %e, "XML element decode failed"))
}

/// Decodes a submodel from an XML document.
pub fn decode_submodel_xml(input: &str, options: &DecodeOptions) -> Result<Submodel, DecodeError> {
    let root = parse_dom(input, options.max_depth)?;
    XmlDecoder::new(options)
        .submodel(&root)
        .inspect_err(|e| debug!(error = %e, "XML submodel decode failed"))
}

// =============================================================================
// WRITER
// =============================================================================

fn xml_error(e: impl std::fmt::Display) -> EncodeError {
    EncodeError::Xml(e.to_string())
}

struct XmlWriter {
    inner: Writer<Vec<u8>>,
    metadata: bool,
}

impl XmlWriter {
    fn new(options: &EncodeOptions) -> Result<Self, EncodeError> {
        let metadata = match options.projection {
            Projection::Full => false,
            Projection::Metadata => true,
            other => {
                return Err(EncodeError::UnsupportedProjection {
                    projection: other.name(),
                })
            }
        };
        let inner = if options.pretty {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };
        Ok(Self { inner, metadata })
    }

    fn finish(self) -> Result<String, EncodeError> {
        String::from_utf8(self.inner.into_inner()).map_err(xml_error)
    }

    fn start_root(&mut self, name: &str) -> Result<(), EncodeError> {
        let mut start = BytesStart::new(name);
        start.push_attribute(("xmlns", XML_NAMESPACE));
        self.inner.write_event(Event::Start(start)).map_err(xml_error)
    }

    fn start(&mut self, name: &str) -> Result<(), EncodeError> {
        self.inner
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_error)
    }

    fn end(&mut self, name: &str) -> Result<(), EncodeError> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    /// Writes `<name>text</name>`.
    fn text(&mut self, name: &str, text: &str) -> Result<(), EncodeError> {
        self.start(name)?;
        self.inner
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
        self.end(name)
    }

    fn opt_text(&mut self, name: &str, text: Option<&str>) -> Result<(), EncodeError> {
        match text {
            Some(t) => self.text(name, t),
            None => Ok(()),
        }
    }

    fn element(&mut self, element: &SubmodelElement, root: bool) -> Result<(), EncodeError> {
        let tag = element.model_type().xml_tag();
        if root {
            self.start_root(tag)?;
        } else {
            self.start(tag)?;
        }
        self.meta(&element.meta)?;
        self.kind(&element.kind)?;
        self.end(tag)
    }

    fn elements(&mut self, name: &str, elements: &[SubmodelElement]) -> Result<(), EncodeError> {
        self.start(name)?;
        for element in elements {
            self.element(element, false)?;
        }
        self.end(name)
    }

    fn meta(&mut self, meta: &ElementMeta) -> Result<(), EncodeError> {
        self.opt_text("idShort", meta.id_short.as_deref())?;
        self.opt_text("category", meta.category.as_deref())?;
        if !meta.description.is_empty() {
            self.lang_strings("description", "langStringTextType", &meta.description)?;
        }
        if !meta.display_name.is_empty() {
            self.lang_strings("displayName", "langStringNameType", &meta.display_name)?;
        }
        self.opt_reference("semanticId", meta.semantic_id.as_ref())?;
        if !meta.supplemental_semantic_ids.is_empty() {
            self.start("supplementalSemanticIds")?;
            for r in &meta.supplemental_semantic_ids {
                self.reference("reference", r)?;
            }
            self.end("supplementalSemanticIds")?;
        }
        if !meta.qualifiers.is_empty() {
            self.start("qualifiers")?;
            for q in &meta.qualifiers {
                self.qualifier(q)?;
            }
            self.end("qualifiers")?;
        }
        self.opt_text("kind", meta.kind.map(ModellingKind::name))
    }

    fn qualifier(&mut self, q: &Qualifier) -> Result<(), EncodeError> {
        self.start("qualifier")?;
        self.opt_reference("semanticId", q.semantic_id.as_ref())?;
        self.opt_text("kind", q.kind.map(QualifierKind::name))?;
        self.text("type", &q.qualifier_type)?;
        self.text("valueType", q.value_type.xsd_name())?;
        if let Some(v) = &q.value {
            self.text("value", &v.to_text())?;
        }
        self.opt_reference("valueId", q.value_id.as_ref())?;
        self.end("qualifier")
    }

    fn lang_strings(&mut self, name: &str, item: &str, set: &LangStringSet) -> Result<(), EncodeError> {
        self.start(name)?;
        for s in set.iter() {
            self.start(item)?;
            self.text("language", &s.language)?;
            self.text("text", &s.text)?;
            self.end(item)?;
        }
        self.end(name)
    }

    fn reference(&mut self, name: &str, reference: &Reference) -> Result<(), EncodeError> {
        self.start(name)?;
        self.text("type", reference.reference_type.name())?;
        if let Some(referred) = &reference.referred_semantic_id {
            self.reference("referredSemanticId", referred)?;
        }
        self.start("keys")?;
        for key in &reference.keys {
            self.start("key")?;
            self.text("type", key.key_type.name())?;
            self.text("value", &key.value)?;
            self.end("key")?;
        }
        self.end("keys")?;
        self.end(name)
    }

    fn opt_reference(&mut self, name: &str, reference: Option<&Reference>) -> Result<(), EncodeError> {
        match reference {
            Some(r) => self.reference(name, r),
            None => Ok(()),
        }
    }

    fn primitive(&mut self, name: &str, value: Option<&PrimitiveValue>) -> Result<(), EncodeError> {
        match value {
            Some(v) => self.text(name, &v.to_text()),
            None => Ok(()),
        }
    }

    fn variables(&mut self, name: &str, variables: &[OperationVariable]) -> Result<(), EncodeError> {
        if variables.is_empty() {
            return Ok(());
        }
        self.start(name)?;
        for variable in variables {
            self.start("operationVariable")?;
            self.start("value")?;
            self.element(&variable.value, false)?;
            self.end("value")?;
            self.end("operationVariable")?;
        }
        self.end(name)
    }

    fn kind(&mut self, kind: &ElementKind) -> Result<(), EncodeError> {
        let full = !self.metadata;
        match kind {
            ElementKind::Property(p) => {
                self.text("valueType", p.value_type.xsd_name())?;
                if full {
                    self.primitive("value", p.value.as_ref())?;
                    self.opt_reference("valueId", p.value_id.as_ref())?;
                }
            }
            ElementKind::Range(r) => {
                self.text("valueType", r.value_type.xsd_name())?;
                if full {
                    self.primitive("min", r.min.as_ref())?;
                    self.primitive("max", r.max.as_ref())?;
                }
            }
            ElementKind::MultiLanguageProperty(m) => {
                if full {
                    if !m.value.is_empty() {
                        self.lang_strings("value", "langStringTextType", &m.value)?;
                    }
                    self.opt_reference("valueId", m.value_id.as_ref())?;
                }
            }
            ElementKind::File(f) => {
                if full {
                    self.opt_text("value", f.value.as_deref())?;
                }
                self.text("contentType", &f.content_type)?;
            }
            ElementKind::Blob(b) => {
                if full {
                    if let Some(bytes) = &b.value {
                        self.text("value", &BASE64.encode(bytes))?;
                    }
                }
                self.text("contentType", &b.content_type)?;
            }
            ElementKind::ReferenceElement(r) => {
                if full {
                    self.opt_reference("value", r.value.as_ref())?;
                }
            }
            ElementKind::RelationshipElement(r) => {
                if full {
                    self.reference("first", &r.first)?;
                    self.reference("second", &r.second)?;
                }
            }
            ElementKind::AnnotatedRelationshipElement(a) => {
                if full {
                    self.reference("first", &a.first)?;
                    self.reference("second", &a.second)?;
                    if !a.annotations.is_empty() {
                        self.elements("annotations", &a.annotations)?;
                    }
                }
            }
            ElementKind::SubmodelElementCollection(c) => {
                if full {
                    self.elements("value", &c.value)?;
                }
            }
            ElementKind::SubmodelElementList(l) => {
                if let Some(order_relevant) = l.order_relevant {
                    self.text("orderRelevant", if order_relevant { "true" } else { "false" })?;
                }
                self.opt_reference("semanticIdListElement", l.semantic_id_list_element.as_ref())?;
                self.opt_text("typeValueListElement", l.type_value_list_element.map(ModelType::name))?;
                self.opt_text(
                    "valueTypeListElement",
                    l.value_type_list_element.map(DataType::xsd_name),
                )?;
                if full {
                    self.elements("value", &l.value)?;
                }
            }
            ElementKind::Operation(o) => {
                if full {
                    self.variables("inputVariables", &o.input_variables)?;
                    self.variables("outputVariables", &o.output_variables)?;
                    self.variables("inoutputVariables", &o.inoutput_variables)?;
                }
            }
            ElementKind::Entity(e) => {
                if full {
                    self.elements("statements", &e.statements)?;
                }
                self.opt_text("entityType", e.entity_type.map(EntityType::name))?;
                if full {
                    self.opt_text("globalAssetId", e.global_asset_id.as_deref())?;
                    if !e.specific_asset_ids.is_empty() {
                        self.start("specificAssetIds")?;
                        for id in &e.specific_asset_ids {
                            self.start("specificAssetId")?;
                            self.text("name", &id.name)?;
                            self.text("value", &id.value)?;
                            self.opt_reference("externalSubjectId", id.external_subject_id.as_ref())?;
                            self.end("specificAssetId")?;
                        }
                        self.end("specificAssetIds")?;
                    }
                }
            }
            ElementKind::BasicEventElement(b) => {
                if full {
                    self.reference("observed", &b.observed)?;
                }
                self.text("direction", b.direction.name())?;
                self.text("state", b.state.name())?;
                self.opt_text("messageTopic", b.message_topic.as_deref())?;
                self.opt_reference("messageBroker", b.message_broker.as_ref())?;
                if full {
                    if let Some(t) = &b.last_update {
                        self.text("lastUpdate", &t.to_rfc3339_opts(SecondsFormat::AutoSi, true))?;
                    }
                }
                if let Some(d) = &b.min_interval {
                    self.text("minInterval", &d.to_string())?;
                }
                if let Some(d) = &b.max_interval {
                    self.text("maxInterval", &d.to_string())?;
                }
            }
            ElementKind::Capability(_) => {}
        }
        Ok(())
    }
}

// =============================================================================
// DOCUMENT TREE
// =============================================================================

#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn syntax(e: impl std::fmt::Display) -> DecodeError {
    DecodeError::Xml(e.to_string())
}

fn local_name(start: &BytesStart<'_>) -> Result<String, DecodeError> {
    std::str::from_utf8(start.local_name().as_ref())
        .map(str::to_string)
        .map_err(syntax)
}

/// Reads the whole document into an element tree.
fn parse_dom(input: &str, max_depth: usize) -> Result<XmlNode, DecodeError> {
    // Each element level costs up to four XML levels (operation variables).
    let max_nesting = max_depth.saturating_mul(4).saturating_add(8);
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event().map_err(syntax)? {
            Event::Start(start) => {
                if stack.len() >= max_nesting {
                    let field = stack.iter().map(|n| n.name.as_str()).collect::<Vec<_>>().join("/");
                    return Err(DecodeError::DepthExceeded {
                        field,
                        max: max_depth,
                    });
                }
                stack.push(XmlNode::new(local_name(&start)?));
            }
            Event::Empty(start) => {
                let node = XmlNode::new(local_name(&start)?);
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| syntax("unbalanced end tag"))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape().map_err(syntax)?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    let raw = data.into_inner();
                    top.text.push_str(std::str::from_utf8(&raw).map_err(syntax)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(syntax("unexpected end of document"));
    }
    root.ok_or_else(|| syntax("document has no root element"))
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(syntax("multiple root elements")),
    }
    Ok(())
}

// =============================================================================
// DECODER
// =============================================================================

fn field(location: &str, name: &str) -> String {
    format!("{}/{}", location, name)
}

fn required<'n>(node: &'n XmlNode, name: &str, location: &str) -> Result<&'n XmlNode, DecodeError> {
    node.child(name).ok_or_else(|| DecodeError::MissingField {
        field: field(location, name),
    })
}

fn opt_text<'n>(node: &'n XmlNode, name: &str) -> Option<&'n str> {
    node.child(name).map(|c| c.text.as_str())
}

fn required_text<'n>(node: &'n XmlNode, name: &str, location: &str) -> Result<&'n str, DecodeError> {
    required(node, name, location).map(|c| c.text.as_str())
}

fn enum_text<T>(
    node: &XmlNode,
    name: &str,
    location: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, DecodeError> {
    match opt_text(node, name) {
        None => Ok(None),
        Some(text) => parse(text.trim())
            .map(Some)
            .ok_or_else(|| DecodeError::MalformedStructure {
                field: field(location, name),
                reason: format!("unknown value {:?}", text),
            }),
    }
}

fn required_enum<T>(
    node: &XmlNode,
    name: &str,
    location: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, DecodeError> {
    enum_text(node, name, location, parse)?.ok_or_else(|| DecodeError::MissingField {
        field: field(location, name),
    })
}

fn primitive(
    node: &XmlNode,
    name: &str,
    location: &str,
    data_type: DataType,
) -> Result<Option<PrimitiveValue>, DecodeError> {
    match opt_text(node, name) {
        None => Ok(None),
        Some(text) => data_type
            .parse(text)
            .map(Some)
            .map_err(|_| DecodeError::TypeMismatch {
                field: field(location, name),
                expected: data_type.name().to_string(),
                found: format!("{:?}", text),
            }),
    }
}

fn reference(node: &XmlNode, location: &str) -> Result<Reference, DecodeError> {
    let reference_type = required_enum(node, "type", location, ReferenceType::from_name)?;
    let referred_semantic_id = match node.child("referredSemanticId") {
        Some(r) => Some(Box::new(reference(r, &field(location, "referredSemanticId"))?)),
        None => None,
    };
    let mut keys = Vec::new();
    if let Some(list) = node.child("keys") {
        let keys_location = field(location, "keys");
        for (i, key) in list.children.iter().enumerate() {
            let key_location = format!("{}/key[{}]", keys_location, i);
            keys.push(Key {
                key_type: required_enum(key, "type", &key_location, KeyType::from_name)?,
                value: required_text(key, "value", &key_location)?.to_string(),
            });
        }
    }
    Ok(Reference {
        reference_type,
        keys,
        referred_semantic_id,
    })
}

fn opt_reference(node: &XmlNode, name: &str, location: &str) -> Result<Option<Reference>, DecodeError> {
    match node.child(name) {
        Some(r) => reference(r, &field(location, name)).map(Some),
        None => Ok(None),
    }
}

fn lang_strings(node: &XmlNode, location: &str) -> Result<LangStringSet, DecodeError> {
    let mut set = LangStringSet::new();
    for (i, item) in node.children.iter().enumerate() {
        let item_location = format!("{}/{}[{}]", location, item.name, i);
        let entry = LangString::new(
            required_text(item, "language", &item_location)?.trim(),
            required_text(item, "text", &item_location)?,
        );
        set.try_push(entry)
            .map_err(|dup| DecodeError::MalformedStructure {
                field: item_location.clone(),
                reason: format!("language {:?} appears more than once", dup.language),
            })?;
    }
    Ok(set)
}

fn duration(node: &XmlNode, name: &str, location: &str) -> Result<Option<XsdDuration>, DecodeError> {
    match opt_text(node, name) {
        None => Ok(None),
        Some(text) => text
            .trim()
            .parse::<XsdDuration>()
            .map(Some)
            .map_err(|_| DecodeError::TypeMismatch {
                field: field(location, name),
                expected: "duration".to_string(),
                found: format!("{:?}", text),
            }),
    }
}

fn meta(node: &XmlNode, location: &str) -> Result<ElementMeta, DecodeError> {
    let mut meta = ElementMeta {
        id_short: opt_text(node, "idShort").map(|t| t.trim().to_string()),
        category: opt_text(node, "category").map(|t| t.trim().to_string()),
        semantic_id: opt_reference(node, "semanticId", location)?,
        kind: enum_text(node, "kind", location, ModellingKind::from_name)?,
        ..ElementMeta::default()
    };
    if let Some(d) = node.child("description") {
        meta.description = lang_strings(d, &field(location, "description"))?;
    }
    if let Some(d) = node.child("displayName") {
        meta.display_name = lang_strings(d, &field(location, "displayName"))?;
    }
    if let Some(list) = node.child("supplementalSemanticIds") {
        let list_location = field(location, "supplementalSemanticIds");
        for (i, r) in list.children.iter().enumerate() {
            meta.supplemental_semantic_ids
                .push(reference(r, &format!("{}/reference[{}]", list_location, i))?);
        }
    }
    if let Some(list) = node.child("qualifiers") {
        let list_location = field(location, "qualifiers");
        for (i, q) in list.children.iter().enumerate() {
            let q_location = format!("{}/qualifier[{}]", list_location, i);
            let value_type = required_enum(q, "valueType", &q_location, DataType::from_name)?;
            meta.qualifiers.push(Qualifier {
                qualifier_type: required_text(q, "type", &q_location)?.trim().to_string(),
                value_type,
                value: primitive(q, "value", &q_location, value_type)?,
                kind: enum_text(q, "kind", &q_location, QualifierKind::from_name)?,
                value_id: opt_reference(q, "valueId", &q_location)?,
                semantic_id: opt_reference(q, "semanticId", &q_location)?,
            });
        }
    }
    Ok(meta)
}

struct XmlDecoder<'o> {
    options: &'o DecodeOptions,
}

impl<'o> XmlDecoder<'o> {
    fn new(options: &'o DecodeOptions) -> Self {
        Self { options }
    }

    fn full(&self) -> bool {
        !self.options.is_metadata()
    }

    fn submodel(&self, node: &XmlNode) -> Result<Submodel, DecodeError> {
        if node.name != SUBMODEL_TAG {
            return Err(DecodeError::UnknownVariant {
                field: node.name.clone(),
                tag: node.name.clone(),
            });
        }
        let location = SUBMODEL_TAG;
        Ok(Submodel {
            id: required_text(node, "id", location)?.trim().to_string(),
            meta: meta(node, location)?,
            submodel_elements: self.keyed_children(node, "submodelElements", location, 0)?,
        })
    }

    fn element(&self, node: &XmlNode, location: &str, depth: usize) -> Result<SubmodelElement, DecodeError> {
        if depth > self.options.max_depth {
            return Err(DecodeError::DepthExceeded {
                field: location.to_string(),
                max: self.options.max_depth,
            });
        }
        let model_type = ModelType::from_xml_tag(&node.name).ok_or_else(|| DecodeError::UnknownVariant {
            field: location.to_string(),
            tag: node.name.clone(),
        })?;
        Ok(SubmodelElement {
            meta: meta(node, location)?,
            kind: self.kind(node, model_type, location, depth)?,
        })
    }

    fn kind(
        &self,
        node: &XmlNode,
        model_type: ModelType,
        location: &str,
        depth: usize,
    ) -> Result<ElementKind, DecodeError> {
        let full = self.full();
        let value_node = node.child("value").filter(|_| full);
        let kind = match model_type {
            ModelType::Property => {
                let value_type = required_enum(node, "valueType", location, DataType::from_name)?;
                ElementKind::Property(Property {
                    value_type,
                    value: if full {
                        primitive(node, "value", location, value_type)?
                    } else {
                        None
                    },
                    value_id: self.value_reference(node, "valueId", location)?,
                })
            }
            ModelType::Range => {
                let value_type = required_enum(node, "valueType", location, DataType::from_name)?;
                let (min, max) = if full {
                    (
                        primitive(node, "min", location, value_type)?,
                        primitive(node, "max", location, value_type)?,
                    )
                } else {
                    (None, None)
                };
                ElementKind::Range(Range { value_type, min, max })
            }
            ModelType::MultiLanguageProperty => ElementKind::MultiLanguageProperty(MultiLanguageProperty {
                value: match value_node {
                    Some(v) => lang_strings(v, &field(location, "value"))?,
                    None => LangStringSet::new(),
                },
                value_id: self.value_reference(node, "valueId", location)?,
            }),
            ModelType::File => ElementKind::File(File {
                content_type: opt_text(node, "contentType").unwrap_or_default().trim().to_string(),
                value: value_node.map(|v| v.text.trim().to_string()),
            }),
            ModelType::Blob => {
                let value = match value_node {
                    Some(v) => Some(BASE64.decode(v.text.trim()).map_err(|_| DecodeError::TypeMismatch {
                        field: field(location, "value"),
                        expected: "base64".to_string(),
                        found: format!("{:?}", v.text),
                    })?),
                    None => None,
                };
                ElementKind::Blob(Blob {
                    content_type: opt_text(node, "contentType").unwrap_or_default().trim().to_string(),
                    value,
                })
            }
            ModelType::ReferenceElement => ElementKind::ReferenceElement(ReferenceElement {
                value: self.value_reference(node, "value", location)?,
            }),
            ModelType::RelationshipElement => ElementKind::RelationshipElement(RelationshipElement {
                first: self.required_reference(node, "first", location)?,
                second: self.required_reference(node, "second", location)?,
            }),
            ModelType::AnnotatedRelationshipElement => {
                let annotations = self.keyed_children(node, "annotations", location, depth)?;
                if let Some(a) = annotations.iter().find(|a| !a.model_type().is_data_element()) {
                    return Err(DecodeError::MalformedStructure {
                        field: field(location, "annotations"),
                        reason: format!("{} is not a data element", a.model_type()),
                    });
                }
                ElementKind::AnnotatedRelationshipElement(AnnotatedRelationshipElement {
                    first: self.required_reference(node, "first", location)?,
                    second: self.required_reference(node, "second", location)?,
                    annotations,
                })
            }
            ModelType::SubmodelElementCollection => {
                ElementKind::SubmodelElementCollection(SubmodelElementCollection {
                    value: self.keyed_children(node, "value", location, depth)?,
                })
            }
            ModelType::SubmodelElementList => {
                let order_relevant = match opt_text(node, "orderRelevant").map(str::trim) {
                    None => None,
                    Some("true") | Some("1") => Some(true),
                    Some("false") | Some("0") => Some(false),
                    Some(other) => {
                        return Err(DecodeError::TypeMismatch {
                            field: field(location, "orderRelevant"),
                            expected: "boolean".to_string(),
                            found: format!("{:?}", other),
                        })
                    }
                };
                let mut list = SubmodelElementList {
                    type_value_list_element: enum_text(
                        node,
                        "typeValueListElement",
                        location,
                        ModelType::from_name,
                    )?,
                    value_type_list_element: enum_text(
                        node,
                        "valueTypeListElement",
                        location,
                        DataType::from_name,
                    )?,
                    order_relevant,
                    semantic_id_list_element: opt_reference(node, "semanticIdListElement", location)?,
                    value: Vec::new(),
                };
                if let Some(items) = value_node {
                    let list_name = opt_text(node, "idShort").unwrap_or_default().trim().to_string();
                    let value_location = field(location, "value");
                    for (i, item) in items.children.iter().enumerate() {
                        let item_location = format!("{}/{}[{}]", value_location, item.name, i);
                        let child = self.element(item, &item_location, depth + 1)?;
                        validate_list_member(&list_name, &list, &child).map_err(|e| {
                            DecodeError::MalformedStructure {
                                field: item_location.clone(),
                                reason: e.to_string(),
                            }
                        })?;
                        list.value.push(child);
                    }
                }
                ElementKind::SubmodelElementList(list)
            }
            ModelType::Operation => ElementKind::Operation(Operation {
                input_variables: self.variables(node, "inputVariables", location, depth)?,
                output_variables: self.variables(node, "outputVariables", location, depth)?,
                inoutput_variables: self.variables(node, "inoutputVariables", location, depth)?,
            }),
            ModelType::Entity => {
                let mut specific_asset_ids = Vec::new();
                if let Some(list) = node.child("specificAssetIds").filter(|_| full) {
                    let list_location = field(location, "specificAssetIds");
                    for (i, item) in list.children.iter().enumerate() {
                        let item_location = format!("{}/specificAssetId[{}]", list_location, i);
                        specific_asset_ids.push(SpecificAssetId {
                            name: required_text(item, "name", &item_location)?.trim().to_string(),
                            value: required_text(item, "value", &item_location)?.trim().to_string(),
                            external_subject_id: opt_reference(item, "externalSubjectId", &item_location)?,
                        });
                    }
                }
                ElementKind::Entity(Entity {
                    entity_type: enum_text(node, "entityType", location, EntityType::from_name)?,
                    global_asset_id: opt_text(node, "globalAssetId")
                        .filter(|_| full)
                        .map(|t| t.trim().to_string()),
                    specific_asset_ids,
                    statements: self.keyed_children(node, "statements", location, depth)?,
                })
            }
            ModelType::BasicEventElement => {
                let last_update = match opt_text(node, "lastUpdate").filter(|_| full) {
                    Some(text) => Some(DateTime::parse_from_rfc3339(text.trim()).map_err(|_| {
                        DecodeError::TypeMismatch {
                            field: field(location, "lastUpdate"),
                            expected: "dateTime".to_string(),
                            found: format!("{:?}", text),
                        }
                    })?),
                    None => None,
                };
                ElementKind::BasicEventElement(BasicEventElement {
                    observed: self.required_reference(node, "observed", location)?,
                    direction: required_enum(node, "direction", location, Direction::from_name)?,
                    state: required_enum(node, "state", location, StateOfEvent::from_name)?,
                    message_topic: opt_text(node, "messageTopic").map(|t| t.trim().to_string()),
                    message_broker: opt_reference(node, "messageBroker", location)?,
                    last_update,
                    min_interval: duration(node, "minInterval", location)?,
                    max_interval: duration(node, "maxInterval", location)?,
                })
            }
            ModelType::Capability => ElementKind::Capability(Capability),
        };
        Ok(kind)
    }

    fn keyed_children(
        &self,
        node: &XmlNode,
        name: &str,
        location: &str,
        depth: usize,
    ) -> Result<Vec<SubmodelElement>, DecodeError> {
        let Some(list) = node.child(name).filter(|_| self.full()) else {
            return Ok(Vec::new());
        };
        let list_location = field(location, name);
        let mut seen = FxHashSet::default();
        let mut children = Vec::with_capacity(list.children.len());
        for (i, item) in list.children.iter().enumerate() {
            let item_location = format!("{}/{}[{}]", list_location, item.name, i);
            let child = self.element(item, &item_location, depth + 1)?;
            let Some(id_short) = child.id_short() else {
                return Err(DecodeError::MissingField {
                    field: field(&item_location, "idShort"),
                });
            };
            if !seen.insert(id_short.to_string()) {
                return Err(DecodeError::MalformedStructure {
                    field: item_location,
                    reason: format!("duplicate idShort {:?}", id_short),
                });
            }
            children.push(child);
        }
        Ok(children)
    }

    fn variables(
        &self,
        node: &XmlNode,
        name: &str,
        location: &str,
        depth: usize,
    ) -> Result<Vec<OperationVariable>, DecodeError> {
        let Some(list) = node.child(name).filter(|_| self.full()) else {
            return Ok(Vec::new());
        };
        let list_location = field(location, name);
        let mut variables = Vec::new();
        for (i, item) in list.children.iter().enumerate() {
            let item_location = format!("{}/operationVariable[{}]", list_location, i);
            let wrapper = required(item, "value", &item_location)?;
            let value_location = field(&item_location, "value");
            let inner = wrapper.children.first().ok_or_else(|| DecodeError::MissingField {
                field: value_location.clone(),
            })?;
            variables.push(OperationVariable {
                value: self.element(inner, &field(&value_location, &inner.name), depth + 1)?,
            });
        }
        Ok(variables)
    }

    fn value_reference(
        &self,
        node: &XmlNode,
        name: &str,
        location: &str,
    ) -> Result<Option<Reference>, DecodeError> {
        if !self.full() {
            return Ok(None);
        }
        opt_reference(node, name, location)
    }

    fn required_reference(&self, node: &XmlNode, name: &str, location: &str) -> Result<Reference, DecodeError> {
        if !self.full() {
            return Ok(Reference::default());
        }
        reference(required(node, name, location)?, &field(location, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeErrorKind;

    fn motor() -> SubmodelElement {
        SubmodelElement::collection("Motor", |c| {
            c.property("Speed", 1500_i32)
                .property("Label", "a < b & c")
                .list("Phases", |l| l.value(1.0).value(2.0))
                .element(SubmodelElement::file("Manual", "application/pdf", "/docs/manual.pdf"))
                .element(
                    SubmodelElement::entity("Drive", EntityType::CoManagedEntity, |s| {
                        s.property("Serial", "D-9")
                    })
                    .with_semantic_id(Reference::global("urn:drive")),
                )
        })
        .with_description("en", "main motor")
    }

    #[test]
    fn test_round_trip() {
        let element = motor();
        for options in [EncodeOptions::new(), EncodeOptions::new().pretty()] {
            let xml = encode_element_xml(&element, &options).unwrap();
            let decoded = decode_element_xml(&xml, &DecodeOptions::new()).unwrap();
            assert_eq!(decoded, element);
        }
    }

    #[test]
    fn test_document_shape() {
        let xml = encode_element_xml(&SubmodelElement::property("x", 1.0), &EncodeOptions::new()).unwrap();
        assert_eq!(
            xml,
            format!(
                "<property xmlns=\"{}\"><idShort>x</idShort><valueType>xs:double</valueType><value>1.0</value></property>",
                XML_NAMESPACE
            )
        );
    }

    #[test]
    fn test_repeated_language_rejected() {
        let repeated = LangStringSet(vec![LangString::new("en", "a"), LangString::new("en", "b")]);
        let mut element = SubmodelElement::multi_language("m", repeated.clone());
        let xml = encode_element_xml(&element, &EncodeOptions::new()).unwrap();
        let err = decode_element_xml(&xml, &DecodeOptions::new()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedStructure);

        element = SubmodelElement::property("p", 1_i32);
        element.meta.display_name = repeated;
        let xml = encode_element_xml(&element, &EncodeOptions::new()).unwrap();
        let err = decode_element_xml(&xml, &DecodeOptions::new()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedStructure);
    }

    #[test]
    fn test_metadata_projection() {
        let xml = encode_element_xml(&motor(), &EncodeOptions::metadata()).unwrap();
        assert!(!xml.contains("<value>"));
        assert!(xml.contains("<description>"));
        let decoded = decode_element_xml(&xml, &DecodeOptions::metadata()).unwrap();
        assert!(decoded.children().unwrap().is_empty());
        assert_eq!(decoded.meta, motor().meta);
    }

    #[test]
    fn test_unsupported_projection() {
        let err = encode_element_xml(&motor(), &EncodeOptions::value_only()).unwrap_err();
        assert_eq!(err, EncodeError::UnsupportedProjection { projection: "Value" });
    }

    #[test]
    fn test_decode_errors() {
        let err = decode_element_xml("<gadget><idShort>x</idShort></gadget>", &DecodeOptions::new())
            .unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::UnknownVariant);

        let err = decode_element_xml("<property><idShort>x</idShort></property>", &DecodeOptions::new())
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                field: "property/valueType".to_string()
            }
        );

        let err = decode_element_xml(
            "<property><valueType>xs:int</valueType><value>1.5</value></property>",
            &DecodeOptions::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::TypeMismatch);

        let err = decode_element_xml("<property><idShort>x</property>", &DecodeOptions::new()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::Syntax);
    }

    #[test]
    fn test_submodel_round_trip() {
        let submodel = Submodel::new("urn:example:sm")
            .with_id_short("Technical")
            .with_element(motor())
            .with_element(SubmodelElement::operation("Start"));
        let xml = encode_submodel_xml(&submodel, &EncodeOptions::new()).unwrap();
        assert!(xml.starts_with("<submodel xmlns="));
        assert_eq!(decode_submodel_xml(&xml, &DecodeOptions::new()).unwrap(), submodel);
    }
}

//! JSON codec.
//!
//! Full and Metadata are handled here. Value and Path projections are
//! dispatched to their own modules so every entry point accepts any
//! projection.
//!
//! Decoding reads `modelType` before anything else, then fills the variant's
//! fields. Containers re-enter the element decoder one level deeper, bounded
//! by `DecodeOptions::max_depth`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat};
use rustc_hash::FxHashSet;
use serde_json::{Map, Value};
use tracing::debug;

use crate::codec::path_only::{element_paths, node_paths, submodel_paths, tree_paths};
use crate::codec::primitives::{
    item_location, json_type_name, lang_strings_from_json, lang_strings_to_json,
    primitive_from_json, primitive_to_json, reference_from_json, reference_to_json, ObjectReader,
};
use crate::codec::value_only::{element_value, scope_to_json};
use crate::codec::{write_json, DecodeOptions, EncodeOptions, Projection};
use crate::container::{ElementTree, NodeRef};
use crate::error::{DecodeError, EncodeError};
use crate::model::{
    AnnotatedRelationshipElement, BasicEventElement, Blob, Capability, ChildLayout, DataType,
    Direction, ElementKind, ElementMeta, Entity, EntityType, File, ModelType, ModellingKind,
    MultiLanguageProperty, Operation, OperationVariable, PrimitiveValue, Property, Qualifier,
    QualifierKind, Range, Reference, ReferenceElement, RelationshipElement, SpecificAssetId,
    StateOfEvent, Submodel, SubmodelElement, SubmodelElementCollection, SubmodelElementList,
};
use crate::util::XsdDuration;
use crate::validate::validate_list_member;

const SUBMODEL_MODEL_TYPE: &str = "Submodel";

// =============================================================================
// PUBLIC API
// =============================================================================

/// Encodes an element with the Full projection.
pub fn encode_element(element: &SubmodelElement) -> Result<String, EncodeError> {
    encode_element_with_options(element, &EncodeOptions::default())
}

/// Encodes an element with the given projection.
pub fn encode_element_with_options(
    element: &SubmodelElement,
    options: &EncodeOptions,
) -> Result<String, EncodeError> {
    write_json(&element_to_json(element, options), options.pretty)
}

/// Builds the JSON document for one element.
pub fn element_to_json(element: &SubmodelElement, options: &EncodeOptions) -> Value {
    match options.projection {
        Projection::Full => Value::Object(encode_full(element, false)),
        Projection::Metadata => Value::Object(encode_full(element, true)),
        Projection::Value => element_value(element, options.depth),
        Projection::Path => string_array(element_paths(element, options.depth)),
    }
}

/// Encodes the node at its position in the tree.
///
/// The Value projection reads through bound value sources; Path uses the
/// node's absolute paths.
pub fn encode_node(node: NodeRef<'_>, options: &EncodeOptions) -> Result<String, EncodeError> {
    let value = match options.projection {
        Projection::Full | Projection::Metadata => element_to_json(&node.to_element(), options),
        Projection::Value => match node.value()? {
            Some(scope) => scope_to_json(&scope, options.depth),
            None => Value::Null,
        },
        Projection::Path => string_array(node_paths(node, options.depth)),
    };
    write_json(&value, options.pretty)
}

/// Encodes the top level of a tree.
///
/// Full and Metadata produce an array of element objects. Value produces an
/// object keyed by idShort, or an array for an ordered tree.
pub fn encode_tree(tree: &ElementTree, options: &EncodeOptions) -> Result<String, EncodeError> {
    let value = match options.projection {
        Projection::Full | Projection::Metadata => Value::Array(
            tree.to_elements()
                .iter()
                .map(|e| element_to_json(e, options))
                .collect(),
        ),
        Projection::Value => {
            let mut members = Vec::new();
            for node in tree.roots() {
                if let Some(scope) = node.value()? {
                    members.push((node.key(), scope_to_json(&scope, options.depth)));
                }
            }
            match tree.root_layout() {
                ChildLayout::Keyed => Value::Object(members.into_iter().collect()),
                ChildLayout::Ordered => Value::Array(members.into_iter().map(|(_, v)| v).collect()),
            }
        }
        Projection::Path => string_array(tree_paths(tree, options.depth)),
    };
    write_json(&value, options.pretty)
}

/// Decodes a Full element document.
pub fn decode_element(input: &str) -> Result<SubmodelElement, DecodeError> {
    decode_element_with_options(input, &DecodeOptions::default())
}

pub fn decode_element_with_options(
    input: &str,
    options: &DecodeOptions,
) -> Result<SubmodelElement, DecodeError> {
    let value = parse_document(input)?;
    element_from_json(&value, options).inspect_err(|e| debug!(error = %e, "element decode failed"))
}

/// Decodes one element from an already parsed document.
pub fn element_from_json(
    value: &Value,
    options: &DecodeOptions,
) -> Result<SubmodelElement, DecodeError> {
    Decoder::new(options).element(value, "$", 0)
}

/// Decodes an array of Full elements into a tree whose top level follows
/// `options.root_layout`.
pub fn decode_tree(input: &str, options: &DecodeOptions) -> Result<ElementTree, DecodeError> {
    let value = parse_document(input)?;
    let Value::Array(items) = &value else {
        return Err(DecodeError::TypeMismatch {
            field: "$".to_string(),
            expected: "array".to_string(),
            found: json_type_name(&value).to_string(),
        });
    };
    let decoder = Decoder::new(options);
    let mut elements = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        elements.push(decoder.element(item, &item_location("$", i), 0)?);
    }
    ElementTree::from_elements_with_layout(options.root_layout, elements).map_err(|e| {
        debug!(error = %e, "tree decode failed");
        DecodeError::MalformedStructure {
            field: "$".to_string(),
            reason: e.to_string(),
        }
    })
}

/// Encodes a submodel with the Full projection.
pub fn encode_submodel(submodel: &Submodel) -> Result<String, EncodeError> {
    encode_submodel_with_options(submodel, &EncodeOptions::default())
}

/// Encodes a submodel with the given projection.
///
/// Value produces an object keyed by the top-level idShorts; Path lists the
/// element paths.
pub fn encode_submodel_with_options(
    submodel: &Submodel,
    options: &EncodeOptions,
) -> Result<String, EncodeError> {
    let value = match options.projection {
        Projection::Full | Projection::Metadata => {
            let metadata = options.projection == Projection::Metadata;
            let mut obj = Map::new();
            write_header(&mut obj, &submodel.meta, SUBMODEL_MODEL_TYPE);
            obj.insert("id".to_string(), Value::from(submodel.id.as_str()));
            write_meta(&mut obj, &submodel.meta);
            if !metadata {
                obj.insert(
                    "submodelElements".to_string(),
                    elements_to_json(&submodel.submodel_elements, false),
                );
            }
            Value::Object(obj)
        }
        Projection::Value => Value::Object(
            submodel
                .submodel_elements
                .iter()
                .filter(|e| e.has_value())
                .map(|e| {
                    (
                        e.id_short().unwrap_or_default().to_string(),
                        element_value(e, options.depth),
                    )
                })
                .collect(),
        ),
        Projection::Path => string_array(submodel_paths(submodel, options.depth)),
    };
    write_json(&value, options.pretty)
}

/// Decodes a Full submodel document.
pub fn decode_submodel(input: &str) -> Result<Submodel, DecodeError> {
    decode_submodel_with_options(input, &DecodeOptions::default())
}

pub fn decode_submodel_with_options(
    input: &str,
    options: &DecodeOptions,
) -> Result<Submodel, DecodeError> {
    let value = parse_document(input)?;
    Decoder::new(options)
        .submodel(&value)
        .inspect_err(|e| debug!(error = %e, "submodel decode failed"))
}

pub(crate) fn parse_document(input: &str) -> Result<Value, DecodeError> {
    serde_json::from_str(input).map_err(|e| {
        debug!(error = %e, "JSON syntax error");
        DecodeError::Json(e.to_string())
    })
}

fn string_array(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}

// =============================================================================
// ENCODING
// =============================================================================

fn encode_full(element: &SubmodelElement, metadata: bool) -> Map<String, Value> {
    let mut obj = Map::new();
    write_header(&mut obj, &element.meta, element.model_type().name());
    write_meta(&mut obj, &element.meta);
    write_kind(&mut obj, &element.kind, metadata);
    obj
}

fn elements_to_json(elements: &[SubmodelElement], metadata: bool) -> Value {
    Value::Array(
        elements
            .iter()
            .map(|e| Value::Object(encode_full(e, metadata)))
            .collect(),
    )
}

fn write_header(obj: &mut Map<String, Value>, meta: &ElementMeta, model_type: &str) {
    if let Some(id_short) = &meta.id_short {
        obj.insert("idShort".to_string(), Value::from(id_short.as_str()));
    }
    obj.insert("modelType".to_string(), Value::from(model_type));
}

fn write_meta(obj: &mut Map<String, Value>, meta: &ElementMeta) {
    if let Some(category) = &meta.category {
        obj.insert("category".to_string(), Value::from(category.as_str()));
    }
    if !meta.description.is_empty() {
        obj.insert("description".to_string(), lang_strings_to_json(&meta.description));
    }
    if !meta.display_name.is_empty() {
        obj.insert("displayName".to_string(), lang_strings_to_json(&meta.display_name));
    }
    insert_reference(obj, "semanticId", meta.semantic_id.as_ref());
    if !meta.supplemental_semantic_ids.is_empty() {
        obj.insert(
            "supplementalSemanticIds".to_string(),
            Value::Array(meta.supplemental_semantic_ids.iter().map(reference_to_json).collect()),
        );
    }
    if !meta.qualifiers.is_empty() {
        obj.insert(
            "qualifiers".to_string(),
            Value::Array(meta.qualifiers.iter().map(qualifier_to_json).collect()),
        );
    }
    if let Some(kind) = meta.kind {
        obj.insert("kind".to_string(), Value::from(kind.name()));
    }
}

fn qualifier_to_json(q: &Qualifier) -> Value {
    let mut obj = Map::new();
    insert_reference(&mut obj, "semanticId", q.semantic_id.as_ref());
    if let Some(kind) = q.kind {
        obj.insert("kind".to_string(), Value::from(kind.name()));
    }
    obj.insert("type".to_string(), Value::from(q.qualifier_type.as_str()));
    obj.insert("valueType".to_string(), Value::from(q.value_type.name()));
    if let Some(value) = &q.value {
        obj.insert("value".to_string(), primitive_to_json(value));
    }
    insert_reference(&mut obj, "valueId", q.value_id.as_ref());
    Value::Object(obj)
}

fn insert_reference(obj: &mut Map<String, Value>, name: &str, reference: Option<&Reference>) {
    if let Some(r) = reference {
        obj.insert(name.to_string(), reference_to_json(r));
    }
}

fn insert_str(obj: &mut Map<String, Value>, name: &str, value: Option<&str>) {
    if let Some(v) = value {
        obj.insert(name.to_string(), Value::from(v));
    }
}

fn variables_to_json(variables: &[OperationVariable]) -> Value {
    Value::Array(
        variables
            .iter()
            .map(|v| {
                let mut obj = Map::new();
                obj.insert("value".to_string(), Value::Object(encode_full(&v.value, false)));
                Value::Object(obj)
            })
            .collect(),
    )
}

pub(crate) fn specific_asset_id_to_json(id: &SpecificAssetId) -> Value {
    let mut obj = Map::new();
    obj.insert("name".to_string(), Value::from(id.name.as_str()));
    obj.insert("value".to_string(), Value::from(id.value.as_str()));
    insert_reference(&mut obj, "externalSubjectId", id.external_subject_id.as_ref());
    Value::Object(obj)
}

/// Writes the variant fields. `metadata` drops values and children but keeps
/// the fields that describe the variant's type.
fn write_kind(obj: &mut Map<String, Value>, kind: &ElementKind, metadata: bool) {
    let full = !metadata;
    match kind {
        ElementKind::Property(p) => {
            obj.insert("valueType".to_string(), Value::from(p.value_type.name()));
            if full {
                if let Some(value) = &p.value {
                    obj.insert("value".to_string(), primitive_to_json(value));
                }
                insert_reference(obj, "valueId", p.value_id.as_ref());
            }
        }
        ElementKind::Range(r) => {
            obj.insert("valueType".to_string(), Value::from(r.value_type.name()));
            if full {
                if let Some(min) = &r.min {
                    obj.insert("min".to_string(), primitive_to_json(min));
                }
                if let Some(max) = &r.max {
                    obj.insert("max".to_string(), primitive_to_json(max));
                }
            }
        }
        ElementKind::MultiLanguageProperty(m) => {
            if full {
                if !m.value.is_empty() {
                    obj.insert("value".to_string(), lang_strings_to_json(&m.value));
                }
                insert_reference(obj, "valueId", m.value_id.as_ref());
            }
        }
        ElementKind::File(f) => {
            obj.insert("contentType".to_string(), Value::from(f.content_type.as_str()));
            if full {
                insert_str(obj, "value", f.value.as_deref());
            }
        }
        ElementKind::Blob(b) => {
            obj.insert("contentType".to_string(), Value::from(b.content_type.as_str()));
            if full {
                if let Some(bytes) = &b.value {
                    obj.insert("value".to_string(), Value::from(BASE64.encode(bytes)));
                }
            }
        }
        ElementKind::ReferenceElement(r) => {
            if full {
                insert_reference(obj, "value", r.value.as_ref());
            }
        }
        ElementKind::RelationshipElement(r) => {
            if full {
                obj.insert("first".to_string(), reference_to_json(&r.first));
                obj.insert("second".to_string(), reference_to_json(&r.second));
            }
        }
        ElementKind::AnnotatedRelationshipElement(a) => {
            if full {
                obj.insert("first".to_string(), reference_to_json(&a.first));
                obj.insert("second".to_string(), reference_to_json(&a.second));
                if !a.annotations.is_empty() {
                    obj.insert("annotations".to_string(), elements_to_json(&a.annotations, false));
                }
            }
        }
        ElementKind::SubmodelElementCollection(c) => {
            if full {
                obj.insert("value".to_string(), elements_to_json(&c.value, false));
            }
        }
        ElementKind::SubmodelElementList(l) => {
            if let Some(order_relevant) = l.order_relevant {
                obj.insert("orderRelevant".to_string(), Value::Bool(order_relevant));
            }
            insert_reference(obj, "semanticIdListElement", l.semantic_id_list_element.as_ref());
            if let Some(t) = l.type_value_list_element {
                obj.insert("typeValueListElement".to_string(), Value::from(t.name()));
            }
            if let Some(t) = l.value_type_list_element {
                obj.insert("valueTypeListElement".to_string(), Value::from(t.name()));
            }
            if full {
                obj.insert("value".to_string(), elements_to_json(&l.value, false));
            }
        }
        ElementKind::Operation(o) => {
            if full {
                for (name, variables) in [
                    ("inputVariables", &o.input_variables),
                    ("outputVariables", &o.output_variables),
                    ("inoutputVariables", &o.inoutput_variables),
                ] {
                    if !variables.is_empty() {
                        obj.insert(name.to_string(), variables_to_json(variables));
                    }
                }
            }
        }
        ElementKind::Entity(e) => {
            if full {
                obj.insert("statements".to_string(), elements_to_json(&e.statements, false));
            }
            if let Some(t) = e.entity_type {
                obj.insert("entityType".to_string(), Value::from(t.name()));
            }
            if full {
                insert_str(obj, "globalAssetId", e.global_asset_id.as_deref());
                if !e.specific_asset_ids.is_empty() {
                    obj.insert(
                        "specificAssetIds".to_string(),
                        Value::Array(e.specific_asset_ids.iter().map(specific_asset_id_to_json).collect()),
                    );
                }
            }
        }
        ElementKind::BasicEventElement(b) => {
            if full {
                obj.insert("observed".to_string(), reference_to_json(&b.observed));
            }
            obj.insert("direction".to_string(), Value::from(b.direction.name()));
            obj.insert("state".to_string(), Value::from(b.state.name()));
            insert_str(obj, "messageTopic", b.message_topic.as_deref());
            insert_reference(obj, "messageBroker", b.message_broker.as_ref());
            if full {
                if let Some(t) = &b.last_update {
                    obj.insert(
                        "lastUpdate".to_string(),
                        Value::from(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                    );
                }
            }
            if let Some(d) = &b.min_interval {
                obj.insert("minInterval".to_string(), Value::from(d.to_string()));
            }
            if let Some(d) = &b.max_interval {
                obj.insert("maxInterval".to_string(), Value::from(d.to_string()));
            }
        }
        ElementKind::Capability(_) => {}
    }
}

// =============================================================================
// DECODING
// =============================================================================

struct Decoder<'o> {
    options: &'o DecodeOptions,
}

impl<'o> Decoder<'o> {
    fn new(options: &'o DecodeOptions) -> Self {
        Self { options }
    }

    fn full(&self) -> bool {
        !self.options.is_metadata()
    }

    fn element(
        &self,
        value: &Value,
        location: &str,
        depth: usize,
    ) -> Result<SubmodelElement, DecodeError> {
        if depth > self.options.max_depth {
            return Err(DecodeError::DepthExceeded {
                field: location.to_string(),
                max: self.options.max_depth,
            });
        }
        let obj = ObjectReader::new(value, location)?;
        let tag = obj.string("modelType")?;
        let model_type = ModelType::from_name(tag).ok_or_else(|| DecodeError::UnknownVariant {
            field: obj.field("modelType"),
            tag: tag.to_string(),
        })?;
        let meta = decode_meta(&obj)?;
        let kind = self.kind(&obj, model_type, depth)?;
        Ok(SubmodelElement { meta, kind })
    }

    fn submodel(&self, value: &Value) -> Result<Submodel, DecodeError> {
        let obj = ObjectReader::new(value, "$")?;
        if let Some(tag) = obj.opt_string("modelType")? {
            if tag != SUBMODEL_MODEL_TYPE {
                return Err(DecodeError::UnknownVariant {
                    field: obj.field("modelType"),
                    tag: tag.to_string(),
                });
            }
        }
        Ok(Submodel {
            id: obj.string("id")?.to_string(),
            meta: decode_meta(&obj)?,
            submodel_elements: self.keyed_children(&obj, "submodelElements", 0)?,
        })
    }

    fn kind(
        &self,
        obj: &ObjectReader<'_>,
        model_type: ModelType,
        depth: usize,
    ) -> Result<ElementKind, DecodeError> {
        let full = self.full();
        let kind = match model_type {
            ModelType::Property => {
                let value_type = obj.required_enum("valueType", DataType::from_name)?;
                ElementKind::Property(Property {
                    value_type,
                    value: self.primitive(obj, "value", value_type)?,
                    value_id: self.value_reference(obj, "valueId")?,
                })
            }
            ModelType::Range => {
                let value_type = obj.required_enum("valueType", DataType::from_name)?;
                ElementKind::Range(Range {
                    value_type,
                    min: self.primitive(obj, "min", value_type)?,
                    max: self.primitive(obj, "max", value_type)?,
                })
            }
            ModelType::MultiLanguageProperty => {
                let value = match obj.optional("value").filter(|_| full) {
                    Some(v) => lang_strings_from_json(v, &obj.field("value"))?,
                    None => Default::default(),
                };
                ElementKind::MultiLanguageProperty(MultiLanguageProperty {
                    value,
                    value_id: self.value_reference(obj, "valueId")?,
                })
            }
            ModelType::File => ElementKind::File(File {
                content_type: content_type(obj)?,
                value: obj.opt_string("value")?.filter(|_| full).map(str::to_string),
            }),
            ModelType::Blob => {
                let value = match obj.opt_string("value")?.filter(|_| full) {
                    Some(text) => Some(BASE64.decode(text).map_err(|_| DecodeError::TypeMismatch {
                        field: obj.field("value"),
                        expected: "base64".to_string(),
                        found: format!("{:?}", text),
                    })?),
                    None => None,
                };
                ElementKind::Blob(Blob {
                    content_type: content_type(obj)?,
                    value,
                })
            }
            ModelType::ReferenceElement => ElementKind::ReferenceElement(ReferenceElement {
                value: self.value_reference(obj, "value")?,
            }),
            ModelType::RelationshipElement => {
                ElementKind::RelationshipElement(RelationshipElement {
                    first: self.required_reference(obj, "first")?,
                    second: self.required_reference(obj, "second")?,
                })
            }
            ModelType::AnnotatedRelationshipElement => {
                let annotations = self.keyed_children(obj, "annotations", depth)?;
                let location = obj.field("annotations");
                for (i, a) in annotations.iter().enumerate() {
                    if !a.model_type().is_data_element() {
                        return Err(DecodeError::MalformedStructure {
                            field: item_location(&location, i),
                            reason: format!("{} is not a data element", a.model_type()),
                        });
                    }
                }
                ElementKind::AnnotatedRelationshipElement(AnnotatedRelationshipElement {
                    first: self.required_reference(obj, "first")?,
                    second: self.required_reference(obj, "second")?,
                    annotations,
                })
            }
            ModelType::SubmodelElementCollection => {
                ElementKind::SubmodelElementCollection(SubmodelElementCollection {
                    value: self.keyed_children(obj, "value", depth)?,
                })
            }
            ModelType::SubmodelElementList => ElementKind::SubmodelElementList(self.list(obj, depth)?),
            ModelType::Operation => ElementKind::Operation(Operation {
                input_variables: self.variables(obj, "inputVariables", depth)?,
                output_variables: self.variables(obj, "outputVariables", depth)?,
                inoutput_variables: self.variables(obj, "inoutputVariables", depth)?,
            }),
            ModelType::Entity => {
                let mut specific_asset_ids = Vec::new();
                if full {
                    let location = obj.field("specificAssetIds");
                    for (i, item) in obj.array("specificAssetIds")?.iter().enumerate() {
                        let item_loc = item_location(&location, i);
                        specific_asset_ids.push(specific_asset_id_from_json(item, &item_loc)?);
                    }
                }
                ElementKind::Entity(Entity {
                    entity_type: obj.enum_field("entityType", EntityType::from_name)?,
                    global_asset_id: obj
                        .opt_string("globalAssetId")?
                        .filter(|_| full)
                        .map(str::to_string),
                    specific_asset_ids,
                    statements: self.keyed_children(obj, "statements", depth)?,
                })
            }
            ModelType::BasicEventElement => {
                let last_update = match obj.opt_string("lastUpdate")?.filter(|_| full) {
                    Some(text) => Some(DateTime::parse_from_rfc3339(text).map_err(|_| {
                        DecodeError::TypeMismatch {
                            field: obj.field("lastUpdate"),
                            expected: "dateTime".to_string(),
                            found: format!("{:?}", text),
                        }
                    })?),
                    None => None,
                };
                ElementKind::BasicEventElement(BasicEventElement {
                    observed: self.required_reference(obj, "observed")?,
                    direction: obj.required_enum("direction", Direction::from_name)?,
                    state: obj.required_enum("state", StateOfEvent::from_name)?,
                    message_topic: obj.opt_string("messageTopic")?.map(str::to_string),
                    message_broker: opt_reference(obj, "messageBroker")?,
                    last_update,
                    min_interval: duration_field(obj, "minInterval")?,
                    max_interval: duration_field(obj, "maxInterval")?,
                })
            }
            ModelType::Capability => ElementKind::Capability(Capability),
        };
        Ok(kind)
    }

    fn list(&self, obj: &ObjectReader<'_>, depth: usize) -> Result<SubmodelElementList, DecodeError> {
        let mut list = SubmodelElementList {
            type_value_list_element: obj.enum_field("typeValueListElement", ModelType::from_name)?,
            value_type_list_element: obj.enum_field("valueTypeListElement", DataType::from_name)?,
            order_relevant: obj.opt_bool("orderRelevant")?,
            semantic_id_list_element: opt_reference(obj, "semanticIdListElement")?,
            value: Vec::new(),
        };
        if !self.full() {
            return Ok(list);
        }
        let location = obj.field("value");
        let list_name = obj.opt_string("idShort")?.unwrap_or_default().to_string();
        for (i, item) in obj.array("value")?.iter().enumerate() {
            let item_loc = item_location(&location, i);
            let child = self.element(item, &item_loc, depth + 1)?;
            validate_list_member(&list_name, &list, &child).map_err(|e| {
                DecodeError::MalformedStructure {
                    field: item_loc.clone(),
                    reason: e.to_string(),
                }
            })?;
            list.value.push(child);
        }
        Ok(list)
    }

    /// Decodes children that must carry unique idShorts.
    fn keyed_children(
        &self,
        obj: &ObjectReader<'_>,
        name: &str,
        depth: usize,
    ) -> Result<Vec<SubmodelElement>, DecodeError> {
        if !self.full() {
            return Ok(Vec::new());
        }
        let location = obj.field(name);
        let items = obj.array(name)?;
        let mut seen = FxHashSet::default();
        let mut children = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let item_loc = item_location(&location, i);
            let child = self.element(item, &item_loc, depth + 1)?;
            let Some(id_short) = child.id_short() else {
                return Err(DecodeError::MissingField {
                    field: format!("{}.idShort", item_loc),
                });
            };
            if !seen.insert(id_short.to_string()) {
                return Err(DecodeError::MalformedStructure {
                    field: item_loc,
                    reason: format!("duplicate idShort {:?}", id_short),
                });
            }
            children.push(child);
        }
        Ok(children)
    }

    fn variables(
        &self,
        obj: &ObjectReader<'_>,
        name: &str,
        depth: usize,
    ) -> Result<Vec<OperationVariable>, DecodeError> {
        if !self.full() {
            return Ok(Vec::new());
        }
        let location = obj.field(name);
        let mut variables = Vec::new();
        for (i, item) in obj.array(name)?.iter().enumerate() {
            let item_loc = item_location(&location, i);
            let wrapper = ObjectReader::new(item, &item_loc)?;
            let value_loc = wrapper.field("value");
            let value = self.element(wrapper.required("value")?, &value_loc, depth + 1)?;
            variables.push(OperationVariable { value });
        }
        Ok(variables)
    }

    fn primitive(
        &self,
        obj: &ObjectReader<'_>,
        name: &str,
        data_type: DataType,
    ) -> Result<Option<PrimitiveValue>, DecodeError> {
        match obj.optional(name).filter(|_| self.full()) {
            Some(v) => primitive_from_json(v, data_type, &obj.field(name)).map(Some),
            None => Ok(None),
        }
    }

    /// An optional reference that only the Full projection carries.
    fn value_reference(
        &self,
        obj: &ObjectReader<'_>,
        name: &str,
    ) -> Result<Option<Reference>, DecodeError> {
        if !self.full() {
            return Ok(None);
        }
        opt_reference(obj, name)
    }

    /// A reference required by Full and defaulted by Metadata.
    fn required_reference(&self, obj: &ObjectReader<'_>, name: &str) -> Result<Reference, DecodeError> {
        if !self.full() {
            return Ok(Reference::default());
        }
        reference_from_json(obj.required(name)?, &obj.field(name))
    }
}

fn decode_meta(obj: &ObjectReader<'_>) -> Result<ElementMeta, DecodeError> {
    let mut meta = ElementMeta {
        id_short: obj.opt_string("idShort")?.map(str::to_string),
        category: obj.opt_string("category")?.map(str::to_string),
        semantic_id: opt_reference(obj, "semanticId")?,
        kind: obj.enum_field("kind", ModellingKind::from_name)?,
        ..ElementMeta::default()
    };
    if let Some(v) = obj.optional("description") {
        meta.description = lang_strings_from_json(v, &obj.field("description"))?;
    }
    if let Some(v) = obj.optional("displayName") {
        meta.display_name = lang_strings_from_json(v, &obj.field("displayName"))?;
    }
    let location = obj.field("supplementalSemanticIds");
    for (i, item) in obj.array("supplementalSemanticIds")?.iter().enumerate() {
        meta.supplemental_semantic_ids
            .push(reference_from_json(item, &item_location(&location, i))?);
    }
    let location = obj.field("qualifiers");
    for (i, item) in obj.array("qualifiers")?.iter().enumerate() {
        meta.qualifiers
            .push(qualifier_from_json(item, &item_location(&location, i))?);
    }
    Ok(meta)
}

fn qualifier_from_json(value: &Value, location: &str) -> Result<Qualifier, DecodeError> {
    let obj = ObjectReader::new(value, location)?;
    let value_type = obj.required_enum("valueType", DataType::from_name)?;
    let value = match obj.optional("value") {
        Some(v) => Some(primitive_from_json(v, value_type, &obj.field("value"))?),
        None => None,
    };
    Ok(Qualifier {
        qualifier_type: obj.string("type")?.to_string(),
        value_type,
        value,
        kind: obj.enum_field("kind", QualifierKind::from_name)?,
        value_id: opt_reference(&obj, "valueId")?,
        semantic_id: opt_reference(&obj, "semanticId")?,
    })
}

pub(crate) fn specific_asset_id_from_json(
    value: &Value,
    location: &str,
) -> Result<SpecificAssetId, DecodeError> {
    let obj = ObjectReader::new(value, location)?;
    Ok(SpecificAssetId {
        name: obj.string("name")?.to_string(),
        value: obj.string("value")?.to_string(),
        external_subject_id: opt_reference(&obj, "externalSubjectId")?,
    })
}

fn opt_reference(obj: &ObjectReader<'_>, name: &str) -> Result<Option<Reference>, DecodeError> {
    match obj.optional(name) {
        Some(v) => reference_from_json(v, &obj.field(name)).map(Some),
        None => Ok(None),
    }
}

fn content_type(obj: &ObjectReader<'_>) -> Result<String, DecodeError> {
    Ok(obj.opt_string("contentType")?.unwrap_or_default().to_string())
}

fn duration_field(obj: &ObjectReader<'_>, name: &str) -> Result<Option<XsdDuration>, DecodeError> {
    match obj.opt_string(name)? {
        Some(text) => text
            .parse::<XsdDuration>()
            .map(Some)
            .map_err(|_| DecodeError::TypeMismatch {
                field: obj.field(name),
                expected: "duration".to_string(),
                found: format!("{:?}", text),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeErrorKind;
    use crate::model::{Key, KeyType, LangStringSet};
    use serde_json::json;

    fn coordinates() -> SubmodelElement {
        SubmodelElement::collection("Coordinates", |c| c.property("x", 1.0).property("y", 2.0))
    }

    #[test]
    fn test_full_collection_shape() {
        let value = element_to_json(&coordinates(), &EncodeOptions::new());
        assert_eq!(value["modelType"], json!("SubmodelElementCollection"));
        assert_eq!(value["idShort"], json!("Coordinates"));
        let children = value["value"].as_array().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0]["modelType"], json!("Property"));
        assert_eq!(children[0]["valueType"], json!("Double"));
        assert_eq!(children[1]["idShort"], json!("y"));
    }

    #[test]
    fn test_metadata_precedes_value() {
        let element = SubmodelElement::property("Speed", 1500_i32)
            .with_category("PARAMETER")
            .with_semantic_id(Reference::global("urn:speed"));
        let text = encode_element(&element).unwrap();
        let keys: Vec<String> = match serde_json::from_str::<Value>(&text).unwrap() {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => unreachable!(),
        };
        assert_eq!(
            keys,
            vec!["idShort", "modelType", "category", "semanticId", "valueType", "value"]
        );
    }

    #[test]
    fn test_full_round_trip_nested() {
        let element = SubmodelElement::collection("Motor", |c| {
            c.property("Speed", 1500_i32)
                .list("Phases", |l| l.value(1.0).value(2.0))
                .element(
                    SubmodelElement::entity("Drive", EntityType::SelfManagedEntity, |s| {
                        s.property("Serial", "A-17")
                    })
                    .with_description("en", "drive unit"),
                )
                .element(SubmodelElement::multi_language(
                    "Label",
                    LangStringSet::new().with("en", "Motor").with("de", "Motor"),
                ))
                .element(SubmodelElement::blob("Icon", "image/png", vec![1, 2, 3]))
        });
        let decoded = decode_element(&encode_element(&element).unwrap()).unwrap();
        assert_eq!(decoded, element);
    }

    #[test]
    fn test_basic_event_round_trip() {
        let event = SubmodelElement::new(
            "Overheat",
            BasicEventElement {
                observed: Reference::model(vec![Key::new(KeyType::Property, "Temp")]),
                direction: Direction::Output,
                state: StateOfEvent::On,
                message_topic: Some("motor/overheat".to_string()),
                last_update: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").ok(),
                min_interval: Some(XsdDuration::from_seconds(5)),
                ..Default::default()
            },
        );
        let decoded = decode_element(&encode_element(&event).unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_missing_model_type() {
        let err = decode_element(r#"{"idShort":"x","valueType":"Double","value":1.0}"#).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                field: "$.modelType".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_model_type_is_not_defaulted() {
        let err = decode_element(r#"{"idShort":"x","modelType":"Gadget"}"#).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::UnknownVariant);
        assert_eq!(err.field(), Some("$.modelType"));
    }

    #[test]
    fn test_nested_error_location() {
        let input = json!({
            "idShort": "c",
            "modelType": "SubmodelElementCollection",
            "value": [
                {"idShort": "a", "modelType": "Property", "valueType": "Int", "value": 1},
                {"idShort": "b", "modelType": "Property", "valueType": "Int", "value": 1.5}
            ]
        });
        let err = element_from_json(&input, &DecodeOptions::new()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::TypeMismatch);
        assert_eq!(err.field(), Some("$.value[1].value"));
    }

    #[test]
    fn test_repeated_language_rejected() {
        let input = json!({
            "idShort": "m",
            "modelType": "MultiLanguageProperty",
            "value": [
                {"language": "en", "text": "a"},
                {"language": "en", "text": "b"}
            ]
        });
        let err = element_from_json(&input, &DecodeOptions::new()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedStructure);
        assert_eq!(err.field(), Some("$.value[1]"));

        let input = json!({
            "idShort": "p",
            "modelType": "Property",
            "valueType": "Int",
            "displayName": [
                {"language": "de", "text": "a"},
                {"language": "de", "text": "b"}
            ]
        });
        let err = element_from_json(&input, &DecodeOptions::new()).unwrap_err();
        assert_eq!(err.field(), Some("$.displayName[1]"));
    }

    #[test]
    fn test_duplicate_and_missing_child_id_short() {
        let dup = json!({
            "idShort": "c",
            "modelType": "SubmodelElementCollection",
            "value": [
                {"idShort": "a", "modelType": "Capability"},
                {"idShort": "a", "modelType": "Capability"}
            ]
        });
        let err = element_from_json(&dup, &DecodeOptions::new()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedStructure);

        let unnamed = json!({
            "idShort": "c",
            "modelType": "SubmodelElementCollection",
            "value": [{"modelType": "Capability"}]
        });
        let err = element_from_json(&unnamed, &DecodeOptions::new()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                field: "$.value[0].idShort".to_string()
            }
        );
    }

    #[test]
    fn test_list_type_constraint() {
        let input = json!({
            "idShort": "l",
            "modelType": "SubmodelElementList",
            "typeValueListElement": "Property",
            "value": [{"modelType": "Range", "valueType": "Int"}]
        });
        let err = element_from_json(&input, &DecodeOptions::new()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedStructure);
        assert_eq!(err.field(), Some("$.value[0]"));
    }

    #[test]
    fn test_depth_limit() {
        let mut value = json!({"idShort": "leaf", "modelType": "Capability"});
        for i in 0..5 {
            value = json!({
                "idShort": format!("c{}", i),
                "modelType": "SubmodelElementCollection",
                "value": [value]
            });
        }
        let options = DecodeOptions::new().with_max_depth(3);
        let err = element_from_json(&value, &options).unwrap_err();
        assert!(matches!(err, DecodeError::DepthExceeded { max: 3, .. }));
        assert!(element_from_json(&value, &DecodeOptions::new()).is_ok());
    }

    #[test]
    fn test_metadata_projection() {
        let element = SubmodelElement::collection("Coordinates", |c| c.property("x", 1.0))
            .with_description("en", "position");
        let value = element_to_json(&element, &EncodeOptions::metadata());
        assert!(value.get("value").is_none());
        assert_eq!(value["description"][0]["text"], json!("position"));

        let prop = element_to_json(&SubmodelElement::property("x", 1.0), &EncodeOptions::metadata());
        assert_eq!(prop["valueType"], json!("Double"));
        assert!(prop.get("value").is_none());

        let decoded = element_from_json(&prop, &DecodeOptions::metadata()).unwrap();
        let p = decoded.as_variant::<Property>().unwrap();
        assert_eq!(p.value, None);
        assert_eq!(p.value_type, DataType::Double);
    }

    #[test]
    fn test_string_encoded_values_accepted() {
        let input = json!({
            "idShort": "t", "modelType": "Property", "valueType": "xs:int", "value": "42"
        });
        let decoded = element_from_json(&input, &DecodeOptions::new()).unwrap();
        assert_eq!(
            decoded.as_variant::<Property>().unwrap().value,
            Some(PrimitiveValue::Int(42))
        );
    }

    #[test]
    fn test_qualifiers_round_trip() {
        let element = SubmodelElement::property("Speed", 1500_i32).with_qualifier(Qualifier {
            kind: Some(QualifierKind::ConceptQualifier),
            ..Qualifier::new("Multiplicity", PrimitiveValue::String("One".to_string()))
        });
        let decoded = decode_element(&encode_element(&element).unwrap()).unwrap();
        assert_eq!(decoded, element);
    }

    #[test]
    fn test_submodel_round_trip() {
        let submodel = Submodel::new("urn:example:sm:1")
            .with_id_short("Nameplate")
            .with_element(coordinates())
            .with_element(SubmodelElement::property("Serial", "S-1"));
        let text = encode_submodel(&submodel).unwrap();
        assert_eq!(decode_submodel(&text).unwrap(), submodel);

        let err = decode_submodel(r#"{"idShort":"x","modelType":"Submodel"}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingField { field: "$.id".to_string() });
    }

    #[test]
    fn test_tree_round_trip() {
        let tree = ElementTree::from_elements([
            coordinates(),
            SubmodelElement::list("Readings", |l| l.value(1.0).value(2.0).value(3.0)),
        ])
        .unwrap();
        let text = encode_tree(&tree, &EncodeOptions::new()).unwrap();
        let decoded = decode_tree(&text, &DecodeOptions::new()).unwrap();
        assert_eq!(decoded.to_elements(), tree.to_elements());

        let values = encode_tree(&tree, &EncodeOptions::value_only()).unwrap();
        assert_eq!(values, r#"{"Coordinates":{"x":1.0,"y":2.0},"Readings":[1.0,2.0,3.0]}"#);
    }

    #[test]
    fn test_ordered_tree_round_trip() {
        let mut tree = ElementTree::ordered();
        tree.create(SubmodelElement::unnamed(Property {
            value_type: DataType::Int,
            value: Some(PrimitiveValue::Int(1)),
            value_id: None,
        }))
        .unwrap();
        tree.create(coordinates()).unwrap();

        let text = encode_tree(&tree, &EncodeOptions::new()).unwrap();
        let decoded = decode_tree(&text, &DecodeOptions::new().ordered()).unwrap();
        assert_eq!(decoded.root_layout(), ChildLayout::Ordered);
        assert_eq!(decoded.to_elements(), tree.to_elements());
        assert!(decoded.has_child_path("[1].x"));

        // A keyed top level still needs idShorts
        let err = decode_tree(&text, &DecodeOptions::new()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedStructure);
    }

    #[test]
    fn test_syntax_error() {
        let err = decode_element("{not json").unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::Syntax);
    }
}

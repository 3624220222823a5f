//! Shared JSON building blocks: field readers with location tracking and
//! the encodings of primitive values, references and language strings.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

use crate::error::DecodeError;
use crate::model::{
    DataType, Key, KeyType, LangString, LangStringSet, PrimitiveValue, Reference, ReferenceType,
};

// =============================================================================
// DECODING
// =============================================================================

/// Returns the JSON type name of a value, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builds the location of an array item, e.g. `$.value[2]`.
pub fn item_location(location: &str, index: usize) -> String {
    format!("{}[{}]", location, index)
}

/// Error for a language that already has a text in the same set.
pub fn repeated_language(location: &str, language: &str) -> DecodeError {
    DecodeError::MalformedStructure {
        field: location.to_string(),
        reason: format!("language {:?} appears more than once", language),
    }
}

/// Reader over one JSON object.
///
/// Every accessor reports failures against `location.field`, so errors point
/// at the exact offending field.
#[derive(Debug, Clone, Copy)]
pub struct ObjectReader<'a> {
    object: &'a Map<String, Value>,
    location: &'a str,
}

impl<'a> ObjectReader<'a> {
    /// Wraps `value`, which must be an object.
    pub fn new(value: &'a Value, location: &'a str) -> Result<Self, DecodeError> {
        match value {
            Value::Object(object) => Ok(Self { object, location }),
            other => Err(DecodeError::TypeMismatch {
                field: location.to_string(),
                expected: "object".to_string(),
                found: json_type_name(other).to_string(),
            }),
        }
    }

    pub fn location(&self) -> &'a str {
        self.location
    }

    /// Location of a named field.
    pub fn field(&self, name: &str) -> String {
        format!("{}.{}", self.location, name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.optional(name).is_some()
    }

    /// Returns the field if present and not null.
    pub fn optional(&self, name: &str) -> Option<&'a Value> {
        self.object.get(name).filter(|v| !v.is_null())
    }

    pub fn required(&self, name: &str) -> Result<&'a Value, DecodeError> {
        self.optional(name).ok_or_else(|| DecodeError::MissingField {
            field: self.field(name),
        })
    }

    pub fn string(&self, name: &str) -> Result<&'a str, DecodeError> {
        let value = self.required(name)?;
        value.as_str().ok_or_else(|| self.mismatch(name, "string", value))
    }

    pub fn opt_string(&self, name: &str) -> Result<Option<&'a str>, DecodeError> {
        match self.optional(name) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| self.mismatch(name, "string", value)),
        }
    }

    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>, DecodeError> {
        match self.optional(name) {
            None => Ok(None),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| self.mismatch(name, "boolean", value)),
        }
    }

    /// Returns the array field, or an empty slice when absent.
    pub fn array(&self, name: &str) -> Result<&'a [Value], DecodeError> {
        match self.optional(name) {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(value) => Err(self.mismatch(name, "array", value)),
        }
    }

    /// Parses a closed enum field by wire name.
    pub fn enum_field<T>(
        &self,
        name: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, DecodeError> {
        match self.opt_string(name)? {
            None => Ok(None),
            Some(text) => parse(text)
                .map(Some)
                .ok_or_else(|| DecodeError::MalformedStructure {
                    field: self.field(name),
                    reason: format!("unknown value {:?}", text),
                }),
        }
    }

    pub fn required_enum<T>(
        &self,
        name: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, DecodeError> {
        self.enum_field(name, parse)?
            .ok_or_else(|| DecodeError::MissingField {
                field: self.field(name),
            })
    }

    pub fn mismatch(&self, name: &str, expected: &str, found: &Value) -> DecodeError {
        DecodeError::TypeMismatch {
            field: self.field(name),
            expected: expected.to_string(),
            found: json_type_name(found).to_string(),
        }
    }

    /// Iterates over all fields.
    pub fn entries(&self) -> impl Iterator<Item = (&'a String, &'a Value)> + use<'a> {
        self.object.iter()
    }
}

/// Decodes a primitive of `data_type` from a JSON string or native value.
///
/// Numbers are parsed from their exact source token, so `1.5` is rejected
/// for integer types instead of being truncated.
pub fn primitive_from_json(
    value: &Value,
    data_type: DataType,
    field: &str,
) -> Result<PrimitiveValue, DecodeError> {
    let mismatch = |found: String| DecodeError::TypeMismatch {
        field: field.to_string(),
        expected: data_type.name().to_string(),
        found,
    };
    match value {
        Value::String(text) => data_type
            .parse(text)
            .map_err(|_| mismatch(format!("{:?}", text))),
        Value::Bool(b) if data_type == DataType::Boolean => Ok(PrimitiveValue::Boolean(*b)),
        Value::Number(n) if data_type.is_numeric() => {
            let token = n.to_string();
            if data_type == DataType::Decimal && token.contains(['e', 'E']) {
                return Decimal::from_scientific(&token)
                    .map(PrimitiveValue::Decimal)
                    .map_err(|_| mismatch(token.clone()));
            }
            data_type.parse(&token).map_err(|_| mismatch(token.clone()))
        }
        other => Err(mismatch(json_type_name(other).to_string())),
    }
}

pub fn reference_from_json(value: &Value, location: &str) -> Result<Reference, DecodeError> {
    let obj = ObjectReader::new(value, location)?;
    let reference_type = obj.required_enum("type", ReferenceType::from_name)?;
    let keys_location = obj.field("keys");
    let mut keys = Vec::new();
    for (i, item) in obj.array("keys")?.iter().enumerate() {
        let key_location = item_location(&keys_location, i);
        let key = ObjectReader::new(item, &key_location)?;
        keys.push(Key {
            key_type: key.required_enum("type", KeyType::from_name)?,
            value: key.string("value")?.to_string(),
        });
    }
    let referred_semantic_id = match obj.optional("referredSemanticId") {
        Some(v) => Some(Box::new(reference_from_json(
            v,
            &obj.field("referredSemanticId"),
        )?)),
        None => None,
    };
    Ok(Reference {
        reference_type,
        keys,
        referred_semantic_id,
    })
}

pub fn lang_strings_from_json(value: &Value, location: &str) -> Result<LangStringSet, DecodeError> {
    let Value::Array(items) = value else {
        return Err(DecodeError::TypeMismatch {
            field: location.to_string(),
            expected: "array".to_string(),
            found: json_type_name(value).to_string(),
        });
    };
    let mut set = LangStringSet::new();
    for (i, item) in items.iter().enumerate() {
        let item_loc = item_location(location, i);
        let obj = ObjectReader::new(item, &item_loc)?;
        let entry = LangString::new(obj.string("language")?, obj.string("text")?);
        set.try_push(entry)
            .map_err(|dup| repeated_language(&item_loc, &dup.language))?;
    }
    Ok(set)
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a primitive as native JSON where the type has a native form.
pub fn primitive_to_json(value: &PrimitiveValue) -> Value {
    match value {
        PrimitiveValue::Boolean(b) => Value::Bool(*b),
        PrimitiveValue::Byte(v) => Value::from(*v),
        PrimitiveValue::Short(v) => Value::from(*v),
        PrimitiveValue::Int(v) => Value::from(*v),
        PrimitiveValue::Long(v) | PrimitiveValue::Integer(v) => Value::from(*v),
        PrimitiveValue::UnsignedByte(v) => Value::from(*v),
        PrimitiveValue::UnsignedShort(v) => Value::from(*v),
        PrimitiveValue::UnsignedInt(v) => Value::from(*v),
        PrimitiveValue::UnsignedLong(v) => Value::from(*v),
        PrimitiveValue::Double(v) => Number::from_f64(*v)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_text())),
        // Float and Decimal keep their shortest textual token
        PrimitiveValue::Float(v) if v.is_finite() => number_token(value),
        PrimitiveValue::Decimal(_) => number_token(value),
        _ => Value::String(value.to_text()),
    }
}

fn number_token(value: &PrimitiveValue) -> Value {
    let text = value.to_text();
    Number::from_str(&text)
        .map(Value::Number)
        .unwrap_or(Value::String(text))
}

pub fn reference_to_json(reference: &Reference) -> Value {
    let mut obj = Map::new();
    obj.insert(
        "type".to_string(),
        Value::from(reference.reference_type.name()),
    );
    let keys = reference
        .keys
        .iter()
        .map(|k| {
            let mut key = Map::new();
            key.insert("type".to_string(), Value::from(k.key_type.name()));
            key.insert("value".to_string(), Value::from(k.value.as_str()));
            Value::Object(key)
        })
        .collect();
    obj.insert("keys".to_string(), Value::Array(keys));
    if let Some(referred) = &reference.referred_semantic_id {
        obj.insert("referredSemanticId".to_string(), reference_to_json(referred));
    }
    Value::Object(obj)
}

pub fn lang_strings_to_json(set: &LangStringSet) -> Value {
    Value::Array(
        set.iter()
            .map(|s| {
                let mut obj = Map::new();
                obj.insert("language".to_string(), Value::from(s.language.as_str()));
                obj.insert("text".to_string(), Value::from(s.text.as_str()));
                Value::Object(obj)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_rejects_fractional_token() {
        let err = primitive_from_json(&json!(1.5), DataType::Int, "$.value").unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
        assert_eq!(err.field(), Some("$.value"));
        assert_eq!(
            primitive_from_json(&json!(42), DataType::Long, "$.value").unwrap(),
            PrimitiveValue::Long(42)
        );
    }

    #[test]
    fn test_float_token_out_of_range() {
        let token: Value = serde_json::from_str("1e39").unwrap();
        let err = primitive_from_json(&token, DataType::Float, "$.value").unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
        assert_eq!(
            primitive_from_json(&token, DataType::Double, "$.value").unwrap(),
            PrimitiveValue::Double(1e39)
        );
    }

    #[test]
    fn test_lang_strings_reject_repeated_language() {
        let value = json!([
            {"language": "en", "text": "a"},
            {"language": "de", "text": "b"},
            {"language": "en", "text": "c"}
        ]);
        let err = lang_strings_from_json(&value, "$.description").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedStructure { .. }));
        assert_eq!(err.field(), Some("$.description[2]"));
    }

    #[test]
    fn test_string_and_native_forms_agree() {
        let native = primitive_from_json(&json!(2.5), DataType::Double, "$").unwrap();
        let text = primitive_from_json(&json!("2.5"), DataType::Double, "$").unwrap();
        assert_eq!(native, text);
        assert!(primitive_from_json(&json!(true), DataType::Int, "$").is_err());
        assert_eq!(
            primitive_from_json(&json!(true), DataType::Boolean, "$").unwrap(),
            PrimitiveValue::Boolean(true)
        );
    }

    #[test]
    fn test_decimal_exponent_and_scale() {
        let v = primitive_from_json(&json!("1.250"), DataType::Decimal, "$").unwrap();
        assert_eq!(primitive_to_json(&v).to_string(), "1.250");
        let v: Value = serde_json::from_str("1.5e2").unwrap();
        let d = primitive_from_json(&v, DataType::Decimal, "$").unwrap();
        assert_eq!(d.as_f64(), Some(150.0));
    }

    #[test]
    fn test_primitive_encoding() {
        assert_eq!(primitive_to_json(&PrimitiveValue::Double(1.0)).to_string(), "1.0");
        assert_eq!(primitive_to_json(&PrimitiveValue::Int(7)), json!(7));
        assert_eq!(
            primitive_to_json(&PrimitiveValue::Double(f64::INFINITY)),
            json!("INF")
        );
        assert_eq!(
            primitive_to_json(&PrimitiveValue::String("a".into())),
            json!("a")
        );
        assert_eq!(primitive_to_json(&PrimitiveValue::Float(0.1)).to_string(), "0.1");
    }

    #[test]
    fn test_reference_missing_type() {
        let err = reference_from_json(&json!({"keys": []}), "$.semanticId").unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                field: "$.semanticId.type".to_string()
            }
        );
    }

    #[test]
    fn test_reference_round_trip() {
        let mut r = Reference::global("urn:a");
        r.referred_semantic_id = Some(Box::new(Reference::global("urn:b")));
        let back = reference_from_json(&reference_to_json(&r), "$").unwrap();
        assert_eq!(back, r);
    }
}

//! JSON <-> `AttributeValue` conversion
//!
//! Items cross the table seam as JSON maps. Writing is total: every JSON
//! value has a DynamoDB representation. Reading maps the set and binary
//! types onto JSON arrays and base64 strings, since the core never writes
//! them itself.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number, Value};

use clubhouse_core::keys::{PK_ATTR, SK_ATTR};
use clubhouse_core::table::{Item, ItemKey, TableError, TableResult};

/// Convert a JSON value to an attribute value
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(to_attributes(map)),
    }
}

/// Convert a JSON object to an attribute map
pub fn to_attributes(map: &Map<String, Value>) -> HashMap<String, AttributeValue> {
    map.iter()
        .map(|(name, value)| (name.clone(), to_attribute(value)))
        .collect()
}

fn parse_number(n: &str) -> TableResult<Value> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::Number(i.into()));
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(Value::Number(u.into()));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| TableError::Serialization(format!("unrepresentable number: {}", n)))
}

/// Convert an attribute value to JSON
pub fn from_attribute(attr: &AttributeValue) -> TableResult<Value> {
    Ok(match attr {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => parse_number(n)?,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(
            items
                .iter()
                .map(from_attribute)
                .collect::<TableResult<Vec<_>>>()?,
        ),
        AttributeValue::M(map) => Value::Object(from_attributes(map)?),
        AttributeValue::Ss(set) => Value::Array(set.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(set) => Value::Array(
            set.iter()
                .map(|n| parse_number(n))
                .collect::<TableResult<Vec<_>>>()?,
        ),
        AttributeValue::B(blob) => Value::String(STANDARD.encode(blob.as_ref())),
        AttributeValue::Bs(blobs) => Value::Array(
            blobs
                .iter()
                .map(|blob| Value::String(STANDARD.encode(blob.as_ref())))
                .collect(),
        ),
        other => {
            return Err(TableError::Serialization(format!(
                "unsupported attribute type: {:?}",
                other
            )))
        }
    })
}

/// Convert an attribute map to a JSON object
pub fn from_attributes(map: &HashMap<String, AttributeValue>) -> TableResult<Item> {
    map.iter()
        .map(|(name, attr)| Ok((name.clone(), from_attribute(attr)?)))
        .collect()
}

/// Primary key attributes for `key`
pub fn key_attributes(key: &ItemKey) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (PK_ATTR.to_string(), AttributeValue::S(key.pk.clone())),
        (SK_ATTR.to_string(), AttributeValue::S(key.sk.clone())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_smithy_types::Blob;
    use serde_json::json;

    #[test]
    fn test_nested_structure_survives() {
        let value = json!({
            "PK": "TASK#t1",
            "count": 3,
            "ratio": 0.5,
            "negative": -12,
            "tags": ["a", "b"],
            "owner": {"email": "ann@club.org", "active": true, "phone": null}
        });
        let Value::Object(map) = &value else {
            unreachable!()
        };

        let back = from_attributes(&to_attributes(map)).unwrap();
        assert_eq!(Value::Object(back), value);
    }

    #[test]
    fn test_numbers_are_decimal_strings() {
        assert_eq!(to_attribute(&json!(42)), AttributeValue::N("42".to_string()));
        assert_eq!(from_attribute(&AttributeValue::N("1e3".to_string())).unwrap(), json!(1000.0));
        assert!(from_attribute(&AttributeValue::N("abc".to_string())).is_err());
    }

    #[test]
    fn test_sets_and_binary_read_as_arrays_and_base64() {
        let strings = AttributeValue::Ss(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(from_attribute(&strings).unwrap(), json!(["x", "y"]));

        let numbers = AttributeValue::Ns(vec!["1".to_string(), "2.5".to_string()]);
        assert_eq!(from_attribute(&numbers).unwrap(), json!([1, 2.5]));

        let blob = AttributeValue::B(Blob::new(b"hi".to_vec()));
        assert_eq!(from_attribute(&blob).unwrap(), json!("aGk="));
    }

    #[test]
    fn test_key_attributes() {
        let key = key_attributes(&ItemKey::new("USER#a@b.c", "META"));
        assert_eq!(key["PK"], AttributeValue::S("USER#a@b.c".to_string()));
        assert_eq!(key["SK"], AttributeValue::S("META".to_string()));
    }
}

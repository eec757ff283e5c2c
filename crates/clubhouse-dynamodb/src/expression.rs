//! Condition and filter expressions for DynamoDB requests

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::types::AttributeValue;

use clubhouse_core::keys::PK_ATTR;
use clubhouse_core::table::{CompiledExpression, Condition};

use crate::convert::to_attribute;

/// Expression plus its placeholder maps, ready for a request builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedExpression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl RenderedExpression {
    /// Names map, or `None` when empty
    pub fn names(&self) -> Option<HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone())
    }

    /// Values map, or `None` when empty
    ///
    /// DynamoDB rejects an empty `ExpressionAttributeValues` map.
    pub fn values(&self) -> Option<HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}

impl From<CompiledExpression> for RenderedExpression {
    fn from(compiled: CompiledExpression) -> Self {
        Self {
            expression: compiled.expression,
            names: into_hash(compiled.names),
            values: compiled
                .values
                .iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        }
    }
}

fn into_hash(map: BTreeMap<String, String>) -> HashMap<String, String> {
    map.into_iter().collect()
}

/// Render a write condition
///
/// Existence checks test the partition key attribute. Attribute comparisons
/// use `#c<i>` / `:c<i>` in depth-first order.
pub fn render_condition(condition: &Condition) -> RenderedExpression {
    let mut rendered = RenderedExpression::default();
    let mut counter = 0;
    rendered.expression = render_into(condition, &mut rendered, &mut counter);
    rendered
}

fn render_into(condition: &Condition, out: &mut RenderedExpression, counter: &mut usize) -> String {
    match condition {
        Condition::NotExists => {
            out.names.insert("#pk".to_string(), PK_ATTR.to_string());
            "attribute_not_exists(#pk)".to_string()
        }
        Condition::Exists => {
            out.names.insert("#pk".to_string(), PK_ATTR.to_string());
            "attribute_exists(#pk)".to_string()
        }
        Condition::AttributeEquals { attribute, value } => {
            let name = format!("#c{}", counter);
            let placeholder = format!(":c{}", counter);
            *counter += 1;
            out.names.insert(name.clone(), attribute.clone());
            out.values.insert(placeholder.clone(), to_attribute(value));
            format!("{} = {}", name, placeholder)
        }
        Condition::All(conditions) => {
            let parts: Vec<String> = conditions
                .iter()
                .map(|c| render_into(c, out, counter))
                .collect();
            match parts.len() {
                0 => {
                    out.names.insert("#pk".to_string(), PK_ATTR.to_string());
                    "attribute_exists(#pk) OR attribute_not_exists(#pk)".to_string()
                }
                1 => parts.into_iter().next().unwrap_or_default(),
                _ => format!("({})", parts.join(") AND (")),
            }
        }
    }
}

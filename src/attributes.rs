//! Typed product attributes.
//!
//! Attribute definitions form the live schema for product attribute maps. On
//! the wire a product carries `{attribute name -> value}`; in the store it
//! carries `{definition id -> value}`, so renaming is impossible to get wrong
//! and a deleted definition simply stops showing up.

use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use utoipa::openapi::{ObjectBuilder, OneOfBuilder, RefOr, Schema, SchemaType};
use utoipa::ToSchema;

use crate::models::AttributeDefinition;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    #[default]
    Text,
    Number,
    Select,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
        })
    }
}

/// A single attribute value. Numbers keep the exact JSON representation they
/// arrived with, so `14` is listed as `14` and not `14.0`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(Number),
    Text(String),
}

impl<'s> ToSchema<'s> for AttributeValue {
    fn schema() -> (&'s str, RefOr<Schema>) {
        (
            "AttributeValue",
            OneOfBuilder::new()
                .item(ObjectBuilder::new().schema_type(SchemaType::Number))
                .item(ObjectBuilder::new().schema_type(SchemaType::String))
                .into(),
        )
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AttributeError {
    #[error("unknown attribute: {0}")]
    Unknown(String),
    #[error("attribute `{name}` expects a {expected} value")]
    KindMismatch { name: String, expected: AttributeKind },
    #[error("`{value}` is not an option of attribute `{name}`")]
    NotAnOption { name: String, value: String },
}

/// Internal key for a human label: lower-cased, whitespace runs collapsed to
/// a single `_`. Not trimmed and not collision-free; the unique index on
/// attribute names is the only backstop.
pub fn derive_name(label: &str) -> String {
    let mut name = String::with_capacity(label.len());
    let mut in_whitespace = false;
    for ch in label.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                name.push('_');
                in_whitespace = true;
            }
        } else {
            in_whitespace = false;
            name.extend(ch.to_lowercase());
        }
    }
    name
}

/// Snapshot of the attribute definitions used to translate product maps.
pub struct AttributeSchema {
    by_name: HashMap<String, AttributeDefinition>,
    names: HashMap<u64, String>,
}

impl AttributeSchema {
    pub fn new(definitions: Vec<AttributeDefinition>) -> Self {
        let names = definitions
            .iter()
            .map(|definition| (definition.id, definition.name.clone()))
            .collect();
        let by_name = definitions
            .into_iter()
            .map(|definition| (definition.name.clone(), definition))
            .collect();
        Self { by_name, names }
    }

    /// Validate a name-keyed map and re-key it by definition id.
    pub fn encode(
        &self,
        named: BTreeMap<String, AttributeValue>,
    ) -> Result<BTreeMap<u64, AttributeValue>, AttributeError> {
        named
            .into_iter()
            .map(|(name, value)| {
                let definition = self
                    .by_name
                    .get(&name)
                    .ok_or_else(|| AttributeError::Unknown(name.clone()))?;
                check(definition, &value)?;
                Ok((definition.id, value))
            })
            .collect()
    }

    /// Re-key a stored map by attribute name, dropping values whose definition
    /// no longer exists.
    pub fn decode(&self, stored: &BTreeMap<u64, AttributeValue>) -> BTreeMap<String, AttributeValue> {
        stored
            .iter()
            .filter_map(|(id, value)| {
                self.names
                    .get(id)
                    .map(|name| (name.clone(), value.clone()))
            })
            .collect()
    }
}

fn check(definition: &AttributeDefinition, value: &AttributeValue) -> Result<(), AttributeError> {
    let mismatch = || AttributeError::KindMismatch {
        name: definition.name.clone(),
        expected: definition.kind,
    };
    match (definition.kind, value) {
        (AttributeKind::Number, AttributeValue::Number(_)) => Ok(()),
        (AttributeKind::Text, AttributeValue::Text(_)) => Ok(()),
        (AttributeKind::Select, AttributeValue::Text(choice)) => {
            if definition.options.is_empty() || definition.options.contains(choice) {
                Ok(())
            } else {
                Err(AttributeError::NotAnOption {
                    name: definition.name.clone(),
                    value: choice.clone(),
                })
            }
        }
        _ => Err(mismatch()),
    }
}

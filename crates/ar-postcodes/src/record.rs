use std::collections::{btree_map, BTreeMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{field::Field, postcode::Postcode};

/// A single attribute value of a location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    /// The service knows the attribute but has no value for it (e.g. terminated postcodes).
    Null,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Convert a raw JSON scalar. Arrays and objects have no flat representation.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Number(number) => number.as_f64().map(Self::Number),
            Value::Bool(flag) => Some(Self::Text(flag.to_string())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(number: f64) -> Self {
        Self::Number(number)
    }
}

/// Output key to value mapping for one location.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationRecord(BTreeMap<String, FieldValue>);

impl LocationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn insert<K: Into<String>, V: Into<FieldValue>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    /// The record's postcode, normalized. `None` if the postcode key is missing or not text.
    pub fn postcode(&self) -> Option<Postcode> {
        self.get(Field::Postcode.output_key())
            .and_then(FieldValue::as_str)
            .map(Postcode::new)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for LocationRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

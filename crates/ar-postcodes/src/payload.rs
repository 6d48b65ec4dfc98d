use serde_json::Value;

use crate::{
    api_interfaces::postcodes,
    error::LookupError,
    field::{Field, FieldDescriptor},
    record::{FieldValue, LocationRecord},
};

/// The fields to request from the lookup and extract from its results.
///
/// The postcode field is always part of the set so every record can be keyed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    fields: Vec<Field>,
}

impl Payload {
    /// Deduplicates `fields` keeping first occurrences, then appends the postcode if absent.
    pub fn new<I: IntoIterator<Item = Field>>(fields: I) -> Self {
        let mut deduped: Vec<Field> = Vec::new();
        for field in fields {
            if !deduped.contains(&field) {
                deduped.push(field);
            }
        }
        if !deduped.contains(&Field::Postcode) {
            deduped.push(Field::Postcode);
        }
        Self { fields: deduped }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Comma-joined wire names for the `filter` query parameter, each nested group once.
    pub fn filter_parameter(&self) -> String {
        let mut groups: Vec<&str> = Vec::new();
        for field in &self.fields {
            let group = field.descriptor().wire_group();
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups.join(",")
    }

    /// Build one record per entry of a successful envelope, in the service's order.
    ///
    /// An entry without a result (`result: null`) fails like any other missing key.
    pub(crate) fn extract(
        &self,
        entries: &[postcodes::Entry],
    ) -> Result<Vec<LocationRecord>, LookupError> {
        entries
            .iter()
            .map(|entry| match &entry.result {
                Some(result) => self.extract_one(&entry.query, result),
                None => Err(LookupError::MalformedResponse {
                    context: format!("query `{}`", entry.query),
                    field: "result".to_string(),
                }),
            })
            .collect()
    }

    fn extract_one(&self, query: &str, result: &Value) -> Result<LocationRecord, LookupError> {
        let mut record = LocationRecord::new();
        for field in &self.fields {
            let descriptor = field.descriptor();
            let value = descriptor
                .locate(result)
                .and_then(FieldValue::from_json)
                .ok_or_else(|| malformed(query, &descriptor))?;
            record.insert(descriptor.output_key(), value);
        }
        Ok(record)
    }
}

fn malformed(query: &str, descriptor: &FieldDescriptor) -> LookupError {
    LookupError::MalformedResponse {
        context: format!("query `{query}`"),
        field: descriptor.to_string(),
    }
}

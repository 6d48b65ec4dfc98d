use std::{fmt, str::FromStr};

use serde_json::Value;
use thiserror::Error;

/// Attributes of a location the postcodes.io service can return.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Postcode,
    Longitude,
    Latitude,
    /// International Territorial Level region code, returned under `codes.nuts`.
    ItlCode,
}

/// How a field is addressed on the wire and where it lands in a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldDescriptor {
    /// A top-level key of a lookup result.
    Flat {
        output_key: &'static str,
        wire_name: &'static str,
    },
    /// A key inside a composite group of a lookup result, e.g. `codes.nuts`.
    Nested {
        group: &'static str,
        sub_key: &'static str,
        output_key: &'static str,
    },
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Postcode,
        Field::Longitude,
        Field::Latitude,
        Field::ItlCode,
    ];

    pub const fn descriptor(self) -> FieldDescriptor {
        match self {
            Field::Postcode => FieldDescriptor::Flat {
                output_key: "postcode",
                wire_name: "postcode",
            },
            Field::Longitude => FieldDescriptor::Flat {
                output_key: "long",
                wire_name: "longitude",
            },
            Field::Latitude => FieldDescriptor::Flat {
                output_key: "lat",
                wire_name: "latitude",
            },
            Field::ItlCode => FieldDescriptor::Nested {
                group: "codes",
                sub_key: "nuts",
                output_key: "itl",
            },
        }
    }

    pub const fn output_key(self) -> &'static str {
        self.descriptor().output_key()
    }
}

impl FieldDescriptor {
    pub const fn output_key(&self) -> &'static str {
        match self {
            FieldDescriptor::Flat { output_key, .. } | FieldDescriptor::Nested { output_key, .. } => {
                *output_key
            }
        }
    }

    /// The name sent in the `filter` query parameter. Nested fields are requested by group.
    pub const fn wire_group(&self) -> &'static str {
        match self {
            FieldDescriptor::Flat { wire_name, .. } => *wire_name,
            FieldDescriptor::Nested { group, .. } => *group,
        }
    }

    /// Look the field up in one lookup result. `None` if a key on the path is absent.
    pub fn locate<'a>(&self, result: &'a Value) -> Option<&'a Value> {
        match self {
            FieldDescriptor::Flat { wire_name, .. } => result.get(*wire_name),
            FieldDescriptor::Nested { group, sub_key, .. } => result.get(*group)?.get(*sub_key),
        }
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDescriptor::Flat { wire_name, .. } => f.write_str(wire_name),
            FieldDescriptor::Nested { group, sub_key, .. } => write!(f, "{group}.{sub_key}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown field `{0}`")]
pub struct UnknownFieldError(String);

/// Accepts the output key (`long`) or the qualified wire name (`longitude`, `codes.nuts`).
impl FromStr for Field {
    type Err = UnknownFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| {
                let descriptor = field.descriptor();
                descriptor.output_key() == s || descriptor.to_string() == s
            })
            .ok_or_else(|| UnknownFieldError(s.to_string()))
    }
}

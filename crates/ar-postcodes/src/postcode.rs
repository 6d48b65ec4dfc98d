use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

const POSTCODE_PATTERN: &str =
    r"^(?P<sector>(?P<district>(?P<area>[A-Z]{1,2})[0-9][A-Z0-9]?) ?[0-9])[A-Z]{2}$";
static POSTCODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(POSTCODE_PATTERN).expect("Invalid regex pattern"));

/// A normalized postcode: uppercase, no whitespace anywhere.
///
/// Every comparison between the cache, request batches and datasets goes through this type,
/// so `"SW1A 1AA"` and `"sw1a1aa"` are the same code.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Postcode(String);

/// The nested levels of a UK postcode.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Elements {
    pub area: String,
    pub district: String,
    pub sector: String,
}

impl Postcode {
    pub fn new(raw: &str) -> Self {
        Self(
            raw.chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_uppercase)
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the code has the shape of a full UK postcode.
    pub fn is_valid(&self) -> bool {
        POSTCODE_REGEX.is_match(&self.0)
    }

    /// Split the code into area, district and sector. `None` if the code is not a valid postcode.
    pub fn elements(&self) -> Option<Elements> {
        let captures = POSTCODE_REGEX.captures(&self.0)?;
        Some(Elements {
            area: captures["area"].to_string(),
            district: captures["district"].to_string(),
            sector: captures["sector"].to_string(),
        })
    }
}

impl From<&str> for Postcode {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Postcode {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<Postcode> for String {
    fn from(code: Postcode) -> Self {
        code.0
    }
}

impl AsRef<str> for Postcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Postcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

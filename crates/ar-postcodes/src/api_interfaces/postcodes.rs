use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bulk lookup request body.
#[derive(Serialize)]
pub struct Request<'a> {
    pub postcodes: Vec<&'a str>,
}

/// Raw response envelope from the bulk lookup.
#[derive(Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub result: Option<Vec<Entry>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One looked-up postcode. `result` is null when the service does not know the code.
#[derive(Deserialize)]
pub struct Entry {
    pub query: String,
    pub result: Option<Value>,
}

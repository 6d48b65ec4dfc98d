mod api_interfaces;
pub mod batch;
pub mod cache;
pub mod categories;
pub mod client;
pub mod constants;
pub mod error;
pub mod field;
pub mod payload;
pub mod postcode;
pub mod record;
pub mod resolve;
mod util;

pub use cache::{CacheStore, LocationCache};
pub use client::{Client, LookupConfig};
pub use field::{Field, FieldDescriptor};
pub use payload::Payload;
pub use postcode::Postcode;
pub use record::{FieldValue, LocationRecord};
pub use resolve::resolve;
pub use util::default_http_client;

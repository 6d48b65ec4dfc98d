use std::num::NonZeroUsize;

/// The default base URL of the postcodes.io service
pub const DEFAULT_ENDPOINT: &str = "https://api.postcodes.io";

/// Path of the bulk postcode lookup, appended to the endpoint
pub const BULK_LOOKUP_PATH: &str = "/postcodes";

/// The most postcodes the bulk lookup accepts in one request
pub const MAX_BATCH_SIZE: usize = 100;

pub const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(MAX_BATCH_SIZE) {
    Some(size) => size,
    None => panic!("batch limit must be non-zero"),
};

/// Name of the query parameter carrying the requested fields
pub const FILTER_PARAM: &str = "filter";

/// Response envelope status for a successful lookup
pub const SUCCESS_STATUS: u16 = 200;

/// Default file name of the persisted location cache
pub const DEFAULT_CACHE_FILE: &str = "locations.json";

/// Postcode areas for islands off the mainland, which have no accident data.
pub const ISLAND_AREAS: [&str; 2] = ["IM", "GY"];

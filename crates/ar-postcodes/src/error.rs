use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("batch of {size} postcodes exceeds the lookup limit of {capacity}")]
    InvalidBatchSize { size: usize, capacity: usize },
    #[error("the lookup failed with status {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("the request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("the response body could not be read: {0}")]
    ResponseBodyError(#[source] reqwest::Error),
    #[error("unable to parse the response body: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("lookup response is missing `{field}` ({context})")]
    MalformedResponse { context: String, field: String },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to read the file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("unable to parse the file: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("unable to write the file: {0}")]
    WriteError(#[from] std::io::Error),
    #[error("unable to serialize the data: {0}")]
    SerializeError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("location lookup failed: {0}")]
    Lookup(#[from] LookupError),
    #[error("unable to persist the location cache: {0}")]
    Save(#[from] SaveError),
    #[error("a looked up record has no postcode")]
    MissingPostcode,
}

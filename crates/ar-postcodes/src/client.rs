use std::num::NonZeroUsize;

use derive_builder::Builder;
use futures::future;

use crate::{
    api_interfaces::postcodes,
    batch,
    constants::*,
    error::LookupError,
    payload::Payload,
    postcode::Postcode,
    record::LocationRecord,
    util::default_http_client,
};

/// Where to send lookups and how many postcodes go in each request.
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct LookupConfig {
    /// Base URL of the service; the bulk lookup path is appended.
    #[builder(setter(into), default = "DEFAULT_ENDPOINT.to_string()")]
    pub endpoint: String,
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    pub batch_size: NonZeroUsize,
}

impl LookupConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.batch_size {
            Some(size) if size.get() > MAX_BATCH_SIZE => Err(format!(
                "batch size {size} exceeds the lookup limit of {MAX_BATCH_SIZE}"
            )),
            _ => Ok(()),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Client {
    http_client: reqwest::Client,
    config: LookupConfig,
}

impl Client {
    pub fn new(http_client: reqwest::Client, config: LookupConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// A client for the public postcodes.io service.
    pub fn with_defaults() -> Result<Self, LookupError> {
        Ok(Self::new(default_http_client()?, LookupConfig::default()))
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Look up every code, one request per batch, all batches in flight at once.
    ///
    /// Records come back batch by batch in submission order regardless of which response
    /// arrives first. If any batch fails the whole call fails with the first failing batch's
    /// error and the other batches' records are dropped.
    pub async fn fetch_all<I>(
        &self,
        codes: I,
        payload: &Payload,
    ) -> Result<Vec<LocationRecord>, LookupError>
    where
        I: IntoIterator<Item = Postcode>,
    {
        let batches = batch::plan(codes, self.config.batch_size);
        if batches.is_empty() {
            return Ok(Vec::new());
        }
        log::debug!("looking up postcodes in {} batches", batches.len());
        let results = future::join_all(
            batches
                .iter()
                .map(|codes| self.fetch_batch(codes, payload)),
        )
        .await;

        let mut records = Vec::new();
        for result in results {
            records.extend(result?);
        }
        Ok(records)
    }

    /// Look up a single batch of at most [`MAX_BATCH_SIZE`] codes.
    ///
    /// Records are in the order the service returns them. A code the service does not know
    /// fails the batch with [`LookupError::MalformedResponse`].
    pub async fn fetch_batch(
        &self,
        codes: &[Postcode],
        payload: &Payload,
    ) -> Result<Vec<LocationRecord>, LookupError> {
        if codes.len() > MAX_BATCH_SIZE {
            return Err(LookupError::InvalidBatchSize {
                size: codes.len(),
                capacity: MAX_BATCH_SIZE,
            });
        }
        let body = serde_json::to_string(&postcodes::Request {
            postcodes: codes.iter().map(Postcode::as_str).collect(),
        })?;

        log::info!("Sending request to postcodes.io ({})", codes.len());
        let response = self
            .http_client
            .post(self.lookup_url())
            .header("Content-Type", "application/json")
            .query(&[(FILTER_PARAM, payload.filter_parameter())])
            .body(body)
            .send()
            .await?;
        let http_status = response.status();
        let response_body = response.text().await.map_err(LookupError::ResponseBodyError)?;

        let envelope: postcodes::Response = match serde_json::from_str(&response_body) {
            Ok(envelope) => envelope,
            Err(_) if !http_status.is_success() => {
                return Err(LookupError::Remote {
                    status: http_status.as_u16(),
                    message: response_body,
                })
            }
            Err(e) => return Err(e.into()),
        };
        if envelope.status != SUCCESS_STATUS {
            return Err(LookupError::Remote {
                status: envelope.status,
                message: envelope.error.unwrap_or_default(),
            });
        }
        let entries = envelope
            .result
            .ok_or_else(|| LookupError::MalformedResponse {
                context: format!("envelope for {} postcodes", codes.len()),
                field: "result".to_string(),
            })?;
        payload.extract(&entries)
    }

    fn lookup_url(&self) -> String {
        format!(
            "{}{}",
            self.config.endpoint.trim_end_matches('/'),
            BULK_LOOKUP_PATH
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::Field, record::FieldValue};
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn client_for(server: &MockServer, batch_size: usize) -> Client {
        let config = LookupConfigBuilder::default()
            .endpoint(server.base_url())
            .batch_size(NonZeroUsize::new(batch_size).unwrap())
            .build()
            .unwrap();
        Client::new(reqwest::Client::new(), config)
    }

    fn codes(raw: &[&str]) -> Vec<Postcode> {
        raw.iter().map(|code| Postcode::new(code)).collect()
    }

    fn entry(code: &str, long: f64) -> Value {
        json!({
            "query": code,
            "result": {"postcode": code, "longitude": long, "latitude": 51.0}
        })
    }

    #[test]
    fn config_defaults() {
        let config = LookupConfigBuilder::default().build().unwrap();
        assert_eq!(config, LookupConfig::default());
        assert_eq!(config.batch_size.get(), MAX_BATCH_SIZE);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn with_defaults_targets_public_service() {
        let client = Client::with_defaults().unwrap();
        assert_eq!(client.config(), &LookupConfig::default());
        assert_eq!(client.lookup_url(), "https://api.postcodes.io/postcodes");
    }

    #[test]
    fn config_rejects_oversized_batches() {
        let config = LookupConfigBuilder::default()
            .batch_size(NonZeroUsize::new(MAX_BATCH_SIZE + 1).unwrap())
            .build();
        assert!(config.is_err());
    }

    #[tokio::test]
    async fn fetch_batch_success() {
        // Arrange
        let server = MockServer::start_async().await;
        let lookup_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(BULK_LOOKUP_PATH)
                    .query_param(FILTER_PARAM, "longitude,latitude,codes,postcode")
                    .json_body(json!({"postcodes": ["SW1A1AA"]}));
                then.status(200).json_body(json!({
                    "status": 200,
                    "result": [{
                        "query": "SW1A1AA",
                        "result": {
                            "postcode": "SW1A 1AA",
                            "longitude": -0.141588,
                            "latitude": 51.501009,
                            "codes": {"nuts": "TLI32"}
                        }
                    }]
                }));
            })
            .await;
        let client = client_for(&server, MAX_BATCH_SIZE);
        let payload = Payload::new([Field::Longitude, Field::Latitude, Field::ItlCode]);

        // Act
        let records = client.fetch_batch(&codes(&["SW1A1AA"]), &payload).await;

        // Assert
        assert!(
            records.is_ok(),
            "Failed to look up postcodes: {:?}",
            records.unwrap_err()
        );
        let records = records.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("itl"), Some(&FieldValue::from("TLI32")));
        assert_eq!(records[0].postcode(), Some(Postcode::new("SW1A1AA")));
        lookup_mock.assert();
    }

    #[tokio::test]
    async fn fetch_batch_keeps_service_order() {
        // Arrange
        let server = MockServer::start_async().await;
        let lookup_mock = server
            .mock_async(|when, then| {
                when.method(POST).path(BULK_LOOKUP_PATH);
                then.status(200).json_body(json!({
                    "status": 200,
                    "result": [entry("BB11BB", 2.0), entry("AA11AA", 1.0)]
                }));
            })
            .await;
        let client = client_for(&server, MAX_BATCH_SIZE);
        let payload = Payload::new([Field::Longitude]);

        // Act
        let records = client
            .fetch_batch(&codes(&["AA11AA", "BB11BB"]), &payload)
            .await
            .unwrap();

        // Assert
        let order: Vec<_> = records.iter().filter_map(|r| r.postcode()).collect();
        assert_eq!(order, codes(&["BB11BB", "AA11AA"]));
        lookup_mock.assert();
    }

    #[tokio::test]
    async fn fetch_batch_oversized_fails_before_request() {
        // Arrange
        let server = MockServer::start_async().await;
        let lookup_mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200);
            })
            .await;
        let client = client_for(&server, MAX_BATCH_SIZE);
        let oversized: Vec<Postcode> = (0..=MAX_BATCH_SIZE)
            .map(|i| Postcode::new(&format!("AB{i}1CD")))
            .collect();

        // Act
        let records = client
            .fetch_batch(&oversized, &Payload::new([Field::Latitude]))
            .await;

        // Assert
        assert!(matches!(
            records.unwrap_err(),
            LookupError::InvalidBatchSize { size: 101, capacity: 100 }
        ));
        lookup_mock.assert_hits(0);
    }

    #[tokio::test]
    async fn fetch_batch_bad_status() {
        // Arrange
        let server = MockServer::start_async().await;
        let lookup_mock = server
            .mock_async(|when, then| {
                when.method(POST).path(BULK_LOOKUP_PATH);
                then.status(400)
                    .json_body(json!({"status": 400, "error": "Invalid JSON submitted"}));
            })
            .await;
        let client = client_for(&server, MAX_BATCH_SIZE);

        // Act
        let records = client
            .fetch_batch(&codes(&["M11AE"]), &Payload::new([Field::Latitude]))
            .await;

        // Assert
        assert!(matches!(
            records.unwrap_err(),
            LookupError::Remote { status: 400, message } if message == "Invalid JSON submitted"
        ));
        lookup_mock.assert();
    }

    #[tokio::test]
    async fn fetch_batch_bad_status_without_envelope() {
        // Arrange
        let server = MockServer::start_async().await;
        let lookup_mock = server
            .mock_async(|when, then| {
                when.method(POST).path(BULK_LOOKUP_PATH);
                then.status(502).body("Bad Gateway");
            })
            .await;
        let client = client_for(&server, MAX_BATCH_SIZE);

        // Act
        let records = client
            .fetch_batch(&codes(&["M11AE"]), &Payload::new([Field::Latitude]))
            .await;

        // Assert
        assert!(matches!(
            records.unwrap_err(),
            LookupError::Remote { status: 502, .. }
        ));
        lookup_mock.assert();
    }

    #[tokio::test]
    async fn fetch_batch_bad_json() {
        // Arrange
        let server = MockServer::start_async().await;
        let lookup_mock = server
            .mock_async(|when, then| {
                when.method(POST).path(BULK_LOOKUP_PATH);
                then.status(200)
                    .header("Content-Type", "application/json")
                    .body(r#"{"error": "something is amiss" }"#);
            })
            .await;
        let client = client_for(&server, MAX_BATCH_SIZE);

        // Act
        let records = client
            .fetch_batch(&codes(&["M11AE"]), &Payload::new([Field::Latitude]))
            .await;

        // Assert
        assert!(matches!(records.unwrap_err(), LookupError::ParseError(_)));
        lookup_mock.assert();
    }

    #[tokio::test]
    async fn fetch_batch_invalid_url() {
        // Arrange
        let config = LookupConfigBuilder::default()
            .endpoint("http://test.invalid")
            .build()
            .unwrap();
        let client = Client::new(reqwest::Client::new(), config);

        // Act
        let records = client
            .fetch_batch(&codes(&["M11AE"]), &Payload::new([Field::Latitude]))
            .await;

        // Assert
        assert!(matches!(records.unwrap_err(), LookupError::RequestError(_)));
    }

    #[tokio::test]
    async fn fetch_all_empty_makes_no_request() {
        // Arrange
        let server = MockServer::start_async().await;
        let lookup_mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200);
            })
            .await;
        let client = client_for(&server, MAX_BATCH_SIZE);

        // Act
        let records = client
            .fetch_all(Vec::new(), &Payload::new([Field::Latitude]))
            .await;

        // Assert
        assert!(records.unwrap().is_empty());
        lookup_mock.assert_hits(0);
    }

    #[tokio::test]
    async fn fetch_all_keeps_submission_order() {
        // Arrange: the last batch answers first, the first batch answers last
        let server = MockServer::start_async().await;
        let mut mocks = Vec::new();
        for (batch, delay_ms) in [
            (vec!["AA11AA", "BB11BB"], 400),
            (vec!["CC11CC", "DD11DD"], 200),
            (vec!["EE11EE"], 0),
        ] {
            let result: Vec<Value> = batch
                .iter()
                .enumerate()
                .map(|(i, code)| entry(code, i as f64))
                .collect();
            let mock = server
                .mock_async(|when, then| {
                    when.method(POST)
                        .path(BULK_LOOKUP_PATH)
                        .json_body(json!({ "postcodes": batch }));
                    then.status(200)
                        .delay(Duration::from_millis(delay_ms))
                        .json_body(json!({"status": 200, "result": result}));
                })
                .await;
            mocks.push(mock);
        }
        let client = client_for(&server, 2);
        let input = codes(&["AA11AA", "BB11BB", "CC11CC", "DD11DD", "EE11EE"]);

        // Act
        let records = client
            .fetch_all(input.clone(), &Payload::new([Field::Longitude]))
            .await
            .unwrap();

        // Assert
        let order: Vec<_> = records.iter().filter_map(|r| r.postcode()).collect();
        assert_eq!(order, input);
        for mock in mocks {
            mock.assert();
        }
    }

    #[tokio::test]
    async fn fetch_all_fails_if_any_batch_fails() {
        // Arrange
        let server = MockServer::start_async().await;
        let ok_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(BULK_LOOKUP_PATH)
                    .json_body(json!({"postcodes": ["AA11AA"]}));
                then.status(200)
                    .json_body(json!({"status": 200, "result": [entry("AA11AA", 1.0)]}));
            })
            .await;
        let failing_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(BULK_LOOKUP_PATH)
                    .json_body(json!({"postcodes": ["BB11BB"]}));
                then.status(500)
                    .json_body(json!({"status": 500, "error": "Internal Server Error"}));
            })
            .await;
        let client = client_for(&server, 1);

        // Act
        let records = client
            .fetch_all(codes(&["AA11AA", "BB11BB"]), &Payload::new([Field::Longitude]))
            .await;

        // Assert
        assert!(matches!(
            records.unwrap_err(),
            LookupError::Remote { status: 500, .. }
        ));
        ok_mock.assert();
        failing_mock.assert();
    }
}

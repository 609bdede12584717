//! PostgREST-backed implementation of [`MeasurementStore`].

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::debug;

use roadsense_core::AggregateRecord;

use crate::{MeasurementStore, RoadStatus, StoreError};

/// Row-API path prefix.
const REST_PREFIX: &str = "/rest/v1";

/// HTTP row client for a PostgREST-style store.
///
/// Roads: `PATCH {base}/rest/v1/roads?id=eq.{id}` with `{"status": ...}`.
/// Measurements: `POST {base}/rest/v1/measurements`. The measurement
/// timestamp is a column default on the store side and is not sent.
pub struct RestStore {
    base_url: String,
    client: reqwest::Client,
    headers: HeaderMap,
}

/// Wire form of one measurement row.
#[derive(Serialize)]
struct MeasurementRow<'a> {
    road_id: &'a str,
    quality: f64,
    condition: &'a str,
    holes_count: u64,
    latitude: f64,
    longitude: f64,
}

impl RestStore {
    /// Create a client for `base_url` (no trailing slash). An empty
    /// `api_key` sends no auth headers, for local unauthenticated stacks.
    pub fn new(base_url: impl Into<String>, api_key: &str) -> Self {
        let mut headers = HeaderMap::new();
        if !api_key.is_empty() {
            if let Ok(value) = HeaderValue::from_str(api_key) {
                let _ = headers.insert("apikey", value);
            }
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
                let _ = headers.insert(AUTHORIZATION, value);
            }
        }
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            let _ = base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
            headers,
        }
    }

    async fn check(response: reqwest::Response) -> Result<(), StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MeasurementStore for RestStore {
    async fn set_road_status(&self, road_id: &str, status: RoadStatus) -> Result<(), StoreError> {
        let url = format!("{}{REST_PREFIX}/roads?id=eq.{road_id}", self.base_url);
        debug!(road_id, status = status.as_str(), "updating road status");
        let response = self
            .client
            .patch(&url)
            .headers(self.headers.clone())
            .json(&serde_json::json!({ "status": status.as_str() }))
            .send()
            .await?;
        Self::check(response).await
    }

    async fn insert_measurement(&self, record: &AggregateRecord) -> Result<(), StoreError> {
        let url = format!("{}{REST_PREFIX}/measurements", self.base_url);
        debug!(road_id = %record.road_id, "inserting aggregate measurement");
        let row = MeasurementRow {
            road_id: &record.road_id,
            quality: record.avg_quality,
            condition: &record.modal_condition,
            holes_count: record.total_holes,
            latitude: record.avg_latitude,
            longitude: record.avg_longitude,
        };
        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&row)
            .send()
            .await?;
        Self::check(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> AggregateRecord {
        AggregateRecord {
            road_id: "road-42".into(),
            avg_quality: 2.5,
            total_holes: 7,
            modal_condition: "POOR".into(),
            avg_latitude: 48.1,
            avg_longitude: 11.5,
        }
    }

    #[tokio::test]
    async fn road_status_patch_targets_one_row() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/roads"))
            .and(query_param("id", "eq.road-42"))
            .and(body_partial_json(serde_json::json!({"status": "recording"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(server.uri(), "");
        store
            .set_road_status("road-42", RoadStatus::Recording)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn measurement_insert_sends_row_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/measurements"))
            .and(body_partial_json(serde_json::json!({
                "road_id": "road-42",
                "quality": 2.5,
                "condition": "POOR",
                "holes_count": 7,
                "latitude": 48.1,
                "longitude": 11.5,
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(server.uri(), "");
        store.insert_measurement(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn api_key_is_sent_as_apikey_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/measurements"))
            .and(header("apikey", "sekrit"))
            .and(header("authorization", "Bearer sekrit"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(server.uri(), "sekrit");
        store.insert_measurement(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/roads"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = RestStore::new(server.uri(), "");
        let err = store
            .set_road_status("road-1", RoadStatus::Idle)
            .await
            .unwrap_err();
        match err {
            StoreError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            StoreError::Http(_) => panic!("expected status error"),
        }
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url_is_tolerated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/measurements"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(format!("{}/", server.uri()), "");
        store.insert_measurement(&record()).await.unwrap();
    }
}

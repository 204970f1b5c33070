use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::state::entities::AppState;

use super::{CloudRecord, CloudStore, DEFAULT_HTTP_TIMEOUT, DEFAULT_TABLE};

/// Connection settings for a PostgREST compatible endpoint.
#[derive(Debug, Clone)]
pub struct RestCloudConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    pub api_key: String,
    pub table: String,
    pub timeout: Duration,
}

impl RestCloudConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            table: DEFAULT_TABLE.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Stores one row per device: `device_id` (unique), `data` (the state blob) and `updated_at`.
pub struct RestCloudStore {
    client: Client,
    config: RestCloudConfig,
}

#[derive(Deserialize)]
struct DataRow {
    data: AppState,
}

impl RestCloudStore {
    pub fn new(config: RestCloudConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }
}

#[async_trait]
impl CloudStore for RestCloudStore {
    #[instrument(skip(self))]
    async fn fetch(&self, device_id: &str) -> Result<Option<AppState>> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[
                ("device_id", format!("eq.{device_id}")),
                ("select", "data".to_string()),
            ])
            .send()
            .await
            .context("Failed to reach cloud store")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Cloud store answered {status}: {body}"));
        }

        let rows = response
            .json::<Vec<DataRow>>()
            .await
            .context("Failed to parse cloud state")?;
        debug!("Cloud store returned {} rows", rows.len());
        Ok(rows.into_iter().next().map(|v| v.data))
    }

    #[instrument(skip_all, fields(device_id = %record.device_id))]
    async fn upsert(&self, record: CloudRecord) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.table_url()))
            .query(&[("on_conflict", "device_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&record)
            .send()
            .await
            .context("Failed to reach cloud store")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Cloud store answered {status}: {body}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use crate::{
        state::entities::AppState,
        sync::{CloudRecord, CloudStore},
    };

    use super::{RestCloudConfig, RestCloudStore};

    fn store_for(server: &MockServer) -> RestCloudStore {
        RestCloudStore::new(RestCloudConfig::new(server.uri(), "secret")).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_none() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/time_tracker_data"))
            .and(query_param("device_id", "eq.device"))
            .and(query_param("select", "data"))
            .and(header("apikey", "secret"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        assert_eq!(store_for(&server).fetch("device").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_returns_state() -> Result<()> {
        let server = MockServer::start().await;
        let state = AppState::default();
        Mock::given(method("GET"))
            .and(path("/rest/v1/time_tracker_data"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "data": state.clone() }])),
            )
            .mount(&server)
            .await;

        assert_eq!(store_for(&server).fetch("device").await?, Some(state));
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(store_for(&server).fetch("device").await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_sends_record() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/time_tracker_data"))
            .and(query_param("on_conflict", "device_id"))
            .and(header("prefer", "resolution=merge-duplicates,return=minimal"))
            .and(body_partial_json(json!({
                "device_id": "device",
                "updated_at": "2018-07-04T00:00:00Z",
                "data": { "settings": { "intervalHours": 1.0, "sleepStart": "23:00" } }
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .upsert(CloudRecord {
                device_id: "device".into(),
                data: Arc::new(AppState::default()),
                updated_at: Utc.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap(),
            })
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .upsert(CloudRecord {
                device_id: "device".into(),
                data: Arc::new(AppState::default()),
                updated_at: Utc::now(),
            })
            .await;
        assert!(result.is_err());
    }
}

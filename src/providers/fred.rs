//! FRED client
//!
//! Latest-observation lookups against the St. Louis Fed data API.

use crate::error::PipelineError;
use crate::ports::{MacroObservation, MacroSeriesPort};
use crate::providers::http_client;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

pub struct FredClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FredClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

#[async_trait]
impl MacroSeriesPort for FredClient {
    async fn latest_observation(&self, series_id: &str) -> Result<MacroObservation> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("series_id", series_id),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Collaborator(format!(
                "FRED returned status {}",
                response.status()
            )));
        }

        let body: ObservationsResponse = response.json().await?;
        let latest = body.observations.into_iter().next().ok_or_else(|| {
            PipelineError::Collaborator(format!("FRED series '{}' has no observations", series_id))
        })?;

        debug!(series = series_id, date = %latest.date, "FRED observation received");
        Ok(MacroObservation {
            series_id: series_id.to_string(),
            date: latest.date,
            value: latest.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_deserialization() {
        let raw = r#"{"observations":[{"date":"2024-06-01","value":"5.33","realtime_start":"x","realtime_end":"y"}]}"#;
        let body: ObservationsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.observations[0].value, "5.33");
    }

    #[test]
    fn test_empty_series_deserializes() {
        let body: ObservationsResponse = serde_json::from_str(r#"{"observations":[]}"#).unwrap();
        assert!(body.observations.is_empty());
    }
}

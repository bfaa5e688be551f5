use crate::context::GlobalContext;
use crate::errors::FetchError;
use crate::metrics_defs::ROLLOUTS_FETCH_DURATION;
use crate::types::Rollout;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Deserialize)]
struct RolloutsResponse {
    #[serde(default)]
    rollouts: Vec<RolloutRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RolloutRecord {
    rollout_id: Option<String>,
    traffic_percent_strategy: Option<TrafficPercentStrategy>,
}

#[derive(Deserialize)]
struct TrafficPercentStrategy {
    // serde_json is built with preserve_order, so iterating this map yields
    // JSON document order. That order is the one delivered downstream.
    percentages: serde_json::Map<String, serde_json::Value>,
}

/// Client for the service-management rollouts endpoint. Only the first
/// element of the response is consulted; with the SUCCESS status filter the
/// backend returns the newest successful rollout first.
#[derive(Clone)]
pub struct RolloutsClient {
    context: Arc<GlobalContext>,
    client: reqwest::Client,
    url: String,
}

impl RolloutsClient {
    pub fn new(context: Arc<GlobalContext>) -> Self {
        let url = format!(
            "{}/v1/services/{}/rollouts",
            context
                .server_config()
                .service_management
                .url
                .trim_end_matches('/'),
            context.service_name()
        );

        RolloutsClient {
            context,
            client: reqwest::Client::new(),
            url,
        }
    }

    /// Fetches the newest successful rollout for the service.
    pub async fn fetch_latest(&self) -> Result<Rollout, FetchError> {
        let start = Instant::now();

        let result = self.fetch_latest_inner().await;

        let status = if result.is_ok() { "success" } else { "failure" };
        metrics::histogram!(ROLLOUTS_FETCH_DURATION.name, "status" => status)
            .record(start.elapsed().as_secs_f64());

        result
    }

    async fn fetch_latest_inner(&self) -> Result<Rollout, FetchError> {
        let mut request = self
            .client
            .get(&self.url)
            .query(&[("filter", "status=SUCCESS")]);

        if let Some(token) = self.context.auth_token() {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status(),
                url: self.url.clone(),
            });
        }

        let body = response.text().await?;
        let parsed: RolloutsResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        let record = parsed
            .rollouts
            .into_iter()
            .next()
            .ok_or(FetchError::NoActiveRollout)?;

        let rollout_id = record
            .rollout_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FetchError::Malformed("rollout without rolloutId".to_string()))?;

        let strategy = record.traffic_percent_strategy.ok_or_else(|| {
            FetchError::Malformed(format!(
                "rollout {rollout_id} has no traffic percent strategy"
            ))
        })?;

        if strategy.percentages.is_empty() {
            return Err(FetchError::Malformed(format!(
                "rollout {rollout_id} has no percentages"
            )));
        }

        let mut percentages = Vec::with_capacity(strategy.percentages.len());
        for (config_id, value) in strategy.percentages {
            let percent = value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    FetchError::Malformed(format!("non-integer percent for config {config_id}"))
                })?;
            percentages.push((config_id, percent));
        }

        Ok(Rollout {
            rollout_id,
            percentages,
        })
    }
}

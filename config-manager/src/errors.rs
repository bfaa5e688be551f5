use crate::types::{ConfigId, RolloutId};
use reqwest::StatusCode;
use thiserror::Error;

/// Errors from the service-management fetchers.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("could not reach service management: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("malformed rollouts response: {0}")]
    Malformed(String),

    #[error("no successful rollout available")]
    NoActiveRollout,
}

/// Errors from one apply sequence. None of these are fatal; the next tick
/// retries from scratch.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("failed to fetch rollouts: {0}")]
    Rollouts(#[from] FetchError),

    #[error("{} of {total} config downloads failed for rollout {rollout_id}", failed.len())]
    PartialDownload {
        rollout_id: RolloutId,
        failed: Vec<ConfigId>,
        total: usize,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("managed rollout strategy requires a service name")]
    MissingServiceName,
}

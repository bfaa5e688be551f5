use bytes::Bytes;
use serde::Serialize;

pub type RolloutId = String;
pub type ConfigId = String;

/// A rollout: a named traffic split across service config versions.
#[derive(Clone, Debug, PartialEq)]
pub struct Rollout {
    pub rollout_id: RolloutId,
    /// `(config id, percent)` pairs in the order the backend reported them.
    /// Percents are forwarded verbatim; the sum is not required to be 100.
    pub percentages: Vec<(ConfigId, u32)>,
}

/// One service config version with its share of traffic. The config body is
/// an opaque blob; parsing it is the data plane's business.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedConfig {
    pub config_id: ConfigId,
    pub config: Bytes,
    pub percent: u32,
}

/// Point-in-time view of the committed state for the admin status surface.
/// Carries blob sizes rather than blob contents.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RolloutSnapshot {
    pub rollout_id: Option<RolloutId>,
    pub configs: Vec<ConfigWeight>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConfigWeight {
    pub config_id: ConfigId,
    pub percent: u32,
    pub size_bytes: usize,
}

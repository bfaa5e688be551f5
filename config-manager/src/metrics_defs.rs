//! Metrics definitions for the configuration manager.

use shared::metrics_defs::{MetricDef, MetricKind};

pub const REFRESH_TICKS: MetricDef = MetricDef {
    name: "refresh.ticks",
    kind: MetricKind::Counter,
    description: "Refresh timer ticks. Tagged with trigger.",
};

pub const ROLLOUTS_FETCH_DURATION: MetricDef = MetricDef {
    name: "rollouts.fetch.duration",
    kind: MetricKind::Histogram,
    description: "Time to fetch the rollouts list in seconds. Tagged with status.",
};

pub const CONFIG_DOWNLOAD_FAILURES: MetricDef = MetricDef {
    name: "config.download.failures",
    kind: MetricKind::Counter,
    description: "Service config downloads that failed within an apply sequence.",
};

pub const ROLLOUT_COMMITS: MetricDef = MetricDef {
    name: "rollout.commits",
    kind: MetricKind::Counter,
    description: "Rollouts committed and published to the data plane.",
};

// TODO: all metrics must be added here for now, this can be done dynamically with a macro in the future.
pub const ALL_METRICS: &[MetricDef] = &[
    REFRESH_TICKS,
    ROLLOUTS_FETCH_DURATION,
    CONFIG_DOWNLOAD_FAILURES,
    ROLLOUT_COMMITS,
];

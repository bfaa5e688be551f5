//! Common types for metrics definitions.
//!
//! Each crate declares a `metrics_defs` module with one [`MetricDef`] per
//! metric it emits, collected into an `ALL_METRICS` slice that feeds the
//! documentation tooling in the sidecar binary.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "Counter",
            MetricKind::Gauge => "Gauge",
            MetricKind::Histogram => "Histogram",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
}

/// Renders metric definitions as the markdown table embedded in METRICS.md.
pub fn markdown_table(metrics: &[MetricDef]) -> String {
    let mut lines = vec![
        "| Metric | Type | Description |".to_string(),
        "|--------|------|-------------|".to_string(),
    ];
    for m in metrics {
        lines.push(format!(
            "| `{}` | {} | {} |",
            m.name,
            m.kind.as_str(),
            m.description
        ));
    }
    lines.join("\n")
}

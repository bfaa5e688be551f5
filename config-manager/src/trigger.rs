//! The per-tick refresh decision.

/// What a refresh tick should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// No work this tick.
    Skip,
    /// Probe the rollouts endpoint; there is no data-plane signal to compare
    /// against yet.
    RolloutsOnly,
    /// The data plane observed a rollout id that differs from the committed
    /// one; fetch rollouts and download the referenced configs.
    Full,
}

impl Trigger {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Trigger::Skip => "skip",
            Trigger::RolloutsOnly => "rollouts_only",
            Trigger::Full => "full",
        }
    }
}

/// Decides what a tick does from the number of requests seen since the last
/// tick, the rollout id observed by the data plane, and the committed id.
/// An idle proxy never polls; a confirmed-current proxy never polls either.
pub fn decide(pending_requests: u64, observed: Option<&str>, committed: Option<&str>) -> Trigger {
    if pending_requests == 0 {
        return Trigger::Skip;
    }
    match observed {
        None => Trigger::RolloutsOnly,
        Some(observed) if Some(observed) == committed => Trigger::Skip,
        Some(_) => Trigger::Full,
    }
}

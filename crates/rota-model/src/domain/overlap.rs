use serde::{Deserialize, Serialize};

/// What a trigger does when a previous run of the same task is still
/// executing in this process.
///
/// Across instances overlap is only bounded by the lock TTL: if the TTL runs
/// out before a slow handler finishes, another instance may win the next
/// occurrence and run concurrently. This policy does not change that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlapPolicy {
    /// Start a new run regardless of runs already in flight.
    #[default]
    Allow,
    /// Drop the trigger while a previous run is still active.
    Skip,
}

impl OverlapPolicy {
    pub fn allows_overlap(&self) -> bool {
        matches!(self, OverlapPolicy::Allow)
    }
}

use shared::StepNames;
use std::time::Duration;

/// Runtime settings the library needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub steps: StepNames,
    pub session_ttl: Duration,
    pub session_sweep_interval: Duration,
    pub monitor_interval: Duration,
    /// Delay before the detail view re-reads a missing processing record.
    /// Zero disables the recheck.
    pub unknown_recheck: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            steps: StepNames::default(),
            session_ttl: Duration::from_secs(12 * 60 * 60),
            session_sweep_interval: Duration::from_secs(60),
            monitor_interval: Duration::from_secs(30),
            unknown_recheck: Duration::from_millis(500),
        }
    }
}

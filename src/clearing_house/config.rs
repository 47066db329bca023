//! Clearing house runtime options.

/// Clearing house configuration.
#[derive(Debug, Clone)]
pub struct ClearingHouseConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Log every event at info level instead of debug.
    pub verbose: bool,
}

impl Default for ClearingHouseConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
        }
    }
}

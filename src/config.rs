use std::time::Duration;

/// Agent-level settings. The plan itself is loaded separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PilotConfig {
    /// Player this agent controls. Stamped onto every outbound assignment.
    pub player_id: String,
    /// Cadence of scheduling opportunities in the async loop.
    pub step_time_ms: u64,
    /// Stop the loop once the plan is exhausted.
    pub exit_on_finish: bool,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            player_id: "0".to_string(),
            step_time_ms: 100,
            exit_on_finish: true,
        }
    }
}

impl PilotConfig {
    pub fn step_time(&self) -> Duration {
        // interval() panics on a zero period
        Duration::from_millis(self.step_time_ms.max(1))
    }
}

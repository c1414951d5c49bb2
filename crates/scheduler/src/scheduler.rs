//! Scheduled jobs for periodic maintenance tasks.

use std::sync::Arc;
use std::time::Duration;

use grievance_core::services::EscalationService;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between escalation sweeps (default: 15 minutes).
    pub sweep_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(900),
        }
    }
}

impl SchedulerConfig {
    /// Build from the workflow config's sweep interval in minutes.
    #[must_use]
    pub const fn from_minutes(minutes: u64) -> Self {
        Self {
            sweep_interval: Duration::from_secs(minutes * 60),
        }
    }
}

/// Job executor trait for scheduled jobs.
#[async_trait::async_trait]
pub trait SweepExecutor: Send + Sync {
    /// Run one escalation sweep, returning how many complaints moved.
    async fn run_escalation_sweep(&self)
    -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait::async_trait]
impl SweepExecutor for EscalationService {
    async fn run_escalation_sweep(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.run_sweep().await.map_err(Into::into)
    }
}

/// Run the scheduler with the given configuration and executor.
pub async fn run_scheduler<E: SweepExecutor + 'static>(config: SchedulerConfig, executor: Arc<E>) {
    let sweep_interval = config.sweep_interval;

    // Spawn escalation sweep task
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            match executor.run_escalation_sweep().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Escalated overdue complaints");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Escalation sweep failed");
                }
            }
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(900));
    }

    #[test]
    fn test_scheduler_config_from_minutes() {
        let config = SchedulerConfig::from_minutes(15);
        assert_eq!(config.sweep_interval, Duration::from_secs(900));
    }
}

use super::Runtime;
use crate::error::Result;

use std::time::Duration;

/// Settings shared by the scheduler and the reactor.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) max_poll_wait: Duration,
    pub(crate) event_capacity: usize,
    pub(crate) registration_capacity: usize,
    pub(crate) task_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_poll_wait: Duration::from_secs(1),
            event_capacity: 64,
            registration_capacity: 64,
            task_capacity: 64,
        }
    }
}

/// Builder for configuring and creating a runtime.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// let runtime = RuntimeBuilder::new()
///     .max_poll_wait(Duration::from_millis(100))
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuntimeBuilder {
    config: Config,
}

impl RuntimeBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound on a single OS wait.
    ///
    /// Even with a far deadline or no deadline at all, the driving loop
    /// wakes at least this often. Defaults to one second.
    ///
    /// # Panics
    ///
    /// Panics if `wait` is zero.
    pub fn max_poll_wait(mut self, wait: Duration) -> Self {
        assert!(!wait.is_zero(), "max_poll_wait must be > 0");

        self.config.max_poll_wait = wait;
        self
    }

    /// Number of readiness events fetched per OS wait. Defaults to 64.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn event_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "event_capacity must be > 0");

        self.config.event_capacity = n;
        self
    }

    /// Initial size of the registration table. Defaults to 64.
    pub fn registration_capacity(mut self, n: usize) -> Self {
        self.config.registration_capacity = n;
        self
    }

    /// Initial size of the task table. Defaults to 64.
    pub fn task_capacity(mut self, n: usize) -> Self {
        self.config.task_capacity = n;
        self
    }

    /// Builds the runtime.
    ///
    /// Fails if the OS readiness primitive cannot be created.
    pub fn build(self) -> Result<Runtime> {
        Runtime::with_config(self.config)
    }
}

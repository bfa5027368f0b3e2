//! Shared reconciler context.

use zcloud_core::config::ConfigError;
use zcloud_core::retry::RetryPolicy;
use zcloud_core::Timeouts;
use zcloud_sdk::Client;

/// Handle passed into every reconciler call. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub timeouts: Timeouts,
}

impl Context {
    pub fn new(client: Client, timeouts: Timeouts) -> Self {
        Self { client, timeouts }
    }

    /// Build a context at provider-configure time, applying timeout
    /// overrides from the environment.
    pub fn from_env(client: Client) -> Result<Self, ConfigError> {
        Ok(Self::new(client, Timeouts::from_env()?))
    }

    /// Retry policy for mutating calls.
    pub fn write_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.timeouts.write_retry)
    }

    /// Retry policy for read calls.
    pub fn read_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.timeouts.read_retry)
    }
}

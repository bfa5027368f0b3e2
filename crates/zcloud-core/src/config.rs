//! Operation timeout defaults, tunable through the environment.
//!
//! Values are read once when the provider is configured. An unparseable
//! value aborts configuration rather than silently falling back.

use std::time::Duration;
use thiserror::Error;

const ENV_WRITE_RETRY: &str = "WRITE_RETRY_TIMEOUT";
const ENV_READ_RETRY: &str = "READ_RETRY_TIMEOUT";
const ENV_BMC_CREATE: &str = "BMC_CREATE_TIMEOUT";
const ENV_BMC_UPDATE: &str = "BMC_UPDATE_TIMEOUT";
const ENV_VM_CREATE: &str = "VM_CREATE_TIMEOUT";
const ENV_VM_UPDATE: &str = "VM_UPDATE_TIMEOUT";
const ENV_ZGA_CREATE: &str = "ZGA_CREATE_TIMEOUT";
const ENV_ZGA_UPDATE: &str = "ZGA_UPDATE_TIMEOUT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} (expected integer minutes)")]
    InvalidTimeout { var: &'static str, value: String },
}

/// Effective operation timeouts.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Retry window for mutating API calls.
    pub write_retry: Duration,
    /// Retry window for read API calls.
    pub read_retry: Duration,
    /// Bare-metal create (provision + install can take well over an hour).
    pub bmc_create: Duration,
    /// Bare-metal update (reinstall shares the create path timing).
    pub bmc_update: Duration,
    /// Virtual machine create.
    pub vm_create: Duration,
    /// Virtual machine update.
    pub vm_update: Duration,
    /// Accelerator create.
    pub zga_create: Duration,
    /// Accelerator update.
    pub zga_update: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            write_retry: Duration::from_secs(5 * 60),
            read_retry: Duration::from_secs(3 * 60),
            bmc_create: Duration::from_secs(90 * 60),
            bmc_update: Duration::from_secs(90 * 60),
            vm_create: Duration::from_secs(30 * 60),
            vm_update: Duration::from_secs(30 * 60),
            zga_create: Duration::from_secs(10 * 60),
            zga_update: Duration::from_secs(10 * 60),
        }
    }
}

impl Timeouts {
    /// Build timeouts from the environment, starting from the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut t = Self::default();
        for (var, slot) in [
            (ENV_WRITE_RETRY, &mut t.write_retry),
            (ENV_READ_RETRY, &mut t.read_retry),
            (ENV_BMC_CREATE, &mut t.bmc_create),
            (ENV_BMC_UPDATE, &mut t.bmc_update),
            (ENV_VM_CREATE, &mut t.vm_create),
            (ENV_VM_UPDATE, &mut t.vm_update),
            (ENV_ZGA_CREATE, &mut t.zga_create),
            (ENV_ZGA_UPDATE, &mut t.zga_update),
        ] {
            if let Some(minutes) = read_minutes(var)? {
                *slot = minutes;
            }
        }
        Ok(t)
    }
}

fn read_minutes(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => {
            let minutes: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout { var, value: raw })?;
            Ok(Some(Duration::from_secs(minutes * 60)))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        temp_env::with_vars_unset([ENV_WRITE_RETRY, ENV_BMC_CREATE], || {
            let t = Timeouts::from_env().unwrap();
            assert_eq!(t.write_retry, Duration::from_secs(300));
            assert_eq!(t.read_retry, Duration::from_secs(180));
            assert_eq!(t.bmc_create, Duration::from_secs(5400));
        });
    }

    #[test]
    fn env_overrides_in_minutes() {
        temp_env::with_var(ENV_BMC_CREATE, Some("120"), || {
            let t = Timeouts::from_env().unwrap();
            assert_eq!(t.bmc_create, Duration::from_secs(120 * 60));
        });
    }

    #[test]
    fn invalid_value_is_an_error() {
        temp_env::with_var(ENV_WRITE_RETRY, Some("soon"), || {
            assert!(Timeouts::from_env().is_err());
        });
    }
}

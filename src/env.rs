//! Process environment access.
//!
//! Worker counts and the run timestamp come from outside the configuration
//! tree. They are read through an [`Environment`] so that resolution is
//! reproducible in tests and so a coordinating process can pin the clock.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};

use crate::error::ConfigError;

/// Total number of workers in the job.
pub const WORLD_SIZE_VAR: &str = "WORLD_SIZE";

/// Number of workers on the current node.
pub const LOCAL_WORLD_SIZE_VAR: &str = "LOCAL_WORLD_SIZE";

/// Source of environment variables and wall-clock time.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;

    fn now(&self) -> NaiveDateTime;
}

impl<E: Environment + ?Sized> Environment for &E {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }

    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// The real process environment and local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A fixed set of variables and a frozen clock.
#[derive(Debug, Clone)]
pub struct FixedEnvironment {
    vars: BTreeMap<String, String>,
    now: NaiveDateTime,
}

impl FixedEnvironment {
    /// Empty environment with the clock frozen at the Unix epoch.
    pub fn new() -> Self {
        Self {
            vars: BTreeMap::new(),
            now: NaiveDateTime::default(),
        }
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.set_var(key, value);
        self
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn set_var(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }
}

impl Default for FixedEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for FixedEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn now(&self) -> NaiveDateTime {
        self.now
    }
}

/// Read a worker count, defaulting to 1 when unset.
pub(crate) fn read_count(env: &impl Environment, var: &str) -> Result<i64, ConfigError> {
    match env.var(var) {
        None => Ok(1),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidEnvironment {
                var: var.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_read_count_default() {
        let env = FixedEnvironment::new();
        assert_eq!(read_count(&env, WORLD_SIZE_VAR).unwrap(), 1);
    }

    #[test]
    fn test_read_count_invalid() {
        let env = FixedEnvironment::new().with_var(WORLD_SIZE_VAR, "eight");
        let err = read_count(&env, WORLD_SIZE_VAR).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable WORLD_SIZE must be an integer, got 'eight'"
        );
    }

    #[test]
    fn test_fixed_clock() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 26, 53)
            .unwrap();
        let env = FixedEnvironment::new().with_now(at);
        assert_eq!(env.now(), at);
        assert_eq!((&env).now(), at);
    }
}

//! `vecstore` configuration.
//!
//! Tunables the core leaves as implementation freedom: initial mapped
//! capacity, growth policy, the default `reuse` flag for `append`, and the
//! thread cap used when a search selects [`crate::search::Threads::Auto`].
//!
//! # Priority (highest to lowest)
//!
//! 1. Runtime overrides (`StoreConfig::builder()` / struct literal)
//! 2. Environment variables (`VECSTORE_*`)
//! 3. Configuration file (`vecstore.toml`, if present)
//! 4. Built-in defaults

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Configuration for a [`crate::Store`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Initial mapped capacity, in bytes, for a freshly created file.
    pub initial_capacity: u64,
    /// Minimum capacity a single growth step will add, in bytes.
    pub min_growth: u64,
    /// Multiplicative growth factor applied to the current capacity.
    pub growth_factor: u64,
    /// Default value for `append`'s `reuse` flag when the caller does not
    /// specify one explicitly.
    pub default_reuse: bool,
    /// Upper bound on the thread count chosen for `Threads::Auto`.
    pub auto_thread_cap: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 4096,
            min_growth: 4096,
            growth_factor: 2,
            default_reuse: true,
            auto_thread_cap: 8,
        }
    }
}

impl StoreConfig {
    /// Loads configuration layering defaults, an optional `vecstore.toml`
    /// next to `path` (if it exists), and `VECSTORE_*` environment
    /// variables, in that order of increasing priority.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a present config file or environment
    /// variable cannot be parsed into a valid `StoreConfig`.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_path {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment
            .merge(Env::prefixed("VECSTORE_"))
            .extract()
            .map_err(Error::from)
    }

    /// Validates that the configuration's numeric fields are sane.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `growth_factor < 2` or any capacity
    /// field is zero.
    pub fn validate(&self) -> Result<()> {
        if self.growth_factor < 2 {
            return Err(Error::Config(format!(
                "growth_factor must be >= 2, got {}",
                self.growth_factor
            )));
        }
        if self.initial_capacity == 0 || self.min_growth == 0 {
            return Err(Error::Config(
                "initial_capacity and min_growth must be non-zero".into(),
            ));
        }
        if self.auto_thread_cap == 0 {
            return Err(Error::Config("auto_thread_cap must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_growth_factor() {
        let cfg = StoreConfig {
            growth_factor: 1,
            ..StoreConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_with_no_file_returns_defaults() {
        let cfg = StoreConfig::load(None).unwrap();
        assert_eq!(cfg.initial_capacity, 4096);
        assert_eq!(cfg.growth_factor, 2);
    }
}

use std::path::PathBuf;

use lazyjson_blueprint::BlueprintConfig;
use lazyjson_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::naming::NamingStrategy;

/// What an accessor call without a mapped field does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedAccessorPolicy {
    /// Fail with an `UnsupportedAccessor` error.
    #[default]
    Fail,
    /// Delegate to the fallback registered with
    /// [`OpenOptions::fallback`](crate::OpenOptions::fallback).
    Fallback,
}

/// What a lazy value read that fails to decode returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedReadPolicy {
    /// Null for nullable fields, zero for primitive ones.
    #[default]
    Default,
    /// Fail with a `ValueRead` error naming the accessor and its arguments.
    Fail,
}

/// Options recognized when opening a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest blueprint kept in memory; larger ones stay in a temporary file.
    pub memory_threshold: u64,
    /// Number of decoded values cached per document. `0` disables caching.
    pub cache_size: usize,
    pub unsupported_accessor: UnsupportedAccessorPolicy,
    pub failed_read: FailedReadPolicy,
    /// Maps accessor names to JSON member names.
    pub naming: NamingStrategy,
    /// Reject JSON members with no matching field.
    pub fail_on_unknown_fields: bool,
    /// Reject objects missing any declared field.
    pub fail_on_missing_fields: bool,
    /// Deepest allowed nesting of objects and lists, in the schema and in the document.
    pub max_depth: usize,
    /// Read-ahead window of each pooled channel.
    pub channel_buffer_size: usize,
    /// Number of threads whose idle channels stay open between reads.
    pub max_channel_threads: usize,
    /// Directory for the blueprint spill file.
    pub temp_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            memory_threshold: 64 * 1024 * 1024,
            cache_size: 1024,
            unsupported_accessor: UnsupportedAccessorPolicy::Fail,
            failed_read: FailedReadPolicy::Default,
            naming: NamingStrategy::Identity,
            fail_on_unknown_fields: false,
            fail_on_missing_fields: false,
            max_depth: 64,
            channel_buffer_size: 16 * 1024,
            max_channel_threads: lazyjson_io::pool::DEFAULT_MAX_THREADS,
            temp_dir: None,
        }
    }
}

impl Config {
    pub fn with_memory_threshold(mut self, memory_threshold: u64) -> Self {
        self.memory_threshold = memory_threshold;
        self
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_unsupported_accessor(mut self, policy: UnsupportedAccessorPolicy) -> Self {
        self.unsupported_accessor = policy;
        self
    }

    pub fn with_failed_read(mut self, policy: FailedReadPolicy) -> Self {
        self.failed_read = policy;
        self
    }

    pub fn with_naming(mut self, naming: NamingStrategy) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_strict_fields(mut self, fail_on_unknown: bool, fail_on_missing: bool) -> Self {
        self.fail_on_unknown_fields = fail_on_unknown;
        self.fail_on_missing_fields = fail_on_missing;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::invalid_arg("max_depth", "must be greater than 0"));
        }
        if self.channel_buffer_size == 0 {
            return Err(Error::invalid_arg(
                "channel_buffer_size",
                "must be greater than 0",
            ));
        }
        if self.max_channel_threads == 0 {
            return Err(Error::invalid_arg(
                "max_channel_threads",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    pub(crate) fn blueprint_config(&self) -> BlueprintConfig {
        let config = BlueprintConfig::default().with_memory_threshold(self.memory_threshold);
        match &self.temp_dir {
            Some(dir) => config.with_temp_dir(dir),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, FailedReadPolicy, UnsupportedAccessorPolicy};
    use crate::naming::NamingStrategy;

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(
            r#"{
                "cache_size": 0,
                "naming": "upper_snake",
                "failed_read": "fail",
                "unsupported_accessor": "fallback",
                "fail_on_unknown_fields": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.cache_size, 0);
        assert_eq!(config.naming, NamingStrategy::UpperSnake);
        assert_eq!(config.failed_read, FailedReadPolicy::Fail);
        assert_eq!(config.unsupported_accessor, UnsupportedAccessorPolicy::Fallback);
        assert!(config.fail_on_unknown_fields);
        assert!(!config.fail_on_missing_fields);
        assert_eq!(config.max_depth, Config::default().max_depth);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().with_max_depth(0).validate().is_err());
        let config = Config {
            channel_buffer_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = Config {
            max_channel_threads: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

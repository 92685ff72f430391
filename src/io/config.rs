//! Writer configuration.

use serde::Deserialize;

use crate::{Error, Result};

/// Default number of payloads that may wait for the output thread.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// Default name of the output thread.
pub const DEFAULT_THREAD_NAME: &str = "_geostream_output";

/// Configuration for a [`Writer`](crate::io::Writer).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Maximum queued payloads before submissions block.
    pub queue_capacity: usize,
    /// Name given to the output thread.
    pub thread_name: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl WriterConfig {
    /// Create a configuration with the given queue capacity.
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self {
            queue_capacity: capacity,
            ..Self::default()
        }
    }

    /// Parse a configuration from YAML; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".to_string()));
        }
        if self.thread_name.is_empty() {
            return Err(Error::Config("thread_name must not be empty".to_string()));
        }
        Ok(())
    }
}

//! Options for the block encoding.

use serde::Deserialize;

use super::MAX_UNCOMPRESSED_BLOCK_SIZE;
use crate::strings::DEFAULT_CHUNK_SIZE;
use crate::{Error, Result};

/// Default number of records per data frame.
pub const DEFAULT_RECORDS_PER_BLOCK: usize = 8000;

/// Default zlib level.
pub const DEFAULT_LEVEL: u32 = 6;

/// Compression applied to each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Zlib,
    #[cfg(feature = "compression")]
    Lz4,
}

/// Options for [`BlockOutput`](super::BlockOutput).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BlockOptions {
    pub compression: Compression,
    /// Zlib level, 0 to 9. Ignored by the other codecs.
    pub level: u32,
    /// Distinct strings allowed in one block's string table.
    pub max_string_table_entries: u32,
    /// Chunk size of the string table's store; also the longest field
    /// (minus its terminator) a block can hold.
    pub string_chunk_size: usize,
    /// Buffers larger than this are split over several frames.
    pub max_records_per_block: usize,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            level: DEFAULT_LEVEL,
            max_string_table_entries: MAX_UNCOMPRESSED_BLOCK_SIZE,
            string_chunk_size: DEFAULT_CHUNK_SIZE,
            max_records_per_block: DEFAULT_RECORDS_PER_BLOCK,
        }
    }
}

impl BlockOptions {
    /// Default options with the given compression.
    pub fn with_compression(compression: Compression) -> Self {
        Self {
            compression,
            ..Self::default()
        }
    }

    /// Parse options from YAML; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let options: Self = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.level > 9 {
            return Err(Error::Config(format!(
                "compression level {} out of range 0-9",
                self.level
            )));
        }
        if self.string_chunk_size < 2 {
            return Err(Error::Config(
                "string_chunk_size must be at least 2".to_string(),
            ));
        }
        if self.max_records_per_block == 0 {
            return Err(Error::Config(
                "max_records_per_block must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

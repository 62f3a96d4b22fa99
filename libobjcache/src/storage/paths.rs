// KeyLayout maps cache keys onto object keys inside the configured bucket.
//
// The layout in the bucket is flat:
//
//	<bucket>
//	└── <prefix>            (default `cache/`)
//	    └── <key>           (opaque, may itself contain `/`)
//
// Nothing else is written to the bucket: no index, no metadata objects.

use crate::error::StorageError;

pub const DEFAULT_PREFIX: &str = "cache/";

#[derive(Clone, Debug)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        KeyLayout {
            prefix: prefix.into(),
        }
    }

    /// Returns the object key for a cache key,
    /// (e.g. `cache/<key>`).
    pub fn object_key(&self, key: &str) -> Result<String, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(format!("{}{}", self.prefix, key))
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        KeyLayout::new(DEFAULT_PREFIX)
    }
}

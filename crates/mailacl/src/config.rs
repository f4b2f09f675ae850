//! Configuration for the ACL mapper.

use serde::Deserialize;

use crate::error::{AclError, Result};

/// Default number of compare-and-swap attempts per update.
pub const DEFAULT_MAX_RETRIES: u32 = 1000;

/// Configuration for the [`AclMapper`](crate::AclMapper).
///
/// Deserializable so it can sit inside a larger server configuration; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// Maximum compare-and-swap attempts for one `update_acl` call.
    pub max_retries: u32,
}

impl AclConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Reject configurations that can never succeed.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(AclError::Config(
                "max_retries must allow at least one attempt".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

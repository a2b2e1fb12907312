//! Cache configuration structures.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Name of the group used when callers do not pick one explicitly.
pub const DEFAULT_GROUP: &str = "default";

/// Root cache configuration.
///
/// Missing fields fall back to the struct defaults, so partial sources
/// (or none at all) still produce a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Group targeted when a call does not name one.
    pub default_group: String,

    /// TTL in seconds applied when a source-of-truth lookup returns
    /// nothing and the miss is negative-cached.
    pub null_ttl_secs: u64,

    /// TTL in seconds callers typically request for record writes.
    pub default_ttl_secs: u64,

    /// Named backend groups (logical partitions of the store).
    pub groups: HashMap<String, GroupSettings>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let mut groups = HashMap::new();
        groups.insert(DEFAULT_GROUP.to_string(), GroupSettings::default());

        Self {
            default_group: DEFAULT_GROUP.to_string(),
            null_ttl_secs: 3600,
            default_ttl_secs: 129_600,
            groups,
        }
    }
}

impl CacheSettings {
    /// Looks up a group's settings by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupSettings> {
        self.groups.get(name)
    }

    /// Returns the negative-cache TTL as a Duration.
    #[must_use]
    pub const fn null_ttl(&self) -> Duration {
        Duration::from_secs(self.null_ttl_secs)
    }

    /// Returns the default record TTL as a Duration.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

/// Connection settings for one backend group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    /// Redis URL.
    pub url: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// Enable this group (a disabled group turns its operations into
    /// no-ops instead of failing).
    pub enabled: bool,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            enabled: true,
        }
    }
}

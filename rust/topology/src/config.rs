// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Catalog configuration loaded from environment variables.

/// Catalog-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    /// Deepest layer hierarchy accepted and expanded.
    pub max_hierarchy_depth: usize,
    /// SRID for topologies created without one.
    pub default_srid: i32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_hierarchy_depth: 16,
            default_srid: 0,
        }
    }
}

impl CatalogConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_hierarchy_depth: std::env::var("TOPOLITE_MAX_HIERARCHY_DEPTH")
                .unwrap_or_else(|_| defaults.max_hierarchy_depth.to_string())
                .parse()
                .unwrap_or(defaults.max_hierarchy_depth),
            default_srid: std::env::var("TOPOLITE_DEFAULT_SRID")
                .unwrap_or_else(|_| defaults.default_srid.to_string())
                .parse()
                .unwrap_or(defaults.default_srid),
        }
    }

    pub fn with_max_hierarchy_depth(mut self, depth: usize) -> Self {
        self.max_hierarchy_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.max_hierarchy_depth, 16);
        assert_eq!(config.default_srid, 0);
    }

    #[test]
    fn test_builder() {
        let config = CatalogConfig::default().with_max_hierarchy_depth(3);
        assert_eq!(config.max_hierarchy_depth, 3);
    }
}

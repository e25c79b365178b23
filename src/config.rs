//! Configuration management for Linkgate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::error::{GateError, Result};

/// Main configuration for the gatekeeping layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Credential verification configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Credential verification configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Argon2 PHC digest of the shared API token
    #[serde(default)]
    pub token_hash: Option<String>,

    /// Cost parameters used when generating new digests
    #[serde(default)]
    pub hash_cost: HashCost,
}

/// Argon2id cost parameters for digest generation.
///
/// Verification never reads these: a digest carries its own parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCost {
    /// Memory size in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Number of passes
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Degree of parallelism
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

fn default_memory_kib() -> u32 {
    19 * 1024
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// How often the background sweep evicts stale entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// How long after its window ended an idle entry is kept
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    /// Number of tracked keys above which admission sweeps inline
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,

    /// Per-route policies
    #[serde(default = "default_routes")]
    pub routes: Vec<RoutePolicyConfig>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            grace_period_secs: default_grace_period(),
            max_tracked_keys: default_max_tracked_keys(),
            routes: default_routes(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_grace_period() -> u64 {
    60
}

fn default_max_tracked_keys() -> usize {
    100_000
}

/// A single route's admission policy as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicyConfig {
    /// Route identifier, `"<METHOD> <path pattern>"`
    pub route: String,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Admitted requests per window
    pub limit: u64,
}

impl RoutePolicyConfig {
    pub fn new(route: impl Into<String>, window_ms: u64, limit: u64) -> Self {
        Self {
            route: route.into(),
            window_ms,
            limit,
        }
    }
}

fn default_routes() -> Vec<RoutePolicyConfig> {
    vec![
        RoutePolicyConfig::new("POST /api/login", 10_000, 3),
        RoutePolicyConfig::new("GET /api/shortlinks/count", 1_000, 10),
        RoutePolicyConfig::new("GET /api/shortlinks", 1_000, 10),
        RoutePolicyConfig::new("POST /api/shortlinks", 3_000, 3),
        RoutePolicyConfig::new("GET /api/shortlinks/{id}", 1_000, 5),
        RoutePolicyConfig::new("POST /api/shortlinks/{id}", 2_000, 3),
        RoutePolicyConfig::new("DELETE /api/shortlinks/{id}", 2_000, 5),
    ]
}

impl GateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading gate configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GateError::Config(format!("Failed to parse gate config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the gatekeeping layer cannot run with.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.rate_limiting;
        if limits.sweep_interval_secs == 0 {
            return Err(GateError::Config(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for route in &limits.routes {
            if !seen.insert(route.route.as_str()) {
                return Err(GateError::Config(format!(
                    "duplicate policy for route '{}'",
                    route.route
                )));
            }
            if route.window_ms == 0 {
                return Err(GateError::Config(format!(
                    "route '{}': window must be positive",
                    route.route
                )));
            }
            if route.limit == 0 {
                return Err(GateError::Config(format!(
                    "route '{}': limit must be positive",
                    route.route
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GateConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.auth.token_hash.is_none());
        assert_eq!(config.rate_limiting.routes.len(), 7);
    }

    #[test]
    fn test_default_routes_match_login_policy() {
        let config = GateConfig::default();
        let login = config
            .rate_limiting
            .routes
            .iter()
            .find(|r| r.route == "POST /api/login")
            .unwrap();
        assert_eq!(login.window_ms, 10_000);
        assert_eq!(login.limit, 3);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
auth:
  token_hash: "$argon2id$v=19$m=64,t=1,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaA"
  hash_cost:
    memory_kib: 64
    iterations: 1
rate_limiting:
  sweep_interval_secs: 5
  routes:
    - route: GET /api/shortlinks
      window_ms: 500
      limit: 2
"#;
        let config = GateConfig::from_yaml(yaml).unwrap();
        assert!(config.auth.token_hash.is_some());
        assert_eq!(config.auth.hash_cost.memory_kib, 64);
        assert_eq!(config.auth.hash_cost.parallelism, 1);
        assert_eq!(config.rate_limiting.sweep_interval_secs, 5);
        assert_eq!(config.rate_limiting.grace_period_secs, 60);
        assert_eq!(
            config.rate_limiting.routes,
            vec![RoutePolicyConfig::new("GET /api/shortlinks", 500, 2)]
        );
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = GateConfig::from_yaml("{}").unwrap();
        assert_eq!(config.rate_limiting.routes.len(), 7);
        assert_eq!(config.auth.hash_cost, HashCost::default());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let yaml = r#"
rate_limiting:
  routes:
    - route: GET /a
      window_ms: 1000
      limit: 0
"#;
        let err = GateConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = GateConfig::default();
        config.rate_limiting.routes = vec![RoutePolicyConfig::new("GET /a", 0, 1)];
        assert!(matches!(config.validate(), Err(GateError::Config(_))));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut config = GateConfig::default();
        config.rate_limiting.routes = vec![
            RoutePolicyConfig::new("GET /a", 1000, 1),
            RoutePolicyConfig::new("GET /a", 2000, 2),
        ];
        assert!(matches!(config.validate(), Err(GateError::Config(_))));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let err = GateConfig::from_yaml("rate_limiting: [").unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }
}

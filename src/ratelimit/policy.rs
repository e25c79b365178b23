//! Route admission policies.
//!
//! Policies are registered once at setup time into a [`PolicyTable`], which
//! the rate limiter then owns and consults on every admission. There is no
//! way to change a policy after the table has been handed over.

use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

use crate::config::RoutePolicyConfig;
use crate::error::{GateError, Result};

/// At most `limit` admitted requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Policy {
    window: Duration,
    limit: u64,
}

impl Policy {
    /// Create a policy, rejecting a zero window or a zero limit.
    pub fn new(window: Duration, limit: u64) -> Result<Self> {
        if window.is_zero() {
            return Err(GateError::Config("window must be positive".to_string()));
        }
        if limit == 0 {
            return Err(GateError::Config("limit must be positive".to_string()));
        }
        Ok(Self { window, limit })
    }

    /// Length of one counting window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admissions allowed per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

/// Lookup table from route identifier to its policy.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    policies: HashMap<String, Policy>,
}

impl PolicyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from configured route policies.
    pub fn from_config(routes: &[RoutePolicyConfig]) -> Result<Self> {
        let mut table = Self::new();
        for route in routes {
            let policy = Policy::new(Duration::from_millis(route.window_ms), route.limit)
                .map_err(|e| match e {
                    GateError::Config(msg) => {
                        GateError::Config(format!("route '{}': {}", route.route, msg))
                    }
                    other => other,
                })?;
            table.register(route.route.clone(), policy)?;
        }
        info!(routes = table.len(), "Rate limit policies registered");
        Ok(table)
    }

    /// Register a policy for a route. Each route may be registered once.
    pub fn register(&mut self, route: impl Into<String>, policy: Policy) -> Result<()> {
        let route = route.into();
        if self.policies.contains_key(&route) {
            return Err(GateError::Config(format!(
                "duplicate policy for route '{}'",
                route
            )));
        }
        self.policies.insert(route, policy);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, route: impl Into<String>, policy: Policy) -> Result<Self> {
        self.register(route, policy)?;
        Ok(self)
    }

    /// Get the policy for a route.
    pub fn get(&self, route: &str) -> Option<&Policy> {
        self.policies.get(route)
    }

    /// Iterate over registered routes and their policies.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Policy)> {
        self.policies.iter().map(|(route, policy)| (route.as_str(), policy))
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no route has a policy.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

//! Limiter key generation and handling.

/// A key that uniquely identifies one limiter entry.
///
/// Counters are never shared between routes: the same client hitting two
/// routes with identical policies gets two keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimiterKey {
    /// The route identifier the policy was registered under
    pub route: String,
    /// Opaque client identity, typically the remote address
    pub client: String,
}

impl LimiterKey {
    /// Create a new limiter key.
    pub fn new(route: &str, client: &str) -> Self {
        Self {
            route: route.to_string(),
            client: client.to_string(),
        }
    }
}

impl std::fmt::Display for LimiterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.route, self.client)
    }
}

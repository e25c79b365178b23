//! Core rate limiter implementation.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::entry::{LimiterEntry, Verdict};
use super::key::LimiterKey;
use super::policy::PolicyTable;
use crate::config::RateLimitingConfig;
use crate::error::Result;

/// Default time an idle entry survives after its window ended.
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(60);
/// Default number of tracked keys that triggers an inline sweep.
const DEFAULT_MAX_TRACKED_KEYS: usize = 100_000;
/// Lower bound on the spacing of capacity-triggered sweeps.
const MIN_CAPACITY_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
/// Marker for "no capacity sweep has run yet".
const NEVER_SWEPT: u64 = u64::MAX;

/// Eviction tunables for the limiter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    /// How long an entry is kept after its window ended
    pub grace_period: Duration,
    /// Tracked keys at which new keys are refused unless a sweep frees room
    pub max_tracked_keys: usize,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
        }
    }
}

impl From<&RateLimitingConfig> for LimiterSettings {
    fn from(config: &RateLimitingConfig) -> Self {
        Self {
            grace_period: Duration::from_secs(config.grace_period_secs),
            max_tracked_keys: config.max_tracked_keys,
        }
    }
}

/// Per-route, per-client fixed-window rate limiter.
///
/// Entries live in a sharded map. An admission holds the write guard of its
/// key's shard for the whole check-and-increment, so two concurrent requests
/// for the same key can never both take the last slot, while keys on other
/// shards proceed in parallel.
///
/// The table holds at most `max_tracked_keys` entries (plus whatever
/// concurrent inserts race past the check). At capacity, a new key triggers
/// at most one inline sweep per grace period; if that frees nothing, the new
/// key is rejected until room appears. Existing keys are never affected.
///
/// Across a window boundary a client can be admitted up to `2 * limit` times
/// in quick succession; that is inherent to fixed windows.
pub struct RateLimiter {
    /// Registered policies, immutable after construction
    policies: PolicyTable,
    /// Limiter entries indexed by (route, client)
    entries: DashMap<LimiterKey, LimiterEntry>,
    settings: LimiterSettings,
    /// Reference point for `last_capacity_sweep`
    epoch: Instant,
    /// Milliseconds since `epoch` of the last capacity sweep
    last_capacity_sweep: AtomicU64,
}

impl RateLimiter {
    /// Create a new rate limiter over a fixed policy table.
    pub fn new(policies: PolicyTable, settings: LimiterSettings) -> Self {
        Self {
            policies,
            entries: DashMap::new(),
            settings,
            epoch: Instant::now(),
            last_capacity_sweep: AtomicU64::new(NEVER_SWEPT),
        }
    }

    /// Create a rate limiter from configuration.
    pub fn from_config(config: &RateLimitingConfig) -> Result<Self> {
        let policies = PolicyTable::from_config(&config.routes)?;
        Ok(Self::new(policies, LimiterSettings::from(config)))
    }

    /// Decide whether `client` may call `route` now.
    pub fn admit(&self, route: &str, client: &str) -> Verdict {
        self.admit_at(route, client, Instant::now())
    }

    /// Decide whether `client` may call `route` at `now`.
    ///
    /// Routes without a registered policy are not limited and leave no state
    /// behind.
    pub fn admit_at(&self, route: &str, client: &str, now: Instant) -> Verdict {
        let Some(policy) = self.policies.get(route) else {
            trace!(route = %route, "No policy registered for route");
            return Verdict::Unlimited;
        };

        let key = LimiterKey::new(route, client);

        if !self.entries.contains_key(&key) && self.at_capacity() {
            self.capacity_sweep(now);
            if self.at_capacity() {
                let retry_after = self.until_next_capacity_sweep(now);
                debug!(
                    key = %key,
                    max = self.settings.max_tracked_keys,
                    retry_after = ?retry_after,
                    "Limiter table full, refusing new key"
                );
                return Verdict::Rejected { retry_after };
            }
        }

        let verdict = {
            let mut entry = self.entries.entry(key.clone()).or_insert_with(|| {
                debug!(
                    key = %key,
                    limit = policy.limit(),
                    window = ?policy.window(),
                    "Creating new limiter entry"
                );
                LimiterEntry::new(now)
            });
            entry.admit(policy, now)
        };

        match verdict {
            Verdict::Rejected { retry_after } => {
                debug!(key = %key, retry_after = ?retry_after, "Rate limit exceeded");
            }
            _ => {
                trace!(key = %key, "Request admitted");
            }
        }

        verdict
    }

    fn at_capacity(&self) -> bool {
        self.entries.len() >= self.settings.max_tracked_keys
    }

    fn capacity_sweep_interval(&self) -> Duration {
        self.settings.grace_period.max(MIN_CAPACITY_SWEEP_INTERVAL)
    }

    fn millis_since_epoch(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.epoch).as_millis();
        u64::try_from(elapsed).unwrap_or(NEVER_SWEPT - 1)
    }

    /// Sweep if no capacity sweep ran within the last interval.
    ///
    /// Only the caller that wins the compare-exchange sweeps; everyone else
    /// returns immediately.
    fn capacity_sweep(&self, now: Instant) {
        let now_ms = self.millis_since_epoch(now);
        let interval_ms = self.capacity_sweep_interval().as_millis() as u64;
        let last = self.last_capacity_sweep.load(Ordering::Acquire);

        if last != NEVER_SWEPT && now_ms < last.saturating_add(interval_ms) {
            return;
        }
        if self
            .last_capacity_sweep
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        debug!(
            max = self.settings.max_tracked_keys,
            "Limiter table at capacity, sweeping"
        );
        self.sweep_at(now);
    }

    /// Time until the next capacity sweep is allowed.
    fn until_next_capacity_sweep(&self, now: Instant) -> Duration {
        let last = self.last_capacity_sweep.load(Ordering::Acquire);
        if last == NEVER_SWEPT {
            return Duration::ZERO;
        }
        let next = Duration::from_millis(last) + self.capacity_sweep_interval();
        next.saturating_sub(Duration::from_millis(self.millis_since_epoch(now)))
    }

    /// Drop entries whose window ended more than the grace period ago.
    ///
    /// Returns the number of evicted entries.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) as of `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        let grace = self.settings.grace_period;

        self.entries.retain(|key, entry| match self.policies.get(&key.route) {
            Some(policy) => !entry.is_stale(policy.window(), grace, now),
            None => false,
        });

        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            info!(
                evicted = evicted,
                remaining = self.entries.len(),
                "Swept stale limiter entries"
            );
        }
        evicted
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep();
            }
        })
    }

    /// The registered policies.
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Get the admission count for a key's current window.
    ///
    /// Returns `None` if no entry exists for the key.
    pub fn entry_count(&self, route: &str, client: &str) -> Option<u64> {
        let key = LimiterKey::new(route, client);
        self.entries.get(&key).map(|entry| entry.count())
    }

    /// Get the number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("routes", &self.policies().len())
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}

//! Per-client token buckets for the HTTP API.

use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Buckets kept before idle, refilled ones are pruned.
const PRUNE_THRESHOLD: usize = 4096;

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// The request may proceed; `remaining` whole tokens are left.
    Allowed {
        /// Requests the client can still make right now.
        remaining: u32,
    },
    /// The client is over its budget.
    Limited {
        /// Time until the next token is available.
        retry_after: Duration,
    },
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter keyed by client.
///
/// Each client starts with `burst` tokens and regains them at
/// `per_minute / 60` per second, capped at `burst`.
#[derive(Debug)]
pub struct RateLimiter<K = IpAddr> {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<K, Bucket>>,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    /// Limiter allowing `per_minute` sustained requests per client with
    /// bursts of `burst`. `None` when either is zero (limiting disabled).
    pub fn new(per_minute: u32, burst: u32) -> Option<Self> {
        if per_minute == 0 || burst == 0 {
            return None;
        }
        Some(Self {
            capacity: f64::from(burst),
            refill_per_sec: f64::from(per_minute) / 60.0,
            buckets: Mutex::new(HashMap::new()),
        })
    }

    /// Spends one token of `client`'s bucket if it has one.
    pub fn check(&self, client: &K) -> Admission {
        self.check_at(client, Instant::now())
    }

    /// [`check`](Self::check) at a given instant.
    pub fn check_at(&self, client: &K, now: Instant) -> Admission {
        let mut buckets = self.buckets.lock();
        if buckets.len() >= PRUNE_THRESHOLD && !buckets.contains_key(client) {
            self.prune(&mut buckets, now);
        }
        let bucket = buckets.entry(client.clone()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Admission::Allowed {
                remaining: bucket.tokens.floor() as u32,
            }
        } else {
            let missing = 1.0 - bucket.tokens;
            Admission::Limited {
                retry_after: Duration::from_secs_f64(missing / self.refill_per_sec),
            }
        }
    }

    /// Clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Drops buckets that would be full by now; they behave like new clients.
    fn prune(&self, buckets: &mut HashMap<K, Bucket>, now: Instant) {
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
            bucket.tokens + elapsed * self.refill_per_sec < self.capacity
        });
        tracing::debug!(dropped = before - buckets.len(), "pruned idle rate-limit buckets");
    }
}

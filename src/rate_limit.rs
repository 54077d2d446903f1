use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

use crate::models::Id;

/// Checks between sweeps of keys whose windows have fully expired.
const SWEEP_EVERY: usize = 1024;

/// Sliding window in-memory rate limiter (process local).
///
/// Each key holds the expiry instants of its recorded hits, oldest first.
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    calls: Arc<AtomicUsize>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), calls: Arc::new(AtomicUsize::new(0)), enabled }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled { return true; }
        // must run before an entry guard is held: retain locks every shard
        if self.calls.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
        let now = Instant::now();
        let mut entry = self.store.entry(key.to_string()).or_default();
        while let Some(expires) = entry.front() {
            if *expires <= now { entry.pop_front(); } else { break; }
        }
        let allowed = entry.len() < limit;
        if allowed {
            entry.push_back(now + window);
        }
        let empty = entry.is_empty();
        drop(entry);
        if empty {
            self.store.remove_if(key, |_, q| q.is_empty());
        }
        allowed
    }

    /// Drops every key with no hit left inside its window.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.store.retain(|_, q| q.back().is_some_and(|last| *last > now));
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

/// Per-action limits.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub board_limit: usize,
    pub board_window: Duration,
    pub message_limit: usize,
    pub message_window: Duration,
    pub login_limit: usize,
    pub login_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            board_limit: 5,
            board_window: Duration::from_secs(300),
            message_limit: 20,
            message_window: Duration::from_secs(60),
            login_limit: 10,
            login_window: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize { std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default) }
        fn dur_env(name: &str, default: Duration) -> Duration { std::env::var(name).ok().and_then(|v| v.parse().ok()).map(Duration::from_secs).unwrap_or(default) }
        let d = Self::default();
        Self {
            enabled: std::env::var("RL_ENABLED").map(|v| v != "0" && !v.eq_ignore_ascii_case("false")).unwrap_or(d.enabled),
            board_limit: usize_env("RL_BOARD_LIMIT", d.board_limit),
            board_window: dur_env("RL_BOARD_WINDOW", d.board_window),
            message_limit: usize_env("RL_MESSAGE_LIMIT", d.message_limit),
            message_window: dur_env("RL_MESSAGE_WINDOW", d.message_window),
            login_limit: usize_env("RL_LOGIN_LIMIT", d.login_limit),
            login_window: dur_env("RL_LOGIN_WINDOW", d.login_window),
        }
    }
}

/// High level guard used by handlers.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(cfg: RateLimitConfig) -> Self { Self { limiter: InMemoryRateLimiter::new(cfg.enabled), cfg } }
    pub fn allow_board(&self, user_id: Id) -> bool { self.limiter.check(&format!("board:{user_id}"), self.cfg.board_limit, self.cfg.board_window) }
    pub fn allow_message(&self, user_id: Id) -> bool { self.limiter.check(&format!("message:{user_id}"), self.cfg.message_limit, self.cfg.message_window) }
    pub fn allow_login(&self, username: &str) -> bool { self.limiter.check(&format!("login:{}", username.to_lowercase()), self.cfg.login_limit, self.cfg.login_window) }
}

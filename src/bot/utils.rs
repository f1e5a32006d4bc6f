use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use teloxide::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CallbackData {
    /// Locale picked from the settings keyboard
    SetLocale(String),
    /// Close the settings menu
    CloseMenu,
}

impl CallbackData {
    pub fn pack(&self) -> String {
        match self {
            Self::SetLocale(locale) => format!("locale {}", locale),
            Self::CloseMenu => "close".to_string(),
        }
    }

    pub fn unpack(s: &str) -> Option<Self> {
        match s.split_once(' ') {
            Some(("locale", locale)) => Some(Self::SetLocale(locale.to_string())),
            None if s == "close" => Some(Self::CloseMenu),
            _ => None,
        }
    }
}

/// Sliding-window limiter for per-user command throughput
#[derive(Debug, Clone)]
pub struct RateLimiter(Arc<RateLimiterInner>);

#[derive(Debug)]
struct RateLimiterInner {
    interval: Duration,
    limit: usize,
    data: DashMap<UserId, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration, limit: usize) -> Self {
        assert_ne!(limit, 0);
        Self(Arc::new(RateLimiterInner { interval, limit, data: Default::default() }))
    }

    /// Record one hit; returns the remaining wait when the user is over quota
    pub fn insert(&self, key: UserId) -> Option<Duration> {
        let mut entry = self.0.data.entry(key).or_default();
        let entry = entry.value_mut();
        // Expired hits fall off the front before counting
        while let Some(first) = entry.front() {
            if first.elapsed() > self.0.interval {
                entry.pop_front();
            } else {
                break;
            }
        }
        if entry.len() == self.0.limit {
            // The front hit may expire between the sweep and this read
            return entry.front().map(|d| self.0.interval.saturating_sub(d.elapsed()));
        }
        entry.push_back(Instant::now());
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn callback_data_round_trip() {
        for data in [CallbackData::SetLocale("ru".to_string()), CallbackData::CloseMenu] {
            let packed = data.pack();
            assert_eq!(CallbackData::unpack(&packed).unwrap().pack(), packed);
        }
    }

    #[test]
    fn unpack_rejects_garbage() {
        assert!(CallbackData::unpack("vote 1 2").is_none());
        assert!(CallbackData::unpack("").is_none());
    }

    #[test]
    fn limiter_kicks_in_at_quota() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let user = UserId(1);
        assert!(limiter.insert(user).is_none());
        assert!(limiter.insert(user).is_none());
        assert!(limiter.insert(user).is_some());
        // Another user has a separate budget
        assert!(limiter.insert(UserId(2)).is_none());
    }

    #[test]
    fn over_quota_wait_is_bounded_by_interval() {
        let interval = Duration::from_millis(10);
        let limiter = RateLimiter::new(interval, 1);
        let user = UserId(7);
        assert!(limiter.insert(user).is_none());
        // Hammer the limiter across the expiry boundary; the reported wait
        // must never exceed the interval (or underflow right at expiry)
        loop {
            match limiter.insert(user) {
                Some(wait) => assert!(wait <= interval),
                None => break,
            }
        }
    }
}

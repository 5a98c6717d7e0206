use crate::config;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::SystemTime;

/// The time anchor for tests. Allows for `tokio::time::pause()` to be used.
#[cfg(test)]
static TIME_ANCHOR: std::sync::LazyLock<tokio::time::Instant> =
    std::sync::LazyLock::new(tokio::time::Instant::now);

/// An [Entry] associates optional data with its creation time. It is the value type
/// of both pipeline caches.
///
/// An `Entry::from(None)` is a *negative* entry: it records that upstream confirmed
/// the resource does not exist, which is distinct from having no information at all.
/// Negative entries expire after [`exp_empty`](config::CacheEntry::exp_empty),
/// filled entries after [`exp`](config::CacheEntry::exp).
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Entry<D>
where
    D: Clone + Debug + Eq + PartialEq,
{
    /// The creation time in epoch seconds.
    pub timestamp: u64,

    /// The cached data, [None] for a confirmed upstream negative.
    pub data: Option<D>,
}

impl<D> From<Option<D>> for Entry<D>
where
    D: Clone + Debug + Eq + PartialEq,
{
    /// Creates a new [Entry], using the current time as its creation time.
    fn from(data: Option<D>) -> Self {
        Entry {
            timestamp: now_seconds(),
            data,
        }
    }
}

impl<D> Entry<D>
where
    D: Clone + Debug + Eq + PartialEq,
{
    /// Gets the current age of the [Entry] in seconds.
    pub fn current_age(&self) -> u64 {
        now_seconds().saturating_sub(self.timestamp)
    }

    /// Checks whether the [Entry] has some data.
    pub fn has_some(&self) -> bool {
        self.data.is_some()
    }

    /// Checks whether the [Entry] is a negative entry.
    pub fn has_none(&self) -> bool {
        self.data.is_none()
    }

    /// Checks whether the [Entry] has **now** expired. An [Entry] is expired if its
    /// [Entry::current_age] is **greater or equal** the expiry selected by whether
    /// the entry is filled or negative.
    pub fn is_expired(&self, expiry: &config::CacheEntry) -> bool {
        let exp = match &self.data {
            None => expiry.exp_empty,
            Some(_) => expiry.exp,
        };
        self.current_age() >= exp.as_secs()
    }
}

/// Gets the current time in seconds. When running tests, it uses `tokio::time` with
/// a fixed anchor so that `tokio::time::pause()` can be used.
#[cfg(test)]
pub fn now_seconds() -> u64 {
    TIME_ANCHOR.elapsed().as_secs()
}

/// Gets the current time in seconds.
#[cfg(not(test))]
pub fn now_seconds() -> u64 {
    match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
        Ok(n) => n.as_secs(),
        Err(_) => panic!("SystemTime before UNIX EPOCH!"),
    }
}

//! Lock-free global pool.
//!
//! ## Design
//!
//! All state lives in three atomics. `reserve` is a compare-exchange loop that
//! refuses before publishing when the new total would exceed the limit it
//! loaded. `release` saturates at zero. Trackers already batch their
//! reservations in grab-size units, so the pool can use the simplest correct
//! synchronization.
//!
//! ## Resizing
//!
//! A limit change and a reservation each publish first and check the other
//! side second, both with `SeqCst`:
//!
//! - `set_limit` stores the new limit, then reads `used`. If the reserved total
//!   is already above the new limit, the old limit is put back.
//! - `reserve` commits its new total, then re-reads the limit. If a resize
//!   landed in between and the total no longer fits, it rolls itself back.
//!
//! In the single total order of `SeqCst` operations one of the two always sees
//! the other, so an accepted limit is never below the reserved total once
//! in-flight rollbacks finish. A reservation racing a resize may be refused
//! even when the resize itself is refused.

use std::sync::atomic::{AtomicU64, Ordering};

use memquota_common::config::PoolConfig;
use memquota_common::types::MemoryLimit;
use memquota_common::utils::error::{Error, LimitScope, MemoryLimitExceeded, Result};

use super::{MemoryPool, PoolStats};

/// Stored in `limit` to mean unbounded.
const UNBOUNDED: u64 = u64::MAX;

/// A process-wide pool with an optional, adjustable total limit.
///
/// # Examples
///
/// ```
/// use memquota_core::{GlobalMemoryPool, MemoryPool};
///
/// let pool = GlobalMemoryPool::with_limit("transactions", 100);
/// pool.reserve(60).unwrap();
/// assert!(pool.reserve(50).is_err());
/// assert_eq!(pool.free(), Some(40));
/// ```
#[derive(Debug)]
pub struct GlobalMemoryPool {
    name: String,
    setting_name: Option<String>,
    limit: AtomicU64,
    used: AtomicU64,
    peak: AtomicU64,
}

impl GlobalMemoryPool {
    /// Creates a pool from a validated configuration.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config.name, config.limit, config.setting_name))
    }

    /// Creates a pool that never refuses but still counts reservations.
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::from_parts(name.into(), MemoryLimit::Unbounded, None)
    }

    /// Creates a pool limited to `limit` bytes.
    pub fn with_limit(name: impl Into<String>, limit: u64) -> Self {
        Self::from_parts(name.into(), MemoryLimit::bytes(limit), None)
    }

    fn from_parts(name: String, limit: MemoryLimit, setting_name: Option<String>) -> Self {
        Self {
            name,
            setting_name,
            limit: AtomicU64::new(encode_limit(limit)),
            used: AtomicU64::new(0),
            peak: AtomicU64::new(0),
        }
    }

    /// Configuration key that established the limit, if any.
    pub fn setting_name(&self) -> Option<&str> {
        self.setting_name.as_deref()
    }

    /// Highest reserved total observed since creation.
    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Acquire)
    }

    /// Changes the total limit.
    ///
    /// Refuses to shrink below the quota currently reserved, including
    /// reservations that commit while the resize is in progress.
    pub fn set_limit(&self, limit: MemoryLimit) -> Result<()> {
        let encoded = encode_limit(limit);
        let previous = self.limit.swap(encoded, Ordering::SeqCst);

        if let MemoryLimit::Bytes(requested) = limit {
            let outstanding = self.used.load(Ordering::SeqCst);
            if requested < outstanding {
                // a later resize wins over our restore
                let _ = self.limit.compare_exchange(
                    encoded,
                    previous,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                return Err(Error::PoolInUse {
                    pool: self.name.clone(),
                    requested,
                    outstanding,
                });
            }
        }

        tracing::debug!(pool = %self.name, %limit, "pool limit changed");
        Ok(())
    }

    /// Subtracts `bytes` from `used`, saturating at zero. Returns the value
    /// before and after.
    fn subtract(&self, bytes: u64) -> (u64, u64) {
        loop {
            let current = self.used.load(Ordering::Acquire);
            let new_value = current.saturating_sub(bytes);

            if self
                .used
                .compare_exchange_weak(current, new_value, Ordering::SeqCst, Ordering::Acquire)
                .is_ok()
            {
                return (current, new_value);
            }
        }
    }

    fn exceeded(&self, requested: u64, limit: u64, used: u64) -> Error {
        let setting = self.setting_name.as_deref().unwrap_or(&self.name);
        MemoryLimitExceeded::new(LimitScope::Pool, requested, limit, used)
            .with_setting_name(setting)
            .into()
    }
}

fn encode_limit(limit: MemoryLimit) -> u64 {
    limit.as_bytes().unwrap_or(UNBOUNDED)
}

fn decode_limit(raw: u64) -> MemoryLimit {
    if raw == UNBOUNDED {
        MemoryLimit::Unbounded
    } else {
        MemoryLimit::Bytes(raw)
    }
}

impl MemoryPool for GlobalMemoryPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn reserve(&self, bytes: u64) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }

        loop {
            let current = self.used.load(Ordering::Acquire);
            let limit = self.limit.load(Ordering::SeqCst);

            let Some(new_used) = current.checked_add(bytes) else {
                return Err(Error::Overflow {
                    counter: "pool",
                    current,
                    delta: bytes,
                });
            };

            if limit != UNBOUNDED && new_used > limit {
                tracing::trace!(pool = %self.name, bytes, current, limit, "pool reservation refused");
                return Err(self.exceeded(bytes, limit, current));
            }

            match self.used.compare_exchange_weak(
                current,
                new_used,
                Ordering::SeqCst,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let limit = self.limit.load(Ordering::SeqCst);
                    if limit != UNBOUNDED && new_used > limit {
                        self.subtract(bytes);
                        tracing::trace!(
                            pool = %self.name,
                            bytes,
                            limit,
                            "pool reservation rolled back after a resize"
                        );
                        return Err(self.exceeded(bytes, limit, current));
                    }

                    self.peak.fetch_max(new_used, Ordering::AcqRel);
                    tracing::trace!(pool = %self.name, bytes, used = new_used, "pool reserved");
                    return Ok(());
                }
                Err(_) => continue,
            }
        }
    }

    fn release(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }

        let (current, new_value) = self.subtract(bytes);
        if bytes > current {
            tracing::warn!(
                pool = %self.name,
                requested = bytes,
                reserved = current,
                "pool release exceeds reserved quota; clamping to zero"
            );
        }
        tracing::trace!(pool = %self.name, bytes, used = new_value, "pool released");
    }

    fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    fn limit(&self) -> MemoryLimit {
        decode_limit(self.limit.load(Ordering::Acquire))
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            name: self.name.clone(),
            limit: self.limit(),
            used: self.used(),
            peak: self.peak(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reserve_within_limit() {
        let pool = GlobalMemoryPool::with_limit("global", 100);
        assert!(pool.reserve(60).is_ok());
        assert!(pool.reserve(40).is_ok());
        assert_eq!(pool.used(), 100);
        assert_eq!(pool.free(), Some(0));
    }

    #[test]
    fn test_reserve_exceeds_limit() {
        let pool = GlobalMemoryPool::with_limit("global", 100);
        pool.reserve(60).unwrap();

        let err = pool.reserve(50).unwrap_err();
        let limit = err.as_limit_exceeded().unwrap();
        assert_eq!(limit.scope, LimitScope::Pool);
        assert_eq!(limit.attempted, 50);
        assert_eq!(limit.limit, 100);
        assert_eq!(limit.used, 60);
        assert_eq!(limit.setting_name.as_deref(), Some("global"));

        // refused reservations leave no trace
        assert_eq!(pool.used(), 60);
    }

    #[test]
    fn test_failure_uses_setting_name() {
        let config = PoolConfig::new("global")
            .with_limit(MemoryLimit::bytes(10))
            .with_setting_name("db.memory.max_size");
        let pool = GlobalMemoryPool::new(config).unwrap();

        let err = pool.reserve(11).unwrap_err();
        assert!(err.to_string().contains("db.memory.max_size"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(GlobalMemoryPool::new(PoolConfig::new("")).is_err());
    }

    #[test]
    fn test_zero_reservation() {
        let pool = GlobalMemoryPool::with_limit("global", 0);
        assert!(pool.reserve(0).is_ok());
        assert!(pool.reserve(1).is_err());
    }

    #[test]
    fn test_release_underflow_protection() {
        let pool = GlobalMemoryPool::with_limit("global", 100);
        pool.reserve(10).unwrap();
        pool.release(1000);
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn test_unbounded_overflow_detected() {
        let pool = GlobalMemoryPool::unbounded("global");
        pool.reserve(u64::MAX - 1).unwrap();
        assert!(matches!(pool.reserve(2), Err(Error::Overflow { .. })));
        assert_eq!(pool.used(), u64::MAX - 1);
    }

    #[test]
    fn test_peak_tracking() {
        let pool = GlobalMemoryPool::unbounded("global");
        pool.reserve(300).unwrap();
        pool.release(200);
        pool.reserve(50).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.used, 150);
        assert_eq!(stats.peak, 300);
    }

    #[test]
    fn test_set_limit() {
        let pool = GlobalMemoryPool::with_limit("global", 100);
        pool.reserve(80).unwrap();

        assert!(matches!(
            pool.set_limit(MemoryLimit::bytes(50)),
            Err(Error::PoolInUse { outstanding: 80, .. })
        ));
        assert_eq!(pool.limit(), MemoryLimit::bytes(100));

        pool.set_limit(MemoryLimit::bytes(200)).unwrap();
        assert!(pool.reserve(120).is_ok());

        pool.set_limit(MemoryLimit::Unbounded).unwrap();
        assert_eq!(pool.free(), None);
    }

    #[test]
    fn test_concurrent_reservations_never_overcommit() {
        let pool = Arc::new(GlobalMemoryPool::with_limit("global", 10_000));

        let granted: u64 = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let pool = Arc::clone(&pool);
                    s.spawn(move || {
                        let mut granted = 0u64;
                        for _ in 0..1000 {
                            if pool.reserve(7).is_ok() {
                                granted += 7;
                            }
                        }
                        granted
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(pool.used(), granted);
        assert!(granted <= 10_000);
        assert!(10_000 - granted < 7);
    }

    #[test]
    fn test_set_limit_racing_reservations() {
        const WORKERS: usize = 4;
        const RESERVATIONS: u64 = 5_000;

        let pool = GlobalMemoryPool::unbounded("global");

        for _ in 0..50 {
            let mut accepted = None;

            let granted: u64 = std::thread::scope(|s| {
                let handles: Vec<_> = (0..WORKERS)
                    .map(|_| {
                        s.spawn(|| {
                            let mut granted = 0u64;
                            for _ in 0..RESERVATIONS {
                                if pool.reserve(1).is_ok() {
                                    granted += 1;
                                }
                            }
                            granted
                        })
                    })
                    .collect();

                while pool.used() < RESERVATIONS {
                    std::hint::spin_loop();
                }
                let requested = pool.used();
                if pool.set_limit(MemoryLimit::bytes(requested)).is_ok() {
                    accepted = Some(requested);
                }

                handles.into_iter().map(|h| h.join().unwrap()).sum()
            });

            assert_eq!(pool.used(), granted);
            if let Some(limit) = accepted {
                assert_eq!(pool.limit(), MemoryLimit::bytes(limit));
                assert!(pool.used() <= limit, "{} reserved over limit {limit}", pool.used());
            }

            pool.set_limit(MemoryLimit::Unbounded).unwrap();
            pool.release(pool.used());
        }
    }
}

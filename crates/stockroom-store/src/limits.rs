//! Bounds on how much an offline queue may hold.
//!
//! A device can stay offline for a long time. Without a bound, every captured
//! write keeps growing the local database; once a limit is reached new
//! operations are refused with [`StoreError::QuotaExceeded`](crate::StoreError)
//! and the caller learns about it at enqueue time.

/// Limits applied when a *new* record is added to a queue store.
///
/// Rewriting an existing record (retry bookkeeping) is never refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    /// Maximum number of records, pending and failed together.
    pub max_count: usize,
    /// Maximum total size of the records' JSON encoding, in bytes.
    pub max_bytes: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_count: 10_000,
            max_bytes: 100 * 1024 * 1024,
        }
    }
}

impl QueueLimits {
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            max_count,
            max_bytes,
        }
    }

    /// Limits for handheld devices with little storage.
    pub fn mobile() -> Self {
        Self {
            max_count: 1_000,
            max_bytes: 10 * 1024 * 1024,
        }
    }

    /// Limits for desktop front-desk terminals.
    pub fn desktop() -> Self {
        Self {
            max_count: 50_000,
            max_bytes: 500 * 1024 * 1024,
        }
    }

    /// No effective limit.
    pub fn unbounded() -> Self {
        Self {
            max_count: usize::MAX,
            max_bytes: usize::MAX,
        }
    }

    /// Check whether a new record of `size` bytes fits next to `stats`.
    pub(crate) fn check(&self, stats: &QueueStats, size: usize) -> crate::Result<()> {
        if stats.count >= self.max_count {
            return Err(crate::StoreError::QuotaExceeded {
                limit: "count",
                max: self.max_count,
            });
        }
        if stats.bytes.saturating_add(size) > self.max_bytes {
            return Err(crate::StoreError::QuotaExceeded {
                limit: "bytes",
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Snapshot of queue occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Number of records.
    pub count: usize,
    /// Total size of the records' JSON encoding.
    pub bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    #[test]
    fn test_presets_ordering() {
        let mobile = QueueLimits::mobile();
        let default = QueueLimits::default();
        let desktop = QueueLimits::desktop();
        assert!(mobile.max_count < default.max_count);
        assert!(default.max_count < desktop.max_count);
        assert!(mobile.max_bytes < desktop.max_bytes);
    }

    #[test]
    fn test_check_count_limit() {
        let limits = QueueLimits::new(2, 1_000);
        let stats = QueueStats { count: 2, bytes: 10 };
        let err = limits.check(&stats, 1).unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { limit: "count", max: 2 }));
    }

    #[test]
    fn test_check_bytes_limit() {
        let limits = QueueLimits::new(10, 100);
        let stats = QueueStats { count: 1, bytes: 90 };
        assert!(limits.check(&stats, 10).is_ok());
        let err = limits.check(&stats, 11).unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { limit: "bytes", .. }));
    }
}

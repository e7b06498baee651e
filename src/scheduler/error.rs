//! Error types for the scheduler module

use thiserror::Error;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Exclusion fraction range is invalid (out of [0,1] or min > max)
    #[error("Invalid exclusion range [{min}, {max}]. Fractions must satisfy 0 <= min <= max <= 1")]
    InvalidExclusionRange { min: f64, max: f64 },

    /// A bucket window is malformed (end before start)
    #[error("Invalid window for bucket '{bucket}': [{start}, {end})")]
    InvalidWindow {
        bucket: String,
        start: u64,
        end: u64,
    },

    /// Bucket shares do not describe a usable partition
    #[error("Invalid bucket shares: {reason}")]
    InvalidShares { reason: String },

    /// Worker referenced by a group is not registered in the pool
    #[error("Group '{group}' references unknown worker '{worker}'")]
    UnknownWorker { group: String, worker: String },

    /// Dispatcher is shutting down; no new events are admitted
    #[error("Dispatcher is shut down; event '{event_id}' not admitted")]
    ShuttingDown { event_id: String },
}

impl SchedulerError {
    /// Create an invalid exclusion range error
    pub fn invalid_exclusion(min: f64, max: f64) -> Self {
        Self::InvalidExclusionRange { min, max }
    }

    /// Create an invalid window error
    pub fn invalid_window(bucket: impl Into<String>, start: u64, end: u64) -> Self {
        Self::InvalidWindow {
            bucket: bucket.into(),
            start,
            end,
        }
    }

    /// Create an invalid shares error
    pub fn invalid_shares(reason: impl Into<String>) -> Self {
        Self::InvalidShares {
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable by the caller
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ShuttingDown { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_exclusion_display() {
        let err = SchedulerError::invalid_exclusion(0.2, 0.1);
        assert!(err.to_string().contains("0.2"));
        assert!(err.to_string().contains("0.1"));
    }

    #[test]
    fn test_invalid_window_display() {
        let err = SchedulerError::invalid_window("peak", 36000, 34800);
        assert!(err.to_string().contains("peak"));
        assert!(err.to_string().contains("36000"));
    }

    #[test]
    fn test_is_recoverable() {
        let shutdown = SchedulerError::ShuttingDown {
            event_id: "chan1:42".to_string(),
        };
        assert!(shutdown.is_recoverable());

        let invalid = SchedulerError::invalid_exclusion(-0.1, 0.5);
        assert!(!invalid.is_recoverable());
    }
}

//! Outward status codes carried in `ServerInfo.status`
//!
//! Non-negative values belong to the downstream schedulers and are passed
//! through untouched. Negative values are reserved for the coordinator.

/// The backend opened a session.
pub const STATUS_OK: i32 = 0;

/// No render server in the pool is left after exclusions.
pub const STATUS_NO_CAPACITY: i32 = 1;

/// The forwarding call to the selected backend did not produce a decision.
pub const STATUS_DOWNSTREAM_FAILED: i32 = -1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downstream_failure_is_distinct() {
        assert_ne!(STATUS_DOWNSTREAM_FAILED, STATUS_OK);
        assert_ne!(STATUS_DOWNSTREAM_FAILED, STATUS_NO_CAPACITY);
        assert!(STATUS_DOWNSTREAM_FAILED.is_negative());
    }
}

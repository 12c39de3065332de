//! Per-connection delivery policy.

/// Redelivery and expiry policy shared by every session of a connection.
///
/// # Examples
///
/// ```
/// use brokerwire::connection::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .max_redeliveries(Some(2))
///     .check_expiry_on_receive(false);
/// assert!(config.exceeds_redelivery_limit(3));
/// assert!(!config.exceeds_redelivery_limit(2));
/// assert!(!config.expiry_checked_on_receive());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    max_redeliveries: Option<u32>,
    check_expiry_on_receive: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_redeliveries: Some(6),
            check_expiry_on_receive: true,
        }
    }
}

impl ConnectionConfig {
    /// Redeliver a message at most `limit` times before poison-acknowledging
    /// it. `None` redelivers without limit.
    #[must_use]
    pub fn max_redeliveries(mut self, limit: Option<u32>) -> Self {
        self.max_redeliveries = limit;
        self
    }

    /// Also drop messages that expire while waiting in a consumer queue.
    #[must_use]
    pub fn check_expiry_on_receive(mut self, enabled: bool) -> Self {
        self.check_expiry_on_receive = enabled;
        self
    }

    #[must_use]
    pub fn redelivery_limit(&self) -> Option<u32> { self.max_redeliveries }

    #[must_use]
    pub fn expiry_checked_on_receive(&self) -> bool { self.check_expiry_on_receive }

    /// Whether a message redelivered `count` times is past the limit.
    #[must_use]
    pub fn exceeds_redelivery_limit(&self, count: u32) -> bool {
        self.max_redeliveries.is_some_and(|limit| count > limit)
    }
}

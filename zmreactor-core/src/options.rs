//! Socket configuration options
//!
//! The subset of transport options the reactor and its devices set on a
//! socket (ZMQ_SNDHWM, ZMQ_RCVHWM, ZMQ_LINGER, ZMQ_IDENTITY). Every field is
//! optional: unset fields leave the transport default in place.
//!
//! Options must be applied before `bind`/`connect` to take effect.

use bytes::Bytes;
use std::time::Duration;

/// Longest identity the transport accepts.
pub const MAX_IDENTITY_LEN: usize = 255;

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use zmreactor_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::new()
///     .with_hwm(1)
///     .with_linger(Duration::ZERO);
/// assert_eq!(opts.send_hwm, Some(1));
/// assert_eq!(opts.recv_hwm, Some(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocketOptions {
    /// High water mark for sending (ZMQ_SNDHWM), in messages
    pub send_hwm: Option<i32>,

    /// High water mark for receiving (ZMQ_RCVHWM), in messages
    pub recv_hwm: Option<i32>,

    /// Linger timeout (ZMQ_LINGER)
    ///
    /// Time pending messages may hold up close. `Duration::ZERO` discards them.
    pub linger: Option<Duration>,

    /// Socket identity (ZMQ_IDENTITY), 1..=255 bytes
    pub identity: Option<Bytes>,
}

impl SocketOptions {
    /// Create options that change nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set send high water mark.
    pub fn with_send_hwm(mut self, hwm: i32) -> Self {
        self.send_hwm = Some(hwm);
        self
    }

    /// Set receive high water mark.
    pub fn with_recv_hwm(mut self, hwm: i32) -> Self {
        self.recv_hwm = Some(hwm);
        self
    }

    /// Set both high water marks (convenience method).
    pub fn with_hwm(self, hwm: i32) -> Self {
        self.with_send_hwm(hwm).with_recv_hwm(hwm)
    }

    /// Set linger timeout.
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = Some(linger);
        self
    }

    /// Set socket identity.
    pub fn with_identity(mut self, identity: impl Into<Bytes>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Linger in whole milliseconds, saturating at `i32::MAX`.
    #[must_use]
    pub fn linger_millis(&self) -> Option<i32> {
        self.linger
            .map(|d| i32::try_from(d.as_millis()).unwrap_or(i32::MAX))
    }

    /// True when no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.send_hwm.is_none()
            && self.recv_hwm.is_none()
            && self.linger.is_none()
            && self.identity.is_none()
    }

    /// Validate option values before they reach the transport.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(id) = &self.identity {
            validate_identity(id)?;
        }
        for (name, hwm) in [("send_hwm", self.send_hwm), ("recv_hwm", self.recv_hwm)] {
            if matches!(hwm, Some(v) if v < 0) {
                return Err(format!("{name} cannot be negative"));
            }
        }
        Ok(())
    }
}

/// Check that an identity is 1..=255 bytes long.
pub fn validate_identity(identity: &[u8]) -> Result<(), String> {
    if identity.is_empty() {
        return Err("identity cannot be empty".to_string());
    }
    if identity.len() > MAX_IDENTITY_LEN {
        return Err(format!(
            "identity too long: {} bytes (max {MAX_IDENTITY_LEN})",
            identity.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = SocketOptions::default();
        assert!(opts.is_empty());
        assert_eq!(opts.linger_millis(), None);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let opts = SocketOptions::new()
            .with_send_hwm(10)
            .with_recv_hwm(20)
            .with_linger(Duration::from_millis(250))
            .with_identity("worker-1");

        assert_eq!(opts.send_hwm, Some(10));
        assert_eq!(opts.recv_hwm, Some(20));
        assert_eq!(opts.linger_millis(), Some(250));
        assert_eq!(opts.identity.as_deref(), Some(&b"worker-1"[..]));
        assert!(!opts.is_empty());
    }

    #[test]
    fn test_linger_saturates() {
        let opts = SocketOptions::new().with_linger(Duration::from_secs(u64::MAX / 4));
        assert_eq!(opts.linger_millis(), Some(i32::MAX));
    }

    #[test]
    fn test_identity_validation() {
        assert!(validate_identity(b"a").is_ok());
        assert!(validate_identity(&[7u8; MAX_IDENTITY_LEN]).is_ok());
        assert!(validate_identity(b"").is_err());
        assert!(validate_identity(&[7u8; MAX_IDENTITY_LEN + 1]).is_err());

        let opts = SocketOptions::new().with_identity(Bytes::new());
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_negative_hwm_rejected() {
        let opts = SocketOptions::new().with_send_hwm(-1);
        assert_eq!(opts.validate().unwrap_err(), "send_hwm cannot be negative");
    }
}

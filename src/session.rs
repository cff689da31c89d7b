//! Session credentials handed to the connection manager.
//!
//! Token storage is owned by the surrounding application; this module only
//! models the value passed in at login and the signal used to follow
//! login/logout transitions.

use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::watch;

/// Bearer token for one authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    /// Time left before expiry; zero once expired, `None` without an expiry.
    pub fn time_until_expiry(&self) -> Option<std::time::Duration> {
        self.expires_at
            .map(|exp| (exp - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO))
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.secret)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Sender side of the auth signal: `Some(token)` on login, `None` on logout.
pub type AuthSender = watch::Sender<Option<SessionToken>>;
/// Receiver side of the auth signal, consumed by
/// [`RealtimeContext::follow_auth`](crate::context::RealtimeContext::follow_auth).
pub type AuthReceiver = watch::Receiver<Option<SessionToken>>;

/// Create an auth signal starting in the logged-out state.
pub fn auth_channel() -> (AuthSender, AuthReceiver) {
    watch::channel(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_debug_redacts_secret() {
        let token = SessionToken::new("super-secret");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_bearer_header() {
        assert_eq!(SessionToken::new("abc").bearer(), "Bearer abc");
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let token = SessionToken::new("t").with_expiry(now + Duration::seconds(60));
        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::seconds(61)));
        assert!(!SessionToken::new("t").is_expired());
    }

    #[test]
    fn test_time_until_expiry() {
        assert_eq!(SessionToken::new("t").time_until_expiry(), None);

        let past = SessionToken::new("t").with_expiry(Utc::now() - Duration::seconds(5));
        assert_eq!(past.time_until_expiry(), Some(std::time::Duration::ZERO));

        let future = SessionToken::new("t").with_expiry(Utc::now() + Duration::seconds(60));
        let left = future.time_until_expiry().unwrap();
        assert!(left > std::time::Duration::from_secs(55));
        assert!(left <= std::time::Duration::from_secs(60));
    }
}

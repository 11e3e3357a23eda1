mod google;

pub use google::GoogleAuthorizer;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Opaque access handle passed to every remote call of a run.
#[derive(Clone)]
pub struct Credential {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn bearer(&self) -> &str {
        &self.access_token
    }

    /// True while the token has more than a minute left.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(60) > now,
            None => false,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn authorize(&self) -> Result<Credential>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
pub struct StaticCredentials(pub Credential);

#[cfg(test)]
#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn authorize(&self) -> Result<Credential> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "Static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("ya29.secret", None);
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("ya29.secret"));
        assert!(printed.contains("redacted"));
    }

    #[test]
    fn test_freshness_window() {
        let now = Utc::now();
        assert!(Credential::new("t", Some(now + Duration::minutes(10))).is_fresh(now));
        assert!(!Credential::new("t", Some(now + Duration::seconds(30))).is_fresh(now));
        assert!(!Credential::new("t", None).is_fresh(now));
    }
}

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Lifecycle status of a site profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileStatus {
    /// Profile exists but has never completed a setup attempt
    Unauthenticated,

    /// A setup attempt is currently running
    Pending,

    /// Login validated; the stored state is usable for crawling
    Active,

    /// A previously Active session stopped passing validation
    Expired,

    /// The last setup attempt completed but validation failed
    Failed,
}

impl ProfileStatus {
    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unauthenticated" => Some(Self::Unauthenticated),
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Persisted authentication state for one site identity.
///
/// Once read for a crawl, a profile is treated as an immutable snapshot;
/// concurrent crawls may share it freely. Only setup attempts and
/// expiry marking mutate the stored row.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Unique site identity
    pub site_name: String,

    /// Login page the setup flow opens
    pub login_url: String,

    /// Page used to validate that the captured session is logged in
    pub test_url: String,

    pub status: ProfileStatus,

    /// Opaque serialized cookies + origin storage. Empty for profiles
    /// that never captured a session; retained on Failed profiles for
    /// diagnostics.
    pub storage_state: Option<String>,

    pub created_at: DateTime<Utc>,

    pub last_validated_at: Option<DateTime<Utc>>,

    /// Hard upper bound a setup attempt may take
    pub setup_timeout: Duration,
}

impl SiteProfile {
    /// A fresh profile at the start of its first setup attempt
    pub fn pending(
        site_name: impl Into<String>,
        login_url: impl Into<String>,
        test_url: impl Into<String>,
        setup_timeout: Duration,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            login_url: login_url.into(),
            test_url: test_url.into(),
            status: ProfileStatus::Pending,
            storage_state: None,
            created_at: Utc::now(),
            last_validated_at: None,
            setup_timeout,
        }
    }

    /// True when crawls may use this profile
    pub fn is_crawlable(&self) -> bool {
        self.status == ProfileStatus::Active
    }

    /// Checks the storage-state/status consistency invariant: Active and
    /// Expired profiles carry a non-empty state; Unauthenticated and
    /// Pending carry none. (Failed may carry a diagnostic snapshot.)
    pub fn storage_state_consistent(&self) -> bool {
        let non_empty = self.storage_state.as_deref().is_some_and(|s| !s.is_empty());
        match self.status {
            ProfileStatus::Active | ProfileStatus::Expired => non_empty,
            ProfileStatus::Unauthenticated | ProfileStatus::Pending => !non_empty,
            ProfileStatus::Failed => true,
        }
    }
}

//! Authorization outcomes

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Version-neutral authorization status, superset of the 1.6 and 2.0.1
/// vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    Accepted,
    Blocked,
    Expired,
    Invalid,
    ConcurrentTx,
    NoCredit,
    NotAllowedTypeEvse,
    NotAtThisLocation,
    NotAtThisTime,
    Unknown,
}

impl AuthorizationStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationMethod {
    LocalList,
    Cache,
    Remote,
    Certificate,
}

/// The outcome of an authorization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub status: AuthorizationStatus,
    pub method: AuthorizationMethod,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Overrides the cache's default entry lifetime when set.
    #[serde(skip)]
    pub cache_ttl: Option<Duration>,
    pub is_offline: bool,
}

impl AuthorizationResult {
    pub fn new(status: AuthorizationStatus, method: AuthorizationMethod) -> Self {
        Self {
            status,
            method,
            timestamp: Utc::now(),
            expiry: None,
            parent: None,
            cache_ttl: None,
            is_offline: false,
        }
    }

    pub fn accepted(method: AuthorizationMethod) -> Self {
        Self::new(AuthorizationStatus::Accepted, method)
    }

    pub fn unknown() -> Self {
        // No strategy claimed the request; method is nominal.
        Self::new(AuthorizationStatus::Unknown, AuthorizationMethod::Remote)
    }

    pub fn offline(mut self) -> Self {
        self.is_offline = true;
        self
    }

    pub fn is_accepted(&self) -> bool {
        self.status.is_accepted()
    }
}

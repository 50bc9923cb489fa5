//! Authorization strategy contract
//!
//! Strategies are registered with a priority (lower is stronger) and probed
//! in order: the first whose `can_handle` returns true runs; returning
//! `None` abstains and the probe continues. When every strategy abstains the
//! pipeline answers `Unknown`.

use async_trait::async_trait;

use super::identifier::UnifiedIdentifier;
use super::result::AuthorizationResult;
use crate::ocpp::OcppVersion;
use crate::shared::SessionError;

/// Standard strategy priorities.
pub const PRIORITY_LOCAL_LIST: u8 = 10;
pub const PRIORITY_CACHE: u8 = 20;
pub const PRIORITY_REMOTE: u8 = 30;
pub const PRIORITY_CERTIFICATE: u8 = 40;

/// A single authorization request.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub identifier: UnifiedIdentifier,
    pub connector_id: Option<u32>,
    /// PEM certificate chain, when the EV presented one.
    pub certificate: Option<String>,
}

impl AuthRequest {
    pub fn for_identifier(identifier: UnifiedIdentifier) -> Self {
        Self {
            identifier,
            connector_id: None,
            certificate: None,
        }
    }
}

/// Station-side transport the Remote strategy sends `Authorize` through.
///
/// Implemented by the station's outbound service; the pipeline never owns
/// the station.
#[async_trait]
pub trait RemoteAuthorization: Send + Sync {
    async fn authorize_remote(
        &self,
        identifier: &UnifiedIdentifier,
    ) -> Result<AuthorizationResult, SessionError>;
}

/// Certificate validation contract (external cryptography).
#[async_trait]
pub trait CertificateAuthProvider: Send + Sync {
    /// `None` abstains (chain continues); `Some` is the verdict.
    async fn validate_certificate(&self, certificate: &str) -> Option<AuthorizationResult>;
}

/// Per-call snapshot of the station state a strategy may consult.
pub struct AuthContext<'a> {
    pub version: OcppVersion,
    /// Socket open and usable.
    pub online: bool,
    /// Boot registration accepted by the CSMS.
    pub accepted: bool,
    /// Transactions may proceed on cached/local results while offline.
    pub allow_offline: bool,
    pub local_auth_list_enabled: bool,
    pub auth_cache_enabled: bool,
    pub remote: &'a dyn RemoteAuthorization,
}

#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> u8;

    fn can_handle(&self, request: &AuthRequest, ctx: &AuthContext<'_>) -> bool;

    /// `None` abstains; the dispatcher continues down the chain.
    async fn authorize(
        &self,
        request: &AuthRequest,
        ctx: &AuthContext<'_>,
    ) -> Option<AuthorizationResult>;
}

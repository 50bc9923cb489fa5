//! Cache (priority 20) and Remote (priority 30) strategies

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::cache::AuthorizationCache;
use super::result::{AuthorizationMethod, AuthorizationResult, AuthorizationStatus};
use super::strategy::{
    AuthContext, AuthRequest, AuthStrategy, PRIORITY_CACHE, PRIORITY_REMOTE,
};

pub struct CacheStrategy {
    cache: Arc<AuthorizationCache>,
}

impl CacheStrategy {
    pub fn new(cache: Arc<AuthorizationCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl AuthStrategy for CacheStrategy {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn priority(&self) -> u8 {
        PRIORITY_CACHE
    }

    fn can_handle(&self, request: &AuthRequest, ctx: &AuthContext<'_>) -> bool {
        ctx.auth_cache_enabled && self.cache.get(&request.identifier.value).is_some()
    }

    async fn authorize(
        &self,
        request: &AuthRequest,
        _ctx: &AuthContext<'_>,
    ) -> Option<AuthorizationResult> {
        let cached = self.cache.get(&request.identifier.value)?;
        let mut result = cached;
        result.method = AuthorizationMethod::Cache;
        Some(result)
    }
}

/// Sends an OCPP `Authorize` through the station transport.
pub struct RemoteStrategy;

#[async_trait]
impl AuthStrategy for RemoteStrategy {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn priority(&self) -> u8 {
        PRIORITY_REMOTE
    }

    fn can_handle(&self, _request: &AuthRequest, ctx: &AuthContext<'_>) -> bool {
        // While offline with allow_offline set, abstain so a later strategy
        // (or the Unknown fallback) decides.
        if !ctx.online && ctx.allow_offline {
            return false;
        }
        ctx.accepted || !ctx.allow_offline
    }

    async fn authorize(
        &self,
        request: &AuthRequest,
        ctx: &AuthContext<'_>,
    ) -> Option<AuthorizationResult> {
        if !ctx.online {
            return Some(
                AuthorizationResult::new(AuthorizationStatus::Invalid, AuthorizationMethod::Remote)
                    .offline(),
            );
        }

        match ctx.remote.authorize_remote(&request.identifier).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(
                    identifier = request.identifier.value.as_str(),
                    error = %e,
                    "Remote authorize failed"
                );
                Some(
                    AuthorizationResult::new(
                        AuthorizationStatus::Invalid,
                        AuthorizationMethod::Remote,
                    )
                    .offline(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::strategy::RemoteAuthorization;
    use crate::auth::UnifiedIdentifier;
    use crate::ocpp::OcppVersion;
    use crate::shared::SessionError;

    struct FixedRemote(AuthorizationStatus);

    #[async_trait]
    impl RemoteAuthorization for FixedRemote {
        async fn authorize_remote(
            &self,
            _identifier: &UnifiedIdentifier,
        ) -> Result<AuthorizationResult, SessionError> {
            Ok(AuthorizationResult::new(self.0, AuthorizationMethod::Remote))
        }
    }

    fn ctx<'a>(
        remote: &'a dyn RemoteAuthorization,
        online: bool,
        allow_offline: bool,
    ) -> AuthContext<'a> {
        AuthContext {
            version: OcppVersion::V201,
            online,
            accepted: true,
            allow_offline,
            local_auth_list_enabled: false,
            auth_cache_enabled: true,
            remote,
        }
    }

    #[tokio::test]
    async fn remote_abstains_offline_when_allowed() {
        let remote = FixedRemote(AuthorizationStatus::Accepted);
        let request = AuthRequest::for_identifier(UnifiedIdentifier::central("X"));
        let strategy = RemoteStrategy;
        assert!(!strategy.can_handle(&request, &ctx(&remote, false, true)));
    }

    #[tokio::test]
    async fn remote_rejects_offline_when_not_allowed() {
        let remote = FixedRemote(AuthorizationStatus::Accepted);
        let request = AuthRequest::for_identifier(UnifiedIdentifier::central("X"));
        let strategy = RemoteStrategy;
        let context = ctx(&remote, false, false);
        assert!(strategy.can_handle(&request, &context));
        let result = strategy.authorize(&request, &context).await.unwrap();
        assert_eq!(result.status, AuthorizationStatus::Invalid);
        assert!(result.is_offline);
    }

    #[tokio::test]
    async fn remote_passes_through_online() {
        let remote = FixedRemote(AuthorizationStatus::Blocked);
        let request = AuthRequest::for_identifier(UnifiedIdentifier::central("X"));
        let strategy = RemoteStrategy;
        let result = strategy
            .authorize(&request, &ctx(&remote, true, true))
            .await
            .unwrap();
        assert_eq!(result.status, AuthorizationStatus::Blocked);
    }

    #[tokio::test]
    async fn cache_strategy_hits_and_tags_method() {
        let cache = Arc::new(AuthorizationCache::new(chrono::Duration::minutes(5)));
        cache.put(
            "X",
            AuthorizationResult::accepted(AuthorizationMethod::Remote),
        );
        let strategy = CacheStrategy::new(cache);
        let remote = FixedRemote(AuthorizationStatus::Accepted);
        let request = AuthRequest::for_identifier(UnifiedIdentifier::central("X"));
        let context = ctx(&remote, true, true);
        assert!(strategy.can_handle(&request, &context));
        let result = strategy.authorize(&request, &context).await.unwrap();
        assert_eq!(result.method, AuthorizationMethod::Cache);
    }
}

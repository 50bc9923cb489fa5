//! Authorization pipeline
//!
//! ```text
//! Station ──► AuthorizationPipeline ──► LocalList (10)
//!                                   ──► Cache     (20)
//!                                   ──► Remote    (30) ──► OCPP Authorize
//!                                   ──► Certificate (40)
//! ```
//!
//! Strategies are probed in priority order; the first whose `can_handle`
//! returns true executes, a `None` result abstains to the next one, and when
//! every strategy abstains the answer is `Unknown`.

pub mod adapter;
pub mod cache;
pub mod certificate;
pub mod identifier;
pub mod local_list;
pub mod remote;
pub mod result;
pub mod strategy;

use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

pub use cache::AuthorizationCache;
pub use certificate::CertificateStrategy;
pub use identifier::{is_valid_identifier, IdentifierType, UnifiedIdentifier};
pub use local_list::{LocalAuthorizationList, LocalListEntry, LocalListStrategy};
pub use remote::{CacheStrategy, RemoteStrategy};
pub use result::{AuthorizationMethod, AuthorizationResult, AuthorizationStatus};
pub use strategy::{
    AuthContext, AuthRequest, AuthStrategy, CertificateAuthProvider, RemoteAuthorization,
};

/// Default lifetime of cached authorization results.
const DEFAULT_CACHE_TTL_MINUTES: i64 = 60;

pub struct AuthorizationPipeline {
    strategies: Vec<Arc<dyn AuthStrategy>>,
    cache: Arc<AuthorizationCache>,
    local_list: Arc<LocalAuthorizationList>,
}

impl AuthorizationPipeline {
    pub fn new(certificate_provider: Option<Arc<dyn CertificateAuthProvider>>) -> Self {
        let cache = Arc::new(AuthorizationCache::new(Duration::minutes(
            DEFAULT_CACHE_TTL_MINUTES,
        )));
        let local_list = Arc::new(LocalAuthorizationList::new());

        let mut strategies: Vec<Arc<dyn AuthStrategy>> = vec![
            Arc::new(LocalListStrategy::new(local_list.clone())),
            Arc::new(CacheStrategy::new(cache.clone())),
            Arc::new(RemoteStrategy),
            Arc::new(CertificateStrategy::new(certificate_provider)),
        ];
        strategies.sort_by_key(|s| s.priority());

        Self {
            strategies,
            cache,
            local_list,
        }
    }

    /// Run the chain for `request`; never fails, worst case is `Unknown`.
    pub async fn authorize(
        &self,
        request: &AuthRequest,
        ctx: &AuthContext<'_>,
    ) -> AuthorizationResult {
        for strategy in &self.strategies {
            if !strategy.can_handle(request, ctx) {
                continue;
            }
            debug!(
                strategy = strategy.name(),
                identifier = request.identifier.value.as_str(),
                "Authorization strategy selected"
            );
            if let Some(result) = strategy.authorize(request, ctx).await {
                if result.method == AuthorizationMethod::Remote
                    && ctx.auth_cache_enabled
                    && !result.is_offline
                {
                    self.cache.put(request.identifier.value.clone(), result.clone());
                }
                return result;
            }
        }
        AuthorizationResult::unknown()
    }

    pub fn cache(&self) -> &Arc<AuthorizationCache> {
        &self.cache
    }

    pub fn local_list(&self) -> &Arc<LocalAuthorizationList> {
        &self.local_list
    }

    pub fn invalidate_cache(&self, identifier_value: &str) -> bool {
        self.cache.invalidate(identifier_value)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::ocpp::OcppVersion;
    use crate::shared::SessionError;

    struct FixedRemote(AuthorizationStatus);

    #[async_trait]
    impl RemoteAuthorization for FixedRemote {
        async fn authorize_remote(
            &self,
            _identifier: &UnifiedIdentifier,
        ) -> Result<AuthorizationResult, SessionError> {
            Ok(AuthorizationResult::new(
                self.0,
                AuthorizationMethod::Remote,
            ))
        }
    }

    fn ctx<'a>(remote: &'a dyn RemoteAuthorization, online: bool) -> AuthContext<'a> {
        AuthContext {
            version: OcppVersion::V201,
            online,
            accepted: true,
            allow_offline: true,
            local_auth_list_enabled: true,
            auth_cache_enabled: true,
            remote,
        }
    }

    #[tokio::test]
    async fn local_list_outranks_remote() {
        let pipeline = AuthorizationPipeline::new(None);
        pipeline.local_list().replace(
            1,
            vec![LocalListEntry {
                id_tag: "TAG".into(),
                status: AuthorizationStatus::Blocked,
                expiry: None,
                parent: None,
            }],
        );
        let remote = FixedRemote(AuthorizationStatus::Accepted);
        let request = AuthRequest::for_identifier(UnifiedIdentifier::central("TAG"));

        let result = pipeline.authorize(&request, &ctx(&remote, true)).await;
        assert_eq!(result.status, AuthorizationStatus::Blocked);
        assert_eq!(result.method, AuthorizationMethod::LocalList);
    }

    #[tokio::test]
    async fn remote_result_lands_in_cache() {
        let pipeline = AuthorizationPipeline::new(None);
        let remote = FixedRemote(AuthorizationStatus::Accepted);
        let request = AuthRequest::for_identifier(UnifiedIdentifier::central("NEW"));

        let first = pipeline.authorize(&request, &ctx(&remote, true)).await;
        assert_eq!(first.method, AuthorizationMethod::Remote);

        let second = pipeline.authorize(&request, &ctx(&remote, true)).await;
        assert_eq!(second.method, AuthorizationMethod::Cache);
        assert!(second.is_accepted());
    }

    #[tokio::test]
    async fn all_abstain_yields_unknown() {
        let pipeline = AuthorizationPipeline::new(None);
        let remote = FixedRemote(AuthorizationStatus::Accepted);
        // Offline with allow_offline: remote abstains, nothing else matches.
        let result = pipeline
            .authorize(
                &AuthRequest::for_identifier(UnifiedIdentifier::central("GHOST")),
                &ctx(&remote, false),
            )
            .await;
        assert_eq!(result.status, AuthorizationStatus::Unknown);
    }

    #[tokio::test]
    async fn clear_cache_forgets_results() {
        let pipeline = AuthorizationPipeline::new(None);
        let remote = FixedRemote(AuthorizationStatus::Accepted);
        let request = AuthRequest::for_identifier(UnifiedIdentifier::central("X"));
        pipeline.authorize(&request, &ctx(&remote, true)).await;
        assert_eq!(pipeline.cache().len(), 1);
        pipeline.clear_cache();
        assert!(pipeline.cache().is_empty());
    }
}

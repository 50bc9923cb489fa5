//! Local authorization list strategy (priority 10)
//!
//! The list is the station's copy of the CSMS-managed local authorization
//! list, mutated by SendLocalList and queried by GetLocalListVersion.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::result::{AuthorizationMethod, AuthorizationResult, AuthorizationStatus};
use super::strategy::{AuthContext, AuthRequest, AuthStrategy, PRIORITY_LOCAL_LIST};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalListEntry {
    pub id_tag: String,
    pub status: AuthorizationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Shared storage behind the strategy; the station's SendLocalList handler
/// mutates it through the pipeline.
#[derive(Default)]
pub struct LocalAuthorizationList {
    entries: RwLock<HashMap<String, LocalListEntry>>,
    version: RwLock<i32>,
}

impl LocalAuthorizationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> i32 {
        *self.version.read()
    }

    pub fn get(&self, id_tag: &str) -> Option<LocalListEntry> {
        self.entries.read().get(id_tag).cloned()
    }

    pub fn contains(&self, id_tag: &str) -> bool {
        self.entries.read().contains_key(id_tag)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Replace the whole list (SendLocalList `Full`).
    pub fn replace(&self, version: i32, entries: Vec<LocalListEntry>) {
        let mut map = self.entries.write();
        map.clear();
        for entry in entries {
            map.insert(entry.id_tag.clone(), entry);
        }
        *self.version.write() = version;
    }

    /// Apply a differential update: entries without a status are removals.
    pub fn apply_differential(&self, version: i32, updates: Vec<(String, Option<LocalListEntry>)>) {
        let mut map = self.entries.write();
        for (id_tag, entry) in updates {
            match entry {
                Some(e) => {
                    map.insert(id_tag, e);
                }
                None => {
                    map.remove(&id_tag);
                }
            }
        }
        *self.version.write() = version;
    }
}

pub struct LocalListStrategy {
    list: Arc<LocalAuthorizationList>,
}

impl LocalListStrategy {
    pub fn new(list: Arc<LocalAuthorizationList>) -> Self {
        Self { list }
    }
}

#[async_trait]
impl AuthStrategy for LocalListStrategy {
    fn name(&self) -> &'static str {
        "local-list"
    }

    fn priority(&self) -> u8 {
        PRIORITY_LOCAL_LIST
    }

    fn can_handle(&self, request: &AuthRequest, ctx: &AuthContext<'_>) -> bool {
        ctx.local_auth_list_enabled && self.list.contains(&request.identifier.value)
    }

    async fn authorize(
        &self,
        request: &AuthRequest,
        _ctx: &AuthContext<'_>,
    ) -> Option<AuthorizationResult> {
        let entry = self.list.get(&request.identifier.value)?;

        let status = match entry.expiry {
            Some(expiry) if expiry <= Utc::now() => AuthorizationStatus::Expired,
            _ => entry.status,
        };

        let mut result = AuthorizationResult::new(status, AuthorizationMethod::LocalList);
        result.expiry = entry.expiry;
        result.parent = entry.parent;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::strategy::RemoteAuthorization;
    use crate::auth::UnifiedIdentifier;
    use crate::ocpp::OcppVersion;
    use crate::shared::SessionError;

    struct NoRemote;

    #[async_trait]
    impl RemoteAuthorization for NoRemote {
        async fn authorize_remote(
            &self,
            _identifier: &UnifiedIdentifier,
        ) -> Result<AuthorizationResult, SessionError> {
            Err(SessionError::Offline)
        }
    }

    fn ctx(remote: &NoRemote) -> AuthContext<'_> {
        AuthContext {
            version: OcppVersion::V16,
            online: true,
            accepted: true,
            allow_offline: false,
            local_auth_list_enabled: true,
            auth_cache_enabled: false,
            remote,
        }
    }

    fn entry(id: &str, status: AuthorizationStatus) -> LocalListEntry {
        LocalListEntry {
            id_tag: id.to_string(),
            status,
            expiry: None,
            parent: None,
        }
    }

    #[tokio::test]
    async fn returns_list_entry_status() {
        let list = Arc::new(LocalAuthorizationList::new());
        list.replace(1, vec![entry("OK", AuthorizationStatus::Accepted)]);
        let strategy = LocalListStrategy::new(list);

        let remote = NoRemote;
        let request = AuthRequest::for_identifier(UnifiedIdentifier::id_tag("OK"));
        assert!(strategy.can_handle(&request, &ctx(&remote)));
        let result = strategy.authorize(&request, &ctx(&remote)).await.unwrap();
        assert!(result.is_accepted());
        assert_eq!(result.method, AuthorizationMethod::LocalList);
    }

    #[tokio::test]
    async fn expired_entry_reports_expired() {
        let list = Arc::new(LocalAuthorizationList::new());
        let mut e = entry("OLD", AuthorizationStatus::Accepted);
        e.expiry = Some(Utc::now() - chrono::Duration::hours(1));
        list.replace(1, vec![e]);
        let strategy = LocalListStrategy::new(list);

        let remote = NoRemote;
        let request = AuthRequest::for_identifier(UnifiedIdentifier::id_tag("OLD"));
        let result = strategy.authorize(&request, &ctx(&remote)).await.unwrap();
        assert_eq!(result.status, AuthorizationStatus::Expired);
    }

    #[test]
    fn differential_update_inserts_and_removes() {
        let list = LocalAuthorizationList::new();
        list.replace(
            3,
            vec![
                entry("A", AuthorizationStatus::Accepted),
                entry("B", AuthorizationStatus::Blocked),
            ],
        );

        list.apply_differential(
            4,
            vec![
                ("A".to_string(), None),
                ("C".to_string(), Some(entry("C", AuthorizationStatus::Accepted))),
            ],
        );

        assert_eq!(list.version(), 4);
        assert!(!list.contains("A"));
        assert!(list.contains("B"));
        assert!(list.contains("C"));
    }

    #[test]
    fn disabled_list_never_handles() {
        let list = Arc::new(LocalAuthorizationList::new());
        list.replace(1, vec![entry("OK", AuthorizationStatus::Accepted)]);
        let strategy = LocalListStrategy::new(list);

        let remote = NoRemote;
        let mut context = ctx(&remote);
        context.local_auth_list_enabled = false;
        let request = AuthRequest::for_identifier(UnifiedIdentifier::id_tag("OK"));
        assert!(!strategy.can_handle(&request, &context));
    }
}

//! OCPP 1.6 authorization adapter
//!
//! Translates between the unified identifier/result model and the 1.6
//! idTag / IdTagInfo wire types.

use rust_ocpp::v1_6::types::{AuthorizationStatus as WireStatus, IdTagInfo};

use crate::auth::result::{AuthorizationMethod, AuthorizationResult, AuthorizationStatus};
use crate::auth::UnifiedIdentifier;

/// The 1.6 idTag is the identifier value, truncated to the wire limit.
pub fn to_id_tag(identifier: &UnifiedIdentifier) -> String {
    identifier.value.chars().take(20).collect()
}

pub fn status_to_unified(status: WireStatus) -> AuthorizationStatus {
    match status {
        WireStatus::Accepted => AuthorizationStatus::Accepted,
        WireStatus::Blocked => AuthorizationStatus::Blocked,
        WireStatus::Expired => AuthorizationStatus::Expired,
        WireStatus::Invalid => AuthorizationStatus::Invalid,
        WireStatus::ConcurrentTx => AuthorizationStatus::ConcurrentTx,
    }
}

/// 2.0.1-only statuses collapse to `Invalid` on the 1.6 wire.
pub fn status_to_wire(status: AuthorizationStatus) -> WireStatus {
    match status {
        AuthorizationStatus::Accepted => WireStatus::Accepted,
        AuthorizationStatus::Blocked => WireStatus::Blocked,
        AuthorizationStatus::Expired => WireStatus::Expired,
        AuthorizationStatus::ConcurrentTx => WireStatus::ConcurrentTx,
        _ => WireStatus::Invalid,
    }
}

pub fn result_from_id_tag_info(info: IdTagInfo) -> AuthorizationResult {
    let mut result = AuthorizationResult::new(
        status_to_unified(info.status),
        AuthorizationMethod::Remote,
    );
    result.expiry = info.expiry_date;
    result.parent = info.parent_id_tag;
    // An expiry from the CSMS bounds the cache entry lifetime.
    result.cache_ttl = info
        .expiry_date
        .map(|expiry| expiry - chrono::Utc::now())
        .filter(|ttl| *ttl > chrono::Duration::zero());
    result
}

pub fn id_tag_info_from_result(result: &AuthorizationResult) -> IdTagInfo {
    IdTagInfo {
        status: status_to_wire(result.status),
        expiry_date: result.expiry,
        parent_id_tag: result.parent.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip_for_shared_statuses() {
        for status in [
            AuthorizationStatus::Accepted,
            AuthorizationStatus::Blocked,
            AuthorizationStatus::Expired,
            AuthorizationStatus::ConcurrentTx,
        ] {
            assert_eq!(status_to_unified(status_to_wire(status)), status);
        }
    }

    #[test]
    fn v201_only_statuses_collapse_to_invalid() {
        assert_eq!(
            status_to_wire(AuthorizationStatus::NoCredit),
            WireStatus::Invalid
        );
        assert_eq!(
            status_to_wire(AuthorizationStatus::Unknown),
            WireStatus::Invalid
        );
    }

    #[test]
    fn id_tag_is_capped_at_20_chars() {
        let identifier = UnifiedIdentifier::id_tag("ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert_eq!(to_id_tag(&identifier).len(), 20);
    }
}

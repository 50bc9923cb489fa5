//! OCPP 2.0.1 authorization adapter
//!
//! Maps the unified identifier model onto IdTokenType / IdTokenInfoType and
//! back.

use rust_ocpp::v2_0_1::datatypes::id_token_info_type::IdTokenInfoType;
use rust_ocpp::v2_0_1::datatypes::id_token_type::IdTokenType;
use rust_ocpp::v2_0_1::enumerations::authorization_status_enum_type::AuthorizationStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::id_token_enum_type::IdTokenEnumType;

use crate::auth::identifier::{IdentifierType, UnifiedIdentifier};
use crate::auth::result::{AuthorizationMethod, AuthorizationResult, AuthorizationStatus};

pub fn token_kind(kind: IdentifierType) -> IdTokenEnumType {
    match kind {
        IdentifierType::Central => IdTokenEnumType::Central,
        IdentifierType::Local | IdentifierType::IdTag => IdTokenEnumType::Local,
        IdentifierType::Iso14443 => IdTokenEnumType::ISO14443,
        IdentifierType::Iso15693 => IdTokenEnumType::ISO15693,
        IdentifierType::KeyCode => IdTokenEnumType::KeyCode,
        IdentifierType::EMaid => IdTokenEnumType::EMAID,
        IdentifierType::MacAddress => IdTokenEnumType::MacAddress,
        IdentifierType::NoAuthorization => IdTokenEnumType::NoAuthorization,
    }
}

pub fn identifier_kind(kind: &IdTokenEnumType) -> IdentifierType {
    match kind {
        IdTokenEnumType::Central => IdentifierType::Central,
        IdTokenEnumType::Local => IdentifierType::Local,
        IdTokenEnumType::ISO14443 => IdentifierType::Iso14443,
        IdTokenEnumType::ISO15693 => IdentifierType::Iso15693,
        IdTokenEnumType::KeyCode => IdentifierType::KeyCode,
        IdTokenEnumType::EMAID => IdentifierType::EMaid,
        IdTokenEnumType::MacAddress => IdentifierType::MacAddress,
        IdTokenEnumType::NoAuthorization => IdentifierType::NoAuthorization,
    }
}

pub fn to_id_token(identifier: &UnifiedIdentifier) -> IdTokenType {
    IdTokenType {
        id_token: identifier.value.chars().take(36).collect(),
        kind: token_kind(identifier.kind),
        additional_info: None,
    }
}

pub fn from_id_token(token: &IdTokenType) -> UnifiedIdentifier {
    UnifiedIdentifier::new(identifier_kind(&token.kind), token.id_token.clone())
        .with_version(crate::ocpp::OcppVersion::V201)
}

pub fn status_to_unified(status: AuthorizationStatusEnumType) -> AuthorizationStatus {
    match status {
        AuthorizationStatusEnumType::Accepted => AuthorizationStatus::Accepted,
        AuthorizationStatusEnumType::Blocked => AuthorizationStatus::Blocked,
        AuthorizationStatusEnumType::ConcurrentTx => AuthorizationStatus::ConcurrentTx,
        AuthorizationStatusEnumType::Expired => AuthorizationStatus::Expired,
        AuthorizationStatusEnumType::Invalid => AuthorizationStatus::Invalid,
        AuthorizationStatusEnumType::NoCredit => AuthorizationStatus::NoCredit,
        AuthorizationStatusEnumType::NotAllowedTypeEVSE => {
            AuthorizationStatus::NotAllowedTypeEvse
        }
        AuthorizationStatusEnumType::NotAtThisLocation => AuthorizationStatus::NotAtThisLocation,
        AuthorizationStatusEnumType::NotAtThisTime => AuthorizationStatus::NotAtThisTime,
        AuthorizationStatusEnumType::Unknown => AuthorizationStatus::Unknown,
    }
}

pub fn status_to_wire(status: AuthorizationStatus) -> AuthorizationStatusEnumType {
    match status {
        AuthorizationStatus::Accepted => AuthorizationStatusEnumType::Accepted,
        AuthorizationStatus::Blocked => AuthorizationStatusEnumType::Blocked,
        AuthorizationStatus::ConcurrentTx => AuthorizationStatusEnumType::ConcurrentTx,
        AuthorizationStatus::Expired => AuthorizationStatusEnumType::Expired,
        AuthorizationStatus::Invalid => AuthorizationStatusEnumType::Invalid,
        AuthorizationStatus::NoCredit => AuthorizationStatusEnumType::NoCredit,
        AuthorizationStatus::NotAllowedTypeEvse => {
            AuthorizationStatusEnumType::NotAllowedTypeEVSE
        }
        AuthorizationStatus::NotAtThisLocation => AuthorizationStatusEnumType::NotAtThisLocation,
        AuthorizationStatus::NotAtThisTime => AuthorizationStatusEnumType::NotAtThisTime,
        AuthorizationStatus::Unknown => AuthorizationStatusEnumType::Unknown,
    }
}

pub fn result_from_token_info(info: IdTokenInfoType) -> AuthorizationResult {
    let mut result = AuthorizationResult::new(
        status_to_unified(info.status),
        AuthorizationMethod::Remote,
    );
    result.expiry = info.cache_expiry_date_time;
    result.parent = info.group_id_token.map(|t| t.id_token);
    // cacheExpiryDateTime bounds the cache entry lifetime.
    result.cache_ttl = info
        .cache_expiry_date_time
        .map(|expiry| expiry - chrono::Utc::now())
        .filter(|ttl| *ttl > chrono::Duration::zero());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_kind_mapping() {
        assert_eq!(
            token_kind(IdentifierType::Central),
            IdTokenEnumType::Central
        );
        assert_eq!(token_kind(IdentifierType::IdTag), IdTokenEnumType::Local);
        assert_eq!(token_kind(IdentifierType::Local), IdTokenEnumType::Local);
    }

    #[test]
    fn status_roundtrip() {
        for status in [
            AuthorizationStatus::Accepted,
            AuthorizationStatus::NoCredit,
            AuthorizationStatus::NotAllowedTypeEvse,
            AuthorizationStatus::Unknown,
        ] {
            assert_eq!(status_to_unified(status_to_wire(status)), status);
        }
    }

    #[test]
    fn id_token_is_capped_at_36_chars() {
        let identifier = UnifiedIdentifier::central("A".repeat(40));
        assert_eq!(to_id_token(&identifier).id_token.len(), 36);
    }
}

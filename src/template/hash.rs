//! Template hashing and station identities
//!
//! Templates are content-hashed with SHA-256; a station's stable `hash_id`
//! is derived from the template hash, the instance index and the base name,
//! so restarts reuse the same identity and persisted configuration.

use sha2::{Digest, Sha256};

/// Hex SHA-256 over the raw template content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stable station identity, 32 hex chars.
pub fn station_hash_id(template_hash: &str, index: u32, base_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template_hash.as_bytes());
    hasher.update(index.to_be_bytes());
    hasher.update(base_name.as_bytes());
    hex::encode(hasher.finalize())[..32].to_string()
}

/// Display name for the `index`-th station stamped from a template.
pub fn station_name(base_name: &str, index: u32) -> String {
    format!("{base_name}-{index:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_and_sensitive() {
        let a = content_hash("{\"baseName\":\"CS\"}");
        let b = content_hash("{\"baseName\":\"CS\"}");
        let c = content_hash("{\"baseName\":\"CS2\"}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_id_distinguishes_instances() {
        let template_hash = content_hash("{}");
        let first = station_hash_id(&template_hash, 1, "CS");
        let second = station_hash_id(&template_hash, 2, "CS");
        assert_ne!(first, second);
        assert_eq!(first.len(), 32);
        // Same inputs, same identity.
        assert_eq!(first, station_hash_id(&template_hash, 1, "CS"));
    }

    #[test]
    fn station_names_are_zero_padded() {
        assert_eq!(station_name("CS-TEST", 7), "CS-TEST-000007");
    }
}

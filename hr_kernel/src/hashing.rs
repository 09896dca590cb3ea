/// Canonical hashing.
///
/// Deterministic serialization + SHA-256, used to fingerprint a locked
/// hierarchy and to verify snapshots.
///
/// Rules:
///   - Levels keep their configured order (the order is part of the shape)
///   - Structure entries sorted by level (BTreeMap order)
///   - Chains keep chronological order
///   - UTF-8 JSON, no whitespace
///   - `version` is excluded: it counts writes, it is not part of the shape

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::{EmployeeEventRecord, HierarchyConfig};
use crate::KERNEL_VERSION;

pub fn canonical_config_bytes(config: &HierarchyConfig) -> Vec<u8> {
    let mut structure = Map::new();
    for (level, parent) in &config.structure {
        structure.insert(
            level.clone(),
            parent.clone().map(Value::String).unwrap_or(Value::Null),
        );
    }

    let mut root = Map::new();
    root.insert("kernel_version".to_string(), Value::from(KERNEL_VERSION));
    root.insert(
        "tenant_id".to_string(),
        Value::String(config.tenant_id.to_string()),
    );
    root.insert(
        "levels".to_string(),
        Value::Array(config.levels.iter().cloned().map(Value::String).collect()),
    );
    root.insert("structure".to_string(), Value::Object(structure));
    root.insert("use_grades".to_string(), Value::Bool(config.use_grades));
    root.insert("use_titles".to_string(), Value::Bool(config.use_titles));
    root.insert("locked".to_string(), Value::Bool(config.locked));

    Value::Object(root).to_string().into_bytes()
}

/// SHA-256 of the canonical config bytes. Lowercase hex.
pub fn config_fingerprint(config: &HierarchyConfig) -> String {
    hex_sha256(&canonical_config_bytes(config))
}

/// SHA-256 over a chain, record by record.
pub fn chain_fingerprint(chain: &[EmployeeEventRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in chain {
        let mut entry = Map::new();
        entry.insert("id".to_string(), Value::String(record.id.to_string()));
        entry.insert("valid_from".to_string(), Value::String(record.valid_from.to_string()));
        entry.insert(
            "valid_to".to_string(),
            record
                .valid_to
                .map(|d| Value::String(d.to_string()))
                .unwrap_or(Value::Null),
        );
        entry.insert("payload".to_string(), record.payload.clone());
        hasher.update(Value::Object(entry).to_string().as_bytes());
        hasher.update(b"\n");
    }
    to_hex(&hasher.finalize())
}

pub fn hex_sha256(bytes: &[u8]) -> String {
    to_hex(&Sha256::digest(bytes))
}

fn to_hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TenantId;
    use crate::state::create_default_config;

    #[test]
    fn test_fingerprint_ignores_version() {
        let a = create_default_config(TenantId::new("t-1").unwrap());
        let mut b = a.clone();
        b.version = 9;
        assert_eq!(config_fingerprint(&a), config_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_tracks_shape() {
        let a = create_default_config(TenantId::new("t-1").unwrap());
        let mut b = a.clone();
        b.levels.reverse();
        assert_ne!(config_fingerprint(&a), config_fingerprint(&b));

        let mut c = a.clone();
        c.structure.insert("Department".to_string(), None);
        assert_ne!(config_fingerprint(&a), config_fingerprint(&c));
    }

    #[test]
    fn test_canonical_bytes_are_compact_and_ordered() {
        let config = create_default_config(TenantId::new("t-1").unwrap());
        let json = String::from_utf8(canonical_config_bytes(&config)).unwrap();
        assert!(json.starts_with("{\"kernel_version\":1,\"tenant_id\":\"t-1\""));
        assert!(!json.contains(' '));
        assert!(json.contains("\"structure\":{\"Department\":\"Wing\",\"Wing\":null}"));
    }

    #[test]
    fn test_fingerprint_is_lowercase_hex() {
        let config = create_default_config(TenantId::new("t-1").unwrap());
        let fp = config_fingerprint(&config);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(chain_fingerprint(&[]).len(), 64);
    }
}

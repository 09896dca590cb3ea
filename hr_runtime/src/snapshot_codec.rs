//! Snapshot codec: deterministic whole-core encoder/decoder.
//!
//! - `encode_snapshot`:  CoreSnapshot → compact JSON string
//! - `decode_snapshot`:  JSON string → CoreSnapshot (strict, no defaults)
//! - `restore_snapshot`: decode + invariant validation
//! - `export_snapshot_to_file` / `import_snapshot_from_file`: JSON file plus
//!   a `.sha256` sidecar, verified on import
//! - `snapshot_hash`:    SHA-256 of the JSON encoding (lowercase hex)
//!
//! Collections are ordered by the caller (tenant, unit number, employee and
//! code) so identical states encode to identical bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hr_kernel::domain::{CancelledEventRecord, EmployeeEventRecord, HierarchyConfig, OrgUnit};
use hr_kernel::error::{CoreError, Result as CoreResult};
use hr_kernel::hashing::hex_sha256;
use hr_kernel::ids::{EmployeeId, TenantId};
use hr_kernel::invariants::{validate_chain, validate_config};
use hr_kernel::units::{check_placement, normalize_unit_name, validate_validity};
use hr_kernel::KERNEL_VERSION;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("snapshot deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
    #[error("snapshot invariant violation: {0}")]
    InvariantViolation(#[source] CoreError),
    #[error("snapshot hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },
    #[error("snapshot io: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainSnapshot {
    pub employee_id: EmployeeId,
    pub event_code: String,
    pub records: Vec<EmployeeEventRecord>,
    pub cancelled: Vec<CancelledEventRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreSnapshot {
    pub kernel_version: u32,
    /// Last journal sequence folded into this snapshot.
    pub journal_sequence: u64,
    pub hierarchies: Vec<HierarchyConfig>,
    pub units: Vec<OrgUnit>,
    pub chains: Vec<ChainSnapshot>,
}

// ---------------------------------------------------------------------------
// Encoder / decoder
// ---------------------------------------------------------------------------

pub fn encode_snapshot(snapshot: &CoreSnapshot) -> Result<String, SnapshotError> {
    serde_json::to_string(snapshot).map_err(SnapshotError::Serialization)
}

/// Strict decode: unknown fields and missing fields both fail. No invariant
/// checks; use `restore_snapshot` for that.
pub fn decode_snapshot(json: &str) -> Result<CoreSnapshot, SnapshotError> {
    serde_json::from_str(json).map_err(SnapshotError::Deserialization)
}

pub fn restore_snapshot(json: &str) -> Result<CoreSnapshot, SnapshotError> {
    let snapshot = decode_snapshot(json)?;
    validate_snapshot(&snapshot).map_err(SnapshotError::InvariantViolation)?;
    Ok(snapshot)
}

pub fn snapshot_hash(snapshot: &CoreSnapshot) -> Result<String, SnapshotError> {
    Ok(hex_sha256(encode_snapshot(snapshot)?.as_bytes()))
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

pub fn hash_sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Write the snapshot and its hash sidecar. Returns the hash.
pub fn export_snapshot_to_file(snapshot: &CoreSnapshot, path: &Path) -> Result<String, SnapshotError> {
    let json = encode_snapshot(snapshot)?;
    let hash = hex_sha256(json.as_bytes());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json.as_bytes())?;
    fs::write(hash_sidecar_path(path), hash.as_bytes())?;
    Ok(hash)
}

/// Read, verify the sidecar hash, decode and validate.
pub fn import_snapshot_from_file(path: &Path) -> Result<CoreSnapshot, SnapshotError> {
    let json = fs::read_to_string(path)?;
    let expected = fs::read_to_string(hash_sidecar_path(path))?.trim().to_string();
    let actual = hex_sha256(json.as_bytes());
    if actual != expected {
        return Err(SnapshotError::HashMismatch { expected, actual });
    }
    restore_snapshot(&json)
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

pub fn validate_snapshot(snapshot: &CoreSnapshot) -> CoreResult<()> {
    if snapshot.kernel_version != KERNEL_VERSION {
        return Err(CoreError::validation(
            "kernel_version",
            format!("expected {}, found {}", KERNEL_VERSION, snapshot.kernel_version),
        ));
    }

    let mut configs: BTreeMap<&TenantId, &HierarchyConfig> = BTreeMap::new();
    for config in &snapshot.hierarchies {
        validate_config(config)?;
        if configs.insert(&config.tenant_id, config).is_some() {
            return Err(CoreError::state_conflict(format!(
                "tenant {} appears twice",
                config.tenant_id
            )));
        }
    }

    check_units(snapshot, &configs)?;

    let mut keys = BTreeSet::new();
    for chain in &snapshot.chains {
        check_chain(chain)?;
        if !keys.insert((&chain.employee_id, &chain.event_code)) {
            return Err(CoreError::state_conflict(format!(
                "chain {}/{} appears twice",
                chain.employee_id, chain.event_code
            )));
        }
    }
    Ok(())
}

fn check_units(snapshot: &CoreSnapshot, configs: &BTreeMap<&TenantId, &HierarchyConfig>) -> CoreResult<()> {
    let by_id: BTreeMap<_, &OrgUnit> = snapshot.units.iter().map(|u| (u.id, u)).collect();
    if by_id.len() != snapshot.units.len() {
        return Err(CoreError::state_conflict("duplicate org unit id"));
    }

    let mut numbers = BTreeSet::new();
    for unit in &snapshot.units {
        let config = configs
            .get(&unit.tenant_id)
            .ok_or_else(|| CoreError::not_found("tenant", &unit.tenant_id))?;
        let parent = match unit.parent_id {
            Some(id) => Some(
                *by_id
                    .get(&id)
                    .ok_or_else(|| CoreError::not_found("org unit", id))?,
            ),
            None => None,
        };
        check_placement(config, &unit.unit_type, parent)?;
        if normalize_unit_name(&unit.name)? != unit.name {
            return Err(CoreError::validation("name", "not normalized"));
        }
        validate_validity(unit.effective_from, unit.expiry_date)?;
        if !numbers.insert((&unit.tenant_id, &unit.unit_number)) {
            return Err(CoreError::state_conflict(format!(
                "unit number {} reused in tenant {}",
                unit.unit_number, unit.tenant_id
            )));
        }
    }
    Ok(())
}

fn check_chain(chain: &ChainSnapshot) -> CoreResult<()> {
    validate_chain(&chain.records)?;
    let foreign = chain
        .records
        .iter()
        .chain(chain.cancelled.iter().map(|c| &c.record))
        .any(|r| r.employee_id != chain.employee_id || r.event_code != chain.event_code);
    if foreign {
        return Err(CoreError::validation(
            "chain",
            format!("record outside chain {}/{}", chain.employee_id, chain.event_code),
        ));
    }
    Ok(())
}

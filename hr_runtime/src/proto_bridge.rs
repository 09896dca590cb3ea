//! Proto ↔ domain conversion bridge.
//!
//! Encoding never fails. Decoding checks every id, date and payload and
//! reports the first bad field; it does not run domain validation, which
//! replay does through the kernel.

use std::str::FromStr;

use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use hr_kernel::domain::{EmployeeEventRecord, HierarchyConfig, OrgUnit, Structure};
use hr_kernel::ids::{EmployeeId, TenantId, UserId};

use crate::error::JournalError;
use crate::journal::JournalEntry;
use crate::proto_types::*;

type DecodeResult<T> = std::result::Result<T, JournalError>;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

pub fn entry_to_proto(entry: &JournalEntry) -> ProtoJournalEntry {
    let kind = match entry {
        JournalEntry::TenantRegistered { tenant_id } => {
            EntryKind::TenantRegistered(TenantRegistered {
                tenant_id: tenant_id.to_string(),
            })
        }
        JournalEntry::DraftSaved(config) => EntryKind::DraftSaved(DraftSaved {
            hierarchy: Some(hierarchy_to_proto(config)),
        }),
        JournalEntry::HierarchyCommitted {
            config,
            fingerprint,
        } => EntryKind::HierarchyCommitted(HierarchyCommitted {
            hierarchy: Some(hierarchy_to_proto(config)),
            fingerprint: fingerprint.clone(),
        }),
        JournalEntry::UnitCreated(unit) => EntryKind::UnitCreated(UnitCreated {
            unit: Some(unit_to_proto(unit)),
        }),
        JournalEntry::UnitUpdated(unit) => EntryKind::UnitUpdated(UnitUpdated {
            unit: Some(unit_to_proto(unit)),
        }),
        JournalEntry::EventRecorded {
            record,
            idempotency_key,
        } => EntryKind::EventRecorded(EventRecorded {
            record: Some(record_to_proto(record)),
            idempotency_key: idempotency_key.clone(),
        }),
        JournalEntry::EventCancelled {
            employee_id,
            event_code,
            record_id,
        } => EntryKind::EventCancelled(EventCancelled {
            employee_id: employee_id.to_string(),
            event_code: event_code.clone(),
            record_id: record_id.to_string(),
        }),
    };
    ProtoJournalEntry { kind: Some(kind) }
}

pub fn proto_to_entry(proto: &ProtoJournalEntry) -> DecodeResult<JournalEntry> {
    let kind = proto
        .kind
        .as_ref()
        .ok_or_else(|| JournalError::malformed("entry", "no entry kind"))?;

    let entry = match kind {
        EntryKind::TenantRegistered(e) => JournalEntry::TenantRegistered {
            tenant_id: parse_tenant(&e.tenant_id)?,
        },
        EntryKind::DraftSaved(e) => JournalEntry::DraftSaved(proto_to_hierarchy(required(
            e.hierarchy.as_ref(),
            "draft_saved.hierarchy",
        )?)?),
        EntryKind::HierarchyCommitted(e) => JournalEntry::HierarchyCommitted {
            config: proto_to_hierarchy(required(
                e.hierarchy.as_ref(),
                "hierarchy_committed.hierarchy",
            )?)?,
            fingerprint: e.fingerprint.clone(),
        },
        EntryKind::UnitCreated(e) => JournalEntry::UnitCreated(proto_to_unit(required(
            e.unit.as_ref(),
            "unit_created.unit",
        )?)?),
        EntryKind::UnitUpdated(e) => JournalEntry::UnitUpdated(proto_to_unit(required(
            e.unit.as_ref(),
            "unit_updated.unit",
        )?)?),
        EntryKind::EventRecorded(e) => JournalEntry::EventRecorded {
            record: proto_to_record(required(e.record.as_ref(), "event_recorded.record")?)?,
            idempotency_key: e.idempotency_key.clone(),
        },
        EntryKind::EventCancelled(e) => JournalEntry::EventCancelled {
            employee_id: parse_employee(&e.employee_id)?,
            event_code: e.event_code.clone(),
            record_id: parse_uuid(&e.record_id, "event_cancelled.record_id")?,
        },
    };
    Ok(entry)
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

pub fn hierarchy_to_proto(config: &HierarchyConfig) -> ProtoHierarchy {
    ProtoHierarchy {
        tenant_id: config.tenant_id.to_string(),
        levels: config.levels.clone(),
        structure: config
            .structure
            .iter()
            .map(|(level, parent)| ProtoLevelEdge {
                level: level.clone(),
                parent: parent.clone(),
            })
            .collect(),
        use_grades: config.use_grades,
        use_titles: config.use_titles,
        locked: config.locked,
        version: config.version,
    }
}

pub fn proto_to_hierarchy(proto: &ProtoHierarchy) -> DecodeResult<HierarchyConfig> {
    let mut structure = Structure::new();
    for edge in &proto.structure {
        if structure
            .insert(edge.level.clone(), edge.parent.clone())
            .is_some()
        {
            return Err(JournalError::malformed(
                "hierarchy.structure",
                format!("level {:?} listed twice", edge.level),
            ));
        }
    }
    Ok(HierarchyConfig {
        tenant_id: parse_tenant(&proto.tenant_id)?,
        levels: proto.levels.clone(),
        structure,
        use_grades: proto.use_grades,
        use_titles: proto.use_titles,
        locked: proto.locked,
        version: proto.version,
    })
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

pub fn unit_to_proto(unit: &OrgUnit) -> ProtoOrgUnit {
    ProtoOrgUnit {
        id: unit.id.to_string(),
        tenant_id: unit.tenant_id.to_string(),
        parent_id: unit.parent_id.map(|id| id.to_string()),
        unit_type: unit.unit_type.clone(),
        unit_number: unit.unit_number.clone(),
        name: unit.name.clone(),
        manager_id: unit.manager_id.as_ref().map(|id| id.to_string()),
        effective_from: unit.effective_from.to_string(),
        expiry_date: unit.expiry_date.map(|d| d.to_string()),
    }
}

pub fn proto_to_unit(proto: &ProtoOrgUnit) -> DecodeResult<OrgUnit> {
    Ok(OrgUnit {
        id: parse_uuid(&proto.id, "unit.id")?,
        tenant_id: parse_tenant(&proto.tenant_id)?,
        parent_id: proto
            .parent_id
            .as_deref()
            .map(|raw| parse_uuid(raw, "unit.parent_id"))
            .transpose()?,
        unit_type: proto.unit_type.clone(),
        unit_number: proto.unit_number.clone(),
        name: proto.name.clone(),
        manager_id: proto
            .manager_id
            .as_deref()
            .map(parse_employee)
            .transpose()?,
        effective_from: parse_date(&proto.effective_from, "unit.effective_from")?,
        expiry_date: proto
            .expiry_date
            .as_deref()
            .map(|raw| parse_date(raw, "unit.expiry_date"))
            .transpose()?,
    })
}

// ---------------------------------------------------------------------------
// Event records
// ---------------------------------------------------------------------------

pub fn record_to_proto(record: &EmployeeEventRecord) -> ProtoEventRecord {
    ProtoEventRecord {
        id: record.id.to_string(),
        employee_id: record.employee_id.to_string(),
        event_code: record.event_code.clone(),
        valid_from: record.valid_from.to_string(),
        payload_json: record.payload.to_string(),
        recorded_by: record.recorded_by.as_ref().map(|u| u.to_string()),
    }
}

/// Decoded records are always active; `valid_to` is derived on replay.
pub fn proto_to_record(proto: &ProtoEventRecord) -> DecodeResult<EmployeeEventRecord> {
    let payload: Value = serde_json::from_str(&proto.payload_json)
        .map_err(|e| JournalError::malformed("record.payload_json", e))?;
    Ok(EmployeeEventRecord {
        id: parse_uuid(&proto.id, "record.id")?,
        employee_id: parse_employee(&proto.employee_id)?,
        event_code: proto.event_code.clone(),
        valid_from: parse_date(&proto.valid_from, "record.valid_from")?,
        valid_to: None,
        payload,
        recorded_by: proto
            .recorded_by
            .as_deref()
            .map(|raw| UserId::new(raw).map_err(|e| JournalError::malformed("record.recorded_by", e)))
            .transpose()?,
    })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn required<'a, T>(value: Option<&'a T>, field: &'static str) -> DecodeResult<&'a T> {
    value.ok_or_else(|| JournalError::malformed(field, "missing"))
}

fn parse_uuid(raw: &str, field: &'static str) -> DecodeResult<Uuid> {
    Uuid::from_str(raw).map_err(|e| JournalError::malformed(field, e))
}

fn parse_date(raw: &str, field: &'static str) -> DecodeResult<NaiveDate> {
    NaiveDate::from_str(raw).map_err(|e| JournalError::malformed(field, e))
}

fn parse_tenant(raw: &str) -> DecodeResult<TenantId> {
    TenantId::new(raw).map_err(|e| JournalError::malformed("tenant_id", e))
}

fn parse_employee(raw: &str) -> DecodeResult<EmployeeId> {
    EmployeeId::new(raw).map_err(|e| JournalError::malformed("employee_id", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hr_kernel::state::create_default_config;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_unit_optional_fields_survive() {
        let unit = OrgUnit {
            id: Uuid::new_v4(),
            tenant_id: TenantId::new("t-1").unwrap(),
            parent_id: None,
            unit_type: "Wing".to_string(),
            unit_number: "001".to_string(),
            name: "North".to_string(),
            manager_id: Some(EmployeeId::new("e-7").unwrap()),
            effective_from: date(2024, 1, 1),
            expiry_date: None,
        };
        let back = proto_to_unit(&unit_to_proto(&unit)).unwrap();
        assert_eq!(back, unit);
        assert!(unit_to_proto(&unit).parent_id.is_none());
    }

    #[test]
    fn test_record_payload_travels_as_json_text() {
        let record = EmployeeEventRecord {
            id: Uuid::new_v4(),
            employee_id: EmployeeId::new("e-1").unwrap(),
            event_code: "218".to_string(),
            valid_from: date(2024, 3, 1),
            valid_to: None,
            payload: json!({"city_name": "Haifa", "street": null}),
            recorded_by: Some(UserId::new("u-1").unwrap()),
        };
        let proto = record_to_proto(&record);
        assert_eq!(proto.payload_json, r#"{"city_name":"Haifa","street":null}"#);
        assert_eq!(proto_to_record(&proto).unwrap(), record);
    }

    #[test]
    fn test_bad_fields_are_reported_by_name() {
        let mut proto = record_to_proto(&EmployeeEventRecord {
            id: Uuid::new_v4(),
            employee_id: EmployeeId::new("e-1").unwrap(),
            event_code: "203".to_string(),
            valid_from: date(2024, 3, 1),
            valid_to: None,
            payload: json!({}),
            recorded_by: None,
        });
        proto.valid_from = "2024-13-40".to_string();
        let err = proto_to_record(&proto).unwrap_err();
        assert!(err.to_string().contains("record.valid_from"));

        let err = proto_to_entry(&ProtoJournalEntry { kind: None }).unwrap_err();
        assert!(err.to_string().contains("no entry kind"));
    }

    #[test]
    fn test_duplicate_structure_edge_rejected() {
        let config = create_default_config(TenantId::new("t-1").unwrap());
        let mut proto = hierarchy_to_proto(&config);
        proto.structure.push(ProtoLevelEdge {
            level: "Wing".to_string(),
            parent: None,
        });
        assert!(proto_to_hierarchy(&proto).is_err());
    }
}

//! Hand-written protobuf types for the journal.
//!
//! Uses prost derive macros for encode/decode without prost-build. Field
//! numbers are the wire contract: never reuse or renumber a tag.
//!
//! Dates travel as ISO `YYYY-MM-DD` strings, ids as strings, event payloads
//! as compact JSON text.

use prost::Message;

// ── Frame ──────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoJournalFrame {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(message, optional, tag = "2")]
    pub entry: Option<ProtoJournalEntry>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoJournalEntry {
    #[prost(oneof = "EntryKind", tags = "1, 2, 3, 4, 5, 6, 7")]
    pub kind: Option<EntryKind>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum EntryKind {
    #[prost(message, tag = "1")]
    TenantRegistered(TenantRegistered),
    #[prost(message, tag = "2")]
    DraftSaved(DraftSaved),
    #[prost(message, tag = "3")]
    HierarchyCommitted(HierarchyCommitted),
    #[prost(message, tag = "4")]
    UnitCreated(UnitCreated),
    #[prost(message, tag = "5")]
    UnitUpdated(UnitUpdated),
    #[prost(message, tag = "6")]
    EventRecorded(EventRecorded),
    #[prost(message, tag = "7")]
    EventCancelled(EventCancelled),
}

// ── Hierarchy ──────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoLevelEdge {
    #[prost(string, tag = "1")]
    pub level: String,
    /// Absent for a root level.
    #[prost(string, optional, tag = "2")]
    pub parent: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoHierarchy {
    #[prost(string, tag = "1")]
    pub tenant_id: String,
    #[prost(string, repeated, tag = "2")]
    pub levels: Vec<String>,
    #[prost(message, repeated, tag = "3")]
    pub structure: Vec<ProtoLevelEdge>,
    #[prost(bool, tag = "4")]
    pub use_grades: bool,
    #[prost(bool, tag = "5")]
    pub use_titles: bool,
    #[prost(bool, tag = "6")]
    pub locked: bool,
    #[prost(uint64, tag = "7")]
    pub version: u64,
}

// ── Org unit ───────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoOrgUnit {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub tenant_id: String,
    #[prost(string, optional, tag = "3")]
    pub parent_id: Option<String>,
    #[prost(string, tag = "4")]
    pub unit_type: String,
    #[prost(string, tag = "5")]
    pub unit_number: String,
    #[prost(string, tag = "6")]
    pub name: String,
    #[prost(string, optional, tag = "7")]
    pub manager_id: Option<String>,
    #[prost(string, tag = "8")]
    pub effective_from: String,
    #[prost(string, optional, tag = "9")]
    pub expiry_date: Option<String>,
}

// ── Employee event ─────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoEventRecord {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub employee_id: String,
    #[prost(string, tag = "3")]
    pub event_code: String,
    #[prost(string, tag = "4")]
    pub valid_from: String,
    #[prost(string, tag = "5")]
    pub payload_json: String,
    #[prost(string, optional, tag = "6")]
    pub recorded_by: Option<String>,
}

// ── Entry types ────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct TenantRegistered {
    #[prost(string, tag = "1")]
    pub tenant_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DraftSaved {
    #[prost(message, optional, tag = "1")]
    pub hierarchy: Option<ProtoHierarchy>,
}

#[derive(Clone, PartialEq, Message)]
pub struct HierarchyCommitted {
    #[prost(message, optional, tag = "1")]
    pub hierarchy: Option<ProtoHierarchy>,
    /// Canonical fingerprint of the locked shape.
    #[prost(string, tag = "2")]
    pub fingerprint: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct UnitCreated {
    #[prost(message, optional, tag = "1")]
    pub unit: Option<ProtoOrgUnit>,
}

#[derive(Clone, PartialEq, Message)]
pub struct UnitUpdated {
    #[prost(message, optional, tag = "1")]
    pub unit: Option<ProtoOrgUnit>,
}

/// The new head of a chain. Closing the previous head is implied by
/// `valid_from` and is redone on replay.
#[derive(Clone, PartialEq, Message)]
pub struct EventRecorded {
    #[prost(message, optional, tag = "1")]
    pub record: Option<ProtoEventRecord>,
    #[prost(string, optional, tag = "2")]
    pub idempotency_key: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EventCancelled {
    #[prost(string, tag = "1")]
    pub employee_id: String,
    #[prost(string, tag = "2")]
    pub event_code: String,
    /// Id of the record that was active when cancelled.
    #[prost(string, tag = "3")]
    pub record_id: String,
}

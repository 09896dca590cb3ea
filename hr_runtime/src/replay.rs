//! Replay orchestrator: rebuild in-memory state from journal frames.
//!
//! Every entry goes back through the same kernel validation as the live
//! write path. The first rejected entry stops replay; nothing after a bad
//! frame is trusted.

use tracing::{debug, info};

use hr_kernel::error::CoreError;

use crate::error::JournalError;
use crate::event_store::EventStore;
use crate::hierarchy_store::HierarchyStore;
use crate::journal::JournalEntry;
use crate::org_tree::OrgTree;
use crate::proto_bridge::proto_to_entry;
use crate::proto_types::ProtoJournalFrame;

/// Counts of replayed entries, per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub frames: u64,
    pub last_sequence: u64,
    pub tenants: u64,
    pub commits: u64,
    pub units: u64,
    pub events: u64,
    pub cancellations: u64,
}

/// Stores that a replay writes into.
pub struct ReplayTarget<'a> {
    pub hierarchy: &'a HierarchyStore,
    pub units: &'a OrgTree,
    pub events: &'a EventStore,
}

pub fn replay_frames(
    frames: &[ProtoJournalFrame],
    target: &ReplayTarget<'_>,
) -> Result<ReplayStats, JournalError> {
    let mut stats = ReplayStats::default();

    for frame in frames {
        let sequence = frame.sequence;
        let proto = frame
            .entry
            .as_ref()
            .ok_or_else(|| JournalError::malformed("frame.entry", format!("frame {} is empty", sequence)))?;
        let entry = proto_to_entry(proto)?;
        apply_entry(entry, sequence, target, &mut stats)
            .map_err(|source| JournalError::Rejected { sequence, source })?;

        stats.frames += 1;
        stats.last_sequence = sequence;
        debug!(sequence, "journal entry replayed");
    }

    info!(
        frames = stats.frames,
        tenants = stats.tenants,
        units = stats.units,
        events = stats.events,
        "journal replay complete"
    );
    Ok(stats)
}

fn apply_entry(
    entry: JournalEntry,
    sequence: u64,
    target: &ReplayTarget<'_>,
    stats: &mut ReplayStats,
) -> Result<(), CoreError> {
    match entry {
        JournalEntry::TenantRegistered { tenant_id } => {
            target.hierarchy.replay_registered(&tenant_id)?;
            stats.tenants += 1;
        }
        JournalEntry::DraftSaved(config) => {
            target.hierarchy.replay_draft(config)?;
        }
        JournalEntry::HierarchyCommitted {
            config,
            fingerprint,
        } => {
            target.hierarchy.replay_commit(config, fingerprint)?;
            stats.commits += 1;
        }
        JournalEntry::UnitCreated(unit) => {
            let config = target.hierarchy.get(&unit.tenant_id)?;
            target.units.replay_created(&config, unit)?;
            stats.units += 1;
        }
        JournalEntry::UnitUpdated(unit) => {
            target.units.replay_updated(unit)?;
        }
        JournalEntry::EventRecorded {
            record,
            idempotency_key,
        } => {
            target.events.replay_recorded(record, idempotency_key)?;
            stats.events += 1;
        }
        JournalEntry::EventCancelled {
            employee_id,
            event_code,
            record_id,
        } => {
            target
                .events
                .replay_cancelled(&employee_id, &event_code, record_id, sequence)?;
            stats.cancellations += 1;
        }
    }
    Ok(())
}

/// Property tests over the pure kernel: chain shape after arbitrary
/// append/cancel sequences, as-of uniqueness, and wizard edits never
/// producing an invalid draft.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

use hr_kernel::domain::EmployeeEventRecord;
use hr_kernel::engine::HierarchyWizard;
use hr_kernel::hashing::{chain_fingerprint, config_fingerprint};
use hr_kernel::ids::{EmployeeId, TenantId};
use hr_kernel::invariants::{validate_chain, validate_hierarchy_shape};
use hr_kernel::state::{create_default_config, default_level_catalog};
use hr_kernel::timeline::{append_record, cancel_active, resolve_as_of};
use hr_kernel::transitions::{Direction, HierarchyEdit};

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn record(offset_days: i64, value: u32) -> EmployeeEventRecord {
    EmployeeEventRecord {
        id: Uuid::new_v4(),
        employee_id: EmployeeId::new("e-prop").unwrap(),
        event_code: "203".to_string(),
        valid_from: base_date() + Duration::days(offset_days),
        valid_to: None,
        payload: json!({ "grade": value }),
        recorded_by: None,
    }
}

#[derive(Debug, Clone)]
enum ChainOp {
    Append(i64),
    Cancel,
}

fn chain_op() -> impl Strategy<Value = ChainOp> {
    prop_oneof![
        3 => (0i64..2000).prop_map(ChainOp::Append),
        1 => Just(ChainOp::Cancel),
    ]
}

fn level_edit() -> impl Strategy<Value = HierarchyEdit> {
    let level = prop::sample::select(vec!["Division", "Wing", "Department", "Team", "Role"]);
    let parent = prop::option::of(prop::sample::select(vec![
        "Division",
        "Wing",
        "Department",
        "Team",
        "Role",
    ]));
    prop_oneof![
        level.clone().prop_map(|l| HierarchyEdit::SelectLevel(l.to_string())),
        level.clone().prop_map(|l| HierarchyEdit::DeselectLevel(l.to_string())),
        (level.clone(), parent).prop_map(|(l, p)| HierarchyEdit::SetParent {
            level: l.to_string(),
            parent: p.map(|p| p.to_string()),
        }),
        (level, any::<bool>()).prop_map(|(l, up)| HierarchyEdit::MoveLevel {
            level: l.to_string(),
            direction: if up { Direction::Up } else { Direction::Down },
        }),
        any::<bool>().prop_map(HierarchyEdit::SetUseGrades),
    ]
}

proptest! {
    #[test]
    fn chain_stays_contiguous_under_any_ops(ops in prop::collection::vec(chain_op(), 1..40)) {
        let mut chain: Vec<EmployeeEventRecord> = Vec::new();
        for (i, op) in ops.into_iter().enumerate() {
            match op {
                ChainOp::Append(offset) => {
                    let head_start = chain.last().map(|r| r.valid_from);
                    let candidate = record(offset, i as u32);
                    match append_record(&chain, candidate.clone()) {
                        Ok(next) => {
                            prop_assert!(head_start.map_or(true, |s| candidate.valid_from > s));
                            chain = next;
                        }
                        Err(err) => {
                            prop_assert_eq!(err.kind(), "temporal_order");
                            prop_assert!(head_start.map_or(false, |s| candidate.valid_from <= s));
                        }
                    }
                }
                ChainOp::Cancel => match cancel_active(&chain) {
                    Ok(plan) => chain = plan.chain,
                    Err(err) => {
                        prop_assert_eq!(err.kind(), "not_found");
                        prop_assert!(chain.is_empty());
                    }
                },
            }
            prop_assert!(validate_chain(&chain).is_ok());
            prop_assert!(chain.iter().filter(|r| r.is_active()).count() <= 1);
        }
    }

    #[test]
    fn as_of_resolves_to_at_most_one_record(
        offsets in prop::collection::btree_set(0i64..3000, 1..20),
        day in -10i64..3100,
    ) {
        let mut chain = Vec::new();
        for (i, offset) in offsets.iter().enumerate() {
            chain = append_record(&chain, record(*offset, i as u32)).unwrap();
        }
        let as_of = base_date() + Duration::days(day);
        let covering: Vec<_> = chain.iter().filter(|r| r.covers(as_of)).collect();
        prop_assert!(covering.len() <= 1);
        prop_assert_eq!(resolve_as_of(&chain, as_of).map(|r| r.id), covering.first().map(|r| r.id));
    }

    #[test]
    fn wizard_edits_never_break_shape(edits in prop::collection::vec(level_edit(), 0..30)) {
        let config = create_default_config(TenantId::new("t-prop").unwrap());
        let mut wizard = HierarchyWizard::from_config(&config, default_level_catalog()).unwrap();
        for edit in &edits {
            let before = wizard.draft().clone();
            if wizard.apply(edit).is_err() {
                prop_assert_eq!(wizard.draft(), &before);
            }
            prop_assert!(validate_hierarchy_shape(wizard.draft()).is_ok());
        }
    }
}

#[test]
fn fingerprints_are_deterministic() {
    let config = create_default_config(TenantId::new("t-1").unwrap());
    assert_eq!(config_fingerprint(&config), config_fingerprint(&config.clone()));

    let chain = append_record(&[], record(0, 1)).unwrap();
    let chain = append_record(&chain, record(10, 2)).unwrap();
    assert_eq!(chain_fingerprint(&chain), chain_fingerprint(&chain.clone()));
    assert_ne!(chain_fingerprint(&chain), chain_fingerprint(&chain[..1]));
}

#[test]
fn kernel_version_is_one() {
    assert_eq!(hr_kernel::KERNEL_VERSION, 1);
}

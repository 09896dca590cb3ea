/// Hierarchy graph utilities.
///
/// The structure is a parent map, so every level has at most one outgoing
/// edge. Traversal is over sorted keys for determinism.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::Structure;

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

/// Find a parent cycle, returned as the levels on it starting from the
/// first revisited level. Uses colour tracking so each level is walked once.
pub fn detect_parent_cycle(structure: &Structure) -> Option<Vec<String>> {
    const WHITE: u8 = 0;
    const GREY: u8 = 1;
    const BLACK: u8 = 2;

    let mut colour: BTreeMap<&str, u8> = structure.keys().map(|k| (k.as_str(), WHITE)).collect();

    for start in structure.keys() {
        if colour.get(start.as_str()).copied() != Some(WHITE) {
            continue;
        }

        let mut path: Vec<&str> = Vec::new();
        let mut node = Some(start.as_str());

        while let Some(current) = node {
            match colour.get(current).copied().unwrap_or(BLACK) {
                GREY => {
                    let pos = path.iter().position(|p| *p == current).unwrap_or(0);
                    return Some(path[pos..].iter().map(|s| s.to_string()).collect());
                }
                BLACK => break,
                _ => {
                    colour.insert(current, GREY);
                    path.push(current);
                    node = structure.get(current).and_then(|p| p.as_deref());
                }
            }
        }

        for visited in path {
            colour.insert(visited, BLACK);
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Repair
// ---------------------------------------------------------------------------

/// Project `structure` onto `levels`: drop entries for unselected levels,
/// re-root any level whose parent is gone, and give every selected level an
/// entry. Pure; the input is not touched.
pub fn repair_structure(levels: &[String], structure: &Structure) -> Structure {
    let selected: BTreeSet<&str> = levels.iter().map(|l| l.as_str()).collect();

    let mut repaired = Structure::new();
    for level in levels {
        let parent = structure
            .get(level)
            .cloned()
            .flatten()
            .filter(|p| selected.contains(p.as_str()) && p != level);
        repaired.insert(level.clone(), parent);
    }
    repaired
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub fn root_levels(structure: &Structure) -> Vec<String> {
    structure
        .iter()
        .filter(|(_, parent)| parent.is_none())
        .map(|(level, _)| level.clone())
        .collect()
}

pub fn child_levels(structure: &Structure, parent: &str) -> Vec<String> {
    structure
        .iter()
        .filter(|(_, p)| p.as_deref() == Some(parent))
        .map(|(level, _)| level.clone())
        .collect()
}

/// Depth from the root (roots are 0). `None` for unknown levels or cycles.
pub fn level_depth(structure: &Structure, level: &str) -> Option<usize> {
    let mut depth = 0;
    let mut current = structure.get(level)?.as_deref();
    while let Some(parent) = current {
        depth += 1;
        if depth > structure.len() {
            return None;
        }
        current = structure.get(parent)?.as_deref();
    }
    Some(depth)
}

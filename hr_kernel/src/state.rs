/// Default construction for a freshly registered tenant.

use crate::domain::{HierarchyConfig, Structure};
use crate::ids::TenantId;

/// Catalog order doubles as the default parenting order in the wizard.
pub const DEFAULT_LEVEL_CATALOG: [&str; 5] = ["Division", "Wing", "Department", "Team", "Role"];

/// Unlocked two-level shape `Wing > Department`, flags off, version 0.
pub fn create_default_config(tenant_id: TenantId) -> HierarchyConfig {
    let mut structure = Structure::new();
    structure.insert("Wing".to_string(), None);
    structure.insert("Department".to_string(), Some("Wing".to_string()));

    HierarchyConfig {
        tenant_id,
        levels: vec!["Wing".to_string(), "Department".to_string()],
        structure,
        use_grades: false,
        use_titles: false,
        locked: false,
        version: 0,
    }
}

pub fn default_level_catalog() -> Vec<String> {
    DEFAULT_LEVEL_CATALOG.iter().map(|s| s.to_string()).collect()
}

//! Identifier primitives.
//!
//! Tenant, employee and user ids are opaque strings owned by the surrounding
//! application. The only assumption is uniqueness, and that they are not blank.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

macro_rules! opaque_id {
    ($name:ident, $field:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Result<Self> {
                let raw = raw.into();
                if raw.trim().is_empty() {
                    return Err(CoreError::validation($field, "must not be blank"));
                }
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(TenantId, "tenant_id");
opaque_id!(EmployeeId, "employee_id");
opaque_id!(UserId, "user_id");

/// Widest pad accepted for unit numbers.
pub const MAX_UNIT_NUMBER_WIDTH: usize = 12;

/// Level keys: `[A-Za-z][A-Za-z0-9_-]*`, at most 64 bytes.
pub fn validate_level_key(key: &str) -> Result<()> {
    let mut chars = key.chars();
    let starts_alpha = chars.next().map_or(false, |c| c.is_ascii_alphabetic());
    if !starts_alpha || key.len() > 64 {
        return Err(CoreError::validation(
            "level",
            format!("invalid level key {:?}", key),
        ));
    }
    if !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
        return Err(CoreError::validation(
            "level",
            format!("invalid level key {:?}: must match [A-Za-z][A-Za-z0-9_-]*", key),
        ));
    }
    Ok(())
}

/// Event codes: 1 to 16 ASCII alphanumerics.
pub fn validate_event_code(code: &str) -> Result<()> {
    if code.is_empty() || code.len() > 16 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::validation(
            "event_code",
            format!("invalid event code {:?}", code),
        ));
    }
    Ok(())
}

/// Zero-pad `value` to `width` digits. Wider values are never truncated.
pub fn format_unit_number(value: u64, width: usize) -> String {
    format!("{:0width$}", value, width = width)
}

pub fn parse_unit_number(raw: &str) -> Result<u64> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::validation(
            "unit_number",
            format!("not a unit number: {:?}", raw),
        ));
    }
    raw.parse::<u64>()
        .map_err(|e| CoreError::validation("unit_number", e.to_string()))
}

/// Checked successor. Exhausting u64 is reported, not wrapped.
pub fn next_unit_value(current_max: u64) -> Result<u64> {
    current_max
        .checked_add(1)
        .ok_or_else(|| CoreError::state_conflict("unit number space exhausted"))
}

/// Event code registry.
///
/// A dispatch table from event code to payload schema. Payloads are opaque
/// to the core beyond what the schema checks; adding a code is adding an
/// entry, not a branch.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::ids::validate_event_code;

/// Extra payload check beyond required fields.
pub type PayloadValidator = fn(&Value) -> Result<()>;

#[derive(Debug, Clone)]
pub struct EventSchema {
    pub code: &'static str,
    pub name: &'static str,
    pub required_fields: &'static [&'static str],
    pub validator: Option<PayloadValidator>,
}

impl EventSchema {
    pub fn validate(&self, payload: &Value) -> Result<()> {
        let Some(object) = payload.as_object() else {
            return Err(CoreError::validation(
                "payload",
                format!("event {} payload must be a JSON object", self.code),
            ));
        };
        for field in self.required_fields {
            match object.get(*field) {
                None | Some(Value::Null) => {
                    return Err(CoreError::validation(
                        "payload",
                        format!("event {} requires field {:?}", self.code, field),
                    ));
                }
                Some(_) => {}
            }
        }
        if let Some(validator) = self.validator {
            validator(payload)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EventCodeRegistry {
    schemas: BTreeMap<&'static str, EventSchema>,
}

impl EventCodeRegistry {
    pub fn empty() -> Self {
        Self {
            schemas: BTreeMap::new(),
        }
    }

    /// Register or replace a schema.
    pub fn register(&mut self, schema: EventSchema) -> Result<()> {
        validate_event_code(schema.code)?;
        self.schemas.insert(schema.code, schema);
        Ok(())
    }

    pub fn schema(&self, code: &str) -> Result<&EventSchema> {
        validate_event_code(code)?;
        self.schemas.get(code).ok_or_else(|| {
            CoreError::validation("event_code", format!("unknown event code {:?}", code))
        })
    }

    pub fn validate(&self, code: &str, payload: &Value) -> Result<()> {
        self.schema(code)?.validate(payload)
    }

    pub fn codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.keys().copied()
    }
}

impl Default for EventCodeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for schema in DEFAULT_SCHEMAS {
            registry.schemas.insert(schema.code, schema.clone());
        }
        registry
    }
}

const DEFAULT_SCHEMAS: &[EventSchema] = &[
    EventSchema {
        code: "101",
        name: "identification",
        required_fields: &["id_number"],
        validator: None,
    },
    EventSchema {
        code: "102",
        name: "contact",
        required_fields: &[],
        validator: None,
    },
    EventSchema {
        code: "103",
        name: "military_service",
        required_fields: &["army_status"],
        validator: None,
    },
    EventSchema {
        code: "104",
        name: "personal_status",
        required_fields: &["marital_status"],
        validator: None,
    },
    EventSchema {
        code: "105",
        name: "names",
        required_fields: &["first_name", "last_name"],
        validator: None,
    },
    EventSchema {
        code: "201",
        name: "employment_status",
        required_fields: &["status_code"],
        validator: None,
    },
    EventSchema {
        code: "203",
        name: "grade_rank",
        required_fields: &[],
        validator: None,
    },
    EventSchema {
        code: "204",
        name: "role_split",
        required_fields: &["splits"],
        validator: Some(validate_role_split),
    },
    EventSchema {
        code: "205",
        name: "tax_parameters",
        required_fields: &[],
        validator: None,
    },
    EventSchema {
        code: "218",
        name: "address",
        required_fields: &["city_name"],
        validator: None,
    },
];

/// `splits` is a non-empty array of `{unit, percent}` summing to 100.
fn validate_role_split(payload: &Value) -> Result<()> {
    let Some(splits) = payload.get("splits").and_then(|v| v.as_array()) else {
        return Err(CoreError::validation("payload.splits", "must be an array"));
    };
    if splits.is_empty() {
        return Err(CoreError::validation("payload.splits", "must not be empty"));
    }

    let mut total: u64 = 0;
    for split in splits {
        let unit = split.get("unit").and_then(|v| v.as_str()).unwrap_or("");
        if unit.is_empty() {
            return Err(CoreError::validation("payload.splits", "every split needs a unit"));
        }
        let Some(percent) = split.get("percent").and_then(|v| v.as_u64()) else {
            return Err(CoreError::validation(
                "payload.splits",
                format!("split {:?} needs an integer percent", unit),
            ));
        };
        total = total.saturating_add(percent);
    }

    if total != 100 {
        return Err(CoreError::validation(
            "payload.splits",
            format!("percents sum to {}, expected 100", total),
        ));
    }
    Ok(())
}

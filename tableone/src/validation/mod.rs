//! JSON Schema validation for table configurations and themes.
//!
//! Request JSON is checked against a schema before it is deserialized, so
//! callers get every structural problem at once instead of the first serde
//! error. Semantic checks against the dataset happen later in
//! [`crate::config::TableConfig::resolve`].
//!
//! # Embedded Schemas
//!
//! Schemas are embedded at compile time from the `schemas/` directory:
//! - `table-config.json`
//! - `theme.json`
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tableone::validation::{validate_table_config, is_valid_theme};
//!
//! let config = json!({ "by": "diabetes", "fields": [{ "name": "age" }] });
//! assert!(validate_table_config(&config).is_ok());
//!
//! assert!(!is_valid_theme(&json!({ "digits": "two" })));
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static TABLE_CONFIG_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/table-config.json"))
        .expect("Invalid embedded schema")
});

static THEME_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/theme.json")).expect("Invalid embedded schema")
});

/// Validate `data` against a JSON schema (Draft 7).
///
/// Returns every violation, not only the first.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator =
        jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick yes/no check.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

pub fn validate_table_config(data: &Value) -> Result<(), Vec<String>> {
    validate(&TABLE_CONFIG_SCHEMA, data)
}

pub fn is_valid_table_config(data: &Value) -> bool {
    is_valid(&TABLE_CONFIG_SCHEMA, data)
}

pub fn validate_theme(data: &Value) -> Result<(), Vec<String>> {
    validate(&THEME_SCHEMA, data)
}

pub fn is_valid_theme(data: &Value) -> bool {
    is_valid(&THEME_SCHEMA, data)
}

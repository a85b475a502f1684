//! Fixed structural schemas for the configuration document.
//!
//! Three levels are checked: the top-level sections, every stage entry and
//! every module entry. Unknown extra keys are tolerated at every level.
//! Cross-field rules (use/required/critical) are not checked here; the stage
//! executor enforces them at execution time.

use crate::config::document::STAGE_SECTIONS;
use crate::error::ConfigError;

use serde_json::{Map, Value};

/// Keys that every `globals` section must define.
pub const REQUIRED_GLOBALS: &[&str] = &[
    "mzroll_db_file",
    "methodId",
    "chemical_class",
    "MS1tol",
    "MS2tol",
    "mode",
    "collision_energies",
    "dbname",
    "standard_db_user",
    "standard_db_passwd_key",
    "standard_db_host_key",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Boolean,
    String,
    /// string, boolean or number
    Scalar,
    /// mapping whose values are all scalars
    ScalarMap,
    StringList,
}

impl Shape {
    fn describe(self) -> &'static str {
        match self {
            Shape::Boolean => "boolean",
            Shape::String => "string",
            Shape::Scalar => "string, boolean or number",
            Shape::ScalarMap => "mapping of scalars",
            Shape::StringList => "sequence of strings",
        }
    }
}

const STAGE_FIELDS: &[(&str, Shape)] = &[
    ("use", Shape::Boolean),
    ("required", Shape::Boolean),
    ("critical", Shape::Boolean),
    ("modules", Shape::StringList),
];

const MODULE_FIELDS: &[(&str, Shape)] = &[
    ("language", Shape::String),
    ("parameters", Shape::ScalarMap),
];

/// Short shape name used in violation messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// True for the values an override may replace.
pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

fn violation(path: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> ConfigError {
    ConfigError::SchemaViolation {
        path: path.into(),
        expected: expected.into(),
        actual: actual.into(),
    }
}

/// Validate the whole document. Pure check, no side effects.
pub fn validate(root: &Value) -> Result<(), ConfigError> {
    let top = root
        .as_object()
        .ok_or_else(|| violation("<root>", "mapping", kind_name(root)))?;

    // Exactly one stage section.
    let present: Vec<&str> = STAGE_SECTIONS
        .iter()
        .copied()
        .filter(|key| top.contains_key(*key))
        .collect();
    let stage_key = match present.as_slice() {
        [key] => *key,
        [] => return Err(violation(STAGE_SECTIONS[0], "mapping", "missing")),
        _ => {
            return Err(violation(
                STAGE_SECTIONS.join("|"),
                "only one stage section",
                "both",
            ));
        }
    };

    let stages = require_map(top, stage_key, stage_key)?;
    for (name, stage) in stages {
        let path = format!("{}.{}", stage_key, name);
        validate_entry(stage, &path, STAGE_FIELDS)?;
    }

    let globals = require_map(top, "globals", "globals")?;
    for key in REQUIRED_GLOBALS {
        if !globals.contains_key(*key) {
            return Err(violation(
                format!("globals.{}", key),
                Shape::Scalar.describe(),
                "missing",
            ));
        }
    }
    check_scalar_map(globals, "globals")?;

    let modules = require_map(top, "modules", "modules")?;
    for (name, module) in modules {
        let path = format!("modules.{}", name);
        validate_entry(module, &path, MODULE_FIELDS)?;
    }

    Ok(())
}

fn require_map<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match parent.get(key) {
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(violation(path, "mapping", kind_name(other))),
        None => Err(violation(path, "mapping", "missing")),
    }
}

fn validate_entry(value: &Value, path: &str, fields: &[(&str, Shape)]) -> Result<(), ConfigError> {
    let map = value
        .as_object()
        .ok_or_else(|| violation(path, "mapping", kind_name(value)))?;

    for (field, shape) in fields {
        let field_path = format!("{}.{}", path, field);
        let Some(v) = map.get(*field) else {
            return Err(violation(field_path, shape.describe(), "missing"));
        };
        check_shape(v, *shape, &field_path)?;
    }
    Ok(())
}

fn check_shape(value: &Value, shape: Shape, path: &str) -> Result<(), ConfigError> {
    let ok = match shape {
        Shape::Boolean => value.is_boolean(),
        Shape::String => value.is_string(),
        Shape::Scalar => is_scalar(value),
        Shape::ScalarMap => {
            let map = value
                .as_object()
                .ok_or_else(|| violation(path, shape.describe(), kind_name(value)))?;
            return check_scalar_map(map, path);
        }
        Shape::StringList => {
            let items = value
                .as_array()
                .ok_or_else(|| violation(path, shape.describe(), kind_name(value)))?;
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    return Err(violation(format!("{}[{}]", path, i), "string", kind_name(item)));
                }
            }
            true
        }
    };

    if ok {
        Ok(())
    } else {
        Err(violation(path, shape.describe(), kind_name(value)))
    }
}

fn check_scalar_map(map: &Map<String, Value>, path: &str) -> Result<(), ConfigError> {
    for (key, v) in map {
        if !is_scalar(v) {
            return Err(violation(
                format!("{}.{}", path, key),
                Shape::Scalar.describe(),
                kind_name(v),
            ));
        }
    }
    Ok(())
}

//! Dot-path overrides: `pipeline.search.use=false`.
//!
//! An override replaces exactly one existing scalar leaf. The raw value is
//! coerced with a fixed precedence:
//! 1) `true` / `false` in any case  => boolean
//! 2) only digits, `e` and `.`      => number (always stored as a float)
//! 3) anything else                 => string, unchanged
//!
//! The path is walked and the leaf checked before the value is coerced, so a
//! bad path is reported as such whatever the value looks like.
//!
//! The update is copy-on-write: `set_at_path` rebuilds every ancestor of the
//! leaf and returns a new tree, so the input tree stays valid as a snapshot.

use crate::config::schema::{is_scalar, kind_name};
use crate::error::ConfigError;

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9e.]+$").expect("valid numeric regex"));

/// A parsed `dotted.path=value` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub path: Vec<String>,
    pub raw_value: String,
}

impl FromStr for Override {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, raw_value) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedOverride(s.to_string()))?;

        let path: Vec<String> = path.trim().split('.').map(str::to_string).collect();
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(ConfigError::MalformedOverride(s.to_string()));
        }

        Ok(Self {
            path,
            raw_value: raw_value.to_string(),
        })
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.dotted_path(), self.raw_value)
    }
}

impl Override {
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }

    /// Return a new tree with this override applied; `root` is untouched.
    pub fn apply(&self, root: &Value) -> Result<Value, ConfigError> {
        set_at_path(root, &self.path, &self.raw_value, &self.dotted_path())
    }
}

/// Coerce a raw override string. `None` means it looked numeric but did not
/// parse as a finite float.
pub fn coerce(raw: &str) -> Option<Value> {
    if raw.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if raw.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }
    if NUMERIC_RE.is_match(raw) {
        return raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number);
    }
    Some(Value::String(raw.to_string()))
}

/// Replace the scalar leaf at `remaining` below `node` with the coerced `raw`
/// value, rebuilding ancestors.
///
/// `target` is the full dotted path, used only in errors.
pub fn set_at_path(
    node: &Value,
    remaining: &[String],
    raw: &str,
    target: &str,
) -> Result<Value, ConfigError> {
    let Some((segment, rest)) = remaining.split_first() else {
        if !is_scalar(node) {
            return Err(ConfigError::NotALeaf {
                path: target.to_string(),
                found: kind_name(node),
            });
        }
        return coerce(raw).ok_or_else(|| ConfigError::InvalidNumber {
            path: target.to_string(),
            value: raw.to_string(),
        });
    };

    let not_found = || ConfigError::PathNotFound {
        path: target.to_string(),
        segment: segment.clone(),
    };

    let map = node.as_object().ok_or_else(not_found)?;
    let child = map.get(segment).ok_or_else(not_found)?;
    let mut replacement = Some(set_at_path(child, rest, raw, target)?);

    let mut rebuilt = Map::with_capacity(map.len());
    for (key, v) in map {
        let next = if key == segment { replacement.take() } else { None };
        rebuilt.insert(key.clone(), next.unwrap_or_else(|| v.clone()));
    }
    Ok(Value::Object(rebuilt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn apply(root: &Value, s: &str) -> Result<Value, ConfigError> {
        s.parse::<Override>()?.apply(root)
    }

    #[test]
    fn parse_override() {
        let ov: Override = "modules.x.parameters.formula=C6H12O6=glucose".parse().unwrap();
        assert_eq!(ov.path, vec!["modules", "x", "parameters", "formula"]);
        assert_eq!(ov.raw_value, "C6H12O6=glucose");
        assert_eq!(ov.to_string(), "modules.x.parameters.formula=C6H12O6=glucose");
    }

    #[test]
    fn malformed_overrides() {
        for bad in ["pipeline.search.use", "pipeline..use=true", "=true", "pipeline.=1"] {
            assert!(
                matches!(bad.parse::<Override>(), Err(ConfigError::MalformedOverride(_))),
                "{bad}"
            );
        }
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn coercion_precedence() {
        assert_eq!(coerce("true"), Some(json!(true)));
        assert_eq!(coerce("True"), Some(json!(true)));
        assert_eq!(coerce("TRUE"), Some(json!(true)));
        assert_eq!(coerce("fAlSe"), Some(json!(false)));
        assert_eq!(coerce("3.14"), Some(json!(3.14)));
        assert_eq!(coerce("5"), Some(json!(5.0)));
        assert_eq!(coerce("1e3"), Some(json!(1000.0)));
        assert_eq!(coerce("M004A"), Some(json!("M004A")));
        assert_eq!(coerce("-5"), Some(json!("-5")));
        assert_eq!(coerce(""), Some(json!("")));
        assert_eq!(coerce("e"), None);
        assert_eq!(coerce("1.2.3"), None);
    }

    #[test]
    fn replaces_leaf_and_keeps_order() {
        let root = sample();
        let updated = apply(&root, "pipeline.qc.use=true").unwrap();

        assert_eq!(updated["pipeline"]["qc"]["use"], json!(true));
        assert_eq!(root["pipeline"]["qc"]["use"], json!(false));

        let keys: Vec<&String> = updated["pipeline"]["qc"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["use", "required", "critical", "modules"]);
        let top: Vec<&String> = updated.as_object().unwrap().keys().collect();
        assert_eq!(top, vec!["pipeline", "globals", "modules"]);
    }

    #[test]
    fn batch_scenario() {
        let root = sample();
        let root = apply(&root, "globals.mode=negative").unwrap();
        let root = apply(&root, "modules.peakdetector.parameters.minintensity=5").unwrap();
        assert_eq!(root["globals"]["mode"], json!("negative"));
        assert_eq!(root["modules"]["peakdetector"]["parameters"]["minintensity"], json!(5.0));
    }

    #[test]
    fn idempotent_for_same_value() {
        let root = sample();
        let once = apply(&root, "globals.MS1tol=20ppm").unwrap();
        let twice = apply(&once, "globals.MS1tol=20ppm").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_segments() {
        let root = sample();
        match apply(&root, "pipeline.missing.use=true") {
            Err(ConfigError::PathNotFound { segment, .. }) => assert_eq!(segment, "missing"),
            other => panic!("unexpected {:?}", other),
        }
        match apply(&root, "nope=1") {
            Err(ConfigError::PathNotFound { segment, .. }) => assert_eq!(segment, "nope"),
            other => panic!("unexpected {:?}", other),
        }
        // descending through a scalar
        assert!(matches!(
            apply(&root, "globals.mode.sub=1"),
            Err(ConfigError::PathNotFound { .. })
        ));
    }

    #[test]
    fn mapping_and_sequence_are_not_leaves() {
        let root = sample();
        match apply(&root, "modules.peakdetector.parameters=x") {
            Err(ConfigError::NotALeaf { path, found }) => {
                assert_eq!(path, "modules.peakdetector.parameters");
                assert_eq!(found, "mapping");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            apply(&root, "pipeline.qc.modules=x"),
            Err(ConfigError::NotALeaf { found: "sequence", .. })
        ));
    }

    #[test]
    fn invalid_number_reports_path() {
        match apply(&sample(), "globals.mode=1..e") {
            Err(ConfigError::InvalidNumber { path, value }) => {
                assert_eq!(path, "globals.mode");
                assert_eq!(value, "1..e");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn path_errors_win_over_unparsable_numbers() {
        let root = sample();
        match apply(&root, "modules.peakdetector.parameters=1.2.3") {
            Err(ConfigError::NotALeaf { path, found }) => {
                assert_eq!(path, "modules.peakdetector.parameters");
                assert_eq!(found, "mapping");
            }
            other => panic!("unexpected {:?}", other),
        }
        match apply(&root, "ghost.x=e") {
            Err(ConfigError::PathNotFound { segment, .. }) => assert_eq!(segment, "ghost"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            apply(&root, "globals.mode.sub=1.2.3"),
            Err(ConfigError::PathNotFound { .. })
        ));
    }
}

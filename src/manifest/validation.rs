//! Structural validation of manifest payloads before publish.
//!
//! Every violation found is collected and returned together, so an author
//! sees the full list of broken references in one round trip instead of
//! fixing them one at a time.
//!
//! Shape understood by the checks (all other keys are opaque):
//!
//! ```json
//! {
//!   "dataSources": [{ "id": "sales-db" }],
//!   "dashboards": [
//!     { "id": "overview", "widgets": [{ "id": "revenue", "dataSourceId": "sales-db" }] }
//!   ]
//! }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

const DATA_SOURCES: &str = "dataSources";
const DASHBOARDS: &str = "dashboards";
const WIDGETS: &str = "widgets";
const DATA_SOURCE_REF: &str = "dataSourceId";

/// A single structural problem in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// JSON-pointer style location, e.g. `/dashboards/0/widgets/2/dataSourceId`
    pub path: String,
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All violations found in one manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
pub struct ValidationErrors {
    pub violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![Violation::new(path, message)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violation(s)", self.violations.len())?;
        for (i, v) in self.violations.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{v}")?;
        }
        Ok(())
    }
}

/// Validate a candidate manifest.
///
/// `max_payload_bytes` bounds the serialized size of the document.
pub fn validate_manifest(payload: &Value, max_payload_bytes: usize) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let Some(root) = payload.as_object() else {
        errors.push("/", "manifest must be a JSON object");
        return Err(errors);
    };
    if root.is_empty() {
        errors.push("/", "manifest must not be empty");
        return Err(errors);
    }

    let size = serde_json::to_vec(payload).map(|bytes| bytes.len()).unwrap_or(0);
    if size > max_payload_bytes {
        errors.push(
            "/",
            format!("manifest is {size} bytes, limit is {max_payload_bytes} bytes"),
        );
    }

    let declared = collect_data_sources(root, &mut errors);
    check_dashboards(root, &declared, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Return the elements of an optional top-level array, reporting a wrong type.
fn optional_array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    base: &str,
    errors: &mut ValidationErrors,
) -> &'a [Value] {
    match obj.get(key) {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(_) => {
            errors.push(format!("{base}/{key}"), "must be an array");
            &[]
        }
    }
}

/// Check `item.id` is a non-empty string and unique within `seen`.
fn check_id<'a>(
    item: &'a Map<String, Value>,
    path: &str,
    kind: &str,
    seen: &mut HashSet<&'a str>,
    errors: &mut ValidationErrors,
) -> Option<&'a str> {
    match item.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => {
            if !seen.insert(id.as_str()) {
                errors.push(format!("{path}/id"), format!("duplicate {kind} id '{id}'"));
            }
            Some(id.as_str())
        }
        Some(Value::String(_)) => {
            errors.push(format!("{path}/id"), format!("{kind} id must not be empty"));
            None
        }
        Some(_) => {
            errors.push(format!("{path}/id"), format!("{kind} id must be a string"));
            None
        }
        None => {
            errors.push(format!("{path}/id"), format!("{kind} is missing an id"));
            None
        }
    }
}

fn collect_data_sources<'a>(
    root: &'a Map<String, Value>,
    errors: &mut ValidationErrors,
) -> HashSet<&'a str> {
    let mut declared = HashSet::new();
    for (i, source) in optional_array(root, DATA_SOURCES, "", errors).iter().enumerate() {
        let path = format!("/{DATA_SOURCES}/{i}");
        match source.as_object() {
            Some(obj) => {
                check_id(obj, &path, "data source", &mut declared, errors);
            }
            None => errors.push(path, "data source must be an object"),
        }
    }
    declared
}

fn check_dashboards(
    root: &Map<String, Value>,
    declared: &HashSet<&str>,
    errors: &mut ValidationErrors,
) {
    let mut dashboard_ids = HashSet::new();
    for (i, dashboard) in optional_array(root, DASHBOARDS, "", errors).iter().enumerate() {
        let path = format!("/{DASHBOARDS}/{i}");
        let Some(obj) = dashboard.as_object() else {
            errors.push(path, "dashboard must be an object");
            continue;
        };
        check_id(obj, &path, "dashboard", &mut dashboard_ids, errors);

        // Widget ids only need to be unique within their dashboard
        let mut widget_ids = HashSet::new();
        for (j, widget) in optional_array(obj, WIDGETS, &path, errors).iter().enumerate() {
            let widget_path = format!("{path}/{WIDGETS}/{j}");
            let Some(widget) = widget.as_object() else {
                errors.push(widget_path, "widget must be an object");
                continue;
            };
            check_id(widget, &widget_path, "widget", &mut widget_ids, errors);

            match widget.get(DATA_SOURCE_REF) {
                None | Some(Value::Null) => {}
                Some(Value::String(reference)) => {
                    if !declared.contains(reference.as_str()) {
                        errors.push(
                            format!("{widget_path}/{DATA_SOURCE_REF}"),
                            format!("references undeclared data source '{reference}'"),
                        );
                    }
                }
                Some(_) => errors.push(
                    format!("{widget_path}/{DATA_SOURCE_REF}"),
                    "data source reference must be a string",
                ),
            }
        }
    }
}

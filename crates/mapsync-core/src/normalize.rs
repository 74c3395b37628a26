//! Upstream record normalization
//!
//! Turns a [`RawRecord`] property bag into a [`LocationDraft`]. Parsing is
//! defensive: optional fields that are absent or of the wrong shape fall back
//! to a default and are reported as [`FieldError`]s; only a missing
//! coordinate drops the record. Records without a status option are skipped
//! and counted, since they can never pass the status allow-list.
//!
//! Property layout (Notion database pages):
//!
//! | property        | kind              | field                  |
//! |-----------------|-------------------|------------------------|
//! | `Name`          | title             | `name`                 |
//! | `Latitude`      | number            | `latitude` (required)  |
//! | `Longitude`     | number            | `longitude` (required) |
//! | `Status`        | select or status  | status name and colour |
//! | `Location Type` | select            | `location_type`        |
//! | `Area`          | number            | `area`                 |

use crate::model::LocationDraft;
use crate::traits::RawRecord;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Name used when the title property is empty
pub const DEFAULT_NAME: &str = "No name";

const NAME: &str = "Name";
const LATITUDE: &str = "Latitude";
const LONGITUDE: &str = "Longitude";
const STATUS: &str = "Status";
const LOCATION_TYPE: &str = "Location Type";
const AREA: &str = "Area";

/// What was wrong with a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    /// The property or its value is absent
    Missing,
    /// The property exists but has an unexpected shape
    WrongType { expected: &'static str },
}

/// A problem with one property of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub record_id: String,
    pub field: &'static str,
    pub problem: FieldProblem,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            FieldProblem::Missing => write!(f, "{}: '{}' is missing", self.record_id, self.field),
            FieldProblem::WrongType { expected } => write!(
                f,
                "{}: '{}' is not a {} property",
                self.record_id, self.field, expected
            ),
        }
    }
}

/// Outcome of normalizing a single record
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Usable record, possibly with defaulted fields
    Draft {
        draft: LocationDraft,
        warnings: Vec<FieldError>,
    },
    /// No status option selected
    MissingStatus,
    /// A required field is unusable
    Malformed(Vec<FieldError>),
}

/// Outcome of normalizing a whole response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    pub drafts: Vec<LocationDraft>,
    /// Records skipped for having no status
    pub missing_status: usize,
    /// Records skipped for unusable coordinates
    pub malformed: usize,
    /// Every field problem seen, including defaulted ones
    pub field_errors: Vec<FieldError>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    #[serde(default)]
    plain_text: String,
}

#[derive(Debug, Deserialize)]
struct SelectOption {
    name: String,
    #[serde(default)]
    color: Option<String>,
}

/// Normalize every record, in order
pub fn normalize_all(records: &[RawRecord]) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for record in records {
        match normalize_record(record) {
            Normalized::Draft { draft, warnings } => {
                report.field_errors.extend(warnings);
                report.drafts.push(draft);
            }
            Normalized::MissingStatus => report.missing_status += 1,
            Normalized::Malformed(errors) => {
                report.malformed += 1;
                report.field_errors.extend(errors);
            }
        }
    }

    report
}

/// Normalize one record
pub fn normalize_record(record: &RawRecord) -> Normalized {
    let id = if record.id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        record.id.clone()
    };
    let props = &record.properties;
    let error = |field: &'static str, problem: FieldProblem| FieldError {
        record_id: id.clone(),
        field,
        problem,
    };

    let mut warnings = Vec::new();
    let mut fatal = Vec::new();

    let latitude = match number(props, LATITUDE) {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            fatal.push(error(LATITUDE, FieldProblem::Missing));
            None
        }
        Err(problem) => {
            fatal.push(error(LATITUDE, problem));
            None
        }
    };
    let longitude = match number(props, LONGITUDE) {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            fatal.push(error(LONGITUDE, FieldProblem::Missing));
            None
        }
        Err(problem) => {
            fatal.push(error(LONGITUDE, problem));
            None
        }
    };

    let status = match select(props, STATUS) {
        Ok(status) => status,
        Err(problem) => {
            warnings.push(error(STATUS, problem));
            None
        }
    };
    let Some(status) = status else {
        return Normalized::MissingStatus;
    };

    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return Normalized::Malformed(fatal);
    };

    let name = match title(props, NAME) {
        Ok(Some(name)) => name,
        Ok(None) => DEFAULT_NAME.to_string(),
        Err(problem) => {
            warnings.push(error(NAME, problem));
            DEFAULT_NAME.to_string()
        }
    };

    let location_type = select(props, LOCATION_TYPE).unwrap_or_else(|problem| {
        warnings.push(error(LOCATION_TYPE, problem));
        None
    });

    let area = number(props, AREA).unwrap_or_else(|problem| {
        warnings.push(error(AREA, problem));
        None
    });

    Normalized::Draft {
        draft: LocationDraft {
            id,
            name,
            latitude,
            longitude,
            location_type: location_type.map(|option| option.name),
            area,
            status_name: status.name,
            preferred_color: status.color,
        },
        warnings,
    }
}

/// The value object under a property's own type key
///
/// `Ok(None)` when the property is absent.
fn typed_value<'a>(
    props: &'a Map<String, Value>,
    key: &str,
    kinds: &[&str],
    expected: &'static str,
) -> Result<Option<&'a Value>, FieldProblem> {
    let Some(property) = props.get(key) else {
        return Ok(None);
    };
    let Some(object) = property.as_object() else {
        return Err(FieldProblem::WrongType { expected });
    };
    kinds
        .iter()
        .find_map(|kind| object.get(*kind))
        .map(Some)
        .ok_or(FieldProblem::WrongType { expected })
}

fn number(props: &Map<String, Value>, key: &str) -> Result<Option<f64>, FieldProblem> {
    match typed_value(props, key, &["number"], "number")? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or(FieldProblem::WrongType { expected: "number" }),
    }
}

fn select(props: &Map<String, Value>, key: &str) -> Result<Option<SelectOption>, FieldProblem> {
    match typed_value(props, key, &["select", "status"], "select")? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => SelectOption::deserialize(value)
            .map(Some)
            .map_err(|_| FieldProblem::WrongType { expected: "select" }),
    }
}

fn title(props: &Map<String, Value>, key: &str) -> Result<Option<String>, FieldProblem> {
    match typed_value(props, key, &["title"], "title")? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let runs = Vec::<TextRun>::deserialize(value)
                .map_err(|_| FieldProblem::WrongType { expected: "title" })?;
            Ok(runs
                .into_iter()
                .next()
                .map(|run| run.plain_text)
                .filter(|text| !text.is_empty()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, properties: Value) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            last_edited_time: "2024-01-01T00:00:00.000Z".to_string(),
            properties: properties.as_object().cloned().unwrap_or_default(),
        }
    }

    fn full_properties() -> Value {
        json!({
            "Name": { "type": "title", "title": [{ "plain_text": "Riyadh HQ" }, { "plain_text": "ignored" }] },
            "Latitude": { "type": "number", "number": 24.71 },
            "Longitude": { "type": "number", "number": 46.67 },
            "Status": { "type": "select", "select": { "name": "Signed", "color": "green" } },
            "Location Type": { "type": "select", "select": { "name": "Office", "color": "blue" } },
            "Area": { "type": "number", "number": 350.0 }
        })
    }

    #[test]
    fn test_full_record() {
        let Normalized::Draft { draft, warnings } = normalize_record(&record("p1", full_properties()))
        else {
            panic!("expected a draft");
        };

        assert!(warnings.is_empty());
        assert_eq!(draft.id, "p1");
        assert_eq!(draft.name, "Riyadh HQ");
        assert_eq!(draft.latitude, 24.71);
        assert_eq!(draft.longitude, 46.67);
        assert_eq!(draft.status_name, "Signed");
        assert_eq!(draft.preferred_color.as_deref(), Some("green"));
        assert_eq!(draft.location_type.as_deref(), Some("Office"));
        assert_eq!(draft.area, Some(350.0));
    }

    #[test]
    fn test_optional_fields_default() {
        let props = json!({
            "Name": { "type": "title", "title": [] },
            "Latitude": { "type": "number", "number": 1.0 },
            "Longitude": { "type": "number", "number": 2.0 },
            "Status": { "type": "status", "status": { "name": "Follow up" } },
            "Location Type": { "type": "select", "select": null },
            "Area": { "type": "number", "number": null }
        });

        let Normalized::Draft { draft, warnings } = normalize_record(&record("p2", props)) else {
            panic!("expected a draft");
        };

        assert!(warnings.is_empty());
        assert_eq!(draft.name, DEFAULT_NAME);
        assert_eq!(draft.status_name, "Follow up");
        assert_eq!(draft.preferred_color, None);
        assert_eq!(draft.location_type, None);
        assert_eq!(draft.area, None);
    }

    #[test]
    fn test_wrong_shapes_are_warnings() {
        let mut props = full_properties();
        props["Area"] = json!({ "type": "rich_text", "rich_text": [] });
        props["Name"] = json!("not an object");

        let Normalized::Draft { draft, warnings } = normalize_record(&record("p3", props)) else {
            panic!("expected a draft");
        };

        assert_eq!(draft.name, DEFAULT_NAME);
        assert_eq!(draft.area, None);
        let fields: Vec<_> = warnings.iter().map(|w| w.field).collect();
        assert_eq!(fields, vec!["Name", "Area"]);
    }

    #[test]
    fn test_missing_status_skipped() {
        let mut props = full_properties();
        props["Status"] = json!({ "type": "select", "select": null });
        assert_eq!(normalize_record(&record("p4", props)), Normalized::MissingStatus);

        let mut props = full_properties();
        props.as_object_mut().unwrap().remove("Status");
        assert_eq!(normalize_record(&record("p5", props)), Normalized::MissingStatus);
    }

    #[test]
    fn test_missing_coordinate_is_malformed() {
        let mut props = full_properties();
        props["Latitude"] = json!({ "type": "number", "number": null });

        let Normalized::Malformed(errors) = normalize_record(&record("p6", props)) else {
            panic!("expected malformed");
        };
        assert_eq!(
            errors,
            vec![FieldError {
                record_id: "p6".into(),
                field: "Latitude",
                problem: FieldProblem::Missing,
            }]
        );
        assert_eq!(errors[0].to_string(), "p6: 'Latitude' is missing");
    }

    #[test]
    fn test_batch_continues_past_bad_records() {
        let mut no_status = full_properties();
        no_status["Status"]["select"] = Value::Null;
        let mut no_lng = full_properties();
        no_lng.as_object_mut().unwrap().remove("Longitude");

        let report = normalize_all(&[
            record("a", full_properties()),
            record("b", no_status),
            record("c", no_lng),
            record("d", full_properties()),
        ]);

        let ids: Vec<_> = report.drafts.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(report.missing_status, 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.field_errors.len(), 1);
    }

    #[test]
    fn test_blank_id_gets_generated() {
        let Normalized::Draft { draft, .. } = normalize_record(&record("", full_properties())) else {
            panic!("expected a draft");
        };
        assert!(uuid::Uuid::parse_str(&draft.id).is_ok());
    }
}

//! Form validation for panel add/edit modals.
//!
//! Every field is checked before a request leaves the dashboard. Count-like stats must be
//! whole numbers >= 0; accuracy-style fields are deliberately kept as opaque strings.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Number, Value};

use crate::{error::ValidationErrors, models::FieldDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Integer >= 0. Numeric strings from form inputs are coerced.
    Count,
    /// Number >= 0 (ratings, fees).
    Decimal,
    /// Free text; must be non-blank when required.
    Text,
    /// Stored verbatim as a string, never range-checked (e.g. "75%").
    Opaque,
    /// One of a fixed set of codes.
    Choice(&'static [&'static str]),
    /// Calendar date, `YYYY-MM-DD` or RFC 3339.
    Date,
    /// Multipart upload (flags, club crests).
    File,
}

impl FieldKind {
    fn name(&self) -> &'static str {
        match self {
            FieldKind::Count => "count",
            FieldKind::Decimal => "decimal",
            FieldKind::Text => "text",
            FieldKind::Opaque => "opaque",
            FieldKind::Choice(_) => "choice",
            FieldKind::Date => "date",
            FieldKind::File => "file",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
        }
    }
}

/// Whether a submission creates a record or edits an existing one.
/// Uploaded files are only mandatory on create; an edit may keep the stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

/// Upload
///
/// A file part received from a multipart form, forwarded as-is to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Submission
///
/// The raw contents of an add/edit modal: scalar fields plus any uploaded files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub fields: Map<String, Value>,
    pub files: Vec<Upload>,
}

impl Submission {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            files: Vec::new(),
        }
    }

    pub fn file(&self, field: &str) -> Option<&Upload> {
        self.files.iter().find(|upload| upload.field == field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub fields: &'static [FieldSpec],
}

impl Schema {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    pub fn has_files(&self) -> bool {
        self.fields.iter().any(|f| f.kind == FieldKind::File)
    }

    pub fn descriptors(&self) -> Vec<FieldDescriptor> {
        self.fields
            .iter()
            .map(|spec| FieldDescriptor {
                name: spec.name.to_string(),
                label: spec.label.to_string(),
                kind: spec.kind.name().to_string(),
                required: spec.required,
                options: match spec.kind {
                    FieldKind::Choice(options) => {
                        options.iter().map(|o| o.to_string()).collect()
                    }
                    _ => Vec::new(),
                },
            })
            .collect()
    }

    /// validate
    ///
    /// Checks `submission` against this schema and returns a normalised copy holding only
    /// the schema's fields. Fields not in the schema (including any owner reference) are
    /// dropped so the form cannot reassign a record to another player.
    pub fn validate(
        &self,
        submission: &Submission,
        mode: Mode,
    ) -> Result<Submission, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let mut clean = Submission::default();

        for spec in self.fields {
            if spec.kind == FieldKind::File {
                match submission.file(spec.name) {
                    Some(upload) => clean.files.push(upload.clone()),
                    None if spec.required && mode == Mode::Create => {
                        errors.add(spec.name, format!("{} is required", spec.label));
                    }
                    None => {}
                }
                continue;
            }

            let value = submission.fields.get(spec.name).filter(|v| !is_blank(v));
            let Some(value) = value else {
                if spec.required {
                    errors.add(spec.name, format!("{} is required", spec.label));
                }
                continue;
            };

            match check_value(spec, value) {
                Ok(normalised) => {
                    clean.fields.insert(spec.name.to_string(), normalised);
                }
                Err(message) => errors.add(spec.name, format!("{} {}", spec.label, message)),
            }
        }

        if errors.is_empty() { Ok(clean) } else { Err(errors) }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn check_value(spec: &FieldSpec, value: &Value) -> Result<Value, String> {
    match spec.kind {
        FieldKind::Count => parse_count(value).map(|n| Value::Number(Number::from(n))),
        FieldKind::Decimal => parse_number(value)
            .ok_or_else(|| "must be a number".to_string())
            .and_then(|n| {
                if n < 0.0 {
                    return Err("must be 0 or greater".to_string());
                }
                Number::from_f64(n)
                    .map(Value::Number)
                    .ok_or_else(|| "must be a finite number".to_string())
            }),
        FieldKind::Text => match value {
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            _ => Err("must be text".to_string()),
        },
        FieldKind::Opaque => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err("must be text".to_string()),
        },
        FieldKind::Choice(options) => match value.as_str().map(str::trim) {
            Some(code) if options.contains(&code) => Ok(Value::String(code.to_string())),
            _ => Err(format!("must be one of: {}", options.join(", "))),
        },
        FieldKind::Date => match value.as_str().map(str::trim) {
            Some(raw)
                if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
                    || DateTime::parse_from_rfc3339(raw).is_ok() =>
            {
                Ok(Value::String(raw.to_string()))
            }
            _ => Err("must be a date (YYYY-MM-DD)".to_string()),
        },
        FieldKind::File => Err("must be uploaded as a file".to_string()),
    }
}

/// Largest whole number a float carries exactly.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_991.0;

/// Reads a count without passing integers through a float, so nothing is clamped or rounded.
fn parse_count(value: &Value) -> Result<u64, String> {
    let exact = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    if let Some(n) = exact {
        return Ok(n);
    }

    let n = parse_number(value).ok_or_else(|| "must be a number".to_string())?;
    if n < 0.0 {
        Err("must be 0 or greater".to_string())
    } else if n.fract() != 0.0 {
        Err("must be a whole number".to_string())
    } else if n > MAX_EXACT_FLOAT_INT {
        Err("is too large".to_string())
    } else {
        Ok(n as u64)
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: Schema = Schema::new(&[
        FieldSpec::required("goals", "Goals", FieldKind::Count),
        FieldSpec::optional("shootingAccuracy", "Shooting accuracy", FieldKind::Opaque),
        FieldSpec::required("position", "Position", FieldKind::Choice(&["GK", "ST"])),
        FieldSpec::required("flag", "Flag", FieldKind::File),
    ]);

    fn submission(fields: Value) -> Submission {
        match fields {
            Value::Object(map) => Submission::from_fields(map),
            _ => Submission::default(),
        }
    }

    #[test]
    fn numeric_strings_are_coerced_to_counts() {
        let input = submission(json!({ "goals": " 12 ", "position": "ST" }));
        let clean = SAMPLE.validate(&input, Mode::Update).unwrap();
        assert_eq!(clean.fields["goals"], json!(12));
    }

    #[test]
    fn negative_and_fractional_counts_are_rejected() {
        let negative = SAMPLE
            .validate(&submission(json!({ "goals": -1, "position": "ST" })), Mode::Update)
            .unwrap_err();
        assert_eq!(negative.get("goals"), Some("Goals must be 0 or greater"));

        let fractional = SAMPLE
            .validate(&submission(json!({ "goals": "2.5", "position": "ST" })), Mode::Update)
            .unwrap_err();
        assert_eq!(fractional.get("goals"), Some("Goals must be a whole number"));
    }

    #[test]
    fn counts_are_never_clamped_or_rounded() {
        let large = SAMPLE
            .validate(
                &submission(json!({ "goals": 9_007_199_254_740_993_u64, "position": "ST" })),
                Mode::Update,
            )
            .unwrap();
        assert_eq!(large.fields["goals"], json!(9_007_199_254_740_993_u64));

        for too_large in [json!("1e30"), json!(1e30), json!("18446744073709551616")] {
            let errors = SAMPLE
                .validate(&submission(json!({ "goals": too_large, "position": "ST" })), Mode::Update)
                .unwrap_err();
            assert_eq!(errors.get("goals"), Some("Goals is too large"));
        }

        let negative = SAMPLE
            .validate(&submission(json!({ "goals": "-3", "position": "ST" })), Mode::Update)
            .unwrap_err();
        assert_eq!(negative.get("goals"), Some("Goals must be 0 or greater"));
    }

    #[test]
    fn opaque_fields_keep_free_text() {
        let input = submission(json!({ "goals": 0, "position": "GK", "shootingAccuracy": "75%" }));
        let clean = SAMPLE.validate(&input, Mode::Update).unwrap();
        assert_eq!(clean.fields["shootingAccuracy"], json!("75%"));
    }

    #[test]
    fn files_are_only_required_on_create() {
        let input = submission(json!({ "goals": 1, "position": "GK" }));
        assert!(SAMPLE.validate(&input, Mode::Update).is_ok());

        let errors = SAMPLE.validate(&input, Mode::Create).unwrap_err();
        assert_eq!(errors.get("flag"), Some("Flag is required"));
    }

    #[test]
    fn unknown_fields_and_bad_choices() {
        let input = submission(json!({ "goals": 1, "position": "XX", "player": "someone-else" }));
        let errors = SAMPLE.validate(&input, Mode::Update).unwrap_err();
        assert_eq!(errors.get("position"), Some("Position must be one of: GK, ST"));

        let ok = SAMPLE
            .validate(&submission(json!({ "goals": 1, "position": "GK", "player": "x" })), Mode::Update)
            .unwrap();
        assert!(!ok.fields.contains_key("player"));
    }
}

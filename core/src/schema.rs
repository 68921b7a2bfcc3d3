//! Structural validation of radar data
//!
//! Radar data and plugin options are described as JSON Schema documents and
//! checked with `jsonschema`. Every error is collected instead of stopping at
//! the first one, so a single build run reports all problems at once.
//! Messages use the `"<path>" <problem>` form, with paths such as
//! `rings[0].color`, ordered by where the field is declared in the schema.

use std::fmt;
use std::sync::OnceLock;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde_json::{json, Value};
use thiserror::Error;

use crate::radar::{Moved, MAX_RINGS, QUADRANT_COUNT};

/// Largest integer that survives a round trip through an IEEE double
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Pattern ring colors must match
const HEX_COLOR_PATTERN: &str = "^#[0-9A-Fa-f]{6}$";

#[derive(Debug, Error)]
#[error("[docusaurus-techradar-plugin] Invalid radar data in {source_label}:\n{violations}")]
pub struct DataError {
    pub source_label: String,
    pub violations: Violations,
}

#[derive(Debug, Error)]
#[error("failed to compile {name} schema: {reason}")]
pub struct SchemaError {
    pub name: &'static str,
    pub reason: String,
}

/// Ordered list of violation messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<String>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &str, problem: impl fmt::Display) {
        self.0.push(format!("\"{}\" {}", display_path(path), problem));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Messages joined into one sentence-separated line
    pub fn joined(&self) -> String {
        self.0.join(". ")
    }
}

impl fmt::Display for Violations {
    /// One `  - message` line per violation
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {message}")?;
        }
        Ok(())
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "value"
    } else {
        path
    }
}

/// One step of an instance path
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Split a JSON pointer such as `/entries/0/moved` into segments.
///
/// Numeric tokens are array indexes; no declared key is numeric.
fn parse_pointer(pointer: &str) -> Vec<Segment> {
    pointer
        .split('/')
        .skip(1)
        .map(|raw| {
            let token = raw.replace("~1", "/").replace("~0", "~");
            match token.parse::<usize>() {
                Ok(index) => Segment::Index(index),
                Err(_) => Segment::Key(token),
            }
        })
        .collect()
}

/// `entries[0].moved` style rendering of a path
fn dotted(segments: &[Segment]) -> String {
    let mut path = String::new();
    for segment in segments {
        match segment {
            Segment::Key(key) if path.is_empty() => path.push_str(key),
            Segment::Key(key) => {
                path.push('.');
                path.push_str(key);
            }
            Segment::Index(index) => path.push_str(&format!("[{index}]")),
        }
    }
    path
}

fn with_key(segments: &[Segment], key: &str) -> Vec<Segment> {
    let mut path = segments.to_vec();
    path.push(Segment::Key(key.to_string()));
    path
}

/// Sort key placing a path in schema declaration order.
///
/// Keys rank by their position under `properties`; undeclared keys rank
/// after every declared one. A parent sorts before its children.
fn declaration_rank(document: &Value, segments: &[Segment]) -> Vec<usize> {
    let mut node = Some(document);
    let mut rank = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Key(key) => {
                let properties = node.and_then(|n| n.get("properties")).and_then(Value::as_object);
                let position = properties
                    .and_then(|p| p.keys().position(|k| k == key))
                    .unwrap_or_else(|| properties.map_or(0, |p| p.len()));
                rank.push(position);
                node = properties.and_then(|p| p.get(key));
            }
            Segment::Index(index) => {
                rank.push(*index);
                node = node.and_then(|n| n.get("items"));
            }
        }
    }
    rank
}

fn item_count(rule: &Value, keyword: &str, limit: &Value) -> String {
    let exact = rule.get("minItems") == rule.get("maxItems");
    match keyword {
        _ if exact => format!("must contain {limit} items"),
        "minItems" => format!("must contain at least {limit} items"),
        _ => format!("must contain less than or equal to {limit} items"),
    }
}

/// Problem text for one error, read from the keyword that rejected it
fn describe(error: &ValidationError<'_>, document: &Value) -> String {
    let schema_path = error.schema_path.to_string();
    let (parent, keyword) = schema_path.rsplit_once('/').unwrap_or(("", schema_path.as_str()));
    let rule = document.pointer(parent).unwrap_or(&Value::Null);
    let limit = rule.get(keyword).unwrap_or(&Value::Null);

    match keyword {
        "type" => match limit.as_str() {
            Some("object") => "must be of type object".to_string(),
            Some("array") => "must be an array".to_string(),
            Some("string") => "must be a string".to_string(),
            Some("integer") if error.instance.is_number() => "must be an integer".to_string(),
            Some("integer") | Some("number") => "must be a number".to_string(),
            _ => error.to_string(),
        },
        "minLength" => "is not allowed to be empty".to_string(),
        "pattern" => format!(
            "with value {} fails to match the required pattern: /{}/",
            error.instance,
            limit.as_str().unwrap_or_default()
        ),
        "minimum" => format!("must be greater than or equal to {limit}"),
        "maximum" => format!("must be less than or equal to {limit}"),
        "minItems" | "maxItems" => item_count(rule, keyword, limit),
        "enum" => {
            let allowed: Vec<String> = limit
                .as_array()
                .map(|options| options.iter().map(Value::to_string).collect())
                .unwrap_or_default();
            format!("must be one of [{}]", allowed.join(", "))
        }
        _ => error.to_string(),
    }
}

/// A compiled JSON Schema together with the document it was built from
pub struct Schema {
    document: Value,
    validator: Validator,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("document", &self.document).finish_non_exhaustive()
    }
}

impl Schema {
    pub fn compile(name: &'static str, document: Value) -> Result<Self, SchemaError> {
        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        let validator = opts.build(&document).map_err(|e| SchemaError {
            name,
            reason: e.to_string(),
        })?;
        Ok(Schema { document, validator })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Every violation in `instance`, in declaration order
    pub fn violations(&self, instance: &Value) -> Violations {
        let mut found: Vec<(Vec<usize>, Vec<Segment>, String)> = Vec::new();
        for error in self.validator.iter_errors(instance) {
            let at = parse_pointer(&error.instance_path.to_string());
            match &error.kind {
                ValidationErrorKind::Required { property } => {
                    let key = property.as_str().map_or_else(|| property.to_string(), str::to_string);
                    let path = with_key(&at, &key);
                    found.push((declaration_rank(&self.document, &path), path, "is required".to_string()));
                }
                ValidationErrorKind::AdditionalProperties { unexpected } => {
                    for key in unexpected {
                        let path = with_key(&at, key);
                        found.push((declaration_rank(&self.document, &path), path, "is not allowed".to_string()));
                    }
                }
                _ => {
                    let problem = describe(&error, &self.document);
                    found.push((declaration_rank(&self.document, &at), at, problem));
                }
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut violations = Violations::new();
        for (_, path, problem) in found {
            violations.push(&dotted(&path), problem);
        }
        violations
    }
}

/// Violations of `instance` against a schema that may have failed to compile
pub(crate) fn check(schema: &Result<Schema, SchemaError>, instance: &Value) -> Violations {
    match schema {
        Ok(schema) => schema.violations(instance),
        Err(e) => {
            let mut violations = Violations::new();
            violations.push("", format!("could not be validated: {e}"));
            violations
        }
    }
}

/// Rewrite integral floats such as `1.0` as integers.
///
/// JSON does not tell `1` and `1.0` apart, and both validate as integers;
/// typed integer fields only deserialize from the integer form.
pub fn normalize_integers(value: Value) -> Value {
    match value {
        Value::Number(n) if !n.is_i64() && !n.is_u64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER as f64 => Value::from(f as i64),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_integers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, normalize_integers(value)))
                .collect(),
        ),
        other => other,
    }
}

fn name_schema() -> Value {
    json!({ "type": "string", "minLength": 1 })
}

/// JSON Schema for radar data
pub fn radar_data_document() -> Value {
    let moved: Vec<i8> = Moved::VALUES.to_vec();
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "RadarData",
        "type": "object",
        "properties": {
            "title": name_schema(),
            "quadrants": {
                "type": "array",
                "minItems": QUADRANT_COUNT,
                "maxItems": QUADRANT_COUNT,
                "items": {
                    "type": "object",
                    "properties": { "name": name_schema() },
                    "required": ["name"],
                    "additionalProperties": false
                }
            },
            "rings": {
                "type": "array",
                "minItems": 1,
                "maxItems": MAX_RINGS,
                "items": {
                    "type": "object",
                    "properties": {
                        "name": name_schema(),
                        "color": { "type": "string", "pattern": HEX_COLOR_PATTERN }
                    },
                    "required": ["name", "color"],
                    "additionalProperties": false
                }
            },
            "entries": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "label": name_schema(),
                        "quadrant": { "type": "integer", "minimum": 0, "maximum": QUADRANT_COUNT - 1 },
                        // Only bounded below: ring indexes are not checked against `rings`.
                        "ring": { "type": "integer", "minimum": 0, "maximum": MAX_SAFE_INTEGER },
                        "moved": { "enum": moved },
                        "link": name_schema()
                    },
                    "required": ["label", "quadrant", "ring", "moved"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["quadrants", "rings", "entries"],
        "additionalProperties": false
    })
}

fn radar_data_schema() -> &'static Result<Schema, SchemaError> {
    static SCHEMA: OnceLock<Result<Schema, SchemaError>> = OnceLock::new();
    SCHEMA.get_or_init(|| Schema::compile("radar data", radar_data_document()))
}

/// Collect every violation in `raw` without failing
pub fn collect_data_violations(raw: &Value) -> Violations {
    check(radar_data_schema(), raw)
}

/// Validate raw radar data, naming `source_label` in the error.
///
/// This is a gate: on success the caller keeps using the value it already has.
pub fn validate_data(raw: &Value, source_label: &str) -> Result<(), DataError> {
    let violations = collect_data_violations(raw);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(DataError {
            source_label: source_label.to_string(),
            violations,
        })
    }
}

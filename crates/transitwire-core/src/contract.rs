//! # Structural contracts
//!
//! Declarative shape descriptions used to check request parameters before a
//! call and response payloads after date normalization.
//!
//! | Direction | Unknown fields | Failure |
//! |-----------|----------------|---------|
//! | Input | rejected | [`FetchErrorKind::InputValidation`](crate::FetchErrorKind) |
//! | Output | passed through | [`FetchErrorKind::OutputValidation`](crate::FetchErrorKind) |
//!
//! Validation never stops at the first problem: the returned
//! [`ContractViolation`] lists every offending path.
//!
//! Contracts are plain serde data so catalogs can ship them as JSON:
//!
//! ```json
//! { "type": "object", "fields": [
//!     { "name": "VesselID", "shape": { "type": "integer" } },
//!     { "name": "LeftDock", "shape": { "type": "date" }, "nullable": true }
//! ] }
//! ```

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::date_codec;

/// Flat request parameter object.
pub type Params = Map<String, Value>;

/// Expected shape of a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Contract {
    String,
    Integer,
    Number,
    Boolean,
    /// A string in either date encoding.
    Date,
    Any,
    Array {
        items: Box<Contract>,
        #[serde(default)]
        nullable_items: bool,
    },
    Object {
        #[serde(default)]
        fields: Vec<Field>,
    },
}

/// One declared member of an object contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub shape: Contract,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub optional: bool,
}

impl Field {
    pub fn required(name: impl Into<String>, shape: Contract) -> Self {
        Self {
            name: name.into(),
            shape,
            nullable: false,
            optional: false,
        }
    }

    pub fn nullable(name: impl Into<String>, shape: Contract) -> Self {
        Self {
            nullable: true,
            ..Self::required(name, shape)
        }
    }

    pub fn optional(name: impl Into<String>, shape: Contract) -> Self {
        Self {
            optional: true,
            ..Self::required(name, shape)
        }
    }
}

impl Contract {
    pub fn object(fields: Vec<Field>) -> Self {
        Self::Object { fields }
    }

    pub fn array_of(items: Contract) -> Self {
        Self::Array {
            items: Box::new(items),
            nullable_items: false,
        }
    }

    /// Object contract with no fields: accepts only an empty parameter set.
    pub fn empty() -> Self {
        Self::Object { fields: Vec::new() }
    }

    /// True when an empty parameter object satisfies this contract.
    pub fn accepts_empty_input(&self) -> bool {
        match self {
            Self::Any => true,
            Self::Object { fields } => fields.iter().all(|field| field.optional),
            _ => false,
        }
    }

    /// Names of top-level fields declared as dates.
    pub fn date_fields(&self) -> impl Iterator<Item = &str> {
        let fields: &[Field] = match self {
            Self::Object { fields } => fields,
            _ => &[],
        };
        fields
            .iter()
            .filter(|field| field.shape == Self::Date)
            .map(|field| field.name.as_str())
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Any => "any",
            Self::Array { .. } => "array",
            Self::Object { .. } => "object",
        }
    }
}

/// A single offending path and the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub path: String,
    pub reason: String,
}

impl Display for FieldIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Complete list of contract failures for one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    issues: Vec<FieldIssue>,
}

impl ContractViolation {
    pub fn single(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue {
                path: path.into(),
                reason: reason.into(),
            }],
        }
    }

    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<FieldIssue> {
        self.issues
    }

    pub fn paths(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.path.as_str()).collect()
    }
}

impl Display for ContractViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, issue) in self.issues.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ContractViolation {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

/// Checks caller parameters. Returns them unchanged when valid.
pub fn validate_input(contract: &Contract, params: Params) -> Result<Params, ContractViolation> {
    let mut issues = Vec::new();
    match contract {
        Contract::Any => {}
        Contract::Object { fields } => {
            check_object(fields, &params, "", Direction::Input, &mut issues);
        }
        other => issues.push(FieldIssue {
            path: root_path(""),
            reason: format!(
                "input contract must describe an object, found '{}'",
                other.label()
            ),
        }),
    }
    finish(params, issues)
}

/// Checks a decoded response. Undeclared fields are tolerated and passed through.
pub fn validate_output(contract: &Contract, data: Value) -> Result<Value, ContractViolation> {
    let mut issues = Vec::new();
    check_value(contract, &data, "", Direction::Output, &mut issues);
    finish(data, issues)
}

fn finish<T>(value: T, issues: Vec<FieldIssue>) -> Result<T, ContractViolation> {
    if issues.is_empty() {
        Ok(value)
    } else {
        Err(ContractViolation { issues })
    }
}

fn check_value(
    contract: &Contract,
    value: &Value,
    path: &str,
    direction: Direction,
    issues: &mut Vec<FieldIssue>,
) {
    let matches = match (contract, value) {
        (Contract::Any, _) => true,
        (Contract::String, Value::String(_)) => true,
        (Contract::Integer, Value::Number(number)) => number.is_i64() || number.is_u64(),
        (Contract::Number, Value::Number(_)) => true,
        (Contract::Boolean, Value::Bool(_)) => true,
        (Contract::Date, Value::String(text)) => {
            if !date_codec::decode(text).is_recognized() {
                issues.push(FieldIssue {
                    path: root_path(path),
                    reason: format!("unrecognized date encoding '{text}'"),
                });
            }
            true
        }
        (
            Contract::Array {
                items,
                nullable_items,
            },
            Value::Array(values),
        ) => {
            for (index, item) in values.iter().enumerate() {
                let item_path = format!("{}[{index}]", path);
                if item.is_null() {
                    if !nullable_items {
                        issues.push(FieldIssue {
                            path: item_path,
                            reason: String::from("must not be null"),
                        });
                    }
                    continue;
                }
                check_value(items, item, &item_path, direction, issues);
            }
            true
        }
        (Contract::Object { fields }, Value::Object(map)) => {
            check_object(fields, map, path, direction, issues);
            true
        }
        _ => false,
    };

    if !matches {
        issues.push(FieldIssue {
            path: root_path(path),
            reason: format!(
                "expected {}, found {}",
                contract.label(),
                json_type_name(value)
            ),
        });
    }
}

fn check_object(
    fields: &[Field],
    map: &Map<String, Value>,
    path: &str,
    direction: Direction,
    issues: &mut Vec<FieldIssue>,
) {
    for field in fields {
        let field_path = join_path(path, &field.name);
        match map.get(&field.name) {
            None => {
                if !field.optional {
                    issues.push(FieldIssue {
                        path: field_path,
                        reason: String::from("required field is missing"),
                    });
                }
            }
            Some(Value::Null) => {
                if !field.nullable && field.shape != Contract::Any {
                    issues.push(FieldIssue {
                        path: field_path,
                        reason: String::from("must not be null"),
                    });
                }
            }
            Some(value) => check_value(&field.shape, value, &field_path, direction, issues),
        }
    }

    if direction == Direction::Input {
        for key in map.keys() {
            if !fields.iter().any(|field| &field.name == key) {
                issues.push(FieldIssue {
                    path: join_path(path, key),
                    reason: String::from("unknown parameter"),
                });
            }
        }
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}.{name}")
    }
}

fn root_path(path: &str) -> String {
    if path.is_empty() {
        String::from("$")
    } else {
        path.to_owned()
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

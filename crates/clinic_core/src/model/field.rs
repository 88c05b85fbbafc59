//! Field table and tagged values for batch mutation.
//!
//! # Responsibility
//! - Declare every mutable clinical field once: wire name, owning entity,
//!   value kind and the value `unset` restores.
//! - Apply `set | push | pull | unset | inc` to a current value and return the
//!   next value, without touching storage.
//!
//! # Invariants
//! - Routing is decided by table lookup only: a field either appears in
//!   `FIELD_TABLE` with one owner, or the operation fails as unknown.
//! - Operations never change a field's kind; a kind mismatch is an error for
//!   that single operation.

use crate::model::patient::DEFAULT_HYGIENE;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Tagged value carried by batch operations.
///
/// Serialized untagged, so JSON `null | number | string | [string] | {..}`
/// map onto the variants directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Number(f64),
    Text(String),
    TextList(Vec<String>),
    Object(serde_json::Map<String, serde_json::Value>),
}

impl FieldValue {
    /// Converts a raw JSON value; booleans and mixed arrays are rejected.
    pub fn from_json(field: &str, value: serde_json::Value) -> Result<Self, FieldError> {
        serde_json::from_value(value).map_err(|_| FieldError::InvalidValue {
            field: field.to_string(),
            message: "expected null, number, string, list of strings or object".to_string(),
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Number(value) => number_to_json(*value),
            Self::Text(value) => serde_json::Value::String(value.clone()),
            Self::TextList(values) => serde_json::Value::Array(
                values
                    .iter()
                    .cloned()
                    .map(serde_json::Value::String)
                    .collect(),
            ),
            Self::Object(map) => serde_json::Value::Object(map.clone()),
        }
    }

    pub(crate) fn kind_label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::TextList(_) => "text_list",
            Self::Object(_) => "object",
        }
    }
}

/// Integral values are emitted as JSON integers so `70` is not echoed as `70.0`.
fn number_to_json(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() <= I64_EXACT_LIMIT {
        return serde_json::Value::Number(serde_json::Number::from(value as i64));
    }
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Largest magnitude at which every integer is exactly representable in `f64`.
const I64_EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Entity that owns a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOwner {
    Patient,
    Encounter,
}

/// Value kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    TextList,
    Number,
    Object,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::TextList => "text_list",
            Self::Number => "number",
            Self::Object => "object",
        }
    }
}

/// Value a field takes when it is absent or unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Null,
    EmptyText,
    EmptyList,
    Hygiene,
}

impl FieldDefault {
    pub fn value(self) -> FieldValue {
        match self {
            Self::Null => FieldValue::Null,
            Self::EmptyText => FieldValue::Text(String::new()),
            Self::EmptyList => FieldValue::TextList(Vec::new()),
            Self::Hygiene => DEFAULT_HYGIENE.to_field_value(),
        }
    }
}

/// Patient-owned mutable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientField {
    FirstName,
    LastName,
    BirthDate,
    Sex,
    Phone,
    Email,
    Address,
    HealthPlan,
    Occupation,
    Allergies,
    Medications,
    Conditions,
    Surgeries,
    FamilyHistory,
    WeightKg,
    HeightCm,
    Hygiene,
}

/// Encounter-owned mutable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterField {
    Anamnesis,
    RequestedExams,
    Instructions,
    Prescriptions,
}

/// Concrete storage target of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    Patient(PatientField),
    Encounter(EncounterField),
}

/// One row of the field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name as sent by callers.
    pub name: &'static str,
    pub target: FieldTarget,
    pub kind: FieldKind,
    pub default: FieldDefault,
}

impl FieldSpec {
    pub fn owner(&self) -> FieldOwner {
        match self.target {
            FieldTarget::Patient(_) => FieldOwner::Patient,
            FieldTarget::Encounter(_) => FieldOwner::Encounter,
        }
    }
}

const fn patient(
    name: &'static str,
    field: PatientField,
    kind: FieldKind,
    default: FieldDefault,
) -> FieldSpec {
    FieldSpec {
        name,
        target: FieldTarget::Patient(field),
        kind,
        default,
    }
}

const fn encounter(
    name: &'static str,
    field: EncounterField,
    kind: FieldKind,
    default: FieldDefault,
) -> FieldSpec {
    FieldSpec {
        name,
        target: FieldTarget::Encounter(field),
        kind,
        default,
    }
}

/// Every field reachable through batch mutation.
pub const FIELD_TABLE: &[FieldSpec] = &[
    patient("nombre", PatientField::FirstName, FieldKind::Text, FieldDefault::EmptyText),
    patient("apellidos", PatientField::LastName, FieldKind::Text, FieldDefault::EmptyText),
    patient("fechaNacimiento", PatientField::BirthDate, FieldKind::Text, FieldDefault::Null),
    patient("sexo", PatientField::Sex, FieldKind::Text, FieldDefault::Null),
    patient("telefono", PatientField::Phone, FieldKind::Text, FieldDefault::Null),
    patient("email", PatientField::Email, FieldKind::Text, FieldDefault::Null),
    patient("direccion", PatientField::Address, FieldKind::Text, FieldDefault::Null),
    patient("prevision", PatientField::HealthPlan, FieldKind::Text, FieldDefault::Null),
    patient("ocupacion", PatientField::Occupation, FieldKind::Text, FieldDefault::Null),
    patient("alergias", PatientField::Allergies, FieldKind::TextList, FieldDefault::EmptyList),
    patient("medicamentos", PatientField::Medications, FieldKind::TextList, FieldDefault::EmptyList),
    patient("enfermedades", PatientField::Conditions, FieldKind::TextList, FieldDefault::EmptyList),
    patient("cirugias", PatientField::Surgeries, FieldKind::TextList, FieldDefault::EmptyList),
    patient(
        "antecedentesFamiliares",
        PatientField::FamilyHistory,
        FieldKind::TextList,
        FieldDefault::EmptyList,
    ),
    patient("peso", PatientField::WeightKg, FieldKind::Number, FieldDefault::Null),
    patient("talla", PatientField::HeightCm, FieldKind::Number, FieldDefault::Null),
    patient("higiene", PatientField::Hygiene, FieldKind::Object, FieldDefault::Hygiene),
    encounter("anamnesis", EncounterField::Anamnesis, FieldKind::Text, FieldDefault::EmptyText),
    encounter(
        "requestedExams",
        EncounterField::RequestedExams,
        FieldKind::TextList,
        FieldDefault::EmptyList,
    ),
    encounter(
        "instructions",
        EncounterField::Instructions,
        FieldKind::Text,
        FieldDefault::EmptyText,
    ),
    encounter(
        "prescriptions",
        EncounterField::Prescriptions,
        FieldKind::TextList,
        FieldDefault::EmptyList,
    ),
];

/// Looks up a field by its wire name (exact, case-sensitive).
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELD_TABLE.iter().find(|spec| spec.name == name)
}

/// Batch operation verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOp {
    Set,
    Push,
    Pull,
    Unset,
    Inc,
}

impl FieldOp {
    /// Parses an operation verb; a leading `$` is accepted for document-store
    /// style callers (`$set`, `$push`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().trim_start_matches('$') {
            "set" => Some(Self::Set),
            "push" => Some(Self::Push),
            "pull" => Some(Self::Pull),
            "unset" => Some(Self::Unset),
            "inc" => Some(Self::Inc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Unset => "unset",
            Self::Inc => "inc",
        }
    }
}

/// Per-operation failures of the batch engine.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    UnsupportedOperation(String),
    UnknownField(String),
    MissingValue {
        field: String,
        op: FieldOp,
    },
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
    NotApplicable {
        field: String,
        op: FieldOp,
        kind: FieldKind,
    },
    InvalidValue {
        field: String,
        message: String,
    },
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedOperation(op) => write!(f, "unsupported operation `{op}`"),
            Self::UnknownField(field) => write!(f, "unknown field `{field}`"),
            Self::MissingValue { field, op } => {
                write!(f, "operation `{}` on `{field}` requires a value", op.as_str())
            }
            Self::TypeMismatch {
                field,
                expected,
                actual,
            } => write!(f, "field `{field}` expects {expected}, got {actual}"),
            Self::NotApplicable { field, op, kind } => write!(
                f,
                "operation `{}` does not apply to {} field `{field}`",
                op.as_str(),
                kind.as_str()
            ),
            Self::InvalidValue { field, message } => {
                write!(f, "invalid value for `{field}`: {message}")
            }
        }
    }
}

impl Error for FieldError {}

/// Computes the next value of one field.
///
/// `filters` narrow `set` to matching list elements (replace in place) and
/// add match candidates for `pull`.
pub fn apply_field_op(
    spec: &FieldSpec,
    op: FieldOp,
    current: FieldValue,
    value: Option<&FieldValue>,
    filters: &[FieldValue],
) -> Result<FieldValue, FieldError> {
    match op {
        FieldOp::Set => {
            let value = require_value(spec, op, value)?;
            if filters.is_empty() {
                coerce(spec, value)
            } else {
                replace_matching(spec, current, value, filters)
            }
        }
        FieldOp::Push => {
            let mut items = current_list(spec, op, current)?;
            match require_value(spec, op, value)? {
                FieldValue::Text(item) => items.push(item.clone()),
                FieldValue::TextList(more) => items.extend(more.iter().cloned()),
                other => return Err(mismatch(spec, "text or text_list", other)),
            }
            Ok(FieldValue::TextList(items))
        }
        FieldOp::Pull => {
            let items = current_list(spec, op, current)?;
            let mut targets = Vec::new();
            if let Some(value) = value {
                collect_texts(spec, value, &mut targets)?;
            }
            for filter in filters {
                collect_texts(spec, filter, &mut targets)?;
            }
            if targets.is_empty() {
                return Err(FieldError::MissingValue {
                    field: spec.name.to_string(),
                    op,
                });
            }
            Ok(FieldValue::TextList(
                items
                    .into_iter()
                    .filter(|item| !targets.contains(item))
                    .collect(),
            ))
        }
        FieldOp::Unset => Ok(spec.default.value()),
        FieldOp::Inc => {
            if spec.kind != FieldKind::Number {
                return Err(not_applicable(spec, op));
            }
            let delta = match require_value(spec, op, value)? {
                FieldValue::Number(delta) => *delta,
                other => return Err(mismatch(spec, "number", other)),
            };
            let base = match current {
                FieldValue::Number(base) => base,
                FieldValue::Null => 0.0,
                other => return Err(mismatch(spec, "number", &other)),
            };
            let next = base + delta;
            if !next.is_finite() {
                return Err(FieldError::InvalidValue {
                    field: spec.name.to_string(),
                    message: "increment overflows".to_string(),
                });
            }
            Ok(FieldValue::Number(next))
        }
    }
}

fn require_value<'v>(
    spec: &FieldSpec,
    op: FieldOp,
    value: Option<&'v FieldValue>,
) -> Result<&'v FieldValue, FieldError> {
    value.ok_or_else(|| FieldError::MissingValue {
        field: spec.name.to_string(),
        op,
    })
}

fn coerce(spec: &FieldSpec, value: &FieldValue) -> Result<FieldValue, FieldError> {
    match (spec.kind, value) {
        (FieldKind::Text, FieldValue::Text(_))
        | (FieldKind::TextList, FieldValue::TextList(_))
        | (FieldKind::Number, FieldValue::Number(_))
        | (FieldKind::Object, FieldValue::Object(_)) => Ok(value.clone()),
        (_, FieldValue::Null) if spec.default == FieldDefault::Null => Ok(FieldValue::Null),
        (kind, other) => Err(mismatch(spec, kind.as_str(), other)),
    }
}

fn replace_matching(
    spec: &FieldSpec,
    current: FieldValue,
    value: &FieldValue,
    filters: &[FieldValue],
) -> Result<FieldValue, FieldError> {
    let items = current_list(spec, FieldOp::Set, current)?;
    let replacement = match value {
        FieldValue::Text(text) => text,
        other => return Err(mismatch(spec, "text", other)),
    };
    let mut targets = Vec::new();
    for filter in filters {
        collect_texts(spec, filter, &mut targets)?;
    }
    Ok(FieldValue::TextList(
        items
            .into_iter()
            .map(|item| {
                if targets.contains(&item) {
                    replacement.clone()
                } else {
                    item
                }
            })
            .collect(),
    ))
}

fn current_list(spec: &FieldSpec, op: FieldOp, current: FieldValue) -> Result<Vec<String>, FieldError> {
    if spec.kind != FieldKind::TextList {
        return Err(not_applicable(spec, op));
    }
    match current {
        FieldValue::TextList(items) => Ok(items),
        FieldValue::Null => Ok(Vec::new()),
        other => Err(mismatch(spec, "text_list", &other)),
    }
}

fn collect_texts(
    spec: &FieldSpec,
    value: &FieldValue,
    out: &mut Vec<String>,
) -> Result<(), FieldError> {
    match value {
        FieldValue::Text(text) => out.push(text.clone()),
        FieldValue::TextList(texts) => out.extend(texts.iter().cloned()),
        other => return Err(mismatch(spec, "text or text_list", other)),
    }
    Ok(())
}

fn mismatch(spec: &FieldSpec, expected: &'static str, actual: &FieldValue) -> FieldError {
    FieldError::TypeMismatch {
        field: spec.name.to_string(),
        expected,
        actual: actual.kind_label(),
    }
}

fn not_applicable(spec: &FieldSpec, op: FieldOp) -> FieldError {
    FieldError::NotApplicable {
        field: spec.name.to_string(),
        op,
        kind: spec.kind,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        apply_field_op, field_spec, FieldError, FieldOp, FieldOwner, FieldValue, FIELD_TABLE,
    };
    use std::collections::HashSet;

    fn text(value: &str) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    fn list(values: &[&str]) -> FieldValue {
        FieldValue::TextList(values.iter().map(|value| value.to_string()).collect())
    }

    #[test]
    fn field_names_are_unique() {
        let mut seen = HashSet::new();
        for spec in FIELD_TABLE {
            assert!(seen.insert(spec.name), "duplicate field {}", spec.name);
        }
    }

    #[test]
    fn encounter_only_fields_route_to_encounter() {
        for name in ["anamnesis", "requestedExams", "instructions", "prescriptions"] {
            let spec = field_spec(name).expect("encounter field registered");
            assert_eq!(spec.owner(), FieldOwner::Encounter, "{name}");
        }
        let owners: Vec<_> = FIELD_TABLE
            .iter()
            .filter(|spec| spec.owner() == FieldOwner::Encounter)
            .collect();
        assert_eq!(owners.len(), 4);
        assert_eq!(
            field_spec("alergias").expect("alergias").owner(),
            FieldOwner::Patient
        );
    }

    #[test]
    fn push_onto_absent_list_yields_single_element() {
        let spec = field_spec("requestedExams").expect("spec");
        let next = apply_field_op(spec, FieldOp::Push, list(&[]), Some(&text("hemograma")), &[])
            .expect("push");
        assert_eq!(next, list(&["hemograma"]));
    }

    #[test]
    fn pull_removes_every_matching_element() {
        let spec = field_spec("alergias").expect("spec");
        let current = list(&["polen", "maní", "polen", "látex"]);
        let next =
            apply_field_op(spec, FieldOp::Pull, current, Some(&text("polen")), &[]).expect("pull");
        assert_eq!(next, list(&["maní", "látex"]));
    }

    #[test]
    fn set_with_filters_replaces_matching_elements_only() {
        let spec = field_spec("medicamentos").expect("spec");
        let current = list(&["ibuprofeno 400", "paracetamol"]);
        let next = apply_field_op(
            spec,
            FieldOp::Set,
            current,
            Some(&text("ibuprofeno 600")),
            &[text("ibuprofeno 400")],
        )
        .expect("filtered set");
        assert_eq!(next, list(&["ibuprofeno 600", "paracetamol"]));
    }

    #[test]
    fn inc_starts_from_zero_when_absent() {
        let spec = field_spec("peso").expect("spec");
        let next = apply_field_op(
            spec,
            FieldOp::Inc,
            FieldValue::Null,
            Some(&FieldValue::Number(2.5)),
            &[],
        )
        .expect("inc");
        assert_eq!(next, FieldValue::Number(2.5));
    }

    #[test]
    fn inc_on_text_field_is_not_applicable() {
        let spec = field_spec("anamnesis").expect("spec");
        let err = apply_field_op(
            spec,
            FieldOp::Inc,
            text(""),
            Some(&FieldValue::Number(1.0)),
            &[],
        )
        .expect_err("inc on text must fail");
        assert!(matches!(err, FieldError::NotApplicable { .. }));
    }

    #[test]
    fn set_rejects_kind_mismatch() {
        let spec = field_spec("alergias").expect("spec");
        let err = apply_field_op(spec, FieldOp::Set, list(&[]), Some(&text("polen")), &[])
            .expect_err("text into list must fail");
        assert!(matches!(err, FieldError::TypeMismatch { .. }));
    }

    #[test]
    fn unset_restores_table_default() {
        let spec = field_spec("instructions").expect("spec");
        let next = apply_field_op(spec, FieldOp::Unset, text("reposo"), None, &[]).expect("unset");
        assert_eq!(next, text(""));

        let spec = field_spec("telefono").expect("spec");
        let next = apply_field_op(spec, FieldOp::Unset, text("+56 9"), None, &[]).expect("unset");
        assert_eq!(next, FieldValue::Null);
    }

    #[test]
    fn parse_accepts_document_store_prefix() {
        assert_eq!(FieldOp::parse("$push"), Some(FieldOp::Push));
        assert_eq!(FieldOp::parse("set"), Some(FieldOp::Set));
        assert_eq!(FieldOp::parse("rename"), None);
    }

    #[test]
    fn from_json_rejects_booleans() {
        let err = FieldValue::from_json("peso", serde_json::json!(true)).expect_err("bool");
        assert!(matches!(err, FieldError::InvalidValue { .. }));
        assert_eq!(
            FieldValue::from_json("alergias", serde_json::json!(["a", "b"])).expect("list"),
            list(&["a", "b"])
        );
    }

    #[test]
    fn integral_numbers_echo_as_json_integers() {
        assert_eq!(FieldValue::Number(70.0).to_json(), serde_json::json!(70));
        assert_eq!(FieldValue::Number(-3.0).to_json(), serde_json::json!(-3));
        assert_eq!(FieldValue::Number(72.5).to_json(), serde_json::json!(72.5));
        assert_eq!(FieldValue::Number(f64::NAN).to_json(), serde_json::Value::Null);
    }
}

#![allow(dead_code)]

use alpha_validator::{
    CombinationKey, DiagnosticCode, ExpressionValidator, FieldCatalog, OperatorCatalog,
    ValidationReport, ValidatorContext,
};

pub const OPERATORS_JSON: &str = include_str!("../fixtures/operators.json");
pub const FIELDS_JSON: &str = include_str!("../fixtures/data_fields.json");

pub fn operators() -> OperatorCatalog {
    OperatorCatalog::from_json_str(OPERATORS_JSON).expect("fixture operator catalog")
}

pub fn fields() -> FieldCatalog {
    FieldCatalog::from_json_str(FIELDS_JSON).expect("fixture field catalog")
}

pub fn context() -> ValidatorContext {
    ValidatorContext::new(operators(), fields())
}

pub fn validator_for(region: &str, delay: u32, universe: &str) -> ExpressionValidator {
    context()
        .validator(CombinationKey::new(region, delay, universe))
        .expect("fixture combination")
}

/// Validator for `USA_1_TOP3000`.
pub fn validator() -> ExpressionValidator {
    validator_for("USA", 1, "TOP3000")
}

pub fn validate(text: &str) -> ValidationReport {
    validator().validate(text)
}

pub fn codes(report: &ValidationReport) -> Vec<DiagnosticCode> {
    report.diagnostics.iter().map(|d| d.code).collect()
}

pub fn assert_valid(text: &str) {
    let report = validate(text);
    assert!(
        report.is_valid,
        "expected `{text}` to be valid, found {:?}",
        report.messages()
    );
}

pub fn assert_has_code(text: &str, code: DiagnosticCode) -> ValidationReport {
    let report = validate(text);
    assert!(
        report.diagnostics.iter().any(|d| d.code == code),
        "expected {code} for `{text}`, found {:?}",
        report.messages()
    );
    report
}

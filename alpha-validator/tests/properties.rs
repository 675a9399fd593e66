//! Property-based tests for the validation pipeline.
//!
//! Generated identifiers and expressions check that the lexical rules only
//! fire on the shapes they describe and that well-typed expressions pass
//! every stage untouched.

mod common;

use alpha_validator::{
    check_lexical, CombinationKey, DiagnosticCode, FieldCatalog, OperatorCatalog,
    OperatorSignature, SourceFile, TypeKind, ValidatorContext,
};
use proptest::prelude::*;

fn lexical_codes(text: &str) -> Vec<DiagnosticCode> {
    check_lexical(&SourceFile::inline(text))
        .entries()
        .iter()
        .map(|d| d.code)
        .collect()
}

/// Identifiers made of lowercase words joined by single underscores.
fn valid_identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,8}(_[a-z0-9]{1,4}){0,2}"
}

/// Expressions that type-check against the fixture catalog.
fn well_typed_expression() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        Just("close".to_string()),
        Just("volume".to_string()),
        (1u32..1000).prop_map(|n| n.to_string()),
        (1u32..100, 1u32..100).prop_map(|(whole, fraction)| format!("{whole}.{fraction}")),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), 1u32..250).prop_map(|(x, d)| format!("ts_mean({x}, {d})")),
            (
                inner.clone(),
                prop_oneof![Just("+"), Just("-"), Just("*"), Just("/")],
                inner.clone()
            )
                .prop_map(|(left, op, right)| format!("({left} {op} {right})")),
            inner.prop_map(|x| format!("-({x})")),
        ]
    })
}

proptest! {
    #[test]
    fn valid_identifiers_have_no_lexical_findings(name in valid_identifier()) {
        let text = format!("{name} = close; {name} * 2");
        let codes = lexical_codes(&text);
        prop_assert!(codes.is_empty(), "expected no findings for `{}`, found {:?}", text, codes);
    }

    #[test]
    fn leading_digit_words_are_reported_once(word in "[0-9][a-z][a-z0-9]{0,5}") {
        let codes = lexical_codes(&format!("x = {word}"));
        prop_assert_eq!(codes, vec![DiagnosticCode::IdentifierLeadingDigit]);
    }

    #[test]
    fn double_underscore_words_are_reported_once(word in "[a-z]{1,4}__[a-z]{1,4}") {
        let codes = lexical_codes(&format!("{word} = close"));
        prop_assert_eq!(codes, vec![DiagnosticCode::IdentifierDoubleUnderscore]);
    }

    #[test]
    fn validity_matches_diagnostics(text in "[ -~\n]{0,40}") {
        let report = common::validate(&text);
        prop_assert_eq!(report.is_valid, report.diagnostics.is_empty());
    }

    #[test]
    fn validation_is_deterministic(text in "[ -~\n]{0,40}") {
        let validator = common::validator();
        let first = validator.validate(&text);
        let second = validator.validate(&text);
        prop_assert_eq!(first.diagnostics, second.diagnostics);
    }

    #[test]
    fn well_typed_expressions_are_valid(expr in well_typed_expression()) {
        let report = common::validate(&expr);
        prop_assert!(
            report.is_valid,
            "expected `{}` to be valid, found {:?}",
            expr,
            report.messages()
        );
    }

    #[test]
    fn arity_bounds_are_inclusive(count in 0usize..6) {
        let mut operators = OperatorCatalog::new();
        operators.insert(
            OperatorSignature::new("clamp", 2, Some(3))
                .positional(TypeKind::Expr)
                .returns(TypeKind::Expr),
        );
        let mut fields = FieldCatalog::new();
        fields.insert("USA_1_TOP3000", ["close"]);
        let validator = ValidatorContext::new(operators, fields)
            .validator(CombinationKey::new("USA", 1, "TOP3000"))
            .expect("combination");

        let arguments = vec!["close"; count].join(", ");
        let report = validator.validate(&format!("clamp({arguments})"));
        let codes: Vec<DiagnosticCode> = report.diagnostics.iter().map(|d| d.code).collect();
        let expected = match count {
            0 | 1 => vec![DiagnosticCode::TooFewArguments],
            2 | 3 => Vec::new(),
            _ => vec![DiagnosticCode::TooManyArguments],
        };
        prop_assert_eq!(codes, expected);
    }
}

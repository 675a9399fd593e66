mod common;

use std::collections::BTreeSet;

use alpha_validator::{
    parse_source, CombinationKey, DiagnosticCode, FieldCatalog, OperatorCatalog,
    OperatorSignature, SemanticAnalyzer, SourceFile, TypeKind, ValidatorContext,
};

use common::{assert_has_code, assert_valid, codes, validate};

fn usa_fields() -> BTreeSet<String> {
    common::fields()
        .fields_for(&CombinationKey::new("USA", 1, "TOP3000"))
        .expect("fixture combination")
        .clone()
}

/// Runs the analyzer over `text` and returns the type bound to `variable`.
fn variable_type(text: &str, variable: &str) -> Option<TypeKind> {
    let source = SourceFile::inline(text);
    let ast = parse_source(&source).expect("parse");
    let operators = common::operators();
    let fields = usa_fields();
    let mut analyzer = SemanticAnalyzer::new(&ast, &source, &operators, &fields);
    analyzer.analyze_program();
    analyzer.variable_type(variable)
}

#[test]
fn infers_variable_types() {
    assert_eq!(variable_type("a = close; a", "a"), Some(TypeKind::Field));
    assert_eq!(variable_type("a = 3.14; a", "a"), Some(TypeKind::Number));
    assert_eq!(variable_type("a = 'x'; a", "a"), Some(TypeKind::String));
    assert_eq!(variable_type("a = ts_mean(close, 5); a", "a"), Some(TypeKind::Expr));
    assert_eq!(variable_type("a = rank(close) > 0.1; a", "a"), Some(TypeKind::Boolean));
    assert_eq!(variable_type("a = close > 1 and true; a", "a"), Some(TypeKind::Boolean));
    assert_eq!(variable_type("a = -(2 * 3); a", "a"), Some(TypeKind::Number));
    assert_eq!(variable_type("a = 2 * close; a", "a"), Some(TypeKind::Expr));
    assert_eq!(variable_type("a = 2 + 'x'; a", "a"), Some(TypeKind::Expr));
    assert_eq!(variable_type("close * 2", "a"), None);
}

#[test]
fn unknown_results_stay_pending() {
    assert_eq!(variable_type("a = nope(close); a", "a"), Some(TypeKind::Unknown));
}

#[test]
fn conflicting_names_are_not_bound() {
    assert_eq!(variable_type("rank = close; 1", "rank"), None);
    assert_eq!(variable_type("volume = 1; 1", "volume"), None);
}

#[test]
fn unknown_operator_is_reported_with_name() {
    let report = assert_has_code("unknown_function(close)", DiagnosticCode::UnknownOperator);
    assert!(
        report.messages().iter().any(|m| m.contains("unknown_function")),
        "expected operator name in {:?}",
        report.messages()
    );
}

#[test]
fn unknown_operator_still_checks_arguments() {
    let report = validate("nope(missing_field)");
    assert_eq!(
        codes(&report),
        vec![DiagnosticCode::UnknownField, DiagnosticCode::UnknownOperator]
    );
}

#[test]
fn unknown_field_is_reported_once() {
    let report = validate("a = ts_mean(unknown_field, 20); a * 2");
    assert_eq!(codes(&report), vec![DiagnosticCode::UnknownField]);
    let span = report.diagnostics[0].span.expect("span");
    assert_eq!((span.line, span.column), (1, 13));
}

#[test]
fn arity_is_checked_on_both_bounds() {
    assert_has_code("group_mean(close, volume)", DiagnosticCode::TooFewArguments);
    assert_has_code("group_rank(close, sector, volume)", DiagnosticCode::TooManyArguments);
    assert_valid("max(close, volume, open, vwap, returns)");
}

#[test]
fn keyword_arguments_do_not_count_towards_arity() {
    assert_valid("group_backfill(close, sector, 20, std=3.0)");
    assert_has_code("ts_mean(close, d=20)", DiagnosticCode::TooFewArguments);
}

#[test]
fn positional_types_are_checked() {
    let report = assert_has_code(
        "group_rank(ts_mean(close, 5), \"sector\")",
        DiagnosticCode::ArgumentTypeMismatch,
    );
    assert!(
        report.messages()[0].contains("argument 2 of 'group_rank' should be field, found string"),
        "unexpected message {:?}",
        report.messages()
    );
    assert_has_code("group_rank(close, ts_mean(sector, 5))", DiagnosticCode::ArgumentTypeMismatch);
    assert_has_code("ts_rank(close, \"10\")", DiagnosticCode::ArgumentTypeMismatch);
}

#[test]
fn union_types_accept_any_member() {
    assert_valid("bucket(close, range=\"0.1,1,0.1\")");
    assert_valid("bucket(3, range=\"0.1,1,0.1\")");
    assert_has_code("bucket('x')", DiagnosticCode::ArgumentTypeMismatch);
}

#[test]
fn boolean_parameters_accept_values() {
    assert_valid("if_else(close > open, close, open)");
    assert_valid("if_else(close, volume, 1)");
    assert_valid("if_else(ts_mean(close, 5), volume, 1)");
    assert_has_code("if_else('yes', volume, 1)", DiagnosticCode::ArgumentTypeMismatch);
}

#[test]
fn field_parameters_reject_expressions() {
    assert_has_code("group_cartesian_product(sector, 1)", DiagnosticCode::ArgumentTypeMismatch);
}

#[test]
fn variadic_tail_and_last_type_fallback() {
    assert_valid("multiply(close, volume, volume, volume, filter=false)");
    assert_has_code("multiply(close, volume, 'x')", DiagnosticCode::ArgumentTypeMismatch);
    assert_has_code("min(close, volume, 'x')", DiagnosticCode::ArgumentTypeMismatch);
}

#[test]
fn keywords_are_checked() {
    assert_has_code("ts_mean(close, 5, bogus=1)", DiagnosticCode::UnknownKeyword);
    assert_has_code("multiply(close, volume, filter='no')", DiagnosticCode::KeywordTypeMismatch);
    assert_valid("normalize(close, useStd=true, limit=0.5)");
}

#[test]
fn restricted_choices_are_enforced() {
    assert_valid("ts_regression(volume, close, 10, lag=0, rettype=0)");
    let report = assert_has_code(
        "ts_regression(volume, close, 10, rettype=12)",
        DiagnosticCode::InvalidChoice,
    );
    assert!(report.messages()[0].contains("expected one of ["));
    assert_valid("ts_quantile(close, 10, driver=\"cauchy\")");
    assert_has_code("ts_quantile(close, 10, driver=\"poisson\")", DiagnosticCode::InvalidChoice);
    assert_has_code("ts_quantile(close, 10, driver=close)", DiagnosticCode::InvalidChoice);
}

#[test]
fn definition_derived_signatures_are_used() {
    assert_valid("hump(close, hump=0.05)");
    assert_has_code("hump(close, hump='a')", DiagnosticCode::KeywordTypeMismatch);
}

#[test]
fn variables_cannot_reuse_field_or_operator_names() {
    let report = assert_has_code("close = 1; close * 2", DiagnosticCode::FieldNameConflict);
    assert!(report.messages()[0].contains("field name 'close' cannot be used as a variable name"));
    assert_has_code("rank = close; rank * 2", DiagnosticCode::OperatorNameConflict);
}

#[test]
fn conflicting_assignment_still_analyzes_its_value() {
    let report = validate("close = missing; 1");
    assert_eq!(
        codes(&report),
        vec![DiagnosticCode::FieldNameConflict, DiagnosticCode::UnknownField]
    );
}

#[test]
fn non_ascii_names_are_rejected() {
    let report = validate("价格 = close; 价格 * 2");
    assert!(report.diagnostics.iter().any(|d| d.code == DiagnosticCode::InvalidName));
    assert!(report.diagnostics.iter().any(|d| d.code == DiagnosticCode::InvalidCharacter));
}

#[test]
fn variables_must_be_assigned_before_use() {
    assert_has_code("a * 2; a = close; a", DiagnosticCode::UnknownField);
}

#[test]
fn unknown_arguments_are_not_type_checked_again() {
    let report = validate("group_rank(close, missing)");
    assert_eq!(codes(&report), vec![DiagnosticCode::UnknownField]);
}

#[test]
fn pending_variables_resolve_lazily() {
    let mut operators = OperatorCatalog::new();
    operators.insert(
        OperatorSignature::new("lift", 1, Some(1))
            .positional(TypeKind::Expr)
            .returns(TypeKind::Expr),
    );
    operators.insert(
        OperatorSignature::new("only_numbers", 1, Some(1))
            .positional(TypeKind::Number)
            .returns(TypeKind::Number),
    );
    let mut fields = FieldCatalog::new();
    fields.insert("USA_1_TOP3000", ["close"]);
    let validator = ValidatorContext::new(operators, fields)
        .validator(CombinationKey::new("USA", 1, "TOP3000"))
        .expect("combination");

    // `a` cannot be typed when bound; the later use re-walks its definition
    // and finds it still unknown, so no second diagnostic appears.
    let report = validator.validate("a = ghost(close); b = a; only_numbers(b)");
    assert_eq!(codes(&report), vec![DiagnosticCode::UnknownOperator]);

    let report = validator.validate("a = lift(close); only_numbers(a)");
    assert_eq!(codes(&report), vec![DiagnosticCode::ArgumentTypeMismatch]);
}

#[test]
fn self_reference_does_not_loop() {
    let report = validate("a = nope(1); a = a * a; a");
    assert_eq!(codes(&report), vec![DiagnosticCode::UnknownOperator]);
}

#[test]
fn choice_keywords_must_also_be_declared() {
    let build = |signature: OperatorSignature| {
        let operators: OperatorCatalog = [signature].into_iter().collect();
        let mut fields = FieldCatalog::new();
        fields.insert("USA_1_TOP3000", ["close"]);
        ValidatorContext::new(operators, fields)
            .validator(CombinationKey::new("USA", 1, "TOP3000"))
            .expect("combination")
    };
    let pick = || {
        OperatorSignature::new("pick", 1, Some(1))
            .positional(TypeKind::Expr)
            .choice("mode", ["a", "b"])
            .returns(TypeKind::Expr)
    };

    let undeclared = build(pick());
    let report = undeclared.validate("pick(close, mode=\"a\")");
    assert_eq!(codes(&report), vec![DiagnosticCode::UnknownKeyword]);
    let report = undeclared.validate("pick(close, mode=\"z\")");
    assert_eq!(
        codes(&report),
        vec![DiagnosticCode::UnknownKeyword, DiagnosticCode::InvalidChoice]
    );

    let declared = build(pick().keyword("mode", TypeKind::String));
    assert!(declared.validate("pick(close, mode=\"a\")").is_valid);
    let report = declared.validate("pick(close, mode=\"z\")");
    assert_eq!(codes(&report), vec![DiagnosticCode::InvalidChoice]);
}

#[test]
fn long_chains_of_pending_variables_terminate() {
    let mut script = String::from("v0 = ghost(close);");
    for index in 1..600 {
        script.push_str(&format!(" v{index} = v{};", index - 1));
    }
    script.push_str(" ts_mean(v599, 5)");

    let report = validate(&script);
    assert_eq!(codes(&report), vec![DiagnosticCode::UnknownOperator]);
}

mod common;

use std::fs;

use alpha_validator::{
    parse_definition, CatalogError, CatalogKind, CombinationKey, ExpectedType, FieldCatalog,
    OperatorCatalog, TypeKind, ValidatorContext,
};
use tempfile::tempdir;

#[test]
fn loads_fixture_operators() {
    let catalog = common::operators();
    let ts_mean = catalog.get("ts_mean").expect("ts_mean");
    assert_eq!((ts_mean.min_args, ts_mean.max_args), (2, Some(2)));
    assert_eq!(ts_mean.return_type, TypeKind::Expr);

    let multiply = catalog.get("multiply").expect("multiply");
    assert_eq!(multiply.max_args, None);
    assert_eq!(multiply.variadic, Some(ExpectedType::from(TypeKind::Expr)));
    assert_eq!(
        multiply.keywords.get("filter"),
        Some(&ExpectedType::from(TypeKind::Boolean))
    );

    let bucket = catalog.get("bucket").expect("bucket");
    assert_eq!(
        bucket.positional[0],
        ExpectedType::any_of(vec![TypeKind::Expr, TypeKind::Number])
    );

    let normalize = catalog.get("normalize").expect("normalize");
    assert_eq!(
        normalize.keywords.get("useStd"),
        Some(&ExpectedType::from(TypeKind::Boolean)),
        "`bool` is an alias of `boolean`"
    );
    assert!(normalize.choices["useStd"].contains("true"));

    let regression = catalog.get("ts_regression").expect("ts_regression");
    assert!(regression.choices["rettype"].contains("0"));
    assert!(!catalog.contains("ts_avg"));
}

#[test]
fn expected_positional_falls_back_to_last_type() {
    let catalog = common::operators();
    let min = catalog.get("min").expect("min");
    assert_eq!(min.expected_positional(5), Some(&ExpectedType::from(TypeKind::Expr)));

    let if_else = catalog.get("if_else").expect("if_else");
    assert_eq!(
        if_else.expected_positional(0),
        Some(&ExpectedType::from(TypeKind::Boolean))
    );
}

#[test]
fn derives_types_from_definition() {
    let (positional, keywords) =
        parse_definition("ts_regression(y, x, d, lag = 0, rettype = 0, mode = \"fast\", on = true)");
    assert_eq!(
        positional,
        vec![ExpectedType::from(TypeKind::FieldOrNumber); 3]
    );
    assert_eq!(keywords["lag"], ExpectedType::from(TypeKind::Number));
    assert_eq!(keywords["mode"], ExpectedType::from(TypeKind::String));
    assert_eq!(keywords["on"], ExpectedType::from(TypeKind::Boolean));

    let (positional, keywords) = parse_definition("no parameters here");
    assert!(positional.is_empty() && keywords.is_empty());
}

#[test]
fn rejects_max_below_min() {
    let error = OperatorCatalog::from_json_str(r#"{"bad": {"min_args": 3, "max_args": 1}}"#)
        .expect_err("invariant violation");
    assert!(
        matches!(error, CatalogError::Malformed { kind: CatalogKind::Operator, .. }),
        "expected malformed catalog, found {error:?}"
    );
}

#[test]
fn rejects_unparsable_json() {
    let error = OperatorCatalog::from_json_str("{ not json").expect_err("bad json");
    assert!(matches!(error, CatalogError::Malformed { .. }));
    let error = FieldCatalog::from_json_str(r#"{"USA_1_TOP3000": "close"}"#).expect_err("shape");
    assert!(matches!(error, CatalogError::Malformed { kind: CatalogKind::Field, .. }));
}

#[test]
fn missing_file_is_distinguished() {
    let dir = tempdir().expect("tempdir");
    let error = OperatorCatalog::from_path(dir.path().join("operators.json"))
        .expect_err("missing catalog");
    assert!(matches!(error, CatalogError::Missing { kind: CatalogKind::Operator, .. }));
}

#[test]
fn unknown_combination_lists_available_keys() {
    let error = common::fields()
        .fields_for(&CombinationKey::new("EUR", 1, "TOP1200"))
        .expect_err("unknown combination");
    let message = error.to_string();
    assert!(message.contains("EUR_1_TOP1200"), "{message}");
    assert!(message.contains("USA: 0/TOP500, 1/TOP3000"), "{message}");
    assert!(message.contains("CHN: 1/TOP2000A"), "{message}");
}

#[test]
fn combination_keys_round_trip_through_text() {
    let key = CombinationKey::parse("USA_1_TOP3000").expect("key");
    assert_eq!(key, CombinationKey::new("USA", 1, "TOP3000"));
    assert_eq!(key.to_string(), "USA_1_TOP3000");
    assert_eq!(
        CombinationKey::parse("GLB_0_MINVOL_1M").map(|key| key.universe),
        Some("MINVOL_1M".to_string())
    );
    assert!(CombinationKey::parse("USA_x_TOP3000").is_none());
}

#[test]
fn merges_per_combination_field_files() {
    let dir = tempdir().expect("tempdir");
    fs::write(
        dir.path().join("data_fields_USA_1_TOP3000.json"),
        r#"{"count": 2, "results": [{"id": "close", "type": "MATRIX"}, {"id": "sector"}]}"#,
    )
    .expect("write listing");
    fs::write(dir.path().join("data_fields_USA_0_TOP500.json"), "").expect("write empty");
    fs::write(
        dir.path().join("data_fields_CHN_1_TOP2000A.json"),
        r#"{"detail": "throttled"}"#,
    )
    .expect("write listing without results");
    fs::write(dir.path().join("notes.json"), "{}").expect("write unrelated");

    let catalog = FieldCatalog::from_directory(dir.path()).expect("merge");
    assert_eq!(catalog.len(), 1);
    assert!(catalog
        .fields_for(&CombinationKey::new("USA", 0, "TOP500"))
        .is_err());
    let fields = catalog
        .fields_for(&CombinationKey::new("USA", 1, "TOP3000"))
        .expect("merged combination");
    assert!(fields.contains("close") && fields.contains("sector"));
}

#[test]
fn unparsable_field_file_is_malformed() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("data_fields_USA_1_TOP3000.json"), "{ oops").expect("write");
    let error = FieldCatalog::from_directory(dir.path()).expect_err("malformed listing");
    assert!(matches!(error, CatalogError::Malformed { kind: CatalogKind::Field, .. }));
}

#[test]
fn directory_without_listings_is_missing() {
    let dir = tempdir().expect("tempdir");
    let error = FieldCatalog::from_directory(dir.path()).expect_err("no listings");
    assert!(matches!(error, CatalogError::Missing { kind: CatalogKind::Field, .. }));
}

#[test]
fn context_loads_from_directory() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("operators.json"), common::OPERATORS_JSON).expect("operators");
    fs::write(dir.path().join("data_fields.json"), common::FIELDS_JSON).expect("fields");

    let context = ValidatorContext::load(dir.path()).expect("load context");
    assert!(context.operators().contains("group_rank"));
    let validator = context
        .validator(CombinationKey::new("USA", 0, "TOP500"))
        .expect("validator");
    assert!(validator.validate("group_rank(close, sector)").is_valid);
}

#[test]
fn context_falls_back_to_field_listings() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("operators.json"), common::OPERATORS_JSON).expect("operators");
    fs::write(
        dir.path().join("data_fields_USA_1_TOP3000.json"),
        r#"{"results": [{"id": "close"}]}"#,
    )
    .expect("listing");

    let context = ValidatorContext::load(dir.path()).expect("load context");
    let validator = context
        .validator(CombinationKey::new("USA", 1, "TOP3000"))
        .expect("validator");
    assert!(validator.validate("ts_mean(close, 5)").is_valid);
    assert!(!validator.validate("ts_mean(volume, 5)").is_valid);
}

#[test]
fn context_is_shareable_across_threads() {
    let validator = common::validator();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let validator = validator.clone();
            std::thread::spawn(move || validator.validate("ts_mean(close, 20)").is_valid)
        })
        .collect();
    for handle in handles {
        assert!(handle.join().expect("thread"));
    }
}

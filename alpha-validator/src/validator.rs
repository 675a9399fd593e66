use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::analyzer;
use crate::catalog::{CatalogError, CombinationKey, FieldCatalog, OperatorCatalog};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::lexical;
use crate::parser;
use crate::rules;
use crate::source::SourceFile;

pub const OPERATORS_FILE: &str = "operators.json";
pub const FIELDS_FILE: &str = "data_fields.json";

/// Both catalogs, loaded once and shared read-only between validators and
/// threads.
#[derive(Debug, Clone)]
pub struct ValidatorContext {
    operators: Arc<OperatorCatalog>,
    fields: Arc<FieldCatalog>,
}

impl ValidatorContext {
    pub fn new(operators: OperatorCatalog, fields: FieldCatalog) -> Self {
        Self {
            operators: Arc::new(operators),
            fields: Arc::new(fields),
        }
    }

    /// Loads `operators.json` from `dir`, plus either `data_fields.json` or
    /// the per-combination `data_fields_*.json` listings.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let operators = OperatorCatalog::from_path(dir.join(OPERATORS_FILE))?;
        let combined = dir.join(FIELDS_FILE);
        let fields = if combined.exists() {
            FieldCatalog::from_path(combined)?
        } else {
            FieldCatalog::from_directory(dir)?
        };
        Ok(Self::new(operators, fields))
    }

    pub fn operators(&self) -> &OperatorCatalog {
        &self.operators
    }

    pub fn fields(&self) -> &FieldCatalog {
        &self.fields
    }

    /// Fails with [`CatalogError::UnknownCombination`] when the field
    /// catalog has no entry for `key`.
    pub fn validator(&self, key: CombinationKey) -> Result<ExpressionValidator, CatalogError> {
        let fields = self.fields.fields_for(&key)?.clone();
        debug!(key = %key, fields = fields.len(), "created expression validator");
        Ok(ExpressionValidator {
            context: self.clone(),
            fields: Arc::new(fields),
        })
    }
}

/// Validates expressions for one region/delay/universe combination.
#[derive(Debug, Clone)]
pub struct ExpressionValidator {
    context: ValidatorContext,
    fields: Arc<BTreeSet<String>>,
}

impl ExpressionValidator {
    pub fn validate(&self, text: &str) -> ValidationReport {
        self.validate_source(&SourceFile::inline(text))
    }

    pub fn validate_source(&self, source: &SourceFile) -> ValidationReport {
        let diagnostics = run_pipeline(source, &self.context.operators, &self.fields);
        ValidationReport::new(source, diagnostics)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub expression: String,
    pub is_valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    fn new(source: &SourceFile, diagnostics: Diagnostics) -> Self {
        let diagnostics = diagnostics.into_entries();
        Self {
            expression: source.contents.clone(),
            is_valid: diagnostics.is_empty(),
            diagnostics,
        }
    }

    /// Each diagnostic rendered as `line L column C: message (suggestion)`.
    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }
}

/// One-shot entry point: validates `text` for the given combination and
/// returns the verdict with rendered diagnostics.
pub fn validate_expression(
    text: &str,
    region: &str,
    delay: u32,
    universe: &str,
    operators: &OperatorCatalog,
    fields: &FieldCatalog,
) -> Result<(bool, Vec<String>), CatalogError> {
    let key = CombinationKey::new(region, delay, universe);
    let field_set = fields.fields_for(&key)?;
    let source = SourceFile::inline(text);
    let report = ValidationReport::new(&source, run_pipeline(&source, operators, field_set));
    Ok((report.is_valid, report.messages()))
}

fn run_pipeline(
    source: &SourceFile,
    operators: &OperatorCatalog,
    fields: &BTreeSet<String>,
) -> Diagnostics {
    let mut diagnostics = lexical::check_source(source);

    if !source.is_blank() {
        match parser::parse_source(source) {
            Ok(ast) => {
                debug!(nodes = ast.len(), statements = ast.statements().len(), "parsed");
                diagnostics.extend(rules::check_program(&ast, source));
                diagnostics.extend(analyzer::analyze(&ast, source, operators, fields));
            }
            Err(error) => {
                debug!(%error, line = error.line, column = error.column, "parse failed");
                diagnostics.push(error.to_diagnostic(source));
            }
        }
    }
    diagnostics.extend(rules::check_script(source));

    debug!(count = diagnostics.len(), "validation finished");
    diagnostics
}

//! Read-only operator and field catalogs.
//!
//! Both catalogs are loaded once from JSON and never mutated afterwards.
//! The operator catalog maps operator names to their signatures; the field
//! catalog maps a combination key (`REGION_DELAY_UNIVERSE`) to the names of
//! the data fields valid for that combination.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::{ExpectedType, TypeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Operator,
    Field,
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::Operator => f.write_str("operator"),
            CatalogKind::Field => f.write_str("field"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{kind} catalog not found at {}", path.display())]
    Missing { kind: CatalogKind, path: PathBuf },
    #[error("{kind} catalog {origin} is malformed: {reason}")]
    Malformed {
        kind: CatalogKind,
        origin: String,
        reason: String,
    },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid combination '{key}'\navailable combinations:\n{available}")]
    UnknownCombination { key: String, available: String },
}

impl CatalogError {
    fn malformed(kind: CatalogKind, origin: &str, reason: impl fmt::Display) -> Self {
        CatalogError::Malformed {
            kind,
            origin: origin.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn read_catalog_file(kind: CatalogKind, path: &Path) -> Result<String, CatalogError> {
    if !path.exists() {
        return Err(CatalogError::Missing {
            kind,
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorSignature {
    pub name: String,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub positional: Vec<ExpectedType>,
    pub variadic: Option<ExpectedType>,
    pub keywords: BTreeMap<String, ExpectedType>,
    pub choices: BTreeMap<String, BTreeSet<String>>,
    pub return_type: TypeKind,
}

impl OperatorSignature {
    pub fn new(name: impl Into<String>, min_args: usize, max_args: Option<usize>) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            positional: Vec::new(),
            variadic: None,
            keywords: BTreeMap::new(),
            choices: BTreeMap::new(),
            return_type: TypeKind::Unknown,
        }
    }

    pub fn positional(mut self, expected: impl Into<ExpectedType>) -> Self {
        self.positional.push(expected.into());
        self
    }

    pub fn variadic(mut self, expected: impl Into<ExpectedType>) -> Self {
        self.variadic = Some(expected.into());
        self
    }

    pub fn keyword(mut self, name: impl Into<String>, expected: impl Into<ExpectedType>) -> Self {
        self.keywords.insert(name.into(), expected.into());
        self
    }

    pub fn choice<I, S>(mut self, keyword: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices
            .insert(keyword.into(), allowed.into_iter().map(Into::into).collect());
        self
    }

    pub fn returns(mut self, return_type: TypeKind) -> Self {
        self.return_type = return_type;
        self
    }

    /// Expected type for the positional argument at `index`: the declared
    /// type, else the variadic tail type, else the last declared type.
    pub fn expected_positional(&self, index: usize) -> Option<&ExpectedType> {
        self.positional
            .get(index)
            .or(self.variadic.as_ref())
            .or(self.positional.last())
    }

    pub fn describe_arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => format!("{max}"),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

/// Catalog entry as stored on disk. Unrecognized keys are ignored.
#[derive(Deserialize)]
struct RawOperator {
    #[serde(default)]
    min_args: usize,
    #[serde(default)]
    max_args: Option<usize>,
    #[serde(default, alias = "positional_types")]
    arg_types: Option<Vec<ExpectedType>>,
    #[serde(default, alias = "variadic_tail_type")]
    var_args_type: Option<ExpectedType>,
    #[serde(default)]
    kwarg_types: Option<BTreeMap<String, ExpectedType>>,
    #[serde(default)]
    choices: BTreeMap<String, Vec<JsonValue>>,
    #[serde(default = "unknown_type")]
    return_type: TypeKind,
    #[serde(default)]
    definition: Option<String>,
}

fn unknown_type() -> TypeKind {
    TypeKind::Unknown
}

impl RawOperator {
    fn into_signature(self, name: String, origin: &str) -> Result<OperatorSignature, CatalogError> {
        if let Some(max) = self.max_args {
            if max < self.min_args {
                return Err(CatalogError::malformed(
                    CatalogKind::Operator,
                    origin,
                    format!(
                        "operator '{name}' declares max_args {max} below min_args {}",
                        self.min_args
                    ),
                ));
            }
        }

        let (derived_positional, derived_keywords) = match &self.definition {
            Some(definition) if self.arg_types.is_none() || self.kwarg_types.is_none() => {
                parse_definition(definition)
            }
            _ => (Vec::new(), BTreeMap::new()),
        };

        let mut choices = BTreeMap::new();
        for (keyword, values) in self.choices {
            let mut allowed = BTreeSet::new();
            for value in values {
                let text = choice_text(&value).ok_or_else(|| {
                    CatalogError::malformed(
                        CatalogKind::Operator,
                        origin,
                        format!("operator '{name}' has a non-literal choice for '{keyword}': {value}"),
                    )
                })?;
                allowed.insert(text);
            }
            choices.insert(keyword, allowed);
        }

        Ok(OperatorSignature {
            positional: self.arg_types.unwrap_or(derived_positional),
            keywords: self.kwarg_types.unwrap_or(derived_keywords),
            variadic: self.var_args_type,
            min_args: self.min_args,
            max_args: self.max_args,
            return_type: self.return_type,
            choices,
            name,
        })
    }
}

fn choice_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Number(number) => Some(number.to_string()),
        JsonValue::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Derives parameter types from a textual definition such as
/// `ts_regression(y, x, d, lag=0, rettype=0)`. Only the first parenthesised
/// parameter list is considered.
pub fn parse_definition(definition: &str) -> (Vec<ExpectedType>, BTreeMap<String, ExpectedType>) {
    let mut positional = Vec::new();
    let mut keywords = BTreeMap::new();

    let Some(open) = definition.find('(') else {
        return (positional, keywords);
    };
    let rest = &definition[open + 1..];
    let params = match rest.find(')') {
        Some(close) => &rest[..close],
        None => return (positional, keywords),
    };

    for param in params.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match param.split_once('=') {
            Some((key, default)) => {
                keywords.insert(key.trim().to_string(), classify_param(default).into());
            }
            None => positional.push(classify_param(param).into()),
        }
    }

    (positional, keywords)
}

fn classify_param(param: &str) -> TypeKind {
    let param = param.trim();
    if matches!(param, "true" | "false" | "True" | "False") {
        return TypeKind::Boolean;
    }
    let mut chars = param.chars();
    if let Some(first) = chars.next() {
        if (first.is_ascii_alphabetic() || first == '_')
            && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return TypeKind::FieldOrNumber;
        }
    }
    let quoted = |quote: char| param.len() >= 2 && param.starts_with(quote) && param.ends_with(quote);
    if quoted('"') || quoted('\'') {
        return TypeKind::String;
    }
    if is_number_text(param) {
        return TypeKind::Number;
    }
    TypeKind::Unknown
}

fn is_number_text(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let all_digits = |part: &str| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit());
    all_digits(whole) && fraction.map_or(true, all_digits)
}

#[derive(Debug, Clone, Default)]
pub struct OperatorCatalog {
    operators: BTreeMap<String, OperatorSignature>,
}

impl OperatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        Self::parse(json, "<inline>")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = read_catalog_file(CatalogKind::Operator, path)?;
        Self::parse(&contents, &path.display().to_string())
    }

    fn parse(json: &str, origin: &str) -> Result<Self, CatalogError> {
        let raw: BTreeMap<String, RawOperator> = serde_json::from_str(json)
            .map_err(|err| CatalogError::malformed(CatalogKind::Operator, origin, err))?;

        let mut catalog = Self::new();
        for (name, entry) in raw {
            let signature = entry.into_signature(name, origin)?;
            catalog.insert(signature);
        }
        info!(operators = catalog.len(), origin, "loaded operator catalog");
        Ok(catalog)
    }

    pub fn insert(&mut self, signature: OperatorSignature) {
        self.operators.insert(signature.name.clone(), signature);
    }

    pub fn get(&self, name: &str) -> Option<&OperatorSignature> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl FromIterator<OperatorSignature> for OperatorCatalog {
    fn from_iter<T: IntoIterator<Item = OperatorSignature>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for signature in iter {
            catalog.insert(signature);
        }
        catalog
    }
}

/// `REGION_DELAY_UNIVERSE`, e.g. `USA_1_TOP3000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombinationKey {
    pub region: String,
    pub delay: u32,
    pub universe: String,
}

impl CombinationKey {
    pub fn new(region: impl Into<String>, delay: u32, universe: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            delay,
            universe: universe.into(),
        }
    }

    /// Splits a key on its first two underscores; the universe may itself
    /// contain underscores.
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.splitn(3, '_');
        let region = parts.next().filter(|part| !part.is_empty())?;
        let delay = parts.next()?.parse().ok()?;
        let universe = parts.next().filter(|part| !part.is_empty())?;
        Some(Self::new(region, delay, universe))
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.region, self.delay, self.universe)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    combinations: BTreeMap<String, BTreeSet<String>>,
}

const FIELD_FILE_PREFIX: &str = "data_fields_";

#[derive(Deserialize)]
struct FieldListing {
    results: Vec<JsonValue>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        Self::parse(json, "<inline>")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = read_catalog_file(CatalogKind::Field, path)?;
        Self::parse(&contents, &path.display().to_string())
    }

    fn parse(json: &str, origin: &str) -> Result<Self, CatalogError> {
        let combinations: BTreeMap<String, BTreeSet<String>> = serde_json::from_str(json)
            .map_err(|err| CatalogError::malformed(CatalogKind::Field, origin, err))?;
        let catalog = Self { combinations };
        info!(
            combinations = catalog.len(),
            origin, "loaded field catalog"
        );
        Ok(catalog)
    }

    /// Merges per-combination listings named `data_fields_<KEY>.json`, each
    /// holding `{"results": [{"id": "..."}, ...]}`.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let io_error = |source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        };
        if !dir.is_dir() {
            return Err(CatalogError::Missing {
                kind: CatalogKind::Field,
                path: dir.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            let key = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(FIELD_FILE_PREFIX))
                .and_then(|name| name.strip_suffix(".json"))
                .map(str::to_string);
            if let Some(key) = key {
                files.push((key, path));
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(CatalogError::Missing {
                kind: CatalogKind::Field,
                path: dir.join(format!("{FIELD_FILE_PREFIX}*.json")),
            });
        }

        let mut catalog = Self::new();
        for (key, path) in files {
            let origin = path.display().to_string();
            let contents = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            if contents.trim().is_empty() {
                warn!(file = %origin, "skipping empty field listing");
                continue;
            }
            let value: JsonValue = serde_json::from_str(&contents)
                .map_err(|err| CatalogError::malformed(CatalogKind::Field, &origin, err))?;
            let Ok(listing) = serde_json::from_value::<FieldListing>(value) else {
                warn!(file = %origin, "skipping field listing without a results array");
                continue;
            };
            let fields = listing
                .results
                .iter()
                .filter_map(|item| item.get("id").and_then(JsonValue::as_str))
                .map(str::to_string);
            catalog.insert(key, fields);
        }

        info!(
            combinations = catalog.len(),
            dir = %dir.display(),
            "merged field listings"
        );
        Ok(catalog)
    }

    pub fn insert<I, S>(&mut self, key: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        let entry = self.combinations.entry(key.clone()).or_default();
        entry.extend(fields.into_iter().map(Into::into));
        debug!(key = %key, fields = entry.len(), "registered field combination");
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn fields_for(&self, key: &CombinationKey) -> Result<&BTreeSet<String>, CatalogError> {
        let rendered = key.to_string();
        self.combinations
            .get(&rendered)
            .ok_or_else(|| CatalogError::UnknownCombination {
                available: self.describe_available(),
                key: rendered,
            })
    }

    /// One line per region listing its `delay/universe` pairs.
    pub fn describe_available(&self) -> String {
        let mut regions: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in self.combinations.keys() {
            match CombinationKey::parse(key) {
                Some(parsed) => regions
                    .entry(parsed.region)
                    .or_default()
                    .push(format!("{}/{}", parsed.delay, parsed.universe)),
                None => {
                    regions.entry(key.clone()).or_default();
                }
            }
        }
        regions
            .into_iter()
            .map(|(region, pairs)| format!("  {region}: {}", pairs.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse value classification used by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Number,
    String,
    #[serde(alias = "bool")]
    Boolean,
    Field,
    FieldOrNumber,
    /// A valid value-producing expression whose concrete kind is not tracked.
    Expr,
    /// Invalid or unresolved.
    Unknown,
}

impl TypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeKind::Number => "number",
            TypeKind::String => "string",
            TypeKind::Boolean => "boolean",
            TypeKind::Field => "field",
            TypeKind::FieldOrNumber => "field_or_number",
            TypeKind::Expr => "expr",
            TypeKind::Unknown => "unknown",
        }
    }

    /// Whether a parameter declared as `self` accepts an argument of kind
    /// `actual`. The relation is asymmetric: `boolean` parameters take any
    /// value-producing expression, `field` parameters take fields only.
    pub fn accepts(self, actual: TypeKind) -> bool {
        if self == actual {
            return true;
        }
        match self {
            TypeKind::Expr | TypeKind::FieldOrNumber => {
                matches!(actual, TypeKind::Field | TypeKind::Number)
            }
            TypeKind::Boolean => matches!(
                actual,
                TypeKind::Expr | TypeKind::Field | TypeKind::Number
            ),
            _ => false,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result kind of `+ - * /` given the operand kinds.
pub fn arithmetic_result(left: TypeKind, right: TypeKind) -> TypeKind {
    if left == TypeKind::Unknown && right == TypeKind::Unknown {
        return TypeKind::Unknown;
    }
    let is_value = |kind: TypeKind| matches!(kind, TypeKind::Expr | TypeKind::Field);
    if is_value(left) || is_value(right) {
        return TypeKind::Expr;
    }
    if left == TypeKind::Number && right == TypeKind::Number {
        return TypeKind::Number;
    }
    TypeKind::Expr
}

/// The kinds a parameter accepts. Catalog entries spell this as either a
/// single kind name or a list of kind names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ExpectedRepr", into = "Vec<TypeKind>")]
pub struct ExpectedType(Vec<TypeKind>);

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpectedRepr {
    One(TypeKind),
    Many(Vec<TypeKind>),
}

impl From<ExpectedRepr> for ExpectedType {
    fn from(repr: ExpectedRepr) -> Self {
        match repr {
            ExpectedRepr::One(kind) => ExpectedType(vec![kind]),
            ExpectedRepr::Many(kinds) => ExpectedType(kinds),
        }
    }
}

impl From<ExpectedType> for Vec<TypeKind> {
    fn from(expected: ExpectedType) -> Self {
        expected.0
    }
}

impl From<TypeKind> for ExpectedType {
    fn from(kind: TypeKind) -> Self {
        ExpectedType(vec![kind])
    }
}

impl ExpectedType {
    pub fn any_of(kinds: Vec<TypeKind>) -> Self {
        ExpectedType(kinds)
    }

    pub fn accepts(&self, actual: TypeKind) -> bool {
        self.0.iter().any(|expected| expected.accepts(actual))
    }

    /// Catalog entries whose type could not be classified carry no
    /// constraint.
    pub fn is_unconstrained(&self) -> bool {
        self.0.is_empty() || self.0.contains(&TypeKind::Unknown)
    }
}

impl fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(" | ");
        f.write_str(&joined)
    }
}

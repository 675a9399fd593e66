use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceSpan {
    pub fn new(line: usize, column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }

    pub fn single_point(line: usize, column: usize) -> Self {
        Self::new(line, column, line, column)
    }

    pub fn union(a: &Self, b: &Self) -> Self {
        if a.line == 0 {
            return *b;
        }
        if b.line == 0 {
            return *a;
        }

        let (start_line, start_column) =
            if (a.line < b.line) || (a.line == b.line && a.column <= b.column) {
                (a.line, a.column)
            } else {
                (b.line, b.column)
            };

        let (end_line, end_column) = if (a.end_line > b.end_line)
            || (a.end_line == b.end_line && a.end_column >= b.end_column)
        {
            (a.end_line, a.end_column)
        } else {
            (b.end_line, b.end_column)
        };

        Self::new(start_line, start_column, end_line, end_column)
    }
}

impl Default for SourceSpan {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

/// Index of a node inside an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub span: SourceSpan,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Literal(Literal),
    FieldRef(Identifier),
    Call(CallExpression),
    Binary(BinaryExpression),
    Unary(UnaryExpression),
    Grouping(NodeId),
    Kwarg(KeywordArgument),
    Assignment(Assignment),
    Program(Vec<NodeId>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numbers keep their source text; nothing is ever computed with them.
    Number(String),
    String(String),
    Boolean(bool),
}

impl Literal {
    /// Text a literal contributes when compared against restricted choices.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Literal::Number(text) | Literal::String(text) => Cow::Borrowed(text),
            Literal::Boolean(true) => Cow::Borrowed("true"),
            Literal::Boolean(false) => Cow::Borrowed("false"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct CallExpression {
    pub callee: Identifier,
    /// Positional expressions and [`NodeKind::Kwarg`] nodes in source order.
    pub arguments: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: NodeId,
    pub right: NodeId,
}

#[derive(Debug, Clone)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: NodeId,
}

#[derive(Debug, Clone)]
pub struct KeywordArgument {
    pub name: Identifier,
    pub value: NodeId,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub target: Identifier,
    pub value: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Equal,
    NotEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    Logical,
    Comparison,
    Additive,
    Multiplicative,
}

impl BinaryOperator {
    pub fn class(self) -> OperatorClass {
        match self {
            BinaryOperator::Or | BinaryOperator::And => OperatorClass::Logical,
            BinaryOperator::Greater
            | BinaryOperator::GreaterEqual
            | BinaryOperator::Less
            | BinaryOperator::LessEqual
            | BinaryOperator::Equal
            | BinaryOperator::NotEqual => OperatorClass::Comparison,
            BinaryOperator::Add | BinaryOperator::Subtract => OperatorClass::Additive,
            BinaryOperator::Multiply | BinaryOperator::Divide => OperatorClass::Multiplicative,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Or => "or",
            BinaryOperator::And => "and",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

/// Syntax tree for one validated input. Nodes refer to each other by
/// [`NodeId`]; the root is always a [`NodeKind::Program`] node.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
    /// Height of the subtree under each node; leaves are 1.
    depths: Vec<usize>,
    root: Option<NodeId>,
}

impl Ast {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            depths: Vec::new(),
            root: None,
        }
    }

    pub(crate) fn alloc(&mut self, span: SourceSpan, kind: NodeKind) -> NodeId {
        let below = match &kind {
            NodeKind::Literal(_) | NodeKind::FieldRef(_) => 0,
            NodeKind::Call(call) => self.deepest(&call.arguments),
            NodeKind::Binary(binary) => self.depth(binary.left).max(self.depth(binary.right)),
            NodeKind::Unary(unary) => self.depth(unary.operand),
            NodeKind::Grouping(inner) => self.depth(*inner),
            NodeKind::Kwarg(keyword) => self.depth(keyword.value),
            NodeKind::Assignment(assignment) => self.depth(assignment.value),
            NodeKind::Program(statements) => self.deepest(statements),
        };
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { span, kind });
        self.depths.push(below + 1);
        id
    }

    fn deepest(&self, ids: &[NodeId]) -> usize {
        ids.iter().map(|id| self.depth(*id)).max().unwrap_or(0)
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn span(&self, id: NodeId) -> SourceSpan {
        self.node(id).span
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes on the longest path from `id` down to a leaf.
    pub fn depth(&self, id: NodeId) -> usize {
        self.depths[id.index()]
    }

    /// Top-level statements in source order.
    pub fn statements(&self) -> &[NodeId] {
        match self.root.map(|root| self.kind(root)) {
            Some(NodeKind::Program(statements)) => statements,
            _ => &[],
        }
    }
}

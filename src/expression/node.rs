//! Expression and clause tree
//!
//! Nodes own their children. Each node carries its source position and a
//! write-once execution mode filled in by the analysis pass.

use serde::Deserialize;
use serde_json::Value;

use super::mode::{ExecutionMode, ModeCell};
use crate::errors::{EngineResult, SourcePosition};
use crate::types::SequenceType;

/// An expression node
#[derive(Debug, Clone, Deserialize)]
pub struct Expression {
    #[serde(flatten)]
    pub kind: ExpressionKind,
    #[serde(default)]
    pub position: SourcePosition,
    #[serde(skip)]
    mode: ModeCell,
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntegerDivide,
    Modulo,
}

/// Value comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogicalOp {
    And,
    Or,
}

/// One key/value pair of an object constructor
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectPair {
    pub key: Expression,
    pub value: Expression,
}

/// Declared parameter of a function
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub sequence_type: SequenceType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExpressionKind {
    Literal {
        value: Value,
    },
    /// Comma-separated sequence
    Sequence {
        #[serde(default)]
        members: Vec<Expression>,
    },
    Variable {
        name: String,
    },
    /// `$$`
    ContextItem,
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not {
        operand: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        then: Box<Expression>,
        #[serde(rename = "else")]
        otherwise: Box<Expression>,
    },
    Range {
        from: Box<Expression>,
        to: Box<Expression>,
    },
    Object {
        #[serde(default)]
        pairs: Vec<ObjectPair>,
    },
    Array {
        #[serde(default)]
        members: Option<Box<Expression>>,
    },
    ObjectLookup {
        object: Box<Expression>,
        key: Box<Expression>,
    },
    ArrayLookup {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    ArrayUnbox {
        array: Box<Expression>,
    },
    Filter {
        sequence: Box<Expression>,
        predicate: Box<Expression>,
    },
    /// Static call; a `null` argument is a placeholder
    FunctionCall {
        name: String,
        #[serde(default)]
        arguments: Vec<Option<Expression>>,
    },
    DynamicCall {
        function: Box<Expression>,
        #[serde(default)]
        arguments: Vec<Option<Expression>>,
    },
    InlineFunction {
        #[serde(default)]
        parameters: Vec<Parameter>,
        #[serde(default)]
        return_type: SequenceType,
        body: Box<Expression>,
    },
    /// `name#arity`
    FunctionRef {
        name: String,
        arity: usize,
    },
    Flwor {
        clauses: Vec<Clause>,
        #[serde(rename = "return")]
        return_expression: Box<Expression>,
    },
}

impl ExpressionKind {
    /// Node name used in diagnostics and explain output
    pub fn name(&self) -> &'static str {
        match self {
            ExpressionKind::Literal { .. } => "literal",
            ExpressionKind::Sequence { .. } => "sequence",
            ExpressionKind::Variable { .. } => "variable",
            ExpressionKind::ContextItem => "context-item",
            ExpressionKind::Arithmetic { .. } => "arithmetic",
            ExpressionKind::Comparison { .. } => "comparison",
            ExpressionKind::Logical { .. } => "logical",
            ExpressionKind::Not { .. } => "not",
            ExpressionKind::If { .. } => "if",
            ExpressionKind::Range { .. } => "range",
            ExpressionKind::Object { .. } => "object",
            ExpressionKind::Array { .. } => "array",
            ExpressionKind::ObjectLookup { .. } => "object-lookup",
            ExpressionKind::ArrayLookup { .. } => "array-lookup",
            ExpressionKind::ArrayUnbox { .. } => "array-unbox",
            ExpressionKind::Filter { .. } => "filter",
            ExpressionKind::FunctionCall { .. } => "function-call",
            ExpressionKind::DynamicCall { .. } => "dynamic-call",
            ExpressionKind::InlineFunction { .. } => "inline-function",
            ExpressionKind::FunctionRef { .. } => "function-ref",
            ExpressionKind::Flwor { .. } => "flwor",
        }
    }
}

impl Expression {
    pub fn new(kind: ExpressionKind, position: SourcePosition) -> Self {
        Self {
            kind,
            position,
            mode: ModeCell::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// The computed execution mode; an unset mode is a flow error
    pub fn mode(&self) -> EngineResult<ExecutionMode> {
        self.mode
            .get(self.name())
            .map_err(|e| e.at(&self.position))
    }

    /// The execution mode for diagnostics, `Unset` if not computed
    pub fn mode_tolerating_unset(&self) -> ExecutionMode {
        self.mode.get_tolerating_unset()
    }

    pub(crate) fn set_mode(&self, mode: ExecutionMode) -> ExecutionMode {
        self.mode.set(mode)
    }

    pub(crate) fn has_mode(&self) -> bool {
        self.mode.is_computed()
    }
}

/// A FLWOR clause node
#[derive(Debug, Clone, Deserialize)]
pub struct Clause {
    #[serde(flatten)]
    pub kind: ClauseKind,
    #[serde(default)]
    pub position: SourcePosition,
    #[serde(skip)]
    mode: ModeCell,
}

/// Placement of empty keys in `order by`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyOrder {
    #[default]
    Least,
    Greatest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderKey {
    pub expression: Expression,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub empty: EmptyOrder,
}

/// `$variable [:= expression]` in a `group by`
#[derive(Debug, Clone, Deserialize)]
pub struct GroupKey {
    pub variable: String,
    #[serde(default)]
    pub expression: Option<Expression>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "clause", rename_all = "kebab-case")]
pub enum ClauseKind {
    For {
        variable: String,
        #[serde(default)]
        at: Option<String>,
        #[serde(default)]
        allowing_empty: bool,
        #[serde(rename = "in")]
        source: Expression,
    },
    Let {
        variable: String,
        value: Expression,
    },
    Where {
        condition: Expression,
    },
    OrderBy {
        keys: Vec<OrderKey>,
    },
    GroupBy {
        keys: Vec<GroupKey>,
    },
    Count {
        variable: String,
    },
}

impl ClauseKind {
    pub fn name(&self) -> &'static str {
        match self {
            ClauseKind::For { .. } => "for",
            ClauseKind::Let { .. } => "let",
            ClauseKind::Where { .. } => "where",
            ClauseKind::OrderBy { .. } => "order-by",
            ClauseKind::GroupBy { .. } => "group-by",
            ClauseKind::Count { .. } => "count",
        }
    }
}

impl Clause {
    pub fn new(kind: ClauseKind, position: SourcePosition) -> Self {
        Self {
            kind,
            position,
            mode: ModeCell::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Mode of the tuple stream after this clause
    pub fn mode(&self) -> EngineResult<ExecutionMode> {
        self.mode
            .get(self.name())
            .map_err(|e| e.at(&self.position))
    }

    pub fn mode_tolerating_unset(&self) -> ExecutionMode {
        self.mode.get_tolerating_unset()
    }

    pub(crate) fn set_mode(&self, mode: ExecutionMode) -> ExecutionMode {
        self.mode.set(mode)
    }
}

/// Borrowed reference to any tree node
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Expression(&'a Expression),
    Clause(&'a Clause),
}

impl<'a> NodeRef<'a> {
    pub fn name(&self) -> &'static str {
        match self {
            NodeRef::Expression(e) => e.name(),
            NodeRef::Clause(c) => c.name(),
        }
    }

    pub fn position(&self) -> &'a SourcePosition {
        match self {
            NodeRef::Expression(e) => &e.position,
            NodeRef::Clause(c) => &c.position,
        }
    }

    pub fn mode_tolerating_unset(&self) -> ExecutionMode {
        match self {
            NodeRef::Expression(e) => e.mode_tolerating_unset(),
            NodeRef::Clause(c) => c.mode_tolerating_unset(),
        }
    }

    /// Direct children in evaluation order
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        match self {
            NodeRef::Expression(e) => expression_children(e),
            NodeRef::Clause(c) => clause_children(c),
        }
    }

    /// All nodes below this one, depth-first, pre-order
    pub fn descendants(&self) -> Vec<NodeRef<'a>> {
        self.children().into_iter().fold(Vec::new(), |mut acc, child| {
            acc.push(child);
            acc.extend(child.descendants());
            acc
        })
    }

    /// Descendants satisfying a predicate
    pub fn descendants_matching<P>(&self, predicate: P) -> Vec<NodeRef<'a>>
    where
        P: Fn(&NodeRef<'a>) -> bool,
    {
        self.descendants().into_iter().filter(|n| predicate(n)).collect()
    }
}

fn expression_children(expression: &Expression) -> Vec<NodeRef<'_>> {
    use ExpressionKind::*;

    match &expression.kind {
        Literal { .. } | Variable { .. } | ContextItem | FunctionRef { .. } => Vec::new(),
        Sequence { members } => members.iter().map(node).collect(),
        Arithmetic { left, right, .. }
        | Comparison { left, right, .. }
        | Logical { left, right, .. } => vec![node(left), node(right)],
        Not { operand } => vec![node(operand)],
        If {
            condition,
            then,
            otherwise,
        } => vec![node(condition), node(then), node(otherwise)],
        Range { from, to } => vec![node(from), node(to)],
        Object { pairs } => pairs
            .iter()
            .flat_map(|p| [node(&p.key), node(&p.value)])
            .collect(),
        Array { members } => members.iter().map(|m| node(m)).collect(),
        ObjectLookup { object, key } => vec![node(object), node(key)],
        ArrayLookup { array, index } => vec![node(array), node(index)],
        ArrayUnbox { array } => vec![node(array)],
        Filter {
            sequence,
            predicate,
        } => vec![node(sequence), node(predicate)],
        FunctionCall { arguments, .. } => arguments.iter().flatten().map(node).collect(),
        DynamicCall {
            function,
            arguments,
        } => std::iter::once(node(function))
            .chain(arguments.iter().flatten().map(node))
            .collect(),
        InlineFunction { body, .. } => vec![node(body)],
        Flwor {
            clauses,
            return_expression,
        } => clauses
            .iter()
            .map(NodeRef::Clause)
            .chain(std::iter::once(node(return_expression)))
            .collect(),
    }
}

fn node(expression: &Expression) -> NodeRef<'_> {
    NodeRef::Expression(expression)
}

fn clause_children(clause: &Clause) -> Vec<NodeRef<'_>> {
    match &clause.kind {
        ClauseKind::For { source, .. } => vec![NodeRef::Expression(source)],
        ClauseKind::Let { value, .. } => vec![NodeRef::Expression(value)],
        ClauseKind::Where { condition } => vec![NodeRef::Expression(condition)],
        ClauseKind::OrderBy { keys } => keys
            .iter()
            .map(|k| NodeRef::Expression(&k.expression))
            .collect(),
        ClauseKind::GroupBy { keys } => keys
            .iter()
            .filter_map(|k| k.expression.as_ref())
            .map(NodeRef::Expression)
            .collect(),
        ClauseKind::Count { .. } => Vec::new(),
    }
}

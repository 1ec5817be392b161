//! Expression tree, execution modes and static analysis
//!
//! The tree is read from a JSON query module. [`analyse`] annotates every
//! node with its [`ExecutionMode`] before anything is compiled or evaluated.

mod analysis;
mod explain;
mod mode;
mod module;
mod node;

pub use analysis::{analyse, ModeAnalyzer, CONTEXT_ITEM};
pub use explain::{ExplainLine, ExplainPlan};
pub use mode::{ExecutionMode, ModeCell};
pub use module::{FunctionDeclaration, QueryModule};
pub use node::{
    ArithmeticOp, Clause, ClauseKind, ComparisonOp, EmptyOrder, Expression, ExpressionKind,
    GroupKey, LogicalOp, NodeRef, ObjectPair, OrderKey, Parameter,
};

//! # FLWOR tuple pipeline
//!
//! Every clause is a [`Strategy`] over [`FlworTuple`]s wrapped in the same
//! [`Hybrid`](crate::runtime::Hybrid) iterator as expressions, so clauses
//! follow the open/next/reset/close protocol and dispatch on the stream's
//! static mode. A clause pulls from its upstream clause; the first clause
//! reads a single empty tuple.
//!
//! The FLWOR expression itself is the `return` projection over the last
//! clause.

mod clauses;
mod group_by;
mod tuple;

pub use clauses::{CountClause, ForClause, LetClause, OrderByClause, OrderSpec, WhereClause};
pub use group_by::{GroupByClause, GroupSpec};
pub use tuple::{FlworKey, FlworTuple};

use std::sync::Arc;

use crate::cluster::Collection;
use crate::context::DynamicContext;
use crate::errors::EngineResult;
use crate::expression::ExecutionMode;
use crate::item::Item;
use crate::runtime::{evaluate, Runtime, Strategy};

/// Incoming tuple stream of a clause
#[derive(Clone)]
pub enum Upstream {
    /// Start of the pipeline: one empty tuple
    Start { pending: bool },
    Clause(Box<dyn Runtime<FlworTuple>>),
}

impl Upstream {
    pub fn start() -> Self {
        Upstream::Start { pending: false }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Upstream::Start { .. })
    }

    fn open(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        match self {
            Upstream::Start { pending } => *pending = true,
            Upstream::Clause(clause) => clause.open(context)?,
        }
        Ok(())
    }

    fn next(&mut self) -> EngineResult<Option<FlworTuple>> {
        match self {
            Upstream::Start { pending } => Ok(std::mem::take(pending).then(FlworTuple::default)),
            Upstream::Clause(clause) if clause.has_next() => clause.next().map(Some),
            Upstream::Clause(_) => Ok(None),
        }
    }

    fn close(&mut self) {
        match self {
            Upstream::Start { pending } => *pending = false,
            Upstream::Clause(clause) => clause.close(),
        }
    }

    fn collection(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Collection<FlworTuple>> {
        match self {
            Upstream::Start { .. } => Ok(Collection::parallelize(vec![FlworTuple::default()], 1)),
            Upstream::Clause(clause) => clause.collection(context),
        }
    }
}

/// Scope of one tuple: the tuple's bindings over the outer context
pub(crate) fn tuple_scope(context: &Arc<DynamicContext>, tuple: &FlworTuple) -> Arc<DynamicContext> {
    context.child(tuple.to_bindings())
}

/// `return R` over the last clause
#[derive(Clone)]
pub struct ReturnClause {
    expression: Box<dyn Runtime<Item>>,
    upstream: Upstream,
    context: Option<Arc<DynamicContext>>,
    current: Option<Box<dyn Runtime<Item>>>,
}

impl ReturnClause {
    pub fn new(expression: Box<dyn Runtime<Item>>, upstream: Upstream) -> Self {
        Self {
            expression,
            upstream,
            context: None,
            current: None,
        }
    }
}

impl Strategy for ReturnClause {
    type Output = Item;

    fn name(&self) -> &'static str {
        "flwor"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.upstream.open(context)?;
        self.context = Some(Arc::clone(context));
        self.current = None;
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<Item>> {
        let Some(context) = self.context.clone() else {
            return Ok(None);
        };
        loop {
            if let Some(current) = &mut self.current {
                if current.has_next() {
                    return current.next().map(Some);
                }
                current.close();
                self.current = None;
            }
            let Some(tuple) = self.upstream.next()? else {
                return Ok(None);
            };
            let mut projection = self.expression.clone_box();
            projection.open(&tuple_scope(&context, &tuple))?;
            self.current = Some(projection);
        }
    }

    fn close_local(&mut self) {
        if let Some(current) = &mut self.current {
            current.close();
        }
        self.current = None;
        self.upstream.close();
        self.context = None;
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<Item>> {
        let tuples = self.upstream.collection(context)?;
        let expression = &self.expression;
        tuples.flat_map(|tuple| evaluate(expression.as_ref(), &tuple_scope(context, tuple)))
    }
}

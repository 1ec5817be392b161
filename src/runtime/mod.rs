//! Runtime iterators
//!
//! Every compiled node is a [`Runtime`] iterator following one protocol:
//!
//! - `open` moves to Open and computes the first result
//! - `has_next` reports the cached lookahead, with no side effects
//! - `next` hands out the cached result and computes the following one;
//!   calling it with nothing pending is a flow error
//! - `reset` re-initializes an open iterator against a new context
//! - `close` releases sub-iterators and may be called any number of times
//!
//! Compiled trees are templates: evaluation always works on a closed copy
//! from [`Runtime::clone_box`], so one template can serve many concurrent
//! evaluations.

pub mod boundary;
mod compiler;
mod hybrid;
mod lookahead;
mod navigation;
mod operators;
mod primary;

pub use compiler::Compiler;
pub use hybrid::{Compute, Computed, Hybrid, Strategy};
pub use lookahead::Lookahead;
pub use primary::VariableReference;

use std::sync::Arc;

use crate::cluster::{Collection, DataFrame};
use crate::context::{DynamicContext, Value};
use crate::errors::{EngineError, EngineResult, SourcePosition};
use crate::expression::ExecutionMode;
use crate::item::{Item, Sequence};

/// Pull-based iterator over `T` with an optional distributed form
pub trait Runtime<T>: Send + Sync {
    fn open(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()>;

    fn has_next(&self) -> bool;

    fn next(&mut self) -> EngineResult<T>;

    fn reset(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Statically computed execution mode
    fn mode(&self) -> ExecutionMode;

    fn position(&self) -> &SourcePosition;

    fn name(&self) -> &'static str;

    /// Row-distributed form; only available in a parallel mode
    fn collection(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Collection<T>>;

    /// Columnar form; only available in the columnar mode
    fn frame(&mut self, _context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        Err(EngineError::flow(format!(
            "Columnar form requested from {}",
            self.name()
        )))
    }

    /// A closed copy sharing nothing mutable with this iterator
    fn clone_box(&self) -> Box<dyn Runtime<T>>;
}

impl<T: 'static> Clone for Box<dyn Runtime<T>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Pulls every remaining result of an open iterator, then closes it
pub fn drain<T>(iterator: &mut dyn Runtime<T>) -> EngineResult<Vec<T>> {
    let mut results = Vec::new();
    while iterator.has_next() {
        match iterator.next() {
            Ok(result) => results.push(result),
            Err(e) => {
                iterator.close();
                return Err(e);
            }
        }
    }
    iterator.close();
    Ok(results)
}

/// Evaluates a fresh copy of `template` to a local sequence
pub fn evaluate(template: &dyn Runtime<Item>, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
    let mut iterator = template.clone_box();
    iterator.open(context)?;
    drain(iterator.as_mut())
}

/// Evaluates `template` into the representation matching its mode
pub fn evaluate_value(template: &dyn Runtime<Item>, context: &Arc<DynamicContext>) -> EngineResult<Value> {
    let mut iterator = template.clone_box();
    match iterator.mode() {
        ExecutionMode::ParallelColumnar => Ok(Value::Columns(iterator.frame(context)?)),
        ExecutionMode::ParallelRowWise => Ok(Value::Rows(iterator.collection(context)?)),
        _ => {
            iterator.open(context)?;
            Ok(Value::Local(drain(iterator.as_mut())?))
        }
    }
}

/// Row form of a parallel template's result
pub fn evaluate_rows(template: &dyn Runtime<Item>, context: &Arc<DynamicContext>) -> EngineResult<Collection<Item>> {
    template.clone_box().collection(context)
}

/// Evaluates `template` to at most one item
pub fn evaluate_optional(
    template: &dyn Runtime<Item>,
    context: &Arc<DynamicContext>,
    what: &str,
) -> EngineResult<Option<Item>> {
    let mut items = evaluate(template, context)?;
    match items.len() {
        0 => Ok(None),
        1 => Ok(items.pop()),
        n => Err(EngineError::type_mismatch(format!(
            "{} must be a single item, found a sequence of {}",
            what, n
        ))
        .at(template.position())),
    }
}

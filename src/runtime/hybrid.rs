//! Hybrid iterator
//!
//! One [`Runtime`] implementation for every node kind. The node-specific part
//! is a [`Strategy`]; the hybrid adds the open/next/close state machine, the
//! lookahead and the dispatch between the local pull loop and the
//! distributed form. Dispatch is decided by the static mode and never per
//! call:
//!
//! - Local: `open` drives the strategy's pull loop.
//! - Parallel: `collection`/`frame` return the distributed form, memoized per
//!   context until `close`. Opening a parallel iterator pulls that
//!   collection to the host through the boundary.

use std::collections::VecDeque;
use std::sync::Arc;

use super::boundary;
use super::lookahead::Lookahead;
use super::Runtime;
use crate::cluster::{Collection, DataFrame};
use crate::context::DynamicContext;
use crate::errors::{EngineError, EngineResult, SourcePosition, WithPosition};
use crate::expression::ExecutionMode;
use crate::item::{Item, Sequence};

/// Node-specific evaluation logic
pub trait Strategy: Clone + Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// Prepares the pull loop
    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()>;

    /// Next result of the pull loop, `None` once exhausted
    fn next_local(&mut self) -> EngineResult<Option<Self::Output>>;

    /// Releases everything held by the pull loop; must be idempotent
    fn close_local(&mut self);

    /// Distributed form for a parallel mode
    fn collection(
        &mut self,
        _context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<Self::Output>> {
        Err(EngineError::flow(format!(
            "{} has no distributed form",
            self.name()
        )))
    }

    /// Columnar form for the columnar mode
    fn frame(&mut self, _context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        Err(EngineError::flow(format!(
            "{} has no columnar form",
            self.name()
        )))
    }
}

/// Iterator dispatching between a local pull loop and a distributed form
pub struct Hybrid<S: Strategy> {
    strategy: S,
    mode: ExecutionMode,
    position: SourcePosition,
    lookahead: Lookahead<S::Output>,
    materialized: Option<std::vec::IntoIter<S::Output>>,
    memo: Option<(Arc<DynamicContext>, Collection<S::Output>)>,
}

impl<S: Strategy> Hybrid<S> {
    pub fn new(strategy: S, mode: ExecutionMode, position: SourcePosition) -> Self {
        Self {
            strategy,
            mode,
            position,
            lookahead: Lookahead::new(),
            materialized: None,
            memo: None,
        }
    }

    /// Boxed as a runtime iterator
    pub fn boxed(strategy: S, mode: ExecutionMode, position: SourcePosition) -> Box<dyn Runtime<S::Output>> {
        Box::new(Self::new(strategy, mode, position))
    }

    fn pull(&mut self) -> EngineResult<Option<S::Output>> {
        match &mut self.materialized {
            Some(records) => Ok(records.next()),
            None => self.strategy.next_local().at(&self.position),
        }
    }

    fn start(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        match self.mode {
            ExecutionMode::Unset => {
                return Err(EngineError::flow(format!(
                    "Execution mode of {} read before it was computed",
                    self.strategy.name()
                ))
                .at(&self.position));
            }
            ExecutionMode::Local => {
                self.strategy.open_local(context).at(&self.position)?;
            }
            ExecutionMode::ParallelRowWise | ExecutionMode::ParallelColumnar => {
                let collection = self.collection(context)?;
                let records =
                    boundary::materialize(&collection, context.session(), &self.position)?;
                self.materialized = Some(records.into_iter());
            }
        }

        let first = self.pull()?;
        self.lookahead.opened(first);
        Ok(())
    }

    fn release(&mut self) {
        self.strategy.close_local();
        self.materialized = None;
        self.memo = None;
        self.lookahead.closed();
    }
}

impl<S: Strategy> Runtime<S::Output> for Hybrid<S> {
    fn open(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        if self.lookahead.is_open() {
            self.release();
        }
        context.session().metrics().increment_iterators_opened();
        let started = self.start(context);
        if started.is_err() {
            self.release();
        }
        started
    }

    fn has_next(&self) -> bool {
        self.lookahead.has_next()
    }

    fn next(&mut self) -> EngineResult<S::Output> {
        let result = self
            .lookahead
            .take(self.strategy.name())
            .at(&self.position)?;
        let following = self.pull()?;
        self.lookahead.refill(following);
        Ok(result)
    }

    fn reset(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.release();
        self.start(context)
    }

    fn close(&mut self) {
        self.release();
    }

    fn is_open(&self) -> bool {
        self.lookahead.is_open()
    }

    fn mode(&self) -> ExecutionMode {
        self.mode
    }

    fn position(&self) -> &SourcePosition {
        &self.position
    }

    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    fn collection(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Collection<S::Output>> {
        if !self.mode.is_parallel() {
            return Err(EngineError::flow(format!(
                "Distributed form requested from {} in mode {}",
                self.strategy.name(),
                self.mode
            ))
            .at(&self.position));
        }
        if let Some((memo_context, collection)) = &self.memo {
            if Arc::ptr_eq(memo_context, context) {
                return Ok(collection.clone());
            }
        }

        let collection = self
            .strategy
            .collection(context, self.mode)
            .at(&self.position)?;
        self.memo = Some((Arc::clone(context), collection.clone()));
        Ok(collection)
    }

    fn frame(&mut self, context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        if !self.mode.is_columnar() {
            return Err(EngineError::flow(format!(
                "Columnar form requested from {} in mode {}",
                self.strategy.name(),
                self.mode
            ))
            .at(&self.position));
        }
        self.strategy.frame(context).at(&self.position)
    }

    fn clone_box(&self) -> Box<dyn Runtime<S::Output>> {
        let mut strategy = self.strategy.clone();
        strategy.close_local();
        Box::new(Hybrid::new(strategy, self.mode, self.position.clone()))
    }
}

/// Strategies that compute their whole local result at once
pub trait Compute: Clone + Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Sequence>;

    fn collection(
        &mut self,
        _context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<Item>> {
        Err(EngineError::flow(format!(
            "{} has no distributed form",
            self.name()
        )))
    }

    fn frame(&mut self, _context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        Err(EngineError::flow(format!(
            "{} has no columnar form",
            self.name()
        )))
    }
}

/// Adapts a [`Compute`] into a buffered [`Strategy`]
#[derive(Clone)]
pub struct Computed<C> {
    inner: C,
    buffer: VecDeque<Item>,
}

impl<C: Compute> Computed<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            buffer: VecDeque::new(),
        }
    }
}

impl<C: Compute> Strategy for Computed<C> {
    type Output = Item;

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.buffer = self.inner.compute(context)?.into();
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<Item>> {
        Ok(self.buffer.pop_front())
    }

    fn close_local(&mut self) {
        self.buffer.clear();
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        mode: ExecutionMode,
    ) -> EngineResult<Collection<Item>> {
        self.inner.collection(context, mode)
    }

    fn frame(&mut self, context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        self.inner.frame(context)
    }
}

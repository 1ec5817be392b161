//! Binding, filtering, ordering and counting clauses

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use super::{tuple_scope, FlworTuple, Upstream};
use crate::cluster::Collection;
use crate::context::{DynamicContext, Value};
use crate::errors::{EngineError, EngineResult};
use crate::expression::{EmptyOrder, ExecutionMode};
use crate::item::{compare_atomics, effective_boolean_value, Item};
use crate::runtime::{evaluate, evaluate_optional, evaluate_rows, evaluate_value, Runtime, Strategy};

/// `for $x [at $i] [allowing empty] in E`
#[derive(Clone)]
pub struct ForClause {
    variable: String,
    at: Option<String>,
    allowing_empty: bool,
    source: Box<dyn Runtime<Item>>,
    upstream: Upstream,
    context: Option<Arc<DynamicContext>>,
    current: Option<FlworTuple>,
    index: i64,
}

impl ForClause {
    pub fn new(
        variable: impl Into<String>,
        at: Option<String>,
        allowing_empty: bool,
        source: Box<dyn Runtime<Item>>,
        upstream: Upstream,
    ) -> Self {
        Self {
            variable: variable.into(),
            at,
            allowing_empty,
            source,
            upstream,
            context: None,
            current: None,
            index: 0,
        }
    }

    fn bind(&self, tuple: &FlworTuple, value: Value, index: i64) -> FlworTuple {
        let mut bound = tuple.with(&self.variable, value);
        if let Some(at) = &self.at {
            bound.insert(at, Value::single(Item::Integer(index)));
        }
        bound
    }

    /// Output tuples for one incoming tuple and its source items
    fn expand(&self, tuple: &FlworTuple, items: Vec<Item>) -> Vec<FlworTuple> {
        if items.is_empty() && self.allowing_empty {
            return vec![self.bind(tuple, Value::empty(), 0)];
        }
        items
            .into_iter()
            .zip(1..)
            .map(|(item, index)| self.bind(tuple, Value::single(item), index))
            .collect()
    }
}

impl Strategy for ForClause {
    type Output = FlworTuple;

    fn name(&self) -> &'static str {
        "for"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.upstream.open(context)?;
        self.context = Some(Arc::clone(context));
        self.current = None;
        self.index = 0;
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<FlworTuple>> {
        let Some(context) = self.context.clone() else {
            return Ok(None);
        };
        loop {
            if let Some(tuple) = &self.current {
                if self.source.has_next() {
                    let item = self.source.next()?;
                    self.index += 1;
                    return Ok(Some(self.bind(tuple, Value::single(item), self.index)));
                }
                let exhausted_empty = self.index == 0 && self.allowing_empty;
                let tuple = self.current.take();
                if let (true, Some(tuple)) = (exhausted_empty, tuple) {
                    return Ok(Some(self.bind(&tuple, Value::empty(), 0)));
                }
            }

            let Some(tuple) = self.upstream.next()? else {
                return Ok(None);
            };
            let scope = tuple_scope(&context, &tuple);
            if self.source.is_open() {
                self.source.reset(&scope)?;
            } else {
                self.source.open(&scope)?;
            }
            self.current = Some(tuple);
            self.index = 0;
        }
    }

    fn close_local(&mut self) {
        self.source.close();
        self.upstream.close();
        self.context = None;
        self.current = None;
        self.index = 0;
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<FlworTuple>> {
        if self.upstream.is_start() && self.source.mode().is_parallel() {
            let rows = evaluate_rows(self.source.as_ref(), context)?;
            let start = FlworTuple::default();
            if rows.is_empty() && self.allowing_empty {
                return Ok(Collection::parallelize(
                    vec![self.bind(&start, Value::empty(), 0)],
                    1,
                ));
            }
            return match self.at {
                Some(_) => rows.zip_with_index().map(|(item, index)| {
                    Ok(self.bind(&start, Value::single(item.clone()), *index as i64 + 1))
                }),
                None => rows.map(|item| Ok(self.bind(&start, Value::single(item.clone()), 0))),
            };
        }

        let tuples = self.upstream.collection(context)?;
        let this = &*self;
        tuples.flat_map(|tuple| {
            let items = evaluate(this.source.as_ref(), &tuple_scope(context, tuple))?;
            Ok(this.expand(tuple, items))
        })
    }
}

/// `let $x := E`
#[derive(Clone)]
pub struct LetClause {
    variable: String,
    value: Box<dyn Runtime<Item>>,
    upstream: Upstream,
    context: Option<Arc<DynamicContext>>,
}

impl LetClause {
    pub fn new(variable: impl Into<String>, value: Box<dyn Runtime<Item>>, upstream: Upstream) -> Self {
        Self {
            variable: variable.into(),
            value,
            upstream,
            context: None,
        }
    }
}

impl Strategy for LetClause {
    type Output = FlworTuple;

    fn name(&self) -> &'static str {
        "let"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.upstream.open(context)?;
        self.context = Some(Arc::clone(context));
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<FlworTuple>> {
        let Some(context) = self.context.clone() else {
            return Ok(None);
        };
        let Some(tuple) = self.upstream.next()? else {
            return Ok(None);
        };
        let value = evaluate_value(self.value.as_ref(), &tuple_scope(&context, &tuple))?;
        Ok(Some(tuple.with(&self.variable, value)))
    }

    fn close_local(&mut self) {
        self.upstream.close();
        self.context = None;
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<FlworTuple>> {
        let tuples = self.upstream.collection(context)?;
        let this = &*self;
        tuples.map(|tuple| {
            let items = evaluate(this.value.as_ref(), &tuple_scope(context, tuple))?;
            Ok(tuple.with(&this.variable, Value::Local(items)))
        })
    }
}

/// `where C`
#[derive(Clone)]
pub struct WhereClause {
    condition: Box<dyn Runtime<Item>>,
    upstream: Upstream,
    context: Option<Arc<DynamicContext>>,
}

impl WhereClause {
    pub fn new(condition: Box<dyn Runtime<Item>>, upstream: Upstream) -> Self {
        Self {
            condition,
            upstream,
            context: None,
        }
    }

    fn keeps(&self, tuple: &FlworTuple, context: &Arc<DynamicContext>) -> EngineResult<bool> {
        let result = evaluate(self.condition.as_ref(), &tuple_scope(context, tuple))?;
        effective_boolean_value(&result).map_err(|e| e.at(self.condition.position()))
    }
}

impl Strategy for WhereClause {
    type Output = FlworTuple;

    fn name(&self) -> &'static str {
        "where"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.upstream.open(context)?;
        self.context = Some(Arc::clone(context));
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<FlworTuple>> {
        let Some(context) = self.context.clone() else {
            return Ok(None);
        };
        while let Some(tuple) = self.upstream.next()? {
            if self.keeps(&tuple, &context)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn close_local(&mut self) {
        self.upstream.close();
        self.context = None;
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<FlworTuple>> {
        let tuples = self.upstream.collection(context)?;
        let this = &*self;
        tuples.filter(|tuple| this.keeps(tuple, context))
    }
}

/// One `order by` key
#[derive(Clone)]
pub struct OrderSpec {
    pub expression: Box<dyn Runtime<Item>>,
    pub descending: bool,
    pub empty: EmptyOrder,
}

type SortKey = Vec<Option<Item>>;

/// `order by K1 [descending] [empty greatest|least], ...`
#[derive(Clone)]
pub struct OrderByClause {
    keys: Vec<OrderSpec>,
    upstream: Upstream,
    sorted: VecDeque<FlworTuple>,
}

impl OrderByClause {
    pub fn new(keys: Vec<OrderSpec>, upstream: Upstream) -> Self {
        Self {
            keys,
            upstream,
            sorted: VecDeque::new(),
        }
    }

    fn sort_key(&self, tuple: &FlworTuple, context: &Arc<DynamicContext>) -> EngineResult<SortKey> {
        let scope = tuple_scope(context, tuple);
        self.keys
            .iter()
            .map(|spec| {
                match evaluate_optional(spec.expression.as_ref(), &scope, "Order key")? {
                    Some(item) if !item.is_atomic() => Err(EngineError::type_mismatch(format!(
                        "Order key must be an atomic, found {}",
                        item.type_name()
                    ))
                    .at(spec.expression.position())),
                    key => Ok(key),
                }
            })
            .collect()
    }

    fn compare(&self, a: &SortKey, b: &SortKey) -> EngineResult<Ordering> {
        for ((x, y), spec) in a.iter().zip(b).zip(&self.keys) {
            let ordering = match (x, y) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => match spec.empty {
                    EmptyOrder::Least => Ordering::Less,
                    EmptyOrder::Greatest => Ordering::Greater,
                },
                (Some(_), None) => match spec.empty {
                    EmptyOrder::Least => Ordering::Greater,
                    EmptyOrder::Greatest => Ordering::Less,
                },
                (Some(x), Some(y)) => {
                    compare_atomics(x, y).map_err(|e| e.at(spec.expression.position()))?
                }
            };
            let ordering = if spec.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(Ordering::Equal)
    }
}

impl Strategy for OrderByClause {
    type Output = FlworTuple;

    fn name(&self) -> &'static str {
        "order-by"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.upstream.open(context)?;
        let mut keyed = Vec::new();
        while let Some(tuple) = self.upstream.next()? {
            keyed.push((self.sort_key(&tuple, context)?, tuple));
        }
        self.upstream.close();

        let mut failure = None;
        keyed.sort_by(|a, b| match self.compare(&a.0, &b.0) {
            Ok(ordering) => ordering,
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        self.sorted = keyed.into_iter().map(|(_, tuple)| tuple).collect();
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<FlworTuple>> {
        Ok(self.sorted.pop_front())
    }

    fn close_local(&mut self) {
        self.upstream.close();
        self.sorted.clear();
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<FlworTuple>> {
        let tuples = self.upstream.collection(context)?;
        let this = &*self;
        let sorted =
            tuples.sort_by(|tuple| this.sort_key(tuple, context), |a, b| this.compare(a, b))?;
        context.session().metrics().increment_shuffles();
        Ok(sorted)
    }
}

/// `count $c`
#[derive(Clone)]
pub struct CountClause {
    variable: String,
    upstream: Upstream,
    counter: i64,
}

impl CountClause {
    pub fn new(variable: impl Into<String>, upstream: Upstream) -> Self {
        Self {
            variable: variable.into(),
            upstream,
            counter: 0,
        }
    }
}

impl Strategy for CountClause {
    type Output = FlworTuple;

    fn name(&self) -> &'static str {
        "count"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.counter = 0;
        self.upstream.open(context)
    }

    fn next_local(&mut self) -> EngineResult<Option<FlworTuple>> {
        let Some(tuple) = self.upstream.next()? else {
            return Ok(None);
        };
        self.counter += 1;
        Ok(Some(tuple.with(&self.variable, Value::single(Item::Integer(self.counter)))))
    }

    fn close_local(&mut self) {
        self.upstream.close();
        self.counter = 0;
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<FlworTuple>> {
        let variable = &self.variable;
        self.upstream
            .collection(context)?
            .zip_with_index()
            .map(|(tuple, index)| {
                Ok(tuple.with(variable, Value::single(Item::Integer(*index as i64 + 1))))
            })
    }
}

//! `group by`
//!
//! Locally, groups are gathered in an insertion-ordered map: output follows
//! first-seen key order and each group keeps its input order. Distributed,
//! tuples are keyed, shuffled with `group_by_key` and linearized; neither
//! group order nor order within a group is guaranteed there, only the set of
//! groups and their contents.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;

use super::{tuple_scope, FlworKey, FlworTuple, Upstream};
use crate::cluster::Collection;
use crate::context::{DynamicContext, Value};
use crate::errors::{EngineError, EngineResult, SourcePosition};
use crate::expression::ExecutionMode;
use crate::item::{Item, Sequence};
use crate::observability::{log_event_with_fields, Event, Timer};
use crate::runtime::{evaluate, Runtime, Strategy};

/// `$variable [:= expression]`
#[derive(Clone)]
pub struct GroupSpec {
    pub variable: String,
    pub expression: Option<Box<dyn Runtime<Item>>>,
}

#[derive(Clone)]
pub struct GroupByClause {
    keys: Vec<GroupSpec>,
    upstream: Upstream,
    position: SourcePosition,
    groups: VecDeque<FlworTuple>,
}

/// A key component must be empty or one atomic
fn key_component(variable: &str, items: Sequence) -> EngineResult<Option<Item>> {
    match items.as_slice() {
        [] => Ok(None),
        [item] if item.is_atomic() => Ok(Some(item.clone())),
        [item] => Err(EngineError::non_groupable(variable, item.type_name())),
        many => Err(EngineError::non_groupable(
            variable,
            format!("a sequence of {} items", many.len()),
        )),
    }
}

impl GroupByClause {
    pub fn new(keys: Vec<GroupSpec>, upstream: Upstream, position: SourcePosition) -> Self {
        Self {
            keys,
            upstream,
            position,
            groups: VecDeque::new(),
        }
    }

    /// The key of one tuple, with every grouping variable bound
    fn key(&self, tuple: &FlworTuple, context: &Arc<DynamicContext>) -> EngineResult<(FlworKey, FlworTuple)> {
        let mut keyed = tuple.clone();
        let mut components = Vec::with_capacity(self.keys.len());

        for spec in &self.keys {
            let items = match &spec.expression {
                Some(expression) => evaluate(expression.as_ref(), &tuple_scope(context, &keyed))?,
                None => match tuple.get(&spec.variable) {
                    Some(value) => value.to_sequence(context.session(), &self.position)?,
                    None => return Err(EngineError::undefined_variable(&spec.variable)),
                },
            };
            let component = key_component(&spec.variable, items).map_err(|e| e.at(&self.position))?;
            keyed.insert(&spec.variable, Value::Local(component.iter().cloned().collect()));
            components.push(component);
        }
        Ok((FlworKey(components), keyed))
    }

    /// Collapses one group into a single tuple
    ///
    /// Grouping variables keep their shared value; every other variable
    /// becomes the concatenation of its values across the group.
    fn linearize(
        &self,
        key: &FlworKey,
        group: &[FlworTuple],
        context: &Arc<DynamicContext>,
    ) -> EngineResult<FlworTuple> {
        let mut output = FlworTuple::new();
        let Some(first) = group.first() else {
            return Ok(output);
        };

        for name in first.names() {
            if self.keys.iter().any(|spec| spec.variable == name) {
                continue;
            }
            let mut items = Vec::new();
            for tuple in group {
                if let Some(value) = tuple.get(name) {
                    items.extend(value.to_sequence(context.session(), &self.position)?);
                }
            }
            output.insert(name, Value::Local(items));
        }
        for (spec, component) in self.keys.iter().zip(key.components()) {
            output.insert(&spec.variable, Value::Local(component.iter().cloned().collect()));
        }
        Ok(output)
    }
}

impl Strategy for GroupByClause {
    type Output = FlworTuple;

    fn name(&self) -> &'static str {
        "group-by"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.upstream.open(context)?;
        let mut groups: IndexMap<FlworKey, Vec<FlworTuple>> = IndexMap::new();
        while let Some(tuple) = self.upstream.next()? {
            let (key, keyed) = self.key(&tuple, context)?;
            groups.entry(key).or_default().push(keyed);
        }
        self.upstream.close();

        self.groups = groups
            .iter()
            .map(|(key, group)| self.linearize(key, group, context))
            .collect::<EngineResult<_>>()?;
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<FlworTuple>> {
        Ok(self.groups.pop_front())
    }

    fn close_local(&mut self) {
        self.upstream.close();
        self.groups.clear();
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<FlworTuple>> {
        let tuples = self.upstream.collection(context)?;
        let this = &*self;
        let position = self.position.to_string();

        let timer = Timer::new();
        log_event_with_fields(
            Event::ShuffleBegin,
            &[
                ("partitions", &tuples.num_partitions().to_string()),
                ("position", &position),
            ],
        );
        let pairs = tuples.map_to_pair(|tuple| this.key(tuple, context))?;
        let groups = pairs.group_by_key();
        context.session().metrics().increment_shuffles();
        log_event_with_fields(
            Event::ShuffleComplete,
            &[
                ("duration_ms", &timer.elapsed_ms()),
                ("groups", &groups.count().to_string()),
                ("position", &position),
            ],
        );

        groups.map(|(key, group)| this.linearize(key, group, context))
    }
}

//! Leaves, sequences and constructors

use std::sync::Arc;

use super::hybrid::{Compute, Strategy};
use super::{evaluate, evaluate_optional, Runtime};
use crate::cluster::{Collection, DataFrame};
use crate::context::{DynamicContext, Value};
use crate::errors::{EngineError, EngineResult, SourcePosition};
use crate::expression::{ExecutionMode, CONTEXT_ITEM};
use crate::item::{Item, Sequence};

#[derive(Clone)]
pub struct Literal {
    pub item: Item,
}

impl Compute for Literal {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn compute(&mut self, _context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        Ok(vec![self.item.clone()])
    }
}

/// Comma operator: members one after another
#[derive(Clone)]
pub struct Concat {
    pub members: Vec<Box<dyn Runtime<Item>>>,
    current: usize,
    context: Option<Arc<DynamicContext>>,
}

impl Concat {
    pub fn new(members: Vec<Box<dyn Runtime<Item>>>) -> Self {
        Self {
            members,
            current: 0,
            context: None,
        }
    }
}

impl Strategy for Concat {
    type Output = Item;

    fn name(&self) -> &'static str {
        "sequence"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.current = 0;
        self.context = Some(Arc::clone(context));
        if let Some(first) = self.members.first_mut() {
            first.open(context)?;
        }
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<Item>> {
        let Some(context) = self.context.clone() else {
            return Ok(None);
        };
        while self.current < self.members.len() {
            let member = &mut self.members[self.current];
            if member.has_next() {
                return member.next().map(Some);
            }
            member.close();
            self.current += 1;
            if let Some(next) = self.members.get_mut(self.current) {
                next.open(&context)?;
            }
        }
        Ok(None)
    }

    fn close_local(&mut self) {
        for member in &mut self.members {
            member.close();
        }
        self.context = None;
        self.current = 0;
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<Item>> {
        let mut union = Collection::empty();
        for member in &mut self.members {
            union = union.union(&member.collection(context)?);
        }
        Ok(union)
    }
}

/// `$name`
#[derive(Clone)]
pub struct VariableReference {
    pub name: String,
    pub position: SourcePosition,
    items: std::vec::IntoIter<Item>,
}

impl VariableReference {
    pub fn new(name: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            name: name.into(),
            position,
            items: Vec::new().into_iter(),
        }
    }
}

impl Strategy for VariableReference {
    type Output = Item;

    fn name(&self) -> &'static str {
        "variable"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        let value = context.variable(&self.name)?;
        self.items = value
            .to_sequence(context.session(), &self.position)?
            .into_iter();
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<Item>> {
        Ok(self.items.next())
    }

    fn close_local(&mut self) {
        self.items = Vec::new().into_iter();
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<Item>> {
        Ok(context.variable(&self.name)?.rows(context.session()))
    }

    fn frame(&mut self, context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        match context.variable(&self.name)? {
            Value::Columns(frame) => Ok(frame),
            other => Err(EngineError::flow(format!(
                "Variable ${} is bound to a {} value, not a columnar one",
                self.name,
                other.mode()
            ))),
        }
    }
}

/// `$$`
#[derive(Clone)]
pub struct ContextItem;

impl Compute for ContextItem {
    fn name(&self) -> &'static str {
        "context-item"
    }

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        match context.lookup(CONTEXT_ITEM) {
            Some(Value::Local(items)) => Ok(items),
            _ => Err(EngineError::undefined_variable(CONTEXT_ITEM)),
        }
    }
}

/// `from to to`, produced lazily
#[derive(Clone)]
pub struct Range {
    pub from: Box<dyn Runtime<Item>>,
    pub to: Box<dyn Runtime<Item>>,
    /// None once exhausted
    next: Option<i64>,
    last: i64,
}

impl Range {
    pub fn new(from: Box<dyn Runtime<Item>>, to: Box<dyn Runtime<Item>>) -> Self {
        Self {
            from,
            to,
            next: None,
            last: 0,
        }
    }
}

fn range_bound(template: &dyn Runtime<Item>, context: &Arc<DynamicContext>) -> EngineResult<Option<i64>> {
    match evaluate_optional(template, context, "Range bound")? {
        None => Ok(None),
        Some(Item::Integer(i)) => Ok(Some(i)),
        Some(other) => Err(EngineError::type_mismatch(format!(
            "Range bound must be an integer, found {}",
            other.type_name()
        ))),
    }
}

impl Strategy for Range {
    type Output = Item;

    fn name(&self) -> &'static str {
        "range"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        let from = range_bound(self.from.as_ref(), context)?;
        let to = range_bound(self.to.as_ref(), context)?;
        match (from, to) {
            (Some(from), Some(to)) => {
                self.next = Some(from);
                self.last = to;
            }
            _ => self.next = None,
        }
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<Item>> {
        let Some(current) = self.next.filter(|n| *n <= self.last) else {
            self.next = None;
            return Ok(None);
        };
        self.next = current.checked_add(1);
        Ok(Some(Item::Integer(current)))
    }

    fn close_local(&mut self) {
        self.next = None;
    }
}

/// `{ k1: v1, ... }`
#[derive(Clone)]
pub struct ObjectConstructor {
    pub pairs: Vec<(Box<dyn Runtime<Item>>, Box<dyn Runtime<Item>>)>,
}

impl Compute for ObjectConstructor {
    fn name(&self) -> &'static str {
        "object"
    }

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        let mut pairs: Vec<(String, Item)> = Vec::with_capacity(self.pairs.len());
        for (key, value) in &self.pairs {
            let key = match evaluate_optional(key.as_ref(), context, "Object key")? {
                Some(Item::String(s)) => s.to_string(),
                Some(other) if other.is_atomic() && !other.is_null() => other.to_string(),
                Some(other) => {
                    return Err(EngineError::type_mismatch(format!(
                        "Object key must be an atomic, found {}",
                        other.type_name()
                    ))
                    .at(key.position()))
                }
                None => {
                    return Err(EngineError::invalid_argument("Object key is an empty sequence")
                        .at(key.position()))
                }
            };
            if pairs.iter().any(|(k, _)| *k == key) {
                return Err(EngineError::invalid_argument(format!(
                    "Duplicate key {} in object constructor",
                    key
                ))
                .at(value.position()));
            }

            let mut items = evaluate(value.as_ref(), context)?;
            let item = match items.len() {
                0 => Item::Null,
                1 => items.remove(0),
                _ => Item::array(items),
            };
            pairs.push((key, item));
        }
        Ok(vec![Item::object(pairs)])
    }
}

/// `[ members ]`
#[derive(Clone)]
pub struct ArrayConstructor {
    pub members: Option<Box<dyn Runtime<Item>>>,
}

impl Compute for ArrayConstructor {
    fn name(&self) -> &'static str {
        "array"
    }

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        let members = match &self.members {
            Some(members) => evaluate(members.as_ref(), context)?,
            None => Vec::new(),
        };
        Ok(vec![Item::array(members)])
    }
}

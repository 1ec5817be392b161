//! Lookups, unboxing and predicates
//!
//! All four are per-item steps over one input: locally they stream the
//! input, in parallel they flat-map its collection. An object lookup over a
//! columnar input projects the column instead of touching rows.

use std::collections::VecDeque;
use std::sync::Arc;

use super::hybrid::Strategy;
use super::{evaluate, evaluate_optional, Runtime};
use crate::cluster::{Collection, DataFrame};
use crate::context::{DynamicContext, Value};
use crate::errors::{EngineError, EngineResult};
use crate::expression::{ExecutionMode, CONTEXT_ITEM};
use crate::item::{effective_boolean_value, Item};

/// Per-item transform of a navigation node
pub trait Step: Clone + Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Evaluates the step's own operands once per context
    fn prepare(&mut self, _context: &Arc<DynamicContext>) -> EngineResult<()> {
        Ok(())
    }

    /// Results for one input item at 1-based `position`
    fn apply(&self, item: &Item, position: u64, context: &Arc<DynamicContext>) -> EngineResult<Vec<Item>>;

    /// Whether `apply` reads the position
    fn positional(&self) -> bool {
        false
    }

    fn frame(&self, _input: &mut dyn Runtime<Item>, _context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        Err(EngineError::flow(format!("{} has no columnar form", self.name())))
    }
}

#[derive(Clone)]
pub struct Navigate<S> {
    step: S,
    input: Box<dyn Runtime<Item>>,
    context: Option<Arc<DynamicContext>>,
    buffer: VecDeque<Item>,
    position: u64,
}

impl<S: Step> Navigate<S> {
    pub fn new(step: S, input: Box<dyn Runtime<Item>>) -> Self {
        Self {
            step,
            input,
            context: None,
            buffer: VecDeque::new(),
            position: 0,
        }
    }
}

impl<S: Step> Strategy for Navigate<S> {
    type Output = Item;

    fn name(&self) -> &'static str {
        self.step.name()
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.step.prepare(context)?;
        self.input.open(context)?;
        self.context = Some(Arc::clone(context));
        self.buffer.clear();
        self.position = 0;
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<Item>> {
        let Some(context) = self.context.clone() else {
            return Ok(None);
        };
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if !self.input.has_next() {
                return Ok(None);
            }
            let item = self.input.next()?;
            self.position += 1;
            self.buffer
                .extend(self.step.apply(&item, self.position, &context)?);
        }
    }

    fn close_local(&mut self) {
        self.input.close();
        self.context = None;
        self.buffer.clear();
        self.position = 0;
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        mode: ExecutionMode,
    ) -> EngineResult<Collection<Item>> {
        if mode.is_columnar() {
            return Ok(self.frame(context)?.to_rows());
        }
        self.step.prepare(context)?;
        let rows = self.input.collection(context)?;
        let step = &self.step;
        if step.positional() {
            rows.zip_with_index()
                .flat_map(|(item, index)| step.apply(item, index + 1, context))
        } else {
            rows.flat_map(|item| step.apply(item, 0, context))
        }
    }

    fn frame(&mut self, context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        self.step.prepare(context)?;
        self.step.frame(self.input.as_mut(), context)
    }
}

fn key_of(item: Item) -> EngineResult<String> {
    match item {
        Item::String(s) => Ok(s.to_string()),
        other if other.is_atomic() && !other.is_null() => Ok(other.to_string()),
        other => Err(EngineError::type_mismatch(format!(
            "Object lookup key must be an atomic, found {}",
            other.type_name()
        ))),
    }
}

/// `$o.key`
#[derive(Clone)]
pub struct ObjectLookup {
    key: Box<dyn Runtime<Item>>,
    resolved: Option<String>,
}

impl ObjectLookup {
    pub fn new(key: Box<dyn Runtime<Item>>) -> Self {
        Self {
            key,
            resolved: None,
        }
    }
}

impl Step for ObjectLookup {
    fn name(&self) -> &'static str {
        "object-lookup"
    }

    fn prepare(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.resolved = evaluate_optional(self.key.as_ref(), context, "Object lookup key")?
            .map(key_of)
            .transpose()?;
        Ok(())
    }

    fn apply(&self, item: &Item, _position: u64, _context: &Arc<DynamicContext>) -> EngineResult<Vec<Item>> {
        Ok(self
            .resolved
            .as_deref()
            .and_then(|key| item.item_by_key(key))
            .cloned()
            .into_iter()
            .collect())
    }

    fn frame(&self, input: &mut dyn Runtime<Item>, context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        let key = self.resolved.as_deref().ok_or_else(|| {
            EngineError::invalid_argument("Object lookup key is an empty sequence")
        })?;
        Ok(input.frame(context)?.select(key))
    }
}

/// `$a[[i]]`
#[derive(Clone)]
pub struct ArrayLookup {
    index: Box<dyn Runtime<Item>>,
    resolved: Option<i64>,
}

impl ArrayLookup {
    pub fn new(index: Box<dyn Runtime<Item>>) -> Self {
        Self {
            index,
            resolved: None,
        }
    }
}

impl Step for ArrayLookup {
    fn name(&self) -> &'static str {
        "array-lookup"
    }

    fn prepare(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        self.resolved = match evaluate_optional(self.index.as_ref(), context, "Array index")? {
            None => None,
            Some(Item::Integer(i)) => Some(i),
            Some(other) => {
                return Err(EngineError::type_mismatch(format!(
                    "Array index must be an integer, found {}",
                    other.type_name()
                )))
            }
        };
        Ok(())
    }

    fn apply(&self, item: &Item, _position: u64, _context: &Arc<DynamicContext>) -> EngineResult<Vec<Item>> {
        let member = match self.resolved {
            Some(index) if index >= 1 => item.members().get((index - 1) as usize),
            _ => None,
        };
        Ok(member.cloned().into_iter().collect())
    }
}

/// `$a[]`
#[derive(Clone)]
pub struct ArrayUnbox;

impl Step for ArrayUnbox {
    fn name(&self) -> &'static str {
        "array-unbox"
    }

    fn apply(&self, item: &Item, _position: u64, _context: &Arc<DynamicContext>) -> EngineResult<Vec<Item>> {
        Ok(item.members().to_vec())
    }
}

/// `$seq[predicate]`; a numeric predicate selects by position
#[derive(Clone)]
pub struct Predicate {
    predicate: Box<dyn Runtime<Item>>,
}

impl Predicate {
    pub fn new(predicate: Box<dyn Runtime<Item>>) -> Self {
        Self { predicate }
    }
}

impl Step for Predicate {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn apply(&self, item: &Item, position: u64, context: &Arc<DynamicContext>) -> EngineResult<Vec<Item>> {
        let scope = context.with_binding(CONTEXT_ITEM, Value::single(item.clone()));
        let result = evaluate(self.predicate.as_ref(), &scope)?;
        let keep = match result.as_slice() {
            [single] if single.is_numeric() => *single == Item::Integer(position as i64),
            _ => effective_boolean_value(&result)
                .map_err(|e| e.at(self.predicate.position()))?,
        };
        Ok(if keep { vec![item.clone()] } else { Vec::new() })
    }

    fn positional(&self) -> bool {
        true
    }
}

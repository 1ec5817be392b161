//! Function invocation
//!
//! Order of checks on every call:
//! 1. arity, before anything is evaluated against the signature
//! 2. promotion of each supplied argument (skipped for `item*` parameters)
//! 3. placeholders: any `None` argument turns the call into a partial
//!    application that returns a new function item instead of running
//!
//! A full invocation builds a detached context from the closure plus the
//! argument bindings and opens a fresh copy of the shared body. The body is
//! closed as soon as it is exhausted, so a recursion unwinds its closes
//! without any further call.

use std::sync::Arc;

use super::item::{FunctionItem, Signature};
use crate::cluster::{Collection, DataFrame};
use crate::context::{Bindings, DynamicContext, Value};
use crate::errors::{EngineError, EngineResult, SourcePosition, WithPosition};
use crate::expression::ExecutionMode;
use crate::item::Item;
use crate::runtime::{evaluate, evaluate_value, Compute, Runtime, Strategy};
use crate::session::Session;
use crate::types::{CatalogueError, SequenceType};

/// Checks arity and promotes every supplied argument
pub fn prepare_arguments(
    function: &FunctionItem,
    arguments: Vec<Option<Value>>,
    session: &Session,
) -> EngineResult<Vec<Option<Value>>> {
    if arguments.len() != function.arity() {
        return Err(EngineError::arity(
            function.name().unwrap_or(""),
            function.arity(),
            arguments.len(),
        ));
    }

    arguments
        .into_iter()
        .zip(&function.signature().parameter_types)
        .map(|(argument, declared)| match argument {
            Some(value) if !declared.is_unconstrained() => {
                promote_value(value, declared, session).map(Some)
            }
            other => Ok(other),
        })
        .collect()
}

/// Promotes a bound value to a sequence type, keeping its representation
pub fn promote_value(value: Value, target: &SequenceType, session: &Session) -> EngineResult<Value> {
    let catalogue = session.catalogue();
    match value {
        Value::Local(items) => Ok(Value::Local(catalogue.promote_sequence(&items, target)?)),
        Value::Rows(rows) => {
            check_count(target, rows.count())?;
            let item_type = target.item_type();
            Ok(Value::Rows(
                rows.map(|item| Ok(catalogue.promote(item, item_type)?))?,
            ))
        }
        Value::Columns(frame) => {
            check_count(target, frame.count())?;
            let item_type = target.item_type();
            // Columnar values are validated, not rewritten
            frame
                .to_rows()
                .map(|item| Ok(catalogue.promote(item, item_type)?))?;
            Ok(Value::Columns(frame))
        }
    }
}

fn check_count(target: &SequenceType, count: usize) -> EngineResult<()> {
    if target.admits_count(count) {
        Ok(())
    } else {
        Err(CatalogueError::Cardinality {
            expected: target.to_string(),
            found: count,
        }
        .into())
    }
}

/// Context a full invocation evaluates its body in
pub fn invocation_context(
    function: &FunctionItem,
    arguments: Vec<Value>,
    session: &Arc<Session>,
    context: &DynamicContext,
) -> Arc<DynamicContext> {
    let mut bindings: Bindings = function.closure().clone();
    for (name, value) in function.parameters().iter().zip(arguments) {
        bindings.bind(name.clone(), value);
    }
    DynamicContext::detached(Arc::clone(session), Arc::clone(context.registry()), bindings)
}

/// Result of a call that passed its checks
pub enum Invocation {
    /// Placeholders were present; the call produced a new function
    Partial(FunctionItem),
    /// Every argument was supplied
    Full(Arc<DynamicContext>),
}

/// Runs the checks and either partially applies or prepares the body context
pub fn invoke(
    function: &FunctionItem,
    arguments: Vec<Option<Value>>,
    context: &DynamicContext,
) -> EngineResult<Invocation> {
    let session = context.session();
    let arguments = prepare_arguments(function, arguments, session)?;
    if arguments.iter().any(Option::is_none) {
        return Ok(Invocation::Partial(function.partially_apply(arguments)));
    }
    let arguments = arguments.into_iter().flatten().collect();
    Ok(Invocation::Full(invocation_context(function, arguments, session, context)))
}

/// Results of one full invocation, checked against the return type
#[derive(Clone)]
pub struct BodyStream {
    body: Box<dyn Runtime<Item>>,
    return_type: SequenceType,
    session: Arc<Session>,
    produced: usize,
}

impl BodyStream {
    pub fn open(function: &FunctionItem, context: &Arc<DynamicContext>) -> EngineResult<Self> {
        let mut body = function.body().clone_box();
        let session = Arc::clone(context.session());
        body.open(context)?;
        session.metrics().increment_function_bodies_opened();
        Ok(Self {
            body,
            return_type: function.signature().return_type.clone(),
            session,
            produced: 0,
        })
    }

    pub fn next(&mut self) -> EngineResult<Option<Item>> {
        if !self.body.is_open() {
            return Ok(None);
        }
        if !self.body.has_next() {
            self.close();
            if !self.return_type.admits_count(self.produced) {
                return Err(CatalogueError::Cardinality {
                    expected: self.return_type.to_string(),
                    found: self.produced,
                }
                .into());
            }
            return Ok(None);
        }

        let item = self.body.next()?;
        self.produced += 1;
        if self.return_type.is_unconstrained() {
            return Ok(Some(item));
        }
        if let Some(max) = self.return_type.occurrence().max() {
            if self.produced > max || self.return_type.is_empty_sequence() {
                return Err(CatalogueError::Cardinality {
                    expected: self.return_type.to_string(),
                    found: self.produced,
                }
                .into());
            }
        }
        Ok(Some(
            self.session
                .catalogue()
                .promote(&item, self.return_type.item_type())?,
        ))
    }

    /// Closes the body once; later calls do nothing
    pub fn close(&mut self) {
        if self.body.is_open() {
            self.body.close();
            self.session.metrics().increment_function_bodies_closed();
        }
    }
}

fn evaluate_arguments(
    arguments: &[Option<Box<dyn Runtime<Item>>>],
    context: &Arc<DynamicContext>,
) -> EngineResult<Vec<Option<Value>>> {
    arguments
        .iter()
        .map(|argument| match argument {
            Some(template) => evaluate_value(template.as_ref(), context).map(Some),
            None => Ok(None),
        })
        .collect()
}

/// Streaming state shared by static and dynamic calls
#[derive(Clone, Default)]
enum CallState {
    #[default]
    Idle,
    Partial(Option<Item>),
    Running(BodyStream),
}

impl CallState {
    fn start(invocation: Invocation, function: &FunctionItem) -> EngineResult<Self> {
        match invocation {
            Invocation::Partial(partial) => Ok(CallState::Partial(Some(Item::function(partial)))),
            Invocation::Full(body_context) => {
                Ok(CallState::Running(BodyStream::open(function, &body_context)?))
            }
        }
    }

    fn next(&mut self) -> EngineResult<Option<Item>> {
        match self {
            CallState::Idle => Ok(None),
            CallState::Partial(item) => Ok(item.take()),
            CallState::Running(stream) => stream.next(),
        }
    }

    fn close(&mut self) {
        if let CallState::Running(stream) = self {
            stream.close();
        }
        *self = CallState::Idle;
    }
}

/// Call of a module-level function by name
#[derive(Clone)]
pub struct StaticCall {
    name: String,
    arguments: Vec<Option<Box<dyn Runtime<Item>>>>,
    state: CallState,
}

impl StaticCall {
    pub fn new(name: impl Into<String>, arguments: Vec<Option<Box<dyn Runtime<Item>>>>) -> Self {
        Self {
            name: name.into(),
            arguments,
            state: CallState::Idle,
        }
    }

    fn resolve(&self, context: &DynamicContext) -> EngineResult<Arc<FunctionItem>> {
        let arity = self.arguments.len();
        if let Some(builtin) = super::Builtin::lookup(&self.name, arity) {
            return Ok(Arc::new(builtin.as_function_item(arity)));
        }
        context.registry().get(&self.name, arity)
    }

    fn body_context(&self, context: &Arc<DynamicContext>) -> EngineResult<(Arc<FunctionItem>, Arc<DynamicContext>)> {
        let function = self.resolve(context)?;
        let arguments = evaluate_arguments(&self.arguments, context)?;
        match invoke(&function, arguments, context)? {
            Invocation::Full(body_context) => Ok((function, body_context)),
            Invocation::Partial(_) => Err(EngineError::flow(format!(
                "Partial application of {} has no distributed form",
                function.identifier()
            ))),
        }
    }
}

impl Strategy for StaticCall {
    type Output = Item;

    fn name(&self) -> &'static str {
        "function-call"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        let function = self.resolve(context)?;
        let arguments = evaluate_arguments(&self.arguments, context)?;
        let invocation = invoke(&function, arguments, context)?;
        self.state = CallState::start(invocation, &function)?;
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<Item>> {
        self.state.next()
    }

    fn close_local(&mut self) {
        self.state.close();
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        mode: ExecutionMode,
    ) -> EngineResult<Collection<Item>> {
        let (function, body_context) = self.body_context(context)?;
        let mut body = function.body().clone_box();
        let rows = if mode.is_columnar() && body.mode().is_columnar() {
            body.frame(&body_context)?.to_rows()
        } else {
            body.collection(&body_context)?
        };

        let return_type = &function.signature().return_type;
        if return_type.is_unconstrained() {
            return Ok(rows);
        }
        check_count(return_type, rows.count())?;
        let catalogue = context.session().catalogue();
        rows.map(|item| Ok(catalogue.promote(item, return_type.item_type())?))
    }

    fn frame(&mut self, context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        let (function, body_context) = self.body_context(context)?;
        let mut body = function.body().clone_box();
        body.frame(&body_context)
    }
}

/// Call of a function item computed at runtime
#[derive(Clone)]
pub struct DynamicCall {
    function: Box<dyn Runtime<Item>>,
    arguments: Vec<Option<Box<dyn Runtime<Item>>>>,
    position: SourcePosition,
    state: CallState,
}

impl DynamicCall {
    pub fn new(
        function: Box<dyn Runtime<Item>>,
        arguments: Vec<Option<Box<dyn Runtime<Item>>>>,
        position: SourcePosition,
    ) -> Self {
        Self {
            function,
            arguments,
            position,
            state: CallState::Idle,
        }
    }
}

impl Strategy for DynamicCall {
    type Output = Item;

    fn name(&self) -> &'static str {
        "dynamic-call"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        let mut targets = evaluate(self.function.as_ref(), context)?;
        let function = match (targets.len(), targets.pop()) {
            (1, Some(Item::Function(function))) => function,
            (_, found) => {
                return Err(EngineError::type_mismatch(format!(
                    "Dynamic call requires a single function item, found {}",
                    found.map(|i| i.type_name()).unwrap_or("an empty sequence")
                ))
                .at(&self.position))
            }
        };

        let arguments = evaluate_arguments(&self.arguments, context)?;
        let invocation = invoke(&function, arguments, context).at(&self.position)?;
        self.state = CallState::start(invocation, &function)?;
        Ok(())
    }

    fn next_local(&mut self) -> EngineResult<Option<Item>> {
        self.state.next()
    }

    fn close_local(&mut self) {
        self.state.close();
    }
}

/// `function ($a, $b) { body }`
#[derive(Clone)]
pub struct InlineFunction {
    pub parameters: Vec<String>,
    pub signature: Signature,
    pub body: Arc<dyn Runtime<Item>>,
}

impl Compute for InlineFunction {
    fn name(&self) -> &'static str {
        "inline-function"
    }

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Vec<Item>> {
        Ok(vec![Item::function(FunctionItem::new(
            None,
            self.parameters.clone(),
            self.signature.clone(),
            Arc::clone(&self.body),
            context.snapshot(),
        ))])
    }
}

/// `name#arity`
#[derive(Clone)]
pub struct FunctionReference {
    pub name: String,
    pub arity: usize,
}

impl Compute for FunctionReference {
    fn name(&self) -> &'static str {
        "function-ref"
    }

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Vec<Item>> {
        if let Some(builtin) = super::Builtin::lookup(&self.name, self.arity) {
            return Ok(vec![Item::function(builtin.as_function_item(self.arity))]);
        }
        let function = context.registry().get(&self.name, self.arity)?;
        Ok(vec![Item::Function(function)])
    }
}

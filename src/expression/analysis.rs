//! Execution-mode analysis
//!
//! A single bottom-up pass over the module that assigns every expression and
//! clause its execution mode. It also resolves names: unknown variables and
//! unknown functions are reported here, before any evaluation starts.
//!
//! Declared function bodies are analysed on first use. A call reached while
//! its own declaration is still being analysed (recursion) is Local.

use std::collections::{HashMap, HashSet};

use super::mode::ExecutionMode;
use super::module::{FunctionDeclaration, QueryModule};
use super::node::{ClauseKind, Expression, ExpressionKind, Parameter};
use crate::errors::{EngineError, EngineResult, WithPosition};
use crate::functions::Builtin;

/// Name of the context item binding
pub const CONTEXT_ITEM: &str = "$$";

type FunctionKey = (String, usize);

/// Static mode analyser for one module
pub struct ModeAnalyzer<'m> {
    declarations: HashMap<FunctionKey, &'m FunctionDeclaration>,
    in_progress: HashSet<FunctionKey>,
    scopes: Vec<HashMap<String, ExecutionMode>>,
}

/// Computes execution modes for every node of a module
pub fn analyse(module: &QueryModule) -> EngineResult<()> {
    let mut analyzer = ModeAnalyzer::new(module)?;
    for declaration in &module.functions {
        analyzer.analyse_declaration(declaration)?;
    }
    analyzer.analyse_expression(&module.body)?;
    Ok(())
}

impl<'m> ModeAnalyzer<'m> {
    pub fn new(module: &'m QueryModule) -> EngineResult<Self> {
        let mut declarations = HashMap::new();
        for declaration in &module.functions {
            if Builtin::lookup(&declaration.name, declaration.arity()).is_some() {
                return Err(EngineError::invalid_argument(format!(
                    "Function {}#{} shadows a built-in function",
                    declaration.name,
                    declaration.arity()
                ))
                .at(&declaration.position));
            }
            if declarations.insert(declaration.key(), declaration).is_some() {
                return Err(EngineError::invalid_argument(format!(
                    "Function {}#{} is declared more than once",
                    declaration.name,
                    declaration.arity()
                ))
                .at(&declaration.position));
            }
        }

        Ok(Self {
            declarations,
            in_progress: HashSet::new(),
            scopes: Vec::new(),
        })
    }

    fn analyse_declaration(&mut self, declaration: &FunctionDeclaration) -> EngineResult<ExecutionMode> {
        if declaration.body.has_mode() {
            return declaration.body.mode();
        }

        let key = declaration.key();
        self.in_progress.insert(key.clone());
        let outer = std::mem::take(&mut self.scopes);
        self.scopes.push(parameter_scope(&declaration.parameters));

        let result = self.analyse_expression(&declaration.body);

        self.scopes = outer;
        self.in_progress.remove(&key);
        result
    }

    fn lookup_variable(&self, name: &str) -> Option<ExecutionMode> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn bind(&mut self, name: &str, mode: ExecutionMode) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), mode);
        }
    }

    pub fn analyse_expression(&mut self, expression: &Expression) -> EngineResult<ExecutionMode> {
        if expression.has_mode() {
            return expression.mode();
        }
        let mode = self
            .compute_mode(expression)
            .at(&expression.position)?;
        Ok(expression.set_mode(mode))
    }

    fn compute_mode(&mut self, expression: &Expression) -> EngineResult<ExecutionMode> {
        use ExpressionKind::*;

        let mode = match &expression.kind {
            Literal { .. } | ContextItem => ExecutionMode::Local,

            Variable { name } => self
                .lookup_variable(name)
                .ok_or_else(|| EngineError::undefined_variable(name))?,

            Sequence { members } => {
                let mut all_parallel = !members.is_empty();
                for member in members {
                    all_parallel &= self.analyse_expression(member)?.is_parallel();
                }
                if all_parallel {
                    ExecutionMode::ParallelRowWise
                } else {
                    ExecutionMode::Local
                }
            }

            Arithmetic { left, right, .. }
            | Comparison { left, right, .. }
            | Logical { left, right, .. }
            | Range {
                from: left,
                to: right,
            } => {
                self.analyse_expression(left)?;
                self.analyse_expression(right)?;
                ExecutionMode::Local
            }

            Not { operand } => {
                self.analyse_expression(operand)?;
                ExecutionMode::Local
            }

            If {
                condition,
                then,
                otherwise,
            } => {
                self.analyse_expression(condition)?;
                self.analyse_expression(then)?;
                self.analyse_expression(otherwise)?;
                ExecutionMode::Local
            }

            Object { pairs } => {
                for pair in pairs {
                    self.analyse_expression(&pair.key)?;
                    self.analyse_expression(&pair.value)?;
                }
                ExecutionMode::Local
            }

            Array { members } => {
                if let Some(members) = members {
                    self.analyse_expression(members)?;
                }
                ExecutionMode::Local
            }

            ObjectLookup { object, key } => {
                let input = self.analyse_expression(object)?;
                self.analyse_expression(key)?;
                if input.is_columnar() {
                    ExecutionMode::ParallelColumnar
                } else {
                    input.row_wise()
                }
            }

            ArrayLookup { array, index } => {
                let input = self.analyse_expression(array)?;
                self.analyse_expression(index)?;
                input.row_wise()
            }

            ArrayUnbox { array } => self.analyse_expression(array)?.row_wise(),

            Filter {
                sequence,
                predicate,
            } => {
                let input = self.analyse_expression(sequence)?;
                self.scopes.push(HashMap::new());
                self.bind(CONTEXT_ITEM, ExecutionMode::Local);
                let predicate = self.analyse_expression(predicate);
                self.scopes.pop();
                predicate?;
                input.row_wise()
            }

            FunctionCall { name, arguments } => self.analyse_static_call(name, arguments)?,

            DynamicCall {
                function,
                arguments,
            } => {
                self.analyse_expression(function)?;
                for argument in arguments.iter().flatten() {
                    self.analyse_expression(argument)?;
                }
                ExecutionMode::Local
            }

            InlineFunction {
                parameters, body, ..
            } => {
                self.scopes.push(parameter_scope(parameters));
                let body = self.analyse_expression(body);
                self.scopes.pop();
                body?;
                ExecutionMode::Local
            }

            FunctionRef { name, arity } => {
                let known = Builtin::lookup(name, *arity).is_some()
                    || self.declarations.contains_key(&(name.clone(), *arity));
                if !known {
                    return Err(EngineError::undefined_function(name, *arity));
                }
                ExecutionMode::Local
            }

            Flwor {
                clauses,
                return_expression,
            } => {
                self.scopes.push(HashMap::new());
                let stream = self.analyse_clauses(clauses, return_expression);
                self.scopes.pop();
                stream?
            }
        };
        Ok(mode)
    }

    fn analyse_static_call(
        &mut self,
        name: &str,
        arguments: &[Option<Expression>],
    ) -> EngineResult<ExecutionMode> {
        for argument in arguments.iter().flatten() {
            self.analyse_expression(argument)?;
        }
        let has_placeholder = arguments.iter().any(Option::is_none);
        let key = (name.to_string(), arguments.len());

        if let Some(builtin) = Builtin::lookup(name, arguments.len()) {
            return Ok(if has_placeholder {
                ExecutionMode::Local
            } else {
                builtin.mode()
            });
        }

        let declaration = *self
            .declarations
            .get(&key)
            .ok_or_else(|| EngineError::undefined_function(name, arguments.len()))?;

        if has_placeholder || self.in_progress.contains(&key) {
            return Ok(ExecutionMode::Local);
        }
        self.analyse_declaration(declaration)
    }

    fn analyse_clauses(
        &mut self,
        clauses: &[super::node::Clause],
        return_expression: &Expression,
    ) -> EngineResult<ExecutionMode> {
        let mut stream = ExecutionMode::Local;
        let mut introduced: Vec<String> = Vec::new();

        for (index, clause) in clauses.iter().enumerate() {
            match &clause.kind {
                ClauseKind::For {
                    variable,
                    at,
                    source,
                    ..
                } => {
                    let source_mode = self.analyse_expression(source)?;
                    if index == 0 {
                        stream = source_mode.row_wise();
                    }
                    self.bind(variable, ExecutionMode::Local);
                    introduced.push(variable.clone());
                    if let Some(at) = at {
                        self.bind(at, ExecutionMode::Local);
                        introduced.push(at.clone());
                    }
                }
                ClauseKind::Let { variable, value } => {
                    let value_mode = self.analyse_expression(value)?;
                    // Distributed values survive only in a local stream
                    let binding = if stream.is_local() {
                        value_mode
                    } else {
                        ExecutionMode::Local
                    };
                    self.bind(variable, binding);
                    introduced.push(variable.clone());
                }
                ClauseKind::Where { condition } => {
                    self.analyse_expression(condition)?;
                }
                ClauseKind::OrderBy { keys } => {
                    for key in keys {
                        self.analyse_expression(&key.expression)?;
                    }
                }
                ClauseKind::GroupBy { keys } => {
                    for key in keys {
                        match &key.expression {
                            Some(expression) => {
                                self.analyse_expression(expression)?;
                            }
                            None => {
                                self.lookup_variable(&key.variable).ok_or_else(|| {
                                    EngineError::undefined_variable(&key.variable)
                                        .at(&clause.position)
                                })?;
                            }
                        }
                    }
                    for key in keys {
                        self.bind(&key.variable, ExecutionMode::Local);
                        introduced.push(key.variable.clone());
                    }
                    // Grouped values are materialized sequences
                    for variable in &introduced {
                        self.bind(variable, ExecutionMode::Local);
                    }
                }
                ClauseKind::Count { variable } => {
                    self.bind(variable, ExecutionMode::Local);
                    introduced.push(variable.clone());
                }
            }
            clause.set_mode(stream);
        }

        self.analyse_expression(return_expression)?;
        Ok(stream)
    }
}

fn parameter_scope(parameters: &[Parameter]) -> HashMap<String, ExecutionMode> {
    parameters
        .iter()
        .map(|p| (p.name.clone(), ExecutionMode::Local))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::expression::NodeRef;
    use serde_json::json;

    fn module(value: serde_json::Value) -> QueryModule {
        QueryModule::from_value(value).unwrap()
    }

    fn body_mode(value: serde_json::Value) -> ExecutionMode {
        let m = module(json!({ "body": value }));
        analyse(&m).unwrap();
        m.body.mode().unwrap()
    }

    fn lit(value: serde_json::Value) -> serde_json::Value {
        json!({"kind": "literal", "value": value})
    }

    fn source(name: &str) -> serde_json::Value {
        json!({"kind": "function-call", "name": name, "arguments": [lit(json!("data.json"))]})
    }

    #[test]
    fn test_leaves_are_local() {
        assert_eq!(body_mode(lit(json!(1))), ExecutionMode::Local);
    }

    #[test]
    fn test_sources_force_parallel() {
        assert_eq!(body_mode(source("json-file")), ExecutionMode::ParallelRowWise);
        assert_eq!(
            body_mode(source("structured-json-file")),
            ExecutionMode::ParallelColumnar
        );
    }

    #[test]
    fn test_lookup_inherits_input_mode() {
        let lookup = |input| json!({"kind": "object-lookup", "object": input, "key": lit(json!("a"))});
        assert_eq!(body_mode(lookup(source("structured-json-file"))), ExecutionMode::ParallelColumnar);
        assert_eq!(body_mode(lookup(source("json-file"))), ExecutionMode::ParallelRowWise);
        assert_eq!(body_mode(lookup(lit(json!({"a": 1})))), ExecutionMode::Local);
    }

    #[test]
    fn test_filter_on_columnar_becomes_row_wise() {
        let filter = json!({
            "kind": "filter",
            "sequence": source("structured-json-file"),
            "predicate": {"kind": "context-item"}
        });
        assert_eq!(body_mode(filter), ExecutionMode::ParallelRowWise);
    }

    #[test]
    fn test_sequence_parallel_only_if_all_members_are() {
        let all = json!({"kind": "sequence", "members": [source("json-file"), source("text-file")]});
        assert_eq!(body_mode(all), ExecutionMode::ParallelRowWise);

        let mixed = json!({"kind": "sequence", "members": [source("json-file"), lit(json!(1))]});
        assert_eq!(body_mode(mixed), ExecutionMode::Local);

        assert_eq!(body_mode(json!({"kind": "sequence", "members": []})), ExecutionMode::Local);
    }

    #[test]
    fn test_host_only_node_forces_local() {
        let count = json!({"kind": "function-call", "name": "count", "arguments": [source("json-file")]});
        assert_eq!(body_mode(count), ExecutionMode::Local);
    }

    #[test]
    fn test_flwor_mode_follows_first_for() {
        let flwor = json!({
            "kind": "flwor",
            "clauses": [
                {"clause": "for", "variable": "x", "in": source("json-file")},
                {"clause": "let", "variable": "y", "value": {"kind": "variable", "name": "x"}},
                {"clause": "group-by", "keys": [{"variable": "k", "expression": {"kind": "variable", "name": "y"}}]}
            ],
            "return": {"kind": "variable", "name": "k"}
        });
        let m = module(json!({ "body": flwor }));
        analyse(&m).unwrap();
        assert_eq!(m.body.mode().unwrap(), ExecutionMode::ParallelRowWise);
        for clause in NodeRef::Expression(&m.body).descendants_matching(|n| n.name() == "group-by") {
            assert_eq!(clause.mode_tolerating_unset(), ExecutionMode::ParallelRowWise);
        }
    }

    #[test]
    fn test_let_in_local_stream_keeps_distributed_binding() {
        let flwor = json!({
            "kind": "flwor",
            "clauses": [{"clause": "let", "variable": "d", "value": source("json-file")}],
            "return": {"kind": "variable", "name": "d"}
        });
        let m = module(json!({ "body": flwor }));
        analyse(&m).unwrap();
        assert_eq!(m.body.mode().unwrap(), ExecutionMode::Local);
        let variable = NodeRef::Expression(&m.body).descendants_matching(|n| n.name() == "variable");
        assert_eq!(variable[0].mode_tolerating_unset(), ExecutionMode::ParallelRowWise);
    }

    #[test]
    fn test_static_call_takes_body_mode() {
        let m = module(json!({
            "functions": [{
                "name": "load",
                "parameters": [{"name": "p", "type": "string"}],
                "body": {"kind": "function-call", "name": "json-file", "arguments": [{"kind": "variable", "name": "p"}]}
            }],
            "body": {"kind": "function-call", "name": "load", "arguments": [lit(json!("x.json"))]}
        }));
        analyse(&m).unwrap();
        assert_eq!(m.body.mode().unwrap(), ExecutionMode::ParallelRowWise);
    }

    #[test]
    fn test_placeholder_call_is_local() {
        let m = module(json!({
            "functions": [{
                "name": "load",
                "parameters": [{"name": "p"}],
                "body": {"kind": "function-call", "name": "json-file", "arguments": [{"kind": "variable", "name": "p"}]}
            }],
            "body": {"kind": "function-call", "name": "load", "arguments": [null]}
        }));
        analyse(&m).unwrap();
        assert_eq!(m.body.mode().unwrap(), ExecutionMode::Local);
    }

    #[test]
    fn test_recursive_function_terminates() {
        let m = module(json!({
            "functions": [{
                "name": "loop",
                "parameters": [{"name": "n"}],
                "body": {"kind": "function-call", "name": "loop", "arguments": [{"kind": "variable", "name": "n"}]}
            }],
            "body": {"kind": "function-call", "name": "loop", "arguments": [lit(json!(1))]}
        }));
        analyse(&m).unwrap();
        assert_eq!(m.body.mode().unwrap(), ExecutionMode::Local);
    }

    #[test]
    fn test_undefined_variable() {
        let m = module(json!({"body": {"kind": "variable", "name": "nope", "position": {"line": 3, "column": 9}}}));
        let err = analyse(&m).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UndefinedVariable);
        assert_eq!(err.position().map(|p| p.line), Some(3));
    }

    #[test]
    fn test_undefined_function() {
        let m = module(json!({"body": {"kind": "function-call", "name": "nope", "arguments": []}}));
        assert_eq!(analyse(&m).unwrap_err().code(), ErrorCode::UndefinedFunction);

        let m = module(json!({"body": {"kind": "function-ref", "name": "count", "arity": 7}}));
        assert_eq!(analyse(&m).unwrap_err().code(), ErrorCode::UndefinedFunction);
    }

    #[test]
    fn test_duplicate_declaration() {
        let decl = json!({"name": "f", "body": lit(json!(1))});
        let m = module(json!({"functions": [decl.clone(), decl], "body": lit(json!(1))}));
        assert!(analyse(&m).is_err());
    }

    #[test]
    fn test_monotonic_under_constant_substitution() {
        // Replacing a local-only argument with a constant keeps the mode
        let original = json!({
            "kind": "object-lookup",
            "object": source("json-file"),
            "key": {"kind": "arithmetic", "op": "add", "left": lit(json!("a")), "right": lit(json!(1))}
        });
        let substituted = json!({
            "kind": "object-lookup",
            "object": source("json-file"),
            "key": lit(json!("a"))
        });
        assert!(body_mode(substituted) >= body_mode(original));
    }
}

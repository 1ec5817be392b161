//! Tree to iterator compilation
//!
//! Runs after [`analyse`](crate::expression::analyse): every node must
//! already carry its mode, which is baked into the [`Hybrid`] wrapping it.

use std::sync::Arc;

use super::hybrid::{Computed, Hybrid};
use super::navigation::{ArrayLookup, ArrayUnbox, Navigate, ObjectLookup, Predicate};
use super::operators::{Arithmetic, Comparison, Conditional, Logical, Not};
use super::primary::{self, ArrayConstructor, Concat, ContextItem, ObjectConstructor, Range, VariableReference};
use super::Runtime;
use crate::context::Bindings;
use crate::errors::{EngineError, EngineResult, SourcePosition};
use crate::expression::{Clause, ClauseKind, Expression, ExpressionKind, Parameter, QueryModule};
use crate::flwor::{
    CountClause, FlworTuple, ForClause, GroupByClause, GroupSpec, LetClause, OrderByClause, OrderSpec,
    ReturnClause, Upstream, WhereClause,
};
use crate::functions::{
    Builtin, BuiltinCall, DynamicCall, FunctionItem, FunctionReference, FunctionRegistry, InlineFunction,
    Signature, StaticCall,
};
use crate::item::Item;
use crate::types::{SequenceType, TypeCatalogue};

type Template = Box<dyn Runtime<Item>>;

/// Builds runtime iterator templates from an analysed tree
pub struct Compiler<'a> {
    catalogue: &'a TypeCatalogue,
}

impl<'a> Compiler<'a> {
    pub fn new(catalogue: &'a TypeCatalogue) -> Self {
        Self { catalogue }
    }

    /// Compiles the declarations into a registry and the body into a template
    pub fn compile_module(&self, module: &QueryModule) -> EngineResult<(Arc<FunctionRegistry>, Template)> {
        let registry = FunctionRegistry::new();
        for declaration in &module.functions {
            let signature = self.signature(
                &declaration.parameters,
                &declaration.return_type,
                &declaration.position,
            )?;
            let body = self.compile(&declaration.body)?;
            registry
                .register(FunctionItem::new(
                    Some(declaration.name.clone()),
                    parameter_names(&declaration.parameters),
                    signature,
                    Arc::from(body),
                    Bindings::new(),
                ))
                .map_err(|e| e.at(&declaration.position))?;
        }

        let body = self.compile(&module.body)?;
        Ok((Arc::new(registry), body))
    }

    fn check(&self, sequence_type: &SequenceType, position: &SourcePosition) -> EngineResult<()> {
        self.catalogue
            .check(sequence_type)
            .map_err(|e| EngineError::from(e).at(position))
    }

    fn signature(
        &self,
        parameters: &[Parameter],
        return_type: &SequenceType,
        position: &SourcePosition,
    ) -> EngineResult<Signature> {
        for parameter in parameters {
            self.check(&parameter.sequence_type, position)?;
        }
        self.check(return_type, position)?;
        Ok(Signature {
            parameter_types: parameters.iter().map(|p| p.sequence_type.clone()).collect(),
            return_type: return_type.clone(),
        })
    }

    fn compile_all(&self, expressions: &[Expression]) -> EngineResult<Vec<Template>> {
        expressions.iter().map(|e| self.compile(e)).collect()
    }

    fn compile_arguments(&self, arguments: &[Option<Expression>]) -> EngineResult<Vec<Option<Template>>> {
        arguments
            .iter()
            .map(|argument| argument.as_ref().map(|a| self.compile(a)).transpose())
            .collect()
    }

    /// Compiles one expression into a closed template
    pub fn compile(&self, expression: &Expression) -> EngineResult<Template> {
        use ExpressionKind as K;

        let mode = expression.mode()?;
        let position = expression.position.clone();

        let template: Template = match &expression.kind {
            K::Literal { value } => Hybrid::boxed(
                Computed::new(primary::Literal {
                    item: Item::from_json(value),
                }),
                mode,
                position,
            ),
            K::Sequence { members } => {
                Hybrid::boxed(Concat::new(self.compile_all(members)?), mode, position)
            }
            K::Variable { name } => Hybrid::boxed(
                VariableReference::new(name.clone(), position.clone()),
                mode,
                position,
            ),
            K::ContextItem => Hybrid::boxed(Computed::new(ContextItem), mode, position),
            K::Arithmetic { op, left, right } => Hybrid::boxed(
                Computed::new(Arithmetic {
                    op: *op,
                    left: self.compile(left)?,
                    right: self.compile(right)?,
                }),
                mode,
                position,
            ),
            K::Comparison { op, left, right } => Hybrid::boxed(
                Computed::new(Comparison {
                    op: *op,
                    left: self.compile(left)?,
                    right: self.compile(right)?,
                }),
                mode,
                position,
            ),
            K::Logical { op, left, right } => Hybrid::boxed(
                Computed::new(Logical {
                    op: *op,
                    left: self.compile(left)?,
                    right: self.compile(right)?,
                }),
                mode,
                position,
            ),
            K::Not { operand } => Hybrid::boxed(
                Computed::new(Not {
                    operand: self.compile(operand)?,
                }),
                mode,
                position,
            ),
            K::If {
                condition,
                then,
                otherwise,
            } => Hybrid::boxed(
                Conditional::new(
                    self.compile(condition)?,
                    self.compile(then)?,
                    self.compile(otherwise)?,
                ),
                mode,
                position,
            ),
            K::Range { from, to } => Hybrid::boxed(
                Range::new(self.compile(from)?, self.compile(to)?),
                mode,
                position,
            ),
            K::Object { pairs } => {
                let pairs = pairs
                    .iter()
                    .map(|pair| Ok((self.compile(&pair.key)?, self.compile(&pair.value)?)))
                    .collect::<EngineResult<Vec<_>>>()?;
                Hybrid::boxed(Computed::new(ObjectConstructor { pairs }), mode, position)
            }
            K::Array { members } => {
                let members = members.as_ref().map(|m| self.compile(m)).transpose()?;
                Hybrid::boxed(Computed::new(ArrayConstructor { members }), mode, position)
            }
            K::ObjectLookup { object, key } => Hybrid::boxed(
                Navigate::new(ObjectLookup::new(self.compile(key)?), self.compile(object)?),
                mode,
                position,
            ),
            K::ArrayLookup { array, index } => Hybrid::boxed(
                Navigate::new(ArrayLookup::new(self.compile(index)?), self.compile(array)?),
                mode,
                position,
            ),
            K::ArrayUnbox { array } => {
                Hybrid::boxed(Navigate::new(ArrayUnbox, self.compile(array)?), mode, position)
            }
            K::Filter {
                sequence,
                predicate,
            } => Hybrid::boxed(
                Navigate::new(Predicate::new(self.compile(predicate)?), self.compile(sequence)?),
                mode,
                position,
            ),
            K::FunctionCall { name, arguments } => {
                let arguments = self.compile_arguments(arguments)?;
                let builtin = Builtin::lookup(name, arguments.len());
                match builtin {
                    Some(builtin) if arguments.iter().all(Option::is_some) => Hybrid::boxed(
                        Computed::new(BuiltinCall::new(builtin, arguments.into_iter().flatten().collect())),
                        mode,
                        position,
                    ),
                    _ => Hybrid::boxed(StaticCall::new(name.clone(), arguments), mode, position),
                }
            }
            K::DynamicCall {
                function,
                arguments,
            } => Hybrid::boxed(
                DynamicCall::new(
                    self.compile(function)?,
                    self.compile_arguments(arguments)?,
                    position.clone(),
                ),
                mode,
                position,
            ),
            K::InlineFunction {
                parameters,
                return_type,
                body,
            } => {
                let signature = self.signature(parameters, return_type, &position)?;
                Hybrid::boxed(
                    Computed::new(InlineFunction {
                        parameters: parameter_names(parameters),
                        signature,
                        body: Arc::from(self.compile(body)?),
                    }),
                    mode,
                    position,
                )
            }
            K::FunctionRef { name, arity } => Hybrid::boxed(
                Computed::new(FunctionReference {
                    name: name.clone(),
                    arity: *arity,
                }),
                mode,
                position,
            ),
            K::Flwor {
                clauses,
                return_expression,
            } => {
                let mut upstream = Upstream::start();
                for clause in clauses {
                    upstream = Upstream::Clause(self.compile_clause(clause, upstream)?);
                }
                Hybrid::boxed(
                    ReturnClause::new(self.compile(return_expression)?, upstream),
                    mode,
                    position,
                )
            }
        };
        Ok(template)
    }

    fn compile_clause(&self, clause: &Clause, upstream: Upstream) -> EngineResult<Box<dyn Runtime<FlworTuple>>> {
        let mode = clause.mode()?;
        let position = clause.position.clone();

        let template: Box<dyn Runtime<FlworTuple>> = match &clause.kind {
            ClauseKind::For {
                variable,
                at,
                allowing_empty,
                source,
            } => Hybrid::boxed(
                ForClause::new(
                    variable.clone(),
                    at.clone(),
                    *allowing_empty,
                    self.compile(source)?,
                    upstream,
                ),
                mode,
                position,
            ),
            ClauseKind::Let { variable, value } => Hybrid::boxed(
                LetClause::new(variable.clone(), self.compile(value)?, upstream),
                mode,
                position,
            ),
            ClauseKind::Where { condition } => Hybrid::boxed(
                WhereClause::new(self.compile(condition)?, upstream),
                mode,
                position,
            ),
            ClauseKind::OrderBy { keys } => {
                let keys = keys
                    .iter()
                    .map(|key| {
                        Ok(OrderSpec {
                            expression: self.compile(&key.expression)?,
                            descending: key.descending,
                            empty: key.empty,
                        })
                    })
                    .collect::<EngineResult<Vec<_>>>()?;
                Hybrid::boxed(OrderByClause::new(keys, upstream), mode, position)
            }
            ClauseKind::GroupBy { keys } => {
                let keys = keys
                    .iter()
                    .map(|key| {
                        Ok(GroupSpec {
                            variable: key.variable.clone(),
                            expression: key.expression.as_ref().map(|e| self.compile(e)).transpose()?,
                        })
                    })
                    .collect::<EngineResult<Vec<_>>>()?;
                Hybrid::boxed(
                    GroupByClause::new(keys, upstream, position.clone()),
                    mode,
                    position,
                )
            }
            ClauseKind::Count { variable } => Hybrid::boxed(
                CountClause::new(variable.clone(), upstream),
                mode,
                position,
            ),
        };
        Ok(template)
    }
}

fn parameter_names(parameters: &[Parameter]) -> Vec<String> {
    parameters.iter().map(|p| p.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{analyse, ExecutionMode};
    use serde_json::json;

    fn compiled(value: serde_json::Value) -> (Arc<FunctionRegistry>, Template) {
        let module = QueryModule::from_value(value).unwrap();
        analyse(&module).unwrap();
        let catalogue = TypeCatalogue::new();
        Compiler::new(&catalogue).compile_module(&module).unwrap()
    }

    #[test]
    fn test_compiled_template_carries_mode_and_name() {
        let (_, body) = compiled(json!({
            "body": {"kind": "function-call", "name": "json-file",
                     "arguments": [{"kind": "literal", "value": "data.json"}]}
        }));
        assert_eq!(body.mode(), ExecutionMode::ParallelRowWise);
        assert_eq!(body.name(), "json-file");
        assert!(!body.is_open());
    }

    #[test]
    fn test_declarations_are_registered() {
        let (registry, _) = compiled(json!({
            "functions": [{"name": "id", "parameters": [{"name": "x"}],
                           "body": {"kind": "variable", "name": "x"}}],
            "body": {"kind": "literal", "value": 1}
        }));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("id", 1).unwrap().identifier(), "id#1");
    }

    #[test]
    fn test_unknown_parameter_type_is_rejected() {
        let module = QueryModule::from_value(json!({
            "body": {"kind": "inline-function",
                     "parameters": [{"name": "p", "type": "person"}],
                     "body": {"kind": "variable", "name": "p"},
                     "position": {"line": 3, "column": 7}}
        }))
        .unwrap();
        analyse(&module).unwrap();
        let catalogue = TypeCatalogue::new();
        let err = Compiler::new(&catalogue).compile(&module.body).err().unwrap();
        assert_eq!(err.position().map(|p| p.line), Some(3));
    }

    #[test]
    fn test_unanalysed_tree_is_a_flow_error() {
        let module = QueryModule::from_value(json!({
            "body": {"kind": "literal", "value": 1}
        }))
        .unwrap();
        let catalogue = TypeCatalogue::new();
        let err = Compiler::new(&catalogue).compile(&module.body).err().unwrap();
        assert!(err.is_fatal());
    }
}

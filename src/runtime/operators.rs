//! Arithmetic, comparison, logic and conditionals

use std::cmp::Ordering;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use num_traits::{ToPrimitive, Zero};

use super::hybrid::{Compute, Strategy};
use super::{evaluate, evaluate_optional, Runtime};
use crate::context::DynamicContext;
use crate::errors::{EngineError, EngineResult};
use crate::expression::{ArithmeticOp, ComparisonOp, LogicalOp};
use crate::item::{compare_atomics, effective_boolean_value, Item, Sequence};

fn operand(
    template: &dyn Runtime<Item>,
    context: &Arc<DynamicContext>,
) -> EngineResult<Option<Item>> {
    match evaluate_optional(template, context, "Operand")? {
        Some(item) if !item.is_atomic() => Err(EngineError::type_mismatch(format!(
            "Operand must be an atomic, found {}",
            item.type_name()
        ))
        .at(template.position())),
        other => Ok(other),
    }
}

#[derive(Clone)]
pub struct Arithmetic {
    pub op: ArithmeticOp,
    pub left: Box<dyn Runtime<Item>>,
    pub right: Box<dyn Runtime<Item>>,
}

impl Compute for Arithmetic {
    fn name(&self) -> &'static str {
        "arithmetic"
    }

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        let left = operand(self.left.as_ref(), context)?;
        let right = operand(self.right.as_ref(), context)?;
        match (left, right) {
            (Some(l), Some(r)) => Ok(vec![apply_arithmetic(self.op, &l, &r)?]),
            _ => Ok(Vec::new()),
        }
    }
}

/// Numeric result tiers: integer, decimal, double
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Integer,
    Decimal,
    Double,
}

fn tier(item: &Item) -> EngineResult<Tier> {
    match item {
        Item::Integer(_) => Ok(Tier::Integer),
        Item::Decimal(_) => Ok(Tier::Decimal),
        Item::Double(_) => Ok(Tier::Double),
        other => Err(EngineError::type_mismatch(format!(
            "Arithmetic is not defined for {}",
            other.type_name()
        ))),
    }
}

fn overflow() -> EngineError {
    EngineError::invalid_argument("Integer overflow")
}

fn division_by_zero() -> EngineError {
    EngineError::invalid_argument("Division by zero")
}

pub fn apply_arithmetic(op: ArithmeticOp, left: &Item, right: &Item) -> EngineResult<Item> {
    let result_tier = tier(left)?.max(tier(right)?);

    match (left, right) {
        (Item::Integer(a), Item::Integer(b)) => integer_arithmetic(op, *a, *b),
        _ if result_tier == Tier::Double => double_arithmetic(
            op,
            left.as_double().unwrap_or_default(),
            right.as_double().unwrap_or_default(),
        ),
        _ => match (left.as_decimal(), right.as_decimal()) {
            (Some(a), Some(b)) => decimal_arithmetic(op, a, b),
            _ => Err(EngineError::flow("Decimal operand without an exact value")),
        },
    }
}

fn integer_arithmetic(op: ArithmeticOp, a: i64, b: i64) -> EngineResult<Item> {
    let result = match op {
        ArithmeticOp::Add => a.checked_add(b),
        ArithmeticOp::Subtract => a.checked_sub(b),
        ArithmeticOp::Multiply => a.checked_mul(b),
        ArithmeticOp::IntegerDivide | ArithmeticOp::Modulo | ArithmeticOp::Divide if b == 0 => {
            return Err(division_by_zero())
        }
        ArithmeticOp::IntegerDivide => a.checked_div(b),
        ArithmeticOp::Modulo => a.checked_rem(b),
        ArithmeticOp::Divide => {
            return decimal_arithmetic(op, BigDecimal::from(a), BigDecimal::from(b))
        }
    };
    result.map(Item::Integer).ok_or_else(overflow)
}

fn decimal_arithmetic(op: ArithmeticOp, a: BigDecimal, b: BigDecimal) -> EngineResult<Item> {
    let divides = matches!(
        op,
        ArithmeticOp::Divide | ArithmeticOp::IntegerDivide | ArithmeticOp::Modulo
    );
    if divides && b.is_zero() {
        return Err(division_by_zero());
    }

    let value = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
        ArithmeticOp::Multiply => a * b,
        ArithmeticOp::Divide => a / b,
        ArithmeticOp::Modulo => a % b,
        ArithmeticOp::IntegerDivide => {
            return (a / b)
                .with_scale(0)
                .to_i64()
                .map(Item::Integer)
                .ok_or_else(integer_division_range)
        }
    };
    Ok(Item::Decimal(value))
}

fn double_arithmetic(op: ArithmeticOp, a: f64, b: f64) -> EngineResult<Item> {
    let value = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
        ArithmeticOp::Multiply => a * b,
        ArithmeticOp::Divide => a / b,
        ArithmeticOp::Modulo => a % b,
        ArithmeticOp::IntegerDivide => {
            let quotient = (a / b).trunc();
            if !quotient.is_finite() || quotient.abs() >= i64::MAX as f64 {
                return Err(integer_division_range());
            }
            return Ok(Item::Integer(quotient as i64));
        }
    };
    Ok(Item::Double(value))
}

fn integer_division_range() -> EngineError {
    EngineError::invalid_argument("Integer division result is out of range")
}

#[derive(Clone)]
pub struct Comparison {
    pub op: ComparisonOp,
    pub left: Box<dyn Runtime<Item>>,
    pub right: Box<dyn Runtime<Item>>,
}

impl Compute for Comparison {
    fn name(&self) -> &'static str {
        "comparison"
    }

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        let left = operand(self.left.as_ref(), context)?;
        let right = operand(self.right.as_ref(), context)?;
        let (Some(left), Some(right)) = (left, right) else {
            return Ok(Vec::new());
        };

        let ordering = compare_atomics(&left, &right)?;
        let result = match self.op {
            ComparisonOp::Eq => ordering == Ordering::Equal,
            ComparisonOp::Ne => ordering != Ordering::Equal,
            ComparisonOp::Lt => ordering == Ordering::Less,
            ComparisonOp::Le => ordering != Ordering::Greater,
            ComparisonOp::Gt => ordering == Ordering::Greater,
            ComparisonOp::Ge => ordering != Ordering::Less,
        };
        Ok(vec![Item::Boolean(result)])
    }
}

/// `and` / `or`; the right operand is evaluated only when needed
#[derive(Clone)]
pub struct Logical {
    pub op: LogicalOp,
    pub left: Box<dyn Runtime<Item>>,
    pub right: Box<dyn Runtime<Item>>,
}

impl Compute for Logical {
    fn name(&self) -> &'static str {
        "logical"
    }

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        let left = effective_boolean_value(&evaluate(self.left.as_ref(), context)?)
            .map_err(|e| e.at(self.left.position()))?;
        let result = match (self.op, left) {
            (LogicalOp::And, false) => false,
            (LogicalOp::Or, true) => true,
            _ => effective_boolean_value(&evaluate(self.right.as_ref(), context)?)
                .map_err(|e| e.at(self.right.position()))?,
        };
        Ok(vec![Item::Boolean(result)])
    }
}

#[derive(Clone)]
pub struct Not {
    pub operand: Box<dyn Runtime<Item>>,
}

impl Compute for Not {
    fn name(&self) -> &'static str {
        "not"
    }

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        let value = effective_boolean_value(&evaluate(self.operand.as_ref(), context)?)?;
        Ok(vec![Item::Boolean(!value)])
    }
}

/// `if (c) then a else b`, streaming the chosen branch
#[derive(Clone)]
pub struct Conditional {
    pub condition: Box<dyn Runtime<Item>>,
    pub then: Box<dyn Runtime<Item>>,
    pub otherwise: Box<dyn Runtime<Item>>,
    chosen: Option<bool>,
}

impl Conditional {
    pub fn new(
        condition: Box<dyn Runtime<Item>>,
        then: Box<dyn Runtime<Item>>,
        otherwise: Box<dyn Runtime<Item>>,
    ) -> Self {
        Self {
            condition,
            then,
            otherwise,
            chosen: None,
        }
    }

    fn branch(&mut self) -> Option<&mut Box<dyn Runtime<Item>>> {
        match self.chosen {
            Some(true) => Some(&mut self.then),
            Some(false) => Some(&mut self.otherwise),
            None => None,
        }
    }
}

impl Strategy for Conditional {
    type Output = Item;

    fn name(&self) -> &'static str {
        "if"
    }

    fn open_local(&mut self, context: &Arc<DynamicContext>) -> EngineResult<()> {
        let condition = effective_boolean_value(&evaluate(self.condition.as_ref(), context)?)
            .map_err(|e| e.at(self.condition.position()))?;
        self.chosen = Some(condition);
        match self.branch() {
            Some(branch) => branch.open(context),
            None => Ok(()),
        }
    }

    fn next_local(&mut self) -> EngineResult<Option<Item>> {
        match self.branch() {
            Some(branch) if branch.has_next() => branch.next().map(Some),
            _ => Ok(None),
        }
    }

    fn close_local(&mut self) {
        self.then.close();
        self.otherwise.close();
        self.chosen = None;
    }
}

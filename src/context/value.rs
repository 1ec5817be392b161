//! Bound values in their three representations

use crate::cluster::{Collection, DataFrame};
use crate::errors::{EngineResult, SourcePosition};
use crate::expression::ExecutionMode;
use crate::item::{Item, Sequence};
use crate::runtime::boundary;
use crate::session::Session;

/// A variable's value: materialized, row-distributed or columnar
#[derive(Debug, Clone)]
pub enum Value {
    Local(Sequence),
    Rows(Collection<Item>),
    Columns(DataFrame),
}

impl Value {
    pub fn empty() -> Self {
        Value::Local(Vec::new())
    }

    pub fn single(item: Item) -> Self {
        Value::Local(vec![item])
    }

    /// Mode of the representation
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Value::Local(_) => ExecutionMode::Local,
            Value::Rows(_) => ExecutionMode::ParallelRowWise,
            Value::Columns(_) => ExecutionMode::ParallelColumnar,
        }
    }

    /// Row form of a distributed value; local values are distributed first
    pub fn rows(&self, session: &Session) -> Collection<Item> {
        match self {
            Value::Local(items) => session.cluster().parallelize(items.clone(), None),
            Value::Rows(rows) => rows.clone(),
            Value::Columns(frame) => frame.to_rows(),
        }
    }

    /// Local form, crossing the distributed boundary if needed
    pub fn to_sequence(&self, session: &Session, position: &SourcePosition) -> EngineResult<Sequence> {
        match self {
            Value::Local(items) => Ok(items.clone()),
            Value::Rows(rows) => boundary::materialize(rows, session, position),
            Value::Columns(frame) => boundary::materialize(&frame.to_rows(), session, position),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Local(a), Value::Local(b)) => a == b,
            (Value::Rows(a), Value::Rows(b)) => a.collect() == b.collect(),
            (Value::Columns(a), Value::Columns(b)) => {
                a.columns() == b.columns() && a.to_rows().collect() == b.to_rows().collect()
            }
            _ => false,
        }
    }
}

impl From<Sequence> for Value {
    fn from(items: Sequence) -> Self {
        Value::Local(items)
    }
}

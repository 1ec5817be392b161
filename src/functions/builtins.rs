//! Built-in functions
//!
//! Sources (`json-file`, `text-file`, `structured-json-file`,
//! `parallelize`) produce distributed collections. The aggregates and
//! peeks are host-side and pick a distributed or local path from the mode
//! of their argument. Constructors (`date`, `dateTime`, `time`, `duration`,
//! `base64Binary`) cast a string to an atomic type.

use std::collections::HashSet;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{Datelike, Duration};
use indexmap::IndexMap;

use super::item::{FunctionItem, Signature};
use crate::cluster::{Collection, DataFrame};
use crate::context::{Bindings, DynamicContext};
use crate::errors::{EngineError, EngineResult, SourcePosition};
use crate::expression::ExecutionMode;
use crate::item::{Item, Sequence};
use crate::types::{cast_string, ItemType};
use crate::runtime::boundary::{materialize, peek};
use crate::runtime::{evaluate, evaluate_optional, evaluate_rows, Compute, Computed, Hybrid, Runtime, VariableReference};

/// The built-in function table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    JsonFile,
    TextFile,
    StructuredJsonFile,
    Parallelize,
    Count,
    Empty,
    Exists,
    Sum,
    Keys,
    Size,
    Head,
    Intersect,
    Date,
    DateTime,
    Time,
    Duration,
    Base64Binary,
    YearFromDateTime,
    TimezoneFromTime,
}

impl Builtin {
    const ALL: [Builtin; 19] = [
        Builtin::JsonFile,
        Builtin::TextFile,
        Builtin::StructuredJsonFile,
        Builtin::Parallelize,
        Builtin::Count,
        Builtin::Empty,
        Builtin::Exists,
        Builtin::Sum,
        Builtin::Keys,
        Builtin::Size,
        Builtin::Head,
        Builtin::Intersect,
        Builtin::Date,
        Builtin::DateTime,
        Builtin::Time,
        Builtin::Duration,
        Builtin::Base64Binary,
        Builtin::YearFromDateTime,
        Builtin::TimezoneFromTime,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::JsonFile => "json-file",
            Builtin::TextFile => "text-file",
            Builtin::StructuredJsonFile => "structured-json-file",
            Builtin::Parallelize => "parallelize",
            Builtin::Count => "count",
            Builtin::Empty => "empty",
            Builtin::Exists => "exists",
            Builtin::Sum => "sum",
            Builtin::Keys => "keys",
            Builtin::Size => "size",
            Builtin::Head => "head",
            Builtin::Intersect => "intersect",
            Builtin::Date => "date",
            Builtin::DateTime => "dateTime",
            Builtin::Time => "time",
            Builtin::Duration => "duration",
            Builtin::Base64Binary => "base64Binary",
            Builtin::YearFromDateTime => "year-from-dateTime",
            Builtin::TimezoneFromTime => "timezone-from-time",
        }
    }

    /// Target type of a constructor
    fn constructs(&self) -> Option<ItemType> {
        match self {
            Builtin::Date => Some(ItemType::Date),
            Builtin::DateTime => Some(ItemType::DateTime),
            Builtin::Time => Some(ItemType::Time),
            Builtin::Duration => Some(ItemType::Duration),
            Builtin::Base64Binary => Some(ItemType::Base64Binary),
            _ => None,
        }
    }

    /// Accepted argument counts; the optional second argument of a source
    /// is its partition count
    fn arities(&self) -> &'static [usize] {
        match self {
            Builtin::JsonFile | Builtin::TextFile | Builtin::Parallelize => &[1, 2],
            _ => &[1],
        }
    }

    pub fn lookup(name: &str, arity: usize) -> Option<Builtin> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.name() == name && b.arities().contains(&arity))
    }

    /// Mode of a call with no placeholders
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Builtin::JsonFile | Builtin::TextFile | Builtin::Parallelize => {
                ExecutionMode::ParallelRowWise
            }
            Builtin::StructuredJsonFile => ExecutionMode::ParallelColumnar,
            _ => ExecutionMode::Local,
        }
    }

    /// A function item whose body calls this built-in on its parameters
    pub fn as_function_item(&self, arity: usize) -> FunctionItem {
        let parameters: Vec<String> = (1..=arity).map(|i| format!("arg{}", i)).collect();
        let arguments = parameters
            .iter()
            .map(|name| {
                Hybrid::boxed(
                    VariableReference::new(name.clone(), SourcePosition::default()),
                    ExecutionMode::Local,
                    SourcePosition::default(),
                )
            })
            .collect();
        let body = Hybrid::new(
            Computed::new(BuiltinCall::new(*self, arguments)),
            ExecutionMode::Local,
            SourcePosition::default(),
        );

        FunctionItem::new(
            Some(self.name().to_string()),
            parameters,
            Signature::unconstrained(arity),
            Arc::new(body),
            Bindings::new(),
        )
    }
}

/// Call of a built-in function
#[derive(Clone)]
pub struct BuiltinCall {
    builtin: Builtin,
    arguments: Vec<Box<dyn Runtime<Item>>>,
}

impl BuiltinCall {
    pub fn new(builtin: Builtin, arguments: Vec<Box<dyn Runtime<Item>>>) -> Self {
        Self { builtin, arguments }
    }

    fn argument(&self, index: usize) -> EngineResult<&dyn Runtime<Item>> {
        self.arguments
            .get(index)
            .map(|a| a.as_ref())
            .ok_or_else(|| EngineError::arity(self.builtin.name(), index + 1, self.arguments.len()))
    }

    fn location(&self, context: &Arc<DynamicContext>) -> EngineResult<String> {
        match evaluate_optional(self.argument(0)?, context, "Source location")? {
            Some(Item::String(location)) => Ok(location.to_string()),
            other => Err(EngineError::type_mismatch(format!(
                "{} expects a string location, found {}",
                self.builtin.name(),
                other.map(|i| i.type_name()).unwrap_or("an empty sequence")
            ))),
        }
    }

    fn partitions(&self, context: &Arc<DynamicContext>) -> EngineResult<usize> {
        let default = context.session().cluster().default_partitions();
        let Some(argument) = self.arguments.get(1) else {
            return Ok(default);
        };
        match evaluate_optional(argument.as_ref(), context, "Partition count")? {
            None => Ok(default),
            Some(Item::Integer(n)) if n > 0 => Ok(n as usize),
            Some(other) => Err(EngineError::invalid_argument(format!(
                "Partition count must be a positive integer, found {}",
                other
            ))),
        }
    }

    /// Whole input of a one-argument aggregate, crossing the boundary once
    fn input(&self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        evaluate(self.argument(0)?, context)
    }

    fn is_empty(&self, context: &Arc<DynamicContext>) -> EngineResult<bool> {
        let argument = self.argument(0)?;
        if argument.mode().is_parallel() {
            let rows = evaluate_rows(argument, context)?;
            return Ok(peek(&rows, 1).is_empty());
        }
        let mut iterator = argument.clone_box();
        iterator.open(context)?;
        let empty = !iterator.has_next();
        iterator.close();
        Ok(empty)
    }

    fn head(&self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        let argument = self.argument(0)?;
        if argument.mode().is_parallel() {
            let rows = evaluate_rows(argument, context)?;
            return Ok(peek(&rows, 1));
        }
        let mut iterator = argument.clone_box();
        iterator.open(context)?;
        let first = if iterator.has_next() {
            vec![iterator.next()?]
        } else {
            Vec::new()
        };
        iterator.close();
        Ok(first)
    }

    fn count(&self, context: &Arc<DynamicContext>) -> EngineResult<usize> {
        let argument = self.argument(0)?;
        match argument.mode() {
            ExecutionMode::ParallelColumnar => Ok(argument.clone_box().frame(context)?.count()),
            ExecutionMode::ParallelRowWise => Ok(evaluate_rows(argument, context)?.count()),
            _ => Ok(evaluate(argument, context)?.len()),
        }
    }

    fn source_rows(&self, context: &Arc<DynamicContext>) -> EngineResult<Collection<Item>> {
        let session = context.session();
        let cluster = session.cluster();
        let rows = match self.builtin {
            Builtin::JsonFile => {
                let location = self.location(context)?;
                cluster.json_file(&location, Some(self.partitions(context)?))?
            }
            Builtin::TextFile => {
                let location = self.location(context)?;
                let lines = cluster.text_file(&location, Some(self.partitions(context)?))?;
                cluster.install(|| lines.map(|line| Ok(Item::string(line))))?
            }
            Builtin::StructuredJsonFile => self.source_frame(context)?.to_rows(),
            Builtin::Parallelize => {
                let items = self.input(context)?;
                let partitions = self.partitions(context)?;
                return Ok(cluster.parallelize(items, Some(partitions)));
            }
            other => {
                return Err(EngineError::flow(format!(
                    "{} has no distributed form",
                    other.name()
                )))
            }
        };
        session.metrics().add_records_ingested(rows.count() as u64);
        Ok(rows)
    }

    /// The single argument of a constructor or component accessor
    fn atomic_argument(&self, context: &Arc<DynamicContext>) -> EngineResult<Option<Item>> {
        evaluate_optional(self.argument(0)?, context, self.builtin.name())
    }

    fn construct(&self, target: &ItemType, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        match self.atomic_argument(context)? {
            None => Ok(Vec::new()),
            Some(Item::String(text)) => Ok(vec![cast_string(&text, target)?]),
            Some(item) if item.type_name() == target.name() => Ok(vec![item]),
            Some(other) => Err(EngineError::type_mismatch(format!(
                "{} expects a string, found {}",
                self.builtin.name(),
                other.type_name()
            ))),
        }
    }

    fn date_component(&self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        let component = match (self.builtin, self.atomic_argument(context)?) {
            (_, None) => None,
            (Builtin::YearFromDateTime, Some(Item::DateTime(dt))) => {
                Some(Item::Integer(dt.year() as i64))
            }
            (Builtin::TimezoneFromTime, Some(Item::Time(_, zone))) => {
                zone.map(|z| Item::Duration(Duration::seconds(z.local_minus_utc() as i64)))
            }
            (builtin, Some(other)) => {
                return Err(EngineError::type_mismatch(format!(
                    "{} is not defined for {}",
                    builtin.name(),
                    other.type_name()
                )))
            }
        };
        Ok(component.into_iter().collect())
    }

    fn source_frame(&self, context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        if self.builtin != Builtin::StructuredJsonFile {
            return Err(EngineError::flow(format!(
                "{} has no columnar form",
                self.builtin.name()
            )));
        }
        let location = self.location(context)?;
        context.session().cluster().structured_json_file(&location)
    }
}

fn sum(items: &[Item]) -> EngineResult<Item> {
    if let Some(bad) = items.iter().find(|i| !i.is_numeric()) {
        return Err(EngineError::type_mismatch(format!(
            "sum expects numeric items, found {}",
            bad.type_name()
        )));
    }

    if items.iter().all(Item::is_integer) {
        return items
            .iter()
            .try_fold(0i64, |acc, item| acc.checked_add(item.as_integer().unwrap_or_default()))
            .map(Item::Integer)
            .ok_or_else(|| EngineError::invalid_argument("Integer overflow in sum"));
    }

    if items.iter().any(|i| matches!(i, Item::Double(_))) {
        return Ok(Item::Double(items.iter().filter_map(Item::as_double).sum()));
    }
    let total = items
        .iter()
        .filter_map(Item::as_decimal)
        .fold(BigDecimal::from(0), |acc, d| acc + d);
    Ok(Item::Decimal(total))
}

/// Keys present in every object, in the first object's order. A key whose
/// values were collected from more than one object maps to an array of them.
fn intersect(items: &[Item]) -> Item {
    let mut objects = items.iter().filter(|item| item.is_object());
    let Some(first) = objects.next() else {
        return Item::object(Vec::new());
    };

    let mut common: IndexMap<&str, Vec<Item>> = IndexMap::new();
    for key in first.keys() {
        if let Some(value) = first.item_by_key(key) {
            common.entry(key).or_insert_with(|| vec![value.clone()]);
        }
    }
    for object in objects {
        common.retain(|key, values| match object.item_by_key(key) {
            Some(value) => {
                values.push(value.clone());
                true
            }
            None => false,
        });
    }

    Item::object(
        common
            .into_iter()
            .map(|(key, mut values)| {
                let value = if values.len() == 1 {
                    values.remove(0)
                } else {
                    Item::array(values)
                };
                (key.to_string(), value)
            })
            .collect(),
    )
}

fn keys(items: &[Item]) -> Sequence {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for item in items {
        for key in item.keys() {
            if seen.insert(key.to_string()) {
                keys.push(Item::string(key));
            }
        }
    }
    keys
}

impl Compute for BuiltinCall {
    fn name(&self) -> &'static str {
        self.builtin.name()
    }

    fn compute(&mut self, context: &Arc<DynamicContext>) -> EngineResult<Sequence> {
        match self.builtin {
            Builtin::JsonFile
            | Builtin::TextFile
            | Builtin::StructuredJsonFile
            | Builtin::Parallelize => {
                let rows = self.source_rows(context)?;
                let position = self.argument(0)?.position().clone();
                materialize(&rows, context.session(), &position)
            }
            Builtin::Count => Ok(vec![Item::Integer(self.count(context)? as i64)]),
            Builtin::Empty => Ok(vec![Item::Boolean(self.is_empty(context)?)]),
            Builtin::Exists => Ok(vec![Item::Boolean(!self.is_empty(context)?)]),
            Builtin::Sum => Ok(vec![sum(&self.input(context)?)?]),
            Builtin::Keys => Ok(keys(&self.input(context)?)),
            Builtin::Size => match evaluate_optional(self.argument(0)?, context, "size argument")? {
                None => Ok(Vec::new()),
                Some(Item::Array(members)) => Ok(vec![Item::Integer(members.len() as i64)]),
                Some(other) => Err(EngineError::type_mismatch(format!(
                    "size expects an array, found {}",
                    other.type_name()
                ))),
            },
            Builtin::Head => self.head(context),
            Builtin::Intersect => Ok(vec![intersect(&self.input(context)?)]),
            Builtin::YearFromDateTime | Builtin::TimezoneFromTime => self.date_component(context),
            constructor => match constructor.constructs() {
                Some(target) => self.construct(&target, context),
                None => Err(EngineError::flow(format!(
                    "{} has no local form",
                    constructor.name()
                ))),
            },
        }
    }

    fn collection(
        &mut self,
        context: &Arc<DynamicContext>,
        _mode: ExecutionMode,
    ) -> EngineResult<Collection<Item>> {
        self.source_rows(context)
    }

    fn frame(&mut self, context: &Arc<DynamicContext>) -> EngineResult<DataFrame> {
        self.source_frame(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_arity() {
        assert_eq!(Builtin::lookup("json-file", 1), Some(Builtin::JsonFile));
        assert_eq!(Builtin::lookup("json-file", 2), Some(Builtin::JsonFile));
        assert_eq!(Builtin::lookup("structured-json-file", 2), None);
        assert_eq!(Builtin::lookup("count", 1), Some(Builtin::Count));
        assert_eq!(Builtin::lookup("nope", 1), None);
        assert_eq!(Builtin::lookup("year-from-dateTime", 1), Some(Builtin::YearFromDateTime));
        assert_eq!(Builtin::lookup("dateTime", 1), Some(Builtin::DateTime));
    }

    #[test]
    fn test_modes() {
        assert_eq!(Builtin::JsonFile.mode(), ExecutionMode::ParallelRowWise);
        assert_eq!(Builtin::StructuredJsonFile.mode(), ExecutionMode::ParallelColumnar);
        assert_eq!(Builtin::Empty.mode(), ExecutionMode::Local);
    }

    #[test]
    fn test_sum() {
        assert_eq!(sum(&[Item::Integer(1), Item::Integer(2)]).unwrap(), Item::Integer(3));
        assert_eq!(sum(&[]).unwrap(), Item::Integer(0));
        assert!(matches!(
            sum(&[Item::Integer(1), Item::Double(0.5)]).unwrap(),
            Item::Double(v) if v == 1.5
        ));
        assert!(sum(&[Item::string("x")]).is_err());

        let tenth = Item::from_json(&serde_json::json!(0.1));
        let total = sum(&[tenth.clone(), tenth.clone(), tenth, Item::Integer(1)]).unwrap();
        assert!(matches!(total, Item::Decimal(_)));
        assert_eq!(total, Item::from_json(&serde_json::json!(1.3)));
    }

    #[test]
    fn test_intersect_keeps_common_keys() {
        let objects = vec![
            Item::object(vec![("a".into(), Item::Integer(1)), ("b".into(), Item::Integer(2))]),
            Item::Integer(7),
            Item::object(vec![("b".into(), Item::Integer(3)), ("a".into(), Item::Integer(4))]),
            Item::object(vec![("a".into(), Item::Integer(5))]),
        ];
        assert_eq!(
            intersect(&objects),
            Item::object(vec![(
                "a".into(),
                Item::array(vec![Item::Integer(1), Item::Integer(4), Item::Integer(5)])
            )])
        );

        let single = vec![Item::object(vec![("a".into(), Item::Integer(1))])];
        assert_eq!(intersect(&single), single[0]);
        assert_eq!(intersect(&[]), Item::object(Vec::new()));
    }

    #[test]
    fn test_keys_distinct_in_order() {
        let objects = vec![
            Item::object(vec![("b".into(), Item::Null), ("a".into(), Item::Null)]),
            Item::object(vec![("a".into(), Item::Null), ("c".into(), Item::Null)]),
        ];
        assert_eq!(
            keys(&objects),
            vec![Item::string("b"), Item::string("a"), Item::string("c")]
        );
    }

    #[test]
    fn test_builtin_as_function_item() {
        let function = Builtin::Count.as_function_item(1);
        assert_eq!(function.identifier(), "count#1");
        assert_eq!(function.parameters(), &["arg1".to_string()]);
    }
}

//! Type catalogue: resolution, declaration and promotion
//!
//! Promotion rules:
//! - integer promotes to decimal and double, decimal promotes to double
//! - a declared object type accepts objects whose declared fields are present
//!   when required and promotable when present; undeclared fields pass through
//! - inside a declared object, a string field of a date, time, duration or
//!   binary type is cast from its lexical form
//! - everything else must already be an instance of the target type

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use num_traits::ToPrimitive;

use super::cast::{cast_string, is_lexical_only};
use super::errors::{CatalogueError, CatalogueResult};
use super::sequence_type::{ItemType, SequenceType};
use crate::item::{Item, Sequence};

/// Field of a declared object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Sequence type of the field value
    #[serde(rename = "type")]
    pub field_type: SequenceType,
    /// Whether the field must be present
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    pub fn required(field_type: SequenceType) -> Self {
        Self {
            field_type,
            required: true,
        }
    }

    pub fn optional(field_type: SequenceType) -> Self {
        Self {
            field_type,
            required: false,
        }
    }
}

/// A user-declared object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    pub name: String,
    #[serde(default)]
    pub fields: IndexMap<String, FieldDef>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>, fields: IndexMap<String, FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// Registry of built-in and declared types
#[derive(Debug, Default)]
pub struct TypeCatalogue {
    declared: HashMap<String, ObjectType>,
}

impl TypeCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a declared object type
    ///
    /// Fails if the name is a built-in, was already declared, or a field
    /// refers to a type that is neither built-in nor declared (the type may
    /// refer to itself).
    pub fn declare(&mut self, object_type: ObjectType) -> CatalogueResult<()> {
        let name = object_type.name.clone();
        if ItemType::builtin(&name).is_some() {
            return Err(CatalogueError::BuiltinClash(name));
        }
        if self.declared.contains_key(&name) {
            return Err(CatalogueError::DuplicateType(name));
        }

        for (field, def) in &object_type.fields {
            if let ItemType::Declared(field_type) = def.field_type.item_type() {
                if field_type != &name && !self.declared.contains_key(field_type) {
                    return Err(CatalogueError::UnknownFieldType {
                        type_name: name,
                        field: field.clone(),
                        field_type: field_type.clone(),
                    });
                }
            }
        }

        self.declared.insert(name, object_type);
        Ok(())
    }

    /// Registers several declarations in order
    pub fn declare_all(&mut self, declarations: &[ObjectType]) -> CatalogueResult<()> {
        for declaration in declarations {
            self.declare(declaration.clone())?;
        }
        Ok(())
    }

    /// Returns the declaration of a user type
    pub fn declared(&self, name: &str) -> Option<&ObjectType> {
        self.declared.get(name)
    }

    /// Number of declared types
    pub fn declared_count(&self) -> usize {
        self.declared.len()
    }

    /// Resolves a sequence-type literal
    pub fn resolve(&self, literal: &str) -> CatalogueResult<SequenceType> {
        let sequence_type = SequenceType::parse(literal)?;
        self.check(&sequence_type)?;
        Ok(sequence_type)
    }

    /// Checks that every type named by a sequence type is known
    pub fn check(&self, sequence_type: &SequenceType) -> CatalogueResult<()> {
        match sequence_type.item_type() {
            ItemType::Declared(name) if !self.declared.contains_key(name) => {
                Err(CatalogueError::UnknownType(name.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Promotes a single item to an item type
    pub fn promote(&self, item: &Item, target: &ItemType) -> CatalogueResult<Item> {
        let promoted = match (target, item) {
            (ItemType::Item, _) => Some(item.clone()),
            (ItemType::Atomic, i) if i.is_atomic() => Some(item.clone()),
            (ItemType::String, Item::String(_)) => Some(item.clone()),
            (ItemType::Integer, Item::Integer(_)) => Some(item.clone()),
            (ItemType::Decimal, Item::Integer(_) | Item::Decimal(_)) => {
                item.as_decimal().map(Item::Decimal)
            }
            (ItemType::Double, Item::Integer(i)) => Some(Item::Double(*i as f64)),
            (ItemType::Double, Item::Decimal(d)) => d.to_f64().map(Item::Double),
            (ItemType::Double, Item::Double(_)) => Some(item.clone()),
            (ItemType::Numeric, i) if i.is_numeric() => Some(item.clone()),
            (ItemType::Boolean, Item::Boolean(_)) => Some(item.clone()),
            (ItemType::Null, Item::Null) => Some(item.clone()),
            (ItemType::Date, Item::Date(_)) => Some(item.clone()),
            (ItemType::DateTime, Item::DateTime(_)) => Some(item.clone()),
            (ItemType::Time, Item::Time(..)) => Some(item.clone()),
            (ItemType::Duration, Item::Duration(_)) => Some(item.clone()),
            (ItemType::Base64Binary, Item::Binary(_)) => Some(item.clone()),
            (ItemType::Object, Item::Object(_)) => Some(item.clone()),
            (ItemType::Array, Item::Array(_)) => Some(item.clone()),
            (ItemType::Function, Item::Function(_)) => Some(item.clone()),
            (ItemType::Declared(name), Item::Object(_)) => Some(self.promote_object(item, name)?),
            _ => None,
        };

        promoted.ok_or_else(|| CatalogueError::Promotion {
            found: item.type_name().to_string(),
            target: target.to_string(),
        })
    }

    /// Promotes a whole sequence, checking its cardinality first
    pub fn promote_sequence(
        &self,
        sequence: &Sequence,
        target: &SequenceType,
    ) -> CatalogueResult<Sequence> {
        if target.is_unconstrained() {
            return Ok(sequence.clone());
        }
        if !target.admits_count(sequence.len()) {
            return Err(CatalogueError::Cardinality {
                expected: target.to_string(),
                found: sequence.len(),
            });
        }
        sequence
            .iter()
            .map(|item| self.promote(item, target.item_type()))
            .collect()
    }

    fn promote_object(&self, object: &Item, type_name: &str) -> CatalogueResult<Item> {
        let declaration = self
            .declared
            .get(type_name)
            .ok_or_else(|| CatalogueError::UnknownType(type_name.to_string()))?;

        for (field, def) in &declaration.fields {
            if def.required && object.item_by_key(field).is_none() {
                return Err(CatalogueError::Promotion {
                    found: format!("object without field {}", field),
                    target: type_name.to_string(),
                });
            }
        }

        let Item::Object(pairs) = object else {
            return Err(CatalogueError::Promotion {
                found: object.type_name().to_string(),
                target: type_name.to_string(),
            });
        };

        let mut promoted = Vec::with_capacity(pairs.len());
        for (key, value) in pairs.iter() {
            let value = match declaration.fields.get(key) {
                Some(def) => self.promote_field(value, &def.field_type)?,
                None => value.clone(),
            };
            promoted.push((key.clone(), value));
        }
        Ok(Item::object(promoted))
    }

    fn promote_field(&self, value: &Item, field_type: &SequenceType) -> CatalogueResult<Item> {
        // Arrays stand in for multi-item field values
        match (value, field_type.occurrence().max()) {
            (Item::Array(members), None) => {
                let members: Sequence = members.iter().cloned().collect();
                Ok(Item::array(self.promote_sequence(&members, field_type)?))
            }
            (Item::Null, Some(1)) if field_type.admits_count(0) => Ok(Item::Null),
            (Item::String(text), _) if is_lexical_only(field_type.item_type()) => {
                cast_string(text, field_type.item_type())
            }
            _ => self.promote(value, field_type.item_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn person() -> ObjectType {
        let mut fields = IndexMap::new();
        fields.insert(
            "name".to_string(),
            FieldDef::required(SequenceType::parse("string").unwrap()),
        );
        fields.insert(
            "age".to_string(),
            FieldDef::optional(SequenceType::parse("double?").unwrap()),
        );
        ObjectType::new("person", fields)
    }

    #[test]
    fn test_numeric_promotion() {
        let catalogue = TypeCatalogue::new();
        let three = catalogue.promote(&Item::Integer(3), &ItemType::Decimal).unwrap();
        assert!(matches!(&three, Item::Decimal(d) if *d == BigDecimal::from(3)));
        assert!(matches!(
            catalogue.promote(&Item::Integer(i64::MAX), &ItemType::Decimal).unwrap(),
            Item::Decimal(d) if d == BigDecimal::from(i64::MAX)
        ));
        assert!(matches!(
            catalogue.promote(&Item::from_json(&serde_json::json!(1.5)), &ItemType::Double).unwrap(),
            Item::Double(v) if v == 1.5
        ));
        assert!(catalogue.promote(&Item::Double(1.5), &ItemType::Integer).is_err());
    }

    #[test]
    fn test_promote_sequence_cardinality() {
        let catalogue = TypeCatalogue::new();
        let t = catalogue.resolve("integer?").unwrap();
        let err = catalogue
            .promote_sequence(&vec![Item::Integer(1), Item::Integer(2)], &t)
            .unwrap_err();
        assert!(matches!(err, CatalogueError::Cardinality { found: 2, .. }));
    }

    #[test]
    fn test_declare_rejects_builtin_clash() {
        let mut catalogue = TypeCatalogue::new();
        let err = catalogue
            .declare(ObjectType::new("string", IndexMap::new()))
            .unwrap_err();
        assert_eq!(err, CatalogueError::BuiltinClash("string".into()));
    }

    #[test]
    fn test_declare_rejects_duplicate() {
        let mut catalogue = TypeCatalogue::new();
        catalogue.declare(person()).unwrap();
        assert_eq!(
            catalogue.declare(person()).unwrap_err(),
            CatalogueError::DuplicateType("person".into())
        );
    }

    #[test]
    fn test_declare_rejects_unknown_field_type() {
        let mut catalogue = TypeCatalogue::new();
        let mut fields = IndexMap::new();
        fields.insert(
            "home".to_string(),
            FieldDef::optional(SequenceType::parse("address").unwrap()),
        );
        let err = catalogue
            .declare(ObjectType::new("person", fields))
            .unwrap_err();
        assert!(matches!(err, CatalogueError::UnknownFieldType { .. }));
    }

    #[test]
    fn test_resolve_unknown_declared_type() {
        let catalogue = TypeCatalogue::new();
        assert_eq!(
            catalogue.resolve("person*").unwrap_err(),
            CatalogueError::UnknownType("person".into())
        );
    }

    #[test]
    fn test_declared_date_fields_are_cast() {
        let mut catalogue = TypeCatalogue::new();
        let mut fields = IndexMap::new();
        fields.insert(
            "born".to_string(),
            FieldDef::required(SequenceType::parse("date").unwrap()),
        );
        catalogue.declare(ObjectType::new("birth", fields)).unwrap();
        let target = ItemType::Declared("birth".into());

        let ok = Item::object(vec![("born".into(), Item::string("1815-12-10"))]);
        let promoted = catalogue.promote(&ok, &target).unwrap();
        assert_eq!(promoted.item_by_key("born").map(Item::type_name), Some("date"));

        let bad = Item::object(vec![("born".into(), Item::string("tomorrow"))]);
        assert!(matches!(
            catalogue.promote(&bad, &target).unwrap_err(),
            CatalogueError::Cast { .. }
        ));

        // Strings are never promoted to dates outside a declared object
        assert!(catalogue.promote(&Item::string("1815-12-10"), &ItemType::Date).is_err());
    }

    #[test]
    fn test_promote_declared_object() {
        let mut catalogue = TypeCatalogue::new();
        catalogue.declare(person()).unwrap();
        let target = ItemType::Declared("person".into());

        let ok = Item::object(vec![
            ("name".into(), Item::string("ada")),
            ("age".into(), Item::Integer(36)),
            ("extra".into(), Item::Boolean(true)),
        ]);
        let promoted = catalogue.promote(&ok, &target).unwrap();
        assert!(matches!(promoted.item_by_key("age"), Some(Item::Double(_))));
        assert_eq!(promoted.item_by_key("extra"), Some(&Item::Boolean(true)));

        let missing = Item::object(vec![("age".into(), Item::Integer(1))]);
        assert!(catalogue.promote(&missing, &target).is_err());

        let wrong = Item::object(vec![("name".into(), Item::Integer(1))]);
        assert!(catalogue.promote(&wrong, &target).is_err());
    }
}

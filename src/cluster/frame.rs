//! Columnar distributed frames
//!
//! A [`DataFrame`] stores partitioned column chunks under a fixed column list.
//! A frame reads back either as objects (one per row, absent cells omitted)
//! or, after a projection, as the bare values of its single column.

use std::sync::Arc;

use rayon::prelude::*;

use super::collection::Collection;
use crate::errors::{EngineError, EngineResult};
use crate::item::Item;

/// How rows of a frame read back as items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Each row is an object of its present cells
    Objects,
    /// The frame has one column and each present cell is an item
    Values,
}

/// One partition: a column-major block of cells
#[derive(Debug, Clone)]
struct Chunk {
    columns: Vec<Vec<Option<Item>>>,
    rows: usize,
}

impl Chunk {
    fn row(&self, index: usize, names: &[String]) -> Item {
        let pairs = names
            .iter()
            .zip(&self.columns)
            .filter_map(|(name, column)| column[index].clone().map(|v| (name.clone(), v)))
            .collect();
        Item::object(pairs)
    }
}

/// A columnar distributed collection
#[derive(Debug, Clone)]
pub struct DataFrame {
    columns: Arc<Vec<String>>,
    chunks: Arc<Vec<Chunk>>,
    kind: RowKind,
}

impl DataFrame {
    /// Builds a frame from a collection of objects, keeping its partitioning
    ///
    /// The column list is the union of keys in first-seen order. Keys are
    /// gathered per partition and merged in partition order, so no record
    /// leaves its partition.
    pub fn from_objects(rows: &Collection<Item>) -> EngineResult<Self> {
        let seen = rows
            .partitions()
            .par_iter()
            .map(|partition| {
                let mut keys: Vec<String> = Vec::new();
                for object in partition {
                    if !object.is_object() {
                        return Err(EngineError::invalid_argument(format!(
                            "Columnar rows must be objects, found {}",
                            object.type_name()
                        )));
                    }
                    for key in object.keys() {
                        if !keys.iter().any(|k| k == key) {
                            keys.push(key.to_string());
                        }
                    }
                }
                Ok(keys)
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let mut columns: Vec<String> = Vec::new();
        for key in seen.into_iter().flatten() {
            if !columns.contains(&key) {
                columns.push(key);
            }
        }

        let chunks = rows
            .partitions()
            .par_iter()
            .map(|partition| Chunk {
                columns: columns
                    .iter()
                    .map(|name| {
                        partition
                            .iter()
                            .map(|row| row.item_by_key(name).cloned())
                            .collect()
                    })
                    .collect(),
                rows: partition.len(),
            })
            .collect();

        Ok(Self {
            columns: Arc::new(columns),
            chunks: Arc::new(chunks),
            kind: RowKind::Objects,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn kind(&self) -> RowKind {
        self.kind
    }

    pub fn num_partitions(&self) -> usize {
        self.chunks.len()
    }

    /// Projects one column into a value frame without touching other columns
    ///
    /// On a value frame the key is looked up inside each present value.
    pub fn select(&self, column: &str) -> Self {
        let chunks: Vec<Chunk> = match self.kind {
            RowKind::Objects => {
                let position = self.columns.iter().position(|c| c == column);
                self.chunks
                    .iter()
                    .map(|chunk| Chunk {
                        columns: vec![match position {
                            Some(p) => chunk.columns[p].clone(),
                            None => vec![None; chunk.rows],
                        }],
                        rows: chunk.rows,
                    })
                    .collect()
            }
            RowKind::Values => self
                .chunks
                .par_iter()
                .map(|chunk| Chunk {
                    columns: vec![chunk.columns[0]
                        .iter()
                        .map(|cell| cell.as_ref().and_then(|v| v.item_by_key(column)).cloned())
                        .collect()],
                    rows: chunk.rows,
                })
                .collect(),
        };

        Self {
            columns: Arc::new(vec![column.to_string()]),
            chunks: Arc::new(chunks),
            kind: RowKind::Values,
        }
    }

    /// Reads the frame back as a row collection
    pub fn to_rows(&self) -> Collection<Item> {
        let partitions = self
            .chunks
            .par_iter()
            .map(|chunk| match self.kind {
                RowKind::Objects => (0..chunk.rows)
                    .map(|i| chunk.row(i, &self.columns))
                    .collect::<Vec<_>>(),
                RowKind::Values => chunk.columns[0].iter().flatten().cloned().collect(),
            })
            .collect();
        Collection::from_partitions(partitions)
    }

    /// Number of items the frame reads back as
    pub fn count(&self) -> usize {
        match self.kind {
            RowKind::Objects => self.chunks.iter().map(|c| c.rows).sum(),
            RowKind::Values => self
                .chunks
                .iter()
                .map(|c| c.columns[0].iter().filter(|cell| cell.is_some()).count())
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Item> {
        vec![
            Item::object(vec![("a".into(), Item::Integer(1)), ("b".into(), Item::string("x"))]),
            Item::object(vec![("a".into(), Item::Integer(2))]),
            Item::object(vec![
                ("c".into(), Item::Boolean(true)),
                ("a".into(), Item::Integer(3)),
            ]),
        ]
    }

    #[test]
    fn test_columns_in_first_seen_order() {
        let frame = DataFrame::from_objects(&Collection::parallelize(rows(), 2)).unwrap();
        assert_eq!(frame.columns(), &["a", "b", "c"]);
        assert_eq!(frame.count(), 3);
    }

    #[test]
    fn test_rows_omit_absent_cells() {
        let frame = DataFrame::from_objects(&Collection::parallelize(rows(), 2)).unwrap();
        let back = frame.to_rows().collect();
        assert_eq!(back[1], Item::object(vec![("a".into(), Item::Integer(2))]));
        assert_eq!(back[2].keys(), vec!["a", "c"]);
    }

    #[test]
    fn test_select_skips_absent_values() {
        let frame = DataFrame::from_objects(&Collection::parallelize(rows(), 3)).unwrap();
        let b = frame.select("b");
        assert_eq!(b.kind(), RowKind::Values);
        assert_eq!(b.to_rows().collect(), vec![Item::string("x")]);
        assert_eq!(frame.select("missing").count(), 0);
    }

    #[test]
    fn test_select_on_value_frame_looks_inside() {
        let nested = vec![Item::object(vec![(
            "p".into(),
            Item::object(vec![("q".into(), Item::Integer(9))]),
        )])];
        let frame = DataFrame::from_objects(&Collection::parallelize(nested, 1)).unwrap();
        let q = frame.select("p").select("q");
        assert_eq!(q.to_rows().collect(), vec![Item::Integer(9)]);
    }

    #[test]
    fn test_non_object_rows_rejected() {
        assert!(DataFrame::from_objects(&Collection::parallelize(vec![Item::Integer(1)], 1)).is_err());
    }
}

//! Partitioned collections
//!
//! A [`Collection`] is an immutable list of partitions. Every transform runs
//! one rayon task per partition and returns a new collection; nothing is
//! mutated in place. Transforms must be pure functions of their input record.
//!
//! Ordering: `map`, `flat_map`, `filter`, `union`, `zip_with_index` and
//! `sort_by` keep partition order, and `take` reads partitions front to back.
//! `group_by_key` makes no ordering promise across or within groups.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rayon::prelude::*;

use crate::errors::EngineResult;

/// A row-distributed collection of records
#[derive(Debug)]
pub struct Collection<T> {
    partitions: Arc<Vec<Vec<T>>>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            partitions: Arc::clone(&self.partitions),
        }
    }
}

impl<T> Collection<T>
where
    T: Clone + Send + Sync,
{
    /// Splits `items` into at most `partitions` contiguous partitions
    pub fn parallelize(items: Vec<T>, partitions: usize) -> Self {
        let partitions = partitions.max(1);
        let chunk = items.len().div_ceil(partitions).max(1);
        let mut split = Vec::with_capacity(partitions);
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            split.push(items.by_ref().take(chunk).collect());
        }
        Self::from_partitions(split)
    }

    pub fn from_partitions(partitions: Vec<Vec<T>>) -> Self {
        Self {
            partitions: Arc::new(partitions),
        }
    }

    /// The empty collection
    pub fn empty() -> Self {
        Self::from_partitions(Vec::new())
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partitions(&self) -> &[Vec<T>] {
        &self.partitions
    }

    pub fn map<U, F>(&self, f: F) -> EngineResult<Collection<U>>
    where
        U: Clone + Send + Sync,
        F: Fn(&T) -> EngineResult<U> + Send + Sync,
    {
        let partitions = self
            .partitions
            .par_iter()
            .map(|partition| partition.iter().map(&f).collect::<EngineResult<Vec<U>>>())
            .collect::<EngineResult<Vec<Vec<U>>>>()?;
        Ok(Collection::from_partitions(partitions))
    }

    pub fn flat_map<U, F>(&self, f: F) -> EngineResult<Collection<U>>
    where
        U: Clone + Send + Sync,
        F: Fn(&T) -> EngineResult<Vec<U>> + Send + Sync,
    {
        let partitions = self
            .partitions
            .par_iter()
            .map(|partition| -> EngineResult<Vec<U>> {
                let mut out = Vec::new();
                for record in partition {
                    out.extend(f(record)?);
                }
                Ok(out)
            })
            .collect::<EngineResult<Vec<Vec<U>>>>()?;
        Ok(Collection::from_partitions(partitions))
    }

    pub fn filter<F>(&self, predicate: F) -> EngineResult<Collection<T>>
    where
        F: Fn(&T) -> EngineResult<bool> + Send + Sync,
    {
        self.flat_map(|record| {
            Ok(if predicate(record)? {
                vec![record.clone()]
            } else {
                Vec::new()
            })
        })
    }

    /// Maps each record to a key/value pair
    pub fn map_to_pair<K, V, F>(&self, f: F) -> EngineResult<PairCollection<K, V>>
    where
        K: Clone + Send + Sync,
        V: Clone + Send + Sync,
        F: Fn(&T) -> EngineResult<(K, V)> + Send + Sync,
    {
        Ok(PairCollection {
            inner: self.map(f)?,
        })
    }

    /// Concatenates the partitions of both collections
    pub fn union(&self, other: &Collection<T>) -> Collection<T> {
        let mut partitions = Vec::with_capacity(self.num_partitions() + other.num_partitions());
        partitions.extend(self.partitions.iter().cloned());
        partitions.extend(other.partitions.iter().cloned());
        Collection::from_partitions(partitions)
    }

    /// The first `n` records, reading partitions in order
    pub fn take(&self, n: usize) -> Vec<T> {
        self.partitions
            .iter()
            .flat_map(|partition| partition.iter())
            .take(n)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.partitions.par_iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.iter().all(Vec::is_empty)
    }

    /// Every record, in partition order
    pub fn collect(&self) -> Vec<T> {
        self.partitions.iter().flatten().cloned().collect()
    }

    /// Pairs each record with its global position, starting at 0
    pub fn zip_with_index(&self) -> Collection<(T, u64)> {
        let mut offsets = Vec::with_capacity(self.num_partitions());
        let mut offset = 0u64;
        for partition in self.partitions.iter() {
            offsets.push(offset);
            offset += partition.len() as u64;
        }

        let partitions = self
            .partitions
            .par_iter()
            .zip(offsets.par_iter())
            .map(|(partition, start)| {
                partition
                    .iter()
                    .enumerate()
                    .map(|(i, record)| (record.clone(), start + i as u64))
                    .collect::<Vec<_>>()
            })
            .collect();
        Collection::from_partitions(partitions)
    }

    /// Stable sort by a derived key; the first comparison error aborts the sort
    ///
    /// Each partition is sorted on its own task, then the sorted runs are
    /// merged into fresh partitions. The records stay inside the engine; this
    /// is a shuffle, not a crossing to the host.
    pub fn sort_by<K, KF, C>(&self, key: KF, compare: C) -> EngineResult<Collection<T>>
    where
        K: Clone + Send + Sync,
        KF: Fn(&T) -> EngineResult<K> + Send + Sync,
        C: Fn(&K, &K) -> EngineResult<Ordering> + Send + Sync,
    {
        let keyed = self.map(|record| Ok((key(record)?, record.clone())))?;
        let mut runs = keyed
            .partitions
            .par_iter()
            .map(|partition| sort_run(partition.clone(), &compare))
            .collect::<EngineResult<Vec<_>>>()?;

        // Ties go to the earlier run, which keeps the merge stable
        let mut merged = Vec::with_capacity(keyed.count());
        loop {
            let mut best: Option<usize> = None;
            for (i, run) in runs.iter().enumerate() {
                let Some((candidate, _)) = run.front() else {
                    continue;
                };
                if let Some((current, _)) = best.and_then(|b| runs[b].front()) {
                    if compare(candidate, current)? != Ordering::Less {
                        continue;
                    }
                }
                best = Some(i);
            }
            match best.and_then(|b| runs[b].pop_front()) {
                Some((_, record)) => merged.push(record),
                None => break,
            }
        }
        Ok(Collection::parallelize(merged, self.num_partitions()))
    }
}

fn sort_run<K, T, C>(mut run: Vec<(K, T)>, compare: &C) -> EngineResult<VecDeque<(K, T)>>
where
    C: Fn(&K, &K) -> EngineResult<Ordering>,
{
    let mut failure = None;
    run.sort_by(|a, b| match compare(&a.0, &b.0) {
        Ok(ordering) => ordering,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(run.into()),
    }
}

/// A collection of key/value pairs
#[derive(Debug)]
pub struct PairCollection<K, V> {
    inner: Collection<(K, V)>,
}

impl<K, V> Clone for PairCollection<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> PairCollection<K, V>
where
    K: Clone + Send + Sync + Hash + Eq,
    V: Clone + Send + Sync,
{
    /// Shuffles pairs so that equal keys meet, then gathers each key's values
    ///
    /// Records are hashed into one bucket per output partition, and each
    /// output partition groups its bucket. Group order and value order within
    /// a group are unspecified.
    pub fn group_by_key(&self) -> Collection<(K, Vec<V>)> {
        let buckets_per_input = self.inner.num_partitions().max(1);

        let buckets: Vec<Vec<Vec<(K, V)>>> = self
            .inner
            .partitions
            .par_iter()
            .map(|partition| {
                let mut buckets = vec![Vec::new(); buckets_per_input];
                for (key, value) in partition {
                    buckets[bucket_of(key, buckets_per_input)].push((key.clone(), value.clone()));
                }
                buckets
            })
            .collect();

        let partitions = (0..buckets_per_input)
            .into_par_iter()
            .map(|bucket| {
                let mut groups: HashMap<K, Vec<V>> = HashMap::new();
                for input in &buckets {
                    for (key, value) in &input[bucket] {
                        groups.entry(key.clone()).or_default().push(value.clone());
                    }
                }
                groups.into_iter().collect::<Vec<_>>()
            })
            .collect();

        Collection::from_partitions(partitions)
    }

    pub fn count(&self) -> usize {
        self.inner.count()
    }
}

fn bucket_of<K: Hash>(key: &K, buckets: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % buckets as u64) as usize
}
